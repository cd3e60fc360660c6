use std::sync::LazyLock;

/// Scoring formula hooks. All methods are pure.
pub trait Similarity: Send + Sync {
    /// Normalization for a field with `num_terms` tokens, stored per document.
    fn length_norm(&self, field: &str, num_terms: usize) -> f32;

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32;

    fn tf(&self, freq: f32) -> f32;

    /// Contribution of one sloppy match whose terms are `distance` apart.
    fn sloppy_freq(&self, distance: u32) -> f32;

    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32;

    fn coord(&self, overlap: usize, max_overlap: usize) -> f32;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSimilarity;

impl Similarity for DefaultSimilarity {
    fn length_norm(&self, _field: &str, num_terms: usize) -> f32 {
        1.0 / (num_terms as f32).sqrt()
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        1.0 / sum_of_squared_weights.sqrt()
    }

    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn sloppy_freq(&self, distance: u32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }

    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32 {
        ((num_docs as f64 / (doc_freq as f64 + 1.0)).ln() + 1.0) as f32
    }

    fn coord(&self, overlap: usize, max_overlap: usize) -> f32 {
        overlap as f32 / max_overlap as f32
    }
}

static NORM_TABLE: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut table = [0f32; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = byte_to_float(i as u8);
    }
    table
});

/// Decodes a norm byte: 3-bit mantissa, 5-bit exponent, zero point 15.
pub fn decode_norm(b: u8) -> f32 {
    NORM_TABLE[b as usize]
}

/// Lossy one byte encoding of a non-negative float. Negative values and
/// zero encode to 0, values out of range clamp.
pub fn encode_norm(f: f32) -> u8 {
    if !(f > 0.0) {
        return 0;
    }
    let bits = f.to_bits() as i32;
    let mut mantissa = (bits & 0xff_ffff) >> 21;
    let mut exponent = (((bits >> 24) & 0x7f) - 63) + 15;
    if exponent > 31 {
        exponent = 31;
        mantissa = 7;
    }
    if exponent < 0 {
        exponent = 0;
        mantissa = 1;
    }
    ((exponent << 3) | mantissa) as u8
}

fn byte_to_float(b: u8) -> f32 {
    if b == 0 {
        return 0.0;
    }
    let mantissa = (b & 7) as u32;
    let exponent = ((b >> 3) & 31) as u32;
    let bits = ((exponent + (63 - 15)) << 24) | (mantissa << 21);
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_encodes_exactly() {
        assert_eq!(encode_norm(1.0), 124);
        assert_eq!(decode_norm(124), 1.0);
        assert_eq!(encode_norm(0.0), 0);
        assert_eq!(encode_norm(-3.0), 0);
        assert_eq!(decode_norm(0), 0.0);
    }

    #[test]
    fn decode_table_is_monotonic() {
        for b in 1..=255u8 {
            assert!(decode_norm(b) > decode_norm(b - 1), "byte {}", b);
        }
    }

    #[test]
    fn encoding_truncates_toward_zero() {
        for b in 1..=255u8 {
            let f = decode_norm(b);
            assert_eq!(encode_norm(f), b);
            assert!(decode_norm(encode_norm(f * 1.01)) <= f * 1.01);
        }
        // 1/sqrt(2) lands on the byte below 0.75
        assert_eq!(decode_norm(encode_norm(std::f32::consts::FRAC_1_SQRT_2)), 0.625);
    }

    #[test]
    fn default_formulas() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.tf(4.0), 2.0);
        assert_eq!(sim.sloppy_freq(1), 0.5);
        assert_eq!(sim.coord(2, 4), 0.5);
        assert_eq!(sim.length_norm("f", 4), 0.5);
        assert!((sim.idf(0, 1) - 1.0).abs() < 1e-6);
        assert!((sim.idf(1, 10) - (5f32.ln() + 1.0)).abs() < 1e-6);
    }
}
