use crate::core::error::{Error, ErrorKind, Result};

/// Variable byte encoding for integers (best for small integers).
/// Seven bits per byte, low-order group first, high bit set on every byte
/// except the last.
pub struct VByteEncoder;

impl VByteEncoder {
    /// Encode single u32 value into `buf`, returns bytes written.
    /// Values < 128 use 1 byte, < 16384 use 2 bytes, etc.
    pub fn encode_u32(buf: &mut [u8; 5], mut value: u32) -> usize {
        let mut i = 0;
        while value >= 128 {
            buf[i] = (value & 127) as u8 | 128; // Set continuation bit
            value >>= 7;
            i += 1;
        }
        buf[i] = value as u8;
        i + 1
    }

    pub fn encode_u64(buf: &mut [u8; 10], mut value: u64) -> usize {
        let mut i = 0;
        while value >= 128 {
            buf[i] = (value & 127) as u8 | 128;
            value >>= 7;
            i += 1;
        }
        buf[i] = value as u8;
        i + 1
    }

    /// Decode single u32 value, returns (value, bytes_consumed)
    pub fn decode_u32(input: &[u8]) -> Result<(u32, usize)> {
        let mut value = 0u32;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u32) << shift;

            if byte & 128 == 0 {
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 28 {
                // Max 5 bytes for u32
                return Err(Error::new(ErrorKind::Corruption, "VInt overflow".to_string()));
            }
        }

        Err(Error::new(ErrorKind::Corruption, "Incomplete VInt".to_string()))
    }

    pub fn decode_u64(input: &[u8]) -> Result<(u64, usize)> {
        let mut value = 0u64;
        let mut shift = 0;
        let mut consumed = 0;

        for &byte in input {
            consumed += 1;
            value |= ((byte & 127) as u64) << shift;

            if byte & 128 == 0 {
                return Ok((value, consumed));
            }

            shift += 7;
            if shift > 63 {
                return Err(Error::new(ErrorKind::Corruption, "VLong overflow".to_string()));
            }
        }

        Err(Error::new(ErrorKind::Corruption, "Incomplete VLong".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values_use_expected_widths() {
        let mut buf = [0u8; 5];
        assert_eq!(VByteEncoder::encode_u32(&mut buf, 127), 1);
        assert_eq!(VByteEncoder::encode_u32(&mut buf, 128), 2);
        assert_eq!(&buf[..2], &[0x80, 0x01]);
        assert_eq!(VByteEncoder::encode_u32(&mut buf, 16_384), 3);
        assert_eq!(VByteEncoder::encode_u32(&mut buf, u32::MAX), 5);
        assert_eq!(VByteEncoder::decode_u32(&buf).unwrap(), (u32::MAX, 5));
    }

    #[test]
    fn long_values_decode() {
        let mut buf = [0u8; 10];
        let n = VByteEncoder::encode_u64(&mut buf, 1 << 40);
        assert_eq!(VByteEncoder::decode_u64(&buf[..n]).unwrap(), (1 << 40, n));
    }

    #[test]
    fn truncated_input_is_corruption() {
        let err = VByteEncoder::decode_u32(&[0x80, 0x80]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
        let err = VByteEncoder::decode_u32(&[0xff; 6]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }
}
