use crate::core::error::{Error, Result};
use crate::index::term::Term;
use crate::search::term_enum::{FilteredTermEnum, TermFilter, Verdict};
use crate::storage::segment_reader::SegmentReader;

/// Terms whose edit distance to a target is small relative to their length.
///
/// The first `prefix_length` characters must match exactly; similarity over
/// the remainders is `1 - distance / min(len)`, and a term is accepted when
/// it exceeds `min_similarity`.
pub struct FuzzyTerms {
    field: String,
    prefix: String,
    target: Vec<char>,
    min_similarity: f32,
    scale_factor: f32,
    similarity: f32,
    // Reused DP rows
    prev_row: Vec<usize>,
    curr_row: Vec<usize>,
}

pub type FuzzyTermEnum = FilteredTermEnum<FuzzyTerms>;

impl FuzzyTerms {
    pub fn new(term: &Term, min_similarity: f32, prefix_length: usize) -> Result<Self> {
        if !(0.0..1.0).contains(&min_similarity) {
            return Err(Error::invalid_argument(format!(
                "min_similarity must be in [0, 1), got {}",
                min_similarity
            )));
        }
        let chars: Vec<char> = term.text.chars().collect();
        let split = prefix_length.min(chars.len());
        Ok(FuzzyTerms {
            field: term.field.clone(),
            prefix: chars[..split].iter().collect(),
            target: chars[split..].to_vec(),
            min_similarity,
            scale_factor: 1.0 / (1.0 - min_similarity),
            similarity: 0.0,
            prev_row: Vec::new(),
            curr_row: Vec::new(),
        })
    }

    pub fn open(reader: &SegmentReader, term: &Term, min_similarity: f32, prefix_length: usize) -> Result<FuzzyTermEnum> {
        FilteredTermEnum::new(reader, FuzzyTerms::new(term, min_similarity, prefix_length)?)
    }

    /// `1 - distance / min(len)` of `text` against the target remainder;
    /// 0 when exactly one side is empty.
    fn similarity_to(&mut self, text: &[char]) -> f32 {
        let shorter = text.len().min(self.target.len());
        if shorter == 0 {
            return if text.len() == self.target.len() { 1.0 } else { 0.0 };
        }
        let distance = self.edit_distance(text);
        1.0 - distance as f32 / shorter as f32
    }

    /// Levenshtein distance from the target to `other`.
    pub fn edit_distance(&mut self, other: &[char]) -> usize {
        let a = &self.target;
        let len_a = a.len();
        let len_b = other.len();

        if len_a == 0 {
            return len_b;
        }
        if len_b == 0 {
            return len_a;
        }

        self.prev_row.clear();
        self.prev_row.extend(0..=len_b);
        self.curr_row.clear();
        self.curr_row.resize(len_b + 1, 0);

        for i in 1..=len_a {
            self.curr_row[0] = i;

            for j in 1..=len_b {
                let cost = if a[i - 1] == other[j - 1] { 0 } else { 1 };

                self.curr_row[j] = std::cmp::min(
                    std::cmp::min(
                        self.prev_row[j] + 1,      // deletion
                        self.curr_row[j - 1] + 1, // insertion
                    ),
                    self.prev_row[j - 1] + cost,  // substitution
                );
            }

            std::mem::swap(&mut self.prev_row, &mut self.curr_row);
        }

        self.prev_row[len_b]
    }
}

impl TermFilter for FuzzyTerms {
    fn start(&self) -> Term {
        Term::new(&self.field, &self.prefix)
    }

    fn check(&mut self, term: &Term) -> Verdict {
        if term.field != self.field || !term.text.starts_with(&self.prefix) {
            return Verdict::End;
        }
        let rest: Vec<char> = term.text[self.prefix.len()..].chars().collect();
        self.similarity = self.similarity_to(&rest);
        if self.similarity > self.min_similarity {
            Verdict::Accept
        } else {
            Verdict::Skip
        }
    }

    /// Similarity rescaled so that `min_similarity` maps to 0 and an exact
    /// match to 1.
    fn difference(&self) -> f32 {
        (self.similarity - self.min_similarity) * self.scale_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::scoring::scorer::testing::segment;

    fn distance(a: &str, b: &str) -> usize {
        let mut terms = FuzzyTerms::new(&Term::new("f", a), 0.5, 0).unwrap();
        let other: Vec<char> = b.chars().collect();
        terms.edit_distance(&other)
    }

    #[test]
    fn levenshtein_distance() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", "abc"), 0);
        // a swap costs two edits
        assert_eq!(distance("ab", "ba"), 2);
    }

    #[test]
    fn accepts_close_terms_with_scaled_difference() {
        let reader = segment(&["lucene lucent licence lunch", "zebra"]);
        let terms = FuzzyTerms::open(&reader, &Term::new("f", "lucene"), 0.5, 0)
            .unwrap()
            .collect_terms()
            .unwrap();
        let found: Vec<(&str, f32)> = terms.iter().map(|(t, d)| (t.text.as_str(), *d)).collect();
        // licence: 2 edits over 6 chars, lucent: 1 edit, lunch: too far
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].0, "licence");
        assert!((found[0].1 - (1.0 - 2.0 / 6.0 - 0.5) * 2.0).abs() < 1e-6);
        assert_eq!(found[1], ("lucene", 1.0));
        assert_eq!(found[2].0, "lucent");
    }

    #[test]
    fn prefix_must_match_exactly() {
        let reader = segment(&["lucene mucene lucent"]);
        let terms = FuzzyTerms::open(&reader, &Term::new("f", "lucene"), 0.5, 2)
            .unwrap()
            .collect_terms()
            .unwrap();
        let found: Vec<String> = terms.into_iter().map(|(t, _)| t.text).collect();
        assert_eq!(found, vec!["lucene", "lucent"]);
    }

    #[test]
    fn rejects_out_of_range_similarity() {
        let err = FuzzyTerms::new(&Term::new("f", "a"), 1.0, 0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(FuzzyTerms::new(&Term::new("f", "a"), -0.1, 0).is_err());
    }
}
