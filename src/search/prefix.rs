use crate::core::error::Result;
use crate::index::term::Term;
use crate::search::term_enum::{FilteredTermEnum, TermFilter, Verdict};
use crate::storage::segment_reader::SegmentReader;

/// Terms of a field starting with a prefix.
pub struct PrefixTerms {
    prefix: Term,
}

pub type PrefixTermEnum = FilteredTermEnum<PrefixTerms>;

impl PrefixTerms {
    pub fn new(prefix: Term) -> Self {
        PrefixTerms { prefix }
    }

    pub fn open(reader: &SegmentReader, prefix: Term) -> Result<PrefixTermEnum> {
        FilteredTermEnum::new(reader, PrefixTerms::new(prefix))
    }
}

impl TermFilter for PrefixTerms {
    fn start(&self) -> Term {
        self.prefix.clone()
    }

    fn check(&mut self, term: &Term) -> Verdict {
        if term.field == self.prefix.field && term.text.starts_with(&self.prefix.text) {
            Verdict::Accept
        } else {
            Verdict::End
        }
    }
}

const MANY: char = '*';
const ONE: char = '?';

/// Terms of a field matching a pattern where `*` stands for any run of
/// characters and `?` for exactly one.
pub struct WildcardTerms {
    field: String,
    /// Literal text before the first wildcard.
    prefix: String,
    /// Pattern after `prefix`.
    rest: Vec<char>,
}

pub type WildcardTermEnum = FilteredTermEnum<WildcardTerms>;

impl WildcardTerms {
    pub fn new(pattern: &Term) -> Self {
        let split = pattern.text.find([MANY, ONE]).unwrap_or(pattern.text.len());
        WildcardTerms {
            field: pattern.field.clone(),
            prefix: pattern.text[..split].to_string(),
            rest: pattern.text[split..].chars().collect(),
        }
    }

    pub fn open(reader: &SegmentReader, pattern: &Term) -> Result<WildcardTermEnum> {
        FilteredTermEnum::new(reader, WildcardTerms::new(pattern))
    }
}

impl TermFilter for WildcardTerms {
    fn start(&self) -> Term {
        Term::new(&self.field, &self.prefix)
    }

    fn check(&mut self, term: &Term) -> Verdict {
        if term.field != self.field || !term.text.starts_with(&self.prefix) {
            return Verdict::End;
        }
        let text: Vec<char> = term.text[self.prefix.len()..].chars().collect();
        if wildcard_equals(&self.rest, &text) {
            Verdict::Accept
        } else {
            Verdict::Skip
        }
    }
}

/// Whether `text` matches `pattern` in full. Backtracks to the most recent
/// `*` on a mismatch.
pub fn wildcard_equals(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some(&MANY) => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == ONE || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    // let the last `*` swallow one more character
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == MANY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::scorer::testing::segment;

    fn matches(pattern: &str, text: &str) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let t: Vec<char> = text.chars().collect();
        wildcard_equals(&p, &t)
    }

    fn texts(terms: Vec<(Term, f32)>) -> Vec<String> {
        terms.into_iter().map(|(t, _)| t.text).collect()
    }

    #[test]
    fn wildcard_semantics() {
        assert!(matches("a*c", "abbbc"));
        assert!(matches("a*c", "ac"));
        assert!(matches("a?c", "abc"));
        assert!(!matches("a?c", "ac"));
        assert!(matches("*", ""));
        assert!(matches("**b", "ab"));
        assert!(!matches("a*b", "abc"));
        assert!(matches("*b*b", "abbab"));
        assert!(matches("ü?", "üx"));
    }

    #[test]
    fn prefix_stops_at_first_non_matching_term() {
        let reader = segment(&["apple apply banana app", "apt"]);
        let terms = PrefixTerms::open(&reader, Term::new("f", "app")).unwrap().collect_terms().unwrap();
        assert_eq!(texts(terms), vec!["app", "apple", "apply"]);
    }

    #[test]
    fn wildcard_enumerates_from_literal_prefix() {
        let reader = segment(&["stop step strap stoop st", "sap"]);
        let terms = WildcardTerms::open(&reader, &Term::new("f", "st?p")).unwrap();
        assert_eq!(texts(terms.collect_terms().unwrap()), vec!["step", "stop"]);
        let terms = WildcardTerms::open(&reader, &Term::new("f", "s*p")).unwrap();
        assert_eq!(
            texts(terms.collect_terms().unwrap()),
            vec!["sap", "step", "stoop", "stop", "strap"]
        );
    }

    #[test]
    fn enum_reports_doc_freq() {
        let reader = segment(&["ab", "ab ac", "ac"]);
        let mut terms = PrefixTerms::open(&reader, Term::new("f", "a")).unwrap();
        assert!(terms.next().unwrap());
        assert_eq!(terms.term(), Some(&Term::new("f", "ab")));
        assert_eq!(terms.doc_freq(), 2);
        assert_eq!(terms.difference(), 1.0);
    }
}
