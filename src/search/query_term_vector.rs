use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::analyzer::Analyzer;
use crate::index::term_vectors::{write_pairs, TermFreqVector};

/// Term frequencies of a query text, comparable with the vectors stored
/// for indexed documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTermVector {
    terms: Vec<String>,
    freqs: Vec<u32>,
}

impl QueryTermVector {
    pub fn new(terms: &[&str]) -> Self {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for term in terms {
            *counts.entry(*term).or_default() += 1;
        }
        let (terms, freqs) = counts.into_iter().map(|(t, n)| (t.to_string(), n)).unzip();
        QueryTermVector { terms, freqs }
    }

    /// Vector of the tokens `analyzer` produces for `text`.
    pub fn analyze(text: &str, analyzer: &Analyzer) -> Self {
        let tokens = analyzer.analyze("", text);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        Self::new(&texts)
    }
}

impl TermFreqVector for QueryTermVector {
    fn field(&self) -> Option<&str> {
        None
    }

    fn terms(&self) -> &[String] {
        &self.terms
    }

    fn term_frequencies(&self) -> &[u32] {
        &self.freqs
    }
}

impl fmt::Display for QueryTermVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        write_pairs(f, &self.terms, &self.freqs)?;
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_sorted_terms() {
        let vector = QueryTermVector::new(&["b", "a", "b", "c", "b"]);
        assert_eq!(vector.terms(), &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(vector.term_frequencies(), &[1, 3, 1]);
        assert_eq!(vector.field(), None);
        assert_eq!(vector.index_of("b"), Some(1));
        assert_eq!(vector.index_of("d"), None);
        assert_eq!(vector.to_string(), "{a/1, b/3, c/1}");
    }

    #[test]
    fn analyzed_text_uses_analyzer_tokens() {
        let vector = QueryTermVector::analyze("The Fox the fox", &Analyzer::standard());
        assert_eq!(vector.to_string(), "{fox/2}");
        assert_eq!(QueryTermVector::analyze("", &Analyzer::standard()).size(), 0);
    }
}
