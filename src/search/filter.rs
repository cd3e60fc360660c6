use roaring::RoaringBitmap;

use crate::core::error::Result;
use crate::index::iterator::DocIterator;
use crate::index::term::Term;
use crate::storage::segment_reader::SegmentReader;

/// Restricts a search to a subset of each segment's documents.
pub trait Filter: Send + Sync {
    /// Segment-local numbers of the documents allowed through.
    fn bits(&self, reader: &SegmentReader) -> Result<RoaringBitmap>;
}

/// Allows documents containing any of a set of terms.
#[derive(Debug, Clone, Default)]
pub struct TermsFilter {
    terms: Vec<Term>,
}

impl TermsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_term(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn with_term(mut self, term: Term) -> Self {
        self.add_term(term);
        self
    }
}

impl Filter for TermsFilter {
    fn bits(&self, reader: &SegmentReader) -> Result<RoaringBitmap> {
        let mut bits = RoaringBitmap::new();
        for term in &self.terms {
            let mut docs = reader.term_docs(term)?;
            while docs.next()? {
                bits.insert(docs.doc());
            }
        }
        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::scorer::testing::segment;

    #[test]
    fn union_of_term_postings() {
        let reader = segment(&["a", "b", "c", "a c"]);
        let filter = TermsFilter::new()
            .with_term(Term::new("f", "a"))
            .with_term(Term::new("f", "c"))
            .with_term(Term::new("f", "missing"));
        let bits = filter.bits(&reader).unwrap();
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn deleted_documents_are_excluded() {
        let reader = segment(&["a", "a"]);
        reader.delete_document(0).unwrap();
        let bits = TermsFilter::new().with_term(Term::new("f", "a")).bits(&reader).unwrap();
        assert_eq!(bits.len(), 1);
    }
}
