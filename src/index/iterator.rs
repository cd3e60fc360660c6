//! Pull-style iteration shared by postings readers and scorers.
//!
//! `doc()` is meaningful only after a successful `next` or `skip_to`, and
//! returns `NO_MORE_DOCS` once the iterator is exhausted.

use crate::core::error::Result;
use crate::core::types::DocId;

pub trait DocIterator {
    /// Advances to the next document. Returns false at the end.
    fn next(&mut self) -> Result<bool>;

    /// Advances to the first later document `>= target`. Equivalent to
    /// calling `next` at least once and then while `doc() < target`.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    fn doc(&self) -> DocId;
}

/// Postings of a single term.
pub trait TermDocs: DocIterator {
    fn freq(&self) -> u32;

    /// Fills `docs` and `freqs` with upcoming postings; returns how many
    /// were read, 0 at the end.
    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> Result<usize>;
}

/// Postings with positions. `next_position` must be called at most
/// `freq()` times per document.
pub trait TermPositions: TermDocs {
    fn next_position(&mut self) -> Result<u32>;
}

impl<T: DocIterator + ?Sized> DocIterator for Box<T> {
    fn next(&mut self) -> Result<bool> {
        (**self).next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        (**self).skip_to(target)
    }

    fn doc(&self) -> DocId {
        (**self).doc()
    }
}

impl<T: TermDocs + ?Sized> TermDocs for Box<T> {
    fn freq(&self) -> u32 {
        (**self).freq()
    }

    fn read(&mut self, docs: &mut [DocId], freqs: &mut [u32]) -> Result<usize> {
        (**self).read(docs, freqs)
    }
}

impl<T: TermPositions + ?Sized> TermPositions for Box<T> {
    fn next_position(&mut self) -> Result<u32> {
        (**self).next_position()
    }
}
