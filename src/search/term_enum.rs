//! Enumerations over the slice of a segment's term dictionary that a
//! multi-term query expands to.

use crate::core::error::Result;
use crate::index::term::Term;
use crate::index::term_dictionary::TermCursor;
use crate::storage::segment_reader::SegmentReader;

/// Verdict of a [`TermFilter`] on one dictionary term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Skip,
    /// No later term can match.
    End,
}

/// Decides which terms an enumeration yields and how close each is to the
/// query.
pub trait TermFilter {
    /// First term to look at; enumeration starts at or after it.
    fn start(&self) -> Term;

    fn check(&mut self, term: &Term) -> Verdict;

    /// Closeness of the last accepted term, in `(0, 1]`.
    fn difference(&self) -> f32 {
        1.0
    }
}

/// Terms of one segment accepted by a filter, in dictionary order.
pub struct FilteredTermEnum<F: TermFilter> {
    cursor: TermCursor,
    filter: F,
    current: Option<Term>,
    difference: f32,
    doc_freq: u32,
    started: bool,
}

impl<F: TermFilter> FilteredTermEnum<F> {
    pub fn new(reader: &SegmentReader, filter: F) -> Result<Self> {
        let cursor = reader.terms_from(&filter.start())?;
        Ok(FilteredTermEnum {
            cursor,
            filter,
            current: None,
            difference: 0.0,
            doc_freq: 0,
            started: false,
        })
    }

    /// Moves to the next accepted term.
    pub fn next(&mut self) -> Result<bool> {
        loop {
            // cursors from terms_from already sit on their first term
            let more = if self.started {
                self.cursor.next()?
            } else {
                self.started = true;
                self.cursor.term().is_some()
            };
            let Some(term) = self.cursor.term().filter(|_| more) else {
                self.current = None;
                return Ok(false);
            };
            match self.filter.check(term) {
                Verdict::Accept => {
                    self.current = Some(term.clone());
                    self.difference = self.filter.difference();
                    self.doc_freq = self.cursor.doc_freq();
                    return Ok(true);
                }
                Verdict::Skip => continue,
                Verdict::End => {
                    self.current = None;
                    return Ok(false);
                }
            }
        }
    }

    pub fn term(&self) -> Option<&Term> {
        self.current.as_ref()
    }

    pub fn difference(&self) -> f32 {
        self.difference
    }

    pub fn doc_freq(&self) -> u32 {
        self.doc_freq
    }

    /// Drains the enumeration into `(term, difference)` pairs.
    pub fn collect_terms(mut self) -> Result<Vec<(Term, f32)>> {
        let mut terms = Vec::new();
        while self.next()? {
            if let Some(term) = self.current.take() {
                terms.push((term, self.difference));
            }
        }
        Ok(terms)
    }
}
