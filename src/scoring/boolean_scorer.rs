use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::DocIterator;
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::Similarity;

const WINDOW: u32 = 1024;
const WINDOW_MASK: u32 = WINDOW - 1;

/// Most clauses one boolean scorer can track; each owns a bit of a `u32`.
pub const MAX_CLAUSES: usize = 32;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    doc: DocId,
    score: f32,
    bits: u32,
    coord: u32,
    next: Option<usize>,
}

impl Default for Bucket {
    fn default() -> Self {
        Bucket {
            doc: NO_MORE_DOCS,
            score: 0.0,
            bits: 0,
            coord: 0,
            next: None,
        }
    }
}

struct SubScorer {
    scorer: Box<dyn Scorer>,
    mask: u32,
    done: bool,
}

/// Scores any mix of required, optional and prohibited clauses a window of
/// 1024 documents at a time.
///
/// Every clause pours its hits for the window into a bucket table addressed
/// by `doc & 1023`; buckets are then drained from a most-recent-first list
/// and kept when no prohibited bit and every required bit is set. Documents
/// come back in no particular order, so `skip_to` is refused.
pub struct BooleanScorer {
    scorers: Vec<SubScorer>,
    similarity: Arc<dyn Similarity>,
    buckets: Vec<Bucket>,
    first: Option<usize>,
    current: Bucket,
    end: u64,
    max_coord: usize,
    coord_factors: Vec<f32>,
    required_mask: u32,
    prohibited_mask: u32,
}

impl BooleanScorer {
    pub fn new(similarity: Arc<dyn Similarity>) -> Self {
        BooleanScorer {
            scorers: Vec::new(),
            similarity,
            buckets: vec![Bucket::default(); WINDOW as usize],
            first: None,
            current: Bucket::default(),
            end: 0,
            max_coord: 1,
            coord_factors: Vec::new(),
            required_mask: 0,
            prohibited_mask: 0,
        }
    }

    /// Adds a clause and moves it onto its first document.
    pub fn add(&mut self, mut scorer: Box<dyn Scorer>, required: bool, prohibited: bool) -> Result<()> {
        if self.scorers.len() >= MAX_CLAUSES {
            return Err(Error::invalid_argument(format!(
                "boolean scorer holds at most {} clauses",
                MAX_CLAUSES
            )));
        }
        let mask = 1u32 << self.scorers.len();
        if prohibited {
            self.prohibited_mask |= mask;
        } else {
            self.max_coord += 1;
            if required {
                self.required_mask |= mask;
            }
        }
        let done = !scorer.next()?;
        self.scorers.push(SubScorer { scorer, mask, done });
        self.compute_coord_factors();
        Ok(())
    }

    /// Counts a clause that has no scorer for this segment, so coord stays
    /// the same in every segment of the index.
    pub fn add_absent(&mut self, prohibited: bool) {
        if !prohibited {
            self.max_coord += 1;
            self.compute_coord_factors();
        }
    }

    fn compute_coord_factors(&mut self) {
        let max_overlap = self.max_coord - 1;
        self.coord_factors = (0..self.max_coord)
            .map(|overlap| self.similarity.coord(overlap, max_overlap))
            .collect();
    }

    fn accepts(&self, bucket: &Bucket) -> bool {
        bucket.bits & self.prohibited_mask == 0 && bucket.bits & self.required_mask == self.required_mask
    }

    /// Pulls every clause's hits below the new window end into the table.
    /// Returns whether any clause has documents left.
    fn refill(&mut self) -> Result<bool> {
        self.end += WINDOW as u64;
        let mut more = false;
        for sub in self.scorers.iter_mut() {
            while !sub.done && (sub.scorer.doc() as u64) < self.end {
                let doc = sub.scorer.doc();
                let score = sub.scorer.score();
                let slot = (doc & WINDOW_MASK) as usize;
                let bucket = &mut self.buckets[slot];
                if bucket.doc != doc {
                    *bucket = Bucket {
                        doc,
                        score,
                        bits: sub.mask,
                        coord: 1,
                        next: self.first,
                    };
                    self.first = Some(slot);
                } else {
                    bucket.score += score;
                    bucket.bits |= sub.mask;
                    bucket.coord += 1;
                }
                sub.done = !sub.scorer.next()?;
            }
            if !sub.done {
                more = true;
            }
        }
        Ok(more)
    }
}

impl DocIterator for BooleanScorer {
    fn next(&mut self) -> Result<bool> {
        loop {
            while let Some(slot) = self.first {
                let bucket = self.buckets[slot];
                self.first = bucket.next;
                if self.accepts(&bucket) {
                    self.current = bucket;
                    return Ok(true);
                }
            }
            let more = self.refill()?;
            if self.first.is_none() && !more {
                self.current = Bucket::default();
                return Ok(false);
            }
        }
    }

    fn skip_to(&mut self, _target: DocId) -> Result<bool> {
        Err(Error::unsupported("skip_to on a boolean scorer"))
    }

    fn doc(&self) -> DocId {
        self.current.doc
    }
}

impl Scorer for BooleanScorer {
    fn score(&self) -> f32 {
        let factor = self.coord_factors.get(self.current.coord as usize).copied().unwrap_or(1.0);
        self.current.score * factor
    }
}
