use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;

use crate::core::error::Result;
use crate::core::priority_queue::PriorityQueue;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::{DocIterator, TermPositions};
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::{Similarity, decode_norm};

/// How occurrences of the phrase inside one document are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseMatcher {
    /// Every term exactly at its offset.
    Exact,
    /// Terms may be displaced by up to `slop` positions in total; closer
    /// matches count more.
    Sloppy { slop: u32 },
}

/// Cursor over one phrase term, with positions shifted into phrase space.
struct PhrasePositions {
    postings: Box<dyn TermPositions>,
    doc: DocId,
    position: i64,
    remaining: u32,
    offset: i64,
}

impl PhrasePositions {
    fn next(&mut self) -> Result<bool> {
        if !self.postings.next()? {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.doc = self.postings.doc();
        self.position = 0;
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.postings.skip_to(target)? {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.doc = self.postings.doc();
        self.position = 0;
        Ok(true)
    }

    fn first_position(&mut self) -> Result<()> {
        self.remaining = self.postings.freq();
        self.next_position()?;
        Ok(())
    }

    fn next_position(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        self.position = self.postings.next_position()? as i64 - self.offset;
        Ok(true)
    }
}

fn less(a: &PhrasePositions, b: &PhrasePositions) -> bool {
    (a.doc, a.position, a.offset) < (b.doc, b.position, b.offset)
}

/// Scores documents containing a phrase.
///
/// Term cursors live in an arena; `order` holds their indices from the one
/// furthest behind to the one furthest ahead, and the queue re-sorts them by
/// document then by phrase position.
pub struct PhraseScorer {
    positions: Vec<PhrasePositions>,
    order: VecDeque<usize>,
    queue: PriorityQueue<usize>,
    matcher: PhraseMatcher,
    similarity: Arc<dyn Similarity>,
    norms: Bytes,
    value: f32,
    first_time: bool,
    more: bool,
    freq: f32,
}

impl PhraseScorer {
    /// `terms` pairs each term's postings with its offset in the phrase.
    /// A single-term phrase is always matched exactly.
    pub fn new(
        terms: Vec<(Box<dyn TermPositions>, u32)>,
        matcher: PhraseMatcher,
        similarity: Arc<dyn Similarity>,
        value: f32,
        norms: Bytes,
    ) -> Self {
        let matcher = if terms.len() < 2 { PhraseMatcher::Exact } else { matcher };
        let positions: Vec<PhrasePositions> = terms
            .into_iter()
            .map(|(postings, offset)| PhrasePositions {
                postings,
                doc: 0,
                position: 0,
                remaining: 0,
                offset: offset as i64,
            })
            .collect();
        PhraseScorer {
            order: (0..positions.len()).collect(),
            queue: PriorityQueue::new(positions.len()),
            more: !positions.is_empty(),
            positions,
            matcher,
            similarity,
            norms,
            value,
            first_time: true,
            freq: 0.0,
        }
    }

    /// Phrase frequency in the current document.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    fn first(&self) -> usize {
        self.order.front().copied().unwrap_or(0)
    }

    fn last(&self) -> usize {
        self.order.back().copied().unwrap_or(0)
    }

    fn first_to_last(&mut self) {
        if let Some(first) = self.order.pop_front() {
            self.order.push_back(first);
        }
    }

    fn sort(&mut self) {
        self.queue.clear();
        for i in 0..self.positions.len() {
            self.queue.put(i, |a, b| less(&self.positions[*a], &self.positions[*b]));
        }
        self.order.clear();
        while let Some(i) = self.queue.pop(|a, b| less(&self.positions[*a], &self.positions[*b])) {
            self.order.push_back(i);
        }
    }

    fn init(&mut self) -> Result<()> {
        self.first_time = false;
        for i in 0..self.positions.len() {
            if !self.more {
                break;
            }
            self.more = self.positions[i].next()?;
        }
        if self.more {
            self.sort();
        }
        Ok(())
    }

    fn do_next(&mut self) -> Result<bool> {
        while self.more {
            while self.more && self.positions[self.first()].doc < self.positions[self.last()].doc {
                let target = self.positions[self.last()].doc;
                let first = self.first();
                self.more = self.positions[first].skip_to(target)?;
                self.first_to_last();
            }
            if self.more {
                self.freq = self.phrase_freq()?;
                if self.freq == 0.0 {
                    let last = self.last();
                    self.more = self.positions[last].next()?;
                } else {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn phrase_freq(&mut self) -> Result<f32> {
        match self.matcher {
            PhraseMatcher::Exact => self.exact_freq(),
            PhraseMatcher::Sloppy { slop } => self.sloppy_freq(slop),
        }
    }

    fn exact_freq(&mut self) -> Result<f32> {
        for pp in self.positions.iter_mut() {
            pp.first_position()?;
        }
        self.sort();

        let mut freq = 0u32;
        loop {
            while self.positions[self.first()].position < self.positions[self.last()].position {
                let last_position = self.positions[self.last()].position;
                let first = self.first();
                loop {
                    if !self.positions[first].next_position()? {
                        return Ok(freq as f32);
                    }
                    if self.positions[first].position >= last_position {
                        break;
                    }
                }
                self.first_to_last();
            }
            freq += 1;
            let last = self.last();
            if !self.positions[last].next_position()? {
                break;
            }
        }
        Ok(freq as f32)
    }

    fn sloppy_freq(&mut self, slop: u32) -> Result<f32> {
        self.queue.clear();
        let mut end = 0i64;
        for i in 0..self.positions.len() {
            self.positions[i].first_position()?;
            end = end.max(self.positions[i].position);
            self.queue.put(i, |a, b| less(&self.positions[*a], &self.positions[*b]));
        }

        let mut freq = 0.0;
        let mut done = false;
        while !done {
            let Some(i) = self.queue.pop(|a, b| less(&self.positions[*a], &self.positions[*b])) else {
                break;
            };
            let mut start = self.positions[i].position;
            let next = match self.queue.top() {
                Some(&top) => self.positions[top].position,
                None => start,
            };
            let mut pos = start;
            while pos <= next {
                start = pos;
                if !self.positions[i].next_position()? {
                    done = true;
                    break;
                }
                pos = self.positions[i].position;
            }

            let match_length = end - start;
            if match_length <= slop as i64 {
                freq += self.similarity.sloppy_freq(match_length.max(0) as u32);
            }
            end = end.max(self.positions[i].position);
            self.queue.put(i, |a, b| less(&self.positions[*a], &self.positions[*b]));
        }
        Ok(freq)
    }
}

impl DocIterator for PhraseScorer {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.init()?;
        } else if self.more {
            let last = self.last();
            self.more = self.positions[last].next()?;
        }
        self.do_next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.first_time = false;
        for i in 0..self.positions.len() {
            if !self.more {
                break;
            }
            self.more = self.positions[i].skip_to(target)?;
        }
        if self.more {
            self.sort();
        }
        self.do_next()
    }

    fn doc(&self) -> DocId {
        if self.more && !self.positions.is_empty() {
            self.positions[self.first()].doc
        } else {
            NO_MORE_DOCS
        }
    }
}

impl Scorer for PhraseScorer {
    fn score(&self) -> f32 {
        let norm = self.norms.get(self.doc() as usize).copied().unwrap_or(0);
        self.similarity.tf(self.freq) * self.value * decode_norm(norm)
    }
}
