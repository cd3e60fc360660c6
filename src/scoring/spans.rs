use std::sync::Arc;

use bytes::Bytes;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::priority_queue::PriorityQueue;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::{DocIterator, TermPositions};
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::{Similarity, decode_norm};

/// Ordered stream of `(doc, start, end)` matches, `end` exclusive.
pub trait Spans {
    fn next(&mut self) -> Result<bool>;

    /// Moves to the first match in a document at or after `target`.
    fn skip_to(&mut self, target: DocId) -> Result<bool>;

    fn doc(&self) -> DocId;

    fn start(&self) -> u32;

    fn end(&self) -> u32;
}

/// Every occurrence of one term, each one position wide.
pub struct TermSpans<T: TermPositions = Box<dyn TermPositions>> {
    positions: T,
    doc: DocId,
    freq: u32,
    count: u32,
    position: u32,
}

impl<T: TermPositions> TermSpans<T> {
    pub fn new(positions: T) -> Self {
        TermSpans {
            positions,
            doc: 0,
            freq: 0,
            count: 0,
            position: 0,
        }
    }
}

impl<T: TermPositions> Spans for TermSpans<T> {
    fn next(&mut self) -> Result<bool> {
        if self.count == self.freq {
            if !self.positions.next()? {
                self.doc = NO_MORE_DOCS;
                return Ok(false);
            }
            self.doc = self.positions.doc();
            self.freq = self.positions.freq();
            self.count = 0;
        }
        self.position = self.positions.next_position()?;
        self.count += 1;
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if !self.positions.skip_to(target)? {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.doc = self.positions.doc();
        self.freq = self.positions.freq();
        self.position = self.positions.next_position()?;
        self.count = 1;
        Ok(true)
    }

    fn doc(&self) -> DocId {
        self.doc
    }

    fn start(&self) -> u32 {
        self.position
    }

    fn end(&self) -> u32 {
        self.position + 1
    }
}

/// One sub-clause of a [`NearSpans`] with its clause number and the width of
/// its current match.
struct SpansCell {
    spans: Box<dyn Spans>,
    index: usize,
    length: Option<u32>,
}

impl SpansCell {
    fn doc(&self) -> DocId {
        self.spans.doc()
    }

    fn start(&self) -> u32 {
        self.spans.start()
    }

    fn end(&self) -> u32 {
        self.spans.end()
    }
}

fn cell_less(a: &SpansCell, b: &SpansCell) -> bool {
    if a.doc() != b.doc() {
        a.doc() < b.doc()
    } else if a.start() != b.start() {
        a.start() < b.start()
    } else if a.end() != b.end() {
        a.end() < b.end()
    } else {
        a.index > b.index
    }
}

/// Matches of several sub-clauses within `slop` positions of each other,
/// optionally required to appear in clause order.
///
/// The slack of a candidate window is `max_end - min_start` minus the summed
/// widths of the sub-matches. Cells live in an arena; `list` is the
/// working order while catching up on documents and `queue` orders them by
/// `(doc, start, end)` otherwise.
pub struct NearSpans {
    cells: Vec<SpansCell>,
    list: Vec<usize>,
    queue: PriorityQueue<usize>,
    slop: u32,
    in_order: bool,
    total_length: i64,
    max: Option<usize>,
    more: bool,
    first_time: bool,
}

impl NearSpans {
    pub fn new(clauses: Vec<Box<dyn Spans>>, slop: u32, in_order: bool) -> Self {
        let cells: Vec<SpansCell> = clauses
            .into_iter()
            .enumerate()
            .map(|(index, spans)| SpansCell {
                spans,
                index,
                length: None,
            })
            .collect();
        NearSpans {
            queue: PriorityQueue::new(cells.len()),
            more: !cells.is_empty(),
            cells,
            list: Vec::new(),
            slop,
            in_order,
            total_length: 0,
            max: None,
            first_time: true,
        }
    }

    fn advance_cell(&mut self, i: usize, target: Option<DocId>) -> Result<bool> {
        let cell = &mut self.cells[i];
        if let Some(length) = cell.length {
            self.total_length -= length as i64;
        }
        let more = match target {
            Some(target) => cell.spans.skip_to(target)?,
            None => cell.spans.next()?,
        };
        if more {
            let length = cell.end().saturating_sub(cell.start());
            cell.length = Some(length);
            self.total_length += length as i64;
            let (doc, end) = (cell.doc(), cell.end());
            let replace = match self.max {
                None => true,
                Some(m) => {
                    let max = &self.cells[m];
                    doc > max.doc() || (doc == max.doc() && end > max.end())
                }
            };
            if replace {
                self.max = Some(i);
            }
        }
        Ok(more)
    }

    fn min(&self) -> Result<usize> {
        self.queue
            .top()
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "near spans have no active clause".to_string()))
    }

    fn max_cell(&self) -> Result<usize> {
        self.max
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "near spans have no current match".to_string()))
    }

    fn adjust_top(&mut self) {
        let cells = &self.cells;
        self.queue.adjust_top(|a, b| cell_less(&cells[*a], &cells[*b]));
    }

    fn init_list(&mut self, advance: bool) -> Result<()> {
        for i in 0..self.cells.len() {
            if !self.more {
                break;
            }
            if advance {
                self.more = self.advance_cell(i, None)?;
            }
            if self.more {
                self.list.push(i);
            }
        }
        Ok(())
    }

    fn first_to_last(&mut self) {
        if !self.list.is_empty() {
            let first = self.list.remove(0);
            self.list.push(first);
        }
    }

    fn queue_to_list(&mut self) {
        self.list.clear();
        let cells = &self.cells;
        while let Some(i) = self.queue.pop(|a, b| cell_less(&cells[*a], &cells[*b])) {
            self.list.push(i);
        }
    }

    fn list_to_queue(&mut self) {
        self.queue.clear();
        self.partial_list_to_queue();
    }

    fn partial_list_to_queue(&mut self) {
        let cells = &self.cells;
        for &i in &self.list {
            self.queue.put(i, |a, b| cell_less(&cells[*a], &cells[*b]));
        }
    }

    /// Moves cells out of the queue in order up to and including the first
    /// one out of clause order, then advances that one.
    fn first_non_ordered_next_to_partial_list(&mut self) -> Result<bool> {
        self.list.clear();
        let mut ordered_index = 0;
        loop {
            let cells = &self.cells;
            let Some(i) = self.queue.pop(|a, b| cell_less(&cells[*a], &cells[*b])) else {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    "near spans found no out-of-order clause".to_string(),
                ));
            };
            self.list.push(i);
            if self.cells[i].index == ordered_index {
                ordered_index += 1;
            } else {
                return self.advance_cell(i, None);
            }
        }
    }

    fn check_slop(&self) -> Result<bool> {
        let min = &self.cells[self.min()?];
        let max = &self.cells[self.max_cell()?];
        let match_length = max.end() as i64 - min.start() as i64;
        Ok(match_length - self.total_length <= self.slop as i64)
    }

    fn match_is_ordered(&self) -> bool {
        let mut last_start: i64 = -1;
        for cell in &self.cells {
            let start = cell.start() as i64;
            if start <= last_start {
                return false;
            }
            last_start = start;
        }
        true
    }

    fn at_match(&self) -> Result<bool> {
        let min = &self.cells[self.min()?];
        let max = &self.cells[self.max_cell()?];
        Ok(min.doc() == max.doc() && self.check_slop()? && (!self.in_order || self.match_is_ordered()))
    }

    fn list_first_behind_last(&self) -> bool {
        match (self.list.first(), self.list.last()) {
            (Some(&first), Some(&last)) => self.cells[first].doc() < self.cells[last].doc(),
            _ => false,
        }
    }
}

impl Spans for NearSpans {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.init_list(true)?;
            self.list_to_queue();
            self.first_time = false;
        } else if self.more {
            let min = self.min()?;
            self.more = self.advance_cell(min, None)?;
            if self.more {
                self.adjust_top();
            }
        }

        while self.more {
            let mut queue_stale = false;
            if self.cells[self.min()?].doc() != self.cells[self.max_cell()?].doc() {
                self.queue_to_list();
                queue_stale = true;
            }

            while self.more && self.list_first_behind_last() {
                let target = self.list.last().map(|&l| self.cells[l].doc()).unwrap_or(NO_MORE_DOCS);
                let first = self.list[0];
                self.more = self.advance_cell(first, Some(target))?;
                self.first_to_last();
                queue_stale = true;
            }
            if !self.more {
                return Ok(false);
            }
            if queue_stale {
                self.list_to_queue();
            }

            if self.at_match()? {
                return Ok(true);
            }

            if self.in_order && self.check_slop()? {
                self.more = self.first_non_ordered_next_to_partial_list()?;
                if self.more {
                    self.partial_list_to_queue();
                }
            } else {
                let min = self.min()?;
                self.more = self.advance_cell(min, None)?;
                if self.more {
                    self.adjust_top();
                }
            }
        }
        Ok(false)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.first_time {
            self.init_list(false)?;
            for k in 0..self.list.len() {
                if !self.more {
                    break;
                }
                let i = self.list[k];
                self.more = self.advance_cell(i, Some(target))?;
            }
            if self.more {
                self.list_to_queue();
            }
            self.first_time = false;
        } else {
            while self.more && self.cells[self.min()?].doc() < target {
                let min = self.min()?;
                self.more = self.advance_cell(min, Some(target))?;
                if self.more {
                    self.adjust_top();
                }
            }
        }

        if self.more {
            if self.at_match()? {
                return Ok(true);
            }
            return self.next();
        }
        Ok(false)
    }

    fn doc(&self) -> DocId {
        match self.queue.top() {
            Some(&min) if self.more => self.cells[min].doc(),
            _ => NO_MORE_DOCS,
        }
    }

    fn start(&self) -> u32 {
        self.queue.top().map_or(0, |&min| self.cells[min].start())
    }

    fn end(&self) -> u32 {
        self.max.map_or(0, |max| self.cells[max].end())
    }
}

/// Scores documents by their span matches: each match adds
/// `sloppy_freq(end - start)` to the document's frequency.
pub struct SpanScorer {
    spans: Box<dyn Spans>,
    similarity: Arc<dyn Similarity>,
    norms: Bytes,
    value: f32,
    first_time: bool,
    more: bool,
    doc: DocId,
    freq: f32,
}

impl SpanScorer {
    pub fn new(spans: Box<dyn Spans>, similarity: Arc<dyn Similarity>, value: f32, norms: Bytes) -> Self {
        SpanScorer {
            spans,
            similarity,
            norms,
            value,
            first_time: true,
            more: true,
            doc: 0,
            freq: 0.0,
        }
    }

    pub fn freq(&self) -> f32 {
        self.freq
    }

    /// Sums the matches of the document the spans are on.
    fn gather(&mut self) -> Result<bool> {
        self.freq = 0.0;
        self.doc = self.spans.doc();
        while self.more && self.spans.doc() == self.doc {
            let match_length = self.spans.end().saturating_sub(self.spans.start());
            self.freq += self.similarity.sloppy_freq(match_length);
            self.more = self.spans.next()?;
        }
        Ok(true)
    }
}

impl DocIterator for SpanScorer {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.more = self.spans.next()?;
            self.first_time = false;
        }
        if !self.more {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.gather()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        if self.first_time || (self.more && self.spans.doc() < target) {
            self.more = self.spans.skip_to(target)?;
        }
        self.first_time = false;
        if !self.more {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.gather()
    }

    fn doc(&self) -> DocId {
        self.doc
    }
}

impl Scorer for SpanScorer {
    fn score(&self) -> f32 {
        let norm = self.norms.get(self.doc as usize).copied().unwrap_or(0);
        self.similarity.tf(self.freq) * self.value * decode_norm(norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::term::Term;
    use crate::scoring::scorer::testing::segment;
    use crate::scoring::similarity::DefaultSimilarity;
    use crate::storage::segment_reader::SegmentReader;

    fn term(reader: &SegmentReader, text: &str) -> Box<dyn Spans> {
        let positions: Box<dyn TermPositions> = Box::new(reader.term_positions(&Term::new("f", text)).unwrap());
        Box::new(TermSpans::new(positions))
    }

    fn near(reader: &SegmentReader, terms: &[&str], slop: u32, in_order: bool) -> NearSpans {
        NearSpans::new(terms.iter().map(|t| term(reader, t)).collect(), slop, in_order)
    }

    fn collect(spans: &mut dyn Spans) -> Vec<(DocId, u32, u32)> {
        let mut out = Vec::new();
        while spans.next().unwrap() {
            out.push((spans.doc(), spans.start(), spans.end()));
        }
        out
    }

    #[test]
    fn term_spans_walk_every_position() {
        let reader = segment(&["a b a", "b", "a"]);
        let mut spans = term(&reader, "a");
        assert_eq!(collect(spans.as_mut()), vec![(0, 0, 1), (0, 2, 3), (2, 0, 1)]);
    }

    #[test]
    fn unordered_near_accepts_either_order() {
        let reader = segment(&["x a b", "b a", "a y y b", "a y y y b"]);
        let mut spans = near(&reader, &["a", "b"], 2, false);
        assert_eq!(collect(&mut spans), vec![(0, 1, 3), (1, 0, 2), (2, 0, 4)]);
    }

    #[test]
    fn ordered_near_rejects_reversed_clauses() {
        let reader = segment(&["x a b", "b a", "a y b"]);
        let mut spans = near(&reader, &["a", "b"], 1, true);
        assert_eq!(collect(&mut spans), vec![(0, 1, 3), (2, 0, 3)]);
    }

    #[test]
    fn ordered_near_retries_after_local_inversion() {
        // the first b precedes a, the second one follows it within the slop
        let reader = segment(&["b a b"]);
        let mut spans = near(&reader, &["a", "b"], 0, true);
        assert_eq!(collect(&mut spans), vec![(0, 1, 3)]);
    }

    #[test]
    fn skip_to_moves_to_later_match() {
        let texts: Vec<&str> = (0..30).map(|i| if i % 7 == 0 { "a b" } else { "a x x x b" }).collect();
        let reader = segment(&texts);
        let mut spans = near(&reader, &["a", "b"], 0, true);
        assert!(spans.skip_to(8).unwrap());
        assert_eq!(spans.doc(), 14);
        assert!(spans.next().unwrap());
        assert_eq!(spans.doc(), 21);
    }

    #[test]
    fn span_scorer_sums_sloppy_freqs() {
        let reader = segment(&["a b x a x b", "q"]);
        let spans = Box::new(near(&reader, &["a", "b"], 1, true));
        let mut scorer = SpanScorer::new(spans, Arc::new(DefaultSimilarity), 1.0, reader.scoring_norms("f"));
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc(), 0);
        let sim = DefaultSimilarity;
        assert!((scorer.freq() - (sim.sloppy_freq(2) + sim.sloppy_freq(3))).abs() < 1e-6);
        assert!(!scorer.next().unwrap());
        assert_eq!(scorer.doc(), NO_MORE_DOCS);
    }
}
