use crate::core::error::{Error, ErrorKind, Result};
use crate::core::priority_queue::PriorityQueue;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::{DocIterator, TermDocs, TermPositions};
use crate::index::segment_term_docs::SegmentTermPositions;
use crate::index::term::Term;
use crate::storage::segment_reader::SegmentReader;

/// Growable position buffer: append, sort, then read forward once.
#[derive(Debug, Default)]
struct PositionBuffer {
    positions: Vec<u32>,
    read: usize,
}

impl PositionBuffer {
    fn clear(&mut self) {
        self.positions.clear();
        self.read = 0;
    }

    fn push(&mut self, position: u32) {
        self.positions.push(position);
    }

    fn sort(&mut self) {
        self.positions.sort_unstable();
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn next(&mut self) -> Option<u32> {
        let position = self.positions.get(self.read).copied();
        if position.is_some() {
            self.read += 1;
        }
        position
    }
}

/// Union of several terms' positional postings, read as if they were one
/// term. A document's frequency is the total over all terms, and its
/// positions come back in ascending order.
pub struct MultiTermPositions {
    cursors: Vec<SegmentTermPositions>,
    queue: PriorityQueue<usize>,
    buffer: PositionBuffer,
    doc: DocId,
    freq: u32,
}

impl MultiTermPositions {
    pub fn new(reader: &SegmentReader, terms: &[Term]) -> Result<Self> {
        let mut cursors = Vec::with_capacity(terms.len());
        for term in terms {
            cursors.push(reader.term_positions(term)?);
        }
        let mut live = Vec::with_capacity(cursors.len());
        for (i, cursor) in cursors.iter_mut().enumerate() {
            if cursor.next()? {
                live.push(i);
            }
        }
        let mut queue = PriorityQueue::new(cursors.len());
        for i in live {
            queue.put(i, |a, b| cursors[*a].doc() < cursors[*b].doc());
        }
        Ok(MultiTermPositions {
            cursors,
            queue,
            buffer: PositionBuffer::default(),
            doc: 0,
            freq: 0,
        })
    }
}

impl DocIterator for MultiTermPositions {
    fn next(&mut self) -> Result<bool> {
        let cursors = &mut self.cursors;
        let Some(&top) = self.queue.top() else {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        };

        self.buffer.clear();
        self.doc = cursors[top].doc();
        while let Some(&top) = self.queue.top() {
            if cursors[top].doc() != self.doc {
                break;
            }
            let cursor = &mut cursors[top];
            for _ in 0..cursor.freq() {
                self.buffer.push(cursor.next_position()?);
            }
            if cursor.next()? {
                self.queue.adjust_top(|a, b| cursors[*a].doc() < cursors[*b].doc());
            } else {
                self.queue.pop(|a, b| cursors[*a].doc() < cursors[*b].doc());
            }
        }
        self.buffer.sort();
        self.freq = self.buffer.len() as u32;
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        let cursors = &mut self.cursors;
        while let Some(&top) = self.queue.top() {
            if cursors[top].doc() >= target {
                break;
            }
            self.queue.pop(|a, b| cursors[*a].doc() < cursors[*b].doc());
            if cursors[top].skip_to(target)? {
                self.queue.put(top, |a, b| cursors[*a].doc() < cursors[*b].doc());
            }
        }
        self.next()
    }

    fn doc(&self) -> DocId {
        self.doc
    }
}

impl TermDocs for MultiTermPositions {
    fn freq(&self) -> u32 {
        self.freq
    }

    fn read(&mut self, _docs: &mut [DocId], _freqs: &mut [u32]) -> Result<usize> {
        Err(Error::unsupported("bulk read of merged term positions"))
    }
}

impl TermPositions for MultiTermPositions {
    fn next_position(&mut self) -> Result<u32> {
        self.buffer.next().ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidState,
                format!("all positions of doc {} already read", self.doc),
            )
        })
    }
}
