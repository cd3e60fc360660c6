use std::cmp::Ordering;

use crate::core::error::Result;
use crate::core::priority_queue::PriorityQueue;
use crate::core::types::DocId;
use crate::search::results::{FieldDoc, ScoreDoc, TopDocs, TopFieldDocs, hit_less};
use crate::search::sort::{KeySource, Sort};
use crate::storage::segment_reader::SegmentReader;

/// Receives every matching document of a search.
pub trait HitCollector {
    /// Called before the hits of each segment. `doc_base` is the index-wide
    /// number of the segment's first document.
    fn set_segment(&mut self, _reader: &SegmentReader, _doc_base: DocId) -> Result<()> {
        Ok(())
    }

    /// `doc` is index-wide.
    fn collect(&mut self, doc: DocId, score: f32);
}

impl<F: FnMut(DocId, f32)> HitCollector for F {
    fn collect(&mut self, doc: DocId, score: f32) {
        self(doc, score)
    }
}

/// Keeps the `n` best scoring hits.
pub struct TopDocsCollector {
    queue: PriorityQueue<ScoreDoc>,
    size: usize,
    total_hits: usize,
    min_score: f32,
}

impl TopDocsCollector {
    pub fn new(size: usize) -> Self {
        TopDocsCollector {
            queue: PriorityQueue::new(size),
            size,
            total_hits: 0,
            min_score: 0.0,
        }
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn into_top_docs(mut self) -> TopDocs {
        let mut score_docs = Vec::with_capacity(self.queue.size());
        while let Some(hit) = self.queue.pop(hit_less) {
            score_docs.push(hit);
        }
        score_docs.reverse();
        TopDocs {
            total_hits: self.total_hits,
            max_score: score_docs.first().map_or(0.0, |d| d.score),
            score_docs,
        }
    }
}

impl HitCollector for TopDocsCollector {
    fn collect(&mut self, doc: DocId, score: f32) {
        if score <= 0.0 {
            return;
        }
        self.total_hits += 1;
        if self.queue.size() < self.size || score >= self.min_score {
            self.queue.insert(ScoreDoc { doc, score }, hit_less);
            if let Some(top) = self.queue.top() {
                self.min_score = top.score;
            }
        }
    }
}

/// Keeps the `n` first hits under a [`Sort`], ties broken by document
/// number.
pub struct TopFieldCollector {
    sort: Sort,
    sources: Vec<KeySource>,
    doc_base: DocId,
    queue: PriorityQueue<FieldDoc>,
    total_hits: usize,
    max_score: f32,
}

impl TopFieldCollector {
    pub fn new(sort: Sort, size: usize) -> Self {
        TopFieldCollector {
            sort,
            sources: Vec::new(),
            doc_base: 0,
            queue: PriorityQueue::new(size),
            total_hits: 0,
            max_score: 1.0,
        }
    }

    /// Hits in sort order. Scores are divided by the best score when it
    /// exceeds 1.
    pub fn into_top_field_docs(mut self) -> TopFieldDocs {
        let sort = &self.sort;
        let less = |a: &FieldDoc, b: &FieldDoc| field_doc_less(sort, a, b);
        let mut field_docs = Vec::with_capacity(self.queue.size());
        while let Some(hit) = self.queue.pop(less) {
            field_docs.push(hit);
        }
        field_docs.reverse();
        if self.max_score > 1.0 {
            for hit in field_docs.iter_mut() {
                hit.score /= self.max_score;
            }
        }
        TopFieldDocs {
            total_hits: self.total_hits,
            field_docs,
            sort_fields: self.sort.fields,
            max_score: self.max_score,
        }
    }
}

fn field_doc_less(sort: &Sort, a: &FieldDoc, b: &FieldDoc) -> bool {
    match sort.compare(&a.fields, &b.fields) {
        Ordering::Equal => a.doc > b.doc,
        ordering => ordering == Ordering::Greater,
    }
}

impl HitCollector for TopFieldCollector {
    fn set_segment(&mut self, reader: &SegmentReader, doc_base: DocId) -> Result<()> {
        self.sources = self
            .sort
            .fields
            .iter()
            .map(|field| KeySource::resolve(reader, field))
            .collect::<Result<_>>()?;
        self.doc_base = doc_base;
        Ok(())
    }

    fn collect(&mut self, doc: DocId, score: f32) {
        if score <= 0.0 {
            return;
        }
        self.total_hits += 1;
        self.max_score = self.max_score.max(score);
        let local = doc - self.doc_base;
        let fields = self.sources.iter().map(|s| s.value(local, doc, score)).collect();
        let sort = &self.sort;
        self.queue
            .insert(FieldDoc { doc, score, fields }, |a, b| field_doc_less(sort, a, b));
    }
}
