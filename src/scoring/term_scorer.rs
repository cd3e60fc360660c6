use std::sync::Arc;

use bytes::Bytes;

use crate::core::error::Result;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::{DocIterator, TermDocs};
use crate::index::segment_term_docs::SegmentTermDocs;
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::{Similarity, decode_norm};

const BUFFER_SIZE: usize = 32;
const SCORE_CACHE_SIZE: usize = 32;

/// Scores the documents of a single term.
///
/// Postings are pulled `BUFFER_SIZE` at a time through the bulk `read`, and
/// `tf(freq) * weight` is precomputed for small frequencies.
pub struct TermScorer<T: TermDocs = SegmentTermDocs> {
    postings: T,
    norms: Bytes,
    weight: f32,
    similarity: Arc<dyn Similarity>,
    doc: DocId,
    docs: [DocId; BUFFER_SIZE],
    freqs: [u32; BUFFER_SIZE],
    current: usize,
    upcoming: usize,
    buffered: usize,
    score_cache: [f32; SCORE_CACHE_SIZE],
}

impl<T: TermDocs> TermScorer<T> {
    pub fn new(postings: T, norms: Bytes, weight: f32, similarity: Arc<dyn Similarity>) -> Self {
        let mut score_cache = [0f32; SCORE_CACHE_SIZE];
        for (freq, slot) in score_cache.iter_mut().enumerate() {
            *slot = similarity.tf(freq as f32) * weight;
        }
        TermScorer {
            postings,
            norms,
            weight,
            similarity,
            doc: 0,
            docs: [0; BUFFER_SIZE],
            freqs: [0; BUFFER_SIZE],
            current: 0,
            upcoming: 0,
            buffered: 0,
            score_cache,
        }
    }
}

impl<T: TermDocs> DocIterator for TermScorer<T> {
    fn next(&mut self) -> Result<bool> {
        if self.upcoming >= self.buffered {
            self.buffered = self.postings.read(&mut self.docs, &mut self.freqs)?;
            self.upcoming = 0;
            if self.buffered == 0 {
                self.doc = NO_MORE_DOCS;
                return Ok(false);
            }
        }
        self.current = self.upcoming;
        self.upcoming += 1;
        self.doc = self.docs[self.current];
        Ok(true)
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        while self.upcoming < self.buffered {
            let i = self.upcoming;
            self.upcoming += 1;
            if self.docs[i] >= target {
                self.current = i;
                self.doc = self.docs[i];
                return Ok(true);
            }
        }

        if !self.postings.skip_to(target)? {
            self.doc = NO_MORE_DOCS;
            return Ok(false);
        }
        self.docs[0] = self.postings.doc();
        self.freqs[0] = self.postings.freq();
        self.doc = self.docs[0];
        self.current = 0;
        self.upcoming = 1;
        self.buffered = 1;
        Ok(true)
    }

    fn doc(&self) -> DocId {
        self.doc
    }
}

impl<T: TermDocs> Scorer for TermScorer<T> {
    fn score(&self) -> f32 {
        let freq = self.freqs[self.current];
        let raw = match self.score_cache.get(freq as usize) {
            Some(&cached) => cached,
            None => self.similarity.tf(freq as f32) * self.weight,
        };
        let norm = self.norms.get(self.doc as usize).copied().unwrap_or(0);
        raw * decode_norm(norm)
    }
}
