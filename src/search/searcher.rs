use std::sync::Arc;
use std::time::Instant;

use roaring::RoaringBitmap;

use crate::core::config::IndexConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};
use crate::index::term::Term;
use crate::index::term_vectors::SegmentTermVector;
use crate::query::ast::Query;
use crate::query::weight::{Weight, create_weight};
use crate::scoring::similarity::{DefaultSimilarity, Similarity};
use crate::search::collector::{HitCollector, TopDocsCollector, TopFieldCollector};
use crate::search::filter::Filter;
use crate::search::results::{TopDocs, TopFieldDocs};
use crate::search::sort::Sort;
use crate::storage::directory::Directory;
use crate::storage::segment::SegmentInfos;
use crate::storage::segment_reader::SegmentReader;

/// Searches the segments of one index as a single document space.
///
/// Segment `i` holds index-wide documents `starts[i]..starts[i + 1]`.
/// Statistics used for weighting (document frequency, `max_doc`) are summed
/// over all segments so scores do not depend on segment boundaries.
pub struct IndexSearcher {
    readers: Vec<Arc<SegmentReader>>,
    starts: Vec<DocId>,
    similarity: Arc<dyn Similarity>,
    max_clause_count: usize,
}

impl IndexSearcher {
    /// Opens every segment of the last commit in `directory`.
    pub fn open(directory: Arc<dyn Directory>) -> Result<Self> {
        Self::open_with_config(directory, &IndexConfig::default())
    }

    pub fn open_with_config(directory: Arc<dyn Directory>, config: &IndexConfig) -> Result<Self> {
        let infos = SegmentInfos::read(directory.as_ref())?;
        let readers = infos
            .segments
            .iter()
            .map(|info| SegmentReader::open(Arc::clone(&directory), info).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        log::debug!(
            "opened searcher over {} segments, version {}",
            readers.len(),
            infos.version
        );
        Ok(Self::from_readers(readers).with_max_clause_count(config.max_clause_count))
    }

    pub fn from_readers(readers: Vec<Arc<SegmentReader>>) -> Self {
        let mut starts = Vec::with_capacity(readers.len() + 1);
        let mut max_doc: DocId = 0;
        for reader in &readers {
            starts.push(max_doc);
            max_doc += reader.max_doc();
        }
        starts.push(max_doc);
        IndexSearcher {
            readers,
            starts,
            similarity: Arc::new(DefaultSimilarity),
            max_clause_count: IndexConfig::default().max_clause_count,
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_max_clause_count(mut self, max_clause_count: usize) -> Self {
        self.max_clause_count = max_clause_count;
        self
    }

    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    pub fn max_clause_count(&self) -> usize {
        self.max_clause_count
    }

    pub fn readers(&self) -> &[Arc<SegmentReader>] {
        &self.readers
    }

    /// One more than the largest document number, deleted documents included.
    pub fn max_doc(&self) -> u32 {
        self.starts.last().copied().unwrap_or(0)
    }

    pub fn num_docs(&self) -> u32 {
        self.readers.iter().map(|r| r.num_docs()).sum()
    }

    /// Number of documents containing `term`, summed over all segments.
    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        let mut total = 0;
        for reader in &self.readers {
            total += reader.doc_freq(term)?;
        }
        Ok(total)
    }

    /// Segment holding index-wide document `doc`, and its first document.
    fn segment_of(&self, doc: DocId) -> Result<(usize, DocId)> {
        if doc >= self.max_doc() {
            return Err(Error::invalid_argument(format!(
                "document {} out of range, max_doc is {}",
                doc,
                self.max_doc()
            )));
        }
        // last segment starting at or before doc; empty segments share a start
        let i = self.starts.partition_point(|&start| start <= doc) - 1;
        Ok((i, self.starts[i]))
    }

    /// Stored fields of index-wide document `doc`.
    pub fn doc(&self, doc: DocId) -> Result<Document> {
        let (i, base) = self.segment_of(doc)?;
        self.readers[i].document(doc - base)
    }

    /// Term vector of `field` in index-wide document `doc`.
    pub fn term_freq_vector(&self, doc: DocId, field: &str) -> Result<Option<SegmentTermVector>> {
        let (i, base) = self.segment_of(doc)?;
        self.readers[i].term_freq_vector(doc - base, field)
    }

    pub fn rewrite(&self, query: &Query) -> Result<Query> {
        query.rewrite(self)
    }

    /// Rewrites `query` and builds its normalized weight.
    pub fn create_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        let rewritten = self.rewrite(query)?;
        let mut weight = create_weight(&rewritten, self)?;
        let sum = weight.sum_of_squared_weights();
        let mut norm = self.similarity.query_norm(sum);
        if !norm.is_finite() {
            norm = 1.0;
        }
        weight.normalize(norm);
        Ok(weight)
    }

    /// Feeds every match of `query` that passes `filter` to `collector`.
    pub fn search_with(&self, query: &Query, filter: Option<&dyn Filter>, collector: &mut dyn HitCollector) -> Result<()> {
        let weight = self.create_weight(query)?;
        for (reader, &base) in self.readers.iter().zip(&self.starts) {
            let Some(mut scorer) = weight.scorer(reader)? else {
                continue;
            };
            let bits = filter.map(|f| f.bits(reader)).transpose()?;
            collector.set_segment(reader, base)?;
            let mut segment = SegmentCollector {
                inner: &mut *collector,
                base,
                bits: bits.as_ref(),
            };
            scorer.score_all(&mut segment)?;
        }
        Ok(())
    }

    /// The `n` best scoring documents.
    pub fn search(&self, query: &Query, filter: Option<&dyn Filter>, n: usize) -> Result<TopDocs> {
        let start = Instant::now();
        let mut collector = TopDocsCollector::new(n);
        self.search_with(query, filter, &mut collector)?;
        let top = collector.into_top_docs();
        log::debug!(
            "{} matched {} documents in {:?}",
            query,
            top.total_hits,
            start.elapsed()
        );
        Ok(top)
    }

    /// The first `n` documents under `sort`.
    pub fn search_sorted(&self, query: &Query, filter: Option<&dyn Filter>, n: usize, sort: &Sort) -> Result<TopFieldDocs> {
        let mut collector = TopFieldCollector::new(sort.clone(), n);
        self.search_with(query, filter, &mut collector)?;
        Ok(collector.into_top_field_docs())
    }

    /// Releases cached per-segment data.
    pub fn close(&self) {
        for reader in &self.readers {
            reader.close();
        }
    }
}

/// Maps one segment's hits into the index-wide document space.
struct SegmentCollector<'a> {
    inner: &'a mut dyn HitCollector,
    base: DocId,
    bits: Option<&'a RoaringBitmap>,
}

impl HitCollector for SegmentCollector<'_> {
    fn collect(&mut self, doc: DocId, score: f32) {
        if self.bits.is_none_or(|bits| bits.contains(doc)) {
            self.inner.collect(self.base + doc, score);
        }
    }
}
