use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use parking_lot::RwLock;
use roaring::RoaringBitmap;

use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};
use crate::index::deletions::{read_deletions, write_deletions};
use crate::index::field_cache::FieldCache;
use crate::index::field_infos::FieldInfos;
use crate::index::iterator::DocIterator;
use crate::index::norms::{fake_norms, read_norms};
use crate::index::segment_term_docs::{SegmentTermDocs, SegmentTermPositions};
use crate::index::stored_fields::StoredFieldsReader;
use crate::index::term::{Term, TermInfo};
use crate::index::term_dictionary::{TermCursor, TermDictionary};
use crate::index::term_vectors::{SegmentTermVector, TermVectorsReader};
use crate::storage::compound::CompoundFileReader;
use crate::storage::directory::Directory;
use crate::storage::index_input::IndexInput;
use crate::storage::segment::SegmentInfo;

/// Read access to one immutable segment.
///
/// Everything but the deletion bitmap is fixed at open. Postings readers
/// snapshot the bitmap when created, so deleting a document does not
/// disturb iterations already in flight.
pub struct SegmentReader {
    info: SegmentInfo,
    directory: Arc<dyn Directory>,
    field_infos: Arc<FieldInfos>,
    terms: TermDictionary,
    freq_stream: IndexInput,
    prox_stream: IndexInput,
    stored: StoredFieldsReader,
    term_vectors: Option<TermVectorsReader>,
    norms: HashMap<String, Bytes>,
    fake_norms: OnceLock<Bytes>,
    deleted: RwLock<Option<Arc<RoaringBitmap>>>,
    deletions_dirty: AtomicBool,
    field_cache: FieldCache,
}

impl SegmentReader {
    pub fn open(directory: Arc<dyn Directory>, info: &SegmentInfo) -> Result<Self> {
        let segment = info.name.as_str();
        let files: Arc<dyn Directory> = if info.compound {
            Arc::new(CompoundFileReader::open(directory.as_ref(), &info.cfs_file())?)
        } else {
            Arc::clone(&directory)
        };

        let field_infos = Arc::new(FieldInfos::read(files.as_ref(), &format!("{}.fnm", segment))?);
        let terms = TermDictionary::open(files.as_ref(), segment, Arc::clone(&field_infos))?;
        let freq_stream = files.open_input(&format!("{}.frq", segment))?;
        let prox_stream = files.open_input(&format!("{}.prx", segment))?;
        let stored = StoredFieldsReader::open(files.as_ref(), segment)?;
        if stored.size() != info.doc_count {
            return Err(Error::corruption(format!(
                "segment {} stores {} documents, expected {}",
                segment,
                stored.size(),
                info.doc_count
            )));
        }

        let term_vectors = if field_infos.has_vectors() {
            let reader = TermVectorsReader::open(files.as_ref(), segment, Arc::clone(&field_infos))?;
            if reader.size() != info.doc_count {
                return Err(Error::corruption(format!(
                    "segment {} has term vectors for {} documents, expected {}",
                    segment,
                    reader.size(),
                    info.doc_count
                )));
            }
            Some(reader)
        } else {
            None
        };

        let mut norms = HashMap::new();
        for field in field_infos.iter().filter(|f| f.indexed) {
            if let Some(bytes) = read_norms(files.as_ref(), segment, field.number, info.doc_count)? {
                norms.insert(field.name.clone(), bytes);
            }
        }

        let deleted = if directory.file_exists(&info.del_file()) {
            Some(Arc::new(read_deletions(directory.as_ref(), &info.del_file())?))
        } else {
            None
        };

        log::debug!(
            "opened segment {} ({} docs, {} terms, {} deleted)",
            segment,
            info.doc_count,
            terms.size(),
            deleted.as_ref().map_or(0, |d| d.len())
        );

        Ok(SegmentReader {
            info: info.clone(),
            directory,
            field_infos,
            terms,
            freq_stream,
            prox_stream,
            stored,
            term_vectors,
            norms,
            fake_norms: OnceLock::new(),
            deleted: RwLock::new(deleted),
            deletions_dirty: AtomicBool::new(false),
            field_cache: FieldCache::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn segment_info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn max_doc(&self) -> u32 {
        self.info.doc_count
    }

    pub fn num_docs(&self) -> u32 {
        let deleted = self.deleted.read().as_ref().map_or(0, |d| d.len() as u32);
        self.max_doc() - deleted
    }

    pub fn has_deletions(&self) -> bool {
        self.deleted.read().as_ref().is_some_and(|d| !d.is_empty())
    }

    pub fn is_deleted(&self, doc: DocId) -> bool {
        self.deleted.read().as_ref().is_some_and(|d| d.contains(doc))
    }

    /// Snapshot of the deletion bitmap.
    pub fn deleted_docs(&self) -> Option<Arc<RoaringBitmap>> {
        self.deleted.read().clone()
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.terms
    }

    pub fn field_cache(&self) -> &FieldCache {
        &self.field_cache
    }

    pub fn document(&self, doc: DocId) -> Result<Document> {
        if self.is_deleted(doc) {
            return Err(Error::invalid_argument(format!(
                "document {} of segment {} is deleted",
                doc,
                self.name()
            )));
        }
        self.stored.document(doc)
    }

    /// Term vector of `field` in document `doc`. `None` when the field
    /// stores no vectors or the document has no terms in it.
    pub fn term_freq_vector(&self, doc: DocId, field: &str) -> Result<Option<SegmentTermVector>> {
        match &self.term_vectors {
            Some(reader) => reader.get(doc, field),
            None => self.check_doc(doc).map(|_| None),
        }
    }

    /// Every term vector of document `doc`, in field number order.
    pub fn term_freq_vectors(&self, doc: DocId) -> Result<Vec<SegmentTermVector>> {
        match &self.term_vectors {
            Some(reader) => reader.get_all(doc),
            None => self.check_doc(doc).map(|_| Vec::new()),
        }
    }

    fn check_doc(&self, doc: DocId) -> Result<()> {
        if doc >= self.max_doc() {
            return Err(Error::invalid_argument(format!(
                "document {} out of range for segment {}",
                doc,
                self.name()
            )));
        }
        Ok(())
    }

    /// Stored norms of `field`, if it has any.
    pub fn norms(&self, field: &str) -> Option<&Bytes> {
        self.norms.get(field)
    }

    /// Norms for scoring: the stored ones, or a neutral 1.0 per document.
    pub fn scoring_norms(&self, field: &str) -> Bytes {
        match self.norms.get(field) {
            Some(norms) => norms.clone(),
            None => self.fake_norms.get_or_init(|| fake_norms(self.max_doc())).clone(),
        }
    }

    pub fn terms(&self) -> TermCursor {
        self.terms.iterate()
    }

    pub fn terms_from(&self, term: &Term) -> Result<TermCursor> {
        self.terms.iterate_from(term)
    }

    pub fn term_info(&self, term: &Term) -> Result<Option<TermInfo>> {
        let mut cursor = self.terms.cursor();
        self.terms.lookup(&mut cursor, term)
    }

    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        Ok(self.term_info(term)?.map_or(0, |info| info.doc_freq))
    }

    /// Unpositioned postings reader; `seek` it to a term.
    pub fn term_docs_reader(&self) -> SegmentTermDocs {
        SegmentTermDocs::new(self.freq_stream.clone(), self.deleted_docs(), self.terms.skip_interval())
    }

    pub fn term_positions_reader(&self) -> SegmentTermPositions {
        SegmentTermPositions::new(
            self.freq_stream.clone(),
            self.prox_stream.clone(),
            self.deleted_docs(),
            self.terms.skip_interval(),
        )
    }

    pub fn term_docs(&self, term: &Term) -> Result<SegmentTermDocs> {
        let mut docs = self.term_docs_reader();
        docs.seek(self.term_info(term)?)?;
        Ok(docs)
    }

    pub fn term_positions(&self, term: &Term) -> Result<SegmentTermPositions> {
        let mut positions = self.term_positions_reader();
        positions.seek(self.term_info(term)?)?;
        Ok(positions)
    }

    pub fn delete_document(&self, doc: DocId) -> Result<()> {
        if doc >= self.max_doc() {
            return Err(Error::invalid_argument(format!(
                "document {} out of range for segment {}",
                doc,
                self.name()
            )));
        }
        let mut deleted = self.deleted.write();
        let bits = deleted.get_or_insert_with(|| Arc::new(RoaringBitmap::new()));
        if Arc::make_mut(bits).insert(doc) {
            self.deletions_dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Deletes every live document containing `term`; returns how many.
    pub fn delete_documents(&self, term: &Term) -> Result<u32> {
        let mut docs = self.term_docs(term)?;
        let mut count = 0;
        while docs.next()? {
            self.delete_document(docs.doc())?;
            count += 1;
        }
        Ok(count)
    }

    /// Writes the deletion bitmap if it changed since open.
    pub fn commit_deletions(&self) -> Result<()> {
        if !self.deletions_dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let snapshot = self.deleted_docs();
        if let Some(bits) = snapshot {
            if let Err(e) = write_deletions(self.directory.as_ref(), &self.info.del_file(), &bits) {
                self.deletions_dirty.store(true, Ordering::Release);
                return Err(e);
            }
            log::debug!("segment {} now has {} deletions", self.name(), bits.len());
        }
        Ok(())
    }

    /// Drops cached field values. Readers stay usable.
    pub fn close(&self) {
        self.field_cache.clear();
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("name", &self.info.name)
            .field("max_doc", &self.max_doc())
            .finish()
    }
}

