use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Document;
use crate::index::merger::SegmentMerger;
use crate::index::term::Term;
use crate::scoring::similarity::{DefaultSimilarity, Similarity};
use crate::storage::directory::{Directory, DirectoryLock};
use crate::storage::merge_policy::{LogMergePolicy, MergePolicy};
use crate::storage::segment::{SegmentInfo, SegmentInfos};
use crate::storage::segment_reader::SegmentReader;
use crate::storage::segment_writer::SegmentWriter;

pub const WRITE_LOCK: &str = "write.lock";

/// Single writer of an index.
///
/// Documents are buffered and flushed as a new segment every
/// `max_buffered_docs` documents; after each flush the merge policy may fold
/// recent segments together. Holds `write.lock` until closed or dropped.
pub struct IndexWriter {
    directory: Arc<dyn Directory>,
    config: IndexConfig,
    analyzer: Arc<Analyzer>,
    similarity: Arc<dyn Similarity>,
    merge_policy: Box<dyn MergePolicy>,
    segment_infos: SegmentInfos,
    buffered: Vec<Document>,
    readers: HashMap<String, Arc<SegmentReader>>,
    deletable: Vec<String>,
    _lock: Box<dyn DirectoryLock>,
}

impl IndexWriter {
    /// Opens the index in `directory`, creating an empty one if there is
    /// no commit yet.
    pub fn open(directory: Arc<dyn Directory>, config: IndexConfig, analyzer: Arc<Analyzer>) -> Result<Self> {
        config.validate()?;
        let lock = directory.obtain_lock(WRITE_LOCK)?;
        let segment_infos = if SegmentInfos::exists(directory.as_ref()) {
            SegmentInfos::read(directory.as_ref())?
        } else {
            let mut infos = SegmentInfos::new();
            infos.write(directory.as_ref())?;
            infos
        };
        log::debug!(
            "opened index writer on {} segments ({} docs)",
            segment_infos.segments.len(),
            segment_infos.total_docs()
        );

        Ok(IndexWriter {
            directory,
            merge_policy: Box::new(LogMergePolicy::from_config(&config)),
            config,
            analyzer,
            similarity: Arc::new(DefaultSimilarity),
            segment_infos,
            buffered: Vec::new(),
            readers: HashMap::new(),
            deletable: Vec::new(),
            _lock: lock,
        })
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_merge_policy(mut self, policy: Box<dyn MergePolicy>) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn segment_infos(&self) -> &SegmentInfos {
        &self.segment_infos
    }

    /// Documents in committed segments, deleted ones included, plus the
    /// buffered ones.
    pub fn doc_count(&self) -> u64 {
        self.segment_infos.total_docs() + self.buffered.len() as u64
    }

    pub fn add_document(&mut self, doc: Document) -> Result<()> {
        self.buffered.push(doc);
        if self.buffered.len() >= self.config.max_buffered_docs {
            self.flush()?;
        }
        Ok(())
    }

    /// Marks every document containing `term` deleted, buffered documents
    /// included. Deletions reach disk on `commit`.
    pub fn delete_documents(&mut self, term: &Term) -> Result<u32> {
        self.flush()?;
        let mut count = 0;
        for info in self.segment_infos.segments.clone() {
            count += self.reader(&info)?.delete_documents(term)?;
        }
        log::debug!("deleted {} documents matching {}", count, term);
        Ok(count)
    }

    /// Writes buffered documents as a new segment, runs any merges the
    /// policy asks for and commits the segment list.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        let name = self.segment_infos.next_segment_name();
        let docs = std::mem::take(&mut self.buffered);
        let count = SegmentWriter::new(
            self.directory.as_ref(),
            &self.analyzer,
            self.similarity.as_ref(),
            &self.config,
        )
        .write(&name, &docs)?;
        self.segment_infos
            .segments
            .push(SegmentInfo::new(&name, count, self.config.use_compound_file));
        self.segment_infos.write(self.directory.as_ref())?;

        self.maybe_merge()
    }

    fn maybe_merge(&mut self) -> Result<()> {
        while let Some(range) = self.merge_policy.find_merge(&self.segment_infos.segments) {
            self.merge_segments(range)?;
        }
        Ok(())
    }

    /// Merges everything down to a single segment without deletions.
    pub fn optimize(&mut self) -> Result<()> {
        self.flush()?;
        while self.needs_optimize()? {
            let len = self.segment_infos.segments.len();
            let start = len.saturating_sub(self.config.merge_factor);
            self.merge_segments(start..len)?;
        }
        log::info!(
            "optimized index to {} segment(s), {} docs",
            self.segment_infos.segments.len(),
            self.segment_infos.total_docs()
        );
        Ok(())
    }

    fn needs_optimize(&mut self) -> Result<bool> {
        match self.segment_infos.segments.as_slice() {
            [] => Ok(false),
            [info] => {
                let info = info.clone();
                Ok(self.reader(&info)?.has_deletions() || info.compound != self.config.use_compound_file)
            }
            _ => Ok(true),
        }
    }

    /// Flushes, writes pending deletions and commits the segment list.
    pub fn commit(&mut self) -> Result<()> {
        self.flush()?;
        for reader in self.readers.values() {
            reader.commit_deletions()?;
        }
        self.segment_infos.write(self.directory.as_ref())?;
        self.delete_files();
        log::info!(
            "committed version {} ({} segments, {} docs)",
            self.segment_infos.version,
            self.segment_infos.segments.len(),
            self.segment_infos.total_docs()
        );
        Ok(())
    }

    /// Commits and releases the write lock.
    pub fn close(mut self) -> Result<()> {
        self.commit()?;
        for reader in self.readers.values() {
            reader.close();
        }
        Ok(())
    }

    fn reader(&mut self, info: &SegmentInfo) -> Result<Arc<SegmentReader>> {
        if let Some(reader) = self.readers.get(&info.name) {
            return Ok(Arc::clone(reader));
        }
        let reader = Arc::new(SegmentReader::open(Arc::clone(&self.directory), info)?);
        self.readers.insert(info.name.clone(), Arc::clone(&reader));
        Ok(reader)
    }

    fn merge_segments(&mut self, range: Range<usize>) -> Result<()> {
        if range.is_empty() || range.end > self.segment_infos.segments.len() {
            return Err(Error::invalid_argument(format!("bad merge range {:?}", range)));
        }
        let sources: Vec<SegmentInfo> = self.segment_infos.segments[range.clone()].to_vec();
        let mut readers = Vec::with_capacity(sources.len());
        for info in &sources {
            readers.push(self.reader(info)?);
        }

        let name = self.segment_infos.next_segment_name();
        let count = {
            let mut merger = SegmentMerger::new(self.directory.as_ref(), &name, &self.config);
            for reader in readers {
                merger.add(reader);
            }
            let count = merger.merge()?;
            if self.config.use_compound_file {
                merger.create_compound_file()?;
            }
            count
        };

        let start = range.start;
        self.segment_infos.segments.drain(range);
        self.segment_infos
            .segments
            .insert(start, SegmentInfo::new(&name, count, self.config.use_compound_file));
        self.segment_infos.write(self.directory.as_ref())?;

        for info in &sources {
            if let Some(reader) = self.readers.remove(&info.name) {
                reader.close();
            }
            self.deletable.extend(info.files(self.directory.as_ref())?);
        }
        self.delete_files();
        log::debug!("merged {} segments into {} ({} docs)", sources.len(), name, count);
        Ok(())
    }

    /// Removes files of retired segments; failures are retried on the next
    /// commit.
    fn delete_files(&mut self) {
        let directory = Arc::clone(&self.directory);
        self.deletable.retain(|file| match directory.delete_file(file) {
            Ok(()) => false,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                log::warn!("could not delete {}: {}", file, e);
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Field;
    use crate::storage::ram_directory::RamDirectory;

    fn writer(dir: &Arc<dyn Directory>, config: IndexConfig) -> IndexWriter {
        IndexWriter::open(Arc::clone(dir), config, Arc::new(Analyzer::standard())).unwrap()
    }

    fn doc(id: u32) -> Document {
        Document::new()
            .with(Field::keyword("id", &id.to_string()))
            .with(Field::text("body", if id % 2 == 0 { "even number" } else { "odd number" }))
    }

    #[test]
    fn second_writer_is_locked_out() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let first = writer(&dir, IndexConfig::default());
        let second = IndexWriter::open(Arc::clone(&dir), IndexConfig::default(), Arc::new(Analyzer::standard()));
        assert_eq!(second.err().map(|e| e.kind()), Some(ErrorKind::InvalidState));
        first.close().unwrap();
        assert!(IndexWriter::open(Arc::clone(&dir), IndexConfig::default(), Arc::new(Analyzer::standard())).is_ok());
    }

    #[test]
    fn flushes_and_merges_by_level() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = IndexConfig {
            max_buffered_docs: 2,
            merge_factor: 3,
            ..IndexConfig::default()
        };
        let mut w = writer(&dir, config);
        for i in 0..12 {
            w.add_document(doc(i)).unwrap();
        }
        // 6 flushes of 2 docs: two level-0 merges of 3 segments give [6, 6]
        let counts: Vec<u32> = w.segment_infos().segments.iter().map(|s| s.doc_count).collect();
        assert_eq!(counts, vec![6, 6]);
        assert_eq!(w.doc_count(), 12);
        w.close().unwrap();

        let infos = SegmentInfos::read(dir.as_ref()).unwrap();
        assert_eq!(infos.total_docs(), 12);
        let live: Vec<String> = infos.segments.iter().map(|s| s.cfs_file()).collect();
        let mut expected = live.clone();
        expected.push("segments".to_string());
        expected.sort();
        let mut files = dir.list().unwrap();
        files.retain(|f| f != WRITE_LOCK);
        files.sort();
        assert_eq!(files, expected);
    }

    #[test]
    fn deletions_commit_and_optimize_away() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = IndexConfig {
            max_buffered_docs: 3,
            use_compound_file: false,
            ..IndexConfig::default()
        };
        let mut w = writer(&dir, config);
        for i in 0..7 {
            w.add_document(doc(i)).unwrap();
        }
        assert_eq!(w.delete_documents(&Term::new("body", "odd")).unwrap(), 3);
        w.commit().unwrap();
        assert!(dir.file_exists("_0.del"));

        w.optimize().unwrap();
        assert_eq!(w.segment_infos().segments.len(), 1);
        assert_eq!(w.segment_infos().total_docs(), 4);
        w.close().unwrap();
        assert!(!dir.file_exists("_0.del"));
    }
}
