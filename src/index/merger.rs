use std::sync::Arc;

use crate::core::config::IndexConfig;
use crate::core::error::{Error, Result};
use crate::core::priority_queue::PriorityQueue;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::field_infos::FieldInfos;
use crate::index::iterator::{DocIterator, TermDocs, TermPositions};
use crate::index::norms::write_norms;
use crate::index::postings_writer::PostingsWriter;
use crate::index::segment_term_docs::SegmentTermPositions;
use crate::index::stored_fields::StoredFieldsWriter;
use crate::index::term_dictionary::{TermCursor, TermDictionaryWriter};
use crate::index::term_vectors::TermVectorsWriter;
use crate::storage::compound::pack_compound;
use crate::storage::directory::Directory;
use crate::storage::segment_reader::SegmentReader;
use crate::storage::segment_writer::segment_files;

/// Merge cursor over one source segment.
struct MergeSource {
    base: DocId,
    doc_map: Option<Vec<DocId>>,
    terms: TermCursor,
    postings: SegmentTermPositions,
}

impl MergeSource {
    fn map(&self, doc: DocId) -> Result<DocId> {
        let local = match &self.doc_map {
            None => doc,
            Some(map) => match map.get(doc as usize) {
                Some(&mapped) if mapped != NO_MORE_DOCS => mapped,
                _ => return Err(Error::corruption(format!("deleted doc {} surfaced during merge", doc))),
            },
        };
        Ok(self.base + local)
    }
}

/// Removes the files it names on drop unless disarmed.
struct PartialFiles<'a> {
    directory: &'a dyn Directory,
    files: Vec<String>,
    armed: bool,
}

impl Drop for PartialFiles<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for file in self.files.iter().filter(|f| self.directory.file_exists(f)) {
            if let Err(e) = self.directory.delete_file(file) {
                log::warn!("could not remove partial merge file {}: {}", file, e);
            }
        }
    }
}

/// Folds several segments into one new segment.
///
/// Deleted documents are dropped and the survivors renumbered densely, in
/// source order. The sources are only read.
pub struct SegmentMerger<'a> {
    directory: &'a dyn Directory,
    segment: String,
    config: &'a IndexConfig,
    readers: Vec<Arc<SegmentReader>>,
    field_infos: Arc<FieldInfos>,
}

impl<'a> SegmentMerger<'a> {
    pub fn new(directory: &'a dyn Directory, segment: &str, config: &'a IndexConfig) -> Self {
        SegmentMerger {
            directory,
            segment: segment.to_string(),
            config,
            readers: Vec::new(),
            field_infos: Arc::new(FieldInfos::new()),
        }
    }

    pub fn add(&mut self, reader: Arc<SegmentReader>) {
        self.readers.push(reader);
    }

    /// Writes the merged segment and returns its document count. On error
    /// the partially written files are removed.
    pub fn merge(&mut self) -> Result<u32> {
        let mut field_infos = FieldInfos::new();
        for reader in &self.readers {
            field_infos.add_all(reader.field_infos());
        }
        self.field_infos = Arc::new(field_infos);

        let mut partial = PartialFiles {
            directory: self.directory,
            files: segment_files(&self.segment, &self.field_infos),
            armed: true,
        };

        self.field_infos.write(self.directory, &format!("{}.fnm", self.segment))?;
        let doc_count = self.merge_stored_fields()?;
        self.merge_terms()?;
        self.merge_norms()?;
        if self.field_infos.has_vectors() {
            self.merge_vectors()?;
        }

        partial.armed = false;
        log::debug!(
            "merged {} segments into {} ({} documents)",
            self.readers.len(),
            self.segment,
            doc_count
        );
        Ok(doc_count)
    }

    /// Packs the merged files into `<segment>.cfs`.
    pub fn create_compound_file(&self) -> Result<()> {
        let files = segment_files(&self.segment, &self.field_infos);
        let mut partial = PartialFiles {
            directory: self.directory,
            files: vec![format!("{}.cfs", self.segment)],
            armed: true,
        };
        pack_compound(self.directory, &self.segment, &files)?;
        partial.armed = false;
        Ok(())
    }

    fn merge_stored_fields(&self) -> Result<u32> {
        let mut writer = StoredFieldsWriter::new(self.directory, &self.segment)?;
        for reader in &self.readers {
            for doc in 0..reader.max_doc() {
                if !reader.is_deleted(doc) {
                    writer.add_document(&reader.document(doc)?)?;
                }
            }
        }
        let count = writer.count();
        writer.close()?;
        Ok(count)
    }

    fn merge_vectors(&self) -> Result<()> {
        let mut writer = TermVectorsWriter::new(self.directory, &self.segment, Arc::clone(&self.field_infos))?;
        for reader in &self.readers {
            for doc in 0..reader.max_doc() {
                if !reader.is_deleted(doc) {
                    writer.add_document(&reader.term_freq_vectors(doc)?)?;
                }
            }
        }
        writer.close()
    }

    fn open_sources(&self) -> Vec<MergeSource> {
        let mut sources = Vec::with_capacity(self.readers.len());
        let mut base = 0;
        for reader in &self.readers {
            let doc_map = reader.deleted_docs().filter(|d| !d.is_empty()).map(|deleted| {
                let mut next = 0;
                (0..reader.max_doc())
                    .map(|doc| {
                        if deleted.contains(doc) {
                            NO_MORE_DOCS
                        } else {
                            next += 1;
                            next - 1
                        }
                    })
                    .collect::<Vec<_>>()
            });
            sources.push(MergeSource {
                base,
                doc_map,
                terms: reader.terms(),
                postings: reader.term_positions_reader(),
            });
            base += reader.num_docs();
        }
        sources
    }

    fn merge_terms(&self) -> Result<()> {
        let mut postings = PostingsWriter::new(self.directory, &self.segment, self.config.skip_interval)?;
        let mut dictionary = TermDictionaryWriter::new(
            self.directory,
            &self.segment,
            Arc::clone(&self.field_infos),
            self.config.index_interval,
            self.config.skip_interval,
        )?;

        let mut sources = self.open_sources();
        let mut queue = PriorityQueue::new(sources.len());
        let less = |sources: &[MergeSource], a: &usize, b: &usize| {
            (sources[*a].terms.term(), *a) < (sources[*b].terms.term(), *b)
        };
        for i in 0..sources.len() {
            if sources[i].terms.next()? {
                queue.put(i, |a, b| less(&sources, a, b));
            }
        }

        let mut matches = Vec::with_capacity(sources.len());
        let mut positions = Vec::new();
        while let Some(first) = queue.pop(|a, b| less(&sources, a, b)) {
            let Some(term) = sources[first].terms.term().cloned() else {
                continue;
            };
            matches.clear();
            matches.push(first);
            while queue
                .top()
                .is_some_and(|&top| sources[top].terms.term() == Some(&term))
            {
                if let Some(next) = queue.pop(|a, b| less(&sources, a, b)) {
                    matches.push(next);
                }
            }

            postings.start_term();
            for &i in &matches {
                let source = &mut sources[i];
                source.postings.seek(Some(source.terms.info()))?;
                while source.postings.next()? {
                    let doc = source.map(source.postings.doc())?;
                    positions.clear();
                    for _ in 0..source.postings.freq() {
                        positions.push(source.postings.next_position()?);
                    }
                    postings.add_doc(doc, &positions)?;
                }
            }
            if let Some(info) = postings.finish_term()? {
                dictionary.add(term, info)?;
            }

            for &i in &matches {
                if sources[i].terms.next()? {
                    queue.put(i, |a, b| less(&sources, a, b));
                }
            }
        }

        postings.close()?;
        dictionary.close()
    }

    fn merge_norms(&self) -> Result<()> {
        for info in self.field_infos.iter().filter(|f| f.indexed) {
            let mut norms = Vec::new();
            for reader in &self.readers {
                let stored = reader.norms(&info.name);
                for doc in 0..reader.max_doc() {
                    if !reader.is_deleted(doc) {
                        norms.push(stored.map_or(0, |n| n[doc as usize]));
                    }
                }
            }
            write_norms(self.directory, &self.segment, info.number, &norms)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::Analyzer;
    use crate::core::types::{Document, Field, TermVector};
    use crate::index::term::Term;
    use crate::index::term_vectors::{TermFreqVector, TermPositionVector};
    use crate::scoring::similarity::DefaultSimilarity;
    use crate::storage::ram_directory::RamDirectory;
    use crate::storage::segment::SegmentInfo;
    use crate::storage::segment_writer::SegmentWriter;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn config() -> IndexConfig {
        IndexConfig {
            use_compound_file: false,
            skip_interval: 2,
            index_interval: 4,
            ..IndexConfig::default()
        }
    }

    fn segment(dir: &Arc<dyn Directory>, name: &str, texts: &[&str], config: &IndexConfig) -> Arc<SegmentReader> {
        let analyzer = Analyzer::whitespace();
        let docs: Vec<Document> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Document::new()
                    .with(Field::keyword("id", &format!("{}{}", name, i)))
                    .with(Field::text("body", t))
            })
            .collect();
        let count = SegmentWriter::new(dir.as_ref(), &analyzer, &DefaultSimilarity, config)
            .write(name, &docs)
            .unwrap();
        Arc::new(SegmentReader::open(Arc::clone(dir), &SegmentInfo::new(name, count, false)).unwrap())
    }

    #[test]
    fn merge_drops_deleted_and_renumbers() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = config();
        let a = segment(&dir, "_a", &["x y", "x", "y", "x z", "x"], &config);
        let b = segment(&dir, "_b", &["x", "z", "x y", "x"], &config);
        a.delete_document(1).unwrap();
        a.delete_document(3).unwrap();
        b.delete_document(0).unwrap();

        let mut merger = SegmentMerger::new(dir.as_ref(), "_m", &config);
        merger.add(Arc::clone(&a));
        merger.add(Arc::clone(&b));
        assert_eq!(merger.merge().unwrap(), 6);

        let merged = SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new("_m", 6, false)).unwrap();
        let mut docs = merged.term_docs(&Term::new("body", "x")).unwrap();
        let mut seen = Vec::new();
        while docs.next().unwrap() {
            seen.push(docs.doc());
        }
        // a0 a4 b2 b3
        assert_eq!(seen, vec![0, 2, 4, 5]);
        assert_eq!(merged.doc_freq(&Term::new("body", "z")).unwrap(), 1);
        assert_eq!(merged.document(3).unwrap().get("id"), Some("_b1"));
        assert!(merged.norms("body").is_some_and(|n| n.len() == 6));
    }

    #[test]
    fn terms_whose_docs_are_all_deleted_vanish() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = config();
        let a = segment(&dir, "_a", &["gone", "kept"], &config);
        a.delete_document(0).unwrap();
        let mut merger = SegmentMerger::new(dir.as_ref(), "_m", &config);
        merger.add(a);
        merger.merge().unwrap();
        merger.create_compound_file().unwrap();

        let merged = SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new("_m", 1, true)).unwrap();
        assert_eq!(merged.doc_freq(&Term::new("body", "gone")).unwrap(), 0);
        assert_eq!(merged.doc_freq(&Term::new("body", "kept")).unwrap(), 1);
        assert!(!dir.file_exists("_m.tis"));
    }

    #[test]
    fn random_deletions_merge_to_dense_increasing_ids() {
        const VOCAB: [&str; 5] = ["p", "q", "r", "s", "t"];
        let mut rng = StdRng::seed_from_u64(19);
        let config = config();

        for _ in 0..25 {
            let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
            let mut merger = SegmentMerger::new(dir.as_ref(), "_m", &config);
            // texts of the surviving documents, in merged order
            let mut survivors: Vec<String> = Vec::new();

            for name in ["_a", "_b", "_c"].iter().take(rng.gen_range(2..=3)) {
                let texts: Vec<String> = (0..rng.gen_range(1..40))
                    .map(|_| {
                        let len = rng.gen_range(1..4);
                        let words: Vec<&str> = (0..len).map(|_| VOCAB[rng.gen_range(0..VOCAB.len())]).collect();
                        words.join(" ")
                    })
                    .collect();
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let reader = segment(&dir, name, &refs, &config);
                for (doc, text) in texts.iter().enumerate() {
                    if rng.gen_bool(0.35) {
                        reader.delete_document(doc as DocId).unwrap();
                    } else {
                        survivors.push(text.clone());
                    }
                }
                merger.add(reader);
            }

            let count = merger.merge().unwrap();
            assert_eq!(count as usize, survivors.len());
            let merged = SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new("_m", count, false)).unwrap();
            assert_eq!(merged.max_doc() as usize, survivors.len());

            for word in VOCAB {
                let expected: Vec<DocId> = survivors
                    .iter()
                    .enumerate()
                    .filter(|(_, text)| text.split(' ').any(|w| w == word))
                    .map(|(doc, _)| doc as DocId)
                    .collect();
                let mut docs = merged.term_docs(&Term::new("body", word)).unwrap();
                let mut seen: Vec<DocId> = Vec::new();
                while docs.next().unwrap() {
                    assert!(seen.last().is_none_or(|&last| last < docs.doc()));
                    seen.push(docs.doc());
                }
                assert_eq!(seen, expected, "term {}", word);
            }
        }
    }

    #[test]
    fn positions_survive_merge() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = config();
        let a = segment(&dir, "_a", &["p q p"], &config);
        let b = segment(&dir, "_b", &["q q p"], &config);
        let mut merger = SegmentMerger::new(dir.as_ref(), "_m", &config);
        merger.add(a);
        merger.add(b);
        merger.merge().unwrap();

        let merged = SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new("_m", 2, false)).unwrap();
        let mut p = merged.term_positions(&Term::new("body", "p")).unwrap();
        assert!(p.next().unwrap());
        assert_eq!((p.doc(), p.freq()), (0, 2));
        assert_eq!(p.next_position().unwrap(), 0);
        assert_eq!(p.next_position().unwrap(), 2);
        assert!(p.next().unwrap());
        assert_eq!((p.doc(), p.freq()), (1, 1));
        assert_eq!(p.next_position().unwrap(), 2);
        assert!(!p.next().unwrap());
    }

    #[test]
    fn vectors_follow_surviving_documents() {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = config();
        let analyzer = Analyzer::whitespace();
        let write = |name: &str, docs: &[Document]| {
            let count = SegmentWriter::new(dir.as_ref(), &analyzer, &DefaultSimilarity, &config)
                .write(name, docs)
                .unwrap();
            Arc::new(SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new(name, count, false)).unwrap())
        };
        let vectored = |text: &str| {
            Document::new().with(Field::text("body", text).with_term_vector(TermVector::WithPositions))
        };
        // only the second segment declares vectors
        let a = write("_a", &[Document::new().with(Field::text("body", "p q"))]);
        let b = write("_b", &[vectored("dropped"), vectored("r s r")]);
        b.delete_document(0).unwrap();

        let mut merger = SegmentMerger::new(dir.as_ref(), "_m", &config);
        merger.add(a);
        merger.add(b);
        assert_eq!(merger.merge().unwrap(), 2);

        let merged = SegmentReader::open(Arc::clone(&dir), &SegmentInfo::new("_m", 2, false)).unwrap();
        assert_eq!(merged.term_freq_vector(0, "body").unwrap(), None);
        let vector = merged.term_freq_vector(1, "body").unwrap().unwrap();
        assert_eq!(vector.terms(), &["r".to_string(), "s".to_string()]);
        assert_eq!(vector.term_frequencies(), &[2, 1]);
        assert_eq!(vector.term_positions(0), Some(&[0, 2][..]));
        assert!(merged.term_freq_vector(2, "body").is_err());
    }
}
