use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::core::config::IndexConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DocId, Document};
use crate::index::field_infos::FieldInfos;
use crate::index::norms::{norms_file, write_norms};
use crate::index::postings_writer::PostingsWriter;
use crate::index::stored_fields::StoredFieldsWriter;
use crate::index::term::Term;
use crate::index::term_dictionary::TermDictionaryWriter;
use crate::index::term_vectors::{SegmentTermVector, TermVectorsWriter, vector_files};
use crate::scoring::similarity::{encode_norm, Similarity};
use crate::storage::compound::pack_compound;
use crate::storage::directory::Directory;

type Postings = BTreeMap<Term, Vec<(DocId, Vec<u32>)>>;

/// Term positions of one document, by field number then term.
type DocVectors = BTreeMap<u32, BTreeMap<String, Vec<u32>>>;

struct Inverted {
    postings: Postings,
    norms: Vec<Vec<u8>>,
    vectors: Vec<Vec<SegmentTermVector>>,
}

/// Per-segment files in compound order, norms last.
pub fn segment_files(segment: &str, field_infos: &FieldInfos) -> Vec<String> {
    let mut files: Vec<String> = ["fnm", "frq", "prx", "fdx", "fdt", "tii", "tis"]
        .iter()
        .map(|ext| format!("{}.{}", segment, ext))
        .collect();
    if field_infos.has_vectors() {
        files.extend(vector_files(segment));
    }
    for info in field_infos.iter().filter(|f| f.indexed) {
        files.push(norms_file(segment, info.number));
    }
    files
}

struct FieldState {
    position: u32,
    length: usize,
    boost: f32,
}

/// Inverts a batch of documents into one new segment.
pub struct SegmentWriter<'a> {
    directory: &'a dyn Directory,
    analyzer: &'a Analyzer,
    similarity: &'a dyn Similarity,
    config: &'a IndexConfig,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(
        directory: &'a dyn Directory,
        analyzer: &'a Analyzer,
        similarity: &'a dyn Similarity,
        config: &'a IndexConfig,
    ) -> Self {
        SegmentWriter {
            directory,
            analyzer,
            similarity,
            config,
        }
    }

    /// Writes `docs` as segment `segment`, numbering them from 0. On error
    /// the partial files are removed.
    pub fn write(&self, segment: &str, docs: &[Document]) -> Result<u32> {
        let doc_count = u32::try_from(docs.len())
            .map_err(|_| Error::invalid_argument("too many documents for one segment"))?;

        let mut field_infos = FieldInfos::new();
        for doc in docs {
            field_infos.add_document(doc);
        }
        let field_infos = Arc::new(field_infos);

        let result = self.write_files(segment, docs, &field_infos);
        if let Err(e) = result {
            let mut files = segment_files(segment, &field_infos);
            files.push(format!("{}.cfs", segment));
            for file in files.iter().filter(|f| self.directory.file_exists(f)) {
                if let Err(cleanup) = self.directory.delete_file(file) {
                    log::warn!("could not remove {} after failed flush: {}", file, cleanup);
                }
            }
            return Err(e);
        }

        log::debug!("flushed segment {} with {} documents", segment, doc_count);
        Ok(doc_count)
    }

    fn write_files(&self, segment: &str, docs: &[Document], field_infos: &Arc<FieldInfos>) -> Result<()> {
        let Inverted { postings, norms, vectors } = self.invert(docs, field_infos)?;

        field_infos.write(self.directory, &format!("{}.fnm", segment))?;

        let mut postings_writer = PostingsWriter::new(self.directory, segment, self.config.skip_interval)?;
        let mut dictionary = TermDictionaryWriter::new(
            self.directory,
            segment,
            Arc::clone(field_infos),
            self.config.index_interval,
            self.config.skip_interval,
        )?;
        for (term, term_postings) in postings {
            postings_writer.start_term();
            for (doc, positions) in &term_postings {
                postings_writer.add_doc(*doc, positions)?;
            }
            if let Some(info) = postings_writer.finish_term()? {
                dictionary.add(term, info)?;
            }
        }
        postings_writer.close()?;
        dictionary.close()?;

        for info in field_infos.iter().filter(|f| f.indexed) {
            write_norms(self.directory, segment, info.number, &norms[info.number as usize])?;
        }

        let mut stored = StoredFieldsWriter::new(self.directory, segment)?;
        for doc in docs {
            stored.add_document(doc)?;
        }
        stored.close()?;

        if field_infos.has_vectors() {
            let mut writer = TermVectorsWriter::new(self.directory, segment, Arc::clone(field_infos))?;
            for doc_vectors in &vectors {
                writer.add_document(doc_vectors)?;
            }
            writer.close()?;
        }

        if self.config.use_compound_file {
            pack_compound(self.directory, segment, &segment_files(segment, field_infos))?;
        }
        Ok(())
    }

    fn invert(&self, docs: &[Document], field_infos: &FieldInfos) -> Result<Inverted> {
        let mut postings = Postings::new();
        let mut norms = vec![vec![0u8; docs.len()]; field_infos.len()];
        let mut vectors = Vec::with_capacity(docs.len());
        let max_length = self.config.max_field_length;

        for (doc_id, doc) in docs.iter().enumerate() {
            let doc_id = doc_id as DocId;
            let mut fields: HashMap<&str, FieldState> = HashMap::new();
            let mut doc_vectors = DocVectors::new();

            for field in doc.fields.iter().filter(|f| f.indexed) {
                let info = field_infos
                    .by_name(&field.name)
                    .ok_or_else(|| Error::invalid_argument(format!("field {} missing from field infos", field.name)))?;
                let mut vector = if info.stores_term_vector() {
                    Some(doc_vectors.entry(info.number).or_default())
                } else {
                    None
                };
                let state = fields.entry(field.name.as_str()).or_insert(FieldState {
                    position: 0,
                    length: 0,
                    boost: doc.boost,
                });
                state.boost *= field.boost;

                if field.tokenized {
                    for token in self.analyzer.analyze(&field.name, &field.value) {
                        if state.length >= max_length {
                            log::debug!("field {} of doc {} truncated at {} tokens", field.name, doc_id, max_length);
                            break;
                        }
                        add_position(&mut postings, &field.name, &token.text, doc_id, state.position);
                        if let Some(vector) = vector.as_mut() {
                            vector.entry(token.text.clone()).or_default().push(state.position);
                        }
                        state.position += 1;
                        state.length += 1;
                    }
                } else if state.length < max_length {
                    add_position(&mut postings, &field.name, &field.value, doc_id, state.position);
                    if let Some(vector) = vector.as_mut() {
                        vector.entry(field.value.clone()).or_default().push(state.position);
                    }
                    state.position += 1;
                    state.length += 1;
                }
            }

            for (name, state) in fields {
                if state.length == 0 {
                    continue;
                }
                let number = field_infos
                    .number(name)
                    .ok_or_else(|| Error::invalid_argument(format!("field {} missing from field infos", name)))?;
                let norm = state.boost * self.similarity.length_norm(name, state.length);
                norms[number as usize][doc_id as usize] = encode_norm(norm);
            }

            let mut doc_term_vectors = Vec::with_capacity(doc_vectors.len());
            for (number, terms) in doc_vectors {
                let name = field_infos
                    .name(number)
                    .ok_or_else(|| Error::invalid_argument(format!("field number {} missing from field infos", number)))?;
                doc_term_vectors.push(SegmentTermVector::with_positions(name, terms.into_iter().collect()));
            }
            vectors.push(doc_term_vectors);
        }
        Ok(Inverted { postings, norms, vectors })
    }
}

fn add_position(postings: &mut Postings, field: &str, text: &str, doc: DocId, position: u32) {
    let docs = postings.entry(Term::new(field, text)).or_default();
    match docs.last_mut() {
        Some((last, positions)) if *last == doc => positions.push(position),
        _ => docs.push((doc, vec![position])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Field, TermVector};
    use crate::index::term_dictionary::TermDictionary;
    use crate::index::term_vectors::{TermFreqVector, TermPositionVector, TermVectorsReader};
    use crate::scoring::similarity::{decode_norm, DefaultSimilarity};
    use crate::storage::ram_directory::RamDirectory;

    fn config(compound: bool) -> IndexConfig {
        IndexConfig {
            use_compound_file: compound,
            ..IndexConfig::default()
        }
    }

    #[test]
    fn multi_valued_fields_continue_positions() {
        let dir = RamDirectory::new();
        let analyzer = Analyzer::whitespace();
        let config = config(false);
        let writer = SegmentWriter::new(&dir, &analyzer, &DefaultSimilarity, &config);
        let doc = Document::new()
            .with(Field::text("body", "a b"))
            .with(Field::text("body", "a"))
            .with(Field::keyword("id", "x y"));
        assert_eq!(writer.write("_0", &[doc]).unwrap(), 1);

        let infos = Arc::new(FieldInfos::read(&dir, "_0.fnm").unwrap());
        let dict = TermDictionary::open(&dir, "_0", infos).unwrap();
        let mut cursor = dict.cursor();
        assert_eq!(dict.lookup(&mut cursor, &Term::new("body", "a")).unwrap().unwrap().doc_freq, 1);
        assert!(dict.lookup(&mut cursor, &Term::new("id", "x y")).unwrap().is_some());
        assert!(dict.lookup(&mut cursor, &Term::new("id", "x")).unwrap().is_none());
        assert_eq!(dict.size(), 3);
    }

    #[test]
    fn norms_follow_length_and_boost() {
        let dir = RamDirectory::new();
        let analyzer = Analyzer::whitespace();
        let config = config(false);
        let writer = SegmentWriter::new(&dir, &analyzer, &DefaultSimilarity, &config);
        let docs = vec![
            Document::new().with(Field::text("body", "one two three four")),
            Document::new().with(Field::text("body", "one").with_boost(2.0)),
            Document::new().with(Field::keyword("id", "3")),
        ];
        writer.write("_1", &docs).unwrap();
        let norms = dir.open_input("_1.f0").unwrap();
        let norms = norms.bytes();
        assert_eq!(decode_norm(norms[0]), 0.5);
        assert_eq!(decode_norm(norms[1]), 2.0);
        assert_eq!(norms[2], 0);
    }

    #[test]
    fn compound_segments_leave_one_file() {
        let dir = RamDirectory::new();
        let analyzer = Analyzer::standard();
        let config = config(true);
        let writer = SegmentWriter::new(&dir, &analyzer, &DefaultSimilarity, &config);
        writer
            .write("_2", &[Document::new().with(Field::text("body", "hello world"))])
            .unwrap();
        assert_eq!(dir.list().unwrap(), vec!["_2.cfs".to_string()]);
    }

    #[test]
    fn vectors_follow_field_declarations() {
        let dir = RamDirectory::new();
        let analyzer = Analyzer::whitespace();
        let config = config(false);
        let writer = SegmentWriter::new(&dir, &analyzer, &DefaultSimilarity, &config);
        let docs = vec![
            Document::new()
                .with(Field::text("body", "b a b").with_term_vector(TermVector::WithPositions))
                .with(Field::text("body", "c").with_term_vector(TermVector::WithPositions))
                .with(Field::keyword("id", "k1").with_term_vector(TermVector::Yes))
                .with(Field::text("plain", "x y")),
            Document::new().with(Field::text("plain", "z")),
        ];
        writer.write("_3", &docs).unwrap();

        let infos = Arc::new(FieldInfos::read(&dir, "_3.fnm").unwrap());
        assert!(segment_files("_3", &infos).contains(&"_3.tvx".to_string()));
        let reader = TermVectorsReader::open(&dir, "_3", infos).unwrap();
        assert_eq!(reader.size(), 2);

        let body = reader.get(0, "body").unwrap().unwrap();
        assert_eq!(body.terms(), &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(body.term_frequencies(), &[1, 2, 1]);
        assert_eq!(body.term_positions(1), Some(&[0, 2][..]));
        assert_eq!(body.term_positions(2), Some(&[3][..]));

        let id = reader.get(0, "id").unwrap().unwrap();
        assert_eq!(id.terms(), &["k1".to_string()]);
        assert!(!id.has_positions());

        assert_eq!(reader.get(0, "plain").unwrap(), None);
        assert!(reader.get_all(1).unwrap().is_empty());
    }

    #[test]
    fn segments_without_vectors_write_no_vector_files() {
        let dir = RamDirectory::new();
        let analyzer = Analyzer::whitespace();
        let config = config(false);
        let writer = SegmentWriter::new(&dir, &analyzer, &DefaultSimilarity, &config);
        writer
            .write("_4", &[Document::new().with(Field::text("body", "hello"))])
            .unwrap();
        assert!(!dir.file_exists("_4.tvx"));
    }
}
