use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quarry::analysis::analyzer::Analyzer;
use quarry::storage::directory::Directory;
use quarry::storage::fs_directory::FsDirectory;
use quarry::search::query_term_vector::QueryTermVector;
use quarry::{
    BoolQuery, Document, Field, IndexConfig, IndexSearcher, IndexWriter, Query, Term, TermFreqVector, TermPositionVector,
    TermVector,
};

fn config() -> IndexConfig {
    IndexConfig {
        max_buffered_docs: 2,
        merge_factor: 2,
        ..IndexConfig::default()
    }
}

fn open_writer(dir: &Arc<dyn Directory>) -> IndexWriter {
    IndexWriter::open(Arc::clone(dir), config(), Arc::new(Analyzer::standard())).unwrap()
}

#[test]
fn deletions_survive_reopen_and_optimize() {
    let tmp = tempfile::tempdir().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let mut writer = open_writer(&dir);
    for i in 0..20 {
        let parity = if i % 2 == 0 { "even" } else { "odd" };
        let doc = Document::new()
            .with(Field::keyword("id", &i.to_string()))
            .with(Field::text("body", &format!("Common words {}", parity)));
        writer.add_document(doc).unwrap();
    }
    assert_eq!(writer.delete_documents(&Term::new("body", "even")).unwrap(), 10);
    writer.close().unwrap();

    let searcher = IndexSearcher::open(Arc::clone(&dir)).unwrap();
    assert_eq!(searcher.num_docs(), 10);
    let top = searcher.search(&Query::term("body", "common"), None, 100).unwrap();
    assert_eq!(top.total_hits, 10);
    for hit in &top.score_docs {
        let id: u32 = searcher.doc(hit.doc).unwrap().get("id").unwrap().parse().unwrap();
        assert_eq!(id % 2, 1);
    }
    searcher.close();

    let mut writer = open_writer(&dir);
    writer.optimize().unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(dir).unwrap();
    assert_eq!(searcher.readers().len(), 1);
    assert_eq!(searcher.max_doc(), 10);
    assert_eq!(searcher.doc(0).unwrap().get("id"), Some("1"));
    let query = Query::Bool(
        BoolQuery::new()
            .with_must(Query::term("body", "common"))
            .with_must_not(Query::term("body", "odd")),
    );
    assert!(searcher.search(&query, None, 10).unwrap().is_empty());
}

const VOCAB: &[&str] = &["red", "green", "blue", "cyan", "pink", "gray", "gold", "teal"];

#[test]
fn boolean_results_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let tmp = tempfile::tempdir().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let mut docs: Vec<BTreeSet<&str>> = Vec::new();
    let mut writer = open_writer(&dir);
    for _ in 0..150 {
        let len = rng.gen_range(1..6);
        let words: Vec<&str> = (0..len).map(|_| VOCAB[rng.gen_range(0..VOCAB.len())]).collect();
        writer
            .add_document(Document::new().with(Field::text("body", &words.join(" "))))
            .unwrap();
        docs.push(words.into_iter().collect());
    }
    writer.close().unwrap();
    let searcher = IndexSearcher::open(dir).unwrap();

    for _ in 0..20 {
        let a = VOCAB[rng.gen_range(0..VOCAB.len())];
        let b = VOCAB[rng.gen_range(0..VOCAB.len())];

        let both = Query::Bool(
            BoolQuery::new()
                .with_must(Query::term("body", a))
                .with_must(Query::term("body", b)),
        );
        let expected: BTreeSet<u32> = (0..docs.len() as u32)
            .filter(|&i| docs[i as usize].contains(a) && docs[i as usize].contains(b))
            .collect();
        let found: BTreeSet<u32> = searcher.search(&both, None, 1000).unwrap().docs().into_iter().collect();
        assert_eq!(found, expected, "+{} +{}", a, b);

        let either = Query::Bool(
            BoolQuery::new()
                .with_should(Query::term("body", a))
                .with_should(Query::term("body", b)),
        );
        let expected: BTreeSet<u32> = (0..docs.len() as u32)
            .filter(|&i| docs[i as usize].contains(a) || docs[i as usize].contains(b))
            .collect();
        let top = searcher.search(&either, None, 1000).unwrap();
        assert_eq!(top.total_hits, expected.len());
        assert_eq!(top.docs().into_iter().collect::<BTreeSet<_>>(), expected, "{} {}", a, b);
        assert!(top.score_docs.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn term_vectors_survive_merges() {
    let tmp = tempfile::tempdir().unwrap();
    let dir: Arc<dyn Directory> = Arc::new(FsDirectory::open(tmp.path()).unwrap());

    let mut writer = open_writer(&dir);
    for i in 0..7 {
        let doc = Document::new()
            .with(Field::keyword("id", &i.to_string()))
            .with(Field::text("body", &format!("fox {} fox", VOCAB[i])).with_term_vector(TermVector::WithPositions))
            .with(Field::text("title", "quick fox").with_term_vector(TermVector::Yes));
        writer.add_document(doc).unwrap();
    }
    writer.delete_documents(&Term::new("id", "0")).unwrap();
    writer.optimize().unwrap();
    writer.close().unwrap();

    let searcher = IndexSearcher::open(Arc::clone(&dir)).unwrap();
    assert_eq!(searcher.readers().len(), 1);
    assert_eq!(searcher.max_doc(), 6);
    for doc in 0..6 {
        let i = doc as usize + 1;
        let body = searcher.term_freq_vector(doc, "body").unwrap().unwrap();
        let fox = body.index_of("fox").unwrap();
        assert_eq!(body.term_frequencies()[fox], 2);
        assert_eq!(body.term_positions(fox), Some(&[0, 2][..]));
        assert!(body.index_of(VOCAB[i]).is_some());

        let title = searcher.term_freq_vector(doc, "title").unwrap().unwrap();
        assert_eq!(title.term_positions(0), None);
        assert_eq!(searcher.term_freq_vector(doc, "id").unwrap(), None);
    }

    let query = QueryTermVector::analyze("Quick quick fox", &Analyzer::standard());
    let title = searcher.term_freq_vector(0, "title").unwrap().unwrap();
    assert_eq!(query.indexes_of(title_terms(&title).as_slice()), vec![Some(0), Some(1)]);
    assert_eq!(query.to_string(), "{fox/1, quick/2}");
}

fn title_terms(vector: &dyn TermFreqVector) -> Vec<&str> {
    vector.terms().iter().map(String::as_str).collect()
}
