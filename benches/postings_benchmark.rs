use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quarry::analysis::analyzer::Analyzer;
use quarry::index::iterator::{DocIterator, TermDocs};
use quarry::storage::directory::Directory;
use quarry::storage::ram_directory::RamDirectory;
use quarry::storage::segment_reader::SegmentReader;
use quarry::{Document, Field, IndexConfig, IndexWriter, Term};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const WORDS: &[&str] = &["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];

/// Helper to build a single optimized segment of random documents
fn build_segment(doc_count: usize) -> SegmentReader {
    let mut rng = StdRng::seed_from_u64(42);
    let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
    let config = IndexConfig {
        max_buffered_docs: 1000,
        use_compound_file: false,
        ..IndexConfig::default()
    };
    let mut writer = IndexWriter::open(Arc::clone(&dir), config, Arc::new(Analyzer::whitespace())).unwrap();
    for _ in 0..doc_count {
        let content: String = (0..20)
            .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
            .collect::<Vec<_>>()
            .join(" ");
        writer.add_document(Document::new().with(Field::text("content", &content))).unwrap();
    }
    writer.optimize().unwrap();
    let info = writer.segment_infos().segments[0].clone();
    writer.close().unwrap();
    SegmentReader::open(dir, &info).unwrap()
}

/// Benchmark decoding a whole postings list
fn bench_postings_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("postings_scan");

    for doc_count in [1_000, 10_000].iter() {
        let reader = build_segment(*doc_count);
        let term = Term::new("content", "fox");
        group.bench_with_input(BenchmarkId::from_parameter(doc_count), doc_count, |b, _| {
            b.iter(|| {
                let mut docs = reader.term_docs(&term).unwrap();
                let mut sum = 0u64;
                while docs.next().unwrap() {
                    sum += docs.freq() as u64;
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

/// Benchmark skip_to with strides larger than the skip interval
fn bench_postings_skip(c: &mut Criterion) {
    let reader = build_segment(10_000);
    let term = Term::new("content", "dog");
    let mut group = c.benchmark_group("postings_skip");

    for stride in [8u32, 64, 512].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(stride), stride, |b, &stride| {
            b.iter(|| {
                let mut docs = reader.term_docs(&term).unwrap();
                let mut target = 0;
                let mut hits = 0;
                while docs.skip_to(target).unwrap() {
                    hits += 1;
                    target = docs.doc() + stride;
                }
                black_box(hits)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_postings_scan, bench_postings_skip);
criterion_main!(benches);
