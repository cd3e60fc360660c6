use crate::core::error::Result;
use crate::index::iterator::DocIterator;
use crate::search::collector::HitCollector;

/// Ranks the documents an iterator visits. `score` is only meaningful after
/// `next` or `skip_to` returned true.
pub trait Scorer: DocIterator {
    fn score(&self) -> f32;

    /// Feeds every remaining match to `collector`.
    fn score_all(&mut self, collector: &mut dyn HitCollector) -> Result<()> {
        while self.next()? {
            collector.collect(self.doc(), self.score());
        }
        Ok(())
    }
}

impl<T: Scorer + ?Sized> Scorer for Box<T> {
    fn score(&self) -> f32 {
        (**self).score()
    }

    fn score_all(&mut self, collector: &mut dyn HitCollector) -> Result<()> {
        (**self).score_all(collector)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::analysis::analyzer::Analyzer;
    use crate::core::config::IndexConfig;
    use crate::core::types::{Document, Field};
    use crate::scoring::similarity::DefaultSimilarity;
    use crate::storage::directory::Directory;
    use crate::storage::ram_directory::RamDirectory;
    use crate::storage::segment::SegmentInfo;
    use crate::storage::segment_reader::SegmentReader;
    use crate::storage::segment_writer::SegmentWriter;

    /// One segment whose documents hold `texts` in field `f`, split on
    /// whitespace.
    pub(crate) fn segment(texts: &[&str]) -> SegmentReader {
        let dir: Arc<dyn Directory> = Arc::new(RamDirectory::new());
        let config = IndexConfig {
            use_compound_file: false,
            ..IndexConfig::default()
        };
        let docs: Vec<Document> = texts.iter().map(|t| Document::new().with(Field::text("f", t))).collect();
        let analyzer = Analyzer::whitespace();
        let count = SegmentWriter::new(dir.as_ref(), &analyzer, &DefaultSimilarity, &config)
            .write("_0", &docs)
            .unwrap();
        SegmentReader::open(dir, &SegmentInfo::new("_0", count, false)).unwrap()
    }
}
