use std::collections::VecDeque;

use crate::core::error::Result;
use crate::core::types::{DocId, NO_MORE_DOCS};
use crate::index::iterator::DocIterator;
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::Similarity;

/// Documents matched by every sub-scorer.
///
/// Sub-scorers are kept ordered by current document; the one furthest
/// behind is skipped up to the one furthest ahead and rotated to the back
/// until all agree.
pub struct ConjunctionScorer {
    scorers: VecDeque<Box<dyn Scorer>>,
    coord: f32,
    first_time: bool,
    more: bool,
}

impl ConjunctionScorer {
    pub fn new(scorers: Vec<Box<dyn Scorer>>, similarity: &dyn Similarity) -> Self {
        let n = scorers.len();
        ConjunctionScorer {
            more: n > 0,
            coord: if n > 0 { similarity.coord(n, n) } else { 0.0 },
            scorers: scorers.into(),
            first_time: true,
        }
    }

    fn init(&mut self) -> Result<()> {
        self.first_time = false;
        for scorer in self.scorers.iter_mut() {
            if !self.more {
                break;
            }
            self.more = scorer.next()?;
        }
        if self.more {
            self.sort_scorers();
        }
        Ok(())
    }

    fn sort_scorers(&mut self) {
        self.scorers.make_contiguous().sort_by_key(|s| s.doc());
    }

    fn last_doc(&self) -> DocId {
        self.scorers.back().map_or(NO_MORE_DOCS, |s| s.doc())
    }

    fn do_next(&mut self) -> Result<bool> {
        while self.more {
            let target = self.last_doc();
            let Some(mut first) = self.scorers.pop_front() else {
                self.more = false;
                break;
            };
            if first.doc() >= target {
                self.scorers.push_front(first);
                break;
            }
            self.more = first.skip_to(target)?;
            self.scorers.push_back(first);
        }
        Ok(self.more)
    }
}

impl DocIterator for ConjunctionScorer {
    fn next(&mut self) -> Result<bool> {
        if self.first_time {
            self.init()?;
        } else if self.more {
            self.more = match self.scorers.back_mut() {
                Some(last) => last.next()?,
                None => false,
            };
        }
        self.do_next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.first_time = false;
        for scorer in self.scorers.iter_mut() {
            if !self.more {
                break;
            }
            self.more = scorer.skip_to(target)?;
        }
        if self.more {
            self.sort_scorers();
        }
        self.do_next()
    }

    fn doc(&self) -> DocId {
        match self.scorers.front() {
            Some(first) if self.more => first.doc(),
            _ => NO_MORE_DOCS,
        }
    }
}

impl Scorer for ConjunctionScorer {
    fn score(&self) -> f32 {
        let sum: f32 = self.scorers.iter().map(|s| s.score()).sum();
        sum * self.coord
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::index::term::Term;
    use crate::scoring::scorer::testing::segment;
    use crate::scoring::similarity::DefaultSimilarity;
    use crate::scoring::term_scorer::TermScorer;
    use crate::storage::segment_reader::SegmentReader;

    /// Doc i holds "a" when i is in `a` and "b" when i is in `b`.
    fn reader(a: &[u32], b: &[u32], max_doc: u32) -> SegmentReader {
        let texts: Vec<String> = (0..max_doc)
            .map(|i| {
                let mut words = vec!["z"];
                if a.contains(&i) {
                    words.push("a");
                }
                if b.contains(&i) {
                    words.push("b");
                }
                words.join(" ")
            })
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        segment(&refs)
    }

    fn term(reader: &SegmentReader, text: &str) -> Box<dyn Scorer> {
        let postings = reader.term_docs(&Term::new("f", text)).unwrap();
        Box::new(TermScorer::new(postings, reader.scoring_norms("f"), 1.0, Arc::new(DefaultSimilarity)))
    }

    fn conjunction(reader: &SegmentReader, terms: &[&str]) -> ConjunctionScorer {
        let scorers = terms.iter().map(|t| term(reader, t)).collect();
        ConjunctionScorer::new(scorers, &DefaultSimilarity)
    }

    #[test]
    fn intersects_two_lists() {
        let reader = reader(&[1, 3, 5, 7], &[3, 5, 9], 10);
        let mut s = conjunction(&reader, &["a", "b"]);
        let mut docs = Vec::new();
        while s.next().unwrap() {
            docs.push(s.doc());
        }
        assert_eq!(docs, vec![3, 5]);
        assert_eq!(s.doc(), NO_MORE_DOCS);
    }

    #[test]
    fn skip_to_before_next_starts_the_scan() {
        let reader = reader(&[1, 3, 5, 7], &[3, 5, 7, 9], 10);
        let mut s = conjunction(&reader, &["a", "b"]);
        assert!(s.skip_to(4).unwrap());
        assert_eq!(s.doc(), 5);
        assert!(s.next().unwrap());
        assert_eq!(s.doc(), 7);
        assert!(!s.next().unwrap());
    }

    #[test]
    fn score_sums_sub_scores() {
        let reader = reader(&[2], &[2], 3);
        let mut both = conjunction(&reader, &["a", "b"]);
        assert!(both.next().unwrap());
        let mut a = term(&reader, "a");
        let mut b = term(&reader, "b");
        assert!(a.skip_to(2).unwrap() && b.skip_to(2).unwrap());
        assert!((both.score() - (a.score() + b.score())).abs() < 1e-6);
    }

    #[test]
    fn missing_term_matches_nothing() {
        let reader = reader(&[1, 2], &[], 3);
        let mut s = conjunction(&reader, &["a", "b"]);
        assert!(!s.next().unwrap());
        let mut empty = ConjunctionScorer::new(Vec::new(), &DefaultSimilarity);
        assert!(!empty.next().unwrap());
    }
}
