//! Per-search state of a query: idf and normalized weights computed once
//! against the whole index, then turned into a scorer for every segment.

use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::iterator::TermPositions;
use crate::index::multi_term::MultiTermPositions;
use crate::index::term::Term;
use crate::query::ast::{BoolQuery, MultiPhraseQuery, Occur, PhraseQuery, Query, SpanQuery, TermQuery};
use crate::scoring::boolean_scorer::{BooleanScorer, MAX_CLAUSES};
use crate::scoring::conjunction::ConjunctionScorer;
use crate::scoring::phrase_scorer::{PhraseMatcher, PhraseScorer};
use crate::scoring::scorer::Scorer;
use crate::scoring::similarity::Similarity;
use crate::scoring::spans::{NearSpans, SpanScorer, Spans, TermSpans};
use crate::scoring::term_scorer::TermScorer;
use crate::search::searcher::IndexSearcher;
use crate::storage::segment_reader::SegmentReader;

pub trait Weight {
    /// Weight after normalization; scorers multiply raw term statistics by it.
    fn value(&self) -> f32;

    fn sum_of_squared_weights(&mut self) -> f32;

    fn normalize(&mut self, norm: f32);

    /// Scorer over one segment; `None` when the segment cannot match.
    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>>;
}

/// Builds the weight of an already rewritten query.
pub fn create_weight(query: &Query, searcher: &IndexSearcher) -> Result<Box<dyn Weight>> {
    let weight: Box<dyn Weight> = match query {
        Query::Term(q) => Box::new(TermWeight::new(q, searcher)?),
        Query::Bool(q) => Box::new(BooleanWeight::new(q, searcher)?),
        Query::Phrase(q) => Box::new(PhraseWeight::new(q, searcher)?),
        Query::MultiPhrase(q) => Box::new(MultiPhraseWeight::new(q, searcher)?),
        Query::Span(q) => Box::new(SpanWeight::new(q, searcher)?),
        Query::Prefix(_) | Query::Wildcard(_) | Query::Fuzzy(_) => {
            return Err(Error::invalid_argument(format!(
                "query {} must be rewritten before it is weighted",
                query
            )));
        }
    };
    Ok(weight)
}

/// Shared idf bookkeeping of the single-valued weights.
#[derive(Debug, Clone, Copy)]
struct Normalized {
    boost: f32,
    idf: f32,
    query_weight: f32,
    value: f32,
}

impl Normalized {
    fn new(boost: f32, idf: f32) -> Self {
        Normalized {
            boost,
            idf,
            query_weight: 0.0,
            value: 0.0,
        }
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.query_weight = self.idf * self.boost;
        self.query_weight * self.query_weight
    }

    fn normalize(&mut self, norm: f32) {
        self.query_weight *= norm;
        self.value = self.query_weight * self.idf;
    }
}

fn summed_idf(terms: &[Term], searcher: &IndexSearcher) -> Result<f32> {
    let similarity = searcher.similarity();
    let mut idf = 0.0;
    for term in terms {
        idf += similarity.idf(searcher.doc_freq(term)?, searcher.max_doc());
    }
    Ok(idf)
}

pub struct TermWeight {
    term: Term,
    similarity: Arc<dyn Similarity>,
    weight: Normalized,
}

impl TermWeight {
    fn new(query: &TermQuery, searcher: &IndexSearcher) -> Result<Self> {
        let term = query.term();
        let idf = summed_idf(std::slice::from_ref(&term), searcher)?;
        Ok(TermWeight {
            term,
            similarity: Arc::clone(searcher.similarity()),
            weight: Normalized::new(query.boost.unwrap_or(1.0), idf),
        })
    }
}

impl Weight for TermWeight {
    fn value(&self) -> f32 {
        self.weight.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.weight.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.weight.normalize(norm);
    }

    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>> {
        let Some(info) = reader.term_info(&self.term)? else {
            return Ok(None);
        };
        let mut postings = reader.term_docs_reader();
        postings.seek(Some(info))?;
        Ok(Some(Box::new(TermScorer::new(
            postings,
            reader.scoring_norms(&self.term.field),
            self.weight.value,
            Arc::clone(&self.similarity),
        ))))
    }
}

struct WeightedClause {
    weight: Box<dyn Weight>,
    occur: Occur,
    nested_bool: bool,
}

pub struct BooleanWeight {
    clauses: Vec<WeightedClause>,
    boost: f32,
    similarity: Arc<dyn Similarity>,
}

impl BooleanWeight {
    fn new(query: &BoolQuery, searcher: &IndexSearcher) -> Result<Self> {
        if query.clauses.len() > searcher.max_clause_count() {
            return Err(Error::invalid_argument(format!(
                "boolean query has {} clauses, more than the limit of {}",
                query.clauses.len(),
                searcher.max_clause_count()
            )));
        }
        let clauses = query
            .clauses
            .iter()
            .map(|c| {
                Ok(WeightedClause {
                    weight: create_weight(&c.query, searcher)?,
                    occur: c.occur,
                    nested_bool: matches!(c.query, Query::Bool(_)),
                })
            })
            .collect::<Result<_>>()?;
        let weight = BooleanWeight {
            clauses,
            boost: query.boost.unwrap_or(1.0),
            similarity: Arc::clone(searcher.similarity()),
        };
        if !weight.all_required() && weight.clauses.len() > MAX_CLAUSES {
            return Err(Error::invalid_argument(format!(
                "boolean group has {} clauses, a mixed group holds at most {}",
                weight.clauses.len(),
                MAX_CLAUSES
            )));
        }
        Ok(weight)
    }

    fn all_required(&self) -> bool {
        !self.clauses.is_empty() && self.clauses.iter().all(|c| c.occur == Occur::Must && !c.nested_bool)
    }
}

impl Weight for BooleanWeight {
    fn value(&self) -> f32 {
        self.boost
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        let mut sum = 0.0;
        for clause in self.clauses.iter_mut() {
            if clause.occur != Occur::MustNot {
                sum += clause.weight.sum_of_squared_weights();
            }
        }
        sum * self.boost * self.boost
    }

    fn normalize(&mut self, norm: f32) {
        let norm = norm * self.boost;
        for clause in self.clauses.iter_mut() {
            clause.weight.normalize(norm);
        }
    }

    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>> {
        if self.all_required() {
            let mut scorers = Vec::with_capacity(self.clauses.len());
            for clause in &self.clauses {
                match clause.weight.scorer(reader)? {
                    Some(scorer) => scorers.push(scorer),
                    None => return Ok(None),
                }
            }
            return Ok(Some(Box::new(ConjunctionScorer::new(scorers, self.similarity.as_ref()))));
        }

        let mut scorer = BooleanScorer::new(Arc::clone(&self.similarity));
        for clause in &self.clauses {
            match clause.weight.scorer(reader)? {
                Some(sub) => scorer.add(sub, clause.occur == Occur::Must, clause.occur == Occur::MustNot)?,
                None if clause.occur == Occur::Must => return Ok(None),
                None => scorer.add_absent(clause.occur == Occur::MustNot),
            }
        }
        Ok(Some(Box::new(scorer)))
    }
}

pub struct PhraseWeight {
    field: String,
    terms: Vec<Term>,
    positions: Vec<u32>,
    slop: u32,
    similarity: Arc<dyn Similarity>,
    weight: Normalized,
}

impl PhraseWeight {
    fn new(query: &PhraseQuery, searcher: &IndexSearcher) -> Result<Self> {
        if query.terms.len() != query.positions.len() {
            return Err(Error::invalid_argument("phrase terms and positions differ in length"));
        }
        let terms = query.terms();
        let idf = summed_idf(&terms, searcher)?;
        Ok(PhraseWeight {
            field: query.field.clone(),
            terms,
            positions: query.positions.clone(),
            slop: query.slop,
            similarity: Arc::clone(searcher.similarity()),
            weight: Normalized::new(query.boost.unwrap_or(1.0), idf),
        })
    }
}

fn matcher(slop: u32) -> PhraseMatcher {
    if slop == 0 {
        PhraseMatcher::Exact
    } else {
        PhraseMatcher::Sloppy { slop }
    }
}

impl Weight for PhraseWeight {
    fn value(&self) -> f32 {
        self.weight.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.weight.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.weight.normalize(norm);
    }

    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>> {
        if self.terms.is_empty() {
            return Ok(None);
        }
        let mut postings: Vec<(Box<dyn TermPositions>, u32)> = Vec::with_capacity(self.terms.len());
        for (term, &position) in self.terms.iter().zip(&self.positions) {
            let Some(info) = reader.term_info(term)? else {
                return Ok(None);
            };
            let mut positions = reader.term_positions_reader();
            positions.seek(Some(info))?;
            postings.push((Box::new(positions), position));
        }
        Ok(Some(Box::new(PhraseScorer::new(
            postings,
            matcher(self.slop),
            Arc::clone(&self.similarity),
            self.weight.value,
            reader.scoring_norms(&self.field),
        ))))
    }
}

pub struct MultiPhraseWeight {
    field: String,
    groups: Vec<Vec<Term>>,
    positions: Vec<u32>,
    slop: u32,
    similarity: Arc<dyn Similarity>,
    weight: Normalized,
}

impl MultiPhraseWeight {
    fn new(query: &MultiPhraseQuery, searcher: &IndexSearcher) -> Result<Self> {
        if query.terms.len() != query.positions.len() {
            return Err(Error::invalid_argument("phrase terms and positions differ in length"));
        }
        let groups = query.term_groups();
        let all: Vec<Term> = groups.iter().flatten().cloned().collect();
        let idf = summed_idf(&all, searcher)?;
        Ok(MultiPhraseWeight {
            field: query.field.clone(),
            groups,
            positions: query.positions.clone(),
            slop: query.slop,
            similarity: Arc::clone(searcher.similarity()),
            weight: Normalized::new(query.boost.unwrap_or(1.0), idf),
        })
    }
}

impl Weight for MultiPhraseWeight {
    fn value(&self) -> f32 {
        self.weight.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.weight.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.weight.normalize(norm);
    }

    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>> {
        if self.groups.is_empty() {
            return Ok(None);
        }
        let mut postings: Vec<(Box<dyn TermPositions>, u32)> = Vec::with_capacity(self.groups.len());
        for (group, &position) in self.groups.iter().zip(&self.positions) {
            let mut present = false;
            for term in group {
                present |= reader.term_info(term)?.is_some();
            }
            if !present {
                return Ok(None);
            }
            let positions: Box<dyn TermPositions> = match group.as_slice() {
                [term] => Box::new(reader.term_positions(term)?),
                terms => Box::new(MultiTermPositions::new(reader, terms)?),
            };
            postings.push((positions, position));
        }
        Ok(Some(Box::new(PhraseScorer::new(
            postings,
            matcher(self.slop),
            Arc::clone(&self.similarity),
            self.weight.value,
            reader.scoring_norms(&self.field),
        ))))
    }
}

pub struct SpanWeight {
    query: SpanQuery,
    field: String,
    similarity: Arc<dyn Similarity>,
    weight: Normalized,
}

impl SpanWeight {
    fn new(query: &SpanQuery, searcher: &IndexSearcher) -> Result<Self> {
        let field = query
            .field()
            .ok_or_else(|| Error::invalid_argument("span query without clauses"))?
            .to_string();
        let terms = query.terms();
        if let Some(other) = terms.iter().find(|t| t.field != field) {
            return Err(Error::invalid_argument(format!(
                "span clauses must share field {}, found {}",
                field, other.field
            )));
        }
        let idf = summed_idf(&terms, searcher)?;
        let boost = match query {
            SpanQuery::Term(q) => q.boost,
            SpanQuery::Near(q) => q.boost,
        };
        Ok(SpanWeight {
            query: query.clone(),
            field,
            similarity: Arc::clone(searcher.similarity()),
            weight: Normalized::new(boost.unwrap_or(1.0), idf),
        })
    }
}

/// Spans of `query` over one segment.
pub fn spans(query: &SpanQuery, reader: &SegmentReader) -> Result<Box<dyn Spans>> {
    match query {
        SpanQuery::Term(q) => {
            let positions: Box<dyn TermPositions> = Box::new(reader.term_positions(&Term::new(&q.field, &q.value))?);
            Ok(Box::new(TermSpans::new(positions)))
        }
        SpanQuery::Near(q) => {
            let clauses = q
                .clauses
                .iter()
                .map(|c| spans(c, reader))
                .collect::<Result<Vec<_>>>()?;
            Ok(Box::new(NearSpans::new(clauses, q.slop, q.in_order)))
        }
    }
}

impl Weight for SpanWeight {
    fn value(&self) -> f32 {
        self.weight.value
    }

    fn sum_of_squared_weights(&mut self) -> f32 {
        self.weight.sum_of_squared_weights()
    }

    fn normalize(&mut self, norm: f32) {
        self.weight.normalize(norm);
    }

    fn scorer(&self, reader: &SegmentReader) -> Result<Option<Box<dyn Scorer>>> {
        Ok(Some(Box::new(SpanScorer::new(
            spans(&self.query, reader)?,
            Arc::clone(&self.similarity),
            self.weight.value,
            reader.scoring_norms(&self.field),
        ))))
    }
}
