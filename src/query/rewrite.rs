//! Rewriting of queries into the primitive forms that can be weighted.
//! Multi-term queries expand to boolean queries of term queries over the
//! terms the index actually holds.

use std::collections::BTreeMap;

use crate::core::error::{Error, Result};
use crate::core::priority_queue::PriorityQueue;
use crate::index::term::Term;
use crate::query::ast::{BoolQuery, BooleanClause, FuzzyQuery, Occur, PrefixQuery, Query, TermQuery, WildcardQuery};
use crate::scoring::boolean_scorer::MAX_CLAUSES;
use crate::search::fuzzy::FuzzyTerms;
use crate::search::prefix::{PrefixTerms, WildcardTerms};
use crate::search::searcher::IndexSearcher;
use crate::storage::segment_reader::SegmentReader;

impl Query {
    /// Rewrites into a query built only from term, boolean, phrase and span
    /// queries.
    pub fn rewrite(&self, searcher: &IndexSearcher) -> Result<Query> {
        match self {
            Query::Term(_) | Query::Span(_) => Ok(self.clone()),
            Query::Bool(q) => rewrite_bool(q, searcher),
            Query::Phrase(q) if q.terms.len() == 1 => Ok(Query::Term(TermQuery {
                field: q.field.clone(),
                value: q.terms[0].clone(),
                boost: q.boost,
            })),
            Query::Phrase(_) => Ok(self.clone()),
            Query::MultiPhrase(q) if q.terms.len() == 1 && q.terms[0].len() == 1 => Ok(Query::Term(TermQuery {
                field: q.field.clone(),
                value: q.terms[0][0].clone(),
                boost: q.boost,
            })),
            Query::MultiPhrase(_) => Ok(self.clone()),
            Query::Prefix(q) => rewrite_prefix(q, searcher),
            Query::Wildcard(q) => rewrite_wildcard(q, searcher),
            Query::Fuzzy(q) => rewrite_fuzzy(q, searcher),
        }
    }
}

fn rewrite_bool(query: &BoolQuery, searcher: &IndexSearcher) -> Result<Query> {
    if let [clause] = query.clauses.as_slice() {
        if clause.occur != Occur::MustNot {
            let inner = clause.query.rewrite(searcher)?;
            let boost = inner.boost() * query.boost.unwrap_or(1.0);
            return Ok(inner.with_boost(boost));
        }
    }
    let clauses = query
        .clauses
        .iter()
        .map(|c| {
            Ok(BooleanClause {
                query: c.query.rewrite(searcher)?,
                occur: c.occur,
            })
        })
        .collect::<Result<_>>()?;
    Ok(Query::Bool(BoolQuery {
        clauses,
        boost: query.boost,
    }))
}

/// Union over all segments of the terms `open` enumerates, keeping the
/// largest difference seen for each.
fn expand<F>(searcher: &IndexSearcher, mut open: F) -> Result<BTreeMap<Term, f32>>
where
    F: FnMut(&SegmentReader) -> Result<Vec<(Term, f32)>>,
{
    let mut terms = BTreeMap::new();
    for reader in searcher.readers() {
        for (term, difference) in open(&**reader)? {
            let best = terms.entry(term).or_insert(difference);
            *best = (*best).max(difference);
        }
    }
    Ok(terms)
}

fn check_expansion(query: &Query, count: usize, searcher: &IndexSearcher) -> Result<()> {
    if count > searcher.max_clause_count() {
        return Err(Error::invalid_argument(format!(
            "{} expands to {} terms, more than the limit of {}",
            query,
            count,
            searcher.max_clause_count()
        )));
    }
    Ok(())
}

fn rewrite_prefix(query: &PrefixQuery, searcher: &IndexSearcher) -> Result<Query> {
    let prefix = Term::new(&query.field, &query.prefix);
    let terms = expand(searcher, |reader| PrefixTerms::open(reader, prefix.clone())?.collect_terms())?;
    check_expansion(&Query::Prefix(query.clone()), terms.len(), searcher)?;
    Ok(term_disjunction(terms, query.boost.unwrap_or(1.0)))
}

fn rewrite_wildcard(query: &WildcardQuery, searcher: &IndexSearcher) -> Result<Query> {
    let pattern = Term::new(&query.field, &query.pattern);
    let terms = expand(searcher, |reader| WildcardTerms::open(reader, &pattern)?.collect_terms())?;
    check_expansion(&Query::Wildcard(query.clone()), terms.len(), searcher)?;
    Ok(term_disjunction(terms, query.boost.unwrap_or(1.0)))
}

/// Keeps the `max_clause_count` closest terms rather than failing.
fn rewrite_fuzzy(query: &FuzzyQuery, searcher: &IndexSearcher) -> Result<Query> {
    let target = Term::new(&query.field, &query.value);
    // validates the similarity even on an empty index
    FuzzyTerms::new(&target, query.min_similarity, query.prefix_length)?;
    let terms = expand(searcher, |reader| {
        FuzzyTerms::open(reader, &target, query.min_similarity, query.prefix_length)?.collect_terms()
    })?;

    let less = |a: &(Term, f32), b: &(Term, f32)| {
        if a.1 == b.1 { a.0 > b.0 } else { a.1 < b.1 }
    };
    let mut best = PriorityQueue::new(searcher.max_clause_count());
    for entry in terms {
        best.insert(entry, less);
    }
    if best.size() == searcher.max_clause_count() {
        log::debug!("{} truncated to {} terms", Query::Fuzzy(query.clone()), best.size());
    }
    let kept: BTreeMap<Term, f32> = best.into_vec().into_iter().collect();
    Ok(term_disjunction(kept, query.boost.unwrap_or(1.0)))
}

/// Optional term queries boosted by `boost * difference`, nested into
/// groups small enough for one boolean scorer.
fn term_disjunction(terms: BTreeMap<Term, f32>, boost: f32) -> Query {
    let mut level: Vec<Query> = terms
        .into_iter()
        .map(|(term, difference)| {
            Query::Term(TermQuery {
                field: term.field,
                value: term.text,
                boost: Some(boost * difference),
            })
        })
        .collect();
    while level.len() > MAX_CLAUSES {
        let mut groups = Vec::with_capacity(level.len().div_ceil(MAX_CLAUSES));
        let mut rest = level.into_iter().peekable();
        while rest.peek().is_some() {
            groups.push(should(rest.by_ref().take(MAX_CLAUSES).collect()));
        }
        level = groups;
    }
    should(level)
}

fn should(queries: Vec<Query>) -> Query {
    let mut bool_query = BoolQuery::new();
    for query in queries {
        bool_query.add(query, Occur::Should);
    }
    Query::Bool(bool_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause_count(query: &Query) -> usize {
        match query {
            Query::Bool(q) => q.clauses.len(),
            _ => 0,
        }
    }

    #[test]
    fn large_disjunctions_nest_in_groups() {
        let terms: BTreeMap<Term, f32> = (0..100).map(|i| (Term::new("f", &format!("t{:03}", i)), 1.0)).collect();
        let query = term_disjunction(terms, 2.0);
        // 100 terms -> 4 groups of at most 32
        assert_eq!(clause_count(&query), 4);
        let Query::Bool(outer) = &query else { panic!("expected a boolean query") };
        assert_eq!(clause_count(&outer.clauses[0].query), 32);
        assert_eq!(clause_count(&outer.clauses[3].query), 4);
        let Query::Bool(first) = &outer.clauses[0].query else { panic!() };
        assert_eq!(first.clauses[0].query, Query::term("f", "t000").with_boost(2.0));
    }

    #[test]
    fn small_disjunctions_stay_flat() {
        let terms: BTreeMap<Term, f32> = [(Term::new("f", "a"), 0.5), (Term::new("f", "b"), 1.0)].into_iter().collect();
        let Query::Bool(q) = term_disjunction(terms, 1.0) else { panic!() };
        assert_eq!(q.clauses.len(), 2);
        assert!(q.clauses.iter().all(|c| c.occur == Occur::Should));
        assert_eq!(q.clauses[0].query.boost(), 0.5);
    }
}
