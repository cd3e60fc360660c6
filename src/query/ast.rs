use std::fmt;

use serde::{Deserialize, Serialize};

use crate::index::term::Term;

/// Main query enum representing all query types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Bool(BoolQuery),
    Phrase(PhraseQuery),
    MultiPhrase(MultiPhraseQuery), // Alternatives per phrase position
    Span(SpanQuery),
    Prefix(PrefixQuery),
    Wildcard(WildcardQuery), // `*` and `?`
    Fuzzy(FuzzyQuery),
}

/// Single term query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    Must,
    Should,
    MustNot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

/// Boolean query with must/should/must_not clauses, kept in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolQuery {
    pub clauses: Vec<BooleanClause>,
    pub boost: Option<f32>,
}

/// Terms at fixed relative positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<String>,
    pub positions: Vec<u32>,
    pub slop: u32, // Max total displacement of the terms
    pub boost: Option<f32>,
}

/// Phrase whose positions each accept any of several terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiPhraseQuery {
    pub field: String,
    pub terms: Vec<Vec<String>>,
    pub positions: Vec<u32>,
    pub slop: u32,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpanQuery {
    Term(SpanTermQuery),
    Near(SpanNearQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanTermQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

/// Sub-spans within `slop` of each other, optionally in clause order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanNearQuery {
    pub clauses: Vec<SpanQuery>,
    pub slop: u32,
    pub in_order: bool,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String, // Pattern with wildcards (* and ?)
    pub boost: Option<f32>,
}

/// Terms within an edit-distance based similarity of `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyQuery {
    pub field: String,
    pub value: String,
    pub min_similarity: f32,  // Default: 0.5
    pub prefix_length: usize, // Default: 0 (no prefix lock)
    pub boost: Option<f32>,
}

pub const DEFAULT_MIN_SIMILARITY: f32 = 0.5;

impl Query {
    pub fn term(field: &str, value: &str) -> Query {
        Query::Term(TermQuery {
            field: field.to_string(),
            value: value.to_string(),
            boost: None,
        })
    }

    /// Phrase of consecutive terms.
    pub fn phrase(field: &str, terms: &[&str]) -> Query {
        let mut phrase = PhraseQuery::new(field);
        for term in terms {
            phrase.add(term);
        }
        Query::Phrase(phrase)
    }

    pub fn prefix(field: &str, prefix: &str) -> Query {
        Query::Prefix(PrefixQuery {
            field: field.to_string(),
            prefix: prefix.to_string(),
            boost: None,
        })
    }

    pub fn wildcard(field: &str, pattern: &str) -> Query {
        Query::Wildcard(WildcardQuery {
            field: field.to_string(),
            pattern: pattern.to_string(),
            boost: None,
        })
    }

    pub fn fuzzy(field: &str, value: &str) -> Query {
        Query::Fuzzy(FuzzyQuery {
            field: field.to_string(),
            value: value.to_string(),
            min_similarity: DEFAULT_MIN_SIMILARITY,
            prefix_length: 0,
            boost: None,
        })
    }

    pub fn boost(&self) -> f32 {
        let boost = match self {
            Query::Term(q) => q.boost,
            Query::Bool(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::MultiPhrase(q) => q.boost,
            Query::Span(q) => q.boost_option(),
            Query::Prefix(q) => q.boost,
            Query::Wildcard(q) => q.boost,
            Query::Fuzzy(q) => q.boost,
        };
        boost.unwrap_or(1.0)
    }

    pub fn with_boost(mut self, value: f32) -> Query {
        let boost = Some(value);
        match &mut self {
            Query::Term(q) => q.boost = boost,
            Query::Bool(q) => q.boost = boost,
            Query::Phrase(q) => q.boost = boost,
            Query::MultiPhrase(q) => q.boost = boost,
            Query::Span(SpanQuery::Term(q)) => q.boost = boost,
            Query::Span(SpanQuery::Near(q)) => q.boost = boost,
            Query::Prefix(q) => q.boost = boost,
            Query::Wildcard(q) => q.boost = boost,
            Query::Fuzzy(q) => q.boost = boost,
        }
        self
    }
}

impl TermQuery {
    pub fn term(&self) -> Term {
        Term::new(&self.field, &self.value)
    }
}

impl BooleanClause {
    pub fn is_required(&self) -> bool {
        self.occur == Occur::Must
    }

    pub fn is_prohibited(&self) -> bool {
        self.occur == Occur::MustNot
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            clauses: Vec::new(),
            boost: None,
        }
    }

    pub fn add(&mut self, query: Query, occur: Occur) {
        self.clauses.push(BooleanClause { query, occur });
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.add(query, Occur::Must);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.add(query, Occur::Should);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.add(query, Occur::MustNot);
        self
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseQuery {
    pub fn new(field: &str) -> Self {
        PhraseQuery {
            field: field.to_string(),
            terms: Vec::new(),
            positions: Vec::new(),
            slop: 0,
            boost: None,
        }
    }

    /// Appends a term one position after the previous one.
    pub fn add(&mut self, term: &str) {
        let position = self.positions.last().map_or(0, |p| p + 1);
        self.add_at(term, position);
    }

    pub fn add_at(&mut self, term: &str, position: u32) {
        self.terms.push(term.to_string());
        self.positions.push(position);
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    pub fn terms(&self) -> Vec<Term> {
        self.terms.iter().map(|t| Term::new(&self.field, t)).collect()
    }
}

impl MultiPhraseQuery {
    pub fn new(field: &str) -> Self {
        MultiPhraseQuery {
            field: field.to_string(),
            terms: Vec::new(),
            positions: Vec::new(),
            slop: 0,
            boost: None,
        }
    }

    /// Appends a position matched by any of `terms`.
    pub fn add(&mut self, terms: &[&str]) {
        let position = self.positions.last().map_or(0, |p| p + 1);
        self.terms.push(terms.iter().map(|t| t.to_string()).collect());
        self.positions.push(position);
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    pub fn term_groups(&self) -> Vec<Vec<Term>> {
        self.terms
            .iter()
            .map(|group| group.iter().map(|t| Term::new(&self.field, t)).collect())
            .collect()
    }
}

impl SpanQuery {
    pub fn term(field: &str, value: &str) -> SpanQuery {
        SpanQuery::Term(SpanTermQuery {
            field: field.to_string(),
            value: value.to_string(),
            boost: None,
        })
    }

    pub fn near(clauses: Vec<SpanQuery>, slop: u32, in_order: bool) -> SpanQuery {
        SpanQuery::Near(SpanNearQuery {
            clauses,
            slop,
            in_order,
            boost: None,
        })
    }

    fn boost_option(&self) -> Option<f32> {
        match self {
            SpanQuery::Term(q) => q.boost,
            SpanQuery::Near(q) => q.boost,
        }
    }

    /// Field of the first term; `None` for a near query without clauses.
    pub fn field(&self) -> Option<&str> {
        match self {
            SpanQuery::Term(q) => Some(&q.field),
            SpanQuery::Near(q) => q.clauses.first().and_then(|c| c.field()),
        }
    }

    /// Every term the query can match.
    pub fn terms(&self) -> Vec<Term> {
        match self {
            SpanQuery::Term(q) => vec![Term::new(&q.field, &q.value)],
            SpanQuery::Near(q) => q.clauses.iter().flat_map(|c| c.terms()).collect(),
        }
    }
}

fn write_boost(f: &mut fmt::Formatter<'_>, boost: Option<f32>) -> fmt::Result {
    match boost {
        Some(b) if b != 1.0 => write!(f, "^{}", b),
        _ => Ok(()),
    }
}

impl fmt::Display for SpanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpanQuery::Term(q) => write!(f, "{}:{}", q.field, q.value)?,
            SpanQuery::Near(q) => {
                write!(f, "spanNear([")?;
                for (i, clause) in q.clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", clause)?;
                }
                write!(f, "], {}, {})", q.slop, q.in_order)?;
            }
        }
        write_boost(f, self.boost_option())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(q) => {
                write!(f, "{}:{}", q.field, q.value)?;
                write_boost(f, q.boost)
            }
            Query::Bool(q) => {
                let nested = q.boost.is_some_and(|b| b != 1.0);
                if nested {
                    write!(f, "(")?;
                }
                for (i, clause) in q.clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    match clause.occur {
                        Occur::Must => write!(f, "+")?,
                        Occur::MustNot => write!(f, "-")?,
                        Occur::Should => {}
                    }
                    match &clause.query {
                        Query::Bool(_) => write!(f, "({})", clause.query)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                if nested {
                    write!(f, ")")?;
                }
                write_boost(f, q.boost)
            }
            Query::Phrase(q) => {
                write!(f, "{}:\"{}\"", q.field, q.terms.join(" "))?;
                if q.slop != 0 {
                    write!(f, "~{}", q.slop)?;
                }
                write_boost(f, q.boost)
            }
            Query::MultiPhrase(q) => {
                let groups: Vec<String> = q
                    .terms
                    .iter()
                    .map(|g| if g.len() == 1 { g[0].clone() } else { format!("({})", g.join(" ")) })
                    .collect();
                write!(f, "{}:\"{}\"", q.field, groups.join(" "))?;
                if q.slop != 0 {
                    write!(f, "~{}", q.slop)?;
                }
                write_boost(f, q.boost)
            }
            Query::Span(q) => write!(f, "{}", q),
            Query::Prefix(q) => {
                write!(f, "{}:{}*", q.field, q.prefix)?;
                write_boost(f, q.boost)
            }
            Query::Wildcard(q) => {
                write!(f, "{}:{}", q.field, q.pattern)?;
                write_boost(f, q.boost)
            }
            Query::Fuzzy(q) => {
                write!(f, "{}:{}~{}", q.field, q.value, q.min_similarity)?;
                write_boost(f, q.boost)
            }
        }
    }
}
