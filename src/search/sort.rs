use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::types::DocId;
use crate::index::field_cache::FieldValues;
use crate::storage::segment_reader::SegmentReader;

/// A document's sort key for one sort field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortValue {
    /// Relevance; higher scores sort first.
    Score(f32),
    Doc(DocId),
    Int(i32),
    Float(f32),
    /// `None` for documents without a term, sorted before any text.
    Str(Option<String>),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Score(_) => 0,
            SortValue::Doc(_) => 1,
            SortValue::Int(_) => 2,
            SortValue::Float(_) => 3,
            SortValue::Str(_) => 4,
        }
    }

    /// Natural order of two keys. Keys of different variants only meet when
    /// segments disagree on a field's type and order by variant.
    pub fn compare(&self, other: &SortValue) -> Ordering {
        match (self, other) {
            (SortValue::Score(a), SortValue::Score(b)) => b.total_cmp(a),
            (SortValue::Doc(a), SortValue::Doc(b)) => a.cmp(b),
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Float(a), SortValue::Float(b)) => a.total_cmp(b),
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Maps term text of a field to a sort key, for orders the built-in kinds
/// do not cover.
pub trait SortComparator: Send + Sync {
    /// Distinguishes cached values of different comparators on one field.
    fn id(&self) -> &str;

    fn comparable(&self, text: &str) -> SortValue;
}

#[derive(Clone)]
pub enum SortKind {
    Score,
    Doc,
    /// Int, float or string, guessed from the field's first term.
    Auto,
    String,
    Int,
    Float,
    Custom(Arc<dyn SortComparator>),
}

impl fmt::Debug for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKind::Score => write!(f, "Score"),
            SortKind::Doc => write!(f, "Doc"),
            SortKind::Auto => write!(f, "Auto"),
            SortKind::String => write!(f, "String"),
            SortKind::Int => write!(f, "Int"),
            SortKind::Float => write!(f, "Float"),
            SortKind::Custom(c) => write!(f, "Custom({})", c.id()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortField {
    pub field: Option<String>,
    pub kind: SortKind,
    pub reverse: bool,
}

impl SortField {
    pub fn score() -> Self {
        SortField {
            field: None,
            kind: SortKind::Score,
            reverse: false,
        }
    }

    pub fn doc() -> Self {
        SortField {
            field: None,
            kind: SortKind::Doc,
            reverse: false,
        }
    }

    pub fn new(field: &str, kind: SortKind) -> Self {
        SortField {
            field: Some(field.to_string()),
            kind,
            reverse: false,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

/// Ordered list of sort fields; earlier fields take precedence.
#[derive(Debug, Clone)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

impl Sort {
    pub fn new(fields: Vec<SortField>) -> Self {
        Sort { fields }
    }

    /// Score descending, then document number.
    pub fn relevance() -> Self {
        Sort::new(vec![SortField::score(), SortField::doc()])
    }

    pub fn index_order() -> Self {
        Sort::new(vec![SortField::doc()])
    }

    /// By the values of `field` with an automatically chosen kind, then by
    /// document number.
    pub fn by_field(field: &str, reverse: bool) -> Self {
        let mut first = SortField::new(field, SortKind::Auto);
        first.reverse = reverse;
        Sort::new(vec![first, SortField::doc()])
    }

    /// Compares two key lists field by field; `reverse` fields flip.
    pub fn compare(&self, a: &[SortValue], b: &[SortValue]) -> Ordering {
        for (field, (x, y)) in self.fields.iter().zip(a.iter().zip(b)) {
            let ordering = if field.reverse { y.compare(x) } else { x.compare(y) };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl Default for Sort {
    fn default() -> Self {
        Sort::relevance()
    }
}

/// Where the key of one sort field comes from inside a single segment.
/// Resolved once per segment per search.
pub(crate) enum KeySource {
    Score,
    Doc,
    Values(Arc<FieldValues>),
}

impl KeySource {
    pub(crate) fn resolve(reader: &SegmentReader, field: &SortField) -> Result<KeySource> {
        let cache = reader.field_cache();
        let values = match (&field.kind, field.field.as_deref()) {
            (SortKind::Score, _) => return Ok(KeySource::Score),
            (SortKind::Doc, _) => return Ok(KeySource::Doc),
            (kind, None) => {
                return Err(Error::invalid_argument(format!("{:?} sort needs a field name", kind)));
            }
            (SortKind::Auto, Some(name)) => cache.auto(reader, name)?,
            (SortKind::String, Some(name)) => cache.strings(reader, name)?,
            (SortKind::Int, Some(name)) => cache.ints(reader, name)?,
            (SortKind::Float, Some(name)) => cache.floats(reader, name)?,
            (SortKind::Custom(comparator), Some(name)) => cache.custom(reader, name, comparator.as_ref())?,
        };
        Ok(KeySource::Values(values))
    }

    /// Key of segment-local `doc`, reported under index-wide `global`.
    pub(crate) fn value(&self, doc: DocId, global: DocId, score: f32) -> SortValue {
        match self {
            KeySource::Score => SortValue::Score(score),
            KeySource::Doc => SortValue::Doc(global),
            KeySource::Values(values) => {
                let i = doc as usize;
                match values.as_ref() {
                    FieldValues::Ints(v) => SortValue::Int(v.get(i).copied().unwrap_or(0)),
                    FieldValues::Floats(v) => SortValue::Float(v.get(i).copied().unwrap_or(0.0)),
                    FieldValues::Strings(v) => SortValue::Str(v.get(i).cloned().flatten()),
                    FieldValues::StringIndex(index) => {
                        SortValue::Str(index.order.get(i).and_then(|&o| index.lookup[o as usize].clone()))
                    }
                    FieldValues::Custom(v) => v.get(i).cloned().unwrap_or(SortValue::Str(None)),
                }
            }
        }
    }
}
