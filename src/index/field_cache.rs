use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::core::error::{Error, ErrorKind, Result};
use crate::index::iterator::DocIterator;
use crate::index::segment_term_docs::SegmentTermDocs;
use crate::index::term::Term;
use crate::search::sort::{SortComparator, SortValue};
use crate::storage::segment_reader::SegmentReader;

const INT_PATTERN: &str = r"^[+-]?[0-9]+$";
const FLOAT_PATTERN: &str = r"^[+-]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?[fFdD]?$";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Ints,
    Floats,
    Strings,
    StringIndex,
    Auto,
    Custom(String),
}

/// Terms of a field in order, with each document's term number.
/// `lookup[0]` is `None` and stands for documents without a term.
#[derive(Debug, Clone, PartialEq)]
pub struct StringIndex {
    pub order: Vec<u32>,
    pub lookup: Vec<Option<String>>,
}

impl StringIndex {
    pub fn value(&self, doc: u32) -> Option<&str> {
        self.lookup[self.order[doc as usize] as usize].as_deref()
    }
}

/// One value per document, derived from the field's indexed terms.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    Ints(Vec<i32>),
    Floats(Vec<f32>),
    Strings(Vec<Option<String>>),
    StringIndex(StringIndex),
    Custom(Vec<SortValue>),
}

/// Per-reader cache of field values used for sorting.
///
/// Concurrent misses on the same key may both compute; the first insert
/// wins and later callers see that value.
#[derive(Default)]
pub struct FieldCache {
    entries: RwLock<HashMap<(String, CacheKind), Arc<FieldValues>>>,
}

impl FieldCache {
    pub fn new() -> Self {
        FieldCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn get_or_compute<F>(&self, field: &str, kind: CacheKind, compute: F) -> Result<Arc<FieldValues>>
    where
        F: FnOnce() -> Result<FieldValues>,
    {
        let key = (field.to_string(), kind);
        if let Some(values) = self.entries.read().get(&key) {
            return Ok(Arc::clone(values));
        }
        let values = Arc::new(compute()?);
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(key).or_insert(values)))
    }

    pub fn ints(&self, reader: &SegmentReader, field: &str) -> Result<Arc<FieldValues>> {
        self.get_or_compute(field, CacheKind::Ints, || {
            let mut values = vec![0i32; reader.max_doc() as usize];
            for_each_term(reader, field, |text, docs| {
                let value: i32 = text.parse().map_err(|_| not_a_number(field, text, "int"))?;
                fill(docs, |doc| values[doc as usize] = value)
            })?;
            Ok(FieldValues::Ints(values))
        })
    }

    pub fn floats(&self, reader: &SegmentReader, field: &str) -> Result<Arc<FieldValues>> {
        self.get_or_compute(field, CacheKind::Floats, || {
            let mut values = vec![0f32; reader.max_doc() as usize];
            for_each_term(reader, field, |text, docs| {
                let value: f32 = parse_float(text).ok_or_else(|| not_a_number(field, text, "float"))?;
                fill(docs, |doc| values[doc as usize] = value)
            })?;
            Ok(FieldValues::Floats(values))
        })
    }

    pub fn strings(&self, reader: &SegmentReader, field: &str) -> Result<Arc<FieldValues>> {
        self.get_or_compute(field, CacheKind::Strings, || {
            let mut values: Vec<Option<String>> = vec![None; reader.max_doc() as usize];
            for_each_term(reader, field, |text, docs| {
                fill(docs, |doc| values[doc as usize] = Some(text.to_string()))
            })?;
            Ok(FieldValues::Strings(values))
        })
    }

    pub fn string_index(&self, reader: &SegmentReader, field: &str) -> Result<Arc<FieldValues>> {
        self.get_or_compute(field, CacheKind::StringIndex, || {
            Ok(FieldValues::StringIndex(build_string_index(reader, field)?))
        })
    }

    /// Ints, floats or a string index, depending on what the field's first
    /// term looks like.
    pub fn auto(&self, reader: &SegmentReader, field: &str) -> Result<Arc<FieldValues>> {
        if let Some(values) = self.entries.read().get(&(field.to_string(), CacheKind::Auto)) {
            return Ok(Arc::clone(values));
        }
        let first = first_term(reader, field)?;
        let values = match first {
            Some(text) if compile(INT_PATTERN)?.is_match(text.trim()) => self.ints(reader, field)?,
            Some(text) if compile(FLOAT_PATTERN)?.is_match(text.trim()) => self.floats(reader, field)?,
            _ => self.string_index(reader, field)?,
        };
        let mut entries = self.entries.write();
        Ok(Arc::clone(
            entries.entry((field.to_string(), CacheKind::Auto)).or_insert(values),
        ))
    }

    pub fn custom(
        &self,
        reader: &SegmentReader,
        field: &str,
        comparator: &dyn SortComparator,
    ) -> Result<Arc<FieldValues>> {
        self.get_or_compute(field, CacheKind::Custom(comparator.id().to_string()), || {
            let mut values = vec![SortValue::Str(None); reader.max_doc() as usize];
            for_each_term(reader, field, |text, docs| {
                let value = comparator.comparable(text);
                fill(docs, |doc| values[doc as usize] = value.clone())
            })?;
            Ok(FieldValues::Custom(values))
        })
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::new(ErrorKind::Parse, e.to_string()))
}

fn parse_float(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix(['f', 'F', 'd', 'D']).unwrap_or(trimmed);
    trimmed.parse().ok()
}

fn not_a_number(field: &str, text: &str, kind: &str) -> Error {
    Error::new(
        ErrorKind::Parse,
        format!("term {:?} of field {} is not an {}", text, field, kind),
    )
}

fn fill(docs: &mut SegmentTermDocs, mut set: impl FnMut(u32)) -> Result<()> {
    while docs.next()? {
        set(docs.doc());
    }
    Ok(())
}

/// Calls `f` with every term of `field` and a postings reader on it.
fn for_each_term<F>(reader: &SegmentReader, field: &str, mut f: F) -> Result<()>
where
    F: FnMut(&str, &mut SegmentTermDocs) -> Result<()>,
{
    let mut cursor = reader.terms_from(&Term::new(field, ""))?;
    let mut docs = reader.term_docs_reader();
    while let Some(term) = cursor.term() {
        if term.field != field {
            break;
        }
        let text = term.text.clone();
        docs.seek(Some(cursor.info()))?;
        f(&text, &mut docs)?;
        if !cursor.next()? {
            break;
        }
    }
    Ok(())
}

fn first_term(reader: &SegmentReader, field: &str) -> Result<Option<String>> {
    let cursor = reader.terms_from(&Term::new(field, ""))?;
    Ok(cursor
        .term()
        .filter(|t| t.field == field)
        .map(|t| t.text.clone()))
}

fn build_string_index(reader: &SegmentReader, field: &str) -> Result<StringIndex> {
    let max_doc = reader.max_doc() as usize;
    let mut order = vec![0u32; max_doc];
    let mut lookup: Vec<Option<String>> = vec![None];
    for_each_term(reader, field, |text, docs| {
        if lookup.len() > max_doc {
            return Err(Error::invalid_argument(format!(
                "field {} has more terms than documents",
                field
            )));
        }
        let number = lookup.len() as u32;
        lookup.push(Some(text.to_string()));
        fill(docs, |doc| order[doc as usize] = number)
    })?;
    Ok(StringIndex { order, lookup })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_parsing_accepts_suffixes() {
        assert_eq!(parse_float("1.5f"), Some(1.5));
        assert_eq!(parse_float(" -2e3 "), Some(-2000.0));
        assert_eq!(parse_float("abc"), None);
    }

    #[test]
    fn number_patterns() {
        let int = compile(INT_PATTERN).unwrap();
        let float = compile(FLOAT_PATTERN).unwrap();
        assert!(int.is_match("-42"));
        assert!(!int.is_match("4.2"));
        assert!(float.is_match("4.2"));
        assert!(float.is_match(".5e-3"));
        assert!(!float.is_match("NaN"));
        assert!(!float.is_match("apple"));
    }

    #[test]
    fn string_index_reads_lookup() {
        let index = StringIndex {
            order: vec![0, 2, 1],
            lookup: vec![None, Some("a".to_string()), Some("b".to_string())],
        };
        assert_eq!(index.value(0), None);
        assert_eq!(index.value(1), Some("b"));
    }
}
