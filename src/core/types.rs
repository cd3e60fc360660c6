use serde::{Deserialize, Serialize};

/// Segment-local or index-wide document number.
pub type DocId = u32;

/// Returned by `doc()` once an iterator is exhausted.
pub const NO_MORE_DOCS: DocId = u32::MAX;

/// What a segment keeps of an indexed field's terms per document, beyond
/// the inverted postings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TermVector {
    #[default]
    No,
    /// Terms and their frequencies.
    Yes,
    /// Terms, frequencies and positions.
    WithPositions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub stored: bool,
    pub indexed: bool,
    pub tokenized: bool,
    pub term_vector: TermVector,
    pub boost: f32,
}

impl Field {
    fn with_flags(name: &str, value: &str, stored: bool, indexed: bool, tokenized: bool) -> Self {
        Field {
            name: name.to_string(),
            value: value.to_string(),
            stored,
            indexed,
            tokenized,
            term_vector: TermVector::No,
            boost: 1.0,
        }
    }

    /// Stored and indexed as a single term.
    pub fn keyword(name: &str, value: &str) -> Self {
        Self::with_flags(name, value, true, true, false)
    }

    /// Stored, analyzed and indexed.
    pub fn text(name: &str, value: &str) -> Self {
        Self::with_flags(name, value, true, true, true)
    }

    /// Stored only.
    pub fn unindexed(name: &str, value: &str) -> Self {
        Self::with_flags(name, value, true, false, false)
    }

    /// Analyzed and indexed, not stored.
    pub fn unstored(name: &str, value: &str) -> Self {
        Self::with_flags(name, value, false, true, true)
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Only takes effect on indexed fields.
    pub fn with_term_vector(mut self, term_vector: TermVector) -> Self {
        self.term_vector = term_vector;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub fields: Vec<Field>,
    pub boost: f32,
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            fields: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn get_values(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }
}
