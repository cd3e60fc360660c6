use serde::{Deserialize, Serialize};

use crate::core::types::DocId;
use crate::search::sort::{SortField, SortValue};

/// Document with relevance score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDoc {
    pub doc: DocId,
    pub score: f32,
}

/// Best hits of a search, highest score first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopDocs {
    pub total_hits: usize,     // Every document with a positive score
    pub score_docs: Vec<ScoreDoc>,
    pub max_score: f32,
}

/// Hit of a sorted search, carrying the keys it was sorted by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDoc {
    pub doc: DocId,
    pub score: f32,
    pub fields: Vec<SortValue>, // One key per sort field
}

#[derive(Debug, Clone)]
pub struct TopFieldDocs {
    pub total_hits: usize,
    pub field_docs: Vec<FieldDoc>,
    pub sort_fields: Vec<SortField>,
    pub max_score: f32,
}

impl TopDocs {
    pub fn is_empty(&self) -> bool {
        self.score_docs.is_empty()
    }

    pub fn docs(&self) -> Vec<DocId> {
        self.score_docs.iter().map(|d| d.doc).collect()
    }
}

impl TopFieldDocs {
    pub fn docs(&self) -> Vec<DocId> {
        self.field_docs.iter().map(|d| d.doc).collect()
    }
}

/// Heap order of a hit queue: lowest score on top, later document first
/// among equal scores.
pub(crate) fn hit_less(a: &ScoreDoc, b: &ScoreDoc) -> bool {
    if a.score == b.score {
        a.doc > b.doc
    } else {
        a.score < b.score
    }
}
