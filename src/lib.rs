pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod mmap;
pub mod compression;

pub use crate::core::config::IndexConfig;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{DocId, Document, Field, TermVector};
pub use crate::index::index_writer::IndexWriter;
pub use crate::index::term::Term;
pub use crate::index::term_vectors::{SegmentTermVector, TermFreqVector, TermPositionVector};
pub use crate::query::ast::{BoolQuery, Occur, PhraseQuery, Query, SpanQuery};
pub use crate::search::searcher::IndexSearcher;
