pub mod deletions;
pub mod field_cache;
pub mod field_infos;
pub mod index_writer;
pub mod iterator;
pub mod merger;
pub mod multi_term;
pub mod norms;
pub mod postings_writer;
pub mod segment_term_docs;
pub mod stored_fields;
pub mod term;
pub mod term_dictionary;
pub mod term_vectors;
