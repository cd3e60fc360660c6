pub mod collector;
pub mod filter;
pub mod fuzzy;
pub mod prefix;
pub mod query_term_vector;
pub mod results;
pub mod searcher;
pub mod sort;
pub mod term_enum;
