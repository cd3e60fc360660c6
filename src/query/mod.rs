pub mod ast;
pub mod rewrite;
pub mod weight;
