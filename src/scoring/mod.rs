pub mod boolean_scorer;
pub mod conjunction;
pub mod phrase_scorer;
pub mod scorer;
pub mod similarity;
pub mod spans;
pub mod term_scorer;
