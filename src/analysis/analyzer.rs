use rust_stemmers::Algorithm;

use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer, WhitespaceTokenizer};

/// Tokenizer followed by filters, applied in order.
pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    filters: Vec<Box<dyn TokenFilter>>,
    name: String,
}

impl Analyzer {
    pub fn new(name: &str, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn with_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `field` is accepted for per-field analyzers; the pipeline ignores it.
    pub fn analyze(&self, _field: &str, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);
        for filter in &self.filters {
            filter.filter(&mut tokens);
        }
        tokens
    }

    /// Unicode words, lowercased, English stop words removed.
    pub fn standard() -> Self {
        Analyzer::new("standard", Box::new(StandardTokenizer::default()))
            .with_filter(Box::new(LowercaseFilter))
            .with_filter(Box::new(StopFilter::english()))
    }

    /// Whitespace separated, nothing else.
    pub fn whitespace() -> Self {
        Analyzer::new("whitespace", Box::new(WhitespaceTokenizer))
    }

    /// Standard plus Snowball English stemming.
    pub fn english() -> Self {
        Analyzer::standard().with_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|f| f.name()).collect();
        f.debug_struct("Analyzer")
            .field("name", &self.name)
            .field("tokenizer", &self.tokenizer.name())
            .field("filters", &filters)
            .finish()
    }
}
