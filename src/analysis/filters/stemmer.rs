use rust_stemmers::{Algorithm, Stemmer};

use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Snowball stemming.
pub struct StemmerFilter {
    stemmer: Stemmer,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter {
            stemmer: Stemmer::create(algorithm),
        }
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, tokens: &mut Vec<Token>) {
        for token in tokens.iter_mut() {
            let stemmed = self.stemmer.stem(&token.text);
            if stemmed != token.text.as_str() {
                token.text = stemmed.into_owned();
            }
        }
    }

    fn name(&self) -> &str {
        "stemmer"
    }
}
