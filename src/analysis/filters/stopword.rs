use std::collections::HashSet;

use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

pub struct StopFilter {
    stop_words: HashSet<String>,
}

impl StopFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopFilter {
            stop_words: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn english() -> Self {
        StopFilter::new(ENGLISH_STOP_WORDS.iter().copied())
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl TokenFilter for StopFilter {
    fn filter(&self, tokens: &mut Vec<Token>) {
        tokens.retain(|t| !self.stop_words.contains(&t.text));
    }

    fn name(&self) -> &str {
        "stop"
    }
}
