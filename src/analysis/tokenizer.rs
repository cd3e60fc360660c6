use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::Token;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Unicode word boundaries (UAX #29). Punctuation and whitespace are dropped.
#[derive(Debug, Clone)]
pub struct StandardTokenizer {
    pub lowercase: bool,
    pub max_token_length: usize,
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for (offset, word) in text.unicode_word_indices() {
            // Overlong words are skipped without consuming a position
            if word.len() > self.max_token_length {
                continue;
            }
            let token_text = if self.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            tokens.push(Token::new(token_text, position, offset, word.len()));
            position += 1;
        }
        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Splits on whitespace only; keeps case and punctuation.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (i, c) in text.char_indices() {
            match (c.is_whitespace(), start) {
                (true, Some(s)) => {
                    tokens.push(Token::new(text[s..i].to_string(), tokens.len() as u32, s, i - s));
                    start = None;
                }
                (false, None) => start = Some(i),
                _ => {}
            }
        }
        if let Some(s) = start {
            tokens.push(Token::new(text[s..].to_string(), tokens.len() as u32, s, text.len() - s));
        }
        tokens
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tracks_offsets_across_punctuation() {
        let tokens = StandardTokenizer::default().tokenize("Hello, World! It's 42.");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "world", "it's", "42"]);
        assert_eq!(tokens[1].offset, 7);
        assert_eq!(tokens[1].length, 5);
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn whitespace_keeps_everything_else() {
        let tokens = WhitespaceTokenizer.tokenize("  a-b  C\td ");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a-b", "C", "d"]);
        assert_eq!(tokens[0].offset, 2);
        assert_eq!(tokens[2].position, 2);
    }
}
