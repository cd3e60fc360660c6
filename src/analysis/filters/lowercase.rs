use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, tokens: &mut Vec<Token>) {
        for token in tokens.iter_mut() {
            if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}
