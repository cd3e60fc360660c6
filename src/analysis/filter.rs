use crate::analysis::token::Token;

/// Rewrites or drops tokens in place.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: &mut Vec<Token>);

    fn name(&self) -> &str;
}
