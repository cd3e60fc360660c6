use std::fmt;

use serde::{Deserialize, Serialize};

/// A word in a field. Ordered by field name, then by text, both bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: &str, text: &str) -> Self {
        Term {
            field: field.to_string(),
            text: text.to_string(),
        }
    }

    /// Same field, different text.
    pub fn with_text(&self, text: &str) -> Self {
        Term {
            field: self.field.clone(),
            text: text.to_string(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Dictionary entry payload for one term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub freq_pointer: u64,
    pub prox_pointer: u64,
    /// Distance from `freq_pointer` to the skip data; 0 when the term has no skips.
    pub skip_offset: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_orders_before_text() {
        let mut terms = vec![
            Term::new("title", "apple"),
            Term::new("body", "zebra"),
            Term::new("body", "Zebra"),
            Term::new("body", ""),
        ];
        terms.sort();
        assert_eq!(
            terms,
            vec![
                Term::new("body", ""),
                Term::new("body", "Zebra"),
                Term::new("body", "zebra"),
                Term::new("title", "apple"),
            ]
        );
    }
}
