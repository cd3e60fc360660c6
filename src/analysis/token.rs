/// One unit of analyzed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32, // Ordinal among the tokenizer's output
    pub offset: usize, // Byte offset in the source text
    pub length: usize, // Byte length in the source text
}

impl Token {
    pub fn new(text: String, position: u32, offset: usize, length: usize) -> Self {
        Token {
            text,
            position,
            offset,
            length,
        }
    }
}
