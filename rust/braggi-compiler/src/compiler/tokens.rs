//! Token model for the Braggi language.

use braggi_core::source::SourcePosition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    Identifier,
    Keyword,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    CharLiteral,
    Operator,
    Punctuation,
    Comment,
    Whitespace,
    Newline,
    Eof,
    Invalid,
}

impl TokenType {
    /// Trivia never reaches the entropy field.
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenType::Whitespace | TokenType::Comment | TokenType::Newline)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::Identifier => "identifier",
            TokenType::Keyword => "keyword",
            TokenType::IntLiteral => "integer literal",
            TokenType::FloatLiteral => "float literal",
            TokenType::StringLiteral => "string literal",
            TokenType::CharLiteral => "char literal",
            TokenType::Operator => "operator",
            TokenType::Punctuation => "punctuation",
            TokenType::Comment => "comment",
            TokenType::Whitespace => "whitespace",
            TokenType::Newline => "newline",
            TokenType::Eof => "end of input",
            TokenType::Invalid => "invalid token",
        };
        write!(f, "{}", name)
    }
}

/// Reserved words. Regime names are reserved so a `regime` clause can never
/// be shadowed by an identifier.
pub const KEYWORDS: &[&str] = &[
    "fn",
    "let",
    "region",
    "regime",
    "periscope",
    "to",
    "type",
    "import",
    "FIFO",
    "FILO",
    "SEQ",
    "RAND",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// An immutable token. Ownership passes from the tokenizer to the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub ty: TokenType,
    pub text: String,
    pub position: SourcePosition,
}

impl Token {
    pub fn new(ty: TokenType, text: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            ty,
            text: text.into(),
            position,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            TokenType::Eof => write!(f, "<eof>"),
            _ => write!(f, "{}", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivia_classes() {
        assert!(TokenType::Whitespace.is_trivia());
        assert!(TokenType::Comment.is_trivia());
        assert!(TokenType::Newline.is_trivia());
        assert!(!TokenType::Eof.is_trivia());
        assert!(!TokenType::Invalid.is_trivia());
    }

    #[test]
    fn keyword_table() {
        assert!(is_keyword("periscope"));
        assert!(is_keyword("FIFO"));
        assert!(!is_keyword("main"));
    }
}
