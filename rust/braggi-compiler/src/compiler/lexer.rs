//! Tokenizer for Braggi source code.
//!
//! Anomalies do not abort: each one becomes a Syntax diagnostic plus an
//! `Invalid` token, and lexing continues. The engine turns surviving
//! `Invalid` tokens into a contradiction during initial propagation.

use crate::compiler::tokens::{is_keyword, Token, TokenType};
use braggi_core::diagnostics::{Category, Diagnostic, Reporter, Severity};
use braggi_core::source::{SourceId, SourcePosition};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, col {col}")]
    UnexpectedChar { ch: char, line: usize, col: usize },
    #[error("unterminated string literal at line {line}, col {col}")]
    UnterminatedString { line: usize, col: usize },
    #[error("unterminated char literal at line {line}, col {col}")]
    UnterminatedChar { line: usize, col: usize },
    #[error("unterminated block comment at line {line}, col {col}")]
    UnterminatedBlockComment { line: usize, col: usize },
}

impl LexError {
    fn into_diagnostic(self, position: SourcePosition) -> Diagnostic {
        let suggestion = match &self {
            LexError::UnterminatedString { .. } => Some("add a closing quote"),
            LexError::UnterminatedChar { .. } => Some("add a closing single quote"),
            LexError::UnterminatedBlockComment { .. } => Some("add a closing */"),
            LexError::UnexpectedChar { .. } => None,
        };
        let mut diag = Diagnostic::new(Category::Syntax, Severity::Error, self.to_string())
            .at(position)
            .from_component("tokenizer");
        if let Some(s) = suggestion {
            diag = diag.with_suggestion(s);
        }
        diag
    }
}

/// Single-pass character-cursor lexer. Operators and punctuation are always
/// one character wide; compound operators such as `->` are left to the
/// grammar, which sees them as two adjacent cells.
pub struct Lexer {
    source: Vec<char>,
    source_id: SourceId,
    pos: usize,
    line: usize,
    col: usize,
    byte_offset: usize,
}

const OPERATORS: &str = "+-*/%=<>!&|^~?.";
const PUNCTUATION: &str = "(){}[],:;";

impl Lexer {
    pub fn new(source_id: SourceId, text: &str) -> Self {
        Self {
            source: text.chars().collect(),
            source_id,
            pos: 0,
            line: 1,
            col: 1,
            byte_offset: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.pos).copied()?;
        self.pos += 1;
        self.byte_offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn mark(&self) -> (usize, usize, usize) {
        (self.line, self.col, self.byte_offset)
    }

    fn position_from(&self, mark: (usize, usize, usize)) -> SourcePosition {
        SourcePosition::new(
            self.source_id,
            mark.0,
            mark.1,
            self.byte_offset - mark.2,
            mark.2,
        )
    }

    /// Tokenize the whole source. The result always ends with exactly one
    /// `Eof` token; anomalies are reported and lexing continues.
    pub fn tokenize(mut self, reporter: &mut Reporter) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.current() {
            let mark = self.mark();
            match ch {
                ' ' | '\t' | '\r' => {
                    let mut text = String::new();
                    while matches!(self.current(), Some(' ') | Some('\t') | Some('\r')) {
                        text.push(self.advance().unwrap());
                    }
                    tokens.push(Token::new(TokenType::Whitespace, text, self.position_from(mark)));
                }
                '\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenType::Newline, "\n", self.position_from(mark)));
                }
                '/' if self.peek() == Some('/') => {
                    let mut text = String::new();
                    while let Some(c) = self.current() {
                        if c == '\n' {
                            break;
                        }
                        text.push(self.advance().unwrap());
                    }
                    tokens.push(Token::new(TokenType::Comment, text, self.position_from(mark)));
                }
                '/' if self.peek() == Some('*') => {
                    tokens.push(self.block_comment(mark, reporter));
                }
                '"' => {
                    tokens.push(self.string_literal(mark, reporter));
                }
                '\'' => {
                    tokens.push(self.char_literal(mark, reporter));
                }
                c if c.is_ascii_digit() => {
                    tokens.push(self.number(mark));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let mut text = String::new();
                    while let Some(c) = self.current() {
                        if c.is_alphanumeric() || c == '_' {
                            text.push(self.advance().unwrap());
                        } else {
                            break;
                        }
                    }
                    let ty = if is_keyword(&text) {
                        TokenType::Keyword
                    } else {
                        TokenType::Identifier
                    };
                    tokens.push(Token::new(ty, text, self.position_from(mark)));
                }
                c if OPERATORS.contains(c) => {
                    self.advance();
                    tokens.push(Token::new(
                        TokenType::Operator,
                        c.to_string(),
                        self.position_from(mark),
                    ));
                }
                c if PUNCTUATION.contains(c) => {
                    self.advance();
                    tokens.push(Token::new(
                        TokenType::Punctuation,
                        c.to_string(),
                        self.position_from(mark),
                    ));
                }
                c => {
                    self.advance();
                    let position = self.position_from(mark);
                    reporter.report(
                        LexError::UnexpectedChar {
                            ch: c,
                            line: mark.0,
                            col: mark.1,
                        }
                        .into_diagnostic(position),
                    );
                    tokens.push(Token::new(TokenType::Invalid, c.to_string(), position));
                }
            }
        }
        let eof_pos = SourcePosition::new(self.source_id, self.line, self.col, 0, self.byte_offset);
        tokens.push(Token::new(TokenType::Eof, "", eof_pos));
        tokens
    }

    fn block_comment(&mut self, mark: (usize, usize, usize), reporter: &mut Reporter) -> Token {
        let mut text = String::new();
        text.push(self.advance().unwrap()); // '/'
        text.push(self.advance().unwrap()); // '*'
        loop {
            match self.current() {
                Some('*') if self.peek() == Some('/') => {
                    text.push(self.advance().unwrap());
                    text.push(self.advance().unwrap());
                    return Token::new(TokenType::Comment, text, self.position_from(mark));
                }
                Some(_) => {
                    text.push(self.advance().unwrap());
                }
                None => {
                    let position = self.position_from(mark);
                    reporter.report(
                        LexError::UnterminatedBlockComment {
                            line: mark.0,
                            col: mark.1,
                        }
                        .into_diagnostic(position),
                    );
                    return Token::new(TokenType::Invalid, text, position);
                }
            }
        }
    }

    fn string_literal(&mut self, mark: (usize, usize, usize), reporter: &mut Reporter) -> Token {
        let mut text = String::new();
        text.push(self.advance().unwrap()); // opening quote
        loop {
            match self.current() {
                Some('"') => {
                    text.push(self.advance().unwrap());
                    return Token::new(TokenType::StringLiteral, text, self.position_from(mark));
                }
                Some('\\') => {
                    text.push(self.advance().unwrap());
                    if let Some(c) = self.current() {
                        text.push(c);
                        self.advance();
                    }
                }
                Some('\n') | None => {
                    let position = self.position_from(mark);
                    reporter.report(
                        LexError::UnterminatedString {
                            line: mark.0,
                            col: mark.1,
                        }
                        .into_diagnostic(position),
                    );
                    return Token::new(TokenType::Invalid, text, position);
                }
                Some(_) => {
                    text.push(self.advance().unwrap());
                }
            }
        }
    }

    fn char_literal(&mut self, mark: (usize, usize, usize), reporter: &mut Reporter) -> Token {
        let mut text = String::new();
        text.push(self.advance().unwrap()); // opening quote
        if self.current() == Some('\\') {
            text.push(self.advance().unwrap());
        }
        match self.current() {
            Some(c) if c != '\'' && c != '\n' => {
                text.push(c);
                self.advance();
            }
            _ => {}
        }
        if self.current() == Some('\'') {
            text.push(self.advance().unwrap());
            return Token::new(TokenType::CharLiteral, text, self.position_from(mark));
        }
        let position = self.position_from(mark);
        reporter.report(
            LexError::UnterminatedChar {
                line: mark.0,
                col: mark.1,
            }
            .into_diagnostic(position),
        );
        Token::new(TokenType::Invalid, text, position)
    }

    fn number(&mut self, mark: (usize, usize, usize)) -> Token {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                text.push(self.advance().unwrap());
            } else {
                break;
            }
        }
        if self.current() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
            while let Some(c) = self.current() {
                if c.is_ascii_digit() {
                    text.push(self.advance().unwrap());
                } else {
                    break;
                }
            }
            return Token::new(TokenType::FloatLiteral, text, self.position_from(mark));
        }
        Token::new(TokenType::IntLiteral, text, self.position_from(mark))
    }
}

/// Non-trivia tokens in source order, Eof included.
pub fn filter_trivia(tokens: Vec<Token>) -> Vec<Token> {
    tokens.into_iter().filter(|t| !t.ty.is_trivia()).collect()
}
