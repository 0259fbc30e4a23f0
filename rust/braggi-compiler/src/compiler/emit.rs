//! Output adapter: walks a collapsed field and feeds an emitter.
//!
//! The adapter guarantees collapsed-ness and source order; it never
//! interprets state payloads. Backends implement [`Emitter`] — the core
//! ships a source passthrough and a debug token dump.

use crate::compiler::field::{EntropyField, State};
use crate::compiler::tokens::{Token, TokenType};
use braggi_core::diagnostics::{Category, Diagnostic, Reporter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("propagation incomplete: '{token}' still has {candidates} candidates")]
    Uncollapsed { token: String, candidates: usize },
    #[error("emission skipped after a fatal diagnostic")]
    SkippedAfterFatal,
    #[error("emitter failure: {0}")]
    Backend(String),
}

/// A pluggable backend. `begin` is called once, `emit` once per cell in
/// source order, `finish` once at the end.
pub trait Emitter {
    fn begin(&mut self) -> Result<(), EmitError> {
        Ok(())
    }
    fn emit(&mut self, token: &Token, state: &State) -> Result<(), EmitError>;
    fn finish(&mut self) -> Result<(), EmitError> {
        Ok(())
    }
}

/// Collect the `(token, chosen state)` pairs of a fully collapsed field.
pub fn collapsed_output(field: &EntropyField) -> Result<Vec<(&Token, &State)>, EmitError> {
    let mut out = Vec::with_capacity(field.cells().len());
    for cell in field.cells() {
        match cell.chosen() {
            Some(state) => out.push((&cell.token, state)),
            None => {
                return Err(EmitError::Uncollapsed {
                    token: cell.token.to_string(),
                    candidates: cell.entropy(),
                })
            }
        }
    }
    Ok(out)
}

/// Drive an emitter over the collapsed field. An uncollapsed cell is a
/// Fatal diagnostic.
pub fn drive(
    field: &EntropyField,
    emitter: &mut dyn Emitter,
    reporter: &mut Reporter,
) -> Result<(), EmitError> {
    let pairs = match collapsed_output(field) {
        Ok(pairs) => pairs,
        Err(err) => {
            let mut diagnostic =
                Diagnostic::fatal(Category::Propagation, "Propagation incomplete")
                    .with_detail(err.to_string())
                    .from_component("output adapter");
            if let Some(cell) = field.cells().iter().find(|c| !c.is_collapsed()) {
                diagnostic = diagnostic.at(cell.position());
            }
            reporter.report(diagnostic);
            return Err(err);
        }
    };
    emitter.begin()?;
    for (token, state) in pairs {
        emitter.emit(token, state)?;
    }
    emitter.finish()
}

/// Passthrough backend: reconstructs the token stream as text, one source
/// line per input line.
#[derive(Debug, Default)]
pub struct SourceEmitter {
    line: usize,
    out: String,
}

impl SourceEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_output(self) -> String {
        self.out
    }
}

impl Emitter for SourceEmitter {
    fn emit(&mut self, token: &Token, _state: &State) -> Result<(), EmitError> {
        if token.ty == TokenType::Eof {
            return Ok(());
        }
        if self.line != 0 && token.position.line > self.line {
            self.out.push('\n');
        } else if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push(' ');
        }
        self.line = token.position.line;
        self.out.push_str(&token.text);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EmitError> {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        Ok(())
    }
}

/// Debug backend: one line per cell with position, token, and chosen state.
#[derive(Debug, Default)]
pub struct TokenDumpEmitter {
    out: String,
}

impl TokenDumpEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_output(self) -> String {
        self.out
    }
}

impl Emitter for TokenDumpEmitter {
    fn emit(&mut self, token: &Token, state: &State) -> Result<(), EmitError> {
        self.out.push_str(&format!(
            "{}:{} {} '{}' -> {}\n",
            token.position.line, token.position.column, token.ty, token, state.label
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::field::EntropyField;
    use crate::compiler::grammar::Role;
    use braggi_core::diagnostics::Severity;
    use braggi_core::source::{SourceId, SourcePosition};

    fn collapsed_field() -> EntropyField {
        let mut field = EntropyField::new(SourceId(0));
        for (i, text) in ["let", "v"].iter().enumerate() {
            let cell = field.add_cell(Token::new(
                if i == 0 {
                    TokenType::Keyword
                } else {
                    TokenType::Identifier
                },
                *text,
                SourcePosition::new(SourceId(0), 1, 1 + i * 4, text.len(), i * 4),
            ));
            let role = if i == 0 { Role::KwLet } else { Role::LetName };
            field.add_state(cell, role, 1).unwrap();
        }
        field
    }

    #[test]
    fn output_is_in_cell_order() {
        let field = collapsed_field();
        let pairs = collapsed_output(&field).unwrap();
        let texts: Vec<_> = pairs.iter().map(|(t, _)| t.text.as_str()).collect();
        assert_eq!(texts, vec!["let", "v"]);
        assert_eq!(pairs[1].1.role, Role::LetName);
    }

    #[test]
    fn uncollapsed_cell_is_fatal() {
        let mut field = collapsed_field();
        let cell = field.add_cell(Token::new(
            TokenType::Identifier,
            "x",
            SourcePosition::start_of(SourceId(0)),
        ));
        field.add_state(cell, Role::VarRef, 1).unwrap();
        field.add_state(cell, Role::FreeRef, 1).unwrap();

        let mut reporter = Reporter::new();
        let mut emitter = SourceEmitter::new();
        let result = drive(&field, &mut emitter, &mut reporter);
        assert!(result.is_err());
        assert!(reporter.is_fatal());
        let diagnostic = &reporter.diagnostics()[0];
        assert_eq!(diagnostic.severity, Severity::Fatal);
        assert_eq!(diagnostic.category, Category::Propagation);
        assert_eq!(diagnostic.message, "Propagation incomplete");
    }

    #[test]
    fn source_emitter_rebuilds_the_line() {
        let field = collapsed_field();
        let mut reporter = Reporter::new();
        let mut emitter = SourceEmitter::new();
        drive(&field, &mut emitter, &mut reporter).unwrap();
        assert_eq!(emitter.into_output(), "let v\n");
    }
}
