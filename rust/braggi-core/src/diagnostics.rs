//! Structured diagnostics and the ordered reporter.

use crate::source::{SourceId, SourcePosition};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// What went wrong, by subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum Category {
    Syntax,
    Semantic,
    Type,
    Region,
    Regime,
    Periscope,
    Constraint,
    Propagation,
    Io,
    Memory,
    Internal,
    General,
}

/// Severity ordering matters: `Error` and above set the reporter's sticky
/// error flag, `Fatal` short-circuits subsequent phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

/// A single structured diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub category: Category,
    pub severity: Severity,
    pub position: Option<SourcePosition>,
    pub source: Option<SourceId>,
    pub message: String,
    pub detail: Option<String>,
    pub suggestions: Vec<String>,
    /// Originating component, e.g. "tokenizer" or "propagator".
    pub component: String,
}

impl Diagnostic {
    pub fn new(category: Category, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            severity,
            position: None,
            source: None,
            message: message.into(),
            detail: None,
            suggestions: Vec::new(),
            component: String::new(),
        }
    }

    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Error, message)
    }

    pub fn fatal(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Fatal, message)
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.source = Some(position.source);
        self.position = Some(position);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn from_component(mut self, component: impl Into<String>) -> Self {
        self.component = component.into();
        self
    }
}

/// Collects diagnostics in the order they are produced.
#[derive(Debug, Default)]
pub struct Reporter {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
    fatal: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        if diagnostic.severity >= Severity::Error {
            self.has_errors = true;
        }
        if diagnostic.severity == Severity::Fatal {
            self.fatal = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Sticky: true once any `Error` or `Fatal` diagnostic was reported.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// True once a `Fatal` diagnostic was reported; later phases must not run.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_error_flag() {
        let mut reporter = Reporter::new();
        reporter.report(Diagnostic::new(Category::Syntax, Severity::Note, "fyi"));
        assert!(!reporter.has_errors());
        reporter.report(Diagnostic::error(Category::Region, "bad periscope"));
        assert!(reporter.has_errors());
        reporter.report(Diagnostic::new(Category::General, Severity::Note, "later"));
        assert!(reporter.has_errors());
        assert!(!reporter.is_fatal());
    }

    #[test]
    fn fatal_flag() {
        let mut reporter = Reporter::new();
        reporter.report(Diagnostic::fatal(Category::Propagation, "incomplete"));
        assert!(reporter.has_errors());
        assert!(reporter.is_fatal());
    }

    #[test]
    fn order_is_preserved() {
        let mut reporter = Reporter::new();
        for i in 0..5 {
            reporter.report(Diagnostic::error(Category::Syntax, format!("e{}", i)));
        }
        let messages: Vec<_> = reporter.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["e0", "e1", "e2", "e3", "e4"]);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }
}
