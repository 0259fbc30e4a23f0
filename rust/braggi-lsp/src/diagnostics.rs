//! LSP diagnostics from core diagnostics.

use braggi_compiler::compiler::error_codes::diagnostic_code;
use braggi_core::diagnostics::{Diagnostic, Severity};
use lsp_types::{Diagnostic as LspDiagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

fn severity(severity: Severity) -> DiagnosticSeverity {
    match severity {
        Severity::Fatal | Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Note => DiagnosticSeverity::INFORMATION,
    }
}

/// Convert one core diagnostic. Lines and characters become 0-based here.
pub fn to_lsp_diagnostic(diagnostic: &Diagnostic) -> LspDiagnostic {
    let range = match &diagnostic.position {
        Some(position) => {
            let line = position.line.saturating_sub(1) as u32;
            let character = position.column.saturating_sub(1) as u32;
            Range {
                start: Position { line, character },
                end: Position {
                    line,
                    character: character + position.length as u32,
                },
            }
        }
        None => Range::default(),
    };
    let mut message = diagnostic.message.clone();
    for suggestion in &diagnostic.suggestions {
        message.push_str("\nsuggestion: ");
        message.push_str(suggestion);
    }
    LspDiagnostic {
        range,
        severity: Some(severity(diagnostic.severity)),
        code: Some(NumberOrString::String(diagnostic_code(diagnostic))),
        source: Some("braggi".to_string()),
        message,
        related_information: None,
        tags: None,
        code_description: None,
        data: None,
    }
}

pub fn to_lsp_diagnostics(diagnostics: &[Diagnostic]) -> Vec<LspDiagnostic> {
    diagnostics.iter().map(to_lsp_diagnostic).collect()
}
