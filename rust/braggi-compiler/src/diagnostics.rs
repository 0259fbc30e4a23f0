//! Diagnostic rendering: plain text, ANSI for terminals, and the
//! LSP-shaped JSON array.

use crate::compiler::error_codes::diagnostic_code;
use braggi_core::diagnostics::{Diagnostic, Severity};
use braggi_core::source::SourceMap;
use serde_json::{json, Value};

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Note => "NOTE",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
        Severity::Fatal => "FATAL",
    }
}

/// Canonical textual form:
///
/// ```text
/// ERROR [Region]: Cannot collapse periscope from FILO to FIFO
///   at demo.bg:1:25-34
///   violated constraint: regime compatibility
///   suggestion: change source regime to SEQ, or target regime to FILO
/// ```
pub fn render_plain(diagnostic: &Diagnostic, sources: &SourceMap) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} [{}]: {}\n",
        severity_label(diagnostic.severity),
        diagnostic.category,
        diagnostic.message
    ));
    if let Some(position) = &diagnostic.position {
        let file = sources
            .get(position.source)
            .map(|s| s.name())
            .unwrap_or("<unknown>");
        out.push_str(&format!(
            "  at {}:{}:{}-{}\n",
            file,
            position.line,
            position.column,
            position.column + position.length
        ));
    }
    if let Some(detail) = &diagnostic.detail {
        out.push_str(&format!("  {}\n", detail));
    }
    for suggestion in &diagnostic.suggestions {
        out.push_str(&format!("  suggestion: {}\n", suggestion));
    }
    out
}

/// ANSI variant for terminals, with the offending source line underlined.
pub fn render_ansi(diagnostic: &Diagnostic, sources: &SourceMap) -> String {
    let color = match diagnostic.severity {
        Severity::Note => cyan,
        Severity::Warning => yellow,
        Severity::Error | Severity::Fatal => red,
    };
    let mut out = String::new();
    out.push_str(&color(&format!(
        "{} [{}]",
        severity_label(diagnostic.severity),
        diagnostic.category
    )));
    out.push_str(&gray(&format!(" {}", diagnostic_code(diagnostic))));
    out.push_str(&format!(": {}\n", bold(&diagnostic.message)));

    if let Some(position) = &diagnostic.position {
        if let Some(source) = sources.get(position.source) {
            out.push_str(&gray(&format!(
                "  at {}:{}:{}-{}\n",
                source.name(),
                position.line,
                position.column,
                position.column + position.length
            )));
            if let Some(line_text) = source.line_text(position.line) {
                let line_str = position.line.to_string();
                out.push_str(&format!("  {} | {}\n", gray(&line_str), line_text));
                let carets = "^".repeat(position.length.max(1));
                out.push_str(&format!(
                    "  {} | {}{}\n",
                    " ".repeat(line_str.len()),
                    " ".repeat(position.column.saturating_sub(1)),
                    red(&carets)
                ));
            }
        }
    }
    if let Some(detail) = &diagnostic.detail {
        out.push_str(&format!("  {}\n", detail));
    }
    for suggestion in &diagnostic.suggestions {
        out.push_str(&format!("  {}: {}\n", bold("suggestion"), suggestion));
    }
    out
}

/// Severity on the LSP scale: 1 error, 2 warning, 3 information.
fn lsp_severity(severity: Severity) -> u8 {
    match severity {
        Severity::Fatal | Severity::Error => 1,
        Severity::Warning => 2,
        Severity::Note => 3,
    }
}

/// The diagnostic array consumed by editors. Positions become 0-based
/// here and only here; everything internal stays 1-based.
pub fn diagnostics_to_json(diagnostics: &[Diagnostic]) -> Value {
    let items: Vec<Value> = diagnostics
        .iter()
        .map(|d| {
            let (line, character, end_character) = match &d.position {
                Some(p) => (
                    p.line.saturating_sub(1),
                    p.column.saturating_sub(1),
                    p.column.saturating_sub(1) + p.length,
                ),
                None => (0, 0, 0),
            };
            json!({
                "range": {
                    "start": { "line": line, "character": character },
                    "end": { "line": line, "character": end_character },
                },
                "message": d.message,
                "severity": lsp_severity(d.severity),
                "source": "braggi",
            })
        })
        .collect();
    Value::Array(items)
}

// ANSI color helpers
fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

fn cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

fn gray(s: &str) -> String {
    format!("\x1b[90m{}\x1b[0m", s)
}

fn bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use braggi_core::diagnostics::Category;
    use braggi_core::source::SourcePosition;

    fn sample() -> (Diagnostic, SourceMap) {
        let mut sources = SourceMap::new();
        let id = sources.add(
            "demo.bg",
            "region S regime FILO { let v = 1; periscope v to T { } }\n",
        );
        let diagnostic = Diagnostic::error(
            Category::Region,
            "Cannot collapse periscope from FILO to FIFO",
        )
        .at(SourcePosition::new(id, 1, 35, 9, 34))
        .with_detail("violated constraint: regime compatibility")
        .with_suggestion("change source regime to SEQ, or target regime to FILO");
        (diagnostic, sources)
    }

    #[test]
    fn plain_rendering_matches_the_canonical_form() {
        let (diagnostic, sources) = sample();
        let rendered = render_plain(&diagnostic, &sources);
        assert_eq!(
            rendered,
            "ERROR [Region]: Cannot collapse periscope from FILO to FIFO\n\
             \x20 at demo.bg:1:35-44\n\
             \x20 violated constraint: regime compatibility\n\
             \x20 suggestion: change source regime to SEQ, or target regime to FILO\n"
        );
    }

    #[test]
    fn ansi_rendering_contains_escape_codes_and_carets() {
        let (diagnostic, sources) = sample();
        let rendered = render_ansi(&diagnostic, &sources);
        assert!(rendered.contains("\x1b["));
        assert!(rendered.contains("^^^^^^^^^"));
        assert!(rendered.contains("periscope"));
        assert!(rendered.contains("B0400"));
    }

    #[test]
    fn json_positions_are_zero_based() {
        let (diagnostic, _sources) = sample();
        let value = diagnostics_to_json(std::slice::from_ref(&diagnostic));
        let item = &value[0];
        assert_eq!(item["range"]["start"]["line"], 0);
        assert_eq!(item["range"]["start"]["character"], 34);
        assert_eq!(item["range"]["end"]["character"], 43);
        assert_eq!(item["severity"], 1);
        assert_eq!(item["source"], "braggi");
    }

    #[test]
    fn diagnostics_without_positions_render_without_a_location_line() {
        let sources = SourceMap::new();
        let diagnostic = Diagnostic::fatal(Category::Propagation, "Propagation incomplete");
        let rendered = render_plain(&diagnostic, &sources);
        assert_eq!(rendered, "FATAL [Propagation]: Propagation incomplete\n");
    }
}
