//! Stable error codes, one family per diagnostic category.
//!
//! Codes are part of the tool contract: editors filter on them and users
//! search for them, so existing codes never change meaning.

use braggi_core::diagnostics::{Category, Diagnostic, Severity};

pub fn category_code(category: Category) -> &'static str {
    match category {
        Category::General => "B0000",
        Category::Syntax => "B0100",
        Category::Semantic => "B0200",
        Category::Type => "B0300",
        Category::Region => "B0400",
        Category::Regime => "B0410",
        Category::Periscope => "B0420",
        Category::Constraint => "B0500",
        Category::Propagation => "B0600",
        Category::Io => "B0700",
        Category::Memory => "B0800",
        Category::Internal => "B0900",
    }
}

/// Code for a diagnostic; warnings and notes share the family with a
/// distinct suffix so severity filters stay simple.
pub fn diagnostic_code(diagnostic: &Diagnostic) -> String {
    let base = category_code(diagnostic.category);
    match diagnostic.severity {
        Severity::Error | Severity::Fatal => base.to_string(),
        Severity::Warning => format!("{}W", base),
        Severity::Note => format!("{}N", base),
    }
}
