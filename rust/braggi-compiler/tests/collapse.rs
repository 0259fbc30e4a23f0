//! End-to-end collapse scenarios.

use braggi_compiler::compile;
use braggi_compiler::compiler::emit::collapsed_output;
use braggi_compiler::compiler::grammar::Role;
use braggi_compiler::compiler::regions::{Direction, Regime};
use braggi_core::diagnostics::{Category, Severity};

#[test]
fn trivial_program_collapses_fully() {
    let context = compile("e1.bg", "fn main() -> Int { 0 }").unwrap();
    assert!(context.succeeded());
    assert!(context.diagnostics().is_empty());

    let pairs = collapsed_output(&context.field).unwrap();
    assert_eq!(pairs.len(), 11);
    let texts: Vec<&str> = pairs.iter().map(|(t, _)| t.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["fn", "main", "(", ")", "-", ">", "Int", "{", "0", "}", ""]
    );
    assert_eq!(pairs[1].1.role, Role::FnName);
    assert_eq!(pairs[6].1.role, Role::TypeName);
}

#[test]
fn empty_region_with_declared_regime() {
    let context = compile("e2.bg", "region R regime SEQ { }").unwrap();
    assert!(context.succeeded());
    assert!(context.diagnostics().is_empty());

    assert_eq!(context.regions.regions().len(), 1);
    let region = context.regions.find("R").unwrap();
    assert_eq!(region.regime, Regime::Seq);
    assert!(region.allocations.is_empty());
    assert!(region.parent.is_none());
}

#[test]
fn compatible_periscope_collapses() {
    let context = compile(
        "e3.bg",
        "region S regime SEQ { let v = 1; periscope v to T { } }\nregion T regime FIFO { }",
    )
    .unwrap();
    assert!(context.succeeded(), "{:?}", context.diagnostics());
    assert!(context.diagnostics().is_empty());

    let s = context.regions.find("S").unwrap();
    let t = context.regions.find("T").unwrap();
    assert_eq!(s.regime, Regime::Seq);
    assert_eq!(t.regime, Regime::Fifo);
    assert_eq!(context.regions.periscopes().len(), 1);
    let edge = &context.regions.periscopes()[0];
    assert_eq!(edge.source, Some(s.id));
    assert_eq!(edge.target, Some(t.id));
    assert_eq!(edge.direction, Direction::Out);
}

#[test]
fn incompatible_periscope_is_the_canonical_failure() {
    let context = compile(
        "e4.bg",
        "region S regime FILO { let v = 1; periscope v to T { } }\nregion T regime FIFO { }",
    )
    .unwrap();
    assert!(!context.succeeded());
    assert!(context.field.has_contradiction());

    // Contradiction anchors at the periscope token cell.
    let info = context.field.contradiction().unwrap();
    assert_eq!(context.field.cell(info.cell).token.text, "periscope");

    assert_eq!(context.diagnostics().len(), 1);
    let diagnostic = &context.diagnostics()[0];
    assert_eq!(diagnostic.category, Category::Region);
    assert_eq!(diagnostic.severity, Severity::Error);
    assert!(diagnostic.message.contains("FILO"));
    assert!(diagnostic.message.contains("FIFO"));
    assert_eq!(
        diagnostic.suggestions,
        vec!["change source regime to SEQ, or target regime to FILO".to_string()]
    );
}

#[test]
fn unterminated_string_reports_syntax_then_contradiction() {
    let context = compile("e5.bg", "fn main() -> Int { \"hello }").unwrap();
    assert!(!context.succeeded());
    assert!(context.field.has_contradiction());

    let first = &context.diagnostics()[0];
    assert_eq!(first.category, Category::Syntax);
    assert_eq!(first.component, "tokenizer");
    assert!(first.message.contains("unterminated string"));
    // The engine still surfaced a contradiction afterwards.
    assert!(context.diagnostics().len() >= 2);
}

#[test]
fn ambiguous_identifier_resolves_by_weight() {
    // `foo` in expression position is matchable by two alternatives
    // (binding reference vs. free reference); the heavier one wins.
    let context = compile("e6.bg", "fn main() -> Int { foo }").unwrap();
    assert!(context.succeeded());
    assert!(context.diagnostics().is_empty());

    let foo = context
        .field
        .cells()
        .iter()
        .find(|c| c.token.text == "foo")
        .unwrap();
    assert_eq!(foo.chosen().unwrap().role, Role::VarRef);
}

#[test]
fn nested_regions_inherit_containment() {
    let context = compile(
        "nested.bg",
        "region Outer regime SEQ { let a = 1; region Inner regime SEQ { let b = 2; } }",
    )
    .unwrap();
    assert!(context.succeeded(), "{:?}", context.diagnostics());
    let outer = context.regions.find("Outer").unwrap();
    let inner = context.regions.find("Inner").unwrap();
    assert_eq!(inner.parent, Some(outer.id));
    assert_eq!(outer.allocations.len(), 1);
    assert_eq!(inner.allocations.len(), 1);
}

#[test]
fn periscope_to_unknown_target_is_a_region_error() {
    let context = compile(
        "unknown.bg",
        "region S regime SEQ { periscope 1 to Missing { } }",
    )
    .unwrap();
    assert!(!context.succeeded());
    let diagnostic = &context.diagnostics()[0];
    assert_eq!(diagnostic.category, Category::Region);
    assert!(diagnostic.message.contains("Missing"));
}

#[test]
fn function_with_params_and_declarations() {
    let context = compile(
        "decls.bg",
        "import std;\ntype Handle = Int;\nfn id(x: Int, y: Int) -> Int { x }",
    )
    .unwrap();
    assert!(context.succeeded(), "{:?}", context.diagnostics());
    let x_param = context
        .field
        .cells()
        .iter()
        .find(|c| c.token.text == "x" && c.token.position.column < 10)
        .unwrap();
    assert_eq!(x_param.chosen().unwrap().role, Role::ParamName);
}

#[test]
fn malformed_program_contradicts_via_grammar() {
    let context = compile("bad.bg", "fn main( { }").unwrap();
    assert!(!context.succeeded());
    assert!(context.field.has_contradiction());
    assert_eq!(context.diagnostics()[0].category, Category::Syntax);
}
