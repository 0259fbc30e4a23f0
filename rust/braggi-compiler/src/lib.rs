//! Braggi Compiler
//!
//! The front end is a constraint-satisfaction problem over a grid of token
//! cells: tokenization seeds an entropy field, rules install constraints,
//! and the propagator collapses the field to one interpretation per token
//! or reports the contradiction that prevents it.

pub mod compiler;
pub mod diagnostics;

use compiler::emit::{drive, EmitError, Emitter};
use compiler::field::{CellId, EntropyField, FieldError, StateId};
use compiler::grammar::Grammar;
use compiler::lexer::{filter_trivia, Lexer};
use compiler::pattern::PatternError;
use compiler::propagate::{Propagator, TickHook};
use compiler::regions::RegionTree;
use braggi_core::diagnostics::{Diagnostic, Reporter};
use braggi_core::source::SourceMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("grammar error: {0}")]
    Grammar(#[from] PatternError),
    #[error("field error: {0}")]
    Field(#[from] FieldError),
}

/// Optional knobs for a compile run.
#[derive(Default)]
pub struct CompileOptions<'a> {
    /// Invoked between observation steps; returning `false` aborts the run
    /// with a Fatal diagnostic.
    pub tick: Option<TickHook<'a>>,
}

/// Everything one compilation produced, explicitly passed instead of any
/// process-wide state: the sources, the (possibly collapsed) field, the
/// region tree, and the diagnostics.
pub struct Context {
    pub sources: SourceMap,
    pub field: EntropyField,
    pub regions: RegionTree,
    pub reporter: Reporter,
    /// Observed `(cell, state)` collapses in order, for reproducibility
    /// checks.
    pub collapse_log: Vec<(CellId, StateId)>,
}

impl Context {
    /// True iff the field fully collapsed with no error diagnostics.
    pub fn succeeded(&self) -> bool {
        !self.reporter.has_errors() && self.field.is_fully_collapsed()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    /// Run the output adapter over the collapsed field. A prior Fatal
    /// diagnostic short-circuits emission entirely.
    pub fn emit(&mut self, emitter: &mut dyn Emitter) -> Result<(), EmitError> {
        if self.reporter.is_fatal() {
            return Err(EmitError::SkippedAfterFatal);
        }
        drive(&self.field, emitter, &mut self.reporter)
    }
}

/// Compile a single source. Diagnostics land in the returned context; the
/// error type covers only engine misconfiguration, which is a bug.
pub fn compile(name: &str, text: &str) -> Result<Context, CompileError> {
    compile_with_options(name, text, CompileOptions::default())
}

pub fn compile_with_options(
    name: &str,
    text: &str,
    options: CompileOptions<'_>,
) -> Result<Context, CompileError> {
    let mut sources = SourceMap::new();
    let source_id = sources.add(name, text);
    let mut reporter = Reporter::new();

    // 1. Tokenize. Anomalies become Syntax diagnostics plus Invalid tokens.
    let source_text = sources.get(source_id).map(|s| s.text().to_string());
    let tokens = Lexer::new(source_id, source_text.as_deref().unwrap_or(""))
        .tokenize(&mut reporter);
    let tokens = filter_trivia(tokens);

    // 2. One cell per non-trivia token (Eof sentinel included), seeded with
    //    the states compatible with each token.
    let grammar = Rc::new(Grammar::braggi()?);
    let mut field = EntropyField::new(source_id);
    for token in tokens {
        field.add_cell(token);
    }
    grammar.seed(&mut field)?;

    // 3. Rules run once and install the constraint families.
    field.add_rule(compiler::constraint::Rule::new(
        "braggi grammar",
        compiler::constraint::RuleBuilder::Grammar(Rc::clone(&grammar)),
    ));
    field.add_rule(compiler::constraint::Rule::new(
        "region safety",
        compiler::constraint::RuleBuilder::Regions,
    ));
    field.apply_rules();

    let regions = RegionTree::build(&field);

    // 4. Collapse to fixpoint, observing lowest-entropy cells.
    let collapse_log = {
        let mut propagator = Propagator::new(&mut field, &mut reporter);
        if let Some(tick) = options.tick {
            propagator = propagator.with_tick(tick);
        }
        propagator.run();
        propagator.collapse_log().to_vec()
    };

    Ok(Context {
        sources,
        field,
        regions,
        reporter,
        collapse_log,
    })
}

/// Render every diagnostic of a context in the canonical plain form.
pub fn format_diagnostics(context: &Context) -> String {
    context
        .diagnostics()
        .iter()
        .map(|d| diagnostics::render_plain(d, &context.sources))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use braggi_core::diagnostics::Category;

    #[test]
    fn trivial_function_collapses_cleanly() {
        let context = compile("main.bg", "fn main() -> Int { 0 }").unwrap();
        assert!(context.succeeded());
        assert!(context.diagnostics().is_empty());
        assert!(context.field.is_fully_collapsed());
    }

    #[test]
    fn empty_source_is_a_single_collapsed_eof_cell() {
        let context = compile("empty.bg", "").unwrap();
        assert!(context.succeeded());
        assert_eq!(context.field.cells().len(), 1);
    }

    #[test]
    fn incompatible_periscope_fails_with_a_region_diagnostic() {
        let context = compile(
            "bad.bg",
            "region S regime FILO { let v = 1; periscope v to T { } }\nregion T regime FIFO { }",
        )
        .unwrap();
        assert!(!context.succeeded());
        assert!(context.field.has_contradiction());
        assert_eq!(context.diagnostics().len(), 1);
        let diagnostic = &context.diagnostics()[0];
        assert_eq!(diagnostic.category, Category::Region);
        assert!(diagnostic.message.contains("FILO"));
        assert!(diagnostic.message.contains("FIFO"));
    }

    #[test]
    fn unterminated_string_surfaces_syntax_then_contradiction() {
        let context = compile("bad.bg", "fn main() -> Int { \"hello }").unwrap();
        assert!(!context.succeeded());
        assert!(context.reporter.has_errors());
        assert_eq!(context.diagnostics()[0].category, Category::Syntax);
        assert!(context.field.has_contradiction());
    }

    #[test]
    fn tick_hook_aborts_with_fatal() {
        let options = CompileOptions {
            tick: Some(Box::new(|| false)),
        };
        // Needs at least one ambiguous cell so an observation step happens.
        let context =
            compile_with_options("main.bg", "fn main() -> Int { x }", options).unwrap();
        assert!(context.reporter.is_fatal());
    }
}
