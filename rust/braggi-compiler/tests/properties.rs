//! Invariant checks over the collapse engine.

use braggi_compiler::compile;
use braggi_compiler::compiler::emit::collapsed_output;
use braggi_compiler::compiler::field::{CellId, EntropyField, StateId};
use braggi_compiler::compiler::grammar::Grammar;
use braggi_compiler::compiler::lexer::{filter_trivia, Lexer};
use braggi_compiler::compiler::propagate::Propagator;
use braggi_compiler::compiler::regions::{admissible, Direction, Regime, COMPAT};
use braggi_core::diagnostics::Reporter;
use braggi_core::source::SourceId;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

const VALID_PROGRAMS: &[&str] = &[
    "fn main() -> Int { 0 }",
    "region R regime SEQ { }",
    "region S regime SEQ { let v = 1; periscope v to T { } }\nregion T regime FIFO { }",
    "fn id(x: Int) -> Int { x }",
    "import std;\nregion R { let a = 1; let b = 2; }",
    "",
];

fn live_sets(field: &EntropyField) -> Vec<BTreeSet<StateId>> {
    field
        .cells()
        .iter()
        .map(|c| c.live_states().map(|s| s.id).collect())
        .collect()
}

fn seeded(text: &str) -> (EntropyField, Reporter) {
    let mut reporter = Reporter::new();
    let tokens = filter_trivia(Lexer::new(SourceId(0), text).tokenize(&mut reporter));
    let mut field = EntropyField::new(SourceId(0));
    for token in tokens {
        field.add_cell(token);
    }
    let grammar = Grammar::braggi().unwrap();
    grammar.seed(&mut field).unwrap();
    field.add_rule(braggi_compiler::compiler::constraint::Rule::new(
        "braggi grammar",
        braggi_compiler::compiler::constraint::RuleBuilder::Grammar(std::rc::Rc::new(grammar)),
    ));
    field.add_rule(braggi_compiler::compiler::constraint::Rule::new(
        "region safety",
        braggi_compiler::compiler::constraint::RuleBuilder::Regions,
    ));
    field.apply_rules();
    (field, reporter)
}

fn is_subset_pointwise(after: &[BTreeSet<StateId>], before: &[BTreeSet<StateId>]) -> bool {
    after
        .iter()
        .zip(before)
        .all(|(a, b)| a.is_subset(b))
}

// Invariant 1: every propagation step only shrinks live-state sets.
#[test]
fn propagation_is_monotone() {
    for program in VALID_PROGRAMS {
        let (mut field, mut reporter) = seeded(program);
        let before = live_sets(&field);
        {
            let mut propagator = Propagator::new(&mut field, &mut reporter);
            propagator.propagate_initial();
        }
        let mut previous = live_sets(&field);
        assert!(is_subset_pointwise(&previous, &before), "{}", program);

        while !field.is_fully_collapsed() && !field.has_contradiction() {
            let cell = field.get_lowest_entropy_cell().unwrap();
            let state = field.weighted_pick(cell).unwrap();
            field.collapse(cell, state).unwrap();
            {
                let mut propagator = Propagator::new(&mut field, &mut reporter);
                propagator.propagate_from(cell);
            }
            let current = live_sets(&field);
            assert!(is_subset_pointwise(&current, &previous), "{}", program);
            previous = current;
        }
    }
}

// Invariant 2: identical source produces an identical collapse sequence.
#[test]
fn collapse_sequence_is_deterministic() {
    for program in VALID_PROGRAMS {
        let first = compile("det.bg", program).unwrap();
        let second = compile("det.bg", program).unwrap();
        assert_eq!(first.collapse_log, second.collapse_log, "{}", program);
        let first_roles: Vec<_> = first
            .field
            .cells()
            .iter()
            .map(|c| c.chosen().map(|s| s.role))
            .collect();
        let second_roles: Vec<_> = second
            .field
            .cells()
            .iter()
            .map(|c| c.chosen().map(|s| s.role))
            .collect();
        assert_eq!(first_roles, second_roles, "{}", program);
    }
}

// Invariant 3: propagation terminates within the state count. On a field
// where every cell touches one constraint, evaluations are bounded by the
// total state count plus the seeded cells.
#[test]
fn propagation_evaluation_bound() {
    use braggi_compiler::compiler::constraint::{Constraint, ConstraintKind, Validator};
    use braggi_compiler::compiler::grammar::Role;
    use braggi_compiler::compiler::tokens::{Token, TokenType};
    use braggi_core::source::SourcePosition;

    let mut field = EntropyField::new(SourceId(0));
    for i in 0..8 {
        let cell = field.add_cell(Token::new(
            TokenType::Identifier,
            format!("c{}", i),
            SourcePosition::start_of(SourceId(0)),
        ));
        field.add_state(cell, Role::VarRef, 3).unwrap();
        field.add_state(cell, Role::FreeRef, 2).unwrap();
        field.add_state(cell, Role::TypeName, 1).unwrap();
        field.add_constraint(Constraint::new(
            ConstraintKind::Custom,
            Validator::Membership {
                cell,
                allowed: [Role::VarRef, Role::FreeRef].into_iter().collect(),
                expected: "a reference".to_string(),
            },
        ));
    }
    let total_states: usize = field.cells().iter().map(|c| c.states().len()).sum();
    let cells = field.cells().len();

    let mut reporter = Reporter::new();
    let mut propagator = Propagator::new(&mut field, &mut reporter);
    propagator.propagate_initial();
    assert!(propagator.stats().evaluations <= total_states + cells);
}

// Invariant 4: the adapter's cell sequence equals the tokenizer's
// non-trivia token sequence.
#[test]
fn output_order_matches_tokenization_order() {
    for program in VALID_PROGRAMS {
        let mut reporter = Reporter::new();
        let tokens = filter_trivia(Lexer::new(SourceId(0), program).tokenize(&mut reporter));
        let expected: Vec<String> = tokens.iter().map(|t| t.text.clone()).collect();

        let context = compile("order.bg", program).unwrap();
        assert!(context.succeeded(), "{}", program);
        let emitted: Vec<String> = collapsed_output(&context.field)
            .unwrap()
            .iter()
            .map(|(t, _)| t.text.clone())
            .collect();
        assert_eq!(emitted, expected, "{}", program);
    }
}

// Invariant 5: no contradiction at the end of the loop means every cell
// has exactly one live state.
#[test]
fn success_implies_complete_collapse() {
    for program in VALID_PROGRAMS {
        let context = compile("complete.bg", program).unwrap();
        if !context.field.has_contradiction() {
            assert!(context.field.is_fully_collapsed(), "{}", program);
            for cell in context.field.cells() {
                assert!(cell.chosen().is_some());
            }
        }
    }
}

// Invariant 6: the checker agrees with the specified table for all 32
// (source, target, direction) entries.
#[test]
fn regime_matrix_agrees_with_the_table() {
    for (s, source) in Regime::iter().enumerate() {
        for (t, target) in Regime::iter().enumerate() {
            let (incoming, outgoing) = COMPAT[s][t];
            assert_eq!(admissible(source, target, Direction::Out), incoming);
            assert_eq!(admissible(source, target, Direction::In), outgoing);
        }
    }
}

// Invariant 6, end to end: a periscope compiles iff the matrix admits it.
#[test]
fn periscope_outcomes_match_the_matrix() {
    for (s, source) in Regime::iter().enumerate() {
        for (t, target) in Regime::iter().enumerate() {
            let program = format!(
                "region S regime {} {{ let v = 1; periscope v to T {{ }} }}\nregion T regime {} {{ }}",
                source, target
            );
            let context = compile("matrix.bg", &program).unwrap();
            let expected = COMPAT[s][t].0;
            assert_eq!(
                context.succeeded(),
                expected,
                "periscope {} -> {}",
                source,
                target
            );
        }
    }
}

// Invariant 7: every diagnostic position is a valid position in its source.
#[test]
fn diagnostic_positions_round_trip() {
    let failing = [
        "region S regime FILO { let v = 1; periscope v to T { } }\nregion T regime FIFO { }",
        "fn main() -> Int { \"hello }",
        "fn main( { }",
        "let @ = 1;",
    ];
    for program in failing {
        let context = compile("pos.bg", program).unwrap();
        assert!(!context.diagnostics().is_empty(), "{}", program);
        for diagnostic in context.diagnostics() {
            if let Some(position) = &diagnostic.position {
                let source = context.sources.get(position.source).unwrap();
                assert!(
                    source.contains(position),
                    "{}: {:?} out of bounds",
                    program,
                    position
                );
            }
        }
    }
}

// Invariant 8: propagating again without an intervening collapse changes
// nothing.
#[test]
fn propagation_is_idempotent_at_fixpoint() {
    for program in VALID_PROGRAMS {
        let (mut field, mut reporter) = seeded(program);
        {
            let mut propagator = Propagator::new(&mut field, &mut reporter);
            propagator.propagate_initial();
        }
        let before = live_sets(&field);
        for i in 0..field.cells().len() {
            let mut propagator = Propagator::new(&mut field, &mut reporter);
            propagator.propagate_from(CellId(i as u32));
        }
        assert_eq!(before, live_sets(&field), "{}", program);
    }
}
