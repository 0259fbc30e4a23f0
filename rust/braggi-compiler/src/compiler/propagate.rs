//! The WFCCC engine: worklist propagation and the observe/collapse loop.
//!
//! Propagation keeps a FIFO queue of cells whose live-state set shrank.
//! Popping a cell evaluates every constraint touching it, in registration
//! order, applying reductions and enqueueing every cell that shrank as a
//! result. Validators are monotone, so the queue drains in at most one
//! shrink event per (cell, state) pair and the fixpoint terminates.

use crate::compiler::constraint::Verdict;
use crate::compiler::field::{CellId, ConstraintId, ContradictionInfo, EntropyField, StateId};
use braggi_core::diagnostics::{Category, Diagnostic, Reporter, Severity};
use std::collections::VecDeque;

/// Host hook invoked between observation steps; returning `false` aborts
/// the run with a Fatal diagnostic.
pub type TickHook<'a> = Box<dyn FnMut() -> bool + 'a>;

/// Counters exposed for the engine's termination bound.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropagationStats {
    /// Validator invocations across all propagation calls.
    pub evaluations: usize,
    /// Cells explicitly collapsed by observation.
    pub observations: usize,
}

/// Single-run collapse engine over one field.
pub struct Propagator<'a> {
    field: &'a mut EntropyField,
    reporter: &'a mut Reporter,
    tick: Option<TickHook<'a>>,
    stats: PropagationStats,
    collapse_log: Vec<(CellId, StateId)>,
}

impl<'a> Propagator<'a> {
    pub fn new(field: &'a mut EntropyField, reporter: &'a mut Reporter) -> Self {
        Self {
            field,
            reporter,
            tick: None,
            stats: PropagationStats::default(),
            collapse_log: Vec::new(),
        }
    }

    pub fn with_tick(mut self, tick: TickHook<'a>) -> Self {
        self.tick = Some(tick);
        self
    }

    pub fn stats(&self) -> PropagationStats {
        self.stats
    }

    /// The observed `(cell, state)` collapses, in order. Identical for
    /// identical input.
    pub fn collapse_log(&self) -> &[(CellId, StateId)] {
        &self.collapse_log
    }

    /// Evaluate every constraint once by seeding the worklist with all
    /// cells, then drain to fixpoint.
    pub fn propagate_initial(&mut self) {
        let all: Vec<CellId> = self.field.cells().iter().map(|c| c.id).collect();
        self.drain(all);
    }

    /// Re-establish the fixpoint after `cell`'s state set shrank.
    pub fn propagate_from(&mut self, cell: CellId) {
        self.drain(vec![cell]);
    }

    fn drain(&mut self, seed: Vec<CellId>) {
        let cell_count = self.field.cells().len();
        let mut queued = vec![false; cell_count];
        let mut queue: VecDeque<CellId> = VecDeque::new();
        for cell in seed {
            if !queued[cell.0 as usize] {
                queued[cell.0 as usize] = true;
                queue.push_back(cell);
            }
        }

        let mut last_fired: Option<ConstraintId> = None;
        while let Some(cell) = queue.pop_front() {
            queued[cell.0 as usize] = false;
            let touching: Vec<ConstraintId> = self.field.cell(cell).touching().to_vec();
            for constraint_id in touching {
                self.stats.evaluations += 1;
                let verdict = {
                    let field: &EntropyField = self.field;
                    field.constraint(constraint_id).check(field)
                };
                match verdict {
                    Verdict::Satisfiable => {}
                    Verdict::Reduce(retain_sets) => {
                        for (target, retain) in retain_sets {
                            let shrunk = self.field.apply_retain(target, &retain);
                            if self.field.cell(target).entropy() == 0 {
                                let message = format!(
                                    "every candidate for '{}' was eliminated",
                                    self.field.cell(target).token
                                );
                                self.field.mark_contradiction(ContradictionInfo {
                                    cell: target,
                                    constraint: Some(constraint_id),
                                    previous: last_fired,
                                    message,
                                    suggestions: Vec::new(),
                                });
                                self.report_contradiction();
                                return;
                            }
                            if shrunk && !queued[target.0 as usize] {
                                queued[target.0 as usize] = true;
                                queue.push_back(target);
                            }
                        }
                    }
                    Verdict::Contradiction {
                        cell,
                        message,
                        suggestions,
                    } => {
                        self.field.mark_contradiction(ContradictionInfo {
                            cell,
                            constraint: Some(constraint_id),
                            previous: last_fired,
                            message,
                            suggestions,
                        });
                        self.report_contradiction();
                        return;
                    }
                }
                last_fired = Some(constraint_id);
            }
        }
    }

    /// The main loop: propagate the initial seeding, then observe the
    /// lowest-entropy cell, collapse it, and re-propagate until the field
    /// is fully collapsed or contradictory.
    pub fn run(&mut self) {
        if self.field.has_contradiction() {
            self.report_contradiction();
            return;
        }
        self.propagate_initial();
        while !self.field.is_fully_collapsed() && !self.field.has_contradiction() {
            if let Some(tick) = self.tick.as_mut() {
                if !tick() {
                    self.reporter.report(
                        Diagnostic::fatal(Category::Propagation, "collapse budget exhausted")
                            .from_component("propagator"),
                    );
                    return;
                }
            }
            let Some(cell) = self.field.get_lowest_entropy_cell() else {
                break;
            };
            let Some(state) = self.field.weighted_pick(cell) else {
                break;
            };
            self.stats.observations += 1;
            if self.field.collapse(cell, state).is_err() {
                self.report_contradiction();
                return;
            }
            self.collapse_log.push((cell, state));
            self.propagate_from(cell);
        }
    }

    /// One diagnostic per contradiction, categorized by the constraint that
    /// produced it.
    fn report_contradiction(&mut self) {
        let Some(info) = self.field.contradiction().cloned() else {
            return;
        };
        // Contradictions recorded before any constraint fired come from
        // seeding a token the grammar has no states for.
        let category = info
            .constraint
            .map(|id| self.field.constraint(id).kind().category())
            .unwrap_or(Category::Syntax);
        let mut diagnostic = Diagnostic::new(category, Severity::Error, info.message.clone())
            .at(self.field.cell(info.cell).position())
            .from_component("propagator");
        if let Some(id) = info.constraint {
            diagnostic = diagnostic
                .with_detail(format!("violated constraint: {}", self.field.constraint(id).name()));
        }
        for suggestion in &info.suggestions {
            diagnostic = diagnostic.with_suggestion(suggestion.clone());
        }
        self.reporter.report(diagnostic);
    }
}
