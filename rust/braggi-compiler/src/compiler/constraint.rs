//! Constraints, validators, and rules.
//!
//! A validator is a pure check over the live-state sets of the cells it
//! binds. Validators are tagged variants with a single dispatched `check`;
//! each variant carries its own context. All validators must be monotone:
//! the same live sets produce the same verdict, and a reduction never
//! re-introduces an eliminated state.

use crate::compiler::field::{CellId, EntropyField, StateId};
use crate::compiler::grammar::{FollowTable, Role};
use crate::compiler::pattern::PatternMatcher;
use crate::compiler::regions::{ContainmentContext, PeriscopeContext, RegimeDeclContext};
use braggi_core::diagnostics::Category;
use std::collections::HashSet;
use std::rc::Rc;

/// Constraint family, which also selects the diagnostic category on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Syntax,
    Semantic,
    Type,
    Region,
    Regime,
    Periscope,
    Custom,
}

impl ConstraintKind {
    pub fn category(self) -> Category {
        match self {
            ConstraintKind::Syntax => Category::Syntax,
            ConstraintKind::Semantic => Category::Semantic,
            ConstraintKind::Type => Category::Type,
            ConstraintKind::Region => Category::Region,
            ConstraintKind::Regime => Category::Regime,
            ConstraintKind::Periscope => Category::Periscope,
            ConstraintKind::Custom => Category::Constraint,
        }
    }
}

/// Result of one validator evaluation.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// No change required.
    Satisfiable,
    /// Per-cell sets of state ids that remain live; anything else is
    /// eliminated.
    Reduce(Vec<(CellId, Vec<StateId>)>),
    /// At least one cell would be emptied.
    Contradiction {
        cell: CellId,
        message: String,
        suggestions: Vec<String>,
    },
}

/// Read-only view of the field handed to validators.
pub struct FieldView<'a> {
    field: &'a EntropyField,
}

impl<'a> FieldView<'a> {
    pub fn new(field: &'a EntropyField) -> Self {
        Self { field }
    }

    pub fn live_roles(&self, cell: CellId) -> HashSet<Role> {
        self.field.cell(cell).live_states().map(|s| s.role).collect()
    }

    pub fn live_ids(&self, cell: CellId) -> Vec<StateId> {
        self.field.cell(cell).live_states().map(|s| s.id).collect()
    }

    pub fn retain_by_role(&self, cell: CellId, keep: impl Fn(Role) -> bool) -> Vec<StateId> {
        self.field
            .cell(cell)
            .live_states()
            .filter(|s| keep(s.role))
            .map(|s| s.id)
            .collect()
    }

    pub fn token_text(&self, cell: CellId) -> &str {
        &self.field.cell(cell).token.text
    }

    pub fn token(&self, cell: CellId) -> &crate::compiler::tokens::Token {
        &self.field.cell(cell).token
    }

    pub fn entropy(&self, cell: CellId) -> usize {
        self.field.cell(cell).entropy()
    }

    pub fn cells(&self) -> &[crate::compiler::field::Cell] {
        self.field.cells()
    }
}

/// Tagged validator variants. Context lives inside the variant.
pub enum Validator {
    /// The cell's live roles must come from `allowed`.
    Membership {
        cell: CellId,
        allowed: HashSet<Role>,
        expected: String,
    },
    /// Arc consistency between two neighbouring cells under a
    /// successor-role table.
    Adjacency {
        left: CellId,
        right: CellId,
        follow: Rc<FollowTable>,
    },
    /// Recognizer over the bound cells' token sequence.
    Pattern {
        cells: Vec<CellId>,
        matcher: PatternMatcher,
    },
    /// An invalid token can never be part of a collapsed program.
    RejectInvalid { cell: CellId },
    /// `region` declarations: the regime cell must hold a regime state.
    RegimeDecl(RegimeDeclContext),
    /// Parent region cell range must fully contain the child's.
    Containment(ContainmentContext),
    /// Periscope regime compatibility.
    PeriscopeCompat(PeriscopeContext),
    /// Unresolvable construct discovered at rule time.
    AlwaysFail {
        cell: CellId,
        message: String,
        suggestions: Vec<String>,
    },
}

impl Validator {
    /// Cells this validator binds, used for cross-indexing.
    pub fn cells(&self) -> Vec<CellId> {
        match self {
            Validator::Membership { cell, .. } => vec![*cell],
            Validator::Adjacency { left, right, .. } => vec![*left, *right],
            Validator::Pattern { cells, .. } => cells.clone(),
            Validator::RejectInvalid { cell } => vec![*cell],
            Validator::RegimeDecl(ctx) => ctx.cells(),
            Validator::Containment(ctx) => ctx.cells(),
            Validator::PeriscopeCompat(ctx) => ctx.cells(),
            Validator::AlwaysFail { cell, .. } => vec![*cell],
        }
    }

    /// Short name used in "violated constraint: …" diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Validator::Membership { .. } => "start symbol",
            Validator::Adjacency { .. } => "adjacency",
            Validator::Pattern { .. } => "grammar pattern",
            Validator::RejectInvalid { .. } => "token validity",
            Validator::RegimeDecl(_) => "regime declaration",
            Validator::Containment(_) => "lifetime containment",
            Validator::PeriscopeCompat(_) => "regime compatibility",
            Validator::AlwaysFail { .. } => "region structure",
        }
    }

    pub fn check(&self, view: &FieldView<'_>) -> Verdict {
        match self {
            Validator::Membership {
                cell,
                allowed,
                expected,
            } => {
                let retained = view.retain_by_role(*cell, |r| allowed.contains(&r));
                if retained.is_empty() {
                    return Verdict::Contradiction {
                        cell: *cell,
                        message: format!(
                            "unexpected token '{}', expected {}",
                            view.token(*cell),
                            expected
                        ),
                        suggestions: Vec::new(),
                    };
                }
                if retained.len() == view.entropy(*cell) {
                    Verdict::Satisfiable
                } else {
                    Verdict::Reduce(vec![(*cell, retained)])
                }
            }
            Validator::Adjacency { left, right, follow } => {
                check_adjacency(view, *left, *right, follow)
            }
            Validator::Pattern { cells, matcher } => matcher.check(view, cells),
            Validator::RejectInvalid { cell } => {
                if view.live_roles(*cell).contains(&Role::InvalidMark) {
                    Verdict::Contradiction {
                        cell: *cell,
                        message: format!("cannot interpret invalid token '{}'", view.token(*cell)),
                        suggestions: Vec::new(),
                    }
                } else {
                    Verdict::Satisfiable
                }
            }
            Validator::RegimeDecl(ctx) => ctx.check(view),
            Validator::Containment(ctx) => ctx.check(view),
            Validator::PeriscopeCompat(ctx) => ctx.check(view),
            Validator::AlwaysFail {
                cell,
                message,
                suggestions,
            } => Verdict::Contradiction {
                cell: *cell,
                message: message.clone(),
                suggestions: suggestions.clone(),
            },
        }
    }
}

fn check_adjacency(
    view: &FieldView<'_>,
    left: CellId,
    right: CellId,
    follow: &FollowTable,
) -> Verdict {
    let empty = HashSet::new();
    let left_roles = view.live_roles(left);
    let right_roles = view.live_roles(right);

    let retain_left = view.retain_by_role(left, |r| {
        follow
            .get(&r)
            .unwrap_or(&empty)
            .iter()
            .any(|succ| right_roles.contains(succ))
    });
    if retain_left.is_empty() {
        return Verdict::Contradiction {
            cell: left,
            message: format!(
                "token '{}' cannot precede '{}'",
                view.token(left),
                view.token(right)
            ),
            suggestions: Vec::new(),
        };
    }

    let allowed_right: HashSet<Role> = left_roles
        .iter()
        .flat_map(|r| follow.get(r).unwrap_or(&empty).iter().copied())
        .collect();
    let retain_right = view.retain_by_role(right, |r| allowed_right.contains(&r));
    if retain_right.is_empty() {
        return Verdict::Contradiction {
            cell: right,
            message: format!(
                "unexpected token '{}' after '{}'",
                view.token(right),
                view.token(left)
            ),
            suggestions: Vec::new(),
        };
    }

    let mut reductions = Vec::new();
    if retain_left.len() < view.entropy(left) {
        reductions.push((left, retain_left));
    }
    if retain_right.len() < view.entropy(right) {
        reductions.push((right, retain_right));
    }
    if reductions.is_empty() {
        Verdict::Satisfiable
    } else {
        Verdict::Reduce(reductions)
    }
}

/// A predicate over k cells that may eliminate states.
pub struct Constraint {
    kind: ConstraintKind,
    cells: Vec<CellId>,
    validator: Validator,
}

impl Constraint {
    pub fn new(kind: ConstraintKind, validator: Validator) -> Self {
        let cells = validator.cells();
        Self {
            kind,
            cells,
            validator,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn name(&self) -> &'static str {
        self.validator.name()
    }

    pub fn check(&self, field: &EntropyField) -> Verdict {
        self.validator.check(&FieldView::new(field))
    }
}

/// A one-shot constraint factory. Installed into a field, run exactly once.
pub struct Rule {
    description: String,
    builder: RuleBuilder,
}

pub enum RuleBuilder {
    /// Grammar seeding: membership, adjacency, pattern, and invalid-token
    /// constraints derived from the language definition.
    Grammar(Rc<crate::compiler::grammar::Grammar>),
    /// Region tree derivation and the region constraint family.
    Regions,
    /// Host-supplied factory.
    Custom(fn(&EntropyField) -> Vec<Constraint>),
}

impl Rule {
    pub fn new(description: impl Into<String>, builder: RuleBuilder) -> Self {
        Self {
            description: description.into(),
            builder,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn apply(&self, field: &EntropyField) -> Vec<Constraint> {
        match &self.builder {
            RuleBuilder::Grammar(grammar) => grammar.constraints(field),
            RuleBuilder::Regions => crate::compiler::regions::region_constraints(field),
            RuleBuilder::Custom(f) => f(field),
        }
    }
}
