//! The entropy field: ordered cells, candidate states, and the stores that
//! back constraints and rules.
//!
//! Cells, states, and constraints live in append-only arenas addressed by
//! id newtypes; traversal always goes through the field, never through
//! back-pointers. Elimination zeroes a state's weight instead of deleting
//! it, so constraint references to states stay valid for the field's life.

use crate::compiler::constraint::{Constraint, Rule};
use crate::compiler::grammar::Role;
use crate::compiler::tokens::Token;
use braggi_core::source::{SourceId, SourcePosition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub u32);

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("cell {0:?} is already collapsed")]
    AlreadyCollapsed(CellId),
    #[error("unknown cell {0:?}")]
    UnknownCell(CellId),
    #[error("unknown state {state:?} in cell {cell:?}")]
    UnknownState { cell: CellId, state: StateId },
    #[error("cannot collapse cell {cell:?} to eliminated state {state:?}")]
    CollapseEliminated { cell: CellId, state: StateId },
}

/// One candidate interpretation of a cell. `weight == 0` means eliminated.
#[derive(Debug, Clone)]
pub struct State {
    pub id: StateId,
    pub role: Role,
    pub label: String,
    pub weight: u32,
}

impl State {
    pub fn is_live(&self) -> bool {
        self.weight > 0
    }
}

/// A container of candidate states at one source position. The cell owns
/// the token it was created from.
#[derive(Debug)]
pub struct Cell {
    pub id: CellId,
    pub token: Token,
    states: Vec<State>,
    touching: Vec<ConstraintId>,
}

impl Cell {
    pub fn position(&self) -> SourcePosition {
        self.token.position
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn live_states(&self) -> impl Iterator<Item = &State> {
        self.states.iter().filter(|s| s.is_live())
    }

    /// Remaining ambiguity, measured as the count of live states. Count and
    /// log2(count) induce the same observation order.
    pub fn entropy(&self) -> usize {
        self.states.iter().filter(|s| s.is_live()).count()
    }

    pub fn is_collapsed(&self) -> bool {
        self.entropy() == 1
    }

    /// The single live state of a collapsed cell.
    pub fn chosen(&self) -> Option<&State> {
        let mut live = self.live_states();
        let first = live.next()?;
        if live.next().is_some() {
            return None;
        }
        Some(first)
    }

    pub fn touching(&self) -> &[ConstraintId] {
        &self.touching
    }
}

/// Why the field became contradictory: the emptied cell, the constraint
/// whose reduction emptied it, and the constraint that fired before it.
#[derive(Debug, Clone)]
pub struct ContradictionInfo {
    pub cell: CellId,
    pub constraint: Option<ConstraintId>,
    pub previous: Option<ConstraintId>,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// The ordered collection of cells plus its constraints and rules.
pub struct EntropyField {
    source: SourceId,
    cells: Vec<Cell>,
    constraints: Vec<Constraint>,
    rules: Vec<Rule>,
    rules_applied: bool,
    contradiction: Option<ContradictionInfo>,
    next_state: u32,
}

impl EntropyField {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            cells: Vec::new(),
            constraints: Vec::new(),
            rules: Vec::new(),
            rules_applied: false,
            contradiction: None,
            next_state: 0,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Appends a cell for a token. Cell order is tokenization order and is
    /// never changed afterwards.
    pub fn add_cell(&mut self, token: Token) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Cell {
            id,
            token,
            states: Vec::new(),
            touching: Vec::new(),
        });
        id
    }

    /// Pushes a candidate state onto a cell. Fails once collapse has begun
    /// on the cell, i.e. any of its states has been eliminated; a freshly
    /// seeded cell accepts candidates in any quantity.
    pub fn add_state(&mut self, cell: CellId, role: Role, weight: u32) -> Result<StateId, FieldError> {
        let id = StateId(self.next_state);
        let cell = self
            .cells
            .get_mut(cell.0 as usize)
            .ok_or(FieldError::UnknownCell(cell))?;
        if cell.states.iter().any(|s| !s.is_live()) {
            return Err(FieldError::AlreadyCollapsed(cell.id));
        }
        cell.states.push(State {
            id,
            role,
            label: role.to_string(),
            weight,
        });
        self.next_state += 1;
        Ok(id)
    }

    /// Registers a constraint and cross-indexes it into every bound cell.
    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintId {
        let id = ConstraintId(self.constraints.len() as u32);
        for &cell in constraint.cells() {
            if let Some(cell) = self.cells.get_mut(cell.0 as usize) {
                cell.touching.push(id);
            }
        }
        self.constraints.push(constraint);
        id
    }

    /// Schedules a one-shot constraint factory.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Runs every scheduled rule exactly once, registering the constraints
    /// each one produces. Later calls are no-ops.
    pub fn apply_rules(&mut self) {
        if self.rules_applied {
            return;
        }
        self.rules_applied = true;
        let rules = std::mem::take(&mut self.rules);
        for rule in &rules {
            for constraint in rule.apply(self) {
                self.add_constraint(constraint);
            }
        }
        self.rules = rules;
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0 as usize]
    }

    pub fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.0 as usize]
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The uncollapsed cell with the fewest live states, ties broken by
    /// lowest cell id. `None` iff every cell is collapsed.
    pub fn get_lowest_entropy_cell(&self) -> Option<CellId> {
        self.cells
            .iter()
            .filter(|c| !c.is_collapsed())
            .min_by_key(|c| (c.entropy(), c.id))
            .map(|c| c.id)
    }

    /// Deterministic observation: the live state with the greatest weight,
    /// ties broken by lowest state id.
    pub fn weighted_pick(&self, cell: CellId) -> Option<StateId> {
        self.cell(cell)
            .live_states()
            .max_by(|a, b| a.weight.cmp(&b.weight).then(b.id.cmp(&a.id)))
            .map(|s| s.id)
    }

    /// Retains only `state` in `cell`, eliminating every other candidate.
    pub fn collapse(&mut self, cell: CellId, state: StateId) -> Result<(), FieldError> {
        let cell_ref = self
            .cells
            .get(cell.0 as usize)
            .ok_or(FieldError::UnknownCell(cell))?;
        let target = cell_ref
            .states
            .iter()
            .find(|s| s.id == state)
            .ok_or(FieldError::UnknownState { cell, state })?;
        if !target.is_live() {
            self.mark_contradiction(ContradictionInfo {
                cell,
                constraint: None,
                previous: None,
                message: format!("collapse to eliminated state {:?}", state),
                suggestions: Vec::new(),
            });
            return Err(FieldError::CollapseEliminated { cell, state });
        }
        let cell_mut = &mut self.cells[cell.0 as usize];
        for s in &mut cell_mut.states {
            if s.id != state {
                s.weight = 0;
            }
        }
        Ok(())
    }

    /// Eliminates every state of `cell` not in `retain`. Returns whether the
    /// live set shrank. An emptied cell marks the field contradictory.
    pub fn apply_retain(&mut self, cell: CellId, retain: &[StateId]) -> bool {
        let cell_mut = &mut self.cells[cell.0 as usize];
        let mut shrunk = false;
        for s in &mut cell_mut.states {
            if s.is_live() && !retain.contains(&s.id) {
                s.weight = 0;
                shrunk = true;
            }
        }
        shrunk
    }

    pub fn is_fully_collapsed(&self) -> bool {
        self.cells.iter().all(|c| c.is_collapsed())
    }

    pub fn has_contradiction(&self) -> bool {
        self.contradiction.is_some()
    }

    pub fn contradiction(&self) -> Option<&ContradictionInfo> {
        self.contradiction.as_ref()
    }

    /// Records the first contradiction; later ones do not overwrite it.
    pub fn mark_contradiction(&mut self, info: ContradictionInfo) {
        if self.contradiction.is_none() {
            self.contradiction = Some(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::grammar::Role;
    use crate::compiler::tokens::{Token, TokenType};
    use braggi_core::source::{SourceId, SourcePosition};

    fn token(text: &str) -> Token {
        Token::new(
            TokenType::Identifier,
            text,
            SourcePosition::start_of(SourceId(0)),
        )
    }

    fn field_with_cell(states: &[(Role, u32)]) -> (EntropyField, CellId, Vec<StateId>) {
        let mut field = EntropyField::new(SourceId(0));
        let cell = field.add_cell(token("x"));
        let ids = states
            .iter()
            .map(|&(role, w)| field.add_state(cell, role, w).unwrap())
            .collect();
        (field, cell, ids)
    }

    #[test]
    fn entropy_is_live_count() {
        let (field, cell, _) =
            field_with_cell(&[(Role::VarRef, 3), (Role::FreeRef, 1), (Role::TypeName, 2)]);
        assert_eq!(field.cell(cell).entropy(), 3);
        assert!(!field.cell(cell).is_collapsed());
    }

    #[test]
    fn collapse_retains_exactly_one() {
        let (mut field, cell, ids) = field_with_cell(&[(Role::VarRef, 3), (Role::FreeRef, 1)]);
        field.collapse(cell, ids[1]).unwrap();
        assert!(field.cell(cell).is_collapsed());
        assert_eq!(field.cell(cell).chosen().unwrap().id, ids[1]);
        assert!(field.is_fully_collapsed());
    }

    #[test]
    fn collapse_to_eliminated_state_is_contradiction() {
        let (mut field, cell, ids) = field_with_cell(&[(Role::VarRef, 3), (Role::FreeRef, 0)]);
        let err = field.collapse(cell, ids[1]);
        assert!(err.is_err());
        assert!(field.has_contradiction());
        assert_eq!(field.contradiction().unwrap().cell, cell);
    }

    #[test]
    fn add_state_to_collapsed_cell_fails() {
        let (mut field, cell, ids) = field_with_cell(&[(Role::VarRef, 3), (Role::FreeRef, 1)]);
        field.collapse(cell, ids[0]).unwrap();
        let err = field.add_state(cell, Role::TypeName, 1);
        assert!(matches!(err, Err(FieldError::AlreadyCollapsed(_))));
    }

    #[test]
    fn lowest_entropy_ties_break_by_cell_id() {
        let mut field = EntropyField::new(SourceId(0));
        let a = field.add_cell(token("a"));
        let b = field.add_cell(token("b"));
        for cell in [a, b] {
            field.add_state(cell, Role::VarRef, 1).unwrap();
            field.add_state(cell, Role::FreeRef, 1).unwrap();
        }
        assert_eq!(field.get_lowest_entropy_cell(), Some(a));
        let chosen = field.weighted_pick(a).unwrap();
        field.collapse(a, chosen).unwrap();
        assert_eq!(field.get_lowest_entropy_cell(), Some(b));
    }

    #[test]
    fn weighted_pick_is_argmax_then_lowest_id() {
        let (field, cell, ids) =
            field_with_cell(&[(Role::FreeRef, 1), (Role::VarRef, 3), (Role::TypeName, 3)]);
        // Ties on weight 3 resolve to the earlier state id.
        assert_eq!(field.weighted_pick(cell), Some(ids[1]));
    }

    #[test]
    fn retain_shrinks_monotonically() {
        let (mut field, cell, ids) =
            field_with_cell(&[(Role::VarRef, 3), (Role::FreeRef, 1), (Role::TypeName, 2)]);
        assert!(field.apply_retain(cell, &[ids[0], ids[2]]));
        assert_eq!(field.cell(cell).entropy(), 2);
        // Retaining an already-eliminated state does not resurrect it.
        assert!(field.apply_retain(cell, &[ids[0], ids[1]]));
        assert_eq!(field.cell(cell).entropy(), 1);
        assert!(!field.apply_retain(cell, &[ids[0]]));
    }
}
