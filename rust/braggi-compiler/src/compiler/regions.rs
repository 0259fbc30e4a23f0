//! Regions, regimes, periscopes, and the compatibility checker.
//!
//! Region structure is derived from the token sequence (brace nesting) when
//! the region rule runs, and the safety conditions are expressed as
//! constraints over the same field the grammar collapses: regime
//! declarations, containment, and periscope regime compatibility.

use crate::compiler::constraint::{Constraint, ConstraintKind, FieldView, Validator, Verdict};
use crate::compiler::field::{CellId, EntropyField};
use crate::compiler::grammar::Role;
use crate::compiler::tokens::TokenType;
use strum_macros::{Display, EnumIter};

/// Declared access pattern of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Regime {
    #[strum(serialize = "FIFO")]
    Fifo,
    #[strum(serialize = "FILO")]
    Filo,
    #[strum(serialize = "SEQ")]
    Seq,
    #[strum(serialize = "RAND")]
    Rand,
}

impl Regime {
    pub fn from_keyword(text: &str) -> Option<Regime> {
        match text {
            "FIFO" => Some(Regime::Fifo),
            "FILO" => Some(Regime::Filo),
            "SEQ" => Some(Regime::Seq),
            "RAND" => Some(Regime::Rand),
            _ => None,
        }
    }
}

/// Direction of a periscope edge. `periscope v to T` sends a value out of
/// the source region, so the construct records `Out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Bidirectional,
}

/// The regime compatibility matrix, stored exactly as specified. Rows are
/// the source regime, columns the target, entries are (IN, OUT).
pub const COMPAT: [[(bool, bool); 4]; 4] = [
    //  FIFO           FILO           SEQ            RAND
    [(true, true), (true, false), (true, true), (false, false)], // FIFO
    [(false, true), (true, true), (false, true), (false, false)], // FILO
    [(true, false), (true, false), (true, true), (false, false)], // SEQ
    [(false, false), (false, false), (false, false), (true, true)], // RAND
];

pub fn compat(source: Regime, target: Regime) -> (bool, bool) {
    COMPAT[source as usize][target as usize]
}

/// Whether a periscope between two regimes is admissible. An `Out` edge
/// delivers the value across the target's inbound boundary, so it reads the
/// IN entry; an `In` edge mirrors it. Bidirectional edges are only ever
/// admitted between RAND regions.
pub fn admissible(source: Regime, target: Regime, direction: Direction) -> bool {
    let (incoming, outgoing) = compat(source, target);
    match direction {
        Direction::Out => incoming,
        Direction::In => outgoing,
        Direction::Bidirectional => {
            incoming && outgoing && source == Regime::Rand && target == Regime::Rand
        }
    }
}

/// Substitute-regime search order for suggestions.
const SUBSTITUTE_ORDER: [Regime; 4] = [Regime::Seq, Regime::Fifo, Regime::Filo, Regime::Rand];

/// One suggestion line for an inadmissible pair, scanning the matrix row
/// and column for admissible substitutes.
pub fn substitute_suggestion(source: Regime, target: Regime, direction: Direction) -> Option<String> {
    let source_sub = SUBSTITUTE_ORDER
        .iter()
        .find(|&&r| r != source && admissible(r, target, direction));
    let target_sub = SUBSTITUTE_ORDER
        .iter()
        .find(|&&r| r != target && admissible(source, r, direction));
    match (source_sub, target_sub) {
        (Some(s), Some(t)) => Some(format!(
            "change source regime to {}, or target regime to {}",
            s, t
        )),
        (Some(s), None) => Some(format!("change source regime to {}", s)),
        (None, Some(t)) => Some(format!("change target regime to {}", t)),
        (None, None) => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(pub u32);

/// A `let` binding owned by a region.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub name: String,
    pub keyword_cell: CellId,
    pub name_cell: CellId,
}

/// A lexical region. Lifetimes form a tree: children are fully contained in
/// their parent.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub regime: Regime,
    pub parent: Option<RegionId>,
    pub keyword_cell: CellId,
    pub name_cell: CellId,
    pub regime_cell: Option<CellId>,
    pub body: Option<(CellId, CellId)>,
    pub allocations: Vec<Allocation>,
    pub periscopes: Vec<usize>,
}

/// A directed lifetime-extension edge between two regions.
#[derive(Debug, Clone)]
pub struct PeriscopeEdge {
    pub source: Option<RegionId>,
    pub target: Option<RegionId>,
    pub target_name: String,
    pub direction: Direction,
    pub keyword_cell: CellId,
    pub value_cell: CellId,
}

/// The region tree plus its periscope edges, derived once per field.
#[derive(Debug, Default)]
pub struct RegionTree {
    regions: Vec<Region>,
    periscopes: Vec<PeriscopeEdge>,
}

impl RegionTree {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: RegionId) -> &Region {
        &self.regions[id.0 as usize]
    }

    pub fn find(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn periscopes(&self) -> &[PeriscopeEdge] {
        &self.periscopes
    }

    /// Derive regions, allocations, and periscopes from the cell sequence.
    /// Malformed shapes are skipped here; the grammar constraints reject
    /// the program independently.
    pub fn build(field: &EntropyField) -> Self {
        let cells = field.cells();
        let mut tree = RegionTree::default();
        let mut open: Vec<RegionId> = Vec::new();

        let keyword_at = |i: usize, text: &str| {
            cells
                .get(i)
                .is_some_and(|c| c.token.ty == TokenType::Keyword && c.token.text == text)
        };
        let ident_at = |i: usize| {
            cells
                .get(i)
                .filter(|c| c.token.ty == TokenType::Identifier)
                .map(|c| c.token.text.clone())
        };
        let punct_at = |i: usize, text: &str| {
            cells
                .get(i)
                .is_some_and(|c| c.token.ty == TokenType::Punctuation && c.token.text == text)
        };

        for i in 0..cells.len() {
            while let Some(&rid) = open.last() {
                match tree.regions[rid.0 as usize].body {
                    Some((_, end)) if (end.0 as usize) < i => {
                        open.pop();
                    }
                    _ => break,
                }
            }

            let token = &cells[i].token;
            if token.ty != TokenType::Keyword {
                continue;
            }
            match token.text.as_str() {
                "region" => {
                    let Some(name) = ident_at(i + 1) else { continue };
                    let (regime_cell, regime, body_at) = if keyword_at(i + 2, "regime") {
                        let regime = cells
                            .get(i + 3)
                            .and_then(|rc| Regime::from_keyword(&rc.token.text));
                        match regime {
                            Some(r) => (Some(CellId((i + 3) as u32)), r, i + 4),
                            None => continue,
                        }
                    } else {
                        (None, Regime::Rand, i + 2)
                    };
                    let body = if punct_at(body_at, "{") {
                        matching_brace(field, body_at)
                            .map(|end| (CellId(body_at as u32), CellId(end as u32)))
                    } else {
                        None
                    };
                    let id = RegionId(tree.regions.len() as u32);
                    tree.regions.push(Region {
                        id,
                        name,
                        regime,
                        parent: open.last().copied(),
                        keyword_cell: CellId(i as u32),
                        name_cell: CellId((i + 1) as u32),
                        regime_cell,
                        body,
                        allocations: Vec::new(),
                        periscopes: Vec::new(),
                    });
                    if body.is_some() {
                        open.push(id);
                    }
                }
                "let" => {
                    if let (Some(&rid), Some(name)) = (open.last(), ident_at(i + 1)) {
                        tree.regions[rid.0 as usize].allocations.push(Allocation {
                            name,
                            keyword_cell: CellId(i as u32),
                            name_cell: CellId((i + 1) as u32),
                        });
                    }
                }
                "periscope" => {
                    let target_name = if keyword_at(i + 2, "to") {
                        ident_at(i + 3).unwrap_or_default()
                    } else {
                        String::new()
                    };
                    let edge_index = tree.periscopes.len();
                    if let Some(&rid) = open.last() {
                        tree.regions[rid.0 as usize].periscopes.push(edge_index);
                    }
                    tree.periscopes.push(PeriscopeEdge {
                        source: open.last().copied(),
                        target: None,
                        target_name,
                        direction: Direction::Out,
                        keyword_cell: CellId(i as u32),
                        value_cell: CellId((i + 1) as u32),
                    });
                }
                _ => {}
            }
        }

        for edge in &mut tree.periscopes {
            edge.target = tree
                .regions
                .iter()
                .find(|r| r.name == edge.target_name)
                .map(|r| r.id);
        }
        tree
    }
}

fn matching_brace(field: &EntropyField, open_at: usize) -> Option<usize> {
    let cells = field.cells();
    let mut depth = 0usize;
    for (i, cell) in cells.iter().enumerate().skip(open_at) {
        if cell.token.ty != TokenType::Punctuation {
            continue;
        }
        match cell.token.text.as_str() {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Context for the regime-declaration constraint: the cell after `regime`
/// must hold a regime state.
pub struct RegimeDeclContext {
    pub region_name: String,
    pub regime_cell: CellId,
}

impl RegimeDeclContext {
    pub fn cells(&self) -> Vec<CellId> {
        vec![self.regime_cell]
    }

    pub fn check(&self, view: &FieldView<'_>) -> Verdict {
        let retained = view.retain_by_role(self.regime_cell, |r| matches!(r, Role::RegimeName(_)));
        if retained.is_empty() {
            return Verdict::Contradiction {
                cell: self.regime_cell,
                message: format!(
                    "expected a regime (FIFO, FILO, SEQ or RAND) after 'regime' in region '{}'",
                    self.region_name
                ),
                suggestions: Vec::new(),
            };
        }
        if retained.len() == view.entropy(self.regime_cell) {
            Verdict::Satisfiable
        } else {
            Verdict::Reduce(vec![(self.regime_cell, retained)])
        }
    }
}

/// Context for lexical containment: the outer cell range must fully contain
/// the inner one.
pub struct ContainmentContext {
    pub outer_label: String,
    pub outer: (CellId, CellId),
    pub inner_label: String,
    pub inner: (CellId, CellId),
    pub anchor: CellId,
}

impl ContainmentContext {
    pub fn cells(&self) -> Vec<CellId> {
        vec![self.anchor]
    }

    pub fn check(&self, _view: &FieldView<'_>) -> Verdict {
        if self.inner.0 >= self.outer.0 && self.inner.1 <= self.outer.1 {
            Verdict::Satisfiable
        } else {
            Verdict::Contradiction {
                cell: self.anchor,
                message: format!(
                    "{} escapes the lifetime of {}",
                    self.inner_label, self.outer_label
                ),
                suggestions: Vec::new(),
            }
        }
    }
}

/// Context for periscope regime compatibility. While regimes are still
/// ambiguous the constraint reduces to the mutually admissible subsets;
/// once no admissible pair remains it contradicts at the periscope cell.
pub struct PeriscopeContext {
    pub periscope_cell: CellId,
    pub value_cell: CellId,
    pub source_name: String,
    pub target_name: String,
    pub source_regime_cell: Option<CellId>,
    pub target_regime_cell: Option<CellId>,
    pub source_default: Regime,
    pub target_default: Regime,
    pub direction: Direction,
}

impl PeriscopeContext {
    pub fn cells(&self) -> Vec<CellId> {
        let mut cells = vec![self.periscope_cell, self.value_cell];
        cells.extend(self.source_regime_cell);
        cells.extend(self.target_regime_cell);
        cells
    }

    fn live_regimes(view: &FieldView<'_>, cell: Option<CellId>, default: Regime) -> Vec<Regime> {
        match cell {
            Some(cell) => {
                let mut regimes: Vec<Regime> = view
                    .live_roles(cell)
                    .into_iter()
                    .filter_map(|r| match r {
                        Role::RegimeName(regime) => Some(regime),
                        _ => None,
                    })
                    .collect();
                regimes.sort_by_key(|&r| r as usize);
                regimes
            }
            None => vec![default],
        }
    }

    pub fn check(&self, view: &FieldView<'_>) -> Verdict {
        let sources = Self::live_regimes(view, self.source_regime_cell, self.source_default);
        let targets = Self::live_regimes(view, self.target_regime_cell, self.target_default);
        if sources.is_empty() || targets.is_empty() {
            // The regime cell lost all regime states; RegimeDecl reports it.
            return Verdict::Satisfiable;
        }

        let source_ok: Vec<Regime> = sources
            .iter()
            .copied()
            .filter(|&s| targets.iter().any(|&t| admissible(s, t, self.direction)))
            .collect();
        let target_ok: Vec<Regime> = targets
            .iter()
            .copied()
            .filter(|&t| sources.iter().any(|&s| admissible(s, t, self.direction)))
            .collect();

        if source_ok.is_empty() || target_ok.is_empty() {
            let message = if self.direction == Direction::Bidirectional {
                format!(
                    "bidirectional periscope between {} and {} is only admissible between RAND regions",
                    fmt_regimes(&sources),
                    fmt_regimes(&targets)
                )
            } else {
                format!(
                    "Cannot collapse periscope from {} to {}",
                    fmt_regimes(&sources),
                    fmt_regimes(&targets)
                )
            };
            let mut suggestions = Vec::new();
            if let (&[s], &[t]) = (sources.as_slice(), targets.as_slice()) {
                suggestions.extend(substitute_suggestion(s, t, self.direction));
            }
            return Verdict::Contradiction {
                cell: self.periscope_cell,
                message,
                suggestions,
            };
        }

        let mut reductions = Vec::new();
        if let Some(cell) = self.source_regime_cell {
            if source_ok.len() < sources.len() {
                let retain = view.retain_by_role(cell, |r| match r {
                    Role::RegimeName(regime) => source_ok.contains(&regime),
                    _ => true,
                });
                reductions.push((cell, retain));
            }
        }
        if let Some(cell) = self.target_regime_cell {
            if target_ok.len() < targets.len() {
                let retain = view.retain_by_role(cell, |r| match r {
                    Role::RegimeName(regime) => target_ok.contains(&regime),
                    _ => true,
                });
                reductions.push((cell, retain));
            }
        }
        if reductions.is_empty() {
            Verdict::Satisfiable
        } else {
            Verdict::Reduce(reductions)
        }
    }
}

fn fmt_regimes(regimes: &[Regime]) -> String {
    regimes
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// The region rule: derive the tree and emit the region constraint family.
pub fn region_constraints(field: &EntropyField) -> Vec<Constraint> {
    let tree = RegionTree::build(field);
    let mut out = Vec::new();

    for region in tree.regions() {
        if let Some(regime_cell) = region.regime_cell {
            out.push(Constraint::new(
                ConstraintKind::Regime,
                Validator::RegimeDecl(RegimeDeclContext {
                    region_name: region.name.clone(),
                    regime_cell,
                }),
            ));
        }
        if let (Some(parent_id), Some(body)) = (region.parent, region.body) {
            let parent = tree.get(parent_id);
            if let Some(parent_body) = parent.body {
                out.push(Constraint::new(
                    ConstraintKind::Region,
                    Validator::Containment(ContainmentContext {
                        outer_label: format!("region '{}'", parent.name),
                        outer: parent_body,
                        inner_label: format!("region '{}'", region.name),
                        inner: body,
                        anchor: region.keyword_cell,
                    }),
                ));
            }
        }
        if let Some(body) = region.body {
            for alloc in &region.allocations {
                out.push(Constraint::new(
                    ConstraintKind::Region,
                    Validator::Containment(ContainmentContext {
                        outer_label: format!("region '{}'", region.name),
                        outer: body,
                        inner_label: format!("allocation '{}'", alloc.name),
                        inner: (alloc.keyword_cell, alloc.name_cell),
                        anchor: alloc.keyword_cell,
                    }),
                ));
            }
        }
    }

    for edge in tree.periscopes() {
        match (edge.source, edge.target) {
            (Some(source), Some(target)) => {
                let source = tree.get(source);
                let target = tree.get(target);
                let kind = if edge.direction == Direction::Bidirectional {
                    ConstraintKind::Periscope
                } else {
                    ConstraintKind::Region
                };
                out.push(Constraint::new(
                    kind,
                    Validator::PeriscopeCompat(PeriscopeContext {
                        periscope_cell: edge.keyword_cell,
                        value_cell: edge.value_cell,
                        source_name: source.name.clone(),
                        target_name: target.name.clone(),
                        source_regime_cell: source.regime_cell,
                        target_regime_cell: target.regime_cell,
                        source_default: source.regime,
                        target_default: target.regime,
                        direction: edge.direction,
                    }),
                ));
            }
            (None, _) => {
                out.push(Constraint::new(
                    ConstraintKind::Region,
                    Validator::AlwaysFail {
                        cell: edge.keyword_cell,
                        message: "periscope outside of a region".to_string(),
                        suggestions: vec!["move the periscope into a region block".to_string()],
                    },
                ));
            }
            (Some(_), None) => {
                out.push(Constraint::new(
                    ConstraintKind::Region,
                    Validator::AlwaysFail {
                        cell: edge.keyword_cell,
                        message: format!("unknown periscope target '{}'", edge.target_name),
                        suggestions: Vec::new(),
                    },
                ));
            }
        }
    }

    out
}
