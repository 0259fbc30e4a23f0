//! Grammar patterns and the pattern-stack matcher.
//!
//! A pattern is compiled into a functional constraint whose validator walks
//! the bound cells' token sequence. The matcher keeps an explicit stack of
//! obligations; every choice point (superposition, repetition, optional)
//! takes a checkpoint of the stack and restores it exactly on backtracking.
//! Reference cycles are permitted provided each cycle consumes at least one
//! token; zero-progress re-entry fails the current alternative.

use crate::compiler::constraint::{Constraint, ConstraintKind, FieldView, Validator, Verdict};
use crate::compiler::field::CellId;
use crate::compiler::tokens::TokenType;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("unknown pattern reference '{0}'")]
    UnknownReference(String),
}

/// One grammar pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Exactly one token of the given type, optionally with literal text.
    Token {
        ty: TokenType,
        literal: Option<String>,
    },
    /// Concatenation, all in order.
    Sequence(Vec<Rc<Pattern>>),
    /// Ordered alternation; first match wins, with backtracking.
    Superposition(Vec<Rc<Pattern>>),
    /// Zero or more, greedy.
    Repetition(Rc<Pattern>),
    /// Zero or one, greedy.
    Optional(Rc<Pattern>),
    /// Indirection into the library, resolved at match time.
    Reference(String),
}

impl Pattern {
    pub fn token(ty: TokenType) -> Rc<Pattern> {
        Rc::new(Pattern::Token { ty, literal: None })
    }

    pub fn literal(ty: TokenType, text: &str) -> Rc<Pattern> {
        Rc::new(Pattern::Token {
            ty,
            literal: Some(text.to_string()),
        })
    }

    pub fn keyword(text: &str) -> Rc<Pattern> {
        Pattern::literal(TokenType::Keyword, text)
    }

    pub fn punct(text: &str) -> Rc<Pattern> {
        Pattern::literal(TokenType::Punctuation, text)
    }

    pub fn op(text: &str) -> Rc<Pattern> {
        Pattern::literal(TokenType::Operator, text)
    }

    pub fn seq(parts: Vec<Rc<Pattern>>) -> Rc<Pattern> {
        Rc::new(Pattern::Sequence(parts))
    }

    pub fn sup(alternatives: Vec<Rc<Pattern>>) -> Rc<Pattern> {
        Rc::new(Pattern::Superposition(alternatives))
    }

    pub fn rep(inner: Rc<Pattern>) -> Rc<Pattern> {
        Rc::new(Pattern::Repetition(inner))
    }

    pub fn opt(inner: Rc<Pattern>) -> Rc<Pattern> {
        Rc::new(Pattern::Optional(inner))
    }

    pub fn reference(name: &str) -> Rc<Pattern> {
        Rc::new(Pattern::Reference(name.to_string()))
    }
}

/// Named patterns, looked up by `Reference` at match time.
#[derive(Debug, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, Rc<Pattern>>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, pattern: Rc<Pattern>) {
        self.patterns.insert(name.to_string(), pattern);
    }

    pub fn get(&self, name: &str) -> Option<Rc<Pattern>> {
        self.patterns.get(name).cloned()
    }

    /// Checks that every `Reference` reachable from `root` resolves.
    pub fn validate(&self, root: &str) -> Result<(), PatternError> {
        let root = self
            .get(root)
            .ok_or_else(|| PatternError::UnknownReference(root.to_string()))?;
        let mut seen = HashSet::new();
        let mut work = vec![root];
        while let Some(p) = work.pop() {
            match &*p {
                Pattern::Token { .. } => {}
                Pattern::Sequence(parts) | Pattern::Superposition(parts) => {
                    work.extend(parts.iter().cloned());
                }
                Pattern::Repetition(inner) | Pattern::Optional(inner) => {
                    work.push(inner.clone());
                }
                Pattern::Reference(name) => {
                    if seen.insert(name.clone()) {
                        let resolved = self
                            .get(name)
                            .ok_or_else(|| PatternError::UnknownReference(name.clone()))?;
                        work.push(resolved);
                    }
                }
            }
        }
        Ok(())
    }

    /// Recognizer entry point: does the token sequence match `root`?
    pub fn matches(&self, root: &str, tokens: &[(TokenType, &str)]) -> Result<bool, PatternError> {
        self.match_furthest(root, tokens).map(|(ok, _)| ok)
    }

    /// Like [`matches`](Self::matches), also reporting the furthest token
    /// position reached — the best available explanation for a failure.
    pub fn match_furthest(
        &self,
        root: &str,
        tokens: &[(TokenType, &str)],
    ) -> Result<(bool, usize), PatternError> {
        let root = self
            .get(root)
            .ok_or_else(|| PatternError::UnknownReference(root.to_string()))?;
        let mut furthest = 0;
        let matcher = MatchRun {
            library: self,
            tokens,
        };
        let ok = matcher.solve(vec![root], 0, HashSet::new(), &mut furthest)?;
        Ok((ok, furthest))
    }
}

/// One matching run over a fixed token sequence.
struct MatchRun<'a> {
    library: &'a PatternLibrary,
    tokens: &'a [(TokenType, &'a str)],
}

/// Guard keys: (pattern identity, position). Cleared whenever a token is
/// consumed, so only zero-progress re-entry trips it.
type Guard = HashSet<(usize, usize)>;

impl<'a> MatchRun<'a> {
    fn leaf_matches(&self, pos: usize, ty: TokenType, literal: Option<&str>) -> bool {
        let Some((actual, text)) = self.tokens.get(pos) else {
            return false;
        };
        *actual == ty && literal.is_none_or(|lit| lit == *text)
    }

    fn solve(
        &self,
        mut stack: Vec<Rc<Pattern>>,
        pos: usize,
        guard: Guard,
        furthest: &mut usize,
    ) -> Result<bool, PatternError> {
        *furthest = (*furthest).max(pos);
        let Some(top) = stack.pop() else {
            return Ok(pos == self.tokens.len());
        };
        match &*top {
            Pattern::Token { ty, literal } => {
                if self.leaf_matches(pos, *ty, literal.as_deref()) {
                    self.solve(stack, pos + 1, Guard::new(), furthest)
                } else {
                    Ok(false)
                }
            }
            Pattern::Sequence(parts) => {
                for part in parts.iter().rev() {
                    stack.push(part.clone());
                }
                self.solve(stack, pos, guard, furthest)
            }
            Pattern::Superposition(alternatives) => {
                let checkpoint = stack;
                for alternative in alternatives {
                    let mut stack = checkpoint.clone();
                    stack.push(alternative.clone());
                    if self.solve(stack, pos, guard.clone(), furthest)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Pattern::Repetition(inner) => {
                let key = (Rc::as_ptr(&top) as usize, pos);
                let checkpoint = stack;
                if !guard.contains(&key) {
                    let mut stack = checkpoint.clone();
                    stack.push(top.clone());
                    stack.push(inner.clone());
                    let mut guard = guard.clone();
                    guard.insert(key);
                    if self.solve(stack, pos, guard, furthest)? {
                        return Ok(true);
                    }
                }
                self.solve(checkpoint, pos, guard, furthest)
            }
            Pattern::Optional(inner) => {
                let checkpoint = stack;
                let mut stack = checkpoint.clone();
                stack.push(inner.clone());
                if self.solve(stack, pos, guard.clone(), furthest)? {
                    return Ok(true);
                }
                self.solve(checkpoint, pos, guard, furthest)
            }
            Pattern::Reference(name) => {
                let resolved = self
                    .library
                    .get(name)
                    .ok_or_else(|| PatternError::UnknownReference(name.clone()))?;
                let key = (Rc::as_ptr(&resolved) as usize, pos);
                if guard.contains(&key) {
                    return Ok(false);
                }
                let mut guard = guard;
                guard.insert(key);
                stack.push(resolved);
                self.solve(stack, pos, guard, furthest)
            }
        }
    }
}

/// Validator context for a compiled pattern constraint.
pub struct PatternMatcher {
    library: Rc<PatternLibrary>,
    root: String,
}

impl PatternMatcher {
    pub fn check(&self, view: &FieldView<'_>, cells: &[CellId]) -> Verdict {
        let tokens: Vec<(TokenType, &str)> = cells
            .iter()
            .map(|&c| {
                let t = view.token(c);
                (t.ty, t.text.as_str())
            })
            .collect();
        match self.library.match_furthest(&self.root, &tokens) {
            Ok((true, _)) => Verdict::Satisfiable,
            Ok((false, furthest)) => {
                let at = furthest.min(cells.len().saturating_sub(1));
                let cell = cells[at];
                Verdict::Contradiction {
                    cell,
                    message: format!(
                        "no grammar derivation reaches '{}'",
                        view.token(cell)
                    ),
                    suggestions: Vec::new(),
                }
            }
            Err(err) => {
                let cell = cells.first().copied().unwrap_or(CellId(0));
                Verdict::Contradiction {
                    cell,
                    message: err.to_string(),
                    suggestions: Vec::new(),
                }
            }
        }
    }
}

/// Compile a registered pattern into a functional constraint over `cells`.
pub fn compile_to_constraint(
    library: &Rc<PatternLibrary>,
    root: &str,
    cells: Vec<CellId>,
) -> Constraint {
    Constraint::new(
        ConstraintKind::Syntax,
        Validator::Pattern {
            cells,
            matcher: PatternMatcher {
                library: Rc::clone(library),
                root: root.to_string(),
            },
        },
    )
}
