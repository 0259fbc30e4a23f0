//! The Braggi language as data: state seeding, the successor-role table,
//! and the grammar pattern library.
//!
//! Seeding gives each cell the states compatible with its token. Most
//! tokens have exactly one interpretation; identifiers are deliberately
//! ambiguous (function name, region name, binding reference, …) and are
//! pinned by adjacency during propagation or, where several roles stay
//! legal, resolved by state weights at collapse time.

use crate::compiler::constraint::{Constraint, ConstraintKind, Validator};
use crate::compiler::field::{CellId, EntropyField, FieldError};
use crate::compiler::pattern::{compile_to_constraint, Pattern, PatternError, PatternLibrary};
use crate::compiler::regions::Regime;
use crate::compiler::tokens::TokenType;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Semantic role a collapsed cell can take. This is the `type_tag` of a
/// state; lexical payload stays on the owning cell's token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    KwFn,
    KwLet,
    KwRegion,
    KwRegime,
    KwPeriscope,
    KwTo,
    KwType,
    KwImport,
    RegimeName(Regime),
    FnName,
    ParamName,
    TypeName,
    RegionName,
    TargetName,
    LetName,
    TypeAliasName,
    ImportName,
    VarRef,
    FreeRef,
    IntConst,
    FloatConst,
    StrConst,
    CharConst,
    ArrowDash,
    ArrowHead,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    EofMark,
    InvalidMark,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::KwFn => write!(f, "'fn'"),
            Role::KwLet => write!(f, "'let'"),
            Role::KwRegion => write!(f, "'region'"),
            Role::KwRegime => write!(f, "'regime'"),
            Role::KwPeriscope => write!(f, "'periscope'"),
            Role::KwTo => write!(f, "'to'"),
            Role::KwType => write!(f, "'type'"),
            Role::KwImport => write!(f, "'import'"),
            Role::RegimeName(r) => write!(f, "regime {}", r),
            Role::FnName => write!(f, "function name"),
            Role::ParamName => write!(f, "parameter name"),
            Role::TypeName => write!(f, "type name"),
            Role::RegionName => write!(f, "region name"),
            Role::TargetName => write!(f, "periscope target"),
            Role::LetName => write!(f, "binding name"),
            Role::TypeAliasName => write!(f, "type alias name"),
            Role::ImportName => write!(f, "import name"),
            Role::VarRef => write!(f, "binding reference"),
            Role::FreeRef => write!(f, "free reference"),
            Role::IntConst => write!(f, "integer literal"),
            Role::FloatConst => write!(f, "float literal"),
            Role::StrConst => write!(f, "string literal"),
            Role::CharConst => write!(f, "char literal"),
            Role::ArrowDash => write!(f, "'-'"),
            Role::ArrowHead => write!(f, "'>'"),
            Role::Assign => write!(f, "'='"),
            Role::LParen => write!(f, "'('"),
            Role::RParen => write!(f, "')'"),
            Role::LBrace => write!(f, "'{{'"),
            Role::RBrace => write!(f, "'}}'"),
            Role::Comma => write!(f, "','"),
            Role::Colon => write!(f, "':'"),
            Role::Semi => write!(f, "';'"),
            Role::EofMark => write!(f, "end of input"),
            Role::InvalidMark => write!(f, "invalid token"),
        }
    }
}

/// For each role, the roles allowed in the immediately following cell.
pub type FollowTable = HashMap<Role, HashSet<Role>>;

const EXPR_ROLES: &[Role] = &[
    Role::VarRef,
    Role::FreeRef,
    Role::IntConst,
    Role::FloatConst,
    Role::StrConst,
    Role::CharConst,
];

const DECL_FIRST: &[Role] = &[Role::KwFn, Role::KwRegion, Role::KwType, Role::KwImport];

const REGIMES: &[Regime] = &[Regime::Fifo, Regime::Filo, Regime::Seq, Regime::Rand];

fn stmt_first() -> Vec<Role> {
    let mut roles = vec![Role::KwLet, Role::KwPeriscope, Role::KwRegion];
    roles.extend_from_slice(EXPR_ROLES);
    roles
}

fn build_follow_table() -> FollowTable {
    let mut table = FollowTable::new();
    let mut insert = |role: Role, follows: Vec<Role>| {
        table.insert(role, follows.into_iter().collect());
    };

    let stmt = stmt_first();
    let expr = EXPR_ROLES.to_vec();

    insert(Role::KwFn, vec![Role::FnName]);
    insert(Role::FnName, vec![Role::LParen]);
    insert(Role::LParen, vec![Role::ParamName, Role::RParen]);
    insert(Role::ParamName, vec![Role::Colon]);
    insert(Role::Colon, vec![Role::TypeName]);
    insert(
        Role::TypeName,
        vec![Role::Comma, Role::RParen, Role::LBrace, Role::Semi],
    );
    insert(Role::Comma, vec![Role::ParamName]);
    insert(Role::RParen, vec![Role::ArrowDash]);
    insert(Role::ArrowDash, vec![Role::ArrowHead]);
    insert(Role::ArrowHead, vec![Role::TypeName]);

    let mut block_entry = stmt.clone();
    block_entry.push(Role::RBrace);
    insert(Role::LBrace, block_entry);

    let mut after_block = stmt.clone();
    after_block.extend_from_slice(DECL_FIRST);
    after_block.push(Role::RBrace);
    after_block.push(Role::EofMark);
    insert(Role::RBrace, after_block.clone());
    insert(Role::Semi, after_block);

    insert(Role::KwLet, vec![Role::LetName]);
    insert(Role::LetName, vec![Role::Assign]);
    let mut after_assign = expr.clone();
    after_assign.push(Role::TypeName);
    insert(Role::Assign, after_assign);

    let mut after_expr = stmt.clone();
    after_expr.extend([Role::Semi, Role::KwTo, Role::RBrace]);
    for &role in EXPR_ROLES {
        insert(role, after_expr.clone());
    }

    insert(Role::KwPeriscope, expr);
    insert(Role::KwTo, vec![Role::TargetName]);
    insert(Role::TargetName, vec![Role::LBrace]);

    insert(Role::KwRegion, vec![Role::RegionName]);
    insert(Role::RegionName, vec![Role::KwRegime, Role::LBrace]);
    insert(
        Role::KwRegime,
        REGIMES.iter().map(|&r| Role::RegimeName(r)).collect(),
    );
    for &r in REGIMES {
        insert(Role::RegimeName(r), vec![Role::LBrace]);
    }

    insert(Role::KwType, vec![Role::TypeAliasName]);
    insert(Role::TypeAliasName, vec![Role::Assign]);
    insert(Role::KwImport, vec![Role::ImportName]);
    insert(Role::ImportName, vec![Role::Semi]);

    table
}

fn build_library() -> PatternLibrary {
    use TokenType::*;
    let mut lib = PatternLibrary::new();

    lib.register(
        "program",
        Pattern::seq(vec![
            Pattern::rep(Pattern::reference("decl")),
            Pattern::token(Eof),
        ]),
    );
    lib.register(
        "decl",
        Pattern::sup(vec![
            Pattern::reference("fn_decl"),
            Pattern::reference("region_decl"),
            Pattern::reference("type_decl"),
            Pattern::reference("import_decl"),
        ]),
    );
    lib.register(
        "fn_decl",
        Pattern::seq(vec![
            Pattern::keyword("fn"),
            Pattern::token(Identifier),
            Pattern::punct("("),
            Pattern::opt(Pattern::reference("params")),
            Pattern::punct(")"),
            Pattern::op("-"),
            Pattern::op(">"),
            Pattern::reference("type"),
            Pattern::reference("block"),
        ]),
    );
    lib.register(
        "params",
        Pattern::seq(vec![
            Pattern::reference("param"),
            Pattern::rep(Pattern::seq(vec![
                Pattern::punct(","),
                Pattern::reference("param"),
            ])),
        ]),
    );
    lib.register(
        "param",
        Pattern::seq(vec![
            Pattern::token(Identifier),
            Pattern::punct(":"),
            Pattern::reference("type"),
        ]),
    );
    lib.register("type", Pattern::token(Identifier));
    lib.register(
        "type_decl",
        Pattern::seq(vec![
            Pattern::keyword("type"),
            Pattern::token(Identifier),
            Pattern::op("="),
            Pattern::reference("type"),
            Pattern::punct(";"),
        ]),
    );
    lib.register(
        "import_decl",
        Pattern::seq(vec![
            Pattern::keyword("import"),
            Pattern::token(Identifier),
            Pattern::punct(";"),
        ]),
    );
    lib.register(
        "region_decl",
        Pattern::seq(vec![
            Pattern::keyword("region"),
            Pattern::token(Identifier),
            Pattern::opt(Pattern::seq(vec![
                Pattern::keyword("regime"),
                Pattern::reference("regime"),
            ])),
            Pattern::reference("block"),
        ]),
    );
    lib.register(
        "regime",
        Pattern::sup(vec![
            Pattern::keyword("FIFO"),
            Pattern::keyword("FILO"),
            Pattern::keyword("SEQ"),
            Pattern::keyword("RAND"),
        ]),
    );
    lib.register(
        "block",
        Pattern::seq(vec![
            Pattern::punct("{"),
            Pattern::rep(Pattern::reference("stmt")),
            Pattern::punct("}"),
        ]),
    );
    lib.register(
        "stmt",
        Pattern::sup(vec![
            Pattern::reference("let_stmt"),
            Pattern::reference("periscope_stmt"),
            Pattern::reference("region_decl"),
            Pattern::seq(vec![
                Pattern::reference("expr"),
                Pattern::opt(Pattern::punct(";")),
            ]),
        ]),
    );
    lib.register(
        "let_stmt",
        Pattern::seq(vec![
            Pattern::keyword("let"),
            Pattern::token(Identifier),
            Pattern::op("="),
            Pattern::reference("expr"),
            Pattern::punct(";"),
        ]),
    );
    lib.register(
        "periscope_stmt",
        Pattern::seq(vec![
            Pattern::keyword("periscope"),
            Pattern::reference("expr"),
            Pattern::keyword("to"),
            Pattern::token(Identifier),
            Pattern::reference("block"),
        ]),
    );
    lib.register(
        "expr",
        Pattern::sup(vec![
            Pattern::token(Identifier),
            Pattern::token(IntLiteral),
            Pattern::token(FloatLiteral),
            Pattern::token(StringLiteral),
            Pattern::token(CharLiteral),
        ]),
    );

    lib
}

/// Identifier roles and their prior weights. `VarRef` outweighs the rest so
/// an identifier that stays ambiguous in expression position collapses to a
/// binding reference.
const IDENT_SEEDS: &[(Role, u32)] = &[
    (Role::FnName, 2),
    (Role::ParamName, 2),
    (Role::TypeName, 2),
    (Role::RegionName, 2),
    (Role::TargetName, 2),
    (Role::LetName, 2),
    (Role::TypeAliasName, 1),
    (Role::ImportName, 1),
    (Role::VarRef, 3),
    (Role::FreeRef, 1),
];

/// The language definition: follow table plus pattern library.
pub struct Grammar {
    follow: Rc<FollowTable>,
    library: Rc<PatternLibrary>,
}

impl Grammar {
    pub fn braggi() -> Result<Self, PatternError> {
        let library = build_library();
        library.validate("program")?;
        Ok(Self {
            follow: Rc::new(build_follow_table()),
            library: Rc::new(library),
        })
    }

    pub fn follow(&self) -> &FollowTable {
        &self.follow
    }

    pub fn library(&self) -> &Rc<PatternLibrary> {
        &self.library
    }

    /// Seed every cell with the states compatible with its token. A token
    /// with no interpretation empties its cell, which is a contradiction.
    pub fn seed(&self, field: &mut EntropyField) -> Result<(), FieldError> {
        for i in 0..field.cells().len() {
            let id = CellId(i as u32);
            let (ty, text) = {
                let token = &field.cell(id).token;
                (token.ty, token.text.clone())
            };
            for (role, weight) in seed_roles(ty, &text) {
                field.add_state(id, role, weight)?;
            }
            if field.cell(id).entropy() == 0 {
                field.mark_contradiction(crate::compiler::field::ContradictionInfo {
                    cell: id,
                    constraint: None,
                    previous: None,
                    message: format!("token '{}' has no interpretation in this grammar", text),
                    suggestions: Vec::new(),
                });
            }
        }
        Ok(())
    }

    /// The grammar's constraint set: start-symbol membership, pairwise
    /// adjacency, invalid-token rejection, and the whole-program pattern.
    pub fn constraints(&self, field: &EntropyField) -> Vec<Constraint> {
        let cells = field.cells();
        let mut out = Vec::new();
        if cells.is_empty() {
            return out;
        }

        let mut allowed: HashSet<Role> = DECL_FIRST.iter().copied().collect();
        allowed.insert(Role::EofMark);
        out.push(Constraint::new(
            ConstraintKind::Syntax,
            Validator::Membership {
                cell: cells[0].id,
                allowed,
                expected: "a declaration".to_string(),
            },
        ));

        for cell in cells {
            if cell.token.ty == TokenType::Invalid {
                out.push(Constraint::new(
                    ConstraintKind::Syntax,
                    Validator::RejectInvalid { cell: cell.id },
                ));
            }
        }

        for pair in cells.windows(2) {
            out.push(Constraint::new(
                ConstraintKind::Syntax,
                Validator::Adjacency {
                    left: pair[0].id,
                    right: pair[1].id,
                    follow: Rc::clone(&self.follow),
                },
            ));
        }

        out.push(compile_to_constraint(
            &self.library,
            "program",
            cells.iter().map(|c| c.id).collect(),
        ));

        out
    }
}

fn seed_roles(ty: TokenType, text: &str) -> Vec<(Role, u32)> {
    match ty {
        TokenType::Keyword => {
            let role = match text {
                "fn" => Role::KwFn,
                "let" => Role::KwLet,
                "region" => Role::KwRegion,
                "regime" => Role::KwRegime,
                "periscope" => Role::KwPeriscope,
                "to" => Role::KwTo,
                "type" => Role::KwType,
                "import" => Role::KwImport,
                "FIFO" => Role::RegimeName(Regime::Fifo),
                "FILO" => Role::RegimeName(Regime::Filo),
                "SEQ" => Role::RegimeName(Regime::Seq),
                "RAND" => Role::RegimeName(Regime::Rand),
                _ => return Vec::new(),
            };
            vec![(role, 1)]
        }
        TokenType::Identifier => IDENT_SEEDS.to_vec(),
        TokenType::IntLiteral => vec![(Role::IntConst, 1)],
        TokenType::FloatLiteral => vec![(Role::FloatConst, 1)],
        TokenType::StringLiteral => vec![(Role::StrConst, 1)],
        TokenType::CharLiteral => vec![(Role::CharConst, 1)],
        TokenType::Operator => {
            let role = match text {
                "-" => Role::ArrowDash,
                ">" => Role::ArrowHead,
                "=" => Role::Assign,
                _ => return Vec::new(),
            };
            vec![(role, 1)]
        }
        TokenType::Punctuation => {
            let role = match text {
                "(" => Role::LParen,
                ")" => Role::RParen,
                "{" => Role::LBrace,
                "}" => Role::RBrace,
                "," => Role::Comma,
                ":" => Role::Colon,
                ";" => Role::Semi,
                _ => return Vec::new(),
            };
            vec![(role, 1)]
        }
        TokenType::Eof => vec![(Role::EofMark, 1)],
        TokenType::Invalid => vec![(Role::InvalidMark, 1)],
        TokenType::Comment | TokenType::Whitespace | TokenType::Newline => Vec::new(),
    }
}
