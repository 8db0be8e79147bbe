// ast.rs — AST for the Boolean constraint modelling language
//
// Produced by the parser, consumed by the encoder. Spans are byte offsets
// into the original source.

use chumsky::span::SimpleSpan;

pub type Span = SimpleSpan;

/// An identifier with its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A complete model: an ordered list of items.
#[derive(Debug, Clone)]
pub struct Model {
    pub items: Vec<Item>,
    pub span: Span,
}

impl Model {
    /// All identifiers declared by `var bool:` items, in declaration order.
    pub fn declared_vars(&self) -> impl Iterator<Item = &Ident> {
        self.items.iter().flat_map(|item| match item {
            Item::Decl(d) => d.vars.iter(),
            _ => [].iter(),
        })
    }

    pub fn constraints(&self) -> impl Iterator<Item = &ConstraintStmt> {
        self.items.iter().filter_map(|item| match item {
            Item::Constraint(c) => Some(c),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    /// `var bool : a, b, c;`
    Decl(DeclStmt),
    /// `constraint <expr> ;`
    Constraint(ConstraintStmt),
    /// `solve satisfy ;` — a no-op marker kept for round-tripping.
    Solve(Span),
}

#[derive(Debug, Clone)]
pub struct DeclStmt {
    pub vars: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstraintStmt {
    pub expr: Expr,
    pub span: Span,
}

/// Boolean expression tree. `And`/`Or` are n-ary (flattened chains);
/// `Implies` is right-associative, `Iff` left-associative.
#[derive(Debug, Clone)]
pub enum Expr {
    Var(Ident),
    Const(bool, Span),
    Not(Box<Expr>, Span),
    And(Vec<Expr>, Span),
    Or(Vec<Expr>, Span),
    Implies(Box<Expr>, Box<Expr>, Span),
    Iff(Box<Expr>, Box<Expr>, Span),
    Xor(Box<Expr>, Box<Expr>, Span),
    Card(CardExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Var(id) => id.span,
            Expr::Const(_, s)
            | Expr::Not(_, s)
            | Expr::And(_, s)
            | Expr::Or(_, s)
            | Expr::Implies(_, _, s)
            | Expr::Iff(_, _, s)
            | Expr::Xor(_, _, s) => *s,
            Expr::Card(c) => c.span,
        }
    }
}

/// `atmost(k, [v1, …, vn])` and friends.
#[derive(Debug, Clone)]
pub struct CardExpr {
    pub kind: CardKind,
    pub bound: u32,
    pub vars: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    AtMost,
    AtLeast,
    Exactly,
}

impl CardKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CardKind::AtMost => "atmost",
            CardKind::AtLeast => "atleast",
            CardKind::Exactly => "exactly",
        }
    }
}
