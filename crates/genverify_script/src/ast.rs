//! Abstract syntax tree for the script subset understood by the interpreter.

use std::fmt;
use std::rc::Rc;

/// Source location span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// 1-based line and column of the span start within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let upto = source.get(..self.start).unwrap_or(source);
        let line = upto.matches('\n').count() + 1;
        let col = upto.rfind('\n').map_or(upto.len(), |nl| upto.len() - nl - 1) + 1;
        (line, col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A parsed script.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Spanned<Stmt>>,
}

/// `var` / `let` / `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

/// One `name = init` entry of a variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclarator {
    pub name: String,
    pub init: Option<Spanned<Expr>>,
}

/// A function declaration or expression.
///
/// The body is reference counted so closures created at runtime share it with the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Vec<Spanned<Stmt>>>,
}

/// `catch (param) { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub param: Option<String>,
    pub body: Vec<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(VarKind, Vec<VarDeclarator>),
    Function(Rc<FunctionDecl>),
    Expr(Spanned<Expr>),
    Return(Option<Spanned<Expr>>),
    If {
        test: Spanned<Expr>,
        then_branch: Box<Spanned<Stmt>>,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    While {
        test: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    For {
        init: Option<Box<Spanned<Stmt>>>,
        test: Option<Spanned<Expr>>,
        update: Option<Spanned<Expr>>,
        body: Box<Spanned<Stmt>>,
    },
    ForIn {
        name: String,
        object: Spanned<Expr>,
        body: Box<Spanned<Stmt>>,
    },
    Block(Vec<Spanned<Stmt>>),
    Break,
    Continue,
    Throw(Spanned<Expr>),
    Try {
        block: Vec<Spanned<Stmt>>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Spanned<Stmt>>>,
    },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Instanceof,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Plain `=` or a compound assignment carrying its arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    This,
    Array(Vec<Spanned<Expr>>),
    Object(Vec<(String, Spanned<Expr>)>),
    Function(Rc<FunctionDecl>),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Spanned<Expr>>,
    },
    Binary(Box<Spanned<Expr>>, BinaryOp, Box<Spanned<Expr>>),
    Logical(Box<Spanned<Expr>>, LogicalOp, Box<Spanned<Expr>>),
    Assign {
        op: AssignOp,
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },
    Conditional {
        test: Box<Spanned<Expr>>,
        consequent: Box<Spanned<Expr>>,
        alternate: Box<Spanned<Expr>>,
    },
    Member(Box<Spanned<Expr>>, String),
    Index(Box<Spanned<Expr>>, Box<Spanned<Expr>>),
    Call(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
    New(Box<Spanned<Expr>>, Vec<Spanned<Expr>>),
}

impl Expr {
    /// Whether this expression may appear on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..))
    }
}
