//! Syntax tree for one script, produced by `script_parser` and walked by
//! `check` and `vm`.

use crate::model::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// `=`, `+=` or `-=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Expr>),
    /// A bare name: local variable, context member or library.
    Name(String),
    /// `target.name`
    Member { target: Box<Expr>, name: String },
    /// `callee(args)`; `callee` is a `Name` or a `Member`.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `var name = init;`
    Var { name: String, init: Expr },
    /// `expr;`
    Expr(Expr),
    /// `if (cond) { … } [else …]`
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    /// `while (cond) { … }`
    While { condition: Expr, body: Vec<Stmt> },
    /// `foreach (var name in items) { … }`
    Foreach {
        binding: String,
        items: Expr,
        body: Vec<Stmt>,
    },
    /// `throw value;`
    Throw(Expr),
    Block(Vec<Stmt>),
}

/// One complete script.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub body: Vec<Stmt>,
}
