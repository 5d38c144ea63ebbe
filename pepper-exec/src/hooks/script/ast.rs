use serde_json::Value as JsonValue;

use super::builtins::Builtin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HookKind {
    Pre,
    Post,
}

impl HookKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            HookKind::Pre => "before",
            HookKind::Post => "after",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Root {
    Globals,
    Locals,
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Globals,
    Locals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestField {
    Method,
    Url,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(JsonValue),
    Root(Root),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Var { scope: Scope, key: Expr },
    Request(RequestField),
    RequestHeader(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StmtKind {
    Assign { target: Target, value: Expr },
    Unset(Target),
    Assert { cond: Expr, message: Option<Expr>, source: String },
    Fail(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}
