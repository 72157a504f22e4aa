//! Abstract syntax tree for MiniC.
//!
//! Subexpression ownership is exclusive (a tree, never a DAG), and there
//! is no span tracking: diagnostics are fixed strings, not located ones.

/// A complete MiniC program: an ordered sequence of top-level declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub globals: Vec<Global>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Global {
    Func(Func),
    VarDecl(VarDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Func {
    pub rettype: Type,
    pub name: String,
    pub args: Vec<(Type, String)>,
    pub body: Block,
}

/// A brace-delimited sequence of statements.
pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Empty,
    If(Expr, Box<Stmt>),
    IfElse(Expr, Box<Stmt>, Box<Stmt>),
    While(Expr, Box<Stmt>),
    Block(Block),
    Assign(String, Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    ExprStmt(Expr),
    VarDecl(VarDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub is_const: bool,
    pub ty: Type,
    pub defs: Vec<VarDef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    FuncCall(String, Vec<Expr>),
    Ident(String),
    Number(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    Neq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Pos,
    Neg,
    Not,
}
