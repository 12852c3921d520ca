use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

pub use lox_common::types::{Span, Spanned};

pub type ExprS = Spanned<Expr>;
pub type StmtS = Spanned<Stmt>;

#[derive(Debug, Default)]
pub struct Program {
    pub stmts: Vec<StmtS>,
}

#[derive(Debug, PartialEq)]
pub enum Stmt {
    Block(StmtBlock),
    Class(StmtClass),
    Expr(StmtExpr),
    Fun(Rc<StmtFun>),
    If(Box<StmtIf>),
    Print(StmtPrint),
    Return(StmtReturn),
    Var(StmtVar),
    While(Box<StmtWhile>),
}

#[derive(Debug, PartialEq)]
pub struct StmtBlock {
    pub stmts: Vec<StmtS>,
}

#[derive(Debug, PartialEq)]
pub struct StmtClass {
    pub name: Spanned<String>,
    /// Always an [`Expr::Var`] when present.
    pub super_: Option<ExprS>,
    pub methods: Vec<Rc<StmtFun>>,
}

/// An expression statement evaluates an expression and discards the result.
#[derive(Debug, PartialEq)]
pub struct StmtExpr {
    pub value: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct StmtFun {
    pub name: Spanned<String>,
    pub params: Vec<Spanned<String>>,
    pub body: Vec<StmtS>,
}

#[derive(Debug, PartialEq)]
pub struct StmtIf {
    pub cond: ExprS,
    pub then: StmtS,
    pub else_: Option<StmtS>,
}

#[derive(Debug, PartialEq)]
pub struct StmtPrint {
    pub value: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct StmtReturn {
    pub value: Option<ExprS>,
}

#[derive(Debug, PartialEq)]
pub struct StmtVar {
    pub name: Spanned<String>,
    pub value: Option<ExprS>,
}

#[derive(Debug, PartialEq)]
pub struct StmtWhile {
    pub cond: ExprS,
    pub body: StmtS,
}

#[derive(Debug, PartialEq)]
pub enum Expr {
    Assign(Box<ExprAssign>),
    Call(Box<ExprCall>),
    Get(Box<ExprGet>),
    Grouping(Box<ExprGrouping>),
    Infix(Box<ExprInfix>),
    Literal(ExprLiteral),
    Logical(Box<ExprLogical>),
    Prefix(Box<ExprPrefix>),
    Set(Box<ExprSet>),
    Super(ExprSuper),
    This(ExprThis),
    Var(ExprVar),
}

#[derive(Debug, PartialEq)]
pub struct ExprAssign {
    pub var: Var,
    pub value: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct ExprCall {
    pub callee: ExprS,
    pub args: Vec<ExprS>,
    /// The closing parenthesis; runtime call errors point here.
    pub paren: Span,
}

#[derive(Debug, PartialEq)]
pub struct ExprGet {
    pub object: ExprS,
    pub name: Spanned<String>,
}

#[derive(Debug, PartialEq)]
pub struct ExprGrouping {
    pub value: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct ExprInfix {
    pub lt: ExprS,
    pub op: OpInfix,
    pub rt: ExprS,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprLiteral {
    Bool(bool),
    Nil,
    Number(f64),
    String(String),
}

#[derive(Debug, PartialEq)]
pub struct ExprLogical {
    pub lt: ExprS,
    pub op: OpLogical,
    pub rt: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct ExprPrefix {
    pub op: OpPrefix,
    pub rt: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct ExprSet {
    pub object: ExprS,
    pub name: Spanned<String>,
    pub value: ExprS,
}

#[derive(Debug, PartialEq)]
pub struct ExprSuper {
    pub var: Var,
    pub name: Spanned<String>,
}

#[derive(Debug, PartialEq)]
pub struct ExprThis {
    pub var: Var,
}

#[derive(Debug, PartialEq)]
pub struct ExprVar {
    pub var: Var,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpInfix {
    Add,
    Divide,
    Equal,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Multiply,
    NotEqual,
    Subtract,
}

impl Display for OpInfix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            OpInfix::Add => "+",
            OpInfix::Divide => "/",
            OpInfix::Equal => "==",
            OpInfix::Greater => ">",
            OpInfix::GreaterEqual => ">=",
            OpInfix::Less => "<",
            OpInfix::LessEqual => "<=",
            OpInfix::Multiply => "*",
            OpInfix::NotEqual => "!=",
            OpInfix::Subtract => "-",
        };
        write!(f, "{}", op)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpLogical {
    /// Short-circuiting logical AND.
    And,
    /// Short-circuiting logical OR.
    Or,
}

impl Display for OpLogical {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OpLogical::And => write!(f, "and"),
            OpLogical::Or => write!(f, "or"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpPrefix {
    Negate,
    Not,
}

impl Display for OpPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OpPrefix::Negate => write!(f, "-"),
            OpPrefix::Not => write!(f, "!"),
        }
    }
}

/// A name reference the resolver binds to a scope.
///
/// Each reference gets its own [`VarId`], so two textually identical uses of
/// `x` are still distinct entries in the binding table.
#[derive(Debug, PartialEq)]
pub struct Var {
    pub name: String,
    pub id: VarId,
}

impl Var {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), id: VarId::fresh() }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct VarId(u32);

impl VarId {
    fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(0);
        VarId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
