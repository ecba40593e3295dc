//! Owned AST for one translation unit.
//!
//! Declarators carry a flat list of type modifiers ordered with the
//! outermost constructor first: `int (*f)(void)` is
//! `[Pointer, FunctionOf]`, `int *f(void)` is `[FunctionOf, Pointer]`.
//! The core resolves a modifier list against a base type by folding from
//! the end of the list.

use lex::{IntBase, Loc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Qualifiers {
    pub constant: bool,
    pub volatile: bool,
}

impl Qualifiers {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseType {
    Void,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    /// A typedef-name; resolved by the core's typedef registry.
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclSpecs {
    pub base: BaseType,
    pub quals: Qualifiers,
    pub is_typedef: bool,
    pub is_extern: bool,
    pub is_static: bool,
}

impl Default for DeclSpecs {
    fn default() -> Self {
        DeclSpecs {
            base: BaseType::Int,
            quals: Qualifiers::none(),
            is_typedef: false,
            is_extern: false,
            is_static: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeModifier {
    Pointer(Qualifiers),
    /// Array bound is an unevaluated constant expression; `None` for `[]`.
    ArrayOf(Option<Expr>),
    /// `prototype` is false for an empty-parens declarator `f()`, whose
    /// parameter list stays unresolved until a definition supplies one.
    FunctionOf {
        params: Vec<ParamDecl>,
        variadic: bool,
        prototype: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: Option<String>,
    pub modifiers: Vec<TypeModifier>,
    pub init: Option<Initializer>,
    pub loc: Loc,
}

impl Declarator {
    /// True when the declarator's outermost constructor is a function,
    /// i.e. this declares a function rather than an object.
    pub fn is_function(&self) -> bool {
        matches!(self.modifiers.first(), Some(TypeModifier::FunctionOf { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Expr(Expr),
    List(Vec<Initializer>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub specs: DeclSpecs,
    pub declarator: Declarator,
}

/// A cast or sizeof type: specifiers plus an abstract declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub specs: DeclSpecs,
    pub declarator: Declarator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub specs: DeclSpecs,
    pub declarators: Vec<Declarator>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    LogicalNot,
    AddrOf,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Ident(String),
    IntLit { base: IntBase, repr: String },
    FloatLit { repr: String },
    CharLit { repr: String },
    StrLit { repr: String },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    IncDec { pre: bool, inc: bool, target: Box<Expr> },
    /// `op` is `None` for plain `=`, or the combining operator for `op=`.
    Assign { op: Option<BinaryOp>, lhs: Box<Expr>, rhs: Box<Expr> },
    Cond { cond: Box<Expr>, then_e: Box<Expr>, else_e: Box<Expr> },
    Comma { lhs: Box<Expr>, rhs: Box<Expr> },
    Cast { ty: Box<TypeName>, expr: Box<Expr> },
    SizeofExpr(Box<Expr>),
    SizeofType(Box<TypeName>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Index { base: Box<Expr>, index: Box<Expr> },
    Member { base: Box<Expr>, field: String, arrow: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Loc,
}

/// C89 compound statement: declarations first, then statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub decls: Vec<Declaration>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Option<Expr>),
    Compound(Block),
    If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    Switch { cond: Expr, body: Box<Stmt> },
    While { cond: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, cond: Expr },
    For { init: Option<Expr>, cond: Option<Expr>, step: Option<Expr>, body: Box<Stmt> },
    Goto(String),
    Label { name: String, stmt: Box<Stmt> },
    Case { value: Expr, stmt: Box<Stmt> },
    Default { stmt: Box<Stmt> },
    Break,
    Continue,
    Return(Option<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub specs: DeclSpecs,
    pub declarator: Declarator,
    pub body: Block,
    pub loc: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDecl {
    Function(FunctionDef),
    Declaration(Declaration),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslationUnit {
    pub items: Vec<ExternalDecl>,
}
