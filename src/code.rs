//! Code fragments.
//!
//! The compilers never build source text directly: they produce these
//! statement lists and declarations, and a [`crate::render::Render`]
//! implementation turns them into text for a target language.
use crate::expr::{Literal, Primitive};
use crate::render::Render;

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    /// Native representation of a primitive kind.
    Primitive(Primitive),
    Named { pkg: Option<String>, name: String },
    Pointer(Box<TypeRef>),
    Slice(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    /// Anonymous struct, used for inline objects.
    Struct(Vec<StructField>),
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeRef,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Variable or (qualified) identifier.
    Ident(String),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Deref(Box<Expr>),
    AddrOf(Box<Expr>),
    Nil,
    /// Literal of the given type (the type matters for composite literals).
    Lit(Literal, TypeRef),
    Str(String),
    Int(i64),
    Call(String, Vec<Expr>),
    Convert(TypeRef, Box<Expr>),
    /// Type assertion `x.(T)`.
    Assert(Box<Expr>, TypeRef),
    Composite { ty: TypeRef, fields: Vec<(String, Expr)>, addr: bool },
    SliceLit { elem: TypeRef, items: Vec<Expr> },
    Make { ty: TypeRef, len: Box<Expr> },
    Len(Box<Expr>),
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Not(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Assign { lhs: Expr, rhs: Expr, define: bool },
    VarDecl { name: String, ty: TypeRef, value: Option<Expr> },
    If { init: Option<Box<Stmt>>, cond: Expr, then: Block, otherwise: Block },
    Block(Block),
    Range { key: Option<String>, value: Option<String>, over: Expr, body: Block },
    TypeSwitch { binding: String, subject: Expr, cases: Vec<TypeCase> },
    Switch { subject: Expr, cases: Vec<ValueCase>, default: Block },
    Return(Vec<Expr>),
    Continue,
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCase {
    pub ty: TypeRef,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueCase {
    pub values: Vec<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub doc: Option<String>,
    pub def: TypeRef,
}

/// Declarations handed to the file assembly stage as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub types: Vec<TypeDecl>,
    pub funcs: Vec<FuncDecl>,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl TypeRef {
    pub fn named(pkg: &str, name: impl Into<String>) -> Self {
        let pkg = if pkg.is_empty() { None } else { Some(pkg.to_string()) };
        TypeRef::Named { pkg, name: name.into() }
    }
    pub fn pointer(self) -> Self {
        TypeRef::Pointer(Box::new(self))
    }
    pub fn slice(self) -> Self {
        TypeRef::Slice(Box::new(self))
    }
    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeRef::Pointer(_))
    }
    /// Strips one level of pointer.
    pub fn elem(&self) -> &TypeRef {
        match self {
            TypeRef::Pointer(inner) => inner,
            other => other,
        }
    }
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }
    pub fn field(self, name: impl Into<String>) -> Self {
        Expr::Field(Box::new(self), name.into())
    }
    pub fn index(self, idx: Expr) -> Self {
        Expr::Index(Box::new(self), Box::new(idx))
    }
    pub fn deref(self) -> Self {
        Expr::Deref(Box::new(self))
    }
    pub fn addr(self) -> Self {
        Expr::AddrOf(Box::new(self))
    }
    pub fn call(func: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(func.into(), args)
    }
    pub fn convert(ty: TypeRef, value: Expr) -> Self {
        Expr::Convert(ty, Box::new(value))
    }
    pub fn assert(self, ty: TypeRef) -> Self {
        Expr::Assert(Box::new(self), ty)
    }
    pub fn len(self) -> Self {
        Expr::Len(Box::new(self))
    }
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }
    pub fn eq(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Eq, self, rhs)
    }
    pub fn ne(self, rhs: Expr) -> Self {
        Self::binary(BinOp::Ne, self, rhs)
    }
    pub fn is_nil(self) -> Self {
        self.eq(Expr::Nil)
    }
    pub fn not_nil(self) -> Self {
        self.ne(Expr::Nil)
    }
    /// Folds `items` with `||`; `None` when empty.
    pub fn any_of(items: Vec<Expr>) -> Option<Self> {
        items.into_iter().reduce(|acc, e| Self::binary(BinOp::Or, acc, e))
    }
}

impl Stmt {
    pub fn assign(lhs: Expr, rhs: Expr, define: bool) -> Self {
        Stmt::Assign { lhs, rhs, define }
    }
    pub fn if_(cond: Expr, then: Block) -> Self {
        Stmt::If { init: None, cond, then, otherwise: Vec::new() }
    }
    pub fn if_init(init: Stmt, cond: Expr, then: Block) -> Self {
        Stmt::If { init: Some(Box::new(init)), cond, then, otherwise: Vec::new() }
    }
}

impl Param {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Param { name: Some(name.into()), ty }
    }
    pub fn unnamed(ty: TypeRef) -> Self {
        Param { name: None, ty }
    }
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.funcs.is_empty()
    }

    /// Type declarations first, then functions, separated by blank lines.
    pub fn render(&self, r: &dyn Render) -> String {
        let types = self.types.iter().map(|t| r.type_decl(t));
        let funcs = self.funcs.iter().map(|f| r.func(f));
        types.chain(funcs).collect::<Vec<_>>().join("\n")
    }
}
