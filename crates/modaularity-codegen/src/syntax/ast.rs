//! Syntax tree of the declaration language.

use std::fmt;

/// A parsed declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Use(Vec<String>),
    Mod { name: String, items: Vec<Item> },
    Struct(StructDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Impl(ImplBlock),
    Fn(FnDecl),
}

/// `#[path]`, `#[path(...)]` or `#[path = "lit"]`; only the path is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub path: Vec<String>,
}

impl Attribute {
    pub fn full_name(&self) -> String {
        self.path.join("::")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructKind {
    Unit,
    Tuple(Vec<TypeExpr>),
    Named(Vec<Field>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub is_public: bool,
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub attributes: Vec<Attribute>,
    pub is_public: bool,
    pub name: String,
    pub kind: StructKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub attributes: Vec<Attribute>,
    pub is_public: bool,
    pub name: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub attributes: Vec<Attribute>,
    pub is_public: bool,
    pub name: String,
    pub supertraits: Vec<Vec<String>>,
    pub methods: Vec<FnDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplBlock {
    pub trait_path: Option<Vec<String>>,
    pub self_path: Vec<String>,
    pub functions: Vec<FnDecl>,
}

/// How a method takes `self`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    Value,
    Ref,
    RefMut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub attributes: Vec<Attribute>,
    pub is_public: bool,
    pub is_async: bool,
    pub name: String,
    pub receiver: Option<Receiver>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    /// `None` for signatures without a body (trait methods).
    pub body: Option<Block>,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Path { segments: Vec<String>, args: Vec<TypeExpr> },
    Ref { mutable: bool, lifetime: Option<String>, inner: Box<TypeExpr> },
    /// `()` is the empty tuple.
    Tuple(Vec<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(Box<TypeExpr>, u128),
}

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Path {
            segments: vec![name.to_string()],
            args: Vec::new(),
        }
    }

    pub fn generic(name: &str, args: Vec<TypeExpr>) -> Self {
        TypeExpr::Path {
            segments: vec![name.to_string()],
            args,
        }
    }

    pub fn reference(inner: TypeExpr) -> Self {
        TypeExpr::Ref {
            mutable: false,
            lifetime: None,
            inner: Box::new(inner),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, TypeExpr::Tuple(items) if items.is_empty())
    }

    /// Last path segment, if this is a path type.
    pub fn last_segment(&self) -> Option<&str> {
        match self {
            TypeExpr::Path { segments, .. } => segments.last().map(String::as_str),
            _ => None,
        }
    }

    /// The type behind any number of references.
    pub fn dereferenced(&self) -> &TypeExpr {
        match self {
            TypeExpr::Ref { inner, .. } => inner.dereferenced(),
            other => other,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Path { segments, args } => {
                write!(f, "{}", segments.join("::"))?;
                if !args.is_empty() {
                    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", args.join(", "))?;
                }
                Ok(())
            }
            TypeExpr::Ref {
                mutable,
                lifetime,
                inner,
            } => {
                write!(f, "&")?;
                if let Some(lifetime) = lifetime {
                    write!(f, "'{} ", lifetime)?;
                }
                if *mutable {
                    write!(f, "mut ")?;
                }
                write!(f, "{}", inner)
            }
            TypeExpr::Tuple(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                if items.len() == 1 {
                    write!(f, "({},)", items[0])
                } else {
                    write!(f, "({})", items.join(", "))
                }
            }
            TypeExpr::Slice(inner) => write!(f, "[{}]", inner),
            TypeExpr::Array(inner, len) => write!(f, "[{}; {}]", inner, len),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeExpr>,
        init: Option<Expr>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While { cond: Expr, body: Block },
    For { binding: String, iter: Expr, body: Block },
    Loop(Block),
    Block(Block),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int { value: u128, suffix: Option<String> },
    Float { value: f64, suffix: Option<String> },
    Str(String),
    Char(char),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Deref,
    Ref,
    RefMut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Path(Vec<String>),
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `target = value`, or a compound assignment when `op` is set.
    Assign { op: Option<BinaryOp>, target: Box<Expr>, value: Box<Expr> },
    Range { start: Option<Box<Expr>>, end: Option<Box<Expr>> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    MethodCall { receiver: Box<Expr>, method: String, args: Vec<Expr> },
    Field { base: Box<Expr>, name: String },
    Index { base: Box<Expr>, index: Box<Expr> },
    Cast { expr: Box<Expr>, ty: TypeExpr },
    Macro { name: String, args: Vec<Expr> },
    /// `Path { field: value, shorthand }`
    Struct { path: Vec<String>, fields: Vec<(String, Expr)> },
    Tuple(Vec<Expr>),
    Array(Vec<Expr>),
    Paren(Box<Expr>),
    Try(Box<Expr>),
    Await(Box<Expr>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        let ty = TypeExpr::generic(
            "HashMap",
            vec![TypeExpr::named("String"), TypeExpr::generic("Vec", vec![TypeExpr::named("i32")])],
        );
        assert_eq!(ty.to_string(), "HashMap<String, Vec<i32>>");
        assert_eq!(TypeExpr::reference(TypeExpr::named("str")).to_string(), "&str");
        assert_eq!(
            TypeExpr::Tuple(vec![TypeExpr::named("i32"), TypeExpr::named("String")]).to_string(),
            "(i32, String)"
        );
        assert_eq!(TypeExpr::Tuple(Vec::new()).to_string(), "()");
    }
}
