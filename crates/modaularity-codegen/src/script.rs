//! Script analysis and the method wrapper synthesized around a script.
//!
//! A script's top-level `param name: Type = default;` declarations become
//! the wrapper method's parameters, in declaration order, and are removed
//! from the body. The return type is inferred from the first `return`
//! expression; a script without one produces a method returning nothing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use modaularity_core::{Binary, ModuleError, ParameterSignature, Result};

use crate::syntax::ast::{BinaryOp, Block, Expr, Literal, Stmt, TypeExpr, UnaryOp};
use crate::syntax::parse_script;
use crate::wrapper::{SourceWriter, WrapperNames};

const PRIMITIVES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32",
    "f64", "bool", "char", "String",
];

/// Generic containers and their arity.
const CONTAINERS: &[(&str, usize)] = &[("Vec", 1), ("Option", 1), ("Box", 1), ("HashSet", 1), ("HashMap", 2)];

/// Types a script may take as parameters or return.
#[derive(Debug, Clone)]
pub struct KnownTypes {
    names: HashSet<String>,
}

impl KnownTypes {
    pub fn builtin() -> Self {
        Self {
            names: PRIMITIVES.iter().map(|name| name.to_string()).collect(),
        }
    }

    /// Built-in types plus every public type of `references`, by full and
    /// short name.
    pub fn with_references(references: &[Arc<Binary>]) -> Self {
        let mut known = Self::builtin();
        for binary in references {
            for descriptor in binary.types().iter().filter(|t| t.is_public) {
                known.names.insert(descriptor.full_name());
                known.names.insert(descriptor.name.clone());
            }
        }
        known
    }

    pub fn contains(&self, ty: &TypeExpr) -> bool {
        match ty {
            TypeExpr::Path { segments, args } => {
                let name = match segments.first().map(String::as_str) {
                    Some("std") => segments.last().cloned().unwrap_or_default(),
                    _ => segments.join("::"),
                };
                if let Some((_, arity)) = CONTAINERS.iter().find(|(container, _)| *container == name) {
                    return args.len() == *arity && args.iter().all(|arg| self.contains(arg));
                }
                args.is_empty() && self.names.contains(&name)
            }
            TypeExpr::Ref { inner, .. } => match inner.as_ref() {
                TypeExpr::Path { segments, args } if args.is_empty() && segments.len() == 1 && segments[0] == "str" => true,
                TypeExpr::Slice(element) => self.contains(element),
                other => self.contains(other),
            },
            TypeExpr::Array(element, _) => self.contains(element),
            TypeExpr::Tuple(_) | TypeExpr::Slice(_) => false,
        }
    }
}

impl Default for KnownTypes {
    fn default() -> Self {
        Self::builtin()
    }
}

/// What the wrapper method needs to know about a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptAnalysis {
    pub parameters: Vec<ParameterSignature>,
    /// `None` when the script returns nothing.
    pub return_type: Option<String>,
    /// The script without its parameter declarations.
    pub body: String,
}

/// Analyze a script.
///
/// Parse failures and unsupported parameter or return types are
/// `InvalidSource` errors carrying the script.
pub fn analyze(source: &str, known: &KnownTypes) -> Result<ScriptAnalysis> {
    let script = parse_script(source).map_err(|e| ModuleError::invalid_source(format!("syntax error: {}", e), source))?;

    let mut inference = Inference::default();
    let mut parameters = Vec::with_capacity(script.params.len());
    for param in &script.params {
        if inference.bindings.contains_key(&param.name) {
            return Err(ModuleError::invalid_source(
                format!("parameter `{}` is declared more than once", param.name),
                source,
            ));
        }
        if !known.contains(&param.ty) {
            return Err(ModuleError::invalid_source(
                format!("`{}` is not a supported type for parameter `{}`", param.ty, param.name),
                source,
            ));
        }
        inference.bindings.insert(param.name.clone(), Some(param.ty.clone()));
        parameters.push(ParameterSignature::new(param.name.clone(), param.ty.to_string()));
    }

    let return_type = match inference.find_return(&script.body) {
        Some(Some(expr)) => {
            let ty = inference
                .infer(expr)
                .map_err(|reason| ModuleError::invalid_source(format!("cannot infer the return type: {}", reason), source))?;
            if ty.is_unit() {
                None
            } else if known.contains(&ty) {
                Some(ty.to_string())
            } else {
                return Err(ModuleError::invalid_source(
                    format!("`{}` is not a supported script result type", ty),
                    source,
                ));
            }
        }
        Some(None) | None => None,
    };

    let mut body = String::with_capacity(source.len());
    let mut cursor = 0;
    for param in &script.params {
        body.push_str(&source[cursor..param.start]);
        cursor = param.end;
    }
    body.push_str(&source[cursor..]);

    Ok(ScriptAnalysis {
        parameters,
        return_type,
        body: body.trim().to_string(),
    })
}

/// Source of the wrapper type holding the script as one method.
pub fn wrap(analysis: &ScriptAnalysis, names: &WrapperNames, returns_future: bool, imports: &[String]) -> String {
    let type_name = names.resolved_type_name();
    let parameters: Vec<String> = analysis
        .parameters
        .iter()
        .map(|p| format!("{}: {}", p.name, p.type_name))
        .collect();

    let mut signature = format!(
        "pub {}fn {}({})",
        if returns_future { "async " } else { "" },
        names.resolved_method(),
        parameters.join(", ")
    );
    if let Some(return_type) = &analysis.return_type {
        signature.push_str(&format!(" -> {}", return_type));
    }

    let mut writer = SourceWriter::new();
    writer.imports(imports);
    let opened = writer.open_namespace(&names.resolved_namespace());
    writer.line(format!("pub struct {};", type_name)).blank();
    writer
        .open(format!("impl {}", type_name))
        .open(signature)
        .line(&analysis.body)
        .close()
        .close();
    for _ in 0..opened {
        writer.close();
    }
    writer.finish()
}

/// Best-effort static typing of script expressions.
#[derive(Default)]
struct Inference {
    /// `None` for bindings whose type could not be inferred.
    bindings: HashMap<String, Option<TypeExpr>>,
}

impl Inference {
    /// The first `return` in document order, recording bindings on the way.
    fn find_return<'b>(&mut self, block: &'b Block) -> Option<Option<&'b Expr>> {
        for stmt in block {
            match stmt {
                Stmt::Let { name, ty, init, .. } => {
                    let inferred = ty.clone().or_else(|| init.as_ref().and_then(|e| self.infer(e).ok()));
                    self.bindings.insert(name.clone(), inferred);
                }
                Stmt::Return(value) => return Some(value.as_ref()),
                Stmt::If {
                    then_block,
                    else_block,
                    ..
                } => {
                    if let Some(found) = self.find_return(then_block) {
                        return Some(found);
                    }
                    if let Some(found) = else_block.as_ref().and_then(|block| self.find_return(block)) {
                        return Some(found);
                    }
                }
                Stmt::For { binding, iter, body } => {
                    let element = match iter {
                        Expr::Range { start: Some(start), .. } => self.infer(start).ok(),
                        _ => None,
                    };
                    self.bindings.insert(binding.clone(), element);
                    if let Some(found) = self.find_return(body) {
                        return Some(found);
                    }
                }
                Stmt::While { body, .. } | Stmt::Loop(body) | Stmt::Block(body) => {
                    if let Some(found) = self.find_return(body) {
                        return Some(found);
                    }
                }
                Stmt::Expr(_) | Stmt::Break | Stmt::Continue => {}
            }
        }
        None
    }

    fn infer(&self, expr: &Expr) -> std::result::Result<TypeExpr, String> {
        match expr {
            Expr::Lit(literal) => Ok(match literal {
                Literal::Int { suffix, .. } => TypeExpr::named(suffix.as_deref().unwrap_or("i32")),
                Literal::Float { suffix, .. } => TypeExpr::named(suffix.as_deref().unwrap_or("f64")),
                Literal::Str(_) => TypeExpr::reference(TypeExpr::named("str")),
                Literal::Char(_) => TypeExpr::named("char"),
                Literal::Bool(_) => TypeExpr::named("bool"),
            }),
            Expr::Path(path) if path.len() == 1 => match self.bindings.get(&path[0]) {
                Some(Some(ty)) => Ok(ty.clone()),
                Some(None) => Err(format!("the type of `{}` is unknown", path[0])),
                None => Err(format!("cannot find value `{}`", path[0])),
            },
            Expr::Path(path) => Err(format!("unsupported path `{}`", path.join("::"))),
            Expr::Paren(inner) => self.infer(inner),
            Expr::Unary { op, expr } => {
                let ty = self.infer(expr)?;
                match op {
                    UnaryOp::Neg | UnaryOp::Not => Ok(ty),
                    UnaryOp::Ref => Ok(TypeExpr::reference(ty)),
                    UnaryOp::RefMut => Ok(TypeExpr::Ref {
                        mutable: true,
                        lifetime: None,
                        inner: Box::new(ty),
                    }),
                    UnaryOp::Deref => match ty {
                        TypeExpr::Ref { inner, .. } => Ok(*inner),
                        other => Err(format!("`{}` cannot be dereferenced", other)),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                if op.is_comparison() || op.is_logical() {
                    return Ok(TypeExpr::named("bool"));
                }
                let left = self.infer(lhs)?;
                if *op == BinaryOp::Add && left.dereferenced().last_segment() == Some("String") {
                    return Ok(TypeExpr::named("String"));
                }
                if is_untyped_number(lhs) {
                    return self.infer(rhs);
                }
                Ok(left)
            }
            Expr::Assign { .. } => Ok(TypeExpr::Tuple(Vec::new())),
            Expr::Call { callee, .. } => match callee.as_ref() {
                Expr::Path(path) if path.len() == 2 && path[0] == "String" => match path[1].as_str() {
                    "from" | "new" | "with_capacity" => Ok(TypeExpr::named("String")),
                    other => Err(format!("cannot infer the result of `String::{}`", other)),
                },
                Expr::Path(path) => Err(format!("cannot infer the result of `{}`", path.join("::"))),
                _ => Err("cannot infer the result of a computed call".to_string()),
            },
            Expr::MethodCall { receiver, method, .. } => self.infer_method(receiver, method),
            Expr::Index { base, .. } => match self.infer(base)?.dereferenced() {
                TypeExpr::Path { segments, args } if segments.last().map(String::as_str) == Some("Vec") && args.len() == 1 => {
                    Ok(args[0].clone())
                }
                TypeExpr::Array(element, _) | TypeExpr::Slice(element) => Ok(element.as_ref().clone()),
                other => Err(format!("`{}` cannot be indexed", other)),
            },
            Expr::Cast { ty, .. } => Ok(ty.clone()),
            Expr::Macro { name, args } => match name.as_str() {
                "format" => Ok(TypeExpr::named("String")),
                "vec" => match args.first() {
                    Some(first) => Ok(TypeExpr::generic("Vec", vec![self.infer(first)?])),
                    None => Err("cannot infer the element type of an empty `vec![]`".to_string()),
                },
                "println" | "print" | "eprintln" | "eprint" | "assert" | "assert_eq" | "assert_ne" => {
                    Ok(TypeExpr::Tuple(Vec::new()))
                }
                other => Err(format!("cannot infer the result of `{}!`", other)),
            },
            Expr::Tuple(items) => Ok(TypeExpr::Tuple(
                items.iter().map(|item| self.infer(item)).collect::<std::result::Result<_, _>>()?,
            )),
            Expr::Array(items) => match items.first() {
                Some(first) => Ok(TypeExpr::Array(Box::new(self.infer(first)?), items.len() as u128)),
                None => Err("cannot infer the element type of an empty array".to_string()),
            },
            Expr::Struct { path, .. } => Ok(TypeExpr::Path {
                segments: path.clone(),
                args: Vec::new(),
            }),
            Expr::Field { name, .. } => Err(format!("cannot infer the type of field `{}`", name)),
            Expr::Range { .. } => Err("ranges are not supported results".to_string()),
            Expr::Try(_) => Err("`?` is not supported in scripts".to_string()),
            Expr::Await(_) => Err("`.await` results cannot be inferred".to_string()),
        }
    }

    fn infer_method(&self, receiver: &Expr, method: &str) -> std::result::Result<TypeExpr, String> {
        let receiver_ty = self.infer(receiver)?;
        let base = receiver_ty.dereferenced().clone();
        let is_str = base.last_segment() == Some("str");

        let ty = match method {
            "to_string" | "to_uppercase" | "to_lowercase" | "repeat" | "replace" | "join" => TypeExpr::named("String"),
            "to_owned" if is_str => TypeExpr::named("String"),
            "to_owned" | "clone" => base,
            "trim" | "trim_start" | "trim_end" | "as_str" => TypeExpr::reference(TypeExpr::named("str")),
            "len" | "count" | "capacity" => TypeExpr::named("usize"),
            "is_empty" | "contains" | "starts_with" | "ends_with" | "is_some" | "is_none" | "is_ok"
            | "is_err" | "eq" | "ne" => TypeExpr::named("bool"),
            "abs" | "pow" | "min" | "max" | "sqrt" | "floor" | "ceil" | "round" | "signum"
            | "wrapping_add" | "wrapping_sub" | "wrapping_mul" | "saturating_add" | "saturating_sub"
            | "saturating_mul" => base,
            "unwrap" | "expect" | "unwrap_or" | "unwrap_or_default" => match &base {
                TypeExpr::Path { segments, args }
                    if matches!(segments.last().map(String::as_str), Some("Option" | "Result")) && !args.is_empty() =>
                {
                    args[0].clone()
                }
                other => return Err(format!("`.{}()` is not available on `{}`", method, other)),
            },
            other => return Err(format!("cannot infer the result of `.{}()`", other)),
        };
        Ok(ty)
    }
}

fn is_untyped_number(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Lit(Literal::Int { suffix: None, .. }) | Expr::Lit(Literal::Float { suffix: None, .. })
    )
}
