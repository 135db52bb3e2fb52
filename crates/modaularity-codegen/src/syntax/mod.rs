//! The declaration language: lexer, syntax tree and parser.
//!
//! Source is either a *declaration file* (`struct`, `enum`, `trait`, `impl`
//! and `mod` items) or a *script* (plain statements plus `param`
//! declarations), see [`classify`].

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Block, Expr, File, Item, Literal, Stmt, TypeExpr};
pub use lexer::{tokenize, Token};
pub use parser::{parse_file, parse_script, ParamDecl, Script};

/// A lexing or parsing failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// How a piece of source text is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Statements wrapped into a synthesized method.
    Script,
    /// One or more type declarations, compiled as written.
    Declarations,
}

/// Classify source by parsing it.
///
/// Source that parses as items and declares a `struct`, `enum` or `trait`
/// (at any `mod` depth) is a declaration file. Anything else is a script,
/// and a script that does not parse either reports the script error.
pub fn classify(source: &str) -> Result<SourceKind, SyntaxError> {
    match parse_file(source) {
        Ok(file) if declares_type(&file.items) => Ok(SourceKind::Declarations),
        Ok(_) => Ok(SourceKind::Script),
        Err(file_error) => match parse_script(source) {
            Ok(_) => Ok(SourceKind::Script),
            Err(script_error) => {
                tracing::debug!(error = %file_error, "Source is not a declaration file");
                Err(script_error)
            }
        },
    }
}

fn declares_type(items: &[Item]) -> bool {
    items.iter().any(|item| match item {
        Item::Struct(_) | Item::Enum(_) | Item::Trait(_) => true,
        Item::Mod { items, .. } => declares_type(items),
        Item::Use(_) | Item::Impl(_) | Item::Fn(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("let x = 5; return x;").unwrap(), SourceKind::Script);
        assert_eq!(classify("// struct in a comment\nprintln!(\"trait\");").unwrap(), SourceKind::Script);
        assert_eq!(classify("pub struct Plugin;").unwrap(), SourceKind::Declarations);
        assert_eq!(
            classify("mod inner { pub trait Greeter { fn greet(&self); } }").unwrap(),
            SourceKind::Declarations
        );
        assert_eq!(classify("use std::fmt;").unwrap(), SourceKind::Script);
        assert!(classify("\"unterminated").is_err());
        assert!(classify("pub struct Broken {").is_err());
    }
}
