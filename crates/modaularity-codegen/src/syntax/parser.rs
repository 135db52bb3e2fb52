//! Recursive-descent parser for declaration files and scripts.

use super::ast::*;
use super::lexer::{tokenize, Spanned, Token};
use super::SyntaxError;

const RESERVED: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "false",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
    "where", "while",
];

/// Keywords allowed as path segments.
const PATH_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// A `param name: Type = default;` declaration at the top level of a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    /// Byte range of the whole declaration in the source.
    pub start: usize,
    pub end: usize,
}

/// A parsed script: parameter declarations plus the remaining statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub params: Vec<ParamDecl>,
    pub body: Block,
}

pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Set while parsing `if`/`while` conditions and `for` iterators, where
    /// `Name {` opens the block rather than a struct literal.
    no_struct: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            no_struct: false,
        }
    }

    // ---- token helpers ----------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|t| &t.token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn bump(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line(), message)
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => self.error(format!("expected {}, found {}", expected, token)),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn check_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn check_ident(&self, ident: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(ident))
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.check_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, ident: &str) -> bool {
        if self.check_ident(ident) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), SyntaxError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", punct)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SyntaxError> {
        if self.eat_ident(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{}`", keyword)))
        }
    }

    /// A non-reserved identifier.
    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn path_segment(&mut self) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) if PATH_KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.expect_ident(),
        }
    }

    /// Skip a balanced token group opened by the current token.
    fn skip_group(&mut self) -> Result<(), SyntaxError> {
        let (open, close) = match self.peek() {
            Some(Token::Punct("(")) => ("(", ")"),
            Some(Token::Punct("[")) => ("[", "]"),
            Some(Token::Punct("{")) => ("{", "}"),
            _ => return Err(self.unexpected("a delimited group")),
        };
        let line = self.line();
        let mut depth = 0usize;
        while let Some(spanned) = self.bump() {
            if spanned.token.is_punct(open) {
                depth += 1;
            } else if spanned.token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(SyntaxError::new(line, format!("unclosed `{}`", open)))
    }

    // ---- items ------------------------------------------------------------

    pub fn parse_file(&mut self) -> Result<File, SyntaxError> {
        let items = self.parse_items(false)?;
        Ok(File { items })
    }

    fn parse_items(&mut self, in_braces: bool) -> Result<Vec<Item>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            if in_braces && self.eat_punct("}") {
                return Ok(items);
            }
            if self.at_end() {
                if in_braces {
                    return Err(self.unexpected("`}`"));
                }
                return Ok(items);
            }
            if let Some(item) = self.parse_item()? {
                items.push(item);
            }
        }
    }

    fn parse_attributes(&mut self) -> Result<Vec<Attribute>, SyntaxError> {
        let mut attributes = Vec::new();
        while self.eat_punct("#") {
            let inner = self.eat_punct("!");
            self.expect_punct("[")?;
            let mut path = vec![self.path_segment()?];
            while self.eat_punct("::") {
                path.push(self.path_segment()?);
            }
            if self.check_punct("(") || self.check_punct("[") || self.check_punct("{") {
                self.skip_group()?;
            } else if self.eat_punct("=") {
                match self.bump().map(|t| t.token) {
                    Some(Token::Str(_) | Token::Int { .. } | Token::Float { .. } | Token::Char(_)) => {}
                    Some(Token::Ident(ident)) if ident == "true" || ident == "false" => {}
                    _ => return Err(self.error("expected a literal attribute value")),
                }
            }
            self.expect_punct("]")?;
            if !inner {
                attributes.push(Attribute { path });
            }
        }
        Ok(attributes)
    }

    /// `pub` is public; restricted visibility (`pub(crate)`) is not.
    fn parse_visibility(&mut self) -> Result<bool, SyntaxError> {
        if !self.eat_ident("pub") {
            return Ok(false);
        }
        if self.check_punct("(") {
            self.skip_group()?;
            return Ok(false);
        }
        Ok(true)
    }

    fn parse_item(&mut self) -> Result<Option<Item>, SyntaxError> {
        if self.eat_punct(";") {
            return Ok(None);
        }
        let attributes = self.parse_attributes()?;
        if self.at_end() {
            return Ok(None);
        }
        let is_public = self.parse_visibility()?;

        let keyword = match self.peek() {
            Some(Token::Ident(keyword)) => keyword.clone(),
            _ => return Err(self.unexpected("an item")),
        };
        let item = match keyword.as_str() {
            "use" => {
                self.pos += 1;
                Item::Use(self.parse_use()?)
            }
            "mod" => {
                self.pos += 1;
                let name = self.expect_ident()?;
                if self.eat_punct(";") {
                    return Err(self.error(format!("module `{}` must be declared inline", name)));
                }
                self.expect_punct("{")?;
                let items = self.parse_items(true)?;
                Item::Mod { name, items }
            }
            "struct" => Item::Struct(self.parse_struct(attributes, is_public)?),
            "enum" => Item::Enum(self.parse_enum(attributes, is_public)?),
            "trait" => Item::Trait(self.parse_trait(attributes, is_public)?),
            "impl" => Item::Impl(self.parse_impl()?),
            "fn" | "async" => Item::Fn(self.parse_fn(attributes, is_public, true)?),
            _ => return Err(self.unexpected("an item")),
        };
        Ok(Some(item))
    }

    fn parse_use(&mut self) -> Result<Vec<String>, SyntaxError> {
        let line = self.line();
        let mut path = Vec::new();
        while let Some(spanned) = self.bump() {
            match spanned.token {
                Token::Punct(";") => return Ok(path),
                Token::Ident(segment) => path.push(segment),
                _ => {}
            }
        }
        Err(SyntaxError::new(line, "unterminated `use` declaration"))
    }

    fn reject_generics(&self, name: &str) -> Result<(), SyntaxError> {
        if self.check_punct("<") {
            return Err(self.error(format!("generic parameters on `{}` are not supported", name)));
        }
        Ok(())
    }

    fn parse_struct(&mut self, attributes: Vec<Attribute>, is_public: bool) -> Result<StructDecl, SyntaxError> {
        self.expect_keyword("struct")?;
        let name = self.expect_ident()?;
        self.reject_generics(&name)?;

        let kind = if self.eat_punct(";") {
            StructKind::Unit
        } else if self.eat_punct("(") {
            let mut types = Vec::new();
            while !self.eat_punct(")") {
                self.parse_attributes()?;
                self.parse_visibility()?;
                types.push(self.parse_type()?);
                if !self.eat_punct(",") {
                    self.expect_punct(")")?;
                    break;
                }
            }
            self.expect_punct(";")?;
            StructKind::Tuple(types)
        } else if self.eat_punct("{") {
            let mut fields = Vec::new();
            while !self.eat_punct("}") {
                self.parse_attributes()?;
                let is_public = self.parse_visibility()?;
                let name = self.expect_ident()?;
                self.expect_punct(":")?;
                let ty = self.parse_type()?;
                fields.push(Field { is_public, name, ty });
                if !self.eat_punct(",") {
                    self.expect_punct("}")?;
                    break;
                }
            }
            StructKind::Named(fields)
        } else {
            return Err(self.unexpected("`;`, `(` or `{`"));
        };

        Ok(StructDecl {
            attributes,
            is_public,
            name,
            kind,
        })
    }

    fn parse_enum(&mut self, attributes: Vec<Attribute>, is_public: bool) -> Result<EnumDecl, SyntaxError> {
        self.expect_keyword("enum")?;
        let name = self.expect_ident()?;
        self.reject_generics(&name)?;
        self.expect_punct("{")?;

        let mut variants = Vec::new();
        while !self.eat_punct("}") {
            self.parse_attributes()?;
            variants.push(self.expect_ident()?);
            if self.check_punct("(") || self.check_punct("{") {
                self.skip_group()?;
            } else if self.eat_punct("=") {
                self.parse_expr()?;
            }
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }

        Ok(EnumDecl {
            attributes,
            is_public,
            name,
            variants,
        })
    }

    fn parse_path(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut path = vec![self.path_segment()?];
        while self.eat_punct("::") {
            path.push(self.path_segment()?);
        }
        Ok(path)
    }

    fn parse_trait(&mut self, attributes: Vec<Attribute>, is_public: bool) -> Result<TraitDecl, SyntaxError> {
        self.expect_keyword("trait")?;
        let name = self.expect_ident()?;
        self.reject_generics(&name)?;

        let mut supertraits = Vec::new();
        if self.eat_punct(":") {
            loop {
                supertraits.push(self.parse_path()?);
                if !self.eat_punct("+") {
                    break;
                }
            }
        }

        self.expect_punct("{")?;
        let mut methods = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.unexpected("`}`"));
            }
            let attributes = self.parse_attributes()?;
            methods.push(self.parse_fn(attributes, true, false)?);
        }

        Ok(TraitDecl {
            attributes,
            is_public,
            name,
            supertraits,
            methods,
        })
    }

    fn parse_impl(&mut self) -> Result<ImplBlock, SyntaxError> {
        self.expect_keyword("impl")?;
        self.reject_generics("impl")?;
        let first = self.parse_path()?;
        let (trait_path, self_path) = if self.eat_ident("for") {
            (Some(first), self.parse_path()?)
        } else {
            (None, first)
        };

        self.expect_punct("{")?;
        let mut functions = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.unexpected("`}`"));
            }
            let attributes = self.parse_attributes()?;
            let is_public = self.parse_visibility()?;
            functions.push(self.parse_fn(attributes, is_public, true)?);
        }

        Ok(ImplBlock {
            trait_path,
            self_path,
            functions,
        })
    }

    fn parse_fn(&mut self, attributes: Vec<Attribute>, is_public: bool, require_body: bool) -> Result<FnDecl, SyntaxError> {
        let is_async = self.eat_ident("async");
        self.expect_keyword("fn")?;
        let name = self.expect_ident()?;
        self.reject_generics(&name)?;
        self.expect_punct("(")?;

        let receiver = self.parse_receiver()?;
        if receiver.is_some() && !self.check_punct(")") {
            self.expect_punct(",")?;
        }

        let mut params = Vec::new();
        while !self.eat_punct(")") {
            self.eat_ident("mut");
            let name = if self.eat_ident("_") {
                "_".to_string()
            } else {
                self.expect_ident()?
            };
            self.expect_punct(":")?;
            let ty = self.parse_type()?;
            params.push(Param { name, ty });
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }

        let ret = if self.eat_punct("->") {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check_punct("{") {
            Some(self.parse_block()?)
        } else if !require_body && self.eat_punct(";") {
            None
        } else {
            return Err(self.unexpected("a function body"));
        };

        Ok(FnDecl {
            attributes,
            is_public,
            is_async,
            name,
            receiver,
            params,
            ret,
            body,
        })
    }

    fn parse_receiver(&mut self) -> Result<Option<Receiver>, SyntaxError> {
        let at = |parser: &Self, n: usize, ident: &str| parser.peek_at(n).is_some_and(|t| t.is_ident(ident));

        if at(self, 0, "self") {
            self.pos += 1;
            return Ok(Some(Receiver::Value));
        }
        if at(self, 0, "mut") && at(self, 1, "self") {
            self.pos += 2;
            return Ok(Some(Receiver::Value));
        }
        if self.check_punct("&") {
            let mut n = 1;
            if matches!(self.peek_at(n), Some(Token::Lifetime(_))) {
                n += 1;
            }
            let mutable = at(self, n, "mut");
            if mutable {
                n += 1;
            }
            if at(self, n, "self") {
                self.pos += n + 1;
                return Ok(Some(if mutable { Receiver::RefMut } else { Receiver::Ref }));
            }
        }
        Ok(None)
    }

    // ---- types ------------------------------------------------------------

    pub fn parse_type(&mut self) -> Result<TypeExpr, SyntaxError> {
        if self.eat_punct("&") {
            let lifetime = match self.peek() {
                Some(Token::Lifetime(name)) => {
                    let name = name.clone();
                    self.pos += 1;
                    Some(name)
                }
                _ => None,
            };
            let mutable = self.eat_ident("mut");
            let inner = self.parse_type()?;
            return Ok(TypeExpr::Ref {
                mutable,
                lifetime,
                inner: Box::new(inner),
            });
        }

        if self.eat_punct("(") {
            let mut items = Vec::new();
            let mut trailing_comma = false;
            while !self.eat_punct(")") {
                items.push(self.parse_type()?);
                trailing_comma = self.eat_punct(",");
                if !trailing_comma {
                    self.expect_punct(")")?;
                    break;
                }
            }
            if items.len() == 1 && !trailing_comma {
                return Ok(items.remove(0));
            }
            return Ok(TypeExpr::Tuple(items));
        }

        if self.eat_punct("[") {
            let inner = self.parse_type()?;
            if self.eat_punct(";") {
                let len = match self.bump().map(|t| t.token) {
                    Some(Token::Int { value, .. }) => value,
                    _ => return Err(self.error("expected an array length")),
                };
                self.expect_punct("]")?;
                return Ok(TypeExpr::Array(Box::new(inner), len));
            }
            self.expect_punct("]")?;
            return Ok(TypeExpr::Slice(Box::new(inner)));
        }

        let segments = self.parse_path()?;
        let args = self.parse_generic_args()?;
        Ok(TypeExpr::Path { segments, args })
    }

    fn parse_generic_args(&mut self) -> Result<Vec<TypeExpr>, SyntaxError> {
        let mut args = Vec::new();
        if !self.eat_punct("<") {
            return Ok(args);
        }
        while !self.eat_punct(">") {
            args.push(self.parse_type()?);
            if !self.eat_punct(",") {
                self.expect_punct(">")?;
                break;
            }
        }
        Ok(args)
    }

    // ---- statements -------------------------------------------------------

    pub fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        self.expect_punct("{")?;
        let mut stmts = Vec::new();
        while !self.eat_punct("}") {
            if self.at_end() {
                return Err(self.unexpected("`}`"));
            }
            if let Some(stmt) = self.parse_stmt()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Option<Stmt>, SyntaxError> {
        if self.eat_punct(";") {
            return Ok(None);
        }

        let keyword = match self.peek() {
            Some(Token::Ident(keyword)) => keyword.clone(),
            _ => String::new(),
        };
        let stmt = match keyword.as_str() {
            "let" => {
                self.pos += 1;
                let mutable = self.eat_ident("mut");
                let name = if self.eat_ident("_") {
                    "_".to_string()
                } else {
                    self.expect_ident()?
                };
                let ty = if self.eat_punct(":") {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let init = if self.eat_punct("=") {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect_punct(";")?;
                Stmt::Let {
                    name,
                    mutable,
                    ty,
                    init,
                }
            }
            "return" => {
                self.pos += 1;
                let value = if self.at_end() || self.check_punct(";") || self.check_punct("}") {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.eat_punct(";");
                Stmt::Return(value)
            }
            "if" => self.parse_if()?,
            "while" => {
                self.pos += 1;
                let cond = self.struct_literals(false, Self::parse_expr)?;
                let body = self.parse_block()?;
                Stmt::While { cond, body }
            }
            "for" => {
                self.pos += 1;
                self.eat_ident("mut");
                let binding = if self.eat_ident("_") {
                    "_".to_string()
                } else {
                    self.expect_ident()?
                };
                self.expect_keyword("in")?;
                let iter = self.struct_literals(false, Self::parse_expr)?;
                let body = self.parse_block()?;
                Stmt::For { binding, iter, body }
            }
            "loop" => {
                self.pos += 1;
                Stmt::Loop(self.parse_block()?)
            }
            "break" => {
                self.pos += 1;
                self.eat_punct(";");
                Stmt::Break
            }
            "continue" => {
                self.pos += 1;
                self.eat_punct(";");
                Stmt::Continue
            }
            _ if self.check_punct("{") => Stmt::Block(self.parse_block()?),
            _ => self.parse_expr_stmt()?,
        };
        Ok(Some(stmt))
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        self.expect_keyword("if")?;
        let cond = self.struct_literals(false, Self::parse_expr)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat_ident("else") {
            if self.check_ident("if") {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let expr = self.parse_expr()?;
        if !self.eat_punct(";") && !self.check_punct("}") && !self.at_end() {
            return Err(self.unexpected("`;`"));
        }
        Ok(Stmt::Expr(expr))
    }

    // ---- expressions ------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        let target = self.parse_range()?;

        if self.eat_punct("=") {
            let value = self.parse_expr()?;
            return Ok(Expr::Assign {
                op: None,
                target: Box::new(target),
                value: Box::new(value),
            });
        }

        let compound = [
            ("+=", BinaryOp::Add),
            ("-=", BinaryOp::Sub),
            ("*=", BinaryOp::Mul),
            ("/=", BinaryOp::Div),
            ("%=", BinaryOp::Rem),
        ];
        for (punct, op) in compound {
            if self.eat_punct(punct) {
                let value = self.parse_expr()?;
                return Ok(Expr::Assign {
                    op: Some(op),
                    target: Box::new(target),
                    value: Box::new(value),
                });
            }
        }

        Ok(target)
    }

    fn range_end_follows(&self) -> bool {
        !(self.at_end()
            || self.check_punct("{")
            || self.check_punct(")")
            || self.check_punct("]")
            || self.check_punct(";")
            || self.check_punct(","))
    }

    fn parse_range(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_punct("..") {
            let end = if self.range_end_follows() {
                Some(Box::new(self.parse_binary(0)?))
            } else {
                None
            };
            return Ok(Expr::Range { start: None, end });
        }

        let start = self.parse_binary(0)?;
        if !self.eat_punct("..") {
            return Ok(start);
        }
        let end = if self.range_end_follows() {
            Some(Box::new(self.parse_binary(0)?))
        } else {
            None
        };
        Ok(Expr::Range {
            start: Some(Box::new(start)),
            end,
        })
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.peek()? {
            Token::Punct("||") => (BinaryOp::Or, 1),
            Token::Punct("&&") => (BinaryOp::And, 2),
            Token::Punct("==") => (BinaryOp::Eq, 3),
            Token::Punct("!=") => (BinaryOp::Ne, 3),
            Token::Punct("<") => (BinaryOp::Lt, 3),
            Token::Punct("<=") => (BinaryOp::Le, 3),
            Token::Punct(">") => (BinaryOp::Gt, 3),
            Token::Punct(">=") => (BinaryOp::Ge, 3),
            Token::Punct("|") => (BinaryOp::BitOr, 4),
            Token::Punct("^") => (BinaryOp::BitXor, 5),
            Token::Punct("&") => (BinaryOp::BitAnd, 6),
            Token::Punct("+") => (BinaryOp::Add, 7),
            Token::Punct("-") => (BinaryOp::Sub, 7),
            Token::Punct("*") => (BinaryOp::Mul, 8),
            Token::Punct("/") => (BinaryOp::Div, 8),
            Token::Punct("%") => (BinaryOp::Rem, 8),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_cast()?;
        while let Some((op, precedence)) = self.binary_op() {
            if precedence <= min_precedence {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_binary(precedence)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_cast(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_unary()?;
        while self.eat_ident("as") {
            let ty = self.parse_type()?;
            expr = Expr::Cast {
                expr: Box::new(expr),
                ty,
            };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = if self.eat_punct("-") {
            UnaryOp::Neg
        } else if self.eat_punct("!") {
            UnaryOp::Not
        } else if self.eat_punct("*") {
            UnaryOp::Deref
        } else if self.eat_punct("&") {
            if self.eat_ident("mut") {
                UnaryOp::RefMut
            } else {
                UnaryOp::Ref
            }
        } else {
            return self.parse_postfix();
        };

        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
        })
    }

    fn parse_args(&mut self, close: &str) -> Result<Vec<Expr>, SyntaxError> {
        self.struct_literals(true, |parser| {
            let mut args = Vec::new();
            while !parser.eat_punct(close) {
                args.push(parser.parse_expr()?);
                if !parser.eat_punct(",") {
                    parser.expect_punct(close)?;
                    break;
                }
            }
            Ok(args)
        })
    }

    /// Run `parse` with struct literals allowed or not.
    fn struct_literals<T>(
        &mut self,
        allowed: bool,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        let saved = self.no_struct;
        self.no_struct = !allowed;
        let result = parse(self);
        self.no_struct = saved;
        result
    }

    fn parse_struct_literal(&mut self, path: Vec<String>) -> Result<Expr, SyntaxError> {
        self.expect_punct("{")?;
        let fields = self.struct_literals(true, |parser| {
            let mut fields = Vec::new();
            while !parser.eat_punct("}") {
                let name = parser.expect_ident()?;
                let value = if parser.eat_punct(":") {
                    parser.parse_expr()?
                } else {
                    Expr::Path(vec![name.clone()])
                };
                fields.push((name, value));
                if !parser.eat_punct(",") {
                    parser.expect_punct("}")?;
                    break;
                }
            }
            Ok(fields)
        })?;
        Ok(Expr::Struct { path, fields })
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                match self.bump().map(|t| t.token) {
                    Some(Token::Ident(name)) if name == "await" => {
                        expr = Expr::Await(Box::new(expr));
                    }
                    Some(Token::Ident(name)) => {
                        if self.eat_punct("::") {
                            // Turbofish arguments do not affect the signature.
                            self.parse_generic_args()?;
                        }
                        if self.eat_punct("(") {
                            let args = self.parse_args(")")?;
                            expr = Expr::MethodCall {
                                receiver: Box::new(expr),
                                method: name,
                                args,
                            };
                        } else {
                            expr = Expr::Field {
                                base: Box::new(expr),
                                name,
                            };
                        }
                    }
                    Some(Token::Int { value, .. }) => {
                        expr = Expr::Field {
                            base: Box::new(expr),
                            name: value.to_string(),
                        };
                    }
                    _ => return Err(self.error("expected a field or method name after `.`")),
                }
            } else if self.eat_punct("(") {
                let args = self.parse_args(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_punct("?") {
                expr = Expr::Try(Box::new(expr));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let Some(spanned) = self.tokens.get(self.pos).cloned() else {
            return Err(self.unexpected("an expression"));
        };

        match spanned.token {
            Token::Int { value, suffix } => {
                self.pos += 1;
                Ok(Expr::Lit(Literal::Int { value, suffix }))
            }
            Token::Float { value, suffix } => {
                self.pos += 1;
                Ok(Expr::Lit(Literal::Float { value, suffix }))
            }
            Token::Str(value) => {
                self.pos += 1;
                Ok(Expr::Lit(Literal::Str(value)))
            }
            Token::Char(value) => {
                self.pos += 1;
                Ok(Expr::Lit(Literal::Char(value)))
            }
            Token::Ident(ref ident) if ident == "true" || ident == "false" => {
                self.pos += 1;
                Ok(Expr::Lit(Literal::Bool(ident == "true")))
            }
            Token::Ident(_) => self.parse_path_expr(),
            Token::Punct("(") => {
                self.pos += 1;
                if self.eat_punct(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.eat_punct(")") {
                    return Ok(Expr::Paren(Box::new(first)));
                }
                self.expect_punct(",")?;
                let mut items = vec![first];
                items.extend(self.parse_args(")")?);
                Ok(Expr::Tuple(items))
            }
            Token::Punct("[") => {
                self.pos += 1;
                Ok(Expr::Array(self.parse_args("]")?))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_path_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut path = vec![self.path_segment()?];
        while self.eat_punct("::") {
            if self.check_punct("<") {
                self.parse_generic_args()?;
                continue;
            }
            path.push(self.path_segment()?);
        }

        if path.len() == 1 && self.check_punct("!") && !self.peek_at(1).is_some_and(|t| t.is_punct("=")) {
            self.pos += 1;
            let close = match self.bump().map(|t| t.token) {
                Some(Token::Punct("(")) => ")",
                Some(Token::Punct("[")) => "]",
                Some(Token::Punct("{")) => "}",
                _ => return Err(self.error(format!("expected macro arguments after `{}!`", path[0]))),
            };
            let args = self.parse_args(close)?;
            return Ok(Expr::Macro {
                name: path.remove(0),
                args,
            });
        }

        if !self.no_struct && self.check_punct("{") {
            return self.parse_struct_literal(path);
        }

        Ok(Expr::Path(path))
    }
}

/// Parse a declaration file.
pub fn parse_file(source: &str) -> Result<File, SyntaxError> {
    Parser::new(tokenize(source)?).parse_file()
}

/// Parse a script, separating top-level `param` declarations from the body.
pub fn parse_script(source: &str) -> Result<Script, SyntaxError> {
    let mut parser = Parser::new(tokenize(source)?);
    let mut params = Vec::new();
    let mut body = Vec::new();

    while !parser.at_end() {
        if parser.at_param_decl() {
            params.push(parser.parse_param_decl()?);
            continue;
        }
        if parser.check_punct("}") {
            return Err(parser.unexpected("a statement"));
        }
        if let Some(stmt) = parser.parse_stmt()? {
            body.push(stmt);
        }
    }

    Ok(Script { params, body })
}

impl Parser {
    fn at_param_decl(&self) -> bool {
        self.check_ident("param")
            && matches!(self.peek_at(1), Some(Token::Ident(name)) if !RESERVED.contains(&name.as_str()))
            && self.peek_at(2).is_some_and(|t| t.is_punct(":"))
    }

    fn parse_param_decl(&mut self) -> Result<ParamDecl, SyntaxError> {
        let start = self.tokens[self.pos].start;
        self.expect_keyword("param")?;
        let name = self.expect_ident()?;
        self.expect_punct(":")?;
        let ty = self.parse_type()?;
        let default = if self.eat_punct("=") {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let end = self
            .tokens
            .get(self.pos)
            .filter(|t| t.token.is_punct(";"))
            .map(|t| t.end)
            .ok_or_else(|| self.unexpected("`;`"))?;
        self.pos += 1;

        Ok(ParamDecl {
            name,
            ty,
            default,
            start,
            end,
        })
    }
}
