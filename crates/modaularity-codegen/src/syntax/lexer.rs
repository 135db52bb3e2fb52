//! Tokenizer for the declaration language.

use super::SyntaxError;

/// Multi-character punctuation, longest first.
const PUNCTUATION: &[&str] = &[
    "::", "->", "=>", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=", "..", "+",
    "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", ".", ",", ";", ":", "(", ")", "{", "}",
    "[", "]", "#", "?",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords.
    Ident(String),
    Int { value: u128, suffix: Option<String> },
    Float { value: f64, suffix: Option<String> },
    Str(String),
    Char(char),
    Lifetime(String),
    Punct(&'static str),
}

impl Token {
    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(ident) if ident == name)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        matches!(self, Token::Punct(p) if *p == punct)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "`{}`", ident),
            Token::Int { value, .. } => write!(f, "integer `{}`", value),
            Token::Float { value, .. } => write!(f, "float `{}`", value),
            Token::Str(_) => write!(f, "string literal"),
            Token::Char(c) => write!(f, "char `{}`", c),
            Token::Lifetime(name) => write!(f, "lifetime `'{}`", name),
            Token::Punct(p) => write!(f, "`{}`", p),
        }
    }
}

/// A token with its byte range and line in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

/// Splits source text into tokens, skipping whitespace and comments.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else {
                break;
            };

            let start = self.pos;
            let line = self.line;
            let token = if c.is_ascii_alphabetic() || c == '_' {
                Token::Ident(self.take_while(|c| c.is_ascii_alphanumeric() || c == '_').to_string())
            } else if c.is_ascii_digit() {
                self.number()?
            } else if c == '"' {
                self.string()?
            } else if c == '\'' {
                self.quote()?
            } else {
                self.punct()?
            };

            tokens.push(Spanned {
                token,
                start,
                end: self.pos,
                line,
            });
        }
        Ok(tokens)
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !accept(c) {
                break;
            }
            self.bump();
        }
        &self.source[start..self.pos]
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.line, message)
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                self.take_while(|c| c != '\n');
            } else if rest.starts_with("/*") {
                let line = self.line;
                self.pos += 2;
                let mut depth = 1;
                while depth > 0 {
                    let rest = self.rest();
                    if rest.is_empty() {
                        return Err(SyntaxError::new(line, "unterminated block comment"));
                    }
                    if rest.starts_with("/*") {
                        depth += 1;
                        self.pos += 2;
                    } else if rest.starts_with("*/") {
                        depth -= 1;
                        self.pos += 2;
                    } else {
                        self.bump();
                    }
                }
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.take_while(char::is_whitespace);
            } else {
                return Ok(());
            }
        }
    }

    fn number(&mut self) -> Result<Token, SyntaxError> {
        let digits = self.take_while(|c| c.is_ascii_digit() || c == '_').replace('_', "");
        let mut text = digits;
        let mut is_float = false;

        // `1.5` is a float, `1..5` and `1.max(2)` are not.
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            let fraction = self.take_while(|c| c.is_ascii_digit() || c == '_').replace('_', "");
            text = format!("{}.{}", text, fraction);
            is_float = true;
        }

        let suffix = if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            Some(self.take_while(|c| c.is_ascii_alphanumeric()).to_string())
        } else {
            None
        };

        if is_float || matches!(suffix.as_deref(), Some("f32" | "f64")) {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("invalid float literal `{}`", text)))?;
            return Ok(Token::Float { value, suffix });
        }

        let value = text
            .parse::<u128>()
            .map_err(|_| self.error(format!("invalid integer literal `{}`", text)))?;
        Ok(Token::Int { value, suffix })
    }

    fn escape(&mut self) -> Result<char, SyntaxError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some(other) => Err(self.error(format!("unknown escape `\\{}`", other))),
            None => Err(self.error("unterminated escape")),
        }
    }

    fn string(&mut self) -> Result<Token, SyntaxError> {
        let line = self.line;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => value.push(self.escape()?),
                Some(c) => value.push(c),
                None => return Err(SyntaxError::new(line, "unterminated string literal")),
            }
        }
    }

    /// A char literal (`'a'`) or a lifetime (`'a`).
    fn quote(&mut self) -> Result<Token, SyntaxError> {
        self.bump();
        let is_lifetime = self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && self.peek_nth(1) != Some('\'');
        if is_lifetime {
            let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
            return Ok(Token::Lifetime(name.to_string()));
        }

        let value = match self.bump() {
            Some('\\') => self.escape()?,
            Some(c) => c,
            None => return Err(self.error("unterminated char literal")),
        };
        if self.bump() != Some('\'') {
            return Err(self.error("unterminated char literal"));
        }
        Ok(Token::Char(value))
    }

    fn punct(&mut self) -> Result<Token, SyntaxError> {
        let rest = self.rest();
        let Some(punct) = PUNCTUATION.iter().find(|p| rest.starts_with(**p)) else {
            let c = self.peek().unwrap_or('?');
            return Err(self.error(format!("unexpected character `{}`", c)));
        };
        self.pos += punct.len();
        Ok(Token::Punct(punct))
    }
}

/// Tokenize `source`.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, SyntaxError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenize_statement() {
        assert_eq!(
            tokens("let x = 5; // five\nreturn x.to_string();"),
            vec![
                Token::Ident("let".into()),
                Token::Ident("x".into()),
                Token::Punct("="),
                Token::Int { value: 5, suffix: None },
                Token::Punct(";"),
                Token::Ident("return".into()),
                Token::Ident("x".into()),
                Token::Punct("."),
                Token::Ident("to_string".into()),
                Token::Punct("("),
                Token::Punct(")"),
                Token::Punct(";"),
            ]
        );
    }

    #[test]
    fn test_numbers_and_ranges() {
        assert_eq!(
            tokens("1.5 2u8 0..10 3.0f32"),
            vec![
                Token::Float { value: 1.5, suffix: None },
                Token::Int { value: 2, suffix: Some("u8".into()) },
                Token::Int { value: 0, suffix: None },
                Token::Punct(".."),
                Token::Int { value: 10, suffix: None },
                Token::Float { value: 3.0, suffix: Some("f32".into()) },
            ]
        );
    }

    #[test]
    fn test_strings_chars_and_lifetimes() {
        assert_eq!(
            tokens(r#""a\"b" 'c' '\n' &'static str"#),
            vec![
                Token::Str("a\"b".into()),
                Token::Char('c'),
                Token::Char('\n'),
                Token::Punct("&"),
                Token::Lifetime("static".into()),
                Token::Ident("str".into()),
            ]
        );
    }

    #[test]
    fn test_spans_and_lines() {
        let spanned = tokenize("/* a\n b */ param x").unwrap();
        assert_eq!(spanned[0].line, 2);
        assert_eq!(&"/* a\n b */ param x"[spanned[0].start..spanned[0].end], "param");
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("let a = `b`;").is_err());
        assert!(tokenize("/* never closed").is_err());
    }
}
