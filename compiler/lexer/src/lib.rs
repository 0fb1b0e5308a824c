use std::fmt::{Display, Formatter};
use std::str::Chars;

use thiserror::Error;

use ast::Register;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, line: u32, col: u32 },
    #[error("unterminated string literal")]
    UnterminatedString { line: u32, col: u32 },
    #[error("invalid integer literal '{text}'")]
    InvalidInteger { text: String, line: u32, col: u32 },
}

impl LexError {
    pub fn line(&self) -> u32 {
        match self {
            LexError::UnexpectedCharacter { line, .. }
            | LexError::UnterminatedString { line, .. }
            | LexError::InvalidInteger { line, .. } => *line,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Token {
    pub kind: TokenType,
    pub start: usize,
    pub end: usize,
    pub value: TokenValue,
    pub line: u32,
    pub col: u32,
}

impl Token {
    fn new(
        kind: TokenType,
        start: usize,
        end: usize,
        value: TokenValue,
        line: u32,
        col: u32,
    ) -> Self {
        Self {
            kind,
            start,
            end,
            value,
            line,
            col,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            TokenValue::Ident(name) => write!(f, "identifier '{name}'"),
            TokenValue::Register(reg) => write!(f, "register {reg}"),
            TokenValue::Integer(val) => write!(f, "integer {val}"),
            TokenValue::Address(addr) => write!(f, "address ${addr}"),
            TokenValue::String(s) => write!(f, "string \"{s}\""),
            TokenValue::Error(err) => write!(f, "{err}"),
            TokenValue::None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenValue {
    None,
    Integer(i64),
    Address(u64),
    String(String),
    Ident(String),
    Register(Register),
    Error(LexError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenType {
    // Single-character tokens
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,

    // Literals
    Identifier,
    Register,
    Integer,
    Address,
    String,

    // Keywords
    Void,

    // Informational
    Whitespace,
    Eof,
    Unknown,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenType::OpenParen => "'('",
            TokenType::CloseParen => "')'",
            TokenType::OpenBrace => "'{'",
            TokenType::CloseBrace => "'}'",
            TokenType::OpenBracket => "'['",
            TokenType::CloseBracket => "']'",
            TokenType::Comma => "','",
            TokenType::Semicolon => "';'",
            TokenType::Identifier => "an identifier",
            TokenType::Register => "a register",
            TokenType::Integer => "an integer",
            TokenType::Address => "an address",
            TokenType::String => "a string",
            TokenType::Void => "'void'",
            TokenType::Whitespace => "whitespace",
            TokenType::Eof => "end of file",
            TokenType::Unknown => "an unknown token",
        };
        write!(f, "{text}")
    }
}

const EOF: char = '\0';

pub struct Lexer<'a> {
    /// Source Text
    source: &'a str,

    /// Remaining source characters
    chars: Chars<'a>,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars(),
            line: 1,
            col: 1,
        }
    }

    /// Yields every token, including `Unknown` tokens carrying a `LexError`
    pub fn tokenize(mut self) -> impl Iterator<Item = Token> + 'a {
        std::iter::from_fn(move || {
            let token = self.scan_token();
            if token.kind != TokenType::Eof {
                Some(token)
            } else {
                None
            }
        })
        .filter(|t| t.kind != TokenType::Whitespace)
    }

    fn scan_token(&mut self) -> Token {
        let start = self.offset();
        let line = self.line;
        let col = self.col;

        let c = match self.advance() {
            Some(c) => c,
            None => return Token::new(TokenType::Eof, start, start, TokenValue::None, line, col),
        };

        let (kind, value) = match c {
            '(' => (TokenType::OpenParen, TokenValue::None),
            ')' => (TokenType::CloseParen, TokenValue::None),
            '{' => (TokenType::OpenBrace, TokenValue::None),
            '}' => (TokenType::CloseBrace, TokenValue::None),
            '[' => (TokenType::OpenBracket, TokenValue::None),
            ']' => (TokenType::CloseBracket, TokenValue::None),
            ',' => (TokenType::Comma, TokenValue::None),
            ';' => (TokenType::Semicolon, TokenValue::None),
            '/' if self.peek() == '/' => {
                self.advance_while(|c| c != '\n');
                (TokenType::Whitespace, TokenValue::None)
            }
            '"' => self.string(line, col),
            '$' if self.peek().is_ascii_digit() => self.address(start, line, col),
            '0'..='9' => self.number(start, line, col),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(start),
            c if c.is_whitespace() => (TokenType::Whitespace, TokenValue::None),
            ch => (
                TokenType::Unknown,
                TokenValue::Error(LexError::UnexpectedCharacter { ch, line, col }),
            ),
        };

        Token::new(kind, start, self.offset(), value, line, col)
    }

    /// String literals keep their characters exactly as written, without escapes
    fn string(&mut self, line: u32, col: u32) -> (TokenType, TokenValue) {
        let body_start = self.offset();
        self.advance_while(|c| c != '"');

        if self.is_eof() {
            return (
                TokenType::Unknown,
                TokenValue::Error(LexError::UnterminatedString { line, col }),
            );
        }

        let body = self.source[body_start..self.offset()].to_string();
        // closing quote
        self.advance();

        (TokenType::String, TokenValue::String(body))
    }

    fn address(&mut self, start: usize, line: u32, col: u32) -> (TokenType, TokenValue) {
        let (valid, text) = self.digits(start);
        let parsed = if valid { text[1..].parse::<u64>().ok() } else { None };

        match parsed {
            Some(addr) => (TokenType::Address, TokenValue::Address(addr)),
            None => (
                TokenType::Unknown,
                TokenValue::Error(LexError::InvalidInteger {
                    text: text.to_string(),
                    line,
                    col,
                }),
            ),
        }
    }

    fn number(&mut self, start: usize, line: u32, col: u32) -> (TokenType, TokenValue) {
        let (valid, text) = self.digits(start);
        let parsed = if valid { text.parse::<i64>().ok() } else { None };

        match parsed {
            Some(val) => (TokenType::Integer, TokenValue::Integer(val)),
            None => (
                TokenType::Unknown,
                TokenValue::Error(LexError::InvalidInteger {
                    text: text.to_string(),
                    line,
                    col,
                }),
            ),
        }
    }

    /// Consumes a run of digits, plus any letters glued onto it
    ///
    /// Returns whether the run was digits only, along with the text since `start`.
    fn digits(&mut self, start: usize) -> (bool, &'a str) {
        self.advance_while(|c| c.is_ascii_digit());

        let valid = !is_ident_char(self.peek());
        if !valid {
            self.advance_while(is_ident_char);
        }

        (valid, &self.source[start..self.offset()])
    }

    fn identifier(&mut self, start: usize) -> (TokenType, TokenValue) {
        self.advance_while(is_ident_char);

        let text = &self.source[start..self.offset()];

        if text == "void" {
            return (TokenType::Void, TokenValue::None);
        }

        match Register::from_name(text) {
            Some(reg) => (TokenType::Register, TokenValue::Register(reg)),
            None => (TokenType::Identifier, TokenValue::Ident(text.to_string())),
        }
    }

    /// Get offset into source text
    fn offset(&self) -> usize {
        self.source.len() - self.chars.as_str().len()
    }

    fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    fn peek(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }

        Some(c)
    }

    /// Consume characters while some predicate is true or until EOF is reached
    fn advance_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while !self.is_eof() && predicate(self.peek()) {
            self.advance();
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes the whole source, stopping at the first lexical error
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source)
        .tokenize()
        .map(|t| match t.value {
            TokenValue::Error(err) => Err(err),
            _ => Ok(t),
        })
        .collect()
}
