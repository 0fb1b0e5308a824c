use std::collections::HashMap;
use std::iter::Peekable;

use itertools::Itertools;
use thiserror::Error;

use ast::*;
use lexer::*;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected}, but found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: u32,
    },
    #[error("expected {expected}, but found end of file")]
    UnexpectedEof { expected: String, line: u32 },
    #[error("unknown instruction '{name}'")]
    UnknownInstruction { name: String, line: u32 },
    #[error("'{opcode}' takes {}, but {found} were given", show_arity(.min, .max))]
    ArityMismatch {
        opcode: Opcode,
        min: usize,
        max: usize,
        found: usize,
        line: u32,
    },
    #[error("argument {position} of '{opcode}' must be {expected}, but found {found}")]
    OperandTypeMismatch {
        opcode: Opcode,
        position: usize,
        expected: &'static str,
        found: String,
        line: u32,
    },
    #[error("function '{name}' is defined more than once")]
    DuplicateFunction { name: String, line: u32 },
    #[error("\"{text}\" is not a valid label name")]
    InvalidLabel { text: String, line: u32 },
}

impl ParseError {
    pub fn line(&self) -> u32 {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnexpectedEof { line, .. }
            | ParseError::UnknownInstruction { line, .. }
            | ParseError::ArityMismatch { line, .. }
            | ParseError::OperandTypeMismatch { line, .. }
            | ParseError::DuplicateFunction { line, .. }
            | ParseError::InvalidLabel { line, .. } => *line,
        }
    }
}

fn show_arity(min: &usize, max: &usize) -> String {
    let (min, max) = (*min, *max);
    let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };

    if min == max {
        format!("{min} {}", plural(min))
    } else {
        format!("{min} to {max} {}", plural(max))
    }
}

fn one_of(expected: &[TokenType]) -> String {
    expected.iter().map(TokenType::to_string).join(" or ")
}

pub struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
    /// Line of the most recently consumed token, used for end-of-file errors
    line: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            line: 1,
        }
    }

    pub fn parse(&mut self) -> Result<TranslationUnit, ParseError> {
        let mut funcs = vec![];
        let mut declared = HashMap::new();

        while self.tokens.peek().is_some() {
            let func = self.parse_func()?;

            if declared.insert(func.ident.clone(), func.line).is_some() {
                return Err(ParseError::DuplicateFunction {
                    name: func.ident,
                    line: func.line,
                });
            }

            funcs.push(func);
        }

        Ok(TranslationUnit { funcs })
    }

    fn parse_func(&mut self) -> Result<FuncDecl, ParseError> {
        let line = self.expect(TokenType::Void)?.line;
        let name = self.parse_ident()?;

        self.expect(TokenType::OpenParen)?;
        self.expect(TokenType::CloseParen)?;
        self.expect(TokenType::OpenBrace)?;

        let mut body = vec![];

        while self
            .tokens
            .peek()
            .is_some_and(|t| t.kind != TokenType::CloseBrace)
        {
            body.push(self.parse_stmt()?);
        }

        self.expect(TokenType::CloseBrace)?;

        Ok(FuncDecl {
            ident: name,
            body,
            line,
        })
    }

    fn parse_ident(&mut self) -> Result<String, ParseError> {
        let token = self.expect(TokenType::Identifier)?;

        match token.value {
            TokenValue::Ident(ident) => Ok(ident),
            _ => Err(self.unexpected("an identifier", &token)),
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let token = self.expect(TokenType::Identifier)?;
        let line = token.line;

        let opcode = match &token.value {
            TokenValue::Ident(name) => {
                Opcode::from_name(name).ok_or_else(|| ParseError::UnknownInstruction {
                    name: name.clone(),
                    line,
                })?
            }
            _ => return Err(self.unexpected("an instruction name", &token)),
        };

        self.expect(TokenType::OpenParen)?;
        let args = self.parse_args()?;
        self.expect(TokenType::CloseParen)?;
        self.expect(TokenType::Semicolon)?;

        let args = check_args(opcode, args, line)?;

        Ok(Stmt::Instruction(InstructionCall { opcode, args, line }))
    }

    fn parse_args(&mut self) -> Result<Vec<Operand>, ParseError> {
        let mut args = vec![];

        if self.peek_kind() == Some(TokenType::CloseParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_operand()?);

            match self.peek_kind() {
                Some(TokenType::Comma) => {
                    self.next();
                }
                Some(TokenType::CloseParen) => return Ok(args),
                Some(_) => {
                    let expected = one_of(&[TokenType::Comma, TokenType::CloseParen]);
                    let found = self.next_token(&expected)?;
                    return Err(self.unexpected(&expected, &found));
                }
                None => {
                    return Err(ParseError::UnexpectedEof {
                        expected: one_of(&[TokenType::Comma, TokenType::CloseParen]),
                        line: self.line,
                    })
                }
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        let token = self.next_token("an operand")?;

        match token.value {
            TokenValue::Register(reg) => Ok(Operand::Register(reg)),
            TokenValue::Integer(val) => Ok(Operand::Integer(val)),
            TokenValue::Address(addr) => Ok(Operand::Address(addr)),
            TokenValue::String(s) => Ok(Operand::String(s)),
            TokenValue::Ident(label) => Ok(Operand::Label(label)),
            _ if token.kind == TokenType::OpenBracket => {
                let reg = self.expect(TokenType::Register)?;
                self.expect(TokenType::CloseBracket)?;

                match reg.value {
                    TokenValue::Register(reg) => Ok(Operand::Indirect(reg)),
                    _ => Err(self.unexpected("a register", &reg)),
                }
            }
            _ => Err(self.unexpected("an operand", &token)),
        }
    }

    /// Checks if next token is of correct expected type
    fn expect(&mut self, expected: TokenType) -> Result<Token, ParseError> {
        let token = self.next_token(&expected.to_string())?;

        if token.kind == expected {
            Ok(token)
        } else {
            Err(self.unexpected(&expected.to_string(), &token))
        }
    }

    fn next_token(&mut self, expected: &str) -> Result<Token, ParseError> {
        match self.next() {
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
                line: self.line,
            }),
        }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.next()?;
        self.line = token.line;
        Some(token)
    }

    fn peek_kind(&mut self) -> Option<TokenType> {
        self.tokens.peek().map(|t| t.kind)
    }

    fn unexpected(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: found.to_string(),
            line: found.line,
        }
    }
}

/// Validates argument count and shapes against the instruction table
///
/// Quoted strings in label positions are accepted as labels, so
/// `je("loop", "done")` and `je(loop, done)` mean the same thing.
fn check_args(opcode: Opcode, args: Vec<Operand>, line: u32) -> Result<Vec<Operand>, ParseError> {
    let signature = opcode.signature();

    if !signature.accepts_count(args.len()) {
        return Err(ParseError::ArityMismatch {
            opcode,
            min: signature.min_args,
            max: signature.max_args,
            found: args.len(),
            line,
        });
    }

    args.into_iter()
        .zip(signature.shapes)
        .enumerate()
        .map(|(index, (arg, &shape))| {
            let arg = match (shape, arg) {
                (Shape::Label, Operand::String(text)) if is_label(&text) => Operand::Label(text),
                (Shape::Label, Operand::String(text)) => {
                    return Err(ParseError::InvalidLabel { text, line })
                }
                (_, arg) => arg,
            };

            if shape.accepts(&arg) {
                Ok(arg)
            } else {
                Err(ParseError::OperandTypeMismatch {
                    opcode,
                    position: index + 1,
                    expected: shape.describe(),
                    found: arg.describe(),
                    line,
                })
            }
        })
        .collect()
}

fn is_label(text: &str) -> bool {
    let mut chars = text.chars();

    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && Register::from_name(text).is_none()
        && text != "void"
}
