use std::fmt::{Display, Formatter};

use crate::Opcode;

/// Defines AST datatypes

#[derive(Debug, Eq, PartialEq, Clone, Default)]
pub struct TranslationUnit {
    pub funcs: Vec<FuncDecl>,
}

impl TranslationUnit {
    pub fn find_func(&self, name: &str) -> Option<&FuncDecl> {
        self.funcs.iter().find(|f| f.ident == name)
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct FuncDecl {
    pub ident: String,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Stmt {
    Instruction(InstructionCall),
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct InstructionCall {
    pub opcode: Opcode,
    pub args: Vec<Operand>,
    pub line: u32,
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Operand {
    Register(Register),
    Integer(i64),
    /// `$N`
    Address(u64),
    String(String),
    /// Bare identifier naming a function, resolved during code generation
    Label(String),
    /// `[REG]`, one level of memory indirection
    Indirect(Register),
}

impl Operand {
    /// Short description used in diagnostics
    pub fn describe(&self) -> String {
        match self {
            Operand::Register(reg) => format!("register {reg}"),
            Operand::Integer(val) => format!("integer {val}"),
            Operand::Address(addr) => format!("address ${addr}"),
            Operand::String(s) => format!("string \"{s}\""),
            Operand::Label(label) => format!("label '{label}'"),
            Operand::Indirect(reg) => format!("memory operand [{reg}]"),
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
pub enum Register {
    RAX,
    RBX,
    RCX,
    RDX,
    RSI,
    RDI,
    RBP,
    RSP,
    /// General purpose `R0`..`R15`
    R(u8),
}

pub const GENERAL_REGISTERS: u8 = 16;

impl Register {
    pub fn from_name(name: &str) -> Option<Register> {
        let reg = match name {
            "RAX" => Register::RAX,
            "RBX" => Register::RBX,
            "RCX" => Register::RCX,
            "RDX" => Register::RDX,
            "RSI" => Register::RSI,
            "RDI" => Register::RDI,
            "RBP" => Register::RBP,
            "RSP" => Register::RSP,
            _ => {
                let digits = name.strip_prefix('R')?;
                // no leading zeros, so "R01" stays an identifier
                if digits.is_empty() || (digits.len() > 1 && digits.starts_with('0')) {
                    return None;
                }
                let n = digits.parse::<u8>().ok()?;
                if n >= GENERAL_REGISTERS {
                    return None;
                }
                Register::R(n)
            }
        };

        Some(reg)
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Register::R(n) => write!(f, "R{n}"),
            named => write!(f, "{named:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_names() {
        assert_eq!(Register::from_name("RAX"), Some(Register::RAX));
        assert_eq!(Register::from_name("RSP"), Some(Register::RSP));
        assert_eq!(Register::from_name("R0"), Some(Register::R(0)));
        assert_eq!(Register::from_name("R15"), Some(Register::R(15)));

        assert_eq!(Register::from_name("R16"), None);
        assert_eq!(Register::from_name("R01"), None);
        assert_eq!(Register::from_name("R"), None);
        assert_eq!(Register::from_name("rax"), None);
        assert_eq!(Register::from_name("loop"), None);
    }

    #[test]
    fn register_display_round_trips() {
        for name in ["RAX", "RBX", "RCX", "RDX", "RSI", "RDI", "RBP", "RSP", "R7", "R12"] {
            let reg = Register::from_name(name).unwrap();
            assert_eq!(reg.to_string(), name);
        }
    }
}
