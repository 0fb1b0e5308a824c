use ast::Register;

/// Defines MicroASM program datatypes

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Verbatim `#M_include` text, emitted before any generated line
    pub headers: Vec<String>,
    pub blocks: Vec<Block>,
}

impl Program {
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }
}

/// A labeled run of instructions, one per Wake function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(mnemonic: &'static str, operands: Vec<Operand>) -> Self {
        Self { mnemonic, operands }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Imm(i64),
    Address(u64),
    Str(String),
    Label(String),
    Indirect(Register),
}

impl From<&ast::Operand> for Operand {
    fn from(operand: &ast::Operand) -> Self {
        match operand {
            ast::Operand::Register(reg) => Operand::Register(*reg),
            ast::Operand::Integer(val) => Operand::Imm(*val),
            ast::Operand::Address(addr) => Operand::Address(*addr),
            ast::Operand::String(s) => Operand::Str(s.clone()),
            ast::Operand::Label(label) => Operand::Label(label.clone()),
            ast::Operand::Indirect(reg) => Operand::Indirect(*reg),
        }
    }
}
