use std::fmt::{Display, Formatter};

use crate::Operand;

/// Declares `Opcode`, the `OPCODES` list and each opcode's source name from one table
macro_rules! opcodes {
    ($( $variant:ident => $name:literal ),+ $(,)?) => {
        /// Every instruction a Wake statement can invoke
        #[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
        pub enum Opcode {
            $( $variant ),+
        }

        /// All opcodes, in declaration order
        pub const OPCODES: &[Opcode] = &[$( Opcode::$variant ),+];

        impl Opcode {
            /// Name used in Wake source
            pub fn name(self) -> &'static str {
                match self {
                    $( Opcode::$variant => $name ),+
                }
            }
        }
    };
}

opcodes! {
    Mov => "mov",
    Add => "add",
    Sub => "sub",
    Mul => "mul",
    Div => "div",
    And => "and",
    Or => "or",
    Xor => "xor",
    Shl => "shl",
    Shr => "shr",
    Cmp => "cmp",
    Inc => "inc",
    Dec => "dec",
    Not => "not",
    Push => "push",
    Pop => "pop",
    Jmp => "jmp",
    Call => "call",
    Je => "je",
    Jne => "jne",
    Jl => "jl",
    Jg => "jg",
    Jle => "jle",
    Jge => "jge",
    Out => "out",
    Cout => "cout",
    Exit => "exit",
    Db => "db",
    Ret => "ret",
    Hlt => "hlt",
}

/// What a single argument position accepts
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Shape {
    /// Register, integer, address or `[reg]`
    Value,
    /// Register or `[reg]`
    Writable,
    /// Function name
    Label,
    Address,
    String,
}

impl Shape {
    pub fn accepts(self, operand: &Operand) -> bool {
        match self {
            Shape::Value => matches!(
                operand,
                Operand::Register(_)
                    | Operand::Integer(_)
                    | Operand::Address(_)
                    | Operand::Indirect(_)
            ),
            Shape::Writable => matches!(operand, Operand::Register(_) | Operand::Indirect(_)),
            Shape::Label => matches!(operand, Operand::Label(_)),
            Shape::Address => matches!(operand, Operand::Address(_)),
            Shape::String => matches!(operand, Operand::String(_)),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Shape::Value => "a register, integer, address or memory operand",
            Shape::Writable => "a register or memory operand",
            Shape::Label => "a label",
            Shape::Address => "an address",
            Shape::String => "a string",
        }
    }
}

/// How a call is written out as MicroASM
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum Template {
    /// One line: the mnemonic followed by every operand in order
    Direct(&'static str),
    /// Conditional jump to the first label, then `JMP` to the second
    Branch(&'static str),
}

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct Signature {
    pub min_args: usize,
    pub max_args: usize,
    /// One entry per position up to `max_args`
    pub shapes: &'static [Shape],
    pub template: Template,
}

impl Signature {
    const fn fixed(shapes: &'static [Shape], template: Template) -> Self {
        Self {
            min_args: shapes.len(),
            max_args: shapes.len(),
            shapes,
            template,
        }
    }

    pub fn accepts_count(&self, count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&count)
    }

    pub fn shape(&self, position: usize) -> Option<Shape> {
        self.shapes.get(position).copied()
    }
}

const NONE: &[Shape] = &[];
const WRITE_VALUE: &[Shape] = &[Shape::Writable, Shape::Value];
const VALUE_VALUE: &[Shape] = &[Shape::Value, Shape::Value];
const WRITE: &[Shape] = &[Shape::Writable];
const VALUE: &[Shape] = &[Shape::Value];
const LABEL: &[Shape] = &[Shape::Label];
const LABEL_LABEL: &[Shape] = &[Shape::Label, Shape::Label];
const ADDRESS_STRING: &[Shape] = &[Shape::Address, Shape::String];

impl Opcode {
    pub fn from_name(name: &str) -> Option<Opcode> {
        OPCODES.iter().copied().find(|op| op.name() == name)
    }

    /// Arity, operand shapes and MicroASM template, shared by the parser and code generator
    pub fn signature(self) -> Signature {
        use Template::*;

        match self {
            Opcode::Mov => Signature::fixed(WRITE_VALUE, Direct("MOV")),
            Opcode::Add => Signature::fixed(WRITE_VALUE, Direct("ADD")),
            Opcode::Sub => Signature::fixed(WRITE_VALUE, Direct("SUB")),
            Opcode::Mul => Signature::fixed(WRITE_VALUE, Direct("MUL")),
            Opcode::Div => Signature::fixed(WRITE_VALUE, Direct("DIV")),
            Opcode::And => Signature::fixed(WRITE_VALUE, Direct("AND")),
            Opcode::Or => Signature::fixed(WRITE_VALUE, Direct("OR")),
            Opcode::Xor => Signature::fixed(WRITE_VALUE, Direct("XOR")),
            Opcode::Shl => Signature::fixed(WRITE_VALUE, Direct("SHL")),
            Opcode::Shr => Signature::fixed(WRITE_VALUE, Direct("SHR")),
            Opcode::Cmp => Signature::fixed(VALUE_VALUE, Direct("CMP")),
            Opcode::Inc => Signature::fixed(WRITE, Direct("INC")),
            Opcode::Dec => Signature::fixed(WRITE, Direct("DEC")),
            Opcode::Not => Signature::fixed(WRITE, Direct("NOT")),
            Opcode::Push => Signature::fixed(VALUE, Direct("PUSH")),
            Opcode::Pop => Signature::fixed(WRITE, Direct("POP")),
            Opcode::Jmp => Signature::fixed(LABEL, Direct("JMP")),
            Opcode::Call => Signature::fixed(LABEL, Direct("CALL")),
            Opcode::Je => Signature::fixed(LABEL_LABEL, Branch("JE")),
            Opcode::Jne => Signature::fixed(LABEL_LABEL, Branch("JNE")),
            Opcode::Jl => Signature::fixed(LABEL_LABEL, Branch("JL")),
            Opcode::Jg => Signature::fixed(LABEL_LABEL, Branch("JG")),
            Opcode::Jle => Signature::fixed(LABEL_LABEL, Branch("JLE")),
            Opcode::Jge => Signature::fixed(LABEL_LABEL, Branch("JGE")),
            Opcode::Out => Signature::fixed(VALUE_VALUE, Direct("OUT")),
            Opcode::Cout => Signature::fixed(VALUE_VALUE, Direct("COUT")),
            Opcode::Exit => Signature::fixed(VALUE, Direct("EXIT")),
            Opcode::Db => Signature::fixed(ADDRESS_STRING, Direct("DB")),
            Opcode::Ret => Signature::fixed(NONE, Direct("RET")),
            Opcode::Hlt => Signature::fixed(NONE, Direct("HLT")),
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        assert_eq!(OPCODES.len(), 30);
        for &op in OPCODES {
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
        assert_eq!(Opcode::from_name("MOV"), None);
        assert_eq!(Opcode::from_name("lea"), None);
    }

    #[test]
    fn shapes_cover_every_position() {
        for &op in OPCODES {
            let sig = op.signature();
            assert!(sig.min_args <= sig.max_args, "{op}");
            assert_eq!(sig.shapes.len(), sig.max_args, "{op}");
        }
    }

    #[test]
    fn branches_take_two_labels() {
        for &op in OPCODES {
            let sig = op.signature();
            if let Template::Branch(_) = sig.template {
                assert_eq!(sig.shapes, LABEL_LABEL, "{op}");
            }
        }
        assert!(matches!(Opcode::Jle.signature().template, Template::Branch("JLE")));
    }

    #[test]
    fn value_shape() {
        assert!(Shape::Value.accepts(&Operand::Integer(3)));
        assert!(Shape::Value.accepts(&Operand::Indirect(crate::Register::RBX)));
        assert!(!Shape::Value.accepts(&Operand::Label("main".to_string())));
        assert!(!Shape::Writable.accepts(&Operand::Integer(3)));
    }
}
