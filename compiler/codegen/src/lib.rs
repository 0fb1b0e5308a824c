use thiserror::Error;

use ast::*;
use diagnostics::Session;
use masm::{Block, Instruction, Program};

use crate::validate_labels::validate_labels;

mod validate_labels;

/// Block emitted first when present
pub const ENTRY_POINT: &str = "main";

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum CodegenError {
    #[error("reference to undefined label '{label}'")]
    UndefinedLabel { label: String, line: u32 },
}

impl CodegenError {
    pub fn line(&self) -> u32 {
        match self {
            CodegenError::UndefinedLabel { line, .. } => *line,
        }
    }
}

/// Lowers a parsed translation unit into a MicroASM program
///
/// Every label reference is checked against the declared functions before
/// anything is generated, so forward calls are fine and a bad reference
/// yields no program at all.
pub fn gen_masm(
    unit: &TranslationUnit,
    headers: Vec<String>,
    session: &mut Session,
) -> Result<Program, CodegenError> {
    validate_labels(unit)?;

    let entry = unit.find_func(ENTRY_POINT);

    if entry.is_none() {
        session.warn(
            None,
            format!("no '{ENTRY_POINT}' function, output starts at the first declared function"),
        );
    }

    let blocks = entry
        .into_iter()
        .chain(unit.funcs.iter().filter(|f| f.ident != ENTRY_POINT))
        .map(gen_block)
        .collect();

    Ok(Program { headers, blocks })
}

fn gen_block(func: &FuncDecl) -> Block {
    Block {
        label: func.ident.clone(),
        instructions: func.body.iter().flat_map(gen_stmt).collect(),
    }
}

fn gen_stmt(stmt: &Stmt) -> Vec<Instruction> {
    match stmt {
        Stmt::Instruction(call) => gen_instruction(call),
    }
}

fn gen_instruction(call: &InstructionCall) -> Vec<Instruction> {
    let operands: Vec<masm::Operand> = call.args.iter().map(masm::Operand::from).collect();

    match call.opcode.signature().template {
        Template::Direct(mnemonic) => vec![Instruction::new(mnemonic, operands)],
        Template::Branch(mnemonic) => {
            let mut targets = operands.into_iter();

            vec![
                Instruction::new(mnemonic, targets.next().into_iter().collect()),
                Instruction::new("JMP", targets.collect()),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use lexer::lex;
    use masm::Operand as M;
    use parser::Parser;

    use super::*;

    fn parse(src: &str) -> TranslationUnit {
        Parser::new(lex(src).unwrap()).parse().unwrap()
    }

    fn gen(src: &str) -> (Result<Program, CodegenError>, Session) {
        let mut session = Session::new();
        let program = gen_masm(&parse(src), vec![], &mut session);
        (program, session)
    }

    fn sample(shape: Shape) -> ast::Operand {
        match shape {
            Shape::Value | Shape::Writable => ast::Operand::Register(Register::RAX),
            Shape::Label => ast::Operand::Label("main".to_string()),
            Shape::Address => ast::Operand::Address(100),
            Shape::String => ast::Operand::String("text".to_string()),
        }
    }

    #[test]
    fn one_line_per_instruction_two_per_branch() {
        for &opcode in OPCODES {
            let signature = opcode.signature();
            let call = InstructionCall {
                opcode,
                args: signature.shapes.iter().map(|s| sample(*s)).collect(),
                line: 1,
            };

            let lowered = gen_instruction(&call);

            match signature.template {
                Template::Direct(mnemonic) => {
                    assert_eq!(lowered.len(), 1, "{opcode}");
                    assert_eq!(lowered[0].mnemonic, mnemonic);
                    assert_eq!(lowered[0].operands.len(), call.args.len());
                }
                Template::Branch(_) => assert_eq!(lowered.len(), 2, "{opcode}"),
            }
        }
    }

    #[test]
    fn hello_world() {
        let (program, session) = gen(
            "void main() { db($100, \"Hello, World!\"); mov(RAX, $100); out(1, RAX); hlt(); }",
        );
        let program = program.unwrap();

        assert!(session.diagnostics.is_empty());
        assert_eq!(
            program.blocks,
            vec![Block {
                label: "main".to_string(),
                instructions: vec![
                    Instruction::new(
                        "DB",
                        vec![M::Address(100), M::Str("Hello, World!".to_string())]
                    ),
                    Instruction::new("MOV", vec![M::Register(Register::RAX), M::Address(100)]),
                    Instruction::new("OUT", vec![M::Imm(1), M::Register(Register::RAX)]),
                    Instruction::new("HLT", vec![]),
                ],
            }]
        );
    }

    #[test]
    fn conditional_jump_lowers_to_pair() {
        let (program, _) = gen(
            "void main() { mov(R1, 0); mov(R2, 5); jmp(loop); }
             void loop() { inc(R1); cmp(R1, R2); jle(\"loop\", \"done\"); }
             void done() { hlt(); }",
        );
        let program = program.unwrap();
        let looped = &program.blocks[1];

        assert_eq!(looped.label, "loop");
        assert_eq!(
            &looped.instructions[2..],
            &[
                Instruction::new("JLE", vec![M::Label("loop".to_string())]),
                Instruction::new("JMP", vec![M::Label("done".to_string())]),
            ]
        );
        assert_eq!(program.blocks[2].instructions, vec![Instruction::new("HLT", vec![])]);
    }

    #[test]
    fn main_is_emitted_first() {
        let (program, _) =
            gen("void a() { ret(); } void main() { call(a); hlt(); } void b() { ret(); }");
        let labels: Vec<_> = program.unwrap().blocks.into_iter().map(|b| b.label).collect();

        assert_eq!(labels, vec!["main", "a", "b"]);
    }

    #[test]
    fn missing_main_is_a_warning() {
        let (program, session) = gen("void b() { ret(); } void a() { call(b); }");
        let labels: Vec<_> = program.unwrap().blocks.into_iter().map(|b| b.label).collect();

        assert_eq!(labels, vec!["b", "a"]);
        assert_eq!(session.diagnostics.warnings().count(), 1);
        assert!(!session.diagnostics.has_errors());
    }

    #[test]
    fn undefined_label() {
        let (program, _) = gen("void main() {\n    call(missing);\n}");

        assert_eq!(
            program.unwrap_err(),
            CodegenError::UndefinedLabel {
                label: "missing".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn undefined_second_branch_target() {
        let (program, _) = gen("void main() { je(main, nowhere); }");

        assert!(matches!(
            program,
            Err(CodegenError::UndefinedLabel { label, .. }) if label == "nowhere"
        ));
    }

    #[test]
    fn headers_are_carried_through() {
        let mut session = Session::new();
        let headers = vec!["lbl print\n".to_string()];
        let unit = parse("void main() { hlt(); }");
        let program = gen_masm(&unit, headers.clone(), &mut session).unwrap();

        assert_eq!(program.headers, headers);
    }

    #[test]
    fn generation_is_deterministic() {
        let src = "void x() { ret(); } void main() { call(x); push(5); pop(RBX); hlt(); }";

        assert_eq!(gen(src).0.unwrap(), gen(src).0.unwrap());
    }
}
