use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use itertools::Itertools;

use masm::*;

type IOResult = std::io::Result<()>;

/// Renders the whole program into memory
pub fn render(program: &Program) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    emit_program(&mut buffer, program)?;

    String::from_utf8(buffer).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Writes the program to `path`
///
/// The text is rendered in full before the file is created, so a failure
/// never leaves a partial output file behind.
pub fn output(path: &Path, program: &Program) -> IOResult {
    let text = render(program)?;

    let output = File::create(path)?;
    let mut writer = BufWriter::new(output);

    writer.write_all(text.as_bytes())?;
    writer.flush()?;

    Ok(())
}

fn emit_program<W: Write>(writer: &mut W, program: &Program) -> IOResult {
    for header in &program.headers {
        emit_header(writer, header)?;
    }

    for (i, block) in program.blocks.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        emit_block(writer, block)?;
    }

    Ok(())
}

fn emit_header<W: Write>(writer: &mut W, header: &str) -> IOResult {
    write!(writer, "{}", header)?;

    if !header.is_empty() && !header.ends_with('\n') {
        writeln!(writer)?;
    }

    Ok(())
}

fn emit_block<W: Write>(writer: &mut W, block: &Block) -> IOResult {
    writeln!(writer, "{}:", block.label)?;

    for instruction in &block.instructions {
        emit_instruction(writer, instruction)?;
    }

    Ok(())
}

fn emit_instruction<W: Write>(writer: &mut W, instruction: &Instruction) -> IOResult {
    if instruction.operands.is_empty() {
        writeln!(writer, "\t{}", instruction.mnemonic)
    } else {
        writeln!(
            writer,
            "\t{} {}",
            instruction.mnemonic,
            instruction.operands.iter().map(show_operand).join(", ")
        )
    }
}

fn show_operand(op: &Operand) -> String {
    match op {
        Operand::Register(reg) => reg.to_string(),
        Operand::Imm(val) => val.to_string(),
        Operand::Address(addr) => format!("${}", addr),
        Operand::Str(s) => format!("\"{}\"", s),
        Operand::Label(label) => label.clone(),
        Operand::Indirect(reg) => format!("[{}]", reg),
    }
}
