use std::collections::HashSet;

use ast::*;

use crate::CodegenError;

type LabelSet<'a> = HashSet<&'a str>;

/// Every label operand must name a function declared somewhere in the unit
pub fn validate_labels(unit: &TranslationUnit) -> Result<(), CodegenError> {
    let defined: LabelSet = unit.funcs.iter().map(|f| f.ident.as_str()).collect();

    for func in &unit.funcs {
        validate_func(func, &defined)?;
    }

    Ok(())
}

fn validate_func(func: &FuncDecl, defined: &LabelSet) -> Result<(), CodegenError> {
    for stmt in &func.body {
        validate_stmt(stmt, defined)?;
    }

    Ok(())
}

fn validate_stmt(stmt: &Stmt, defined: &LabelSet) -> Result<(), CodegenError> {
    match stmt {
        Stmt::Instruction(call) => {
            let undefined = call.args.iter().find_map(|arg| match arg {
                Operand::Label(label) if !defined.contains(label.as_str()) => Some(label),
                _ => None,
            });

            match undefined {
                Some(label) => Err(CodegenError::UndefinedLabel {
                    label: label.clone(),
                    line: call.line,
                }),
                None => Ok(()),
            }
        }
    }
}
