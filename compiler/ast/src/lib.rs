pub use ast_def::*;
pub use opcode::*;

mod ast_def;
mod opcode;
