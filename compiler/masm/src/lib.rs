pub use masm_def::*;

mod masm_def;
