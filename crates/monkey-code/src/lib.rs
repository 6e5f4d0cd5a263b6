//! Bytecode representation shared by the compiler and VM: the opcode
//! table, the flat instruction buffer with its encode/disassemble
//! helpers, and the `Bytecode`/`Value` types a compiled program is made
//! of.

mod bytecode;
mod instructions;
mod opcode;
mod value;

pub use bytecode::Bytecode;
pub use instructions::Instructions;
pub use opcode::Opcode;
pub use value::{CompiledFunction, HashKey, Value};
