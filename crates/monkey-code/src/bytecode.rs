//! The compiler's output: an instruction stream plus the constant pool it
//! indexes into. Both halves derive `serde::Serialize`/`Deserialize` so a
//! `Bytecode` can be written to and read back from a `.mb` file by
//! `monkey-driver` without this crate knowing anything about file framing.

use serde::{Deserialize, Serialize};

use crate::instructions::Instructions;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}
