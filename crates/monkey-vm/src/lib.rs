//! The bytecode virtual machine: a fetch-decode-execute loop over
//! [`monkey_code::Bytecode`], with a flat value stack, indexed globals,
//! and a frame stack for calls.

mod error;
mod frame;
mod vm;

pub use error::VmError;
pub use frame::Frame;
pub use vm::VM;
