//! Fatal VM conditions. Unlike the evaluator, which turns every runtime
//! problem into an `Error` Value and keeps going, the VM has no equivalent
//! recovery path — a bad opcode or a type mismatch aborts the run.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("unknown opcode: {0:#x}")]
    UnknownOpcode(u8),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
    #[error("calling non-function and non-built-in")]
    NotCallable,
    #[error("wrong number of arguments: want={want}, got={got}")]
    ArityMismatch { want: usize, got: usize },
    #[error("unusable as hash key: {0}")]
    UnhashableKey(String),
    #[error("index operator not supported: {0}")]
    UnsupportedIndex(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
}
