//! Fatal, typed errors the compiler raises. Unlike the lexer/parser,
//! which accumulate diagnostics, compilation aborts at the first problem:
//! there is no useful bytecode to produce around a hole in it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("identifier not found: {0}")]
    UnknownIdentifier(String),
    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}
