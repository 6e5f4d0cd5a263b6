//! Shared error plumbing used by every stage of the pipeline.
//!
//! Lexical and syntactic errors stay plain data collected into lists (see
//! [`Position`](crate::Position)); this module only carries the fatal,
//! typed errors that compile-time and run-time stages raise with `?`.

use thiserror::Error;

/// A single reported problem with an attached [`Position`](crate::Position).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}: {message}")]
pub struct Reported {
    pub message: String,
    pub position: crate::Position,
}

impl Reported {
    pub fn new(message: impl Into<String>, position: crate::Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}
