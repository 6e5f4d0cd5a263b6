//! Foundational types shared by every crate in the Monkey pipeline.
//!
//! Mirrors the role `faxc-util` plays for the Fax compiler: one small,
//! dependency-light crate that the lexer, parser, evaluator, compiler and
//! VM all sit on top of, so that a `Position` or logging call means the
//! same thing everywhere.

mod error;
mod position;

pub use error::Reported;
pub use position::Position;

/// Re-exported so downstream crates log through one shared facade instead
/// of each depending on `log` directly.
pub use log;
