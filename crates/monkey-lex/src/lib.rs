//! Lexical analysis for Monkey source text.
//!
//! Turns a source string into a stream of [`Token`]s, collecting
//! structural diagnostics (unmatched brackets, illegal characters) along
//! the way instead of failing fast on the first one.

mod cursor;
mod lexer;
mod token;

pub use lexer::{lex, LexError, Lexer};
pub use token::{Token, TokenKind, KEYWORDS};
