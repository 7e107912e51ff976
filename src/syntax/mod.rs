//! Go syntax: tokens, tree, parser and a gofmt-style printer.
//!
//! `parse_file` and `print_file` form the round trip the rewrite engine
//! works through. Printing a freshly parsed gofmt-formatted file yields the
//! same text, so only the statements a recipe touched show up in a diff.

mod align;
pub mod ast;
pub mod lexer;
mod parser;
mod printer;

use thiserror::Error;

pub use parser::parse_file;
pub use printer::print_file;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}
