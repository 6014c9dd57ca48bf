//! Turns raw model output into a validated `RiskRecord`.
//!
//! ```text
//! accumulated text → parser (locate + complete) → repair → validation (defaults) → RiskRecord
//! ```
//!
//! Everything here is synchronous and pure; the network side lives in
//! `batch_analysis`.

pub mod types;
pub mod parser;
pub mod repair;
pub mod validation;

pub use types::*;
pub use parser::*;
pub use validation::*;

use thiserror::Error;

/// Maximum characters of candidate text kept in diagnostics.
pub const EXCERPT_CHARS: usize = 200;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuringError {
    #[error("No JSON object found in model response")]
    NotFound,

    #[error("Unrepairable JSON at line {line}, column {column}: {message}")]
    UnrepairableJson {
        /// Leading part of the candidate object text.
        excerpt: String,
        line: usize,
        column: usize,
        message: String,
    },
}

/// First `max_chars` characters of `s`, with "..." appended when cut.
pub fn excerpt(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
