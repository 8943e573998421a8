//! kubefzf completion: argument parsing, candidate generation, selector
//! formatting and resolution of the picked line.

#![forbid(unsafe_code)]

use serde::Serialize;

pub mod format;
pub mod generate;
pub mod parse;
pub mod resolve;

pub use format::format_output;
pub use generate::{generate, render_age};
pub use parse::{parse_args, ParsedArgs, Target};
pub use resolve::{resolve, ResolveError};

/// One row offered to the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Token this row stands for (object name, label, namespace...).
    pub value: String,
    pub namespace: Option<String>,
    /// Display cells, aligned with `CompletionResultSet::header`.
    pub cells: Vec<String>,
}

/// Ordered candidates plus what the selector needs to show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionResultSet {
    pub target: Target,
    /// Cache key the candidates came from, if any.
    pub kind: Option<String>,
    pub header: Vec<String>,
    pub candidates: Vec<Candidate>,
    /// The in-progress token, without any `--flag=` prefix.
    pub query: String,
}

impl CompletionResultSet {
    pub fn is_empty(&self) -> bool { self.candidates.is_empty() }
    pub fn len(&self) -> usize { self.candidates.len() }
}
