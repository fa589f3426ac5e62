//! Error types for node translation.

use std::fmt;

use thiserror::Error;

use crate::extract::Field;

/// Result type alias for node translation.
pub type Result<T> = std::result::Result<T, Error>;

/// A single field that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFailure {
    pub field: Field,
    /// The raw value as found on the node.
    pub value: String,
    pub reason: String,
}

impl FieldFailure {
    pub fn new(field: Field, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} {:?}: {}",
            self.field, self.value, self.reason
        )
    }
}

/// Errors returned by the node update processor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The event key is not a node resource key. No records are produced.
    #[error("incorrect key type - expecting resource of kind Node, got {kind}")]
    KeyMismatch { kind: String },

    /// The event value is not a node. No records are produced.
    #[error("incorrect value type - expecting resource of kind Node")]
    ValueMismatch,

    /// One or more fields failed to parse; the records were still produced.
    #[error("{} field(s) failed to parse: {}", .0.len(), join_failures(.0))]
    FieldParse(Vec<FieldFailure>),
}

impl Error {
    /// Whether the error aborted the translation entirely.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::FieldParse(_))
    }
}

fn join_failures(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
