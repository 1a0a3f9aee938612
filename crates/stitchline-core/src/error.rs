//! Error types for Stitchline Core.

use thiserror::Error;

use crate::delta::DeltaKind;

/// A remote document could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("document {id}: {message}")]
    Malformed { id: String, message: String },

    #[error("field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("invalid reference path: {0}")]
    InvalidReference(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl DecodeError {
    /// Attach the document id to a serde failure.
    pub fn malformed(id: &str, err: impl std::fmt::Display) -> Self {
        DecodeError::Malformed {
            id: id.to_string(),
            message: err.to_string(),
        }
    }
}

/// A typed value could not be turned into document fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not encode document fields: {0}")]
pub struct EncodeError(pub String);

/// The mirror received a delta that does not fit its current state.
///
/// This always means the local sequence is out of step with the remote
/// ordering; indices are never clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("{kind:?} delta index {index} out of range for mirror of length {len}")]
    IndexOutOfRange {
        kind: DeltaKind,
        index: usize,
        len: usize,
    },
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
