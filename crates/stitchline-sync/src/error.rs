//! Error types for the sync module.

use thiserror::Error;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote store operation failed.
    #[error("store error: {0}")]
    StoreError(#[from] stitchline_store::StoreError),

    /// A document read back from the remote could not be decoded.
    #[error("decode error: {0}")]
    DecodeError(#[from] stitchline_core::DecodeError),

    /// A value could not be encoded for writing.
    #[error("encode error: {0}")]
    EncodeError(#[from] stitchline_core::EncodeError),

    /// The feed transport could not open or keep a stream.
    #[error("transport error: {0}")]
    TransportError(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
