//! Error types for the controller.

use stitchline_core::EncodeError;
use stitchline_store::StoreError;
use stitchline_sync::SyncError;
use thiserror::Error;

/// Errors that can occur during controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The controller's backing task could not be started.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Remote store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Feed or relation error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// A value could not be encoded for writing.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The operation needs a signed-in user and the session has none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The operation needs a running session.
    #[error("no active session")]
    NotConnected,

    /// The session was torn down before the operation finished.
    #[error("operation cancelled by session teardown")]
    Cancelled,

    /// The controller has shut down.
    #[error("controller has shut down")]
    Shutdown,
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;
