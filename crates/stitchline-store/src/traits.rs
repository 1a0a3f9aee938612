//! Store traits: the abstract interfaces the sync core talks to.
//!
//! [`RemoteStore`] is the hosted document database holding the `Events` and
//! `UserEvents` collections. [`ProjectStore`] is the on-device project store,
//! an independent collaborator with no remote sync.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use stitchline_core::{DeltaBatch, Document, FieldFilter, Fields};

use crate::error::Result;
use crate::project::{NewProject, Project, ProjectId};

/// One message on a remote change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// Changes since the previous batch. The first batch of every feed
    /// carries the initial contents as additions, possibly none.
    Batch(DeltaBatch<Document>),
    /// The remote reported a delivery failure instead of a batch. The feed
    /// stays open.
    Error(String),
}

/// The remote document store.
///
/// There are no transactions: each method is one independent remote write
/// or read. Array updates are set-like and idempotent.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Document Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a document with a server-assigned id. Returns the id.
    async fn add_document(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Create or overwrite the document with the given id.
    async fn set_document(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Get a document by id.
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    /// All documents of a collection matching `filter`, ordered by id.
    async fn query(&self, collection: &str, filter: &FieldFilter) -> Result<Vec<Document>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Array Field Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append each value not already present in the array field.
    ///
    /// A missing field is treated as an empty array.
    async fn array_union(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()>;

    /// Remove every occurrence of each value from the array field.
    async fn array_remove(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        values: Vec<Value>,
    ) -> Result<()>;
}

/// The on-device project store.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Create a project and return it with its assigned id.
    async fn create(&self, project: NewProject) -> Result<Project>;

    /// Delete a project. Returns whether it existed.
    async fn delete(&self, id: ProjectId) -> Result<bool>;

    /// Flip the completion flag and return the updated project.
    async fn toggle_completion(&self, id: ProjectId) -> Result<Project>;

    /// All projects, ordered by name.
    async fn fetch_all(&self) -> Result<Vec<Project>>;

    /// Change notifications carrying the full ordered project list.
    ///
    /// The receiver starts out holding the current list.
    fn subscribe(&self) -> watch::Receiver<Arc<Vec<Project>>>;
}
