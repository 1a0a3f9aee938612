//! Relation records on the remote: lookup, lazy creation, membership edits.

use std::sync::Arc;

use serde_json::Value;

use stitchline_core::relation::{MEMBERS_FIELD, OWNER_FIELD};
use stitchline_core::{
    Event, EventId, FieldFilter, FromDocument, IntoFields, RelationId, RelationRecord, Snapshot,
    UserId, USER_EVENTS_COLLECTION,
};
use stitchline_store::RemoteStore;

use crate::error::Result;

/// Reads and writes relation records in one remote collection.
///
/// There is meant to be at most one record per user, but nothing on the
/// remote enforces it. Reads take the first match and warn about the rest.
#[derive(Clone)]
pub struct RelationStore {
    remote: Arc<dyn RemoteStore>,
    collection: String,
}

impl RelationStore {
    /// A store over the default `UserEvents` collection.
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self::with_collection(remote, USER_EVENTS_COLLECTION)
    }

    pub fn with_collection(remote: Arc<dyn RemoteStore>, collection: impl Into<String>) -> Self {
        Self {
            remote,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The user's relation record, if one exists.
    pub async fn find(&self, user: &UserId) -> Result<Option<RelationRecord>> {
        let filter = FieldFilter::eq(OWNER_FIELD, user.as_str());
        let mut docs = self.remote.query(&self.collection, &filter).await?;

        if docs.len() > 1 {
            tracing::warn!(
                user = %user,
                count = docs.len(),
                "multiple relation records for user; using the first"
            );
        }
        if docs.is_empty() {
            return Ok(None);
        }
        let doc = docs.swap_remove(0);
        Ok(Some(RelationRecord::from_document(&doc)?))
    }

    /// The user's relation record, creating an empty one if none exists.
    ///
    /// Lookup and creation are separate remote calls. Two callers racing on
    /// a user with no record can both create one.
    pub async fn find_or_create(&self, user: &UserId) -> Result<RelationRecord> {
        if let Some(record) = self.find(user).await? {
            return Ok(record);
        }

        let record = RelationRecord::empty(RelationId::default(), user.clone());
        let id = self
            .remote
            .add_document(&self.collection, record.into_fields()?)
            .await?;
        tracing::debug!(user = %user, relation = %id, "created relation record");
        Ok(RelationRecord::empty(RelationId::new(id), user.clone()))
    }

    /// Add `event` to the record's set. Adding a present member is a no-op.
    pub async fn add_member(&self, record: &RelationRecord, event: &EventId) -> Result<()> {
        self.remote
            .array_union(
                &self.collection,
                record.id.as_str(),
                MEMBERS_FIELD,
                vec![Value::String(event.to_ref_path())],
            )
            .await?;
        Ok(())
    }

    /// Remove `event` from the record's set. Removing an absent member is a
    /// no-op.
    pub async fn remove_member(&self, record: &RelationRecord, event: &EventId) -> Result<()> {
        self.remote
            .array_remove(
                &self.collection,
                record.id.as_str(),
                MEMBERS_FIELD,
                vec![Value::String(event.to_ref_path())],
            )
            .await?;
        Ok(())
    }

    /// Delete the relation document.
    pub async fn delete(&self, record: &RelationRecord) -> Result<()> {
        self.remote
            .delete_document(&self.collection, record.id.as_str())
            .await?;
        Ok(())
    }

    /// Resolve the record's references against an events snapshot.
    pub fn resolve(record: &RelationRecord, events: &Snapshot<Event>) -> Snapshot<Event> {
        record.resolve(events)
    }
}
