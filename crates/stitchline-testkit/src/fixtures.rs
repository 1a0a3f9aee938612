//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: document builders, delta
//! shorthands, a seeded in-memory remote and a recording observer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{json, Value};

use stitchline_core::{
    Delta, DeltaBatch, Document, Event, EventId, Fields, RelationId, Snapshot, UserId,
    EVENTS_COLLECTION, USER_EVENTS_COLLECTION,
};
use stitchline_store::{MemoryRemote, RemoteStore, Result as StoreResult};
use stitchline_sync::{Observer, SessionFault};

/// How long the `wait_*` helpers wait before giving up.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a JSON object literal into document fields.
///
/// Anything other than an object yields empty fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(fields) => fields,
        _ => Fields::new(),
    }
}

/// Fields of a minimal valid event.
pub fn event_fields(name: &str) -> Fields {
    fields(json!({
        "name": name,
        "about": format!("{} meetup", name),
        "address": "12 Wool St",
        "artType": 1,
        "skillLevel": 0,
        "capacity": 8,
    }))
}

/// An event document with the given id.
pub fn event_doc(id: &str, name: &str) -> Document {
    Document::new(id, event_fields(name))
}

/// A relation record document owned by `user` referencing `events`.
pub fn relation_doc(id: &str, user: &str, events: &[&str]) -> Document {
    let refs: Vec<Value> = events
        .iter()
        .map(|e| Value::String(EventId::new(*e).to_ref_path()))
        .collect();
    Document::new(id, fields(json!({ "userId": user, "events": refs })))
}

pub fn added(new_index: usize, entity: Document) -> Delta<Document> {
    Delta::Added { new_index, entity }
}

pub fn modified(old_index: usize, new_index: usize, entity: Document) -> Delta<Document> {
    Delta::Modified {
        old_index,
        new_index,
        entity,
    }
}

pub fn removed(old_index: usize, entity: Document) -> Delta<Document> {
    Delta::Removed { old_index, entity }
}

pub fn batch(deltas: Vec<Delta<Document>>) -> DeltaBatch<Document> {
    DeltaBatch::new(deltas)
}

/// Names of a snapshot's events, in order.
pub fn names(events: &Snapshot<Event>) -> Vec<String> {
    events.iter().map(|e| e.name.clone()).collect()
}

/// An in-memory remote with helpers for seeding it.
pub struct TestSession {
    pub remote: Arc<MemoryRemote>,
}

impl TestSession {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(MemoryRemote::new()),
        }
    }

    /// Store an event under a fixed id.
    pub async fn seed_event(&self, id: &str, name: &str) -> StoreResult<EventId> {
        self.remote
            .set_document(EVENTS_COLLECTION, id, event_fields(name))
            .await?;
        Ok(EventId::new(id))
    }

    /// Store a relation record under a fixed id.
    pub async fn seed_relation(
        &self,
        id: &str,
        user: &str,
        events: &[&str],
    ) -> StoreResult<RelationId> {
        let doc = relation_doc(id, user, events);
        self.remote
            .set_document(USER_EVENTS_COLLECTION, id, doc.fields)
            .await?;
        Ok(RelationId::new(id))
    }

    /// The stored relation record ids of `user`.
    pub async fn relation_ids(&self, user: &UserId) -> StoreResult<Vec<String>> {
        let filter = stitchline_core::FieldFilter::eq("userId", user.as_str());
        let docs = self.remote.query(USER_EVENTS_COLLECTION, &filter).await?;
        Ok(docs.into_iter().map(|d| d.id).collect())
    }
}

impl Default for TestSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<Snapshot<Event>>,
    memberships: Vec<Snapshot<Event>>,
    faults: Vec<SessionFault>,
}

/// An observer that records every callback.
#[derive(Default)]
pub struct RecordingObserver {
    recorded: Mutex<Recorded>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of events notifications received.
    pub fn events_calls(&self) -> usize {
        self.lock().events.len()
    }

    pub fn last_events(&self) -> Option<Snapshot<Event>> {
        self.lock().events.last().cloned()
    }

    /// Number of membership notifications received.
    pub fn membership_calls(&self) -> usize {
        self.lock().memberships.len()
    }

    pub fn last_membership(&self) -> Option<Snapshot<Event>> {
        self.lock().memberships.last().cloned()
    }

    pub fn faults(&self) -> Vec<SessionFault> {
        self.lock().faults.clone()
    }

    /// Wait until the latest events snapshot satisfies `pred`.
    ///
    /// Panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for_events(&self, pred: impl Fn(&Snapshot<Event>) -> bool) -> Snapshot<Event> {
        self.wait_for(|r| r.events.last().filter(|s| pred(s)).cloned())
            .await
    }

    /// Wait until the latest membership snapshot satisfies `pred`.
    ///
    /// Panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for_membership(
        &self,
        pred: impl Fn(&Snapshot<Event>) -> bool,
    ) -> Snapshot<Event> {
        self.wait_for(|r| r.memberships.last().filter(|s| pred(s)).cloned())
            .await
    }

    /// Wait until at least one fault was reported.
    ///
    /// Panics after [`WAIT_TIMEOUT`].
    pub async fn wait_for_fault(&self) -> SessionFault {
        self.wait_for(|r| r.faults.first().cloned()).await
    }

    async fn wait_for<T>(&self, check: impl Fn(&Recorded) -> Option<T>) -> T {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            if let Some(found) = check(&self.lock()) {
                return found;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("condition not reached within {:?}", WAIT_TIMEOUT);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Observer for RecordingObserver {
    fn on_events_change(&self, events: &Snapshot<Event>) {
        self.lock().events.push(events.clone());
    }

    fn on_membership_change(&self, memberships: &Snapshot<Event>) {
        self.lock().memberships.push(memberships.clone());
    }

    fn on_session_fault(&self, fault: &SessionFault) {
        self.lock().faults.push(fault.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitchline_core::{FromDocument, RelationRecord};

    #[test]
    fn test_event_doc_decodes() {
        let event = Event::from_document(&event_doc("e1", "Knit Night")).unwrap();
        assert_eq!(event.name, "Knit Night");
        assert_eq!(event.id, Some(EventId::new("e1")));
    }

    #[test]
    fn test_relation_doc_decodes() {
        let record = RelationRecord::from_document(&relation_doc("r1", "u1", &["e1", "e2"])).unwrap();
        assert_eq!(record.owner, UserId::new("u1"));
        assert_eq!(record.len(), 2);
    }

    #[tokio::test]
    async fn test_session_seeding() {
        let session = TestSession::new();
        session.seed_event("e1", "Knit Night").await.unwrap();
        session.seed_relation("r1", "u1", &["e1"]).await.unwrap();

        assert_eq!(session.remote.document_count(EVENTS_COLLECTION), 1);
        assert_eq!(
            session.relation_ids(&UserId::new("u1")).await.unwrap(),
            vec!["r1".to_string()]
        );
    }
}
