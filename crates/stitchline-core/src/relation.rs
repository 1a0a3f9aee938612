//! Relation records: the per-user set of event references.
//!
//! A relation record lives in a different remote collection than the events
//! it points at, and the two are updated independently. A reference may
//! therefore point at an event the local mirror has not seen yet, or one that
//! has already been removed. Both are expected; [`RelationRecord::resolve`]
//! simply leaves such references out. Entries that are not event reference
//! paths at all are dropped when the record is decoded.

use serde_json::Value;

use crate::document::{Document, Fields, FromDocument, IntoFields};
use crate::error::{DecodeError, EncodeError};
use crate::event::Event;
use crate::mirror::Snapshot;
use crate::types::{EventId, RelationId, UserId};

/// Field holding the owner id.
pub const OWNER_FIELD: &str = "userId";

/// Field holding the array of event reference paths.
pub const MEMBERS_FIELD: &str = "events";

/// A user's membership document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRecord {
    pub id: RelationId,
    pub owner: UserId,
    events: Vec<EventId>,
}

impl RelationRecord {
    /// A record with an empty membership set.
    pub fn empty(id: RelationId, owner: UserId) -> Self {
        Self {
            id,
            owner,
            events: Vec::new(),
        }
    }

    /// Referenced event ids, in stored order and without duplicates.
    pub fn members(&self) -> &[EventId] {
        &self.events
    }

    pub fn contains(&self, event: &EventId) -> bool {
        self.events.contains(event)
    }

    /// Number of stored references (not the resolved count).
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Set-union with a single reference. Returns whether the set changed.
    pub fn insert(&mut self, event: EventId) -> bool {
        if self.contains(&event) {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Set-difference with a single reference. Returns whether the set changed.
    pub fn remove(&mut self, event: &EventId) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e != event);
        self.events.len() != before
    }

    /// Resolve references against a mirror snapshot.
    ///
    /// References with no matching event are skipped, so the result may be
    /// shorter than [`RelationRecord::len`].
    pub fn resolve(&self, events: &Snapshot<Event>) -> Snapshot<Event> {
        self.events
            .iter()
            .filter_map(|id| events.iter().find(|e| e.id.as_ref() == Some(id)).cloned())
            .collect()
    }
}

impl FromDocument for RelationRecord {
    fn from_document(doc: &Document) -> Result<Self, DecodeError> {
        let owner = match doc.get(OWNER_FIELD) {
            Some(Value::String(owner)) => UserId::new(owner.clone()),
            Some(other) => {
                return Err(DecodeError::malformed(
                    &doc.id,
                    format!("userId must be a string, got {}", other),
                ))
            }
            None => return Err(DecodeError::MissingField(OWNER_FIELD)),
        };

        let mut record = RelationRecord::empty(RelationId::new(doc.id.clone()), owner);
        match doc.get(MEMBERS_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::Array(refs)) => {
                // Unparseable entries are skipped like dangling ones.
                let members = refs
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|path| EventId::from_ref_path(path).ok());
                for event in members {
                    record.insert(event);
                }
            }
            Some(other) => {
                return Err(DecodeError::malformed(
                    &doc.id,
                    format!("events must be an array, got {}", other),
                ))
            }
        }
        Ok(record)
    }
}

impl IntoFields for RelationRecord {
    fn into_fields(&self) -> Result<Fields, EncodeError> {
        let mut fields = Fields::new();
        fields.insert(OWNER_FIELD.into(), Value::String(self.owner.to_string()));
        fields.insert(
            MEMBERS_FIELD.into(),
            Value::Array(
                self.events
                    .iter()
                    .map(|e| Value::String(e.to_ref_path()))
                    .collect(),
            ),
        );
        Ok(fields)
    }
}
