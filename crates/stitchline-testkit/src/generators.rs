//! Proptest generators for property-based testing.
//!
//! The central piece is [`RemoteModel`], a plain vector standing in for the
//! remote ordering. Feeding it [`ScriptOp`]s yields the positional delta
//! batches a feed would deliver, so a mirror fed the same batches can be
//! checked against the model.

use proptest::prelude::*;
use serde_json::json;

use stitchline_core::{Delta, DeltaBatch, Document, Event, FromDocument};

use crate::fixtures::{event_fields, fields};

/// One remote-side change. Indices are raw and reduced modulo the current
/// length when applied, so any generated script is valid.
#[derive(Debug, Clone)]
pub enum ScriptOp {
    Insert { at: usize, name: String, malformed: bool },
    Update { from: usize, to: usize, name: String },
    Remove { at: usize },
}

/// The remote ordering a feed reports on.
#[derive(Debug, Clone, Default)]
pub struct RemoteModel {
    docs: Vec<Document>,
    next_id: u64,
}

impl RemoteModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply ops in order and return the batch describing them.
    pub fn apply(&mut self, ops: &[ScriptOp]) -> DeltaBatch<Document> {
        ops.iter().filter_map(|op| self.apply_one(op)).collect()
    }

    fn apply_one(&mut self, op: &ScriptOp) -> Option<Delta<Document>> {
        match op {
            ScriptOp::Insert {
                at,
                name,
                malformed,
            } => {
                let new_index = at % (self.docs.len() + 1);
                self.next_id += 1;
                let id = format!("evt-{:04}", self.next_id);
                let doc = if *malformed {
                    Document::new(id, fields(json!({ "name": 42 })))
                } else {
                    Document::new(id, event_fields(name))
                };
                self.docs.insert(new_index, doc.clone());
                Some(Delta::Added {
                    new_index,
                    entity: doc,
                })
            }
            ScriptOp::Update { from, to, name } => {
                if self.docs.is_empty() {
                    return None;
                }
                let old_index = from % self.docs.len();
                let mut doc = self.docs.remove(old_index);
                let new_index = to % (self.docs.len() + 1);
                doc.fields = event_fields(name);
                self.docs.insert(new_index, doc.clone());
                Some(Delta::Modified {
                    old_index,
                    new_index,
                    entity: doc,
                })
            }
            ScriptOp::Remove { at } => {
                if self.docs.is_empty() {
                    return None;
                }
                let old_index = at % self.docs.len();
                let doc = self.docs.remove(old_index);
                Some(Delta::Removed {
                    old_index,
                    entity: doc,
                })
            }
        }
    }

    /// Number of remote positions, decodable or not.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The events a correct mirror shows, in order.
    pub fn visible(&self) -> Vec<Event> {
        self.docs
            .iter()
            .filter_map(|doc| Event::from_document(doc).ok())
            .collect()
    }
}

/// Generate an event name.
pub fn event_name() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,8})?".prop_map(String::from)
}

/// Generate a single op. Inserts are weighted up so scripts grow.
pub fn script_op() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        4 => (any::<usize>(), event_name(), prop::bool::weighted(0.1)).prop_map(
            |(at, name, malformed)| ScriptOp::Insert { at, name, malformed }
        ),
        2 => (any::<usize>(), any::<usize>(), event_name())
            .prop_map(|(from, to, name)| ScriptOp::Update { from, to, name }),
        2 => any::<usize>().prop_map(|at| ScriptOp::Remove { at }),
    ]
}

/// Generate a script of batches, each a list of ops.
pub fn script(max_batches: usize, max_ops: usize) -> impl Strategy<Value = Vec<Vec<ScriptOp>>> {
    prop::collection::vec(prop::collection::vec(script_op(), 0..=max_ops), 1..=max_batches)
}
