//! Deltas: typed change records delivered by a change feed.
//!
//! Indices are positions in the ordered sequence as it stood immediately
//! before the delta. Within a batch, each delta is relative to the state left
//! by the previous one.

use serde::{Deserialize, Serialize};

use crate::document::{Document, FromDocument};
use crate::error::DecodeError;

/// Discriminator for a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    Added,
    Modified,
    Removed,
}

/// A single change to an ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delta<T> {
    /// `entity` now sits at `new_index`.
    Added { new_index: usize, entity: T },
    /// The element at `old_index` changed and now sits at `new_index`.
    Modified {
        old_index: usize,
        new_index: usize,
        entity: T,
    },
    /// The element at `old_index` is gone. `entity` is its last known value.
    Removed { old_index: usize, entity: T },
}

impl<T> Delta<T> {
    pub fn kind(&self) -> DeltaKind {
        match self {
            Delta::Added { .. } => DeltaKind::Added,
            Delta::Modified { .. } => DeltaKind::Modified,
            Delta::Removed { .. } => DeltaKind::Removed,
        }
    }

    pub fn entity(&self) -> &T {
        match self {
            Delta::Added { entity, .. }
            | Delta::Modified { entity, .. }
            | Delta::Removed { entity, .. } => entity,
        }
    }

    pub fn old_index(&self) -> Option<usize> {
        match self {
            Delta::Added { .. } => None,
            Delta::Modified { old_index, .. } | Delta::Removed { old_index, .. } => {
                Some(*old_index)
            }
        }
    }

    pub fn new_index(&self) -> Option<usize> {
        match self {
            Delta::Added { new_index, .. } | Delta::Modified { new_index, .. } => Some(*new_index),
            Delta::Removed { .. } => None,
        }
    }

    /// Transform the entity, keeping positions.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Delta<U> {
        match self {
            Delta::Added { new_index, entity } => Delta::Added {
                new_index,
                entity: f(entity),
            },
            Delta::Modified {
                old_index,
                new_index,
                entity,
            } => Delta::Modified {
                old_index,
                new_index,
                entity: f(entity),
            },
            Delta::Removed { old_index, entity } => Delta::Removed {
                old_index,
                entity: f(entity),
            },
        }
    }
}

/// An ordered batch of deltas, applied as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaBatch<T> {
    pub deltas: Vec<Delta<T>>,
}

// Derived `Default` would require `T: Default`.
impl<T> Default for DeltaBatch<T> {
    fn default() -> Self {
        Self { deltas: Vec::new() }
    }
}

impl<T> DeltaBatch<T> {
    pub fn new(deltas: Vec<Delta<T>>) -> Self {
        Self { deltas }
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delta<T>> {
        self.deltas.iter()
    }
}

impl<T> FromIterator<Delta<T>> for DeltaBatch<T> {
    fn from_iter<I: IntoIterator<Item = Delta<T>>>(iter: I) -> Self {
        Self {
            deltas: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for DeltaBatch<T> {
    type Item = Delta<T>;
    type IntoIter = std::vec::IntoIter<Delta<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.into_iter()
    }
}

/// Outcome of decoding one document of a batch.
///
/// A document that fails to decode still occupies its position in the
/// remote ordering, so it is kept as an opaque entry rather than dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Value(T),
    Opaque { id: String, error: DecodeError },
}

impl DeltaBatch<Document> {
    /// Decode every entity of the batch.
    ///
    /// Removals never fail: the removed entity is not needed to apply them.
    pub fn decode<T: FromDocument>(self) -> DeltaBatch<Decoded<T>> {
        self.deltas
            .into_iter()
            .map(|delta| {
                delta.map(|doc| match T::from_document(&doc) {
                    Ok(value) => Decoded::Value(value),
                    Err(error) => Decoded::Opaque { id: doc.id, error },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use serde_json::{json, Value};

    fn doc(id: &str, value: Value) -> Document {
        match value {
            Value::Object(fields) => Document::new(id, fields),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_accessors() {
        let d = Delta::Modified {
            old_index: 0,
            new_index: 2,
            entity: "a",
        };
        assert_eq!(d.kind(), DeltaKind::Modified);
        assert_eq!(d.old_index(), Some(0));
        assert_eq!(d.new_index(), Some(2));

        let r = Delta::Removed {
            old_index: 1,
            entity: "b",
        };
        assert_eq!(r.new_index(), None);
        assert_eq!(*r.entity(), "b");
    }

    #[test]
    fn test_decode_keeps_malformed_documents_in_place() {
        let batch = DeltaBatch::new(vec![
            Delta::Added {
                new_index: 0,
                entity: doc("good", json!({"name": "ok"})),
            },
            Delta::Added {
                new_index: 1,
                entity: doc("bad", json!({"skillLevel": 99})),
            },
        ]);

        let decoded = batch.decode::<Event>();
        assert_eq!(decoded.len(), 2);
        assert!(matches!(decoded.deltas[0].entity(), Decoded::Value(e) if e.name == "ok"));
        assert!(matches!(decoded.deltas[1].entity(), Decoded::Opaque { id, .. } if id == "bad"));
        assert_eq!(decoded.deltas[1].new_index(), Some(1));
    }

    #[test]
    fn test_default_batch_of_documents_is_empty() {
        let batch: DeltaBatch<Document> = DeltaBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.decode::<Event>().len(), 0);
    }
}
