//! OrderedMirror: a local copy of a remotely ordered collection.
//!
//! The mirror applies feed deltas positionally and publishes an immutable
//! [`Snapshot`] after every committed batch. It never re-sorts: ordering is
//! whatever the remote feed's indices say it is.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::delta::{Decoded, Delta, DeltaBatch, DeltaKind};
use crate::error::{DecodeError, MirrorError, Result};
use crate::event::Event;
use crate::types::EventId;

/// An immutable, cheaply clonable point-in-time copy of a mirrored sequence.
pub struct Snapshot<T>(Arc<[T]>);

impl<T> Snapshot<T> {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Whether two snapshots share the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Snapshot<Event> {
    /// Find an event by id.
    pub fn find(&self, id: &EventId) -> Option<&Event> {
        self.0.iter().find(|e| e.id.as_ref() == Some(id))
    }

    /// Ids of the events, in order. Unsaved events are skipped.
    pub fn ids(&self) -> Vec<EventId> {
        self.0.iter().filter_map(|e| e.id.clone()).collect()
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for Snapshot<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl<T> From<Vec<T>> for Snapshot<T> {
    fn from(items: Vec<T>) -> Self {
        Self(Arc::from(items))
    }
}

impl<T> FromIterator<T> for Snapshot<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One position in the mirrored sequence.
#[derive(Debug, Clone, PartialEq)]
enum Slot<T> {
    Live(T),
    /// A document that failed to decode. Holds its position, never visible.
    Opaque(String),
}

impl<T> From<Decoded<T>> for Slot<T> {
    fn from(decoded: Decoded<T>) -> Self {
        match decoded {
            Decoded::Value(value) => Slot::Live(value),
            Decoded::Opaque { id, .. } => Slot::Opaque(id),
        }
    }
}

/// A document that was kept as an opaque slot during a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub id: String,
    pub error: DecodeError,
}

/// Result of committing a batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchOutcome {
    /// Number of deltas applied.
    pub applied: usize,
    /// Documents that could not be decoded.
    pub skipped: Vec<Skipped>,
}

/// The ordered local copy of a remote collection.
#[derive(Debug)]
pub struct OrderedMirror<T> {
    slots: Vec<Slot<T>>,
    snapshot: Snapshot<T>,
    batches: u64,
}

impl<T: Clone> OrderedMirror<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            snapshot: Snapshot::empty(),
            batches: 0,
        }
    }

    /// The snapshot published by the last committed batch.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.clone()
    }

    /// Number of visible entities.
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Number of positions, including opaque ones. This is the length the
    /// remote indices refer to.
    pub fn positions(&self) -> usize {
        self.slots.len()
    }

    /// Number of batches committed since creation or the last clear.
    pub fn batches_applied(&self) -> u64 {
        self.batches
    }

    /// Discard all contents.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.snapshot = Snapshot::empty();
        self.batches = 0;
    }

    /// Apply a single delta as a batch of one.
    pub fn apply(&mut self, delta: Delta<Decoded<T>>) -> Result<BatchOutcome> {
        self.apply_batch(DeltaBatch::new(vec![delta]))
    }

    /// Apply a batch in order and publish a new snapshot.
    ///
    /// Every index is checked before anything is touched, so a batch that
    /// fails leaves the mirror exactly as it was.
    pub fn apply_batch(&mut self, batch: DeltaBatch<Decoded<T>>) -> Result<BatchOutcome> {
        validate(self.slots.len(), &batch)?;

        let mut outcome = BatchOutcome::default();
        for delta in batch {
            if let Decoded::Opaque { id, error } = delta.entity() {
                if delta.kind() != DeltaKind::Removed {
                    outcome.skipped.push(Skipped {
                        id: id.clone(),
                        error: error.clone(),
                    });
                }
            }

            match delta {
                Delta::Added { new_index, entity } => {
                    self.slots.insert(new_index, entity.into());
                }
                Delta::Modified {
                    old_index,
                    new_index,
                    entity,
                } => {
                    self.slots.remove(old_index);
                    self.slots.insert(new_index, entity.into());
                }
                Delta::Removed { old_index, .. } => {
                    self.slots.remove(old_index);
                }
            }
            outcome.applied += 1;
        }

        self.snapshot = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Live(value) => Some(value.clone()),
                Slot::Opaque(_) => None,
            })
            .collect();
        self.batches += 1;

        Ok(outcome)
    }
}

impl<T: Clone> Default for OrderedMirror<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the batch tracking only the length, which is all index validity
/// depends on.
fn validate<T>(mut len: usize, batch: &DeltaBatch<T>) -> Result<()> {
    let out_of_range = |kind, index, len| MirrorError::IndexOutOfRange { kind, index, len };

    for delta in batch.iter() {
        match *delta {
            Delta::Added { new_index, .. } => {
                if new_index > len {
                    return Err(out_of_range(DeltaKind::Added, new_index, len));
                }
                len += 1;
            }
            Delta::Modified {
                old_index,
                new_index,
                ..
            } => {
                if old_index >= len {
                    return Err(out_of_range(DeltaKind::Modified, old_index, len));
                }
                if new_index >= len {
                    return Err(out_of_range(DeltaKind::Modified, new_index, len - 1));
                }
            }
            Delta::Removed { old_index, .. } => {
                if old_index >= len {
                    return Err(out_of_range(DeltaKind::Removed, old_index, len));
                }
                len -= 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> Event {
        Event {
            id: Some(EventId::new(id)),
            name: id.to_string(),
            ..Event::default()
        }
    }

    fn added(index: usize, id: &str) -> Delta<Decoded<Event>> {
        Delta::Added {
            new_index: index,
            entity: Decoded::Value(event(id)),
        }
    }

    fn modified(old: usize, new: usize, id: &str) -> Delta<Decoded<Event>> {
        Delta::Modified {
            old_index: old,
            new_index: new,
            entity: Decoded::Value(event(id)),
        }
    }

    fn removed(index: usize, id: &str) -> Delta<Decoded<Event>> {
        Delta::Removed {
            old_index: index,
            entity: Decoded::Value(event(id)),
        }
    }

    fn names(mirror: &OrderedMirror<Event>) -> Vec<String> {
        mirror.snapshot().iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn test_added_then_reordering_modification() {
        let mut mirror = OrderedMirror::new();
        mirror
            .apply_batch(DeltaBatch::new(vec![added(0, "a"), added(1, "b")]))
            .unwrap();
        assert_eq!(names(&mirror), ["a", "b"]);

        mirror.apply(modified(0, 1, "a")).unwrap();
        assert_eq!(names(&mirror), ["b", "a"]);
    }

    #[test]
    fn test_modification_depends_on_prior_addition_in_batch() {
        let mut mirror = OrderedMirror::new();
        let batch = DeltaBatch::new(vec![added(0, "a"), modified(0, 0, "a"), added(0, "z")]);
        mirror.apply_batch(batch).unwrap();
        assert_eq!(names(&mirror), ["z", "a"]);
    }

    #[test]
    fn test_removed() {
        let mut mirror = OrderedMirror::new();
        mirror
            .apply_batch(DeltaBatch::new(vec![added(0, "a"), added(1, "b"), added(2, "c")]))
            .unwrap();
        mirror.apply(removed(1, "b")).unwrap();
        assert_eq!(names(&mirror), ["a", "c"]);
    }

    #[test]
    fn test_out_of_range_fails_without_mutation() {
        let mut mirror = OrderedMirror::new();
        mirror.apply(added(0, "a")).unwrap();
        let before = mirror.snapshot();

        let err = mirror
            .apply_batch(DeltaBatch::new(vec![added(1, "b"), removed(5, "x")]))
            .unwrap_err();
        assert_eq!(
            err,
            MirrorError::IndexOutOfRange {
                kind: DeltaKind::Removed,
                index: 5,
                len: 2
            }
        );
        assert_eq!(mirror.snapshot(), before);
        assert_eq!(mirror.batches_applied(), 1);
    }

    #[test]
    fn test_added_past_end_is_rejected() {
        let mut mirror: OrderedMirror<Event> = OrderedMirror::new();
        assert!(mirror.apply(added(1, "a")).is_err());
        assert!(mirror.is_empty());
    }

    #[test]
    fn test_modified_target_past_end_is_rejected() {
        let mut mirror = OrderedMirror::new();
        mirror.apply(added(0, "a")).unwrap();
        assert!(mirror.apply(modified(0, 1, "a")).is_err());
    }

    #[test]
    fn test_opaque_slot_keeps_positions_aligned() {
        let mut mirror = OrderedMirror::new();
        let opaque = Delta::Added {
            new_index: 1,
            entity: Decoded::Opaque {
                id: "broken".into(),
                error: DecodeError::MissingField("name"),
            },
        };
        let outcome = mirror
            .apply_batch(DeltaBatch::new(vec![added(0, "a"), opaque, added(2, "c")]))
            .unwrap();

        assert_eq!(outcome.applied, 3);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(names(&mirror), ["a", "c"]);
        assert_eq!(mirror.positions(), 3);

        // Index 2 still refers to "c" on the remote side.
        mirror.apply(removed(2, "c")).unwrap();
        assert_eq!(names(&mirror), ["a"]);
    }

    #[test]
    fn test_snapshot_is_immutable_after_later_batches() {
        let mut mirror = OrderedMirror::new();
        mirror.apply(added(0, "a")).unwrap();
        let held = mirror.snapshot();
        mirror.apply(added(1, "b")).unwrap();

        assert_eq!(held.len(), 1);
        assert_eq!(mirror.len(), 2);
        assert!(!held.ptr_eq(&mirror.snapshot()));
    }

    #[test]
    fn test_clear() {
        let mut mirror = OrderedMirror::new();
        mirror.apply(added(0, "a")).unwrap();
        mirror.clear();
        assert!(mirror.is_empty());
        assert_eq!(mirror.positions(), 0);
        assert_eq!(mirror.batches_applied(), 0);
    }

    #[test]
    fn test_snapshot_find() {
        let snapshot: Snapshot<Event> = vec![event("a"), event("b")].into();
        assert_eq!(snapshot.find(&EventId::new("b")).map(|e| e.name.as_str()), Some("b"));
        assert!(snapshot.find(&EventId::new("c")).is_none());
        assert_eq!(snapshot.ids(), vec![EventId::new("a"), EventId::new("b")]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_rejected_batch_leaves_mirror_untouched(
                seeded in 0usize..6,
                valid_prefix in 0usize..4,
                overshoot in 0usize..10,
            ) {
                let mut mirror = OrderedMirror::new();
                let seed: Vec<_> = (0..seeded).map(|i| added(i, &format!("s{}", i))).collect();
                mirror.apply_batch(DeltaBatch::new(seed)).unwrap();
                let before = mirror.snapshot();

                // Appends that would succeed, then a removal past the end.
                let mut deltas: Vec<_> = (0..valid_prefix)
                    .map(|i| added(seeded + i, &format!("n{}", i)))
                    .collect();
                let len = seeded + valid_prefix;
                deltas.push(removed(len + overshoot, "x"));

                prop_assert!(mirror.apply_batch(DeltaBatch::new(deltas)).is_err());
                prop_assert_eq!(mirror.snapshot(), before);
                prop_assert_eq!(mirror.positions(), seeded);
            }
        }
    }
}
