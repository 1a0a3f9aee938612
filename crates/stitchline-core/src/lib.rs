//! # Stitchline Core
//!
//! Pure primitives for Stitchline: events, relation records, change deltas,
//! and the ordered mirror that applies them.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over the documents a remote store hands out.
//!
//! ## Key Types
//!
//! - [`Event`] - A scheduled meetup mirrored from the `Events` collection
//! - [`RelationRecord`] - A user's set of event references (`UserEvents`)
//! - [`UserProfile`] - A user's sign-up names (`Users`)
//! - [`Delta`] / [`DeltaBatch`] - Positional changes delivered by a feed
//! - [`OrderedMirror`] - Applies deltas and publishes [`Snapshot`]s
//!
//! ## Decoding
//!
//! Documents are decoded with [`FromDocument`]. A document that fails to
//! decode keeps its position in the mirror as an opaque slot so that later
//! indices still line up with the remote ordering.

pub mod delta;
pub mod document;
pub mod error;
pub mod event;
pub mod mirror;
pub mod profile;
pub mod relation;
pub mod types;

pub use delta::{Decoded, Delta, DeltaBatch, DeltaKind};
pub use document::{
    to_fields, CollectionSelector, Document, FieldFilter, Fields, FromDocument, IntoFields,
};
pub use error::{DecodeError, EncodeError, MirrorError};
pub use event::{ArtType, Event, EventDraft, SkillLevel};
pub use mirror::{BatchOutcome, OrderedMirror, Skipped, Snapshot};
pub use profile::UserProfile;
pub use relation::RelationRecord;
pub use types::{
    EventId, RelationId, UserId, EVENTS_COLLECTION, USERS_COLLECTION, USER_EVENTS_COLLECTION,
};
