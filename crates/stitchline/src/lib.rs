//! # Stitchline
//!
//! Live mirroring of a remote craft-event catalogue, with per-user
//! memberships and multicast change notification.
//!
//! ## Overview
//!
//! A [`SyncController`] keeps an ordered local mirror of the `Events`
//! collection in step with the remote change feed, follows the signed-in
//! user's relation record in `UserEvents`, and notifies registered
//! [`Observer`]s whenever either changes.
//!
//! - **Mirror**: positional deltas applied in delivery order; a delta that
//!   does not fit ends the session instead of corrupting it
//! - **Membership**: the user's relation record resolved against the mirror
//! - **Observers**: weakly held, filtered by [`Interest`], and handed the
//!   latest snapshot as soon as they register
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stitchline::{ControllerConfig, Interest, Observer, SessionState, StaticAuth, SyncController};
//! use stitchline::core::{Event, Snapshot};
//! use stitchline::store::MemoryRemote;
//!
//! struct Printer;
//!
//! impl Observer for Printer {
//!     fn on_events_change(&self, events: &Snapshot<Event>) {
//!         println!("{} events", events.len());
//!     }
//! }
//!
//! async fn example() {
//!     let remote = Arc::new(MemoryRemote::new());
//!     let controller = SyncController::in_memory(remote, ControllerConfig::default()).unwrap();
//!
//!     let printer = Arc::new(Printer);
//!     controller.add_listener(printer.clone(), Interest::Events).await.unwrap();
//!
//!     controller.start(&StaticAuth::signed_in("user-1")).await.unwrap();
//!     controller.wait_for_state(SessionState::Connected).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `stitchline::core` - Events, deltas, the ordered mirror
//! - `stitchline::store` - Remote and project store traits and backends
//! - `stitchline::sync` - Change feeds, observer registry, relation store

pub mod auth;
pub mod controller;
pub mod error;

// Re-export component crates
pub use stitchline_core as core;
pub use stitchline_store as store;
pub use stitchline_sync as sync;

// Re-export main types for convenience
pub use auth::{AuthProvider, StaticAuth};
pub use controller::{ControllerConfig, SessionState, SyncController};
pub use error::{ControllerError, Result};

pub use stitchline_core::{
    ArtType, Event, EventDraft, EventId, SkillLevel, Snapshot, UserId, UserProfile,
};
pub use stitchline_sync::{Interest, ListenerId, Observer, SessionFault};
