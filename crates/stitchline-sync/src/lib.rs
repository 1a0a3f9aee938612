//! # Stitchline Sync
//!
//! Live mirroring plumbing: change feed subscriptions, the observer
//! registry, and relation record maintenance.
//!
//! ## Overview
//!
//! - [`ChangeFeedClient`] opens feeds over a [`FeedTransport`] and hands each
//!   delivery to a callback, tagged with the subscription's [`Generation`]
//! - [`ListenerRegistry`] multicasts snapshots to [`Observer`]s filtered by
//!   [`Interest`]
//! - [`RelationStore`] finds, creates and edits per-user relation records
//! - [`ProfileStore`] reads and writes user profiles
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stitchline_core::CollectionSelector;
//! use stitchline_store::MemoryRemote;
//! use stitchline_sync::ChangeFeedClient;
//!
//! async fn example() {
//!     let remote = Arc::new(MemoryRemote::new());
//!     let client = ChangeFeedClient::new(remote);
//!
//!     let mut subscription = client
//!         .subscribe(CollectionSelector::collection("Events"), |delivery| {
//!             println!("{:?}", delivery.payload);
//!         })
//!         .await
//!         .unwrap();
//!
//!     // No callback runs after this returns.
//!     subscription.unsubscribe();
//! }
//! ```
//!
//! ## Delivery Guarantees
//!
//! - Batches reach the callback in transport order
//! - `unsubscribe` is idempotent and final
//! - Observers are held weakly; a dropped observer is never called

pub mod error;
pub mod feed;
pub mod profile;
pub mod registry;
pub mod relation;
pub mod transport;

pub use error::{Result, SyncError};
pub use feed::{ChangeFeedClient, FeedDelivery, FeedError, FeedPayload, Generation, Subscription};
pub use profile::ProfileStore;
pub use registry::{Interest, ListenerId, ListenerRegistry, Notification, Observer, SessionFault};
pub use relation::RelationStore;
pub use transport::scripted::ScriptedTransport;
pub use transport::{FeedStream, FeedTransport};
