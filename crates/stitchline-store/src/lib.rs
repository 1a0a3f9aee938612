//! # Stitchline Store
//!
//! Storage interfaces for Stitchline, with in-memory and SQLite
//! implementations.
//!
//! ## Overview
//!
//! Two independent stores sit behind async traits:
//!
//! - [`RemoteStore`] - the hosted document database holding events and
//!   per-user relation records. [`MemoryRemote`] implements it in memory and
//!   adds the positional change feeds the sync layer consumes.
//! - [`ProjectStore`] - the on-device project list. [`SqliteProjectStore`]
//!   persists it, [`MemoryProjectStore`] is for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stitchline_core::CollectionSelector;
//! use stitchline_store::{MemoryRemote, RemoteStore};
//!
//! async fn example() {
//!     let remote = MemoryRemote::new();
//!     let mut feed = remote.listen(CollectionSelector::collection("Events")).unwrap();
//!
//!     let id = remote.add_document("Events", Default::default()).await.unwrap();
//!     // `feed` now holds the initial (empty) batch, then one addition.
//!     # let _ = (id, feed.recv().await);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No transactions**: every remote call is one independent write
//! - **Set-like arrays**: `array_union`/`array_remove` are idempotent
//! - **Feeds are positional**: indices refer to the listener's ordered view

pub mod error;
pub mod memory;
pub mod migration;
pub mod project;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryProjectStore, MemoryRemote};
pub use project::{NewProject, Project, ProjectId, NOT_SPECIFIED};
pub use sqlite::SqliteProjectStore;
pub use traits::{FeedMessage, ProjectStore, RemoteStore};
