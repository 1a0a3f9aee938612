//! # Stitchline Testkit
//!
//! Testing utilities for Stitchline.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Document builders, delta shorthands, a seeded in-memory
//!   remote and an observer that records what it is told
//! - **Generators**: Proptest strategies producing delta scripts, plus a
//!   reference model of the remote ordering to check mirrors against
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use stitchline_core::{Event, OrderedMirror};
//! use stitchline_testkit::generators::{script, RemoteModel};
//!
//! proptest! {
//!     #[test]
//!     fn mirror_follows_remote(batches in script(10, 5)) {
//!         let mut model = RemoteModel::new();
//!         let mut mirror = OrderedMirror::<Event>::new();
//!         for ops in &batches {
//!             mirror.apply_batch(model.apply(ops).decode()).unwrap();
//!         }
//!         prop_assert_eq!(mirror.snapshot().to_vec(), model.visible());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use stitchline_testkit::fixtures::{added, batch, event_doc};
//!
//! let initial = batch(vec![added(0, event_doc("e1", "Knit Night"))]);
//! assert_eq!(initial.len(), 1);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{RecordingObserver, TestSession};
pub use generators::{RemoteModel, ScriptOp};
