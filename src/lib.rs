//! # spikesort-core
//!
//! Undoable spike-to-cluster labeling for interactive sorting sessions.
//!
//! A sorting session loads one cluster label per detected spike and then
//! merges, splits, and reassigns clusters until the operator is satisfied.
//! The hard part is keeping the label array, its derived inverse index,
//! and a linear undo/redo history consistent through every edit. This
//! crate is that core, and only that core: no file formats, no rendering,
//! no GUI. An external data model supplies the initial labels once, and
//! external store/view layers consume the change records every mutating
//! call returns.
//!
//! ## The pipeline
//!
//! ```text
//! initial labels → ClusterLabeling ──→ ChangeRecord → store / view layers
//!                        ↑        │
//!                    History      └──→ ClusterMetadata (quality, group, …)
//!                  (undo/redo)              ↑
//!                                       History
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`labeling`] | [`labeling::ClusterLabeling`] | Label array + inverse index; merge / split / assign / undo / redo |
//! | [`history`] | [`history::History`] | Generic bounded linear undo/redo log |
//! | [`update`] | [`update::ChangeRecord`] | Immutable per-transition change description |
//! | [`metadata`] | [`metadata::ClusterMetadata`] | Per-cluster attribute table with pluggable defaults |
//! | [`store`] | [`store::MemoryStore`], [`store::DualStore`] | Passive per-cluster sinks with two-tier consistency checking |
//! | [`error`] | [`error::ClusterError`] | Error taxonomy; rejected calls are complete no-ops |
//! | [`snapshot`] | `SessionSnapshot` | Serializable session capture (requires the `serde` feature) |
//!
//! ## Guarantees
//!
//! - The inverse index is an exact partition of the spike range after
//!   every operation.
//! - Cluster ids come from a monotone session-wide high-water mark and
//!   are never reused, not even across undo/redo.
//! - Validation runs strictly before mutation: a rejected call leaves the
//!   session byte-identical to its pre-call state.
//! - Single-threaded by design; one control thread drives one engine and
//!   one metadata table per session.
//!
//! ## `no_std`
//!
//! This crate is `no_std` + `alloc` by default. Enable the `std` feature
//! for std environments, `serde` for snapshot support, and `python-ffi`
//! for the PyO3 extension module.

#![cfg_attr(not(any(feature = "std", feature = "python-ffi")), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

// Pull in std when the feature is enabled (for the FFI layer, etc.)
#[cfg(any(feature = "std", feature = "python-ffi"))]
extern crate std;

pub mod error;
pub mod history;
pub mod labeling;
pub mod metadata;
pub mod store;
pub mod update;

#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;
