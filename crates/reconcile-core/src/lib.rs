//! # Reconcile Core
//!
//! Merge engine for reconciling a locally modified record collection with a
//! server-authoritative one.
//!
//! This crate provides:
//! - Version stamping for records about to be written locally
//! - Deep structural comparison with ignorable fields
//! - Conflict detection and deterministic whole-record resolution
//! - A two-way merge of collections by record id
//! - A three-way merge that combines independent stock quantity deltas
//!
//! Every operation is a pure function over borrowed snapshots; inputs are
//! never mutated.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod compare;
pub mod conflict;
pub mod delta;
pub mod error;
pub mod index;
pub mod merge;
pub mod record;
pub mod stamp;

pub use clock::{Clock, FixedClock, MonotonicClock, ProcessClock, SystemClock};
pub use compare::{structurally_equal, IgnoredFields};
pub use conflict::{
    has_conflict, pick_winner, resolve, MergeConflict, Resolution, Rule, Side,
    CLOCK_SKEW_TOLERANCE_MS,
};
pub use delta::{merge_quantities, merge_quantities_with};
pub use error::{MergeError, Snapshot};
pub use index::{DuplicatePolicy, SnapshotIndex};
pub use merge::{merge_records, MergeOptions, MergeResult, MergeSummary, Reconciler};
pub use record::{ProductRecord, Record, StockRecord, SyncableRecord};
pub use stamp::{
    next_version, stamp_version, stamp_version_batch, stamp_version_batch_with,
    stamp_version_with,
};
