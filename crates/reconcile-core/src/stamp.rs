//! Version stamping for records about to be written locally.

use crate::clock::{Clock, ProcessClock};
use crate::record::SyncableRecord;

/// Next version for a record: absent counts as `0`.
#[must_use]
pub fn next_version<T: SyncableRecord>(record: &T) -> u64 {
    record.version().unwrap_or(0).saturating_add(1)
}

/// Return a copy of `record` with the next version and a fresh timestamp.
///
/// Timestamps come from [`ProcessClock`] and never step backwards within
/// the process.
#[must_use]
pub fn stamp_version<T: SyncableRecord>(record: &T) -> T {
    stamp_version_with(record, &ProcessClock)
}

/// Like [`stamp_version`], reading the time from `clock`.
#[must_use]
pub fn stamp_version_with<T: SyncableRecord>(record: &T, clock: &impl Clock) -> T {
    let mut stamped = record.clone();
    stamped.set_version(next_version(record));
    stamped.set_updated_at(clock.now());
    stamped
}

/// Stamp every record with one shared timestamp from [`ProcessClock`].
#[must_use]
pub fn stamp_version_batch<T: SyncableRecord>(records: &[T]) -> Vec<T> {
    stamp_version_batch_with(records, &ProcessClock)
}

/// Like [`stamp_version_batch`], reading the time from `clock` once.
#[must_use]
pub fn stamp_version_batch_with<T: SyncableRecord>(records: &[T], clock: &impl Clock) -> Vec<T> {
    let now = clock.now();
    records
        .iter()
        .map(|record| {
            let mut stamped = record.clone();
            stamped.set_version(next_version(record));
            stamped.set_updated_at(now);
            stamped
        })
        .collect()
}
