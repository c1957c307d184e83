//! Id lookup over one snapshot.

use crate::error::{MergeError, Snapshot};
use crate::record::SyncableRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do when one snapshot holds the same id twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the merge with [`MergeError::DuplicateId`]
    #[default]
    Reject,
    /// Keep the later record, at the position of the first, and log a warning
    LastWins,
}

/// Records of one snapshot, indexed by id, in first-appearance order.
#[derive(Debug)]
pub struct SnapshotIndex<'a, T> {
    records: Vec<&'a T>,
    positions: HashMap<&'a str, usize>,
}

impl<'a, T: SyncableRecord> SnapshotIndex<'a, T> {
    /// Index `records`, applying `policy` to repeated ids.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateId`] if an id repeats under
    /// [`DuplicatePolicy::Reject`].
    pub fn build(
        records: &'a [T],
        snapshot: Snapshot,
        policy: DuplicatePolicy,
    ) -> Result<Self, MergeError> {
        let mut index = Self {
            records: Vec::with_capacity(records.len()),
            positions: HashMap::with_capacity(records.len()),
        };

        for record in records {
            let id = record.id();
            if let Some(&pos) = index.positions.get(id) {
                match policy {
                    DuplicatePolicy::Reject => {
                        return Err(MergeError::DuplicateId {
                            snapshot,
                            id: id.to_string(),
                        });
                    }
                    DuplicatePolicy::LastWins => {
                        tracing::warn!(%snapshot, id, "Duplicate id, keeping last record");
                        index.records[pos] = record;
                    }
                }
            } else {
                index.positions.insert(id, index.records.len());
                index.records.push(record);
            }
        }

        Ok(index)
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&'a T> {
        self.positions.get(id).map(|&pos| self.records[pos])
    }

    /// Whether the snapshot holds `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Records in first-appearance order.
    pub fn iter(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.records.iter().copied()
    }

    /// Number of distinct ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
