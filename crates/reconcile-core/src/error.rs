//! Errors raised by the merge entry points.

use serde::{Deserialize, Serialize};

/// Which input snapshot a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Snapshot {
    /// The locally modified snapshot
    Local,
    /// The server-authoritative snapshot
    Remote,
    /// The common ancestor snapshot
    Base,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Snapshot::Local => write!(f, "local"),
            Snapshot::Remote => write!(f, "remote"),
            Snapshot::Base => write!(f, "base"),
        }
    }
}

/// Errors that can occur while merging snapshots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The same id appeared twice in one snapshot
    #[error("duplicate id {id:?} in {snapshot} snapshot")]
    DuplicateId {
        /// Snapshot containing the duplicate
        snapshot: Snapshot,
        /// The repeated id
        id: String,
    },
}
