//! Conflict detection and whole-record resolution for one local/remote pair.
//!
//! # Detection rules
//!
//! Evaluated strictly top to bottom; a rule applies only when *both* sides
//! carry the metadata it needs.
//!
//! | Metadata on both sides | Conflict when |
//! |------------------------|---------------|
//! | version | remote version > local version |
//! | timestamp | remote time > local time + [`CLOCK_SKEW_TOLERANCE_MS`] |
//! | neither | records are not structurally equal |
//!
//! # Resolution rules
//!
//! Same precedence. Versions, then timestamps, are compared and ties favor
//! the local record. Without metadata the local record always wins.

use crate::compare::{structurally_equal, IgnoredFields};
use crate::record::SyncableRecord;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Remote timestamps within this many milliseconds of local are not conflicts.
pub const CLOCK_SKEW_TOLERANCE_MS: i64 = 1_000;

/// The metadata rule that decided a detection or resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rule {
    /// Both sides carry a version
    Version,
    /// Both sides carry a timestamp
    Timestamp,
    /// No shared metadata
    Structural,
}

impl Rule {
    /// Pick the rule that applies to a pair of records.
    #[must_use]
    pub fn for_pair<T: SyncableRecord>(local: &T, remote: &T) -> Self {
        if local.version().is_some() && remote.version().is_some() {
            Rule::Version
        } else if local.updated_at().is_some() && remote.updated_at().is_some() {
            Rule::Timestamp
        } else {
            Rule::Structural
        }
    }
}

/// One side of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The local replica
    Local,
    /// The remote replica
    Remote,
}

/// Whether `local` and `remote` genuinely conflict.
#[must_use]
pub fn has_conflict<T: SyncableRecord>(local: &T, remote: &T, ignored: &IgnoredFields) -> bool {
    let rule = Rule::for_pair(local, remote);
    let metadata = (local.version(), remote.version(), local.updated_at(), remote.updated_at());
    let conflict = match metadata {
        (Some(local_version), Some(remote_version), _, _) => remote_version > local_version,
        (_, _, Some(local_time), Some(remote_time)) => beyond_skew(local_time, remote_time),
        _ => !structurally_equal(local, remote, ignored),
    };

    tracing::trace!(id = local.id(), ?rule, conflict, "Checked pair for conflict");
    conflict
}

/// Whether `remote` is later than `local` by more than the skew tolerance.
fn beyond_skew(local: DateTime<Utc>, remote: DateTime<Utc>) -> bool {
    let tolerance = TimeDelta::milliseconds(CLOCK_SKEW_TOLERANCE_MS);
    local
        .checked_add_signed(tolerance)
        .is_some_and(|limit| remote > limit)
}

/// Pick the side whose record wins, with ties going to local.
#[must_use]
pub fn pick_winner<T: SyncableRecord>(local: &T, remote: &T) -> Side {
    let metadata = (local.version(), remote.version(), local.updated_at(), remote.updated_at());
    let local_wins = match metadata {
        (Some(local_version), Some(remote_version), _, _) => local_version >= remote_version,
        (_, _, Some(local_time), Some(remote_time)) => local_time >= remote_time,
        _ => true,
    };

    if local_wins {
        Side::Local
    } else {
        Side::Remote
    }
}

/// The winning record of a pair.
#[must_use]
pub fn resolve<'a, T: SyncableRecord>(local: &'a T, remote: &'a T) -> &'a T {
    match pick_winner(local, remote) {
        Side::Local => local,
        Side::Remote => remote,
    }
}

/// How a reported conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the local record
    Local,
    /// Keep the remote record
    Remote,
    /// A hand-built value replaces both
    Manual,
}

/// A disagreement between replicas awaiting resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeConflict<T> {
    /// Id of the conflicting record
    pub id: String,
    /// Conflicting field; `None` for whole-record conflicts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The local record
    pub local_value: T,
    /// The remote record
    pub remote_value: T,
    /// Local version, if any
    pub local_version: Option<u64>,
    /// Remote version, if any
    pub remote_version: Option<u64>,
    /// Local timestamp, if any
    pub local_updated_at: Option<DateTime<Utc>>,
    /// Remote timestamp, if any
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Filled in once the conflict is settled
    pub resolution: Option<Resolution>,
}

impl<T: SyncableRecord> MergeConflict<T> {
    /// A whole-record conflict between `local` and `remote`.
    #[must_use]
    pub fn between(local: &T, remote: &T) -> Self {
        Self {
            id: local.id().to_string(),
            field: None,
            local_value: local.clone(),
            remote_value: remote.clone(),
            local_version: local.version(),
            remote_version: remote.version(),
            local_updated_at: local.updated_at(),
            remote_updated_at: remote.updated_at(),
            resolution: None,
        }
    }

    /// Record how the conflict was settled.
    pub fn resolve(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
    }

    /// Whether a resolution has been recorded.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// The chosen record for `Local` or `Remote` resolutions.
    ///
    /// `None` while unresolved or when resolved manually; a manual value is
    /// written back by the caller as a new local edit.
    #[must_use]
    pub fn chosen(&self) -> Option<&T> {
        match self.resolution? {
            Resolution::Local => Some(&self.local_value),
            Resolution::Remote => Some(&self.remote_value),
            Resolution::Manual => None,
        }
    }
}
