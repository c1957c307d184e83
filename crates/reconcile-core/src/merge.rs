//! Two-way merge of whole collections by record id.
//!
//! Every id present in either snapshot lands exactly once in
//! [`MergeResult::merged`]:
//!
//! | Present in | Outcome |
//! |------------|---------|
//! | local only | local record, also listed in `added` |
//! | both, conflict reported | remote record pending resolution, conflict listed |
//! | both, otherwise | resolver winner; a local winner that differs from remote is listed in `updated` |
//! | remote only | remote record, unclassified |
//!
//! `merged` lists local records first, then remote-only records, each in
//! source order.

use crate::clock::{Clock, ProcessClock};
use crate::compare::{structurally_equal, IgnoredFields};
use crate::conflict::{has_conflict, pick_winner, MergeConflict, Side};
use crate::error::{MergeError, Snapshot};
use crate::index::{DuplicatePolicy, SnapshotIndex};
use crate::record::SyncableRecord;
use serde::{Deserialize, Serialize};

/// Options shared by both mergers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeOptions {
    /// Report conflicts instead of auto-resolving them
    pub report_conflicts: bool,
    /// Fields excluded from structural comparison
    pub ignore_fields: IgnoredFields,
    /// Handling of repeated ids within one snapshot
    pub duplicates: DuplicatePolicy,
}

impl MergeOptions {
    /// Report conflicts instead of auto-resolving them.
    #[must_use]
    pub fn with_report_conflicts(mut self, report: bool) -> Self {
        self.report_conflicts = report;
        self
    }

    /// Exclude `fields` from structural comparison.
    #[must_use]
    pub fn ignoring<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self.ignore_fields.insert(field);
        }
        self
    }

    /// Set the duplicate-id policy.
    #[must_use]
    pub fn with_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }
}

/// Outcome of merging two or three snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult<T> {
    /// Final collection, one record per id
    pub merged: Vec<T>,
    /// Conflicts awaiting resolution
    pub conflicts: Vec<MergeConflict<T>>,
    /// Records only the local snapshot has
    pub added: Vec<T>,
    /// Local records that replaced a differing remote record
    pub updated: Vec<T>,
    /// Ids dropped by the caller's deletion policy
    pub removed: Vec<String>,
}

impl<T> Default for MergeResult<T> {
    fn default() -> Self {
        Self {
            merged: Vec::new(),
            conflicts: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Counts of a [`MergeResult`], for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Records in the merged collection
    pub merged: usize,
    /// Pending conflicts
    pub conflicts: usize,
    /// Added records
    pub added: usize,
    /// Updated records
    pub updated: usize,
    /// Removed ids
    pub removed: usize,
}

impl std::fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} merged, {} conflicts, {} added, {} updated, {} removed",
            self.merged, self.conflicts, self.added, self.updated, self.removed
        )
    }
}

impl<T: SyncableRecord> MergeResult<T> {
    /// Counts per classification.
    #[must_use]
    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            merged: self.merged.len(),
            conflicts: self.conflicts.len(),
            added: self.added.len(),
            updated: self.updated.len(),
            removed: self.removed.len(),
        }
    }

    /// Whether no conflict is left unresolved.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.iter().all(MergeConflict::is_resolved)
    }

    /// Look up a merged record by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.merged.iter().find(|r| r.id() == id)
    }

    /// Drop `id` from the result and list it as removed.
    ///
    /// Returns the dropped merged record, if there was one.
    pub fn mark_removed(&mut self, id: &str) -> Option<T> {
        let dropped = self
            .merged
            .iter()
            .position(|r| r.id() == id)
            .map(|pos| self.merged.remove(pos));

        self.added.retain(|r| r.id() != id);
        self.updated.retain(|r| r.id() != id);
        self.conflicts.retain(|c| c.id != id);
        if !self.removed.iter().any(|removed| removed == id) {
            self.removed.push(id.to_string());
        }

        dropped
    }

    pub(crate) fn push_added(&mut self, record: &T) {
        self.merged.push(record.clone());
        self.added.push(record.clone());
    }

    pub(crate) fn push_updated(&mut self, record: T) {
        self.updated.push(record.clone());
        self.merged.push(record);
    }

    pub(crate) fn log_summary(&self, merger: &str) {
        let summary = self.summary();
        tracing::debug!(
            merger,
            merged = summary.merged,
            conflicts = summary.conflicts,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "Merge complete"
        );
    }
}

/// Merge one id present on both sides into `result`.
pub(crate) fn merge_pair<T: SyncableRecord>(
    local: &T,
    remote: &T,
    options: &MergeOptions,
    result: &mut MergeResult<T>,
) {
    if options.report_conflicts && has_conflict(local, remote, &options.ignore_fields) {
        tracing::debug!(
            id = local.id(),
            local_version = ?local.version(),
            remote_version = ?remote.version(),
            "Conflict reported, keeping remote pending resolution"
        );
        result.conflicts.push(MergeConflict::between(local, remote));
        result.merged.push(remote.clone());
        return;
    }

    match pick_winner(local, remote) {
        Side::Local if !structurally_equal(local, remote, &options.ignore_fields) => {
            result.push_updated(local.clone());
        }
        Side::Local => result.merged.push(local.clone()),
        Side::Remote => result.merged.push(remote.clone()),
    }
}

/// Merge `local` and `remote` by id.
///
/// # Errors
///
/// Returns [`MergeError::DuplicateId`] if a snapshot repeats an id under
/// [`DuplicatePolicy::Reject`].
pub fn merge_records<T: SyncableRecord>(
    local: &[T],
    remote: &[T],
    options: &MergeOptions,
) -> Result<MergeResult<T>, MergeError> {
    let local_index = SnapshotIndex::build(local, Snapshot::Local, options.duplicates)?;
    let remote_index = SnapshotIndex::build(remote, Snapshot::Remote, options.duplicates)?;
    let mut result = MergeResult::default();

    for record in local_index.iter() {
        match remote_index.get(record.id()) {
            Some(theirs) => merge_pair(record, theirs, options, &mut result),
            None => result.push_added(record),
        }
    }

    result.merged.extend(
        remote_index
            .iter()
            .filter(|r| !local_index.contains(r.id()))
            .cloned(),
    );

    result.log_summary("identity");
    Ok(result)
}

/// Merge options bundled with the clock used to stamp merged records.
#[derive(Debug, Clone, Default)]
pub struct Reconciler<C = ProcessClock> {
    options: MergeOptions,
    pub(crate) clock: C,
}

impl Reconciler<ProcessClock> {
    /// A reconciler stamping from the process-wide monotonic clock.
    #[must_use]
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            clock: ProcessClock,
        }
    }
}

impl<C: Clock> Reconciler<C> {
    /// A reconciler reading `clock`.
    #[must_use]
    pub fn with_clock(options: MergeOptions, clock: C) -> Self {
        Self { options, clock }
    }

    /// The merge options.
    #[must_use]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Two-way merge by id. See [`merge_records`].
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateId`] on repeated ids.
    pub fn merge<T: SyncableRecord>(
        &self,
        local: &[T],
        remote: &[T],
    ) -> Result<MergeResult<T>, MergeError> {
        merge_records(local, remote, &self.options)
    }
}
