//! Three-way merge of stock quantities against a common base.
//!
//! When both replicas move a quantity independently, picking one record
//! would lose the other side's change. Instead each side's delta from the
//! base is added back onto the base:
//!
//! ```text
//! merged = max(0, base + (local - base) + (remote - base))
//! ```
//!
//! If both sides moved, the unit cost is re-weighted by the size of each
//! move. If only one side moved, that side's cost is carried over.
//!
//! Ids without a base entry, without quantities on every side, or with no
//! quantity movement at all fall back to whole-record merging.

use crate::clock::{Clock, ProcessClock};
use crate::conflict::resolve;
use crate::error::{MergeError, Snapshot};
use crate::index::SnapshotIndex;
use crate::merge::{merge_pair, MergeOptions, MergeResult, Reconciler};
use crate::record::StockRecord;
use chrono::{DateTime, Utc};

/// Quantity and cost reconstructed from both deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Combined {
    quantity: f64,
    cost_price: Option<f64>,
}

/// Merge stock records against `base`, stamping from [`ProcessClock`].
///
/// # Errors
///
/// Returns [`MergeError::DuplicateId`] if a snapshot repeats an id under
/// [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject).
pub fn merge_quantities<T: StockRecord>(
    local: &[T],
    remote: &[T],
    base: &[T],
    options: &MergeOptions,
) -> Result<MergeResult<T>, MergeError> {
    merge_quantities_with(local, remote, base, options, &ProcessClock)
}

/// Merge stock records against `base`, stamping merged records from `clock`.
///
/// # Errors
///
/// Returns [`MergeError::DuplicateId`] if a snapshot repeats an id under
/// [`DuplicatePolicy::Reject`](crate::DuplicatePolicy::Reject).
pub fn merge_quantities_with<T: StockRecord>(
    local: &[T],
    remote: &[T],
    base: &[T],
    options: &MergeOptions,
    clock: &impl Clock,
) -> Result<MergeResult<T>, MergeError> {
    let local_index = SnapshotIndex::build(local, Snapshot::Local, options.duplicates)?;
    let remote_index = SnapshotIndex::build(remote, Snapshot::Remote, options.duplicates)?;
    let base_index = SnapshotIndex::build(base, Snapshot::Base, options.duplicates)?;
    let stamped_at = clock.now();
    let mut result = MergeResult::default();

    for record in local_index.iter() {
        let Some(theirs) = remote_index.get(record.id()) else {
            result.push_added(record);
            continue;
        };

        match combine(record, theirs, base_index.get(record.id())) {
            Some(combined) => {
                tracing::debug!(
                    id = record.id(),
                    quantity = combined.quantity,
                    cost_price = ?combined.cost_price,
                    "Combined quantity deltas"
                );
                result.push_updated(rebuild(record, theirs, combined, stamped_at));
            }
            None => merge_pair(record, theirs, options, &mut result),
        }
    }

    result.merged.extend(
        remote_index
            .iter()
            .filter(|r| !local_index.contains(r.id()))
            .cloned(),
    );

    result.log_summary("delta");
    Ok(result)
}

impl<C: Clock> Reconciler<C> {
    /// Three-way merge against `base`. See [`merge_quantities`].
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::DuplicateId`] on repeated ids.
    pub fn merge_with_base<T: StockRecord>(
        &self,
        local: &[T],
        remote: &[T],
        base: &[T],
    ) -> Result<MergeResult<T>, MergeError> {
        merge_quantities_with(local, remote, base, self.options(), &self.clock)
    }
}

/// Combine both quantity deltas, or `None` to fall back to whole-record merging.
#[allow(clippy::float_cmp)]
fn combine<T: StockRecord>(local: &T, remote: &T, base: Option<&T>) -> Option<Combined> {
    let base = base?;
    let base_quantity = base.quantity()?;
    let local_delta = local.quantity()? - base_quantity;
    let remote_delta = remote.quantity()? - base_quantity;

    if local_delta == 0.0 && remote_delta == 0.0 {
        return None;
    }

    let quantity = (base_quantity + local_delta + remote_delta).max(0.0);

    let cost_price = if local_delta != 0.0 && remote_delta != 0.0 {
        match (base.cost_price(), local.cost_price(), remote.cost_price()) {
            (Some(base_cost), Some(local_cost), Some(remote_cost)) if quantity > 0.0 => Some(
                (base_quantity * base_cost
                    + local_delta.abs() * local_cost
                    + remote_delta.abs() * remote_cost)
                    / quantity,
            ),
            (Some(_), Some(_), Some(_)) => Some(0.0),
            _ => None,
        }
    } else if local_delta != 0.0 {
        local.cost_price()
    } else {
        remote.cost_price()
    };

    Some(Combined {
        quantity,
        cost_price,
    })
}

/// The merged record: whole-record winner with combined stock and a new version.
fn rebuild<T: StockRecord>(local: &T, remote: &T, combined: Combined, at: DateTime<Utc>) -> T {
    let mut merged = resolve(local, remote).clone();
    merged.set_quantity(combined.quantity);
    if let Some(cost_price) = combined.cost_price {
        merged.set_cost_price(cost_price);
    }

    let version = local.version().unwrap_or(0).max(remote.version().unwrap_or(0));
    merged.set_version(version.saturating_add(1));
    merged.set_updated_at(at);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::record::ProductRecord;
    use chrono::TimeZone;

    fn product(id: &str, quantity: f64, cost: f64) -> ProductRecord {
        ProductRecord::new(id)
            .with_quantity(quantity)
            .with_cost_price(cost)
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
    }

    fn merge_one(
        local: ProductRecord,
        remote: ProductRecord,
        base: Option<ProductRecord>,
    ) -> MergeResult<ProductRecord> {
        let base: Vec<ProductRecord> = base.into_iter().collect();
        merge_quantities_with(&[local], &[remote], &base, &MergeOptions::default(), &clock())
            .unwrap()
    }

    #[test]
    fn opposite_deltas_cancel() {
        let result = merge_one(
            product("p", 80.0, 10.0),
            product("p", 120.0, 10.0),
            Some(product("p", 100.0, 10.0)),
        );

        assert_eq!(result.merged.len(), 1);
        assert_eq!(result.merged[0].quantity, Some(100.0));
        assert_eq!(result.updated, result.merged);
    }

    #[test]
    fn negative_sum_clamps_to_zero() {
        let result = merge_one(
            product("p", 2.0, 4.0),
            product("p", 5.0, 4.0),
            Some(product("p", 10.0, 4.0)),
        );

        assert_eq!(result.merged[0].quantity, Some(0.0));
        // Nothing left in stock to carry a cost
        assert_eq!(result.merged[0].cost_price, Some(0.0));
    }

    #[test]
    fn both_moves_reweight_cost() {
        let result = merge_one(
            product("p", 80.0, 10.0),
            product("p", 130.0, 12.0),
            Some(product("p", 100.0, 10.0)),
        );

        let merged = &result.merged[0];
        assert_eq!(merged.quantity, Some(110.0));
        let cost = merged.cost_price.unwrap();
        assert!((cost - 1560.0 / 110.0).abs() < 1e-9, "cost was {cost}");
    }

    #[test]
    fn single_move_carries_that_sides_cost() {
        let result = merge_one(
            product("p", 100.0, 10.0),
            product("p", 150.0, 11.0),
            Some(product("p", 100.0, 10.0)),
        );
        assert_eq!(result.merged[0].quantity, Some(150.0));
        assert_eq!(result.merged[0].cost_price, Some(11.0));

        let result = merge_one(
            product("p", 90.0, 9.5),
            product("p", 100.0, 10.0),
            Some(product("p", 100.0, 10.0)),
        );
        assert_eq!(result.merged[0].quantity, Some(90.0));
        assert_eq!(result.merged[0].cost_price, Some(9.5));
    }

    #[test]
    fn unknown_cost_keeps_winner_cost() {
        let result = merge_one(
            product("p", 90.0, 9.0),
            ProductRecord::new("p").with_quantity(105.0),
            Some(ProductRecord::new("p").with_quantity(100.0)),
        );

        assert_eq!(result.merged[0].quantity, Some(95.0));
        assert_eq!(result.merged[0].cost_price, Some(9.0));
    }

    #[test]
    fn merged_record_gets_next_version_and_stamp() {
        let result = merge_one(
            product("p", 80.0, 10.0).with_version(3),
            product("p", 120.0, 10.0).with_version(7),
            Some(product("p", 100.0, 10.0).with_version(2)),
        );

        assert_eq!(result.merged[0].version, Some(8));
        assert_eq!(result.merged[0].updated_at, Some(clock().0));
    }

    #[test]
    fn other_fields_come_from_resolver_winner() {
        let result = merge_one(
            product("p", 80.0, 10.0).with_version(1).with_field("name", "old"),
            product("p", 120.0, 10.0).with_version(2).with_field("name", "new"),
            Some(product("p", 100.0, 10.0)),
        );

        assert_eq!(
            result.merged[0].fields.get("name"),
            Some(&serde_json::json!("new"))
        );
    }

    #[test]
    fn missing_base_falls_back_to_resolver() {
        let local = product("p", 80.0, 10.0).with_version(5);
        let remote = product("p", 120.0, 10.0).with_version(2);

        let result = merge_one(local.clone(), remote, None);

        assert_eq!(result.merged, vec![local.clone()]);
        assert_eq!(result.updated, vec![local]);
    }

    #[test]
    fn missing_quantity_falls_back_to_resolver() {
        let local = ProductRecord::new("p").with_version(1);
        let remote = product("p", 120.0, 10.0).with_version(2);

        let result = merge_one(local, remote.clone(), Some(product("p", 100.0, 10.0)));

        assert_eq!(result.merged, vec![remote]);
        assert!(result.updated.is_empty());
    }

    #[test]
    fn unchanged_quantities_fall_back_to_resolver() {
        let local = product("p", 100.0, 10.0).with_field("name", "renamed");
        let remote = product("p", 100.0, 10.0);

        let result = merge_one(local.clone(), remote, Some(product("p", 100.0, 10.0)));

        assert_eq!(result.merged, vec![local.clone()]);
        assert_eq!(result.updated, vec![local]);
        assert_eq!(result.merged[0].version, None);
    }

    #[test]
    fn fallback_honors_conflict_reporting() {
        let local = product("p", 100.0, 10.0).with_version(1);
        let remote = product("p", 100.0, 10.0).with_version(3).with_field("name", "x");
        let options = MergeOptions::default().with_report_conflicts(true);

        let result = merge_quantities_with(
            &[local],
            &[remote.clone()],
            &[product("p", 100.0, 10.0)],
            &options,
            &clock(),
        )
        .unwrap();

        assert_eq!(result.merged, vec![remote]);
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn one_sided_ids_follow_identity_rules() {
        let local = vec![product("only-local", 1.0, 1.0), product("shared", 5.0, 1.0)];
        let remote = vec![product("only-remote", 2.0, 1.0), product("shared", 7.0, 1.0)];
        let base = vec![product("shared", 6.0, 1.0)];

        let reconciler = Reconciler::with_clock(MergeOptions::default(), clock());
        let result = reconciler.merge_with_base(&local, &remote, &base).unwrap();

        let ids: Vec<&str> = result.merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["only-local", "shared", "only-remote"]);
        assert_eq!(result.added, vec![local[0].clone()]);
        assert_eq!(result.updated.len(), 1);
        assert_eq!(result.updated[0].quantity, Some(6.0));
    }

    #[test]
    fn duplicate_base_ids_are_rejected() {
        let empty: Vec<ProductRecord> = Vec::new();
        let base = vec![product("p", 1.0, 1.0), product("p", 2.0, 1.0)];
        let err = merge_quantities(&empty, &empty, &base, &MergeOptions::default()).unwrap_err();

        assert_eq!(
            err,
            MergeError::DuplicateId {
                snapshot: Snapshot::Base,
                id: "p".to_string()
            }
        );
    }
}
