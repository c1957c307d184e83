use chrono::{DateTime, TimeZone, Utc};
use reconcile_core::{
    has_conflict, merge_quantities_with, merge_records, pick_winner, stamp_version, FixedClock,
    IgnoredFields, MergeOptions, ProductRecord, Record, Side,
};
use std::collections::HashSet;

fn at_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_717_200_000_000 + ms).unwrap()
}

fn reporting() -> MergeOptions {
    MergeOptions::default().with_report_conflicts(true)
}

fn product(id: &str, quantity: f64, cost: f64) -> ProductRecord {
    ProductRecord::new(id)
        .with_quantity(quantity)
        .with_cost_price(cost)
}

fn mixed_snapshots() -> (Vec<Record>, Vec<Record>) {
    let local = vec![
        Record::new("new-1").with_field("name", "fresh"),
        Record::new("v-ahead").with_version(5),
        Record::new("v-behind").with_version(2),
        Record::new("ts-close").with_updated_at(at_ms(0)),
        Record::new("ts-far").with_updated_at(at_ms(0)),
        Record::new("plain").with_field("name", "mine"),
        Record::new("same").with_field("name", "same"),
    ];
    let remote = vec![
        Record::new("server-1"),
        Record::new("v-ahead").with_version(3),
        Record::new("v-behind").with_version(5),
        Record::new("ts-close").with_updated_at(at_ms(500)),
        Record::new("ts-far").with_updated_at(at_ms(1_500)),
        Record::new("plain").with_field("name", "theirs"),
        Record::new("same").with_field("name", "same"),
        Record::new("server-2"),
    ];
    (local, remote)
}

#[test]
fn every_id_appears_exactly_once() {
    let (local, remote) = mixed_snapshots();

    for options in [MergeOptions::default(), reporting()] {
        let result = merge_records(&local, &remote, &options).unwrap();

        let expected: HashSet<&str> = local
            .iter()
            .chain(remote.iter())
            .map(|r| r.id.as_str())
            .collect();
        let merged: Vec<&str> = result.merged.iter().map(|r| r.id.as_str()).collect();
        let unique: HashSet<&str> = merged.iter().copied().collect();

        assert_eq!(merged.len(), unique.len());
        assert_eq!(unique, expected);
    }
}

#[test]
fn local_only_ids_are_added_and_nothing_else() {
    let (local, remote) = mixed_snapshots();
    let result = merge_records(&local, &remote, &reporting()).unwrap();

    let added: Vec<&str> = result.added.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(added, vec!["new-1"]);
    assert!(result.get("new-1").is_some());
    assert!(result.updated.iter().all(|r| r.id != "new-1"));
    assert!(result.conflicts.iter().all(|c| c.id != "new-1"));
}

#[test]
fn higher_local_version_wins_regardless_of_timestamps() {
    let local = Record::new("a").with_version(5).with_updated_at(at_ms(0));
    let remote = Record::new("a").with_version(3).with_updated_at(at_ms(90_000));

    assert!(!has_conflict(&local, &remote, &IgnoredFields::new()));
    assert_eq!(pick_winner(&local, &remote), Side::Local);

    let result = merge_records(&[local.clone()], &[remote], &reporting()).unwrap();
    assert!(result.conflicts.is_empty());
    assert_eq!(result.merged, vec![local]);
}

#[test]
fn higher_remote_version_is_reported() {
    let local = Record::new("a").with_version(2).with_field("n", "mine");
    let remote = Record::new("a").with_version(5).with_field("n", "theirs");

    let result = merge_records(&[local], &[remote.clone()], &reporting()).unwrap();

    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].remote_version, Some(5));
    assert_eq!(result.merged, vec![remote]);
}

#[test]
fn timestamps_within_tolerance_do_not_conflict() {
    let (local, remote) = mixed_snapshots();
    let result = merge_records(&local, &remote, &reporting()).unwrap();

    let conflicted: HashSet<&str> = result.conflicts.iter().map(|c| c.id.as_str()).collect();
    assert!(!conflicted.contains("ts-close"));
    assert!(conflicted.contains("ts-far"));
}

#[test]
fn no_metadata_falls_back_to_structure() {
    let (local, remote) = mixed_snapshots();

    let reported = merge_records(&local, &remote, &reporting()).unwrap();
    let conflicted: HashSet<&str> = reported.conflicts.iter().map(|c| c.id.as_str()).collect();
    assert!(conflicted.contains("plain"));
    assert!(!conflicted.contains("same"));

    let resolved = merge_records(&local, &remote, &MergeOptions::default()).unwrap();
    assert!(resolved.conflicts.is_empty());
    assert_eq!(
        resolved.get("plain").and_then(|r| r.fields.get("name")),
        Some(&serde_json::json!("mine"))
    );
}

#[test]
fn merging_identical_snapshots_is_identity() {
    let snapshot = vec![
        Record::new("a").with_version(1),
        Record::new("b").with_updated_at(at_ms(0)),
        Record::new("c").with_field("name", "x"),
    ];

    let result = merge_records(&snapshot, &snapshot, &reporting()).unwrap();

    assert_eq!(result.merged, snapshot);
    assert!(result.conflicts.is_empty());
    assert!(result.added.is_empty());
    assert!(result.updated.is_empty());
}

#[test]
fn merge_does_not_mutate_inputs() {
    let (local, remote) = mixed_snapshots();
    let (local_before, remote_before) = (local.clone(), remote.clone());

    let _ = merge_records(&local, &remote, &reporting()).unwrap();

    assert_eq!(local, local_before);
    assert_eq!(remote, remote_before);
}

#[test]
fn stock_deltas_are_additive() {
    let clock = FixedClock(at_ms(0));
    let result = merge_quantities_with(
        &[product("sku", 80.0, 10.0)],
        &[product("sku", 120.0, 10.0)],
        &[product("sku", 100.0, 10.0)],
        &MergeOptions::default(),
        &clock,
    )
    .unwrap();

    assert_eq!(result.merged[0].quantity, Some(100.0));
    assert_eq!(result.updated.len(), 1);
}

#[test]
fn stock_never_goes_negative() {
    let clock = FixedClock(at_ms(0));
    let result = merge_quantities_with(
        &[product("sku", 2.0, 1.0)],
        &[product("sku", 5.0, 1.0)],
        &[product("sku", 10.0, 1.0)],
        &MergeOptions::default(),
        &clock,
    )
    .unwrap();

    assert_eq!(result.merged[0].quantity, Some(0.0));
}

#[test]
fn cost_is_weighted_by_movement() {
    let clock = FixedClock(at_ms(0));
    let result = merge_quantities_with(
        &[product("sku", 80.0, 10.0)],
        &[product("sku", 130.0, 12.0)],
        &[product("sku", 100.0, 10.0)],
        &MergeOptions::default(),
        &clock,
    )
    .unwrap();

    let merged = &result.merged[0];
    assert_eq!(merged.quantity, Some(110.0));
    let cost = merged.cost_price.unwrap();
    assert!((cost - 14.181_818).abs() < 1e-5, "cost was {cost}");
}

#[test]
fn stamping_strictly_increases_version() {
    let unversioned = Record::new("a");
    assert_eq!(stamp_version(&unversioned).version, Some(1));

    let versioned = Record::new("a").with_version(41);
    let once = stamp_version(&versioned);
    let twice = stamp_version(&once);
    assert_eq!(once.version, Some(42));
    assert_eq!(twice.version, Some(43));
}
