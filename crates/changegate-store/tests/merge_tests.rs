//! Integration tests for merging, conflict listing and resolution

mod common;

use changegate_core::errors::ExErrorKind;
use changegate_core::model::{ColumnSchema, ConflictSummary, ResolveStrategy, RowQuery};
use changegate_core::store::{MergeOptions, MergeOutcome, StoreSession};
use common::{row, set_cell, setup, TestStore};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn qty_of(store: &TestStore, branch: &str, id: i64) -> Value {
    let mut s = store.session(branch);
    let (rows, _) = s
        .query_rows(
            "items",
            &RowQuery {
                filters: vec![changegate_core::model::Filter::eq("id", id)],
                ..RowQuery::default()
            },
        )
        .unwrap();
    rows[0]["qty"].clone()
}

#[test]
fn test_fast_forward_merge() {
    let store = setup();
    store.branch("wi/A/01");
    let advanced = set_cell(&store, "main", 1, "qty", json!(7));

    let mut s = store.session("wi/A/01");
    let outcome = s.merge("main", &MergeOptions::autocommit()).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Applied {
            hash: advanced.clone(),
            fast_forward: true
        }
    );
    assert_eq!(store.head("wi/A/01"), advanced);
}

#[test]
fn test_up_to_date_merge_is_a_no_op() {
    let store = setup();
    store.branch("wi/A/01");
    let head = store.head("wi/A/01");
    let mut s = store.session("wi/A/01");
    let outcome = s.merge("main", &MergeOptions::autocommit()).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Applied {
            hash: head,
            fast_forward: false
        }
    );
}

#[test]
fn test_clean_three_way_merge_creates_merge_commit() {
    let store = setup();
    store.branch("wi/A/01");
    let work = set_cell(&store, "wi/A/01", 1, "name", json!("green apple"));
    let trunk = set_cell(&store, "main", 1, "qty", json!(11));

    let mut s = store.session("wi/A/01");
    let MergeOutcome::Applied { hash, fast_forward } =
        s.merge("main", &MergeOptions::autocommit()).unwrap()
    else {
        panic!("expected a clean merge");
    };
    assert!(!fast_forward);

    let log = s.log(&hash).unwrap();
    assert_eq!(log[0].parents, vec![work, trunk]);
    assert_eq!(log[0].message, "Merge branch 'main' into wi/A/01");
    assert_eq!(qty_of(&store, "wi/A/01", 1), json!(11));
}

#[test]
fn test_no_ff_forces_merge_commit() {
    let store = setup();
    store.branch("wi/A/01");
    let trunk = set_cell(&store, "main", 2, "qty", json!(1));

    let mut s = store.session("wi/A/01");
    let options = MergeOptions {
        no_ff: true,
        ..MergeOptions::autocommit()
    }
    .with_message("sync");
    let MergeOutcome::Applied { hash, fast_forward } = s.merge("main", &options).unwrap() else {
        panic!("expected a merge commit");
    };
    assert!(!fast_forward);
    assert_ne!(hash, trunk);
    assert_eq!(s.log(&hash).unwrap()[0].message, "sync");
}

#[test]
fn test_autocommit_conflict_leaves_branch_untouched() {
    let store = setup();
    store.branch("wi/A/01");
    let work = set_cell(&store, "wi/A/01", 1, "qty", json!(100));
    set_cell(&store, "main", 1, "qty", json!(200));

    let mut s = store.session("wi/A/01");
    let outcome = s.merge("main", &MergeOptions::autocommit()).unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Conflicted(vec![ConflictSummary::new("items", 1, 0)])
    );
    assert_eq!(s.conflict_count().unwrap(), 0);
    assert_eq!(store.head("wi/A/01"), work);
    assert_eq!(qty_of(&store, "wi/A/01", 1), json!(100));
}

#[test]
fn test_preview_and_conflict_rows() {
    let store = setup();
    store.branch("wi/A/01");
    set_cell(&store, "wi/A/01", 1, "qty", json!(100));
    set_cell(&store, "main", 1, "qty", json!(200));

    let mut s = store.session("wi/A/01");
    let before = s.head().unwrap();
    let summary = s.preview_merge_summary("wi/A/01", "main").unwrap();
    assert_eq!(summary, vec![ConflictSummary::new("items", 1, 0)]);
    assert_eq!(s.head().unwrap(), before);

    let rows = s.list_conflict_rows("wi/A/01", "main", "items").unwrap();
    assert_eq!(rows.len(), 1);
    let cells: BTreeMap<String, Value> = rows[0].iter().cloned().collect();
    assert_eq!(cells["base_qty"], json!(3));
    assert_eq!(cells["our_qty"], json!(100));
    assert_eq!(cells["their_qty"], json!(200));
    assert_eq!(cells["our_diff_type"], json!("modified"));
    assert!(cells["from_root_ish"].is_string());

    assert!(s
        .list_conflict_rows("wi/A/01", "main", "other")
        .unwrap()
        .is_empty());
}

#[test]
fn test_pending_merge_resolved_with_theirs() {
    let store = setup();
    store.branch("wi/A/01");
    set_cell(&store, "wi/A/01", 1, "qty", json!(100));
    let trunk = set_cell(&store, "main", 1, "qty", json!(200));

    let mut s = store.session("wi/A/01");
    s.begin_transaction().unwrap();
    let outcome = s
        .merge(
            "main",
            &MergeOptions {
                no_ff: true,
                ..MergeOptions::default()
            },
        )
        .unwrap();
    assert!(outcome.is_conflicted());
    assert_eq!(s.conflict_count().unwrap(), 1);

    let err = s.create_commit("too early").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::MergeConflictsPresent);

    s.resolve_conflicts("items", ResolveStrategy::Theirs).unwrap();
    assert_eq!(s.conflict_count().unwrap(), 0);
    let merged = s.create_commit("resolved").unwrap();
    s.commit_transaction().unwrap();

    assert_eq!(store.head("wi/A/01"), merged);
    assert_eq!(qty_of(&store, "wi/A/01", 1), json!(200));
    assert_eq!(s.log("HEAD").unwrap()[0].parents[1], trunk);
}

#[test]
fn test_pending_merge_resolved_with_ours_and_aborted() {
    let store = setup();
    store.branch("wi/A/01");
    set_cell(&store, "wi/A/01", 1, "qty", json!(100));
    set_cell(&store, "main", 1, "qty", json!(200));

    let mut s = store.session("wi/A/01");
    s.merge("main", &MergeOptions::default()).unwrap();
    s.resolve_conflicts("items", ResolveStrategy::Ours).unwrap();
    assert_eq!(s.conflict_count().unwrap(), 0);
    s.abort_merge().unwrap();
    assert!(s.resolve_conflicts("items", ResolveStrategy::Ours).is_err());
    // aborting twice is harmless
    s.abort_merge().unwrap();
}

#[test]
fn test_divergent_schema_change_is_schema_conflict() {
    let store = setup();
    store.branch("wi/A/01");
    store.commit_on("wi/A/01", "note as text", |s| {
        s.add_column("items", ColumnSchema::new("note", "text")).unwrap();
    });
    store.commit_on("main", "note as int", |s| {
        s.add_column("items", ColumnSchema::new("note", "int")).unwrap();
    });

    let mut s = store.session("wi/A/01");
    let summary = s.preview_merge_summary("wi/A/01", "main").unwrap();
    assert_eq!(summary, vec![ConflictSummary::new("items", 0, 1)]);

    s.merge("main", &MergeOptions::default()).unwrap();
    let err = s
        .resolve_conflicts("items", ResolveStrategy::Theirs)
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::SchemaConflictsPresent);
}

#[test]
fn test_merge_with_dangling_reference_reports_violations() {
    let store = setup();
    store.commit_on("main", "owners", |s| {
        s.create_table("owners", vec![ColumnSchema::new("id", "int").primary_key()])
            .unwrap();
        s.add_column(
            "items",
            ColumnSchema::new("owner_id", "int").references("owners", "id"),
        )
        .unwrap();
        s.insert_row("owners", &row(&[("id", json!(1))])).unwrap();
    });
    store.branch("wi/A/01");
    // work branch points item 1 at owner 1 while trunk deletes owner 1
    store.commit_on("wi/A/01", "assign", |s| {
        s.update_row("items", &row(&[("owner_id", json!(1))]), ("id", &json!(1)))
            .unwrap();
    });
    store.commit_on("main", "drop owner", |s| {
        s.delete_row("owners", ("id", &json!(1))).unwrap();
    });

    let mut s = store.session("wi/A/01");
    assert!(s
        .preview_merge_summary("wi/A/01", "main")
        .unwrap()
        .is_empty());
    let outcome = s.merge("main", &MergeOptions::autocommit()).unwrap();
    let MergeOutcome::Conflicted(summary) = outcome else {
        panic!("expected violations");
    };
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].table, "items");
    assert_eq!(summary[0].constraint_violations, 1);
    assert_eq!(summary[0].data_conflicts, 0);
}
