//! Integration tests for the SQLite session: commits, transactions, refs,
//! browsing and history

mod common;

use changegate_core::errors::ExErrorKind;
use changegate_core::model::{DiffMode, Filter, FilterOp, RowQuery, SortKey};
use changegate_core::store::StoreSession;
use common::{row, set_cell, setup};
use serde_json::{json, Value};

#[test]
fn test_commit_outside_transaction_publishes() {
    let store = setup();
    let before = store.head("main");
    store.branch("wi/A/01");

    let new_head = set_cell(&store, "wi/A/01", 1, "qty", json!(9));

    assert_ne!(new_head, before);
    assert_eq!(store.head("wi/A/01"), new_head);
    assert_eq!(store.head("main"), before);
}

#[test]
fn test_rollback_discards_transaction() {
    let store = setup();
    store.branch("wi/A/01");
    let before = store.head("wi/A/01");

    let mut s = store.session("wi/A/01");
    s.begin_transaction().unwrap();
    s.insert_row("items", &row(&[("id", json!(3)), ("name", json!("fig"))]))
        .unwrap();
    s.create_commit("add fig").unwrap();
    s.rollback_transaction().unwrap();

    assert_eq!(s.head().unwrap(), before);
    assert_eq!(store.head("wi/A/01"), before);
    let (rows, total) = s.query_rows("items", &RowQuery::default()).unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_transaction_publish_loses_race_with_stale_head() {
    let store = setup();
    store.branch("wi/A/01");
    let start = store.head("wi/A/01");

    let mut first = store.session("wi/A/01");
    let mut second = store.session("wi/A/01");
    first.begin_transaction().unwrap();
    second.begin_transaction().unwrap();

    first
        .update_row("items", &row(&[("qty", json!(10))]), ("id", &json!(1)))
        .unwrap();
    first.create_commit("first").unwrap();
    second
        .update_row("items", &row(&[("qty", json!(20))]), ("id", &json!(1)))
        .unwrap();
    second.create_commit("second").unwrap();

    first.commit_transaction().unwrap();
    let err = second.commit_transaction().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::StaleHead);
    assert_eq!(err.detail_str("expected_head"), Some(start.as_str()));
    second.rollback_transaction().unwrap();

    let published = store.head("wi/A/01");
    assert_eq!(first.head().unwrap(), published);
    let mut reader = store.session("wi/A/01");
    let (rows, _) = reader
        .query_rows(
            "items",
            &RowQuery {
                filters: vec![Filter::eq("id", 1)],
                ..RowQuery::default()
            },
        )
        .unwrap();
    assert_eq!(rows[0].get("qty"), Some(&json!(10)));
}

#[test]
fn test_update_and_delete_of_missing_row_affect_nothing() {
    let store = setup();
    let mut s = store.session("main");
    assert_eq!(
        s.update_row("items", &row(&[("qty", json!(1))]), ("id", &json!(99)))
            .unwrap(),
        0
    );
    assert_eq!(s.delete_row("items", ("id", &json!(99))).unwrap(), 0);
    assert_eq!(s.delete_row("items", ("id", &json!("2"))).unwrap(), 1);
}

#[test]
fn test_verify_constraints_counts_not_null() {
    let store = setup();
    let mut s = store.session("main");
    s.insert_row("items", &row(&[("id", json!(7))])).unwrap();
    assert_eq!(s.verify_constraints().unwrap(), 1);
}

#[test]
fn test_unknown_table_is_not_found() {
    let store = setup();
    let mut s = store.session("main");
    let err = s.insert_row("ghosts", &row(&[("id", json!(1))])).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(err.table(), Some("ghosts"));
}

#[test]
fn test_refs_resolve_branches_tags_and_hashes() {
    let store = setup();
    let mut s = store.session("main");
    let head = s.head().unwrap();
    s.create_tag("release/1", "main", "first").unwrap();

    assert_eq!(s.resolve_ref("HEAD").unwrap(), head);
    assert_eq!(s.resolve_ref("release/1").unwrap(), head);
    assert_eq!(s.resolve_ref(&head).unwrap(), head);
    assert_eq!(
        s.resolve_ref("missing").unwrap_err().kind(),
        ExErrorKind::NotFound
    );

    let tags = s.list_tags("release/").unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].message, "first");
    s.delete_tag("release/1").unwrap();
    assert!(s.list_tags("release/").unwrap().is_empty());
}

#[test]
fn test_delete_branch_requires_force_when_unmerged() {
    let store = setup();
    store.branch("wi/A/01");
    set_cell(&store, "wi/A/01", 1, "qty", json!(4));

    let mut s = store.session("main");
    let err = s.delete_branch("wi/A/01", false).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidArgument);
    s.delete_branch("wi/A/01", true).unwrap();
    assert!(s
        .list_branches()
        .unwrap()
        .iter()
        .all(|b| b.name != "wi/A/01"));
    assert!(s.delete_branch("main", true).is_err());
}

#[test]
fn test_query_rows_filters_sorts_and_pages() {
    let store = setup();
    store.commit_on("main", "more", |s| {
        for (id, name, qty) in [(3, "plum", 5), (4, "apricot", 1)] {
            s.insert_row(
                "items",
                &row(&[("id", json!(id)), ("name", json!(name)), ("qty", json!(qty))]),
            )
            .unwrap();
        }
    });
    let mut s = store.session("main");

    let query = RowQuery {
        filters: vec![Filter {
            column: "name".into(),
            op: FilterOp::Contains,
            value: json!("p"),
        }],
        sort: SortKey::parse_list("-qty").unwrap(),
        offset: 0,
        limit: Some(2),
    };
    let (rows, total) = s.query_rows("items", &query).unwrap();
    assert_eq!(total, 4);
    let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
    // qty 5 ties break on the primary key
    assert_eq!(ids, vec![json!(2), json!(3)]);

    let query = RowQuery {
        filters: vec![Filter {
            column: "id".into(),
            op: FilterOp::In,
            value: json!(["1", 4]),
        }],
        ..RowQuery::default()
    };
    let (rows, total) = s.query_rows("items", &query).unwrap();
    assert_eq!(total, 2);
    assert_eq!(rows[1]["name"], json!("apricot"));

    let bad = RowQuery {
        filters: vec![Filter::eq("nope", 1)],
        ..RowQuery::default()
    };
    assert_eq!(
        s.query_rows("items", &bad).unwrap_err().kind(),
        ExErrorKind::InvalidArgument
    );
}

#[test]
fn test_count_existing_ignores_duplicates_and_bad_keys() {
    let store = setup();
    let mut s = store.session("main");
    let n = s
        .count_existing(
            "items",
            "id",
            &[json!(1), json!("1"), json!(2), json!("x"), json!(42)],
        )
        .unwrap();
    assert_eq!(n, 2);
}

#[test]
fn test_canonical_keys_follow_column_type() {
    let store = setup();
    let mut s = store.session("main");
    let keys = s
        .canonical_keys("items", "id", &[json!(1), json!("01"), json!("x")])
        .unwrap();
    assert_eq!(keys[0], keys[1]);
    assert!(keys[0].is_some());
    assert_eq!(keys[2], None);
}

#[test]
fn test_diff_two_dot_and_three_dot() {
    let store = setup();
    store.branch("wi/A/01");
    set_cell(&store, "wi/A/01", 1, "qty", json!(30));
    set_cell(&store, "main", 2, "qty", json!(50));

    let mut s = store.session("wi/A/01");
    let two_dot = s.diff("main", "wi/A/01", "items", DiffMode::TwoDot).unwrap();
    assert_eq!(two_dot.len(), 2);

    let three_dot = s
        .diff("main", "wi/A/01", "items", DiffMode::ThreeDot)
        .unwrap();
    assert_eq!(three_dot.len(), 1);
    let cells: std::collections::BTreeMap<_, _> = three_dot[0].iter().cloned().collect();
    assert_eq!(cells["diff_type"], json!("modified"));
    assert_eq!(cells["from_qty"], json!(3));
    assert_eq!(cells["to_qty"], json!(30));

    assert_eq!(
        s.changed_tables("main", "wi/A/01", DiffMode::ThreeDot)
            .unwrap(),
        vec!["items".to_string()]
    );
}

#[test]
fn test_log_and_row_history_newest_first() {
    let store = setup();
    set_cell(&store, "main", 1, "qty", json!(4));
    set_cell(&store, "main", 2, "qty", json!(6));
    set_cell(&store, "main", 1, "qty", json!(8));

    let mut s = store.session("main");
    let log = s.log("main").unwrap();
    assert_eq!(log[0].message, "set qty of 1");
    assert_eq!(log.last().map(|c| c.parents.len()), Some(0));

    let history = s.row_history("items", ("id", &json!(1)), 10).unwrap();
    let qtys: Vec<Value> = history.iter().map(|r| r["qty"].clone()).collect();
    assert_eq!(qtys, vec![json!(8), json!(4), json!(3)]);
    assert_eq!(history[0]["committer"], json!("tester <t@example.com>"));
    assert!(history[0].contains_key("commit_date"));

    let limited = s.row_history("items", ("id", &json!(1)), 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_add_column_backfills_null() {
    let store = setup();
    store.commit_on("main", "add note", |s| {
        s.add_column(
            "items",
            changegate_core::model::ColumnSchema::new("note", "text"),
        )
        .unwrap();
    });
    let mut s = store.session("main");
    let schema = s.table_schema("items").unwrap();
    assert_eq!(schema.len(), 4);
    let (rows, _) = s.query_rows("items", &RowQuery::default()).unwrap();
    assert!(rows.iter().all(|r| r["note"].is_null()));
}
