//! Integration tests for metadata and table browsing

mod common;

use changegate_core::errors::ExErrorKind;
use changegate_core::model::{ColumnSchema, Filter, FilterOp, RowOp};
use changegate_engine::commands::browse::{
    create_branch, delete_branch, get_head, list_branches, list_databases, list_tables,
    list_targets, table_row, table_rows, table_schema, DatabaseSummary, RowsRequest,
    TargetSummary,
};
use common::{item_row, row, setup, TestEnv};
use serde_json::{json, Value};

/// Work branch holding items 1..=5
fn stocked(env: &TestEnv) {
    env.branch("wi/Proj/01");
    env.write(
        "wi/Proj/01",
        vec![
            RowOp::insert("items", item_row(3, "plum", 9)),
            RowOp::insert("items", item_row(4, "apricot", 1)),
            RowOp::insert("items", item_row(5, "grape", 5)),
        ],
    );
}

fn rows_req(env: &TestEnv) -> RowsRequest {
    RowsRequest {
        ctx: env.ctx("wi/Proj/01"),
        table: "items".to_string(),
        filters: Vec::new(),
        sort: String::new(),
        page: 1,
        page_size: 50,
    }
}

fn ids(rows: &[changegate_core::model::Row]) -> Vec<Value> {
    rows.iter().map(|r| r["id"].clone()).collect()
}

#[test]
fn test_targets_and_databases_come_from_config() {
    let env = setup();
    assert_eq!(
        list_targets(&env.config),
        vec![TargetSummary {
            id: "local".to_string()
        }]
    );
    assert_eq!(
        list_databases(&env.config, "local").unwrap(),
        vec![DatabaseSummary {
            name: "inventory".to_string()
        }]
    );
    let err = list_databases(&env.config, "remote").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_branch_create_list_delete() {
    let env = setup();
    let created = create_branch(&env.factory, &env.db(), "wi/Proj/01").unwrap();
    assert_eq!(created.hash, env.head("main"));

    let names: Vec<String> = list_branches(&env.factory, &env.db())
        .unwrap()
        .into_iter()
        .map(|b| b.name)
        .collect();
    assert!(names.contains(&"main".to_string()));
    assert!(names.contains(&"wi/Proj/01".to_string()));

    let head = get_head(&env.factory, &env.db(), "wi/Proj/01").unwrap();
    assert_eq!(head.hash, created.hash);

    delete_branch(&env.factory, &env.db(), "wi/Proj/01").unwrap();
    assert!(!env.branch_exists("wi/Proj/01"));
}

#[test]
fn test_branch_guards() {
    let env = setup();
    assert_eq!(
        create_branch(&env.factory, &env.db(), "main").unwrap_err().kind(),
        ExErrorKind::Forbidden
    );
    assert_eq!(
        delete_branch(&env.factory, &env.db(), "main").unwrap_err().kind(),
        ExErrorKind::Forbidden
    );
    assert_eq!(
        create_branch(&env.factory, &env.db(), "wi/bad name").unwrap_err().kind(),
        ExErrorKind::InvalidArgument
    );
    assert_eq!(
        delete_branch(&env.factory, &env.db(), "wi/Gone/01").unwrap_err().kind(),
        ExErrorKind::NotFound
    );
    assert_eq!(
        get_head(&env.factory, &env.db(), "nowhere").unwrap_err().kind(),
        ExErrorKind::NotFound
    );
}

#[test]
fn test_list_tables_hides_internal_tables() {
    let env = setup();
    env.commit_on_trunk("internal", |s| {
        s.create_table(
            "dolt_docs",
            vec![ColumnSchema::new("doc_name", "text").primary_key()],
        )
        .unwrap();
    });
    assert_eq!(
        list_tables(&env.factory, &env.ctx("main")).unwrap(),
        vec!["items".to_string()]
    );
}

#[test]
fn test_table_schema_lists_columns() {
    let env = setup();
    let schema = table_schema(&env.factory, &env.ctx("main"), "items").unwrap();
    let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "qty"]);
    assert!(schema.columns[0].primary_key);
    assert!(!schema.columns[1].nullable);

    let err = table_schema(&env.factory, &env.ctx("main"), "owners").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);
}

#[test]
fn test_rows_default_to_key_order_with_total() {
    let env = setup();
    stocked(&env);
    let page = table_rows(&env.factory, &rows_req(&env)).unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(ids(&page.rows), vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
}

#[test]
fn test_rows_sort_appends_key_for_ties() {
    let env = setup();
    stocked(&env);
    let mut req = rows_req(&env);
    req.sort = "-qty".to_string();
    let page = table_rows(&env.factory, &req).unwrap();
    // qty: 1→3, 2→5, 3→9, 4→1, 5→5
    assert_eq!(ids(&page.rows), vec![json!(3), json!(2), json!(5), json!(1), json!(4)]);
}

#[test]
fn test_rows_paging() {
    let env = setup();
    stocked(&env);
    let mut req = rows_req(&env);
    req.page = 2;
    req.page_size = 2;
    let page = table_rows(&env.factory, &req).unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.page, 2);
    assert_eq!(ids(&page.rows), vec![json!(3), json!(4)]);

    req.page = 4;
    let page = table_rows(&env.factory, &req).unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total_count, 5);
}

#[test]
fn test_rows_filters_combine_with_and() {
    let env = setup();
    stocked(&env);
    let mut req = rows_req(&env);
    req.filters = vec![
        Filter {
            column: "name".to_string(),
            op: FilterOp::Contains,
            value: json!("p"),
        },
        Filter {
            column: "qty".to_string(),
            op: FilterOp::In,
            value: json!([1, 3, 9]),
        },
    ];
    let page = table_rows(&env.factory, &req).unwrap();
    // apple(3), plum(9), apricot(1) contain "p"; pear(5) and grape(5) are out on qty
    assert_eq!(ids(&page.rows), vec![json!(1), json!(3), json!(4)]);
    assert_eq!(page.total_count, 3);

    req.filters = vec![Filter::eq("name", "grape")];
    let page = table_rows(&env.factory, &req).unwrap();
    assert_eq!(ids(&page.rows), vec![json!(5)]);
}

#[test]
fn test_rows_reject_bad_requests() {
    let env = setup();
    stocked(&env);

    let mut unknown_filter = rows_req(&env);
    unknown_filter.filters = vec![Filter::eq("colour", "red")];
    let err = table_rows(&env.factory, &unknown_filter).unwrap_err();
    assert_eq!(err.message(), "unknown column in filter: colour");

    let mut unknown_sort = rows_req(&env);
    unknown_sort.sort = "price".to_string();
    let err = table_rows(&env.factory, &unknown_sort).unwrap_err();
    assert_eq!(err.message(), "unknown column in sort: price");

    let mut not_array = rows_req(&env);
    not_array.filters = vec![Filter {
        column: "id".to_string(),
        op: FilterOp::In,
        value: json!(1),
    }];
    assert_eq!(
        table_rows(&env.factory, &not_array).unwrap_err().kind(),
        ExErrorKind::InvalidArgument
    );

    for (page, page_size) in [(0, 10), (1, 0), (1, 1001), (usize::MAX, 1000)] {
        let mut req = rows_req(&env);
        req.page = page;
        req.page_size = page_size;
        assert_eq!(
            table_rows(&env.factory, &req).unwrap_err().kind(),
            ExErrorKind::InvalidArgument
        );
    }
}

#[test]
fn test_table_row_by_key() {
    let env = setup();
    let found = table_row(
        &env.factory,
        &env.ctx("main"),
        "items",
        &row(&[("id", json!(2))]),
    )
    .unwrap();
    assert_eq!(found["name"], json!("pear"));

    let err = table_row(
        &env.factory,
        &env.ctx("main"),
        "items",
        &row(&[("id", json!(9))]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::NotFound);

    let err = table_row(
        &env.factory,
        &env.ctx("main"),
        "items",
        &row(&[("id", json!(1)), ("name", json!("apple"))]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidArgument);
}
