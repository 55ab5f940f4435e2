//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use changegate_core::config::EngineConfig;
use changegate_core::model::{BranchContext, ColumnSchema, Row, RowOp, RowQuery};
use changegate_core::store::StoreSession;
use changegate_engine::commands::common::DatabaseRef;
use changegate_engine::commands::write::{apply_write, WriteRequest};
use changegate_store::{SqliteSession, SqliteSessionFactory};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const TARGET: &str = "local";
pub const DATABASE: &str = "inventory";

pub struct TestEnv {
    pub dir: TempDir,
    pub config: EngineConfig,
    pub factory: SqliteSessionFactory,
}

impl TestEnv {
    pub fn ctx(&self, branch: &str) -> BranchContext {
        BranchContext::new(TARGET, DATABASE, branch)
    }

    pub fn db(&self) -> DatabaseRef {
        DatabaseRef::new(TARGET, DATABASE)
    }

    /// Admin session; bypasses the engine's trunk guard
    pub fn session(&self, branch: &str) -> SqliteSession {
        self.factory.open_session(&self.ctx(branch)).unwrap()
    }

    pub fn head(&self, branch: &str) -> String {
        self.session(branch).head().unwrap()
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.session("main")
            .list_branches()
            .unwrap()
            .iter()
            .any(|b| b.name == name)
    }

    /// Branch `name` off the trunk's current head
    pub fn branch(&self, name: &str) -> String {
        let mut s = self.session("main");
        s.create_branch(name, "main").unwrap();
        s.resolve_ref(name).unwrap()
    }

    /// Commit directly on the trunk, standing in for an earlier approval
    pub fn commit_on_trunk<F>(&self, message: &str, f: F) -> String
    where
        F: FnOnce(&mut SqliteSession),
    {
        let mut s = self.session("main");
        f(&mut s);
        s.create_commit(message).unwrap()
    }

    /// Apply `ops` on a work branch through the engine
    pub fn write(&self, branch: &str, ops: Vec<RowOp>) -> String {
        let req = WriteRequest {
            ctx: self.ctx(branch),
            expected_head: self.head(branch),
            commit_message: "edit".to_string(),
            ops,
        };
        apply_write(&self.factory, &req).unwrap().hash
    }

    pub fn set_qty(&self, branch: &str, id: i64, qty: i64) -> String {
        self.write(branch, vec![update_qty(id, qty)])
    }

    pub fn set_trunk_qty(&self, id: i64, qty: i64) -> String {
        self.commit_on_trunk(&format!("qty of {}", id), |s| {
            s.update_row("items", &row(&[("qty", json!(qty))]), ("id", &json!(id)))
                .unwrap();
        })
    }

    /// All `items` rows on `branch`, ordered by key
    pub fn items(&self, branch: &str) -> Vec<Row> {
        self.session(branch)
            .query_rows("items", &RowQuery::default())
            .unwrap()
            .0
    }

    pub fn item(&self, branch: &str, id: i64) -> Option<Row> {
        self.items(branch)
            .into_iter()
            .find(|r| r.get("id") == Some(&json!(id)))
    }
}

/// Initialized store with `items(id int pk, name text not null, qty int)`
/// holding rows 1 and 2 on the trunk
pub fn setup() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "targets:\n  - id: {TARGET}\n    root: {}\n    author: tester <t@example.com>\ndatabases:\n  - target_id: {TARGET}\n    name: {DATABASE}\nlogging:\n  profile: test\n",
        dir.path().display()
    );
    let config = EngineConfig::from_yaml(&yaml).unwrap();
    let factory = SqliteSessionFactory::new(config.clone());
    factory.init_database(TARGET, DATABASE).unwrap();
    let env = TestEnv {
        dir,
        config,
        factory,
    };

    env.commit_on_trunk("create items", |s| {
        s.create_table(
            "items",
            vec![
                ColumnSchema::new("id", "int").primary_key(),
                ColumnSchema::new("name", "text").not_null(),
                ColumnSchema::new("qty", "int"),
            ],
        )
        .unwrap();
        s.insert_row("items", &item_row(1, "apple", 3)).unwrap();
        s.insert_row("items", &item_row(2, "pear", 5)).unwrap();
    });
    env
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn item_row(id: i64, name: &str, qty: i64) -> Row {
    row(&[("id", json!(id)), ("name", json!(name)), ("qty", json!(qty))])
}

pub fn update_qty(id: i64, qty: i64) -> RowOp {
    RowOp::update("items", "id", json!(id), row(&[("qty", json!(qty))]))
}
