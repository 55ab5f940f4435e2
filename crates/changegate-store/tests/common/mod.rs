//! Shared fixtures for store integration tests

#![allow(dead_code)]

use changegate_core::config::EngineConfig;
use changegate_core::model::{BranchContext, ColumnSchema, Row};
use changegate_core::store::StoreSession;
use changegate_store::{SqliteSession, SqliteSessionFactory};
use serde_json::Value;
use tempfile::TempDir;

pub struct TestStore {
    pub dir: TempDir,
    pub factory: SqliteSessionFactory,
}

impl TestStore {
    pub fn ctx(&self, branch: &str) -> BranchContext {
        BranchContext::new("local", "inventory", branch)
    }

    pub fn session(&self, branch: &str) -> SqliteSession {
        self.factory.open_session(&self.ctx(branch)).unwrap()
    }

    pub fn head(&self, branch: &str) -> String {
        self.session(branch).head().unwrap()
    }

    /// Branch `name` off the trunk's current head
    pub fn branch(&self, name: &str) {
        self.session("main").create_branch(name, "main").unwrap();
    }

    /// Apply `f` to a session on `branch` and commit the result
    pub fn commit_on<F>(&self, branch: &str, message: &str, f: F) -> String
    where
        F: FnOnce(&mut SqliteSession),
    {
        let mut s = self.session(branch);
        f(&mut s);
        s.create_commit(message).unwrap()
    }
}

/// Initialized store with `items(id int pk, name text not null, qty int)`
/// holding rows 1 and 2 on the trunk
pub fn setup() -> TestStore {
    let dir = TempDir::new().unwrap();
    let yaml = format!(
        "targets:\n  - id: local\n    root: {}\n    author: tester <t@example.com>\ndatabases:\n  - target_id: local\n    name: inventory\n",
        dir.path().display()
    );
    let factory = SqliteSessionFactory::new(EngineConfig::from_yaml(&yaml).unwrap());
    factory.init_database("local", "inventory").unwrap();
    let store = TestStore { dir, factory };

    store.commit_on("main", "create items", |s| {
        s.create_table(
            "items",
            vec![
                ColumnSchema::new("id", "int").primary_key(),
                ColumnSchema::new("name", "text").not_null(),
                ColumnSchema::new("qty", "int"),
            ],
        )
        .unwrap();
        s.insert_row("items", &row(&[("id", 1.into()), ("name", "apple".into()), ("qty", 3.into())]))
            .unwrap();
        s.insert_row("items", &row(&[("id", 2.into()), ("name", "pear".into()), ("qty", 5.into())]))
            .unwrap();
    });
    store
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Set one cell of an `items` row and commit
pub fn set_cell(store: &TestStore, branch: &str, id: i64, column: &str, value: Value) -> String {
    store.commit_on(branch, &format!("set {} of {}", column, id), |s| {
        let n = s
            .update_row("items", &row(&[(column, value)]), ("id", &Value::from(id)))
            .unwrap();
        assert_eq!(n, 1);
    })
}
