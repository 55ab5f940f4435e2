//! SQLite-backed [`StoreSession`]
//!
//! A session holds a working snapshot on top of its branch head. Commits are
//! written as content-addressed objects; moving the branch pointer is a
//! compare-and-swap against the head the session last published from, so two
//! sessions racing on one branch cannot both win.

use crate::errors::Result;
use crate::merge::{three_way, MergeResult, RowConflict};
use crate::objects::{self, CommitObject};
use crate::refs;
use crate::snapshot::{Snapshot, TableData};
use crate::values::{coerce, compare, render};
use changegate_core::errors::{ExError, ExErrorKind};
use changegate_core::model::{
    BranchInfo, ColumnSchema, CommitInfo, ConflictSummary, DiffMode, DiffType, FilterOp,
    FlatRow, ResolveStrategy, Row, RowQuery, TagInfo,
};
use changegate_core::store::{MergeOptions, MergeOutcome, StoreSession};
use changegate_core::validation::validate_identifier;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Merge staged in the working set, waiting for resolution and commit
#[derive(Debug)]
struct PendingMerge {
    theirs: String,
    conflicts: BTreeMap<String, Vec<RowConflict>>,
    schema_conflicts: BTreeSet<String>,
}

impl PendingMerge {
    fn clean(theirs: String) -> Self {
        Self {
            theirs,
            conflicts: BTreeMap::new(),
            schema_conflicts: BTreeSet::new(),
        }
    }

    fn from_result(theirs: String, result: &MergeResult) -> Self {
        let mut pending = Self::clean(theirs);
        for (table, merge) in &result.tables {
            if merge.schema_conflict {
                pending.schema_conflicts.insert(table.clone());
            }
            if !merge.conflicts.is_empty() {
                pending
                    .conflicts
                    .insert(table.clone(), merge.conflicts.clone());
            }
        }
        pending
    }

    fn unresolved(&self) -> u64 {
        let data: usize = self.conflicts.values().map(Vec::len).sum();
        (data + self.schema_conflicts.len()) as u64
    }
}

pub struct SqliteSession {
    conn: Connection,
    branch: String,
    author: String,
    head: String,
    working: Snapshot,
    /// Branch head when the open transaction began
    tx_base: Option<String>,
    pending: Option<PendingMerge>,
}

fn branch_not_found(branch: &str) -> ExError {
    ExError::not_found(format!("branch not found: {}", branch)).with_branch(branch)
}

fn no_merge_in_progress() -> ExError {
    ExError::invalid_argument("no merge in progress")
}

fn diff_type_of(from: Option<&Row>, to: Option<&Row>) -> Option<DiffType> {
    match (from, to) {
        (None, Some(_)) => Some(DiffType::Added),
        (Some(_), None) => Some(DiffType::Removed),
        (Some(a), Some(b)) if a != b => Some(DiffType::Modified),
        _ => None,
    }
}

/// Append `<prefix><column>` cells for every column, null when the row is absent
fn push_prefixed(out: &mut FlatRow, prefix: &str, columns: &[ColumnSchema], row: Option<&Row>) {
    for column in columns {
        let value = row
            .and_then(|r| r.get(&column.name))
            .cloned()
            .unwrap_or(Value::Null);
        out.push((format!("{}{}", prefix, column.name), value));
    }
}

impl SqliteSession {
    /// Bind a session to `branch`; `NOT_FOUND` when the branch does not exist
    pub fn open(conn: Connection, branch: &str, author: impl Into<String>) -> Result<Self> {
        let head = refs::branch_head(&conn, branch)?.ok_or_else(|| branch_not_found(branch))?;
        let working = objects::load_commit_tree(&conn, &head)?;
        Ok(Self {
            conn,
            branch: branch.to_string(),
            author: author.into(),
            head,
            working,
            tx_base: None,
            pending: None,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Add a table to the working set. Administrative; commit separately.
    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnSchema>) -> Result<()> {
        validate_identifier("table name", name)?;
        if self.working.tables.contains_key(name) {
            return Err(ExError::invalid_argument(format!("table already exists: {}", name))
                .with_table(name));
        }
        for column in &columns {
            if let Some(fk) = &column.references {
                validate_identifier("table name", &fk.table)?;
                validate_identifier("column name", &fk.column)?;
            }
        }
        let table = TableData::new(columns).map_err(|e| e.with_table(name))?;
        self.working.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// Append a column; existing rows hold null in it
    pub fn add_column(&mut self, table: &str, column: ColumnSchema) -> Result<()> {
        validate_identifier("column name", &column.name)?;
        let data = self.working.table_mut(table)?;
        if column.primary_key {
            return Err(
                ExError::invalid_argument("cannot add a primary key column").with_table(table)
            );
        }
        if data.column(&column.name).is_some() {
            return Err(ExError::invalid_argument(format!(
                "column already exists: {}",
                column.name
            ))
            .with_table(table));
        }
        for row in data.rows.values_mut() {
            row.insert(column.name.clone(), Value::Null);
        }
        data.columns.push(column);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx_base.is_some()
    }

    fn published_head(&self) -> Result<String> {
        refs::branch_head(&self.conn, &self.branch)?.ok_or_else(|| branch_not_found(&self.branch))
    }

    fn is_clean(&self) -> Result<bool> {
        Ok(self.working == objects::load_commit_tree(&self.conn, &self.head)?)
    }

    /// Follow the published head when nothing local would be lost
    fn refresh(&mut self) -> Result<()> {
        if self.in_transaction() || self.pending.is_some() {
            return Ok(());
        }
        let published = self.published_head()?;
        if published != self.head && self.is_clean()? {
            self.working = objects::load_commit_tree(&self.conn, &published)?;
            self.head = published;
        }
        Ok(())
    }

    /// Move the published branch from the local head to `new_head`
    fn publish(&self, new_head: &str) -> Result<()> {
        refs::compare_and_swap(&self.conn, &self.branch, &self.head, new_head)
    }

    fn reset_working(&mut self) -> Result<()> {
        self.working = objects::load_commit_tree(&self.conn, &self.head)?;
        Ok(())
    }

    fn tree_at(&mut self, reference: &str) -> Result<(String, Snapshot)> {
        let hash = self.resolve_ref(reference)?;
        let tree = objects::load_commit_tree(&self.conn, &hash)?;
        Ok((hash, tree))
    }

    /// Ancestor tree for merging `theirs` into `ours`; empty for unrelated histories
    fn base_tree(&self, ours: &str, theirs: &str) -> Result<(Option<String>, Snapshot)> {
        match objects::merge_base(&self.conn, ours, theirs)? {
            Some(base) => {
                let tree = objects::load_commit_tree(&self.conn, &base)?;
                Ok((Some(base), tree))
            }
            None => Ok((None, Snapshot::default())),
        }
    }

    /// Merge of `base_ref` into `branch_ref` without touching the session
    fn dry_merge(
        &mut self,
        branch_ref: &str,
        base_ref: &str,
    ) -> Result<Option<(Option<String>, Snapshot, MergeResult)>> {
        let ours = self.resolve_ref(branch_ref)?;
        let theirs = self.resolve_ref(base_ref)?;
        if objects::is_ancestor(&self.conn, &theirs, &ours)? {
            return Ok(None);
        }
        let (base_hash, base) = self.base_tree(&ours, &theirs)?;
        let ours_tree = objects::load_commit_tree(&self.conn, &ours)?;
        let theirs_tree = objects::load_commit_tree(&self.conn, &theirs)?;
        let result = three_way(&base, &ours_tree, &theirs_tree);
        Ok(Some((base_hash, base, result)))
    }
}

impl StoreSession for SqliteSession {
    fn branch(&self) -> &str {
        &self.branch
    }

    fn head(&mut self) -> Result<String> {
        self.refresh()?;
        Ok(self.head.clone())
    }

    fn resolve_ref(&mut self, reference: &str) -> Result<String> {
        if reference == "HEAD" || reference == self.branch {
            return self.head();
        }
        if let Some(hash) = refs::branch_head(&self.conn, reference)? {
            return Ok(hash);
        }
        if let Some(tag) = refs::find_tag(&self.conn, reference)? {
            return Ok(tag.hash);
        }
        if objects::find_commit(&self.conn, reference)?.is_some() {
            return Ok(reference.to_string());
        }
        Err(ExError::not_found(format!("ref not found: {}", reference)))
    }

    fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(ExError::invalid_argument("transaction already open"));
        }
        self.refresh()?;
        self.tx_base = Some(self.head.clone());
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        let Some(base) = self.tx_base.clone() else {
            return Err(ExError::invalid_argument("no transaction open"));
        };
        if let Some(pending) = &self.pending {
            if pending.unresolved() > 0 {
                return Err(ExError::new(ExErrorKind::MergeConflictsPresent)
                    .with_branch(&self.branch)
                    .with_message("merge has unresolved conflicts"));
            }
            return Err(ExError::invalid_argument(
                "merge in progress; commit or abort it first",
            ));
        }
        if base != self.head {
            refs::compare_and_swap(&self.conn, &self.branch, &base, &self.head)?;
        }
        self.tx_base = None;
        tracing::debug!(branch = %self.branch, head = %self.head, "transaction published");
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.tx_base = None;
        self.pending = None;
        self.head = self.published_head()?;
        self.reset_working()
    }

    fn create_commit(&mut self, message: &str) -> Result<String> {
        let mut parents = vec![self.head.clone()];
        if let Some(pending) = &self.pending {
            if !pending.schema_conflicts.is_empty() {
                return Err(ExError::new(ExErrorKind::SchemaConflictsPresent)
                    .with_branch(&self.branch)
                    .with_message("cannot commit with schema conflicts"));
            }
            if pending.unresolved() > 0 {
                return Err(ExError::new(ExErrorKind::MergeConflictsPresent)
                    .with_branch(&self.branch)
                    .with_message("cannot commit with unresolved conflicts"));
            }
            parents.push(pending.theirs.clone());
        }

        let tree = objects::put_tree(&self.conn, &self.working)?;
        let hash = objects::put_commit(
            &self.conn,
            &CommitObject {
                tree,
                parents,
                message: message.to_string(),
                author: self.author.clone(),
                timestamp: Utc::now(),
            },
        )?;
        if !self.in_transaction() {
            self.publish(&hash)?;
        }
        self.head = hash.clone();
        self.pending = None;
        Ok(hash)
    }

    fn insert_row(&mut self, table: &str, values: &Row) -> Result<u64> {
        self.working
            .table_mut(table)?
            .insert(values)
            .map_err(|e| e.with_table(table))
    }

    fn update_row(&mut self, table: &str, values: &Row, pk: (&str, &Value)) -> Result<u64> {
        self.working
            .table_mut(table)?
            .update(values, pk)
            .map_err(|e| e.with_table(table))
    }

    fn delete_row(&mut self, table: &str, pk: (&str, &Value)) -> Result<u64> {
        self.working
            .table_mut(table)?
            .delete(pk)
            .map_err(|e| e.with_table(table))
    }

    fn verify_constraints(&mut self) -> Result<u64> {
        Ok(self.working.violations().len() as u64)
    }

    fn list_branches(&mut self) -> Result<Vec<BranchInfo>> {
        refs::list_branches(&self.conn)
    }

    fn create_branch(&mut self, name: &str, from_ref: &str) -> Result<()> {
        let hash = self.resolve_ref(from_ref)?;
        refs::create_branch(&self.conn, name, &hash)
    }

    fn delete_branch(&mut self, name: &str, force: bool) -> Result<()> {
        if name == self.branch {
            return Err(ExError::invalid_argument(format!(
                "cannot delete the session's own branch {}",
                name
            )));
        }
        let hash = refs::branch_head(&self.conn, name)?.ok_or_else(|| branch_not_found(name))?;
        if !force && !objects::is_ancestor(&self.conn, &hash, &self.head)? {
            return Err(ExError::invalid_argument(format!(
                "branch {} is not fully merged into {}",
                name, self.branch
            )));
        }
        refs::delete_branch(&self.conn, name)
    }

    fn preview_merge_summary(
        &mut self,
        branch: &str,
        base: &str,
    ) -> Result<Vec<ConflictSummary>> {
        Ok(self
            .dry_merge(branch, base)?
            .map(|(_, _, result)| result.summaries(&BTreeMap::new()))
            .unwrap_or_default())
    }

    fn merge(&mut self, source: &str, options: &MergeOptions) -> Result<MergeOutcome> {
        if self.pending.is_some() {
            return Err(ExError::invalid_argument("a merge is already in progress"));
        }
        let ours = self.head()?;
        let theirs = self.resolve_ref(source)?;

        if objects::is_ancestor(&self.conn, &theirs, &ours)? {
            return Ok(MergeOutcome::Applied {
                hash: ours,
                fast_forward: false,
            });
        }

        if !options.no_ff && self.is_clean()? && objects::is_ancestor(&self.conn, &ours, &theirs)? {
            if !self.in_transaction() {
                self.publish(&theirs)?;
            }
            self.working = objects::load_commit_tree(&self.conn, &theirs)?;
            self.head = theirs.clone();
            return Ok(MergeOutcome::Applied {
                hash: theirs,
                fast_forward: true,
            });
        }

        let (_, base) = self.base_tree(&ours, &theirs)?;
        let theirs_tree = objects::load_commit_tree(&self.conn, &theirs)?;
        let result = three_way(&base, &self.working, &theirs_tree);
        let violations = result.merged.violation_counts();

        if result.has_conflicts() || !violations.is_empty() {
            let summaries = result.summaries(&violations);
            tracing::debug!(
                branch = %self.branch,
                source,
                tables = summaries.len(),
                "merge stopped on conflicts"
            );
            if !options.autocommit {
                self.pending = Some(PendingMerge::from_result(theirs, &result));
                self.working = result.merged;
            }
            return Ok(MergeOutcome::Conflicted(summaries));
        }

        self.working = result.merged;
        self.pending = Some(PendingMerge::clean(theirs));
        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("Merge branch '{}' into {}", source, self.branch));
        match self.create_commit(&message) {
            Ok(hash) => Ok(MergeOutcome::Applied {
                hash,
                fast_forward: false,
            }),
            Err(e) => {
                self.abort_merge()?;
                Err(e)
            }
        }
    }

    fn conflict_count(&mut self) -> Result<u64> {
        Ok(self.pending.as_ref().map(PendingMerge::unresolved).unwrap_or(0))
    }

    fn list_conflict_rows(
        &mut self,
        branch: &str,
        base: &str,
        table: &str,
    ) -> Result<Vec<FlatRow>> {
        let Some((base_hash, base_tree, result)) = self.dry_merge(branch, base)? else {
            return Ok(Vec::new());
        };
        let Some(merge) = result.tables.get(table) else {
            return Ok(Vec::new());
        };
        let columns = result
            .merged
            .tables
            .get(table)
            .or_else(|| base_tree.tables.get(table))
            .map(|t| t.columns.clone())
            .unwrap_or_default();
        let root = base_hash.map(Value::String).unwrap_or(Value::Null);

        Ok(merge
            .conflicts
            .iter()
            .map(|c| {
                let mut out = FlatRow::new();
                push_prefixed(&mut out, "base_", &columns, c.base.as_ref());
                push_prefixed(&mut out, "our_", &columns, c.ours.as_ref());
                let ours_change = diff_type_of(c.base.as_ref(), c.ours.as_ref())
                    .unwrap_or(DiffType::Modified);
                out.push(("our_diff_type".into(), ours_change.as_str().into()));
                push_prefixed(&mut out, "their_", &columns, c.theirs.as_ref());
                let theirs_change = diff_type_of(c.base.as_ref(), c.theirs.as_ref())
                    .unwrap_or(DiffType::Modified);
                out.push(("their_diff_type".into(), theirs_change.as_str().into()));
                out.push(("from_root_ish".into(), root.clone()));
                out
            })
            .collect())
    }

    fn resolve_conflicts(&mut self, table: &str, strategy: ResolveStrategy) -> Result<()> {
        let pending = self.pending.as_mut().ok_or_else(no_merge_in_progress)?;
        if pending.schema_conflicts.contains(table) {
            return Err(ExError::new(ExErrorKind::SchemaConflictsPresent)
                .with_table(table)
                .with_message("schema conflicts cannot be resolved with a strategy"));
        }
        let Some(conflicts) = pending.conflicts.remove(table) else {
            return Ok(());
        };
        if strategy == ResolveStrategy::Ours {
            return Ok(());
        }
        let data = self.working.table_mut(table)?;
        for conflict in conflicts {
            match conflict.theirs {
                Some(row) => {
                    let row = data.complete_row(&row);
                    data.rows.insert(conflict.key, row);
                }
                None => {
                    data.rows.remove(&conflict.key);
                }
            }
        }
        Ok(())
    }

    fn abort_merge(&mut self) -> Result<()> {
        if self.pending.take().is_some() {
            self.reset_working()?;
        }
        Ok(())
    }

    fn create_tag(&mut self, name: &str, target_ref: &str, message: &str) -> Result<()> {
        let hash = self.resolve_ref(target_ref)?;
        refs::create_tag(&self.conn, name, &hash, message)
    }

    fn delete_tag(&mut self, name: &str) -> Result<()> {
        refs::delete_tag(&self.conn, name)
    }

    fn list_tags(&mut self, prefix: &str) -> Result<Vec<TagInfo>> {
        refs::list_tags(&self.conn, prefix)
    }

    fn diff(
        &mut self,
        from_ref: &str,
        to_ref: &str,
        table: &str,
        mode: DiffMode,
    ) -> Result<Vec<FlatRow>> {
        let (from_tree, to_tree) = self.diff_trees(from_ref, to_ref, mode)?;
        let from = from_tree.tables.get(table);
        let to = to_tree.tables.get(table);
        let (from_columns, to_columns) = match (from, to) {
            (None, None) => {
                return Err(ExError::not_found(format!("table not found: {}", table))
                    .with_table(table))
            }
            (Some(f), None) => (f.columns.clone(), f.columns.clone()),
            (None, Some(t)) => (t.columns.clone(), t.columns.clone()),
            (Some(f), Some(t)) => (f.columns.clone(), t.columns.clone()),
        };

        let keys: BTreeSet<&String> = from
            .into_iter()
            .flat_map(|t| t.rows.keys())
            .chain(to.into_iter().flat_map(|t| t.rows.keys()))
            .collect();

        let mut out = Vec::new();
        for key in keys {
            let before = from.and_then(|t| t.rows.get(key));
            let after = to.and_then(|t| t.rows.get(key));
            let Some(kind) = diff_type_of(before, after) else {
                continue;
            };
            let mut row = FlatRow::new();
            row.push(("diff_type".into(), kind.as_str().into()));
            push_prefixed(&mut row, "from_", &from_columns, before);
            push_prefixed(&mut row, "to_", &to_columns, after);
            out.push(row);
        }
        Ok(out)
    }

    fn changed_tables(
        &mut self,
        from_ref: &str,
        to_ref: &str,
        mode: DiffMode,
    ) -> Result<Vec<String>> {
        let (from_tree, to_tree) = self.diff_trees(from_ref, to_ref, mode)?;
        let names: BTreeSet<&String> = from_tree
            .tables
            .keys()
            .chain(to_tree.tables.keys())
            .collect();
        Ok(names
            .into_iter()
            .filter(|name| from_tree.tables.get(*name) != to_tree.tables.get(*name))
            .cloned()
            .collect())
    }

    fn log(&mut self, reference: &str) -> Result<Vec<CommitInfo>> {
        let hash = self.resolve_ref(reference)?;
        let mut commits: Vec<CommitInfo> = objects::ancestors(&self.conn, &hash)?
            .into_iter()
            .map(|(hash, c)| CommitInfo {
                hash,
                author: c.author,
                message: c.message,
                timestamp: c.timestamp,
                parents: c.parents,
            })
            .collect();
        commits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(commits)
    }

    fn row_history(&mut self, table: &str, pk: (&str, &Value), limit: usize) -> Result<Vec<Row>> {
        let key = self.working.table(table)?.key_for(pk.0, pk.1)?;
        let commits = self.log("HEAD")?;

        // Oldest first, keeping each commit that changed the row
        let mut versions: Vec<Row> = Vec::new();
        let mut previous: Option<Row> = None;
        for commit in commits.iter().rev() {
            let tree = objects::load_commit_tree(&self.conn, &commit.hash)?;
            let current = tree
                .tables
                .get(table)
                .and_then(|t| t.rows.get(&key))
                .cloned();
            if current != previous {
                if let Some(row) = &current {
                    let mut version = row.clone();
                    version.insert("commit_hash".into(), commit.hash.clone().into());
                    version.insert("committer".into(), commit.author.clone().into());
                    version.insert("commit_date".into(), commit.timestamp.to_rfc3339().into());
                    versions.push(version);
                }
                previous = current;
            }
        }
        versions.reverse();
        versions.truncate(limit);
        Ok(versions)
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.working.tables.keys().cloned().collect())
    }

    fn table_schema(&mut self, table: &str) -> Result<Vec<ColumnSchema>> {
        Ok(self.working.table(table)?.columns.clone())
    }

    fn query_rows(&mut self, table: &str, query: &RowQuery) -> Result<(Vec<Row>, u64)> {
        let data = self.working.table(table)?;
        let mut matchers = Vec::with_capacity(query.filters.len());
        for filter in &query.filters {
            filter.validate()?;
            let column = data.column(&filter.column).ok_or_else(|| {
                ExError::invalid_argument(format!("unknown filter column: {}", filter.column))
                    .with_table(table)
            })?;
            let targets = match (&filter.op, &filter.value) {
                (FilterOp::In, Value::Array(items)) => items
                    .iter()
                    .map(|v| coerce(column, v))
                    .collect::<Result<Vec<_>>>()?,
                (FilterOp::Contains, v) => vec![Value::String(render(v))],
                (_, v) => vec![coerce(column, v)?],
            };
            matchers.push((filter.column.as_str(), filter.op, targets));
        }
        for key in &query.sort {
            if data.column(&key.column).is_none() {
                return Err(ExError::invalid_argument(format!(
                    "unknown sort column: {}",
                    key.column
                ))
                .with_table(table));
            }
        }

        let mut rows: Vec<&Row> = data
            .rows
            .values()
            .filter(|row| {
                matchers.iter().all(|(column, op, targets)| {
                    let cell = row.get(*column).unwrap_or(&Value::Null);
                    match op {
                        FilterOp::Contains => targets
                            .iter()
                            .any(|t| render(cell).contains(render(t).as_str())),
                        FilterOp::Eq | FilterOp::In => targets.iter().any(|t| t == cell),
                    }
                })
            })
            .collect();

        let pk = data.pk_column()?.name.clone();
        rows.sort_by(|a, b| {
            let null = Value::Null;
            for key in &query.sort {
                let x = a.get(&key.column).unwrap_or(&null);
                let y = b.get(&key.column).unwrap_or(&null);
                let ord = if key.descending {
                    compare(y, x)
                } else {
                    compare(x, y)
                };
                if ord.is_ne() {
                    return ord;
                }
            }
            compare(a.get(&pk).unwrap_or(&null), b.get(&pk).unwrap_or(&null))
        });

        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    fn count_existing(&mut self, table: &str, pk_column: &str, values: &[Value]) -> Result<u64> {
        let data = self.working.table(table)?;
        let wanted: BTreeSet<String> = values
            .iter()
            .filter_map(|v| data.key_for(pk_column, v).ok())
            .collect();
        Ok(wanted.iter().filter(|k| data.rows.contains_key(*k)).count() as u64)
    }

    fn canonical_keys(
        &mut self,
        table: &str,
        pk_column: &str,
        values: &[Value],
    ) -> Result<Vec<Option<String>>> {
        let data = self.working.table(table)?;
        Ok(values
            .iter()
            .map(|v| data.key_for(pk_column, v).ok())
            .collect())
    }
}

impl SqliteSession {
    fn diff_trees(
        &mut self,
        from_ref: &str,
        to_ref: &str,
        mode: DiffMode,
    ) -> Result<(Snapshot, Snapshot)> {
        let (from_hash, from_tree) = self.tree_at(from_ref)?;
        let (to_hash, to_tree) = self.tree_at(to_ref)?;
        let from_tree = match mode {
            DiffMode::TwoDot => from_tree,
            DiffMode::ThreeDot => match objects::merge_base(&self.conn, &from_hash, &to_hash)? {
                Some(base) => objects::load_commit_tree(&self.conn, &base)?,
                None => from_tree,
            },
        };
        Ok((from_tree, to_tree))
    }
}

