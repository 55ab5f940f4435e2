//! Versioned store capability consumed by the engine
//!
//! A [`SessionFactory`] hands out one [`StoreSession`] per logical
//! operation, bound to one (target, database, branch) context. Sessions are
//! never shared across branches.
//!
//! Adapters normalize their merge primitive into [`MergeOutcome`]: a merge
//! that stops on conflicts returns `Conflicted`, it never returns an error
//! that the engine would have to classify by text.

use crate::errors::Result;
use crate::model::{
    BranchContext, BranchInfo, ColumnSchema, CommitInfo, ConflictSummary, DiffMode, FlatRow,
    ResolveStrategy, Row, RowQuery, TagInfo,
};
use serde_json::Value;

/// Options for [`StoreSession::merge`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Always create a merge commit, even when a fast-forward is possible
    pub no_ff: bool,
    /// Roll a conflicted merge back before returning `Conflicted`. Without
    /// it the conflicts stay pending in the session for resolution.
    pub autocommit: bool,
    /// Commit message; adapters generate `Merge branch '<src>' into <dst>`
    /// when absent.
    pub message: Option<String>,
}

impl MergeOptions {
    pub fn autocommit() -> Self {
        Self {
            autocommit: true,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Result of merging another ref into the session's branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Branch head after the merge (unchanged when already up to date)
    Applied { hash: String, fast_forward: bool },
    /// Per-table conflict counts; nothing was published
    Conflicted(Vec<ConflictSummary>),
}

impl MergeOutcome {
    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted(_))
    }
}

/// Primitive operations of a branchable, commit-oriented data store.
///
/// Row mutations only touch the session's working set; they become visible
/// to other sessions once committed with [`StoreSession::create_commit`]
/// and published (immediately outside a transaction, on
/// [`StoreSession::commit_transaction`] inside one).
pub trait StoreSession: Send {
    /// Branch this session is bound to
    fn branch(&self) -> &str;

    /// Head commit of the session's branch
    fn head(&mut self) -> Result<String>;

    /// Resolve a branch, tag or commit hash to a commit hash
    fn resolve_ref(&mut self, reference: &str) -> Result<String>;

    fn begin_transaction(&mut self) -> Result<()>;

    /// Publish everything committed inside the transaction. Fails with
    /// `STALE_HEAD` if the branch moved since the transaction began.
    fn commit_transaction(&mut self) -> Result<()>;

    /// Discard the working set and any commits made inside the transaction
    fn rollback_transaction(&mut self) -> Result<()>;

    /// Commit the working set (and a pending merge, if any); returns the new head
    fn create_commit(&mut self, message: &str) -> Result<String>;

    /// Insert one row; returns rows affected
    fn insert_row(&mut self, table: &str, values: &Row) -> Result<u64>;

    /// Update the row addressed by `pk`; returns rows affected (0 when absent)
    fn update_row(&mut self, table: &str, values: &Row, pk: (&str, &Value)) -> Result<u64>;

    /// Delete the row addressed by `pk`; returns rows affected
    fn delete_row(&mut self, table: &str, pk: (&str, &Value)) -> Result<u64>;

    /// Number of NOT NULL / foreign key violations in the working set
    fn verify_constraints(&mut self) -> Result<u64>;

    fn list_branches(&mut self) -> Result<Vec<BranchInfo>>;

    fn create_branch(&mut self, name: &str, from_ref: &str) -> Result<()>;

    fn delete_branch(&mut self, name: &str, force: bool) -> Result<()>;

    /// Conflicts merging `base` into `branch` would produce, per table.
    /// Read-only.
    fn preview_merge_summary(&mut self, branch: &str, base: &str)
        -> Result<Vec<ConflictSummary>>;

    /// Merge `source` into the session's branch. A clean merge is committed
    /// right away (published on `commit_transaction` inside a transaction).
    fn merge(&mut self, source: &str, options: &MergeOptions) -> Result<MergeOutcome>;

    /// Unresolved conflicts of the pending merge (0 when none)
    fn conflict_count(&mut self) -> Result<u64>;

    /// Conflicting rows of one table with `base_`/`our_`/`their_` prefixed
    /// columns; unprefixed columns are shared by all three versions.
    fn list_conflict_rows(&mut self, branch: &str, base: &str, table: &str)
        -> Result<Vec<FlatRow>>;

    /// Resolve every data conflict of `table` in the pending merge
    fn resolve_conflicts(&mut self, table: &str, strategy: ResolveStrategy) -> Result<()>;

    /// Drop a pending merge; a no-op when nothing is pending
    fn abort_merge(&mut self) -> Result<()>;

    fn create_tag(&mut self, name: &str, target_ref: &str, message: &str) -> Result<()>;

    fn delete_tag(&mut self, name: &str) -> Result<()>;

    /// Tags whose names start with `prefix`, ordered by name
    fn list_tags(&mut self, prefix: &str) -> Result<Vec<TagInfo>>;

    /// Row differences of `table` with `diff_type`, `from_*` and `to_*` columns
    fn diff(&mut self, from_ref: &str, to_ref: &str, table: &str, mode: DiffMode)
        -> Result<Vec<FlatRow>>;

    /// Tables that differ between two refs
    fn changed_tables(&mut self, from_ref: &str, to_ref: &str, mode: DiffMode)
        -> Result<Vec<String>>;

    /// Commits reachable from `reference`, newest first
    fn log(&mut self, reference: &str) -> Result<Vec<CommitInfo>>;

    /// Versions of one row across history, newest first, with
    /// `commit_hash`, `committer` and `commit_date` columns added
    fn row_history(&mut self, table: &str, pk: (&str, &Value), limit: usize) -> Result<Vec<Row>>;

    fn list_tables(&mut self) -> Result<Vec<String>>;

    fn table_schema(&mut self, table: &str) -> Result<Vec<ColumnSchema>>;

    /// Matching rows for the page and the total number of matches
    fn query_rows(&mut self, table: &str, query: &RowQuery) -> Result<(Vec<Row>, u64)>;

    /// How many of `values` exist as primary keys in `pk_column`
    fn count_existing(&mut self, table: &str, pk_column: &str, values: &[Value]) -> Result<u64>;

    /// Each value in the form the store compares keys in (`"1"` and `"01"`
    /// agree on an integer key); `None` where a value cannot be a key
    fn canonical_keys(
        &mut self,
        table: &str,
        pk_column: &str,
        values: &[Value],
    ) -> Result<Vec<Option<String>>>;
}

/// Opens sessions bound to one branch context
pub trait SessionFactory: Send + Sync {
    /// # Errors
    ///
    /// `NOT_FOUND` for unknown targets, databases or branches; `FORBIDDEN`
    /// for databases not configured on the target.
    fn open(&self, ctx: &BranchContext) -> Result<Box<dyn StoreSession>>;
}
