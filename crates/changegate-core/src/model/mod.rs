//! Data model shared by the engine and store adapters
//!
//! Row values are `serde_json::Value`s; rows are ordered column maps.

pub mod conflict;
pub mod context;
pub mod history;
pub mod preview;
pub mod request;
pub mod row;
pub mod table;

pub use conflict::{ConflictRow, ConflictSummary, ResolveStrategy};
pub use context::BranchContext;
pub use history::{
    BranchInfo, CommitInfo, DiffMode, DiffRow, DiffSummaryEntry, DiffType, HistoryFilter, TagInfo,
};
pub use preview::{PreviewError, PreviewResult};
pub use request::Request;
pub use row::{FlatRow, Row, RowOp, RowOpType};
pub use table::{ColumnRef, ColumnSchema, Filter, FilterOp, RowQuery, SortKey};
