use super::row::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message of the commit that concludes a strategy-based resolve
pub const RESOLVE_COMMIT_MESSAGE: &str = "Merge main with conflict resolution";

/// Prefix of store-generated merge commit messages
pub const AUTO_MERGE_PREFIX: &str = "Merge branch";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub hash: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parents: Vec<String>,
}

impl CommitInfo {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Merges produced by sync/submit/resolve rather than by an editor
    pub fn is_auto_merge(&self) -> bool {
        self.message.starts_with(AUTO_MERGE_PREFIX) || self.message == RESOLVE_COMMIT_MESSAGE
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFilter {
    #[default]
    All,
    MergesOnly,
    ExcludeAutoMerge,
}

impl HistoryFilter {
    pub fn accepts(&self, commit: &CommitInfo) -> bool {
        match self {
            HistoryFilter::All => true,
            HistoryFilter::MergesOnly => commit.is_merge(),
            HistoryFilter::ExcludeAutoMerge => !commit.is_auto_merge(),
        }
    }
}

/// `two_dot` compares the refs directly; `three_dot` compares `to` against
/// the merge base of both refs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    #[default]
    TwoDot,
    ThreeDot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Added,
    Modified,
    Removed,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Added => "added",
            DiffType::Modified => "modified",
            DiffType::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(DiffType::Added),
            "modified" => Some(DiffType::Modified),
            "removed" => Some(DiffType::Removed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRow {
    pub diff_type: DiffType,
    #[serde(default, skip_serializing_if = "Row::is_empty")]
    pub from: Row,
    #[serde(default, skip_serializing_if = "Row::is_empty")]
    pub to: Row,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummaryEntry {
    pub table: String,
    pub added: u64,
    pub modified: u64,
    pub removed: u64,
}

impl DiffSummaryEntry {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.modified == 0 && self.removed == 0
    }
}
