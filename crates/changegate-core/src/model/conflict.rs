use super::row::Row;
use crate::errors::ExError;
use serde::{Deserialize, Serialize};

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Per-table conflict counts between a work branch and the trunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub table: String,
    pub data_conflicts: u64,
    pub schema_conflicts: u64,
    /// Only reported by a merge, never by a preview
    #[serde(default, skip_serializing_if = "is_zero")]
    pub constraint_violations: u64,
}

impl ConflictSummary {
    pub fn new(table: impl Into<String>, data_conflicts: u64, schema_conflicts: u64) -> Self {
        Self {
            table: table.into(),
            data_conflicts,
            schema_conflicts,
            constraint_violations: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.data_conflicts == 0 && self.schema_conflicts == 0 && self.constraint_violations == 0
    }
}

/// One conflicting row split into its three versions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictRow {
    pub base: Row,
    pub ours: Row,
    pub theirs: Row,
}

/// Which side wins when resolving data conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// Keep the work branch version
    Ours,
    /// Take the trunk version
    Theirs,
}

impl ResolveStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStrategy::Ours => "ours",
            ResolveStrategy::Theirs => "theirs",
        }
    }
}

impl std::str::FromStr for ResolveStrategy {
    type Err = ExError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ours" => Ok(ResolveStrategy::Ours),
            "theirs" => Ok(ResolveStrategy::Theirs),
            other => Err(ExError::invalid_argument(format!(
                "strategy must be 'ours' or 'theirs', got '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
