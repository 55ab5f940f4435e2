use crate::validation::TRUNK_BRANCH;
use serde::{Deserialize, Serialize};

/// The (target, database, branch) triple a store session is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchContext {
    pub target_id: String,
    #[serde(rename = "db_name")]
    pub database: String,
    #[serde(rename = "branch_name")]
    pub branch: String,
}

impl BranchContext {
    pub fn new(
        target_id: impl Into<String>,
        database: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            database: database.into(),
            branch: branch.into(),
        }
    }

    /// Same database, different branch
    pub fn on_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            target_id: self.target_id.clone(),
            database: self.database.clone(),
            branch: branch.into(),
        }
    }

    pub fn trunk(&self) -> Self {
        self.on_branch(TRUNK_BRANCH)
    }
}

impl std::fmt::Display for BranchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.target_id, self.database, self.branch)
    }
}
