use super::row::RowOp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A problem tied to one input row of a preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewError {
    pub row_index: usize,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Draft operations for human review. Nothing here has touched the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub ops: Vec<RowOp>,
    pub warnings: Vec<String>,
    pub errors: Vec<PreviewError>,
}
