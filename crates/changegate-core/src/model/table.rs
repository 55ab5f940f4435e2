use crate::errors::{ExError, Result};
use crate::validation::validate_identifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Foreign key target of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub col_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ColumnRef>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnSchema {
    /// Nullable, non-key column
    pub fn new(name: impl Into<String>, col_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            col_type: col_type.into(),
            nullable: true,
            primary_key: false,
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ColumnRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// The single primary-key column of a schema, if any
pub fn primary_key_column(columns: &[ColumnSchema]) -> Option<&ColumnSchema> {
    columns.iter().find(|c| c.primary_key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Contains,
    In,
}

/// One AND-combined row filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Check the column name and the value shape required by the operator
    pub fn validate(&self) -> Result<()> {
        validate_identifier("filter column", &self.column)?;
        match (self.op, &self.value) {
            (FilterOp::In, Value::Array(_)) => Ok(()),
            (FilterOp::In, _) => Err(ExError::invalid_argument(format!(
                "'in' filter on {} requires an array value",
                self.column
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    /// Parse `col,-other` into sort keys; `-` marks descending
    pub fn parse_list(text: &str) -> Result<Vec<SortKey>> {
        text.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|token| {
                let (column, descending) = match token.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (token, false),
                };
                validate_identifier("sort column", column)?;
                Ok(SortKey {
                    column: column.to_string(),
                    descending,
                })
            })
            .collect()
    }
}

/// Filtered, sorted, paged row read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sort_tokens() {
        let keys = SortKey::parse_list("name, -price").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(!keys[0].descending);
        assert_eq!(keys[1].column, "price");
        assert!(keys[1].descending);
        assert!(SortKey::parse_list("-na;me").is_err());
    }

    #[test]
    fn test_in_filter_requires_array() {
        let f = Filter {
            column: "id".into(),
            op: FilterOp::In,
            value: json!(1),
        };
        assert!(f.validate().is_err());
        let f = Filter {
            value: json!([1, 2]),
            ..f
        };
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_schema_builders() {
        let cols = vec![
            ColumnSchema::new("id", "int").primary_key(),
            ColumnSchema::new("owner_id", "int").references("owners", "id"),
        ];
        let pk = primary_key_column(&cols).unwrap();
        assert_eq!(pk.name, "id");
        assert!(!pk.nullable);
        assert_eq!(cols[1].references.as_ref().unwrap().table, "owners");
    }

    #[test]
    fn test_column_json_defaults() {
        let col: ColumnSchema = serde_json::from_value(json!({"name": "qty", "type": "int"})).unwrap();
        assert_eq!(col, ColumnSchema::new("qty", "int"));
    }
}
