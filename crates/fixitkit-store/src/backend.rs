//! Remote table API seam.

use crate::StoreResult;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Equality filter on one column (`column=eq.value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    column: String,
    value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when `row` has this column and its value renders equal.
    pub fn matches_row(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Sort order for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }
}

/// Row-level operations on the remote tables.
///
/// Every call carries the caller's access token; the server's row-level
/// security decides what it may touch. Mutations return the affected rows.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&Order>,
        access_token: &str,
    ) -> StoreResult<Vec<Value>>;

    async fn insert(&self, table: &str, row: Value, access_token: &str)
        -> StoreResult<Vec<Value>>;

    /// Insert, or merge into the row that conflicts on `on_conflict`.
    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &[&str],
        access_token: &str,
    ) -> StoreResult<Vec<Value>>;

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        access_token: &str,
    ) -> StoreResult<Vec<Value>>;

    async fn delete(
        &self,
        table: &str,
        filters: &[Filter],
        access_token: &str,
    ) -> StoreResult<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_strings_numbers_and_bools() {
        let row = json!({ "date": "2024-01-01", "mood": 4, "burned": false, "note": null });

        assert!(Filter::eq("date", "2024-01-01").matches_row(&row));
        assert!(Filter::eq("mood", 4).matches_row(&row));
        assert!(Filter::eq("burned", false).matches_row(&row));
        assert!(!Filter::eq("note", "null").matches_row(&row));
        assert!(!Filter::eq("missing", "x").matches_row(&row));
    }
}
