//! In-memory [`RecordBackend`] for tests.
//!
//! Rows live in per-table vectors. An optional authorizer maps access tokens
//! to user ids and turns on row-level security the way the real policies
//! do: reads and writes only see the caller's rows. Calls are counted,
//! failures can be queued per operation, and a call can be held open.

use crate::{Filter, Order, RecordBackend, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use fixitkit_auth::memory::HeldCall;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Backend operation, for call counts and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordOp {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
}

type Authorizer = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

struct State {
    tables: HashMap<String, Vec<Value>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    failures: HashMap<RecordOp, VecDeque<StoreError>>,
    holds: HashMap<RecordOp, HeldCall>,
    calls: HashMap<RecordOp, usize>,
    clock: i64,
}

/// Vector-backed stand-in for the PostgREST tables.
pub struct MemoryRecordBackend {
    state: Mutex<State>,
    authorizer: Option<Authorizer>,
    epoch: DateTime<Utc>,
}

impl Default for MemoryRecordBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tables: HashMap::new(),
                unique: HashMap::new(),
                failures: HashMap::new(),
                holds: HashMap::new(),
                calls: HashMap::new(),
                clock: 0,
            }),
            authorizer: None,
            epoch: Utc::now(),
        }
    }

    /// Enforce row-level security using `authorize` to resolve tokens.
    pub fn with_authorizer<F>(mut self, authorize: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.authorizer = Some(Arc::new(authorize));
        self
    }

    /// Add a unique constraint over `columns` of `table`.
    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        self.state
            .lock()
            .unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Put a row straight into a table, without counting a call.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let mut state = self.state.lock();
        let row = self.stamp(&mut state, row);
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Every row in `table`, regardless of owner.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_next(&self, op: RecordOp, error: StoreError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Block the next call of `op` until the returned handle is released.
    pub fn hold(&self, op: RecordOp) -> HeldCall {
        let held = HeldCall::new();
        self.state.lock().holds.insert(op, held.clone());
        held
    }

    pub fn calls(&self, op: RecordOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    /// Count the call and resolve the caller, then honor holds and queued
    /// failures. The caller is resolved on arrival, as the server would.
    async fn enter(&self, op: RecordOp, access_token: &str) -> StoreResult<Option<String>> {
        let held = {
            let mut state = self.state.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            state.holds.remove(&op)
        };

        let user = match &self.authorizer {
            None => None,
            Some(authorize) => Some(authorize(access_token).ok_or(StoreError::Remote {
                status: 401,
                message: "JWT expired".into(),
            })?),
        };

        if let Some(held) = held {
            held.arrive().await;
        }

        let failure = self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(user),
        }
    }

    /// Fill in server-assigned columns.
    fn stamp(&self, state: &mut State, row: Value) -> Value {
        let mut object = match row {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        state.clock += 1;
        object
            .entry("id")
            .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
        let created_at = (self.epoch + Duration::milliseconds(state.clock))
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        object
            .entry("created_at")
            .or_insert_with(|| Value::String(created_at));
        Value::Object(object)
    }

    fn insert_row(&self, state: &mut State, table: &str, row: Value) -> StoreResult<Value> {
        let row = self.stamp(state, row);
        let constraints = state.unique.get(table).cloned().unwrap_or_default();
        let rows = state.tables.entry(table.to_string()).or_default();

        for columns in &constraints {
            if rows.iter().any(|existing| same_on(existing, &row, columns)) {
                return Err(StoreError::Remote {
                    status: 409,
                    message: format!(
                        "duplicate key value violates unique constraint on ({})",
                        columns.join(", ")
                    ),
                });
            }
        }

        rows.push(row.clone());
        Ok(row)
    }
}

fn owned_by(row: &Value, user: Option<&str>) -> bool {
    match user {
        None => true,
        Some(user) => row.get("user_id").and_then(Value::as_str) == Some(user),
    }
}

fn rls_check(row: &Value, user: Option<&str>, table: &str) -> StoreResult<()> {
    if owned_by(row, user) {
        Ok(())
    } else {
        Err(StoreError::Remote {
            status: 403,
            message: format!("new row violates row-level security policy for table \"{}\"", table),
        })
    }
}

fn same_on<S: AsRef<str>>(a: &Value, b: &Value, columns: &[S]) -> bool {
    columns
        .iter()
        .all(|c| a.get(c.as_ref()).is_some() && a.get(c.as_ref()) == b.get(c.as_ref()))
}

fn selected(row: &Value, filters: &[Filter], user: Option<&str>) -> bool {
    owned_by(row, user) && filters.iter().all(|f| f.matches_row(row))
}

fn merge(target: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(patch)) = (target, patch) {
        for (key, value) in patch {
            if key != "id" && key != "created_at" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

fn compare(a: &Value, b: &Value, column: &str) -> Ordering {
    let key = |row: &Value| match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    key(a).cmp(&key(b))
}

#[async_trait]
impl RecordBackend for MemoryRecordBackend {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<&Order>,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let user = self.enter(RecordOp::Select, access_token).await?;

        let state = self.state.lock();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| selected(row, filters, user.as_deref()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = order {
            rows.sort_by(|a, b| {
                let ordering = compare(a, b, &order.column);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value, access_token: &str) -> StoreResult<Vec<Value>> {
        let user = self.enter(RecordOp::Insert, access_token).await?;
        rls_check(&row, user.as_deref(), table)?;

        let mut state = self.state.lock();
        Ok(vec![self.insert_row(&mut state, table, row)?])
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &[&str],
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let user = self.enter(RecordOp::Upsert, access_token).await?;
        rls_check(&row, user.as_deref(), table)?;

        let mut state = self.state.lock();
        let existing = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| same_on(r, &row, on_conflict)));

        match existing {
            Some(existing) => {
                merge(existing, &row);
                Ok(vec![existing.clone()])
            }
            None => Ok(vec![self.insert_row(&mut state, table, row)?]),
        }
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let user = self.enter(RecordOp::Update, access_token).await?;

        let mut state = self.state.lock();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut() {
                if selected(row, filters, user.as_deref()) {
                    merge(row, &patch);
                    updated.push(row.clone());
                }
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter], access_token: &str) -> StoreResult<Vec<Value>> {
        let user = self.enter(RecordOp::Delete, access_token).await?;

        let mut state = self.state.lock();
        let mut removed = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| {
                if selected(row, filters, user.as_deref()) {
                    removed.push(row.clone());
                    false
                } else {
                    true
                }
            });
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn select_orders_and_filters() {
        let backend = MemoryRecordBackend::new();
        backend.seed("t", json!({ "user_id": "a", "n": 1 }));
        backend.seed("t", json!({ "user_id": "b", "n": 2 }));
        backend.seed("t", json!({ "user_id": "a", "n": 3 }));

        let rows = backend
            .select("t", &[Filter::eq("user_id", "a")], Some(&Order::desc("created_at")), "tok")
            .await
            .unwrap();
        let ns: Vec<i64> = rows.iter().map(|r| r["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![3, 1]);
    }

    #[tokio::test]
    async fn unique_constraint_rejects_plain_insert_but_not_upsert() {
        let backend = MemoryRecordBackend::new().with_unique("t", &["user_id", "date"]);
        let row = json!({ "user_id": "a", "date": "2024-01-01", "mood": 4 });

        backend.insert("t", row.clone(), "tok").await.unwrap();
        let dup = backend.insert("t", row, "tok").await;
        assert!(matches!(dup, Err(StoreError::Remote { status: 409, .. })));

        let merged = backend
            .upsert(
                "t",
                json!({ "user_id": "a", "date": "2024-01-01", "mood": 2 }),
                &["user_id", "date"],
                "tok",
            )
            .await
            .unwrap();
        assert_eq!(merged[0]["mood"], 2);
        assert_eq!(backend.rows("t").len(), 1);
    }

    #[tokio::test]
    async fn authorizer_enforces_row_ownership() {
        let backend = MemoryRecordBackend::new()
            .with_authorizer(|token| (token == "tok-a").then(|| "a".to_string()));
        backend.seed("t", json!({ "user_id": "b", "n": 1 }));

        let rows = backend.select("t", &[], None, "tok-a").await.unwrap();
        assert!(rows.is_empty());

        let foreign = backend.insert("t", json!({ "user_id": "b" }), "tok-a").await;
        assert!(matches!(foreign, Err(StoreError::Remote { status: 403, .. })));

        let anonymous = backend.select("t", &[], None, "bogus").await;
        assert!(matches!(anonymous, Err(StoreError::Remote { status: 401, .. })));
    }
}
