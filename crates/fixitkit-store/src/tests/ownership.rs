use super::harness::{Harness, ALICE};
use crate::memory::MemoryRecordBackend;
use crate::{
    Filter, LetterDraft, LetterKind, LetterPatch, Letters, Order, RecordBackend, RecordKind,
    StoreError, StoreResult,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

const STRANGER: &str = "someone-else";

/// A misconfigured server: no row-level security and filters dropped on
/// the floor. Optionally stamps every written row with another owner.
struct CarelessBackend {
    inner: MemoryRecordBackend,
    rewrite_owner: Option<&'static str>,
}

impl CarelessBackend {
    fn new(rewrite_owner: Option<&'static str>) -> Self {
        Self {
            inner: MemoryRecordBackend::new(),
            rewrite_owner,
        }
    }

    fn owned(&self, mut row: Value) -> Value {
        if let (Some(owner), Some(object)) = (self.rewrite_owner, row.as_object_mut()) {
            object.insert("user_id".into(), json!(owner));
        }
        row
    }
}

#[async_trait]
impl RecordBackend for CarelessBackend {
    async fn select(
        &self,
        table: &str,
        _filters: &[Filter],
        order: Option<&Order>,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        self.inner.select(table, &[], order, access_token).await
    }

    async fn insert(&self, table: &str, row: Value, access_token: &str) -> StoreResult<Vec<Value>> {
        let row = self.owned(row);
        self.inner.insert(table, row, access_token).await
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: &[&str],
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        let row = self.owned(row);
        self.inner.upsert(table, row, on_conflict, access_token).await
    }

    async fn update(
        &self,
        table: &str,
        _filters: &[Filter],
        patch: Value,
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        self.inner.update(table, &[], patch, access_token).await
    }

    async fn delete(
        &self,
        table: &str,
        filters: &[Filter],
        access_token: &str,
    ) -> StoreResult<Vec<Value>> {
        self.inner.delete(table, filters, access_token).await
    }
}

fn foreign_letter() -> Value {
    json!({
        "user_id": STRANGER,
        "content": "not yours to read",
        "date": "1/1/2024",
        "burned": false,
    })
}

#[tokio::test]
async fn refresh_rejects_rows_owned_by_another_user() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let backend = Arc::new(CarelessBackend::new(None));
    let letters = Letters::new(h.provider.clone(), backend.clone());

    let mine = letters.add(LetterDraft::new("Dear me")).await.unwrap();
    let before = letters.list();
    assert_eq!(before.len(), 1);

    backend.inner.seed(LetterKind::TABLE, foreign_letter());

    let result = letters.refresh().await;
    assert!(matches!(result, Err(StoreError::UnexpectedResponse(_))));
    assert!(Arc::ptr_eq(&before, &letters.list()));
    assert!(letters.last_error().is_some());
    assert!(letters.list().iter().all(|l| l.user_id == mine.user_id));
}

#[tokio::test]
async fn update_rejects_a_response_touching_another_users_row() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let backend = Arc::new(CarelessBackend::new(None));
    let letters = Letters::new(h.provider.clone(), backend.clone());

    let mine = letters.add(LetterDraft::new("Dear me")).await.unwrap();
    backend.inner.seed(LetterKind::TABLE, foreign_letter());
    let before = letters.list();

    let result = letters.update(&mine.id, LetterPatch::burn()).await;
    assert!(matches!(result, Err(StoreError::UnexpectedResponse(_))));
    assert!(Arc::ptr_eq(&before, &letters.list()));
    assert!(!letters.list()[0].burned);
}

#[tokio::test]
async fn add_rejects_a_row_written_for_another_user() {
    let h = Harness::new().await;
    h.sign_in(ALICE).await;
    let backend = Arc::new(CarelessBackend::new(Some(STRANGER)));
    let letters = Letters::new(h.provider.clone(), backend.clone());
    letters.refresh().await.unwrap();
    let before = letters.list();

    let result = letters.add(LetterDraft::new("Dear me")).await;
    assert!(matches!(result, Err(StoreError::UnexpectedResponse(_))));
    assert!(Arc::ptr_eq(&before, &letters.list()));
    assert!(letters.list().is_empty());
    assert_eq!(backend.inner.rows(LetterKind::TABLE).len(), 1);
}
