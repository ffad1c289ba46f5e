//! Unsent letters: write it down, then burn it.

use crate::{RecordKind, StoreError, StoreResult};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One row of `unsent_letters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsentLetter {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// Display date, as written at the time.
    pub date: String,
    #[serde(default)]
    pub burned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LetterDraft {
    pub content: String,
    pub date: String,
    pub burned: bool,
}

impl LetterDraft {
    /// A fresh, unburned letter dated today (`M/D/YYYY`, local time).
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            date: Local::now().format("%-m/%-d/%Y").to_string(),
            burned: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LetterPatch {
    pub content: Option<String>,
    pub burned: Option<bool>,
}

impl LetterPatch {
    pub fn burn() -> Self {
        Self {
            content: None,
            burned: Some(true),
        }
    }
}

/// `unsent_letters`: plain inserts, no natural key.
pub struct LetterKind;

impl RecordKind for LetterKind {
    type Record = UnsentLetter;
    type Draft = LetterDraft;
    type Patch = LetterPatch;

    const TABLE: &'static str = "unsent_letters";

    fn id(record: &UnsentLetter) -> &str {
        &record.id
    }

    fn owner(record: &UnsentLetter) -> &str {
        &record.user_id
    }

    fn created_at(record: &UnsentLetter) -> DateTime<Utc> {
        record.created_at
    }

    fn validate_draft(draft: &LetterDraft) -> StoreResult<()> {
        if draft.content.trim().is_empty() {
            return Err(StoreError::Validation("letter must not be empty".into()));
        }
        Ok(())
    }

    fn draft_row(draft: &LetterDraft, user_id: &str) -> Value {
        json!({
            "user_id": user_id,
            "content": draft.content,
            "date": draft.date,
            "burned": draft.burned,
        })
    }

    fn validate_patch(patch: &LetterPatch, current: Option<&UnsentLetter>) -> StoreResult<()> {
        if patch.content.is_none() && patch.burned.is_none() {
            return Err(StoreError::Validation("nothing to update".into()));
        }
        if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(StoreError::Validation("letter must not be empty".into()));
        }
        // Unburning is only a no-op on a letter known to be unburned.
        if patch.burned == Some(false) && current.map_or(true, |letter| letter.burned) {
            return Err(StoreError::Validation(
                "a burned letter cannot be restored".into(),
            ));
        }
        Ok(())
    }

    fn patch_row(patch: &LetterPatch) -> Value {
        let mut row = Map::new();
        if let Some(content) = &patch.content {
            row.insert("content".into(), json!(content));
        }
        if let Some(burned) = patch.burned {
            row.insert("burned".into(), json!(burned));
        }
        Value::Object(row)
    }
}
