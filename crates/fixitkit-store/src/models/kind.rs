use crate::{Filter, StoreResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Describes one remote table and how its rows map onto local records.
pub trait RecordKind: Send + Sync + 'static {
    /// A row as returned by the store.
    type Record: Clone + fmt::Debug + DeserializeOwned + Send + Sync + 'static;
    /// Fields supplied by the caller to create a record.
    type Draft: fmt::Debug + Send + Sync;
    /// Fields supplied by the caller to change a record.
    type Patch: fmt::Debug + Send + Sync;

    /// Remote table name.
    const TABLE: &'static str;

    /// Columns that identify a row for upsert. `None` means plain insert.
    const UPSERT_CONFLICT: Option<&'static [&'static str]> = None;

    fn id(record: &Self::Record) -> &str;

    /// User id the row belongs to.
    fn owner(record: &Self::Record) -> &str;

    /// Server-assigned creation time; the list is ordered by it, newest first.
    fn created_at(record: &Self::Record) -> DateTime<Utc>;

    fn validate_draft(draft: &Self::Draft) -> StoreResult<()>;

    /// Row body for insert/upsert. Only called on validated drafts.
    fn draft_row(draft: &Self::Draft, user_id: &str) -> Value;

    /// `current` is the cached record with the patched id, if any.
    fn validate_patch(patch: &Self::Patch, current: Option<&Self::Record>) -> StoreResult<()>;

    /// Row body for update. Only called on validated patches.
    fn patch_row(patch: &Self::Patch) -> Value;

    /// True when `new` replaces `old` in the list (same natural key).
    fn supersedes(_new: &Self::Record, _old: &Self::Record) -> bool {
        false
    }

    /// Local counterpart of a delete filter.
    fn matches(record: &Self::Record, filter: &Filter) -> bool {
        filter.column() == "id" && filter.value() == Self::id(record)
    }
}
