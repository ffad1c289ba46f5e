//! Per-user record caches over the FixItKit Supabase tables.
//!
//! - [`EntryStore`]: newest-first cache of one record kind, synchronized
//!   with the remote table for the signed-in user
//! - [`RecordBackend`]: seam to the remote tables ([`SupabaseRestClient`])
//! - [`gate::authorize_write`]: the sign-in check views run before writes

mod backend;
mod entry_store;
mod error;
pub mod gate;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod models;
mod supabase_rest;

#[cfg(test)]
mod tests;

pub use backend::{Filter, Order, RecordBackend};
pub use entry_store::{EntryStore, Letters, MoodEntries, StoreBinding};
pub use error::{StoreError, StoreResult};
pub use gate::{authorize_write, WriteGate};
pub use models::{
    LetterDraft, LetterKind, LetterPatch, Mood, MoodDraft, MoodEntry, MoodKind, MoodPatch,
    RecordKind, UnsentLetter,
};
pub use supabase_rest::SupabaseRestClient;
