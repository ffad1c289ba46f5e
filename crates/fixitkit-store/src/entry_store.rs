//! Per-user, newest-first cache of one record kind.
//!
//! An [`EntryStore`] never applies a remote result to its list unless the
//! call succeeded and the signed-in user is still the one the call was made
//! for. Failed calls leave the published snapshot untouched (the same `Arc`).
//! A response carrying a row owned by anyone else fails the whole call.
//! Remote calls on one store run one at a time, so a mutation issued while a
//! refresh is in flight is applied after that refresh, never under it.

use crate::models::{LetterKind, LetterPatch, MoodEntry, MoodKind, UnsentLetter};
use crate::{Filter, Order, RecordBackend, RecordKind, StoreError, StoreResult};
use chrono::NaiveDate;
use fixitkit_auth::{AuthError, Session, SessionProvider};
use parking_lot::Mutex;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Daily mood check-ins.
pub type MoodEntries = EntryStore<MoodKind>;

/// Unsent letters.
pub type Letters = EntryStore<LetterKind>;

struct Snapshot<R> {
    /// User the records belong to. `None` before the first sync.
    owner: Option<String>,
    records: Arc<[R]>,
}

pub struct EntryStore<K: RecordKind> {
    provider: Arc<SessionProvider>,
    backend: Arc<dyn RecordBackend>,
    snapshot: Mutex<Snapshot<K::Record>>,
    last_error: Mutex<Option<String>>,
    in_flight: AtomicBool,
    sequencer: tokio::sync::Mutex<()>,
    _kind: PhantomData<K>,
}

/// Keeps a store following the session. Dropping it stops the follower.
pub struct StoreBinding {
    task: JoinHandle<()>,
}

impl StoreBinding {
    pub fn unbind(self) {}
}

impl Drop for StoreBinding {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn empty<R>() -> Arc<[R]> {
    Arc::from(Vec::new())
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl<K: RecordKind> EntryStore<K> {
    pub fn new(provider: Arc<SessionProvider>, backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            provider,
            backend,
            snapshot: Mutex::new(Snapshot {
                owner: None,
                records: empty(),
            }),
            last_error: Mutex::new(None),
            in_flight: AtomicBool::new(false),
            sequencer: tokio::sync::Mutex::new(()),
            _kind: PhantomData,
        }
    }

    /// Current records, newest first.
    ///
    /// Empty when nobody is signed in or the cache belongs to someone else.
    pub fn list(&self) -> Arc<[K::Record]> {
        let current = self.provider.current_user().map(|u| u.id);
        let snapshot = self.snapshot.lock();
        match (&snapshot.owner, current) {
            (Some(owner), Some(current)) if *owner == current => snapshot.records.clone(),
            _ => empty(),
        }
    }

    /// Message of the most recent failed remote call, cleared by the next
    /// successful one.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// True while a remote call is running.
    pub fn loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn find(&self, id: &str) -> Option<K::Record> {
        self.list().iter().find(|r| K::id(r) == id).cloned()
    }

    // ==========================================
    // Session plumbing
    // ==========================================

    /// Wait for this store's turn, then resolve a usable session.
    async fn begin(&self) -> StoreResult<(tokio::sync::MutexGuard<'_, ()>, Session)> {
        if !self.provider.is_authenticated() {
            return Err(StoreError::SignInRequired);
        }

        let guard = self.sequencer.lock().await;
        let session = self.provider.valid_session().await.map_err(|e| match e {
            AuthError::NotLoggedIn => StoreError::SignInRequired,
            other => StoreError::Auth(other),
        })?;
        Ok((guard, session))
    }

    fn record_outcome<T>(&self, result: &StoreResult<T>, action: &'static str) {
        match result {
            Ok(_) => *self.last_error.lock() = None,
            Err(StoreError::SignInRequired) => {}
            Err(e) => {
                warn!(table = K::TABLE, action, error = %e, "Store operation failed");
                *self.last_error.lock() = Some(e.to_string());
            }
        }
    }

    /// Replace the list through `f`, but only if `user_id` is still signed in.
    fn apply<F>(&self, user_id: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&[K::Record]) -> Vec<K::Record>,
    {
        let current = self.provider.current_user().map(|u| u.id);
        if current.as_deref() != Some(user_id) {
            debug!(table = K::TABLE, user_id, "Discarding result for previous session");
            return Err(StoreError::IdentityChanged);
        }

        let mut snapshot = self.snapshot.lock();
        let base: &[K::Record] = if snapshot.owner.as_deref() == Some(user_id) {
            &snapshot.records
        } else {
            &[]
        };
        let next = f(base);
        *snapshot = Snapshot {
            owner: Some(user_id.to_string()),
            records: Arc::from(next),
        };
        Ok(())
    }

    /// Decode rows and check every one belongs to `user_id`.
    fn parse_rows(rows: Vec<Value>, user_id: &str) -> StoreResult<Vec<K::Record>> {
        rows.into_iter()
            .map(|row| {
                let record: K::Record = serde_json::from_value(row)?;
                if K::owner(&record) != user_id {
                    warn!(
                        table = K::TABLE,
                        user_id,
                        id = K::id(&record),
                        "Store returned a row owned by another user"
                    );
                    return Err(StoreError::UnexpectedResponse(format!(
                        "{} returned a row owned by another user",
                        K::TABLE
                    )));
                }
                Ok(record)
            })
            .collect()
    }

    fn single_row(rows: Vec<Value>, user_id: &str, action: &str) -> StoreResult<K::Record> {
        Self::parse_rows(rows, user_id)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                StoreError::UnexpectedResponse(format!("{} on {} returned no row", action, K::TABLE))
            })
    }

    fn owner_filter(user_id: &str) -> Filter {
        Filter::eq("user_id", user_id)
    }

    // ==========================================
    // Operations
    // ==========================================

    /// Reload the signed-in user's records, replacing the list wholesale.
    pub async fn refresh(&self) -> StoreResult<()> {
        let result = self.refresh_inner().await;
        self.record_outcome(&result, "refresh");
        result
    }

    async fn refresh_inner(&self) -> StoreResult<()> {
        let (_turn, session) = self.begin().await?;
        let _busy = InFlight::start(&self.in_flight);
        let user_id = session.user_id();

        let rows = self
            .backend
            .select(
                K::TABLE,
                &[Self::owner_filter(user_id)],
                Some(&Order::desc("created_at")),
                &session.access_token,
            )
            .await?;
        let records = Self::parse_rows(rows, user_id)?;
        let count = records.len();

        self.apply(user_id, move |_| records)?;
        debug!(table = K::TABLE, user_id, count, "Refreshed records");
        Ok(())
    }

    /// Create a record and place it in the list by creation time.
    ///
    /// A new row lands at the front. Kinds with an upsert key replace any
    /// cached record with the same key, and the merged row keeps the
    /// position its original creation time gives it.
    pub async fn add(&self, draft: K::Draft) -> StoreResult<K::Record> {
        let result = self.add_inner(draft).await;
        self.record_outcome(&result, "add");
        result
    }

    async fn add_inner(&self, draft: K::Draft) -> StoreResult<K::Record> {
        if !self.provider.is_authenticated() {
            return Err(StoreError::SignInRequired);
        }
        K::validate_draft(&draft)?;

        let (_turn, session) = self.begin().await?;
        let _busy = InFlight::start(&self.in_flight);
        let user_id = session.user_id();
        let row = K::draft_row(&draft, user_id);

        let rows = match K::UPSERT_CONFLICT {
            Some(columns) => {
                self.backend
                    .upsert(K::TABLE, row, columns, &session.access_token)
                    .await?
            }
            None => {
                self.backend
                    .insert(K::TABLE, row, &session.access_token)
                    .await?
            }
        };
        let record = Self::single_row(rows, user_id, "add")?;

        let added = record.clone();
        self.apply(user_id, move |current| {
            let mut next: Vec<K::Record> = current
                .iter()
                .filter(|r| K::id(r) != K::id(&added) && !K::supersedes(&added, r))
                .cloned()
                .collect();
            // An upsert that merged into an older row keeps that row's slot.
            let at = next
                .iter()
                .position(|r| K::created_at(r) <= K::created_at(&added))
                .unwrap_or(next.len());
            next.insert(at, added);
            next
        })?;

        info!(table = K::TABLE, user_id, id = K::id(&record), "Added record");
        Ok(record)
    }

    /// Change a record, keeping its position in the list.
    pub async fn update(&self, id: &str, patch: K::Patch) -> StoreResult<K::Record> {
        let result = self.update_inner(id, patch).await;
        self.record_outcome(&result, "update");
        result
    }

    async fn update_inner(&self, id: &str, patch: K::Patch) -> StoreResult<K::Record> {
        if !self.provider.is_authenticated() {
            return Err(StoreError::SignInRequired);
        }
        K::validate_patch(&patch, self.find(id).as_ref())?;

        let (_turn, session) = self.begin().await?;
        let _busy = InFlight::start(&self.in_flight);
        let user_id = session.user_id();

        let rows = self
            .backend
            .update(
                K::TABLE,
                &[Filter::eq("id", id), Self::owner_filter(user_id)],
                K::patch_row(&patch),
                &session.access_token,
            )
            .await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                table: K::TABLE,
                id: id.to_string(),
            });
        }
        let record = Self::single_row(rows, user_id, "update")?;

        let updated = record.clone();
        self.apply(user_id, move |current| {
            current
                .iter()
                .map(|r| if K::id(r) == K::id(&updated) { updated.clone() } else { r.clone() })
                .collect()
        })?;

        info!(table = K::TABLE, user_id, id, "Updated record");
        Ok(record)
    }

    /// Delete by id.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        self.delete_where(Filter::eq("id", id)).await
    }

    /// Delete every record of the signed-in user matching `filter`.
    pub async fn delete_where(&self, filter: Filter) -> StoreResult<()> {
        let result = self.delete_inner(filter).await;
        self.record_outcome(&result, "delete");
        result
    }

    async fn delete_inner(&self, filter: Filter) -> StoreResult<()> {
        let (_turn, session) = self.begin().await?;
        let _busy = InFlight::start(&self.in_flight);
        let user_id = session.user_id();

        let rows = self
            .backend
            .delete(
                K::TABLE,
                &[Self::owner_filter(user_id), filter.clone()],
                &session.access_token,
            )
            .await?;

        self.apply(user_id, |current| {
            current
                .iter()
                .filter(|r| !K::matches(r, &filter))
                .cloned()
                .collect()
        })?;

        info!(
            table = K::TABLE,
            user_id,
            column = filter.column(),
            deleted = rows.len(),
            "Deleted records"
        );
        Ok(())
    }

    // ==========================================
    // Identity following
    // ==========================================

    /// Drop the cached list if the signed-in user changed, then reload for
    /// the new user (if any).
    pub async fn sync_identity(&self) -> StoreResult<()> {
        let current = self.provider.current_user().map(|u| u.id);
        {
            let mut snapshot = self.snapshot.lock();
            if snapshot.owner == current {
                return Ok(());
            }
            debug!(
                table = K::TABLE,
                previous = ?snapshot.owner,
                current = ?current,
                "Session user changed, clearing records"
            );
            *snapshot = Snapshot {
                owner: current.clone(),
                records: empty(),
            };
        }

        match current {
            Some(_) => self.refresh().await,
            None => Ok(()),
        }
    }

    /// Follow the provider's session for as long as the binding lives.
    ///
    /// Syncs once immediately, then again on every session change.
    pub fn bind(self: &Arc<Self>) -> StoreBinding {
        let store = Arc::clone(self);
        let mut changes = store.provider.watch();

        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = store.sync_identity().await {
                    warn!(table = K::TABLE, error = %e, "Sync after session change failed");
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        StoreBinding { task }
    }
}

impl EntryStore<MoodKind> {
    /// The check-in for `date`, if any.
    pub fn entry_for(&self, date: NaiveDate) -> Option<MoodEntry> {
        self.list().iter().find(|e| e.date == date).cloned()
    }

    pub async fn delete_by_date(&self, date: NaiveDate) -> StoreResult<()> {
        self.delete_where(Filter::eq("date", date)).await
    }

    /// Average mood over the `n` most recent days with a check-in.
    pub fn recent_average(&self, n: usize) -> Option<f64> {
        let list = self.list();
        let mut entries: Vec<&MoodEntry> = list.iter().collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        entries.truncate(n);
        if entries.is_empty() {
            return None;
        }
        let total: u32 = entries.iter().map(|e| u32::from(e.mood.value())).sum();
        Some(f64::from(total) / entries.len() as f64)
    }
}

impl EntryStore<LetterKind> {
    /// Mark a letter as burned. There is no way back.
    pub async fn burn(&self, id: &str) -> StoreResult<UnsentLetter> {
        self.update(id, LetterPatch::burn()).await
    }
}
