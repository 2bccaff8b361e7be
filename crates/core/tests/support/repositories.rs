use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hearth_core::{CredentialUpdate, EventRepository, OutcomeUpdate, SourceRepository};
use hearth_domain::{
    CalendarEvent, EventChangeSet, EventKey, FeedValidators, HearthError, RegisteredSource,
    Result as DomainResult, SourceId,
};
use tokio::sync::Notify;

/// In-memory mock for `SourceRepository`.
///
/// Enforces the active (child, url hash) uniqueness the SQLite schema
/// enforces with a partial index.
#[derive(Default)]
pub struct MemorySourceRepository {
    rows: Mutex<HashMap<SourceId, RegisteredSource>>,
    get_gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl MemorySourceRepository {
    pub fn snapshot(&self, id: SourceId) -> RegisteredSource {
        self.rows.lock().unwrap().get(&id).cloned().expect("source exists")
    }

    /// Hold the next `get_source` call after it has read its row.
    ///
    /// Returns `(reached, release)`: `reached` fires once the read happened,
    /// and the call returns its (by then possibly stale) row after `release`.
    pub fn pause_next_get(&self) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.get_gate.lock().unwrap() = Some((reached.clone(), release.clone()));
        (reached, release)
    }

    /// Overwrite the stored ciphertext, simulating corruption at rest.
    pub fn corrupt_credential(&self, id: SourceId) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.credential.encrypted_url = "v1.deadbeef.AAAA.AAAA".to_string();
        }
    }
}

#[async_trait]
impl SourceRepository for MemorySourceRepository {
    async fn insert_source(&self, source: &RegisteredSource) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let clash = rows.values().any(|row| {
            row.source.active
                && row.source.child_id == source.source.child_id
                && row.credential.url_hash == source.credential.url_hash
        });
        if clash {
            return Err(HearthError::DuplicateSource("unique index".to_string()));
        }
        rows.insert(source.id(), source.clone());
        Ok(())
    }

    async fn find_active_by_hash(
        &self,
        child_id: &str,
        url_hash: &str,
    ) -> DomainResult<Option<RegisteredSource>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|row| {
                row.source.active
                    && row.source.child_id == child_id
                    && row.credential.url_hash == url_hash
            })
            .cloned())
    }

    async fn get_source(&self, id: SourceId) -> DomainResult<Option<RegisteredSource>> {
        let row = self.rows.lock().unwrap().get(&id).cloned();
        let gate = self.get_gate.lock().unwrap().take();
        if let Some((reached, release)) = gate {
            reached.notify_one();
            release.notified().await;
        }
        Ok(row)
    }

    async fn list_sources_for_owner(&self, owner_id: &str) -> DomainResult<Vec<RegisteredSource>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.source.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.source.created_at);
        Ok(rows)
    }

    async fn due_sources(&self, now: DateTime<Utc>) -> DomainResult<Vec<RegisteredSource>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|row| row.source.active && row.credential.next_run_at <= now)
            .cloned()
            .collect();
        rows.sort_by_key(|row| (row.credential.next_run_at, row.id()));
        Ok(rows)
    }

    async fn set_active(&self, id: SourceId, active: bool) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        row.source.active = active;
        Ok(())
    }

    async fn update_credential(&self, id: SourceId, update: &CredentialUpdate) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        row.credential.encrypted_url = update.encrypted_url.clone();
        row.credential.url_hash = update.url_hash.clone();
        row.credential.masked_url = update.masked_url.clone();
        row.credential.oauth_account = update.oauth_account.clone();
        row.credential.next_run_at = update.next_run_at;
        row.credential.validators = FeedValidators::default();
        row.credential.consecutive_failures = 0;
        Ok(())
    }

    async fn record_outcome(&self, id: SourceId, update: &OutcomeUpdate) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or_else(|| HearthError::NotFound(id.to_string()))?;
        if let Some(validators) = &update.validators {
            row.credential.validators = validators.clone();
        }
        row.source.last_synced_at = Some(update.last_synced_at);
        row.credential.next_run_at = update.next_run_at;
        row.credential.consecutive_failures = update.consecutive_failures;
        if update.deactivate {
            row.source.active = false;
        }
        Ok(())
    }
}

/// In-memory mock for `EventRepository` that counts applied change sets.
#[derive(Default)]
pub struct MemoryEventRepository {
    events: Mutex<HashMap<SourceId, BTreeMap<EventKey, CalendarEvent>>>,
    applies: AtomicUsize,
    fail_apply: AtomicBool,
}

impl MemoryEventRepository {
    pub fn events(&self, source_id: SourceId) -> Vec<CalendarEvent> {
        self.events
            .lock()
            .unwrap()
            .get(&source_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn titles(&self, source_id: SourceId) -> Vec<String> {
        self.events(source_id).into_iter().map(|e| e.content.title).collect()
    }

    pub fn apply_count(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }

    pub fn fail_next_apply(&self) {
        self.fail_apply.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventRepository for MemoryEventRepository {
    async fn events_for_source(&self, source_id: SourceId) -> DomainResult<Vec<CalendarEvent>> {
        Ok(self.events(source_id))
    }

    async fn apply_changes(&self, source_id: SourceId, changes: &EventChangeSet) -> DomainResult<()> {
        if self.fail_apply.swap(false, Ordering::SeqCst) {
            return Err(HearthError::Database("disk full".to_string()));
        }
        self.applies.fetch_add(1, Ordering::SeqCst);
        let mut events = self.events.lock().unwrap();
        let set = events.entry(source_id).or_default();
        for event in changes.to_create.iter().chain(changes.to_update.iter()) {
            set.insert(event.key.clone(), event.clone());
        }
        for key in &changes.to_delete {
            set.remove(key);
        }
        Ok(())
    }
}
