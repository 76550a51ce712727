//! Process-local note store.
//!
//! # Responsibility
//! - Provide a complete `NoteStore` without external services.
//! - Expose fault controls (availability, latency, subscription failure) and
//!   call counters for exercising the view and controller.
//!
//! # Invariants
//! - Notes are kept newest first by store-assigned `created_at`.
//! - Writes and their publication happen under the same lock.

use crate::model::note::{NewNote, NoteId, NoteRecord};
use crate::store::{
    generate_note_id, next_created_at, ChangeCallback, ErrorCallback, NoteStore, StoreError,
    StoreResult, SubscriberHub, Subscription,
};
use async_trait::async_trait;
use log::info;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Number of adapter calls received, failed ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCallCounts {
    pub create: u64,
    pub set_response: u64,
    pub remove: u64,
    pub subscribe: u64,
}

#[derive(Default)]
struct CallCounters {
    create: AtomicU64,
    set_response: AtomicU64,
    remove: AtomicU64,
    subscribe: AtomicU64,
}

#[derive(Default)]
struct MemoryState {
    notes: Vec<NoteRecord>,
    last_created_at: i64,
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    hub: Arc<SubscriberHub>,
    available: AtomicBool,
    write_latency_ms: AtomicU64,
    calls: CallCounters,
}

/// In-memory store. Clones share the same collection.
#[derive(Clone)]
pub struct InMemoryNoteStore {
    inner: Arc<MemoryInner>,
}

impl Default for InMemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                hub: SubscriberHub::new(),
                available: AtomicBool::new(true),
                write_latency_ms: AtomicU64::new(0),
                calls: CallCounters::default(),
            }),
        }
    }

    /// When `false`, every write fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
        info!(
            "event=store_availability module=store status=ok available={}",
            available
        );
    }

    /// Delays every write by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        self.inner
            .write_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Terminates every live subscription with `cause`.
    pub fn fail_subscriptions(&self, cause: impl Into<String>) {
        let _state = self.lock_state();
        self.inner
            .hub
            .fail_all(&StoreError::Unavailable(cause.into()));
    }

    pub fn call_counts(&self) -> StoreCallCounts {
        let calls = &self.inner.calls;
        StoreCallCounts {
            create: calls.create.load(Ordering::SeqCst),
            set_response: calls.set_response.load(Ordering::SeqCst),
            remove: calls.remove.load(Ordering::SeqCst),
            subscribe: calls.subscribe.load(Ordering::SeqCst),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.hub.listener_count()
    }

    /// Current collection, newest first.
    pub fn notes(&self) -> Vec<NoteRecord> {
        self.lock_state().notes.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn before_write(&self) -> StoreResult<()> {
        let latency_ms = self.inner.write_latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn create(&self, draft: &NewNote) -> StoreResult<NoteId> {
        self.inner.calls.create.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;

        let mut state = self.lock_state();
        let created_at = next_created_at(state.last_created_at);
        state.last_created_at = created_at;
        let id = generate_note_id();
        state.notes.insert(
            0,
            NoteRecord {
                id: id.clone(),
                role: draft.role(),
                message: draft.message().to_string(),
                response: None,
                created_at,
            },
        );
        self.inner.hub.publish(state.notes.clone());
        Ok(id)
    }

    async fn set_response(&self, id: &NoteId, text: &str) -> StoreResult<()> {
        self.inner.calls.set_response.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;

        let mut state = self.lock_state();
        let note = state
            .notes
            .iter_mut()
            .find(|note| &note.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        note.response = Some(text.to_string());
        self.inner.hub.publish(state.notes.clone());
        Ok(())
    }

    async fn remove(&self, id: &NoteId) -> StoreResult<()> {
        self.inner.calls.remove.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;

        let mut state = self.lock_state();
        let before = state.notes.len();
        state.notes.retain(|note| &note.id != id);
        if state.notes.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.inner.hub.publish(state.notes.clone());
        Ok(())
    }

    fn subscribe(&self, on_change: ChangeCallback, on_error: ErrorCallback) -> Subscription {
        self.inner.calls.subscribe.fetch_add(1, Ordering::SeqCst);
        let state = self.lock_state();
        self.inner
            .hub
            .register(state.notes.clone(), on_change, on_error)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryNoteStore;
    use crate::model::note::{NewNote, NoteId, Role};
    use crate::store::{NoteStore, StoreError};

    #[tokio::test]
    async fn create_orders_newest_first_with_increasing_timestamps() {
        let store = InMemoryNoteStore::new();
        let first = store
            .create(&NewNote::new(Role::Student, "first").unwrap())
            .await
            .unwrap();
        let second = store
            .create(&NewNote::new(Role::Admin, "second").unwrap())
            .await
            .unwrap();

        let notes = store.notes();
        assert_eq!(notes[0].id, second);
        assert_eq!(notes[1].id, first);
        assert!(notes[0].created_at > notes[1].created_at);
        assert_eq!(notes[0].response, None);
    }

    #[tokio::test]
    async fn missing_ids_report_not_found() {
        let store = InMemoryNoteStore::new();
        let missing = NoteId::new("missing");
        assert!(matches!(
            store.set_response(&missing, "hi").await,
            Err(StoreError::NotFound(id)) if id == missing
        ));
        assert!(matches!(
            store.remove(&missing).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.call_counts().remove, 1);
    }

    #[tokio::test]
    async fn offline_store_rejects_writes() {
        let store = InMemoryNoteStore::new();
        store.set_available(false);
        let err = store
            .create(&NewNote::new(Role::Parent, "hello").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
        assert!(store.notes().is_empty());
    }
}
