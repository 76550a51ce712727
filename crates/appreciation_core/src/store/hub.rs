//! Subscriber registry shared by store adapters.
//!
//! # Invariants
//! - Publication happens under one lock, so every listener observes snapshots
//!   in the same order and `sequence` strictly increases.
//! - A listener is removed at most once, by `unsubscribe` or by `fail_all`.

use crate::model::note::{NoteRecord, Snapshot};
use crate::store::{ChangeCallback, ErrorCallback, StoreError};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    on_change: ChangeCallback,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct HubState {
    next_listener_id: u64,
    sequence: u64,
    listeners: Vec<Listener>,
}

#[derive(Default)]
pub(crate) struct SubscriberHub {
    state: Mutex<HubState>,
}

impl SubscriberHub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one listener and hands it `notes` as its first snapshot.
    pub(crate) fn register(
        self: &Arc<Self>,
        notes: Vec<NoteRecord>,
        on_change: ChangeCallback,
        on_error: ErrorCallback,
    ) -> Subscription {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_listener_id += 1;
        state.sequence += 1;
        let id = state.next_listener_id;
        let active = Arc::new(AtomicBool::new(true));

        on_change(&Snapshot {
            sequence: state.sequence,
            notes,
        });
        state.listeners.push(Listener {
            id,
            active: Arc::clone(&active),
            on_change,
            on_error,
        });
        debug!(
            "event=subscribe module=store status=ok listener={} listeners={}",
            id,
            state.listeners.len()
        );

        Subscription {
            hub: Arc::downgrade(self),
            id,
            active,
        }
    }

    /// Delivers a full snapshot to every live listener.
    pub(crate) fn publish(&self, notes: Vec<NoteRecord>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.sequence += 1;
        let snapshot = Snapshot {
            sequence: state.sequence,
            notes,
        };
        for listener in &state.listeners {
            (listener.on_change)(&snapshot);
        }
        debug!(
            "event=publish module=store status=ok sequence={} notes={} listeners={}",
            snapshot.sequence,
            snapshot.notes.len(),
            state.listeners.len()
        );
    }

    /// Reports `cause` to every listener and drops them all.
    pub(crate) fn fail_all(&self, cause: &StoreError) {
        let listeners = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut state.listeners)
        };
        warn!(
            "event=subscription_failed module=store status=error listeners={} error={}",
            listeners.len(),
            cause
        );
        for listener in listeners {
            listener.active.store(false, Ordering::SeqCst);
            (listener.on_error)(cause);
        }
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    fn remove(&self, id: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.listeners.retain(|listener| listener.id != id);
    }
}

/// Handle to one standing live query.
///
/// Dropping the handle unsubscribes.
pub struct Subscription {
    hub: Weak<SubscriberHub>,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// A handle that was never registered, used when registration itself failed.
    pub(crate) fn inactive() -> Self {
        Self {
            hub: Weak::new(),
            id: 0,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops delivery permanently. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
            debug!(
                "event=unsubscribe module=store status=ok listener={}",
                self.id
            );
        }
    }

    /// Returns whether callbacks may still be delivered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
