//! Live collection view over a store subscription.
//!
//! # Responsibility
//! - Hold the latest snapshot delivered by the store and derive filtered views.
//! - Degrade to the last good snapshot on subscription failure.
//!
//! # Invariants
//! - Exactly one subscription per view, established in `attach` and torn down
//!   once on drop.
//! - The snapshot is only replaced by a delivery with a higher sequence.
//! - The view never mutates notes locally; all changes arrive from the store.

use crate::controller::notifier::{ErrorClass, Notifier};
use crate::controller::ResponseLookup;
use crate::model::note::{NoteId, NoteRecord, RoleFilter, Snapshot};
use crate::store::{NoteStore, StoreError, Subscription};
use log::{debug, info, warn};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use tokio::sync::watch;

pub const MSG_LOAD_FAILED: &str = "Failed to load appreciations";

struct ViewState {
    notes: Arc<Vec<NoteRecord>>,
    loading: bool,
    sequence: u64,
    last_error: Option<String>,
}

struct ViewShared {
    state: RwLock<ViewState>,
    revision: watch::Sender<u64>,
}

impl ViewShared {
    fn apply(&self, snapshot: &Snapshot) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if snapshot.sequence <= state.sequence {
                debug!(
                    "event=snapshot_apply module=view status=stale sequence={} applied={}",
                    snapshot.sequence, state.sequence
                );
                return;
            }
            state.notes = Arc::new(snapshot.notes.clone());
            state.sequence = snapshot.sequence;
            if state.loading {
                info!(
                    "event=snapshot_apply module=view status=ok initial=true notes={}",
                    snapshot.notes.len()
                );
            }
            state.loading = false;
        }
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn fail(&self, err: &StoreError, notifier: &Notifier) {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.loading = false;
            state.last_error = Some(err.to_string());
        }
        warn!(
            "event=subscription_error module=view status=error error={}",
            err
        );
        notifier.error(MSG_LOAD_FAILED, ErrorClass::from(err));
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl ResponseLookup for ViewShared {
    fn has_response(&self, id: &NoteId) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .notes
            .iter()
            .any(|note| &note.id == id && note.has_response())
    }
}

/// Read side of the board.
pub struct LiveCollectionView {
    shared: Arc<ViewShared>,
    subscription: Subscription,
}

impl LiveCollectionView {
    /// Subscribes to `store` and starts tracking its collection.
    ///
    /// Subscription failures are reported through `notifier`.
    pub fn attach(store: &dyn NoteStore, notifier: Notifier) -> Self {
        let (revision, _) = watch::channel(0);
        let shared = Arc::new(ViewShared {
            state: RwLock::new(ViewState {
                notes: Arc::new(Vec::new()),
                loading: true,
                sequence: 0,
                last_error: None,
            }),
            revision,
        });

        let on_change = {
            let shared = Arc::clone(&shared);
            Box::new(move |snapshot: &Snapshot| shared.apply(snapshot))
        };
        let on_error = {
            let shared = Arc::clone(&shared);
            Box::new(move |err: &StoreError| shared.fail(err, &notifier))
        };
        let subscription = store.subscribe(on_change, on_error);

        Self {
            shared,
            subscription,
        }
    }

    /// Latest snapshot, newest first.
    pub fn snapshot(&self) -> Arc<Vec<NoteRecord>> {
        Arc::clone(&self.read().notes)
    }

    /// `true` until the first snapshot or a subscription error arrives.
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Notes passing `filter`, in snapshot order.
    pub fn filter_by(&self, filter: RoleFilter) -> Vec<NoteRecord> {
        self.read()
            .notes
            .iter()
            .filter(|note| filter.matches(note))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &NoteId) -> Option<NoteRecord> {
        self.read().notes.iter().find(|note| &note.id == id).cloned()
    }

    /// Sequence of the applied snapshot; `0` before the first delivery.
    pub fn applied_sequence(&self) -> u64 {
        self.read().sequence
    }

    /// Description of the subscription failure, if one happened.
    pub fn last_error(&self) -> Option<String> {
        self.read().last_error.clone()
    }

    /// Whether the store will still deliver snapshots.
    pub fn is_live(&self) -> bool {
        self.subscription.is_active()
    }

    /// Reply presence as of the latest applied snapshot, for the controller.
    pub fn response_lookup(&self) -> Arc<dyn ResponseLookup> {
        Arc::clone(&self.shared) as Arc<dyn ResponseLookup>
    }

    /// Revision counter bumped on every applied snapshot or error.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.shared
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ViewShared;
    use crate::model::note::{NoteId, NoteRecord, Role, Snapshot};
    use std::sync::{Arc, RwLock};
    use tokio::sync::watch;

    fn shared() -> ViewShared {
        let (revision, _) = watch::channel(0);
        ViewShared {
            state: RwLock::new(super::ViewState {
                notes: Arc::new(Vec::new()),
                loading: true,
                sequence: 0,
                last_error: None,
            }),
            revision,
        }
    }

    fn note(id: &str) -> NoteRecord {
        NoteRecord {
            id: NoteId::new(id),
            role: Role::Student,
            message: id.to_string(),
            response: None,
            created_at: 1,
        }
    }

    #[test]
    fn stale_snapshot_is_not_applied() {
        let shared = shared();
        shared.apply(&Snapshot {
            sequence: 5,
            notes: vec![note("new")],
        });
        shared.apply(&Snapshot {
            sequence: 4,
            notes: vec![note("old")],
        });

        let state = shared.state.read().unwrap();
        assert_eq!(state.sequence, 5);
        assert_eq!(state.notes[0].id, NoteId::new("new"));
        assert!(!state.loading);
    }
}
