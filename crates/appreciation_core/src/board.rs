//! Explicitly wired board: one store, one view, one controller, one
//! notification slot.
//!
//! # Invariants
//! - The view and the controller share the same `Notifier`, so subscription
//!   failures and write outcomes compete for the same visible slot.

use crate::config::BoardConfig;
use crate::controller::notifier::Notifier;
use crate::controller::submission::SubmissionController;
use crate::model::note::{NoteRecord, RoleFilter};
use crate::model::palette::CardColor;
use crate::store::NoteStore;
use crate::view::live_view::LiveCollectionView;
use std::sync::Arc;

/// Presentation-facing bundle.
pub struct Board {
    view: LiveCollectionView,
    controller: SubmissionController,
    notifier: Notifier,
}

/// One renderable card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardModel {
    pub note: NoteRecord,
    pub color: CardColor,
    /// The "add response" affordance is offered only while no reply exists;
    /// the controller refuses the write otherwise.
    pub can_add_response: bool,
}

impl Board {
    pub fn connect(store: Arc<dyn NoteStore>, config: &BoardConfig) -> Self {
        let notifier = Notifier::new(config.notification_ttl());
        let view = LiveCollectionView::attach(store.as_ref(), notifier.clone());
        let controller =
            SubmissionController::new(store, view.response_lookup(), notifier.clone(), config);
        Self {
            view,
            controller,
            notifier,
        }
    }

    pub fn view(&self) -> &LiveCollectionView {
        &self.view
    }

    pub fn controller(&self) -> &SubmissionController {
        &self.controller
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Cards for the current filter, newest first.
    pub fn cards(&self, filter: RoleFilter) -> Vec<CardModel> {
        self.view
            .filter_by(filter)
            .into_iter()
            .map(|note| CardModel {
                color: CardColor::for_note(&note.id),
                can_add_response: !note.has_response(),
                note,
            })
            .collect()
    }
}
