//! Core logic for the appreciation board.
//! Live note collection, write mediation and the store adapter seam.

pub mod board;
pub mod config;
pub mod controller;
pub mod logging;
pub mod model;
pub mod store;
pub mod view;

pub use board::{Board, CardModel};
pub use config::{BoardConfig, ConfigError};
pub use controller::notifier::{ErrorClass, Notification, NotificationLevel, Notifier};
pub use controller::submission::{ComposeDraft, SubmissionController};
pub use controller::{
    BoardError, DeleteConfirmation, OperationKey, OperationOutcome, OperationState, ResponseLookup,
};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::note::{NewNote, NoteId, NoteRecord, Role, RoleFilter, Snapshot, ValidationError};
pub use model::palette::CardColor;
pub use store::memory::{InMemoryNoteStore, StoreCallCounts};
pub use store::sqlite::SqliteNoteStore;
pub use store::{NoteStore, StoreError, StoreResult, Subscription};
pub use view::live_view::LiveCollectionView;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
