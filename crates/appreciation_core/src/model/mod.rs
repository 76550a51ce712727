//! Domain model for the appreciation board.
//!
//! # Responsibility
//! - Define the note record, its closed enumerations and draft validation.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.
//! - Ordering is by store-assigned `created_at`, newest first, and nothing else.

pub mod note;
pub mod palette;
