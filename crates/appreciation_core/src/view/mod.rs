//! Read-side projections of the note collection.

pub mod live_view;
