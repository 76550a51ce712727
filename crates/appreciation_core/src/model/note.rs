//! Appreciation note domain model.
//!
//! # Responsibility
//! - Define the single record shape shared by stores, the live view and the
//!   submission controller.
//! - Own draft validation (`NewNote::new`) so no empty message reaches a store.
//!
//! # Invariants
//! - `NoteId` is assigned by the store and never changes.
//! - `role`, `message` and `created_at` are immutable after creation.
//! - `message` is trimmed and non-empty.
//! - `response` is last-write-wins; no history is kept.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-assigned opaque identifier of one note.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Who wrote a note. Chosen by the submitter, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Parent,
    Admin,
}

impl Role {
    /// Every role in display order.
    pub const ALL: [Role; 3] = [Role::Student, Role::Parent, Role::Admin];

    /// Capitalized label persisted by stores.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Parent => "Parent",
            Role::Admin => "Admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "admin" => Ok(Role::Admin),
            _ => Err(ValidationError::UnknownRole(value.trim().to_string())),
        }
    }
}

/// Role selector applied by the live view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleFilter {
    #[default]
    All,
    Only(Role),
}

impl RoleFilter {
    /// Returns whether `note` passes this filter.
    pub fn matches(self, note: &NoteRecord) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(role) => note.role == role,
        }
    }

    /// Text shown when the filtered board has nothing to render.
    pub fn empty_state_message(self) -> String {
        match self {
            RoleFilter::All => "No appreciations yet. Be the first to share! 🌟".to_string(),
            RoleFilter::Only(role) => format!(
                "No appreciations from {}s yet.",
                role.as_str().to_lowercase()
            ),
        }
    }
}

impl Display for RoleFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleFilter::All => f.write_str("All"),
            RoleFilter::Only(role) => Display::fmt(role, f),
        }
    }
}

impl FromStr for RoleFilter {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(RoleFilter::All);
        }
        value.parse().map(RoleFilter::Only)
    }
}

impl From<Role> for RoleFilter {
    fn from(value: Role) -> Self {
        RoleFilter::Only(value)
    }
}

/// One appreciation entry as delivered by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: NoteId,
    pub role: Role,
    pub message: String,
    /// Absent until a reply is added.
    pub response: Option<String>,
    /// Unix epoch milliseconds assigned by the store. Sole sort key.
    pub created_at: i64,
}

impl NoteRecord {
    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }
}

/// Validated draft for a new note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    role: Role,
    message: String,
}

impl NewNote {
    /// Builds a draft, trimming the message.
    ///
    /// # Errors
    /// - `ValidationError::EmptyMessage` when the trimmed message is empty.
    pub fn new(role: Role, message: &str) -> Result<Self, ValidationError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyMessage);
        }
        Ok(Self {
            role,
            message: trimmed.to_string(),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Trims a reply and rejects blank text.
pub fn normalize_response(text: &str) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}

/// Client-side input rejection. Raised before any store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyMessage,
    EmptyResponse,
    /// The note already carries a reply; the ordinary path only adds one.
    ResponseExists(NoteId),
    UnknownRole(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "message must not be empty"),
            Self::EmptyResponse => write!(f, "response must not be empty"),
            Self::ResponseExists(id) => write!(f, "note {id} already has a response"),
            Self::UnknownRole(value) => {
                write!(f, "unknown role `{value}`; expected Student|Parent|Admin")
            }
        }
    }
}

impl Error for ValidationError {}

/// Full ordered collection at one point in time, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Store-side delivery counter; strictly increases per publication.
    pub sequence: u64,
    pub notes: Vec<NoteRecord>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: &NoteId) -> Option<&NoteRecord> {
        self.notes.iter().find(|note| &note.id == id)
    }
}
