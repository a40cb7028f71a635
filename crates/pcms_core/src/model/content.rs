//! Content item domain model.
//!
//! # Responsibility
//! - Define the canonical publishable record (portfolio entry, page, post).
//! - Own the status state machine used by service and validator.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `version` starts at 1 for a stored item and grows by exactly 1 per write.
//! - `Archived` is terminal: no transition leaves it.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a content item.
pub type ContentId = Uuid;

/// Publication state of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    /// Editable, not visible to public readers.
    Draft,
    /// Visible to public readers.
    Published,
    /// Retired. Terminal state.
    Archived,
}

impl ContentStatus {
    /// Stable lowercase name used in storage and external filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Parses the stable lowercase name, ignoring surrounding whitespace and case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Returns whether `self -> next` is an allowed lifecycle transition.
    ///
    /// Allowed: draft->published, published->draft, draft->archived,
    /// published->archived. Staying in the same state is not a transition.
    pub fn can_transition_to(self, next: ContentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Published)
                | (Self::Published, Self::Draft)
                | (Self::Draft, Self::Archived)
                | (Self::Published, Self::Archived)
        )
    }

    /// Whether no transition may leave this state.
    pub fn is_terminal(self) -> bool {
        self == Self::Archived
    }
}

impl Display for ContentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque caller identity passed through for audit fields.
///
/// The core never validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(String);

impl Actor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identity used when the caller did not provide one.
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    /// Unique human-readable key. Changed only through rename.
    pub slug: String,
    pub title: String,
    /// Markdown or other structured rich text.
    pub body: String,
    pub status: ContentStatus,
    /// Optimistic concurrency token. `0` means "not stored yet".
    pub version: u64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
    /// Unix epoch milliseconds of the latest publish.
    pub published_at: Option<i64>,
    pub created_by: Actor,
    pub updated_by: Actor,
}

impl ContentItem {
    /// Builds an unsaved draft with a fresh id and `version = 0`.
    pub fn new_draft(
        slug: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        actor: &Actor,
        now_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: slug.into(),
            title: title.into(),
            body: body.into(),
            status: ContentStatus::Draft,
            version: 0,
            created_at: now_ms,
            updated_at: now_ms,
            published_at: None,
            created_by: actor.clone(),
            updated_by: actor.clone(),
        }
    }

    /// Whether public readers may see this item.
    pub fn is_public(&self) -> bool {
        self.status == ContentStatus::Published
    }

    /// Stamps audit fields for a new write.
    pub fn touch(&mut self, actor: &Actor, now_ms: i64) {
        self.updated_at = now_ms;
        self.updated_by = actor.clone();
    }
}

/// Current wall clock in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
