//! Document domain model.
//!
//! # Responsibility
//! - Define the single persisted entity and its partial-update shape.
//! - Provide the public read projection handed to non-owners.
//!
//! # Invariants
//! - `id` is stable and never reused for another document.
//! - `title` is never blank; blank input collapses to [`UNTITLED_TITLE`].
//! - `is_archived` is the source of truth for trash state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every document.
pub type DocumentId = Uuid;

/// Stable identifier of a user, as issued by the identity provider.
pub type UserId = String;

/// Title used when a caller clears or omits the title.
pub const UNTITLED_TITLE: &str = "Untitled";

/// One page in a user's document forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    /// Creator identity subject. Immutable after creation.
    pub owner_id: UserId,
    /// `None` means root-level document.
    pub parent_id: Option<DocumentId>,
    /// Trash flag. Descendants converge to the same value asynchronously.
    pub is_archived: bool,
    /// Grants anonymous read access while the document is not archived.
    pub is_published: bool,
    /// Serialized rich-text payload, opaque to core.
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub icon: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Document {
    /// Builds a fresh, active, unpublished document with a generated id.
    ///
    /// Timestamps are zero until the store assigns them on insert.
    pub fn new(owner_id: impl Into<UserId>, title: &str, parent_id: Option<DocumentId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: normalize_title(title),
            owner_id: owner_id.into(),
            parent_id,
            is_archived: false,
            is_published: false,
            content: None,
            cover_image_url: None,
            icon: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns whether anyone may read this document without identity.
    pub fn is_publicly_readable(&self) -> bool {
        self.is_published && !self.is_archived
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Partial update for user-editable fields.
///
/// `None` leaves a field unchanged. Clearing `icon` / `cover_image_url` goes
/// through the dedicated removal operations instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub icon: Option<String>,
    pub is_published: Option<bool>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.cover_image_url.is_none()
            && self.icon.is_none()
            && self.is_published.is_none()
    }

    /// Returns a copy with the title normalized, if one is present.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.map(|title| normalize_title(&title));
        self
    }
}

/// Read projection for callers that do not own the document.
///
/// Owner and hierarchy information is withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDocument {
    pub id: DocumentId,
    pub title: String,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub icon: Option<String>,
    pub is_published: bool,
}

impl From<&Document> for PublicDocument {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id,
            title: document.title.clone(),
            content: document.content.clone(),
            cover_image_url: document.cover_image_url.clone(),
            icon: document.icon.clone(),
            is_published: document.is_published,
        }
    }
}

/// Result of a single-document read, shaped by who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DocumentView {
    /// Caller owns the document.
    Owner(Document),
    /// Anonymous or non-owner read of a published document.
    Public(PublicDocument),
}

impl DocumentView {
    /// Returns the full record when the caller is the owner.
    pub fn into_owned(self) -> Option<Document> {
        match self {
            Self::Owner(document) => Some(document),
            Self::Public(_) => None,
        }
    }
}

/// Trims a title and substitutes [`UNTITLED_TITLE`] for blank input.
pub fn normalize_title(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNTITLED_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Case-insensitive title substring filter for search and trash listings.
///
/// An empty or blank needle keeps every document.
pub fn filter_by_title(documents: Vec<Document>, needle: &str) -> Vec<Document> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return documents;
    }
    documents
        .into_iter()
        .filter(|document| document.title.to_lowercase().contains(&needle))
        .collect()
}
