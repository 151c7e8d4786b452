//! Bookmark records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(pub u64);

impl BookmarkId {
    /// Create a new bookmark ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bookmark({})", self.0)
    }
}

/// One user-pinned URL, remembered through the portal app it was reached in.
///
/// Bookmarks live independently of the catalog: replacing the catalog never
/// touches them, and a bookmark whose app has since disappeared still lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Unique id, assigned by the store
    pub id: BookmarkId,
    /// Entry of the descriptor the URL was reached through
    pub app_entry: String,
    /// Display name of that descriptor at pin time
    pub app_name: String,
    /// User-visible title
    pub title: String,
    /// The pinned URL
    pub url: String,
    /// Optional icon reference
    pub icon: Option<String>,
    /// Unix seconds at creation
    pub created_at: u64,
    /// Unix seconds of the latest access, none before the first
    pub last_accessed: Option<u64>,
    /// How many times the bookmark was opened
    pub access_count: u64,
}
