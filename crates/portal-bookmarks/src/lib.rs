//! WebPortal Bookmark Store
//!
//! User-pinned URLs, remembered through the portal app they were reached in
//! and persisted as one JSON blob. Capped per app and globally, with no
//! eviction: a full store refuses new pins until the user makes room.

mod bookmark;
mod store;

pub use bookmark::{Bookmark, BookmarkId};
pub use store::{BookmarkError, BookmarkLimits, BookmarkStore, BookmarkStoreConfig};
