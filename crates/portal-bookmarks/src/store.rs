//! Persisted bookmark store.
//!
//! Bookmarks live in one JSON blob next to the catalog cache but with their
//! own lifecycle: catalog replacement never touches them. Every mutation is
//! read-modify-write under the write lock, disk write included, so two
//! concurrent pins cannot overwrite each other's entry.
//!
//! Caps are hard limits. Pinning past a cap is an error surfaced to the
//! user; nothing is evicted to make room.

use crate::bookmark::{Bookmark, BookmarkId};
use portal_catalog::WebAppDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-app bookmark cap.
const DEFAULT_PER_APP_CAP: usize = 50;

/// Global bookmark cap.
const DEFAULT_GLOBAL_CAP: usize = 500;

const BOOKMARKS_FILE: &str = "bookmarks.json";

/// Bookmark store errors.
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Bookmark cap reached: {scope} cap is {limit}")]
    CapacityExceeded {
        scope: &'static str,
        limit: usize,
    },

    #[error("Bookmark not found: {0}")]
    NotFound(BookmarkId),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Capacity limits for the store.
#[derive(Debug, Clone)]
pub struct BookmarkLimits {
    /// Maximum bookmarks per app entry
    pub per_app: usize,
    /// Maximum bookmarks overall
    pub global: usize,
}

impl Default for BookmarkLimits {
    fn default() -> Self {
        Self {
            per_app: DEFAULT_PER_APP_CAP,
            global: DEFAULT_GLOBAL_CAP,
        }
    }
}

/// Configuration for the bookmark store.
#[derive(Debug, Clone)]
pub struct BookmarkStoreConfig {
    /// Directory holding the persisted blob
    pub storage_dir: PathBuf,
    /// Capacity limits
    pub limits: BookmarkLimits,
}

impl Default for BookmarkStoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("/tmp/webportal/bookmarks"),
            limits: BookmarkLimits::default(),
        }
    }
}

/// Persisted collection. The id counter travels with the blob so ids stay
/// unique across restarts and unpins never free an id for reuse.
#[derive(Debug, Serialize, Deserialize)]
struct BookmarkCollection {
    next_id: u64,
    bookmarks: Vec<Bookmark>,
}

impl Default for BookmarkCollection {
    fn default() -> Self {
        Self {
            next_id: 1,
            bookmarks: Vec::new(),
        }
    }
}

/// Persisted store of user-pinned URLs.
pub struct BookmarkStore {
    config: BookmarkStoreConfig,
    state: RwLock<BookmarkCollection>,
}

impl BookmarkStore {
    /// Open the store, loading the persisted collection.
    ///
    /// A blob that fails to decode degrades to an empty collection rather
    /// than refusing to open.
    pub fn open(config: BookmarkStoreConfig) -> Result<Self, BookmarkError> {
        fs::create_dir_all(&config.storage_dir)?;

        let path = config.storage_dir.join(BOOKMARKS_FILE);
        let collection = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(collection) => collection,
                Err(e) => {
                    warn!(
                        "Discarding undecodable bookmark blob {}: {}",
                        path.display(),
                        e
                    );
                    BookmarkCollection::default()
                }
            },
            Err(_) => BookmarkCollection::default(),
        };

        info!("Bookmark store opened: {} bookmarks", collection.bookmarks.len());

        Ok(Self {
            config,
            state: RwLock::new(collection),
        })
    }

    /// Open with default configuration.
    pub fn with_defaults() -> Result<Self, BookmarkError> {
        Self::open(BookmarkStoreConfig::default())
    }

    /// Pin a URL reached through `app`.
    ///
    /// Validates the URL and both caps before anything changes. The returned
    /// bookmark carries its assigned id.
    pub fn pin(
        &self,
        url: &str,
        title: &str,
        app: &WebAppDescriptor,
        icon: Option<String>,
    ) -> Result<Bookmark, BookmarkError> {
        url::Url::parse(url).map_err(|e| BookmarkError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut state = self.state.write().unwrap();

        if state.bookmarks.len() >= self.config.limits.global {
            return Err(BookmarkError::CapacityExceeded {
                scope: "global",
                limit: self.config.limits.global,
            });
        }
        let for_app = state
            .bookmarks
            .iter()
            .filter(|b| b.app_entry == app.entry)
            .count();
        if for_app >= self.config.limits.per_app {
            return Err(BookmarkError::CapacityExceeded {
                scope: "per-app",
                limit: self.config.limits.per_app,
            });
        }

        let id = BookmarkId::new(state.next_id);
        state.next_id += 1;

        let bookmark = Bookmark {
            id,
            app_entry: app.entry.clone(),
            app_name: app.name.clone(),
            title: title.to_string(),
            url: url.to_string(),
            icon,
            created_at: unix_now(),
            last_accessed: None,
            access_count: 0,
        };

        state.bookmarks.push(bookmark.clone());
        if let Err(e) = self.persist(&state) {
            state.bookmarks.pop();
            return Err(e);
        }

        debug!("Pinned {} -> {}", bookmark.id, bookmark.url);
        Ok(bookmark)
    }

    /// Remove a bookmark.
    pub fn unpin(&self, id: BookmarkId) -> Result<(), BookmarkError> {
        let mut state = self.state.write().unwrap();

        let index = state
            .bookmarks
            .iter()
            .position(|b| b.id == id)
            .ok_or(BookmarkError::NotFound(id))?;

        let removed = state.bookmarks.remove(index);
        if let Err(e) = self.persist(&state) {
            state.bookmarks.insert(index, removed);
            return Err(e);
        }

        debug!("Unpinned {}", id);
        Ok(())
    }

    /// Record that a bookmark was opened: bump the counter, stamp the time.
    ///
    /// An unknown id is a silent no-op; opening a just-deleted bookmark is
    /// not worth an error.
    pub fn record_access(&self, id: BookmarkId) {
        let mut state = self.state.write().unwrap();

        let Some(bookmark) = state.bookmarks.iter_mut().find(|b| b.id == id) else {
            debug!("Access recorded for unknown {}", id);
            return;
        };
        bookmark.access_count += 1;
        bookmark.last_accessed = Some(unix_now());

        if let Err(e) = self.persist(&state) {
            warn!("Failed to persist access record for {}: {}", id, e);
        }
    }

    /// All bookmarks in pin order.
    pub fn list(&self) -> Vec<Bookmark> {
        self.state.read().unwrap().bookmarks.clone()
    }

    /// Bookmarks pinned through one app entry, in pin order.
    pub fn list_for(&self, app_entry: &str) -> Vec<Bookmark> {
        self.state
            .read()
            .unwrap()
            .bookmarks
            .iter()
            .filter(|b| b.app_entry == app_entry)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over title, URL, and app name.
    pub fn search(&self, query: &str) -> Vec<Bookmark> {
        let needle = query.to_lowercase();
        self.state
            .read()
            .unwrap()
            .bookmarks
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&needle)
                    || b.url.to_lowercase().contains(&needle)
                    || b.app_name.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Bookmarks grouped by owning app entry.
    pub fn group_by_app(&self) -> HashMap<String, Vec<Bookmark>> {
        let state = self.state.read().unwrap();
        let mut groups: HashMap<String, Vec<Bookmark>> = HashMap::new();
        for bookmark in &state.bookmarks {
            groups
                .entry(bookmark.app_entry.clone())
                .or_default()
                .push(bookmark.clone());
        }
        groups
    }

    /// Fetch one bookmark by id.
    pub fn get(&self, id: BookmarkId) -> Option<Bookmark> {
        self.state
            .read()
            .unwrap()
            .bookmarks
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    /// Number of bookmarks in the store.
    pub fn len(&self) -> usize {
        self.state.read().unwrap().bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the collection atomically: temp file first, then rename.
    fn persist(&self, collection: &BookmarkCollection) -> Result<(), BookmarkError> {
        let path = self.config.storage_dir.join(BOOKMARKS_FILE);
        let json = serde_json::to_vec_pretty(collection)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
