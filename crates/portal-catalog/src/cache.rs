//! Persisted catalog cache.
//!
//! Holds the last successful snapshot of the catalog, its categorized view,
//! and the global allow-list as three independent JSON blobs. Every store is
//! a wholesale replacement; there is no per-entry merging.
//!
//! Key properties:
//! - Atomic writes (temp file + rename) to prevent torn blobs
//! - A blob that fails to decode degrades to empty instead of failing reads
//! - Sequenced stores discard results overtaken by a newer fetch

use crate::descriptor::{categorize, Category, GlobalAllowEntry, WebAppDescriptor};
use crate::CatalogError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Staleness bound for a fetched snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

const CATALOG_FILE: &str = "catalog.json";
const CATEGORIES_FILE: &str = "categories.json";
const ALLOW_LIST_FILE: &str = "allowlist.json";

/// Configuration for the catalog cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding the persisted blobs
    pub storage_dir: PathBuf,
    /// Staleness bound compared against the last successful fetch
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("/tmp/webportal/cache"),
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// A stored payload stamped with the time it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub payload: T,
    /// Unix seconds of the successful fetch that produced the payload
    pub fetched_at: u64,
}

impl<T> CacheEnvelope<T> {
    pub fn new(payload: T, fetched_at: u64) -> Self {
        Self {
            payload,
            fetched_at,
        }
    }

    /// Whether the payload is older than `ttl` at `now` (unix seconds).
    pub fn is_expired(&self, ttl: Duration, now: u64) -> bool {
        now.saturating_sub(self.fetched_at) > ttl.as_secs()
    }
}

/// In-memory view of the persisted blobs plus fetch-ordering watermarks.
#[derive(Debug, Default)]
struct CacheState {
    catalog: Option<CacheEnvelope<Vec<WebAppDescriptor>>>,
    categorized: Option<Vec<Category>>,
    global_allow: Option<CacheEnvelope<Vec<GlobalAllowEntry>>>,
    /// Issue-time sequence of the newest applied catalog fetch
    catalog_seq: u64,
    /// Issue-time sequence of the newest applied allow-list fetch
    allow_seq: u64,
}

/// Cache of the last good catalog snapshot.
///
/// All mutation happens under the write lock, including the disk write, so
/// a reader never observes memory and disk drifting apart mid-store.
pub struct CatalogCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
}

impl CatalogCache {
    /// Open the cache, loading whatever blobs survived the last run.
    pub fn open(config: CacheConfig) -> Result<Self, CatalogError> {
        fs::create_dir_all(&config.storage_dir)?;

        let state = CacheState {
            catalog: load_blob(&config.storage_dir.join(CATALOG_FILE)),
            categorized: load_blob(&config.storage_dir.join(CATEGORIES_FILE)),
            global_allow: load_blob(&config.storage_dir.join(ALLOW_LIST_FILE)),
            catalog_seq: 0,
            allow_seq: 0,
        };

        info!(
            "Catalog cache opened at {}: {} apps, {} allow entries",
            config.storage_dir.display(),
            state.catalog.as_ref().map(|e| e.payload.len()).unwrap_or(0),
            state
                .global_allow
                .as_ref()
                .map(|e| e.payload.len())
                .unwrap_or(0),
        );

        Ok(Self {
            config,
            state: RwLock::new(state),
        })
    }

    /// Open with default configuration.
    pub fn with_defaults() -> Result<Self, CatalogError> {
        Self::open(CacheConfig::default())
    }

    /// Replace the raw catalog wholesale and stamp the fetch time.
    pub fn store_catalog(
        &self,
        descriptors: Vec<WebAppDescriptor>,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();
        self.store_catalog_locked(&mut state, descriptors)
    }

    /// Replace the categorized view wholesale.
    pub fn store_categorized(&self, categories: Vec<Category>) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();
        self.store_categorized_locked(&mut state, categories)
    }

    /// Replace the global allow-list wholesale and stamp the fetch time.
    pub fn store_global_allow(
        &self,
        entries: Vec<GlobalAllowEntry>,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();
        self.store_global_allow_locked(&mut state, entries)
    }

    /// Apply a catalog fetch result issued with sequence `seq`.
    ///
    /// Stores the raw list and its recomputed categorization under one lock.
    /// Returns false (and stores nothing) when a fetch issued later has
    /// already landed, so a slow response cannot clobber a newer snapshot.
    pub fn store_catalog_sequenced(
        &self,
        seq: u64,
        descriptors: Vec<WebAppDescriptor>,
    ) -> Result<bool, CatalogError> {
        let mut state = self.state.write().unwrap();
        if seq <= state.catalog_seq {
            warn!(
                "Discarding stale catalog result (seq {} <= {})",
                seq, state.catalog_seq
            );
            return Ok(false);
        }
        state.catalog_seq = seq;

        let categories = categorize(&descriptors);
        self.store_catalog_locked(&mut state, descriptors)?;
        self.store_categorized_locked(&mut state, categories)?;
        Ok(true)
    }

    /// Apply an allow-list fetch result issued with sequence `seq`.
    ///
    /// Same ordering rule as [`store_catalog_sequenced`](Self::store_catalog_sequenced).
    pub fn store_global_allow_sequenced(
        &self,
        seq: u64,
        entries: Vec<GlobalAllowEntry>,
    ) -> Result<bool, CatalogError> {
        let mut state = self.state.write().unwrap();
        if seq <= state.allow_seq {
            warn!(
                "Discarding stale allow-list result (seq {} <= {})",
                seq, state.allow_seq
            );
            return Ok(false);
        }
        state.allow_seq = seq;
        self.store_global_allow_locked(&mut state, entries)?;
        Ok(true)
    }

    /// Last stored raw catalog, empty if nothing was ever fetched.
    pub fn catalog(&self) -> Vec<WebAppDescriptor> {
        let state = self.state.read().unwrap();
        state
            .catalog
            .as_ref()
            .map(|e| e.payload.clone())
            .unwrap_or_default()
    }

    /// Last stored categorized view, empty if nothing was ever fetched.
    pub fn categorized(&self) -> Vec<Category> {
        let state = self.state.read().unwrap();
        state.categorized.clone().unwrap_or_default()
    }

    /// Last stored global allow-list, empty if nothing was ever fetched.
    pub fn global_allow(&self) -> Vec<GlobalAllowEntry> {
        let state = self.state.read().unwrap();
        state
            .global_allow
            .as_ref()
            .map(|e| e.payload.clone())
            .unwrap_or_default()
    }

    /// Unix seconds of the last successful catalog fetch.
    pub fn last_fetched_at(&self) -> Option<u64> {
        let state = self.state.read().unwrap();
        state.catalog.as_ref().map(|e| e.fetched_at)
    }

    /// Whether the cached catalog is older than the TTL.
    ///
    /// True when nothing was ever fetched. An expired snapshot is still
    /// served; expiry only signals that a refresh is due.
    pub fn is_expired(&self) -> bool {
        let state = self.state.read().unwrap();
        match &state.catalog {
            Some(envelope) => envelope.is_expired(self.config.ttl, unix_now()),
            None => true,
        }
    }

    /// Drop everything, memory and disk.
    pub fn clear(&self) -> Result<(), CatalogError> {
        let mut state = self.state.write().unwrap();
        for file in [CATALOG_FILE, CATEGORIES_FILE, ALLOW_LIST_FILE] {
            let path = self.config.storage_dir.join(file);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        state.catalog = None;
        state.categorized = None;
        state.global_allow = None;
        debug!("Catalog cache cleared");
        Ok(())
    }

    fn store_catalog_locked(
        &self,
        state: &mut CacheState,
        descriptors: Vec<WebAppDescriptor>,
    ) -> Result<(), CatalogError> {
        let envelope = CacheEnvelope::new(descriptors, unix_now());
        write_blob(&self.config.storage_dir.join(CATALOG_FILE), &envelope)?;
        debug!("Stored catalog: {} apps", envelope.payload.len());
        state.catalog = Some(envelope);
        Ok(())
    }

    fn store_categorized_locked(
        &self,
        state: &mut CacheState,
        categories: Vec<Category>,
    ) -> Result<(), CatalogError> {
        write_blob(&self.config.storage_dir.join(CATEGORIES_FILE), &categories)?;
        debug!("Stored categorized view: {} categories", categories.len());
        state.categorized = Some(categories);
        Ok(())
    }

    fn store_global_allow_locked(
        &self,
        state: &mut CacheState,
        entries: Vec<GlobalAllowEntry>,
    ) -> Result<(), CatalogError> {
        let envelope = CacheEnvelope::new(entries, unix_now());
        write_blob(&self.config.storage_dir.join(ALLOW_LIST_FILE), &envelope)?;
        debug!("Stored global allow-list: {} entries", envelope.payload.len());
        state.global_allow = Some(envelope);
        Ok(())
    }
}

/// Write a blob atomically: temp file first, then rename over the target.
fn write_blob<T: Serialize>(path: &Path, value: &T) -> Result<(), CatalogError> {
    let json = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load a blob, treating an absent or undecodable file as empty.
fn load_blob<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return None,
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                "Discarding undecodable cache blob {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Current unix time in seconds.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
