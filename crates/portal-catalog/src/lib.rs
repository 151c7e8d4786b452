//! WebPortal Catalog Layer
//!
//! Fetches the curated catalog of externally hosted portal apps plus the
//! global allow-list, and serves reads from a persisted snapshot.
//!
//! Architecture:
//! 1. Fetch → decode flat JSON array → replace cached snapshot wholesale
//! 2. Overtaken fetch results are discarded, never applied out of order
//! 3. Reads come from the snapshot, never the network
//! 4. Role filtering is derived fresh on every read, never persisted

mod cache;
mod descriptor;
mod entitlement;
mod fetcher;

pub use cache::{CacheConfig, CacheEnvelope, CatalogCache, DEFAULT_CACHE_TTL};
pub use descriptor::{categorize, AppKind, Category, GlobalAllowEntry, WebAppDescriptor};
pub use entitlement::{children_of, filter_by_role, placed_at};
pub use fetcher::{CatalogFetcher, FetcherConfig};

use thiserror::Error;

/// Errors from fetching, decoding, or persisting catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}
