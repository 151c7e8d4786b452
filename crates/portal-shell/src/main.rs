//! WebPortal shell.
//!
//! Entry point for the portal host. Initializes the global allocator, sets
//! up logging, opens the session (catalog cache, fetcher, bookmark store),
//! refreshes a stale snapshot, and prints the catalog visible under the
//! configured role claims.

mod session;

use anyhow::Result;
use portal_catalog::FetcherConfig;
use session::PortalSession;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const CATALOG_URL_VAR: &str = "PORTAL_CATALOG_URL";
const ALLOW_LIST_URL_VAR: &str = "PORTAL_ALLOW_LIST_URL";
const ROLES_VAR: &str = "PORTAL_ROLES";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("WebPortal shell starting...");

    let mut fetcher_config = FetcherConfig::default();
    if let Ok(url) = std::env::var(CATALOG_URL_VAR) {
        fetcher_config.catalog_url = url;
    }
    if let Ok(url) = std::env::var(ALLOW_LIST_URL_VAR) {
        fetcher_config.allow_list_url = url;
    }

    // Comma-separated role claims, normally handed over by the host's auth
    // layer rather than the environment.
    let roles: Vec<String> = std::env::var(ROLES_VAR)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let session = PortalSession::open(data_dir(), fetcher_config, roles)?;

    if session.needs_refresh() {
        info!("Cached catalog is stale, refreshing");
        if let Err(e) = session.refresh().await {
            warn!("Refresh failed, serving last good snapshot: {}", e);
        }
    }

    let categories = session.visible_categories();
    if categories.is_empty() {
        info!("No apps visible (empty catalog or no matching roles)");
    }
    for category in &categories {
        info!("{} ({} apps)", category.name, category.apps.len());
        for app in &category.apps {
            info!("  {} [{}]", app.name, app.entry);
        }
    }

    info!("WebPortal shell ready");
    Ok(())
}

/// Per-user data directory for the cache and bookmark blobs.
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("webportal")
}
