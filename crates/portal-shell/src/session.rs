//! Portal session: the composition root.
//!
//! Owns one cache, one fetcher, and one bookmark store, wired together
//! explicitly, plus the caller's current role claims. The embedding surface
//! drives everything through this type: filtered reads, gate construction,
//! navigation decisions, bookmark actions.
//!
//! Role claims are opaque strings handed in by the host's auth layer; the
//! session never validates or refreshes them, it only matches against them.

use anyhow::Result;
use portal_bookmarks::{Bookmark, BookmarkError, BookmarkId, BookmarkStore, BookmarkStoreConfig};
use portal_catalog::{
    CacheConfig, CatalogCache, CatalogFetcher, Category, FetcherConfig, WebAppDescriptor,
};
use portal_policy::{NavigationDecision, NavigationGate};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub struct PortalSession {
    cache: Arc<CatalogCache>,
    fetcher: CatalogFetcher,
    bookmarks: BookmarkStore,
    /// Current role claims; an input to every filtered read
    roles: Vec<String>,
}

impl PortalSession {
    /// Open a session rooted at `data_dir`, loading whatever snapshot and
    /// bookmarks survived the last run.
    pub fn open(
        data_dir: PathBuf,
        fetcher_config: FetcherConfig,
        roles: Vec<String>,
    ) -> Result<Self> {
        let cache = Arc::new(CatalogCache::open(CacheConfig {
            storage_dir: data_dir.join("cache"),
            ..CacheConfig::default()
        })?);
        let bookmarks = BookmarkStore::open(BookmarkStoreConfig {
            storage_dir: data_dir.join("bookmarks"),
            ..BookmarkStoreConfig::default()
        })?;
        let fetcher = CatalogFetcher::new(fetcher_config, cache.clone());

        Ok(Self {
            cache,
            fetcher,
            bookmarks,
            roles,
        })
    }

    /// Refresh both endpoints. On failure the previous snapshot stays
    /// visible and the error propagates for the surface to report.
    pub async fn refresh(&self) -> Result<()> {
        let apps = self.fetcher.refresh_catalog().await?;
        let entries = self.fetcher.refresh_allow_list().await?;
        info!(
            "Refreshed: {} apps, {} global allow entries",
            apps.len(),
            entries.len()
        );
        Ok(())
    }

    /// Whether the cached catalog is due for a refresh.
    pub fn needs_refresh(&self) -> bool {
        self.cache.is_expired()
    }

    /// Catalog subset visible under the current role claims.
    pub fn visible_catalog(&self) -> Vec<WebAppDescriptor> {
        self.cache.visible_catalog(&self.roles)
    }

    /// Categorized view of the visible subset.
    pub fn visible_categories(&self) -> Vec<Category> {
        self.cache.visible_categories(&self.roles)
    }

    /// Replace the role claims, e.g. after a re-login. Takes effect on the
    /// next read; the persisted snapshot is untouched.
    pub fn set_roles(&mut self, roles: Vec<String>) {
        self.roles = roles;
    }

    /// Open a visible app: look it up and build its navigation gate.
    ///
    /// Apps hidden from the current roles do not resolve, so a stale UI
    /// card cannot open something the caller is no longer entitled to.
    pub fn open_app(&self, entry: &str) -> Option<(WebAppDescriptor, NavigationGate)> {
        let app = self
            .visible_catalog()
            .into_iter()
            .find(|app| app.entry == entry)?;
        let gate = NavigationGate::for_app(&app);
        Some((app, gate))
    }

    /// Decide one navigation attempt against the currently cached
    /// allow-list.
    pub fn decide(&self, gate: &NavigationGate, target: &str) -> NavigationDecision {
        gate.evaluate(target, &self.cache.global_allow())
    }

    /// Pin `url` through `app`, defaulting the icon from the descriptor.
    pub fn pin_bookmark(
        &self,
        app: &WebAppDescriptor,
        url: &str,
        title: &str,
    ) -> Result<Bookmark, BookmarkError> {
        let icon = (!app.icon.is_empty()).then(|| app.icon.clone());
        self.bookmarks.pin(url, title, app, icon)
    }

    /// Open a bookmark: record the access and return it for navigation.
    pub fn open_bookmark(&self, id: BookmarkId) -> Option<Bookmark> {
        self.bookmarks.record_access(id);
        self.bookmarks.get(id)
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_catalog::AppKind;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn test_session(roles: &[&str]) -> PortalSession {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let data_dir = std::env::temp_dir().join(format!(
            "webportal-test-session-{}-{}",
            std::process::id(),
            seq
        ));
        PortalSession::open(
            data_dir,
            FetcherConfig::default(),
            roles.iter().map(|role| role.to_string()).collect(),
        )
        .unwrap()
    }

    fn descriptor(entry: &str, patterns: &[&str], required_role: Option<&str>) -> WebAppDescriptor {
        WebAppDescriptor {
            entry: entry.to_string(),
            name: entry.to_string(),
            description: String::new(),
            icon: String::new(),
            image: String::new(),
            category: "Tools".to_string(),
            urls_permitted: patterns.iter().map(|p| p.to_string()).collect(),
            location: Vec::new(),
            kind: AppKind::Leaf,
            parent: None,
            required_role: required_role.map(str::to_string),
        }
    }

    fn seed(session: &PortalSession, apps: Vec<WebAppDescriptor>) {
        session.cache().store_catalog_sequenced(1, apps).unwrap();
    }

    #[test]
    fn test_open_app_respects_entitlements() {
        let mut session = test_session(&["user"]);
        seed(
            &session,
            vec![
                descriptor("open.example.com", &[], None),
                descriptor("admin.example.com", &[], Some("admin")),
            ],
        );

        assert!(session.open_app("open.example.com").is_some());
        assert!(session.open_app("admin.example.com").is_none());

        session.set_roles(vec!["admin".to_string()]);
        assert!(session.open_app("admin.example.com").is_some());
    }

    #[test]
    fn test_decide_uses_cached_allow_list() {
        let session = test_session(&[]);
        seed(
            &session,
            vec![descriptor("chat.example.com", &["nothing.matches"], None)],
        );
        session
            .cache()
            .store_global_allow_sequenced(
                1,
                vec![portal_catalog::GlobalAllowEntry {
                    entry: "cdn.assets.net".to_string(),
                    name: String::new(),
                }],
            )
            .unwrap();

        let (_, gate) = session.open_app("chat.example.com").unwrap();

        let decision = session.decide(&gate, "https://cdn.assets.net/app.js");
        assert!(decision.is_allowed());

        let decision = session.decide(&gate, "https://evil.net/");
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_bookmark_flow() {
        let session = test_session(&[]);
        seed(
            &session,
            vec![descriptor("chat.example.com", &["*.example.com/*"], None)],
        );

        let (app, _) = session.open_app("chat.example.com").unwrap();
        let pinned = session
            .pin_bookmark(&app, "https://chat.example.com/room/1", "Room 1")
            .unwrap();

        let opened = session.open_bookmark(pinned.id).unwrap();
        assert_eq!(opened.access_count, 1);
        assert_eq!(session.bookmarks().list_for("chat.example.com").len(), 1);
    }

    #[test]
    fn test_bookmarks_survive_catalog_replacement() {
        let session = test_session(&[]);
        seed(
            &session,
            vec![descriptor("chat.example.com", &[], None)],
        );

        let (app, _) = session.open_app("chat.example.com").unwrap();
        session
            .pin_bookmark(&app, "https://chat.example.com/room/1", "Room 1")
            .unwrap();

        // Wholesale catalog replacement drops the app entirely.
        session
            .cache()
            .store_catalog_sequenced(2, vec![descriptor("other.example.com", &[], None)])
            .unwrap();

        assert_eq!(session.bookmarks().len(), 1);
        assert!(session.open_app("chat.example.com").is_none());
    }
}
