//! Role-based visibility filtering.
//!
//! A descriptor carries at most one required role; a caller holding that
//! role (or facing no requirement) sees the app. Filtering is derived fresh
//! on every read against the caller's current claims and is never baked
//! into the persisted cache, so a re-login changes visibility without a
//! refetch.

use crate::cache::CatalogCache;
use crate::descriptor::{categorize, Category, WebAppDescriptor};

/// Descriptors visible to a caller holding `roles`.
///
/// Visible means: no required role, or the single required role is present
/// in the caller's set. Order is preserved.
pub fn filter_by_role(
    descriptors: &[WebAppDescriptor],
    roles: &[String],
) -> Vec<WebAppDescriptor> {
    descriptors
        .iter()
        .filter(|app| match &app.required_role {
            None => true,
            Some(required) => roles.iter().any(|role| role == required),
        })
        .cloned()
        .collect()
}

/// Descriptors carrying the placement tag `tag`.
pub fn placed_at<'a>(
    descriptors: &'a [WebAppDescriptor],
    tag: &str,
) -> Vec<&'a WebAppDescriptor> {
    descriptors
        .iter()
        .filter(|app| app.location.iter().any(|location| location == tag))
        .collect()
}

/// Descriptors nested under the sublist entry `parent_entry`.
pub fn children_of<'a>(
    descriptors: &'a [WebAppDescriptor],
    parent_entry: &str,
) -> Vec<&'a WebAppDescriptor> {
    descriptors
        .iter()
        .filter(|app| app.parent.as_deref() == Some(parent_entry))
        .collect()
}

impl CatalogCache {
    /// Catalog subset visible to `roles`, derived from the raw snapshot.
    pub fn visible_catalog(&self, roles: &[String]) -> Vec<WebAppDescriptor> {
        filter_by_role(&self.catalog(), roles)
    }

    /// Filtered and freshly recategorized view.
    ///
    /// Recomputed from the filtered subset rather than filtered out of the
    /// stored view, so a category whose apps are all hidden disappears
    /// entirely instead of showing up empty.
    pub fn visible_categories(&self, roles: &[String]) -> Vec<Category> {
        categorize(&self.visible_catalog(roles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::descriptor::AppKind;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

    fn test_cache() -> CatalogCache {
        let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
        let config = CacheConfig {
            storage_dir: std::env::temp_dir().join(format!(
                "webportal-test-entitlement-{}-{}",
                std::process::id(),
                seq
            )),
            ..CacheConfig::default()
        };
        CatalogCache::open(config).unwrap()
    }

    fn descriptor(entry: &str, category: &str, required_role: Option<&str>) -> WebAppDescriptor {
        WebAppDescriptor {
            entry: entry.to_string(),
            name: entry.to_string(),
            description: String::new(),
            icon: String::new(),
            image: String::new(),
            category: category.to_string(),
            urls_permitted: Vec::new(),
            location: Vec::new(),
            kind: AppKind::Leaf,
            parent: None,
            required_role: required_role.map(str::to_string),
        }
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_unrestricted_apps_visible_to_everyone() {
        let apps = vec![descriptor("open.example.com", "Tools", None)];

        assert_eq!(filter_by_role(&apps, &[]).len(), 1);
        assert_eq!(filter_by_role(&apps, &roles(&["admin"])).len(), 1);
    }

    #[test]
    fn test_required_role_gates_visibility() {
        let apps = vec![
            descriptor("open.example.com", "Tools", None),
            descriptor("admin.example.com", "Tools", Some("admin")),
        ];

        let for_user = filter_by_role(&apps, &roles(&["user"]));
        assert_eq!(for_user.len(), 1);
        assert_eq!(for_user[0].entry, "open.example.com");

        let for_admin = filter_by_role(&apps, &roles(&["user", "admin"]));
        assert_eq!(for_admin.len(), 2);
    }

    #[test]
    fn test_role_match_is_exact() {
        let apps = vec![descriptor("admin.example.com", "Tools", Some("admin"))];

        assert!(filter_by_role(&apps, &roles(&["Admin"])).is_empty());
        assert!(filter_by_role(&apps, &roles(&["admin-ro"])).is_empty());
        assert_eq!(filter_by_role(&apps, &roles(&["admin"])).len(), 1);
    }

    #[test]
    fn test_visible_categories_drop_emptied_groups() {
        let cache = test_cache();
        cache
            .store_catalog_sequenced(
                1,
                vec![
                    descriptor("chat.example.com", "Comms", None),
                    descriptor("docs.example.com", "Tools", None),
                    descriptor("audit.example.com", "Admin", Some("admin")),
                ],
            )
            .unwrap();

        // The admin-only app disappears for a member, and so does its
        // category, since it was the sole member.
        let visible = cache.visible_categories(&roles(&["member"]));
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].name, "Comms");
        assert_eq!(visible[1].name, "Tools");

        let all = cache.visible_categories(&roles(&["admin"]));
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_filtering_never_persisted() {
        let cache = test_cache();
        cache
            .store_catalog_sequenced(
                1,
                vec![descriptor("secret.example.com", "Restricted", Some("admin"))],
            )
            .unwrap();

        assert!(cache.visible_catalog(&roles(&["user"])).is_empty());

        // The raw snapshot still holds the hidden app; a later read with the
        // right claims sees it without a refetch.
        assert_eq!(cache.catalog().len(), 1);
        assert_eq!(cache.visible_catalog(&roles(&["admin"])).len(), 1);
    }

    #[test]
    fn test_placed_at() {
        let mut tagged = descriptor("home.example.com", "Tools", None);
        tagged.location = vec!["home".to_string(), "sidebar".to_string()];
        let apps = vec![tagged, descriptor("other.example.com", "Tools", None)];

        let on_home = placed_at(&apps, "home");
        assert_eq!(on_home.len(), 1);
        assert_eq!(on_home[0].entry, "home.example.com");
        assert!(placed_at(&apps, "footer").is_empty());
    }

    #[test]
    fn test_children_of() {
        let mut child = descriptor("child.example.com", "Tools", None);
        child.parent = Some("suite.example.com".to_string());
        let mut suite = descriptor("suite.example.com", "Tools", None);
        suite.kind = AppKind::Sublist;
        let apps = vec![suite, child, descriptor("loose.example.com", "Tools", None)];

        let children = children_of(&apps, "suite.example.com");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].entry, "child.example.com");
    }
}
