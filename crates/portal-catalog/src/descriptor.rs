//! Wire model for catalog entries and the grouping computed from them.
//!
//! Both remote endpoints return flat JSON arrays with camelCase keys. Real
//! payloads are sparse, so everything besides `entry` and `name` defaults.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Kind of catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    /// A single externally hosted app
    #[default]
    Leaf,
    /// A grouping node whose children point back at it via `parent`
    Sublist,
    /// A feed-style resource
    Feed,
}

/// Metadata record for one externally hosted app exposed through the portal.
///
/// `entry` is the canonical host/domain identifier and the unique key within
/// a catalog snapshot. The portal never serves app content itself; a
/// descriptor only says where the app lives and what it may load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebAppDescriptor {
    /// Canonical host/domain key, e.g. "chat.example.com"
    pub entry: String,
    /// Display name
    pub name: String,
    /// Short description for the catalog tile
    #[serde(default)]
    pub description: String,
    /// Icon reference
    #[serde(default)]
    pub icon: String,
    /// Banner image reference
    #[serde(default)]
    pub image: String,
    /// Category label used for grouping
    #[serde(default)]
    pub category: String,
    /// Ordered navigation allow-patterns; empty means unrestricted
    #[serde(default)]
    pub urls_permitted: Vec<String>,
    /// Placement tags naming the surfaces this app shows up on
    #[serde(default)]
    pub location: Vec<String>,
    /// Entry kind
    #[serde(rename = "type", default)]
    pub kind: AppKind,
    /// Owning sublist entry, if this descriptor is nested under one
    #[serde(default)]
    pub parent: Option<String>,
    /// Role claim required to see this app; at most one, no combinations
    #[serde(default)]
    pub required_role: Option<String>,
}

/// One entry of the global allow-list: a substring that is permitted in any
/// app, regardless of the app's own pattern list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAllowEntry {
    /// Substring tested against the full normalized URL
    pub entry: String,
    /// Human-readable label
    #[serde(default)]
    pub name: String,
}

/// A named group of descriptors, sorted by app name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub apps: Vec<WebAppDescriptor>,
}

/// Group descriptors by category label.
///
/// Categories come back sorted by name, apps sorted by name within each.
/// Uncategorized descriptors group under the empty label.
pub fn categorize(descriptors: &[WebAppDescriptor]) -> Vec<Category> {
    let mut grouped: BTreeMap<String, Vec<WebAppDescriptor>> = BTreeMap::new();
    for app in descriptors {
        grouped
            .entry(app.category.clone())
            .or_default()
            .push(app.clone());
    }

    grouped
        .into_iter()
        .map(|(name, mut apps)| {
            apps.sort_by(|a, b| a.name.cmp(&b.name));
            Category { name, apps }
        })
        .collect()
}

/// Collapse duplicate `entry` keys, first occurrence wins.
///
/// The endpoint owns uniqueness; this guards the snapshot against a bad
/// payload so later lookups by entry stay unambiguous.
pub fn dedup_by_entry(descriptors: Vec<WebAppDescriptor>) -> Vec<WebAppDescriptor> {
    let mut seen: HashSet<String> = HashSet::with_capacity(descriptors.len());
    let mut unique = Vec::with_capacity(descriptors.len());

    for app in descriptors {
        if seen.insert(app.entry.clone()) {
            unique.push(app);
        } else {
            warn!("Duplicate catalog entry '{}' dropped", app.entry);
        }
    }

    unique
}
