//! Per-resource navigation gate.
//!
//! Every outbound URL a rendered portal app tries to load passes through a
//! gate before anything is committed. The decision is synchronous, does no
//! I/O, and fails closed: whatever cannot be positively allowed is blocked.
//!
//! Flow:
//! 1. Suppress flag or local-content scheme → allow without matching
//! 2. Global allow-list substring check (beats the app's own list)
//! 3. Empty pattern list → unrestricted
//! 4. Ordered pattern scan, first match wins; no match → block + interstitial

use crate::interstitial::Interstitial;
use crate::pattern::CompiledPattern;
use portal_catalog::{GlobalAllowEntry, WebAppDescriptor};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Schemes whose content is produced locally by the rendered page itself.
/// They never reach the network, so they bypass pattern matching.
const LOCAL_CONTENT_SCHEMES: &[&str] = &["about", "data", "blob", "javascript"];

/// Navigation lifecycle state of one rendered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// A navigation has been committed and is loading
    Loading,
    /// A decision is in progress
    Evaluating,
    /// The last decision allowed the load
    Allowed,
    /// The last decision blocked the load
    Blocked,
}

impl NavigationState {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Which rule allowed a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowRule {
    /// Suppress flag was set (interstitial content going in)
    Suppressed,
    /// Local-content scheme
    LocalContent,
    /// Matched the global allow-list
    GlobalAllowList(String),
    /// The app has no patterns, so it is unrestricted
    Unrestricted,
    /// First matching entry of the app's own pattern list
    Pattern(String),
}

impl std::fmt::Display for AllowRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suppressed => write!(f, "suppress flag"),
            Self::LocalContent => write!(f, "local content scheme"),
            Self::GlobalAllowList(entry) => write!(f, "global allow: {}", entry),
            Self::Unrestricted => write!(f, "unrestricted app"),
            Self::Pattern(pattern) => write!(f, "pattern: {}", pattern),
        }
    }
}

/// Outcome of one navigation evaluation.
#[derive(Debug)]
pub enum NavigationDecision {
    /// Commit the navigation
    Allow { rule: AllowRule },
    /// Cancel the navigation and substitute the interstitial
    Block { interstitial: Interstitial },
}

impl NavigationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }
}

/// Gate statistics.
#[derive(Debug, Default)]
pub struct GateStats {
    pub evaluations: AtomicU64,
    pub allowed: AtomicU64,
    pub blocked: AtomicU64,
}

/// Navigation gate for one rendered portal app.
///
/// The pattern list is compiled once at construction; evaluation itself is
/// lock-light and callable from whatever thread the render surface delivers
/// its navigation callback on.
pub struct NavigationGate {
    /// Entry of the guarded app, for log context
    app_entry: String,
    /// Compiled allow-patterns in catalog order
    patterns: Vec<CompiledPattern>,
    /// Lifecycle state
    state: RwLock<NavigationState>,
    /// One-shot flag: the next load is interstitial content, let it through.
    /// Cleared when a navigation finishes.
    suppress: AtomicBool,
    stats: GateStats,
}

impl NavigationGate {
    /// Build a gate for `app`, compiling its pattern list.
    pub fn for_app(app: &WebAppDescriptor) -> Self {
        let patterns = CompiledPattern::compile_list(&app.urls_permitted);
        debug!(
            "Gate created for {} ({} patterns)",
            app.entry,
            patterns.len()
        );

        Self {
            app_entry: app.entry.clone(),
            patterns,
            state: RwLock::new(NavigationState::Loading),
            suppress: AtomicBool::new(false),
            stats: GateStats::default(),
        }
    }

    /// Decide whether `target` may load.
    ///
    /// `global_allow` is the portal-wide list active at call time. The
    /// decision never fails: a target that cannot be parsed is blocked.
    pub fn evaluate(
        &self,
        target: &str,
        global_allow: &[GlobalAllowEntry],
    ) -> NavigationDecision {
        self.stats.evaluations.fetch_add(1, Ordering::Relaxed);
        self.set_state(NavigationState::Evaluating);

        // 1. The interstitial itself must render even though it matches no
        // pattern. One-shot, consumed by finish_navigation.
        if self.suppress.load(Ordering::SeqCst) {
            return self.allow(AllowRule::Suppressed);
        }

        let parsed = match url::Url::parse(target) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Unparseable navigation target '{}': {}", target, e);
                return self.block(target);
            }
        };

        if LOCAL_CONTENT_SCHEMES.contains(&parsed.scheme()) {
            return self.allow(AllowRule::LocalContent);
        }

        // 2. Global allow-list, substring over the full lowercased URL,
        // query string included. Always beats the app's own list.
        let normalized = parsed.as_str().to_lowercase();
        for entry in global_allow {
            if normalized.contains(&entry.entry.to_lowercase()) {
                return self.allow(AllowRule::GlobalAllowList(entry.entry.clone()));
            }
        }

        // 3. No patterns means the app is unrestricted.
        if self.patterns.is_empty() {
            return self.allow(AllowRule::Unrestricted);
        }

        // 4. Ordered scan of the app's own list, first match wins. The app's
        // own domain gets no implicit pass; it must match like anything else.
        for pattern in &self.patterns {
            if pattern.matches(&normalized) {
                return self.allow(AllowRule::Pattern(pattern.raw().to_string()));
            }
        }

        self.block(&normalized)
    }

    /// The render surface committed a navigation and started loading.
    pub fn begin_navigation(&self) {
        self.set_state(NavigationState::Loading);
    }

    /// The render surface finished loading. Consumes the suppress flag, so
    /// the interstitial pass-through never outlives the load it was for.
    pub fn finish_navigation(&self) {
        self.suppress.store(false, Ordering::SeqCst);
        self.set_state(NavigationState::Allowed);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NavigationState {
        *self.state.read().unwrap()
    }

    /// Entry of the app this gate guards.
    pub fn app_entry(&self) -> &str {
        &self.app_entry
    }

    /// Whether the next load bypasses matching.
    pub fn is_suppressed(&self) -> bool {
        self.suppress.load(Ordering::SeqCst)
    }

    /// Get gate statistics: (evaluations, allowed, blocked).
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.stats.evaluations.load(Ordering::Relaxed),
            self.stats.allowed.load(Ordering::Relaxed),
            self.stats.blocked.load(Ordering::Relaxed),
        )
    }

    fn allow(&self, rule: AllowRule) -> NavigationDecision {
        self.stats.allowed.fetch_add(1, Ordering::Relaxed);
        self.set_state(NavigationState::Allowed);
        debug!("Gate[{}] allow ({})", self.app_entry, rule);
        NavigationDecision::Allow { rule }
    }

    fn block(&self, target: &str) -> NavigationDecision {
        self.stats.blocked.fetch_add(1, Ordering::Relaxed);
        self.set_state(NavigationState::Blocked);
        // The interstitial load that follows must not be blocked in turn.
        self.suppress.store(true, Ordering::SeqCst);
        debug!("Gate[{}] block: {}", self.app_entry, target);
        NavigationDecision::Block {
            interstitial: Interstitial::blocked_page(),
        }
    }

    fn set_state(&self, state: NavigationState) {
        *self.state.write().unwrap() = state;
    }
}
