//! WebPortal Navigation Policy
//!
//! The single gatekeeper for outbound navigation. Portal apps are hosted by
//! third parties, so every URL a rendered app tries to load is checked here
//! before the render surface commits it.
//!
//! Flow:
//! 1. Gate is built from a descriptor, compiling its pattern list once
//! 2. Each navigation attempt is evaluated synchronously (no I/O)
//! 3. Denials cancel the load and substitute a fixed interstitial page

mod engine;
mod interstitial;
mod pattern;

pub use engine::{AllowRule, NavigationDecision, NavigationGate, NavigationState};
pub use interstitial::{Interstitial, BLOCKED_PAGE_HTML};
pub use pattern::CompiledPattern;
