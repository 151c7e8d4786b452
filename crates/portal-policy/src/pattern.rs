//! Allow-pattern compilation.
//!
//! A descriptor's pattern list holds three shapes of entry: the
//! match-everything `"*"`, wildcard patterns, and plain substrings. Wildcards
//! compile to a case-insensitive regex where a literal `.` is escaped and
//! `*` becomes `.*`; the match is unanchored, tested against the full
//! normalized URL. Compilation happens once when a gate is built, never on
//! the per-navigation path.

use tracing::warn;

/// One compiled entry of a pattern list.
#[derive(Debug)]
pub enum CompiledPattern {
    /// `"*"` - matches any URL
    MatchAll,
    /// Wildcard pattern compiled to a case-insensitive regex
    Wildcard { raw: String, regex: regex::Regex },
    /// Case-insensitive substring test
    Substring { raw: String, lowered: String },
    /// Failed to compile; matches nothing
    Inert { raw: String },
}

impl CompiledPattern {
    /// Compile one raw pattern string.
    ///
    /// A wildcard whose translation is not a valid regex becomes
    /// [`Inert`](Self::Inert): the pattern grants nothing rather than
    /// everything.
    pub fn compile(raw: &str) -> Self {
        if raw == "*" {
            return Self::MatchAll;
        }

        if raw.contains('*') {
            // Escape literal dots before widening the asterisks, so the
            // `.*` we introduce stays untouched.
            let translated = raw.replace('.', "\\.").replace('*', ".*");
            return match regex::RegexBuilder::new(&translated)
                .case_insensitive(true)
                .build()
            {
                Ok(regex) => Self::Wildcard {
                    raw: raw.to_string(),
                    regex,
                },
                Err(e) => {
                    warn!("Pattern '{}' failed to compile, treating as non-match: {}", raw, e);
                    Self::Inert {
                        raw: raw.to_string(),
                    }
                }
            };
        }

        Self::Substring {
            raw: raw.to_string(),
            lowered: raw.to_lowercase(),
        }
    }

    /// Compile a whole pattern list, preserving order.
    pub fn compile_list(patterns: &[String]) -> Vec<Self> {
        patterns.iter().map(|raw| Self::compile(raw)).collect()
    }

    /// Test against a normalized (lowercase, absolute) URL string.
    pub fn matches(&self, normalized_url: &str) -> bool {
        match self {
            Self::MatchAll => true,
            Self::Wildcard { regex, .. } => regex.is_match(normalized_url),
            Self::Substring { lowered, .. } => normalized_url.contains(lowered.as_str()),
            Self::Inert { .. } => false,
        }
    }

    /// The pattern as it appeared in the catalog.
    pub fn raw(&self) -> &str {
        match self {
            Self::MatchAll => "*",
            Self::Wildcard { raw, .. } | Self::Substring { raw, .. } | Self::Inert { raw } => raw,
        }
    }
}
