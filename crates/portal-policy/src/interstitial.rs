//! Blocked-navigation interstitial.
//!
//! When a navigation is denied, the render surface swaps this fixed document
//! in as content substitution, not as a navigation: the surface's history
//! must not grow an entry for it, and the next user-driven navigation starts
//! from the page that was showing before the block.

/// The fixed access-blocked document.
pub const BLOCKED_PAGE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Access Blocked</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: 'Segoe UI', system-ui, sans-serif;
            background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);
            color: #eee;
            min-height: 100vh;
            display: flex;
            flex-direction: column;
            align-items: center;
            justify-content: center;
            padding: 40px;
            text-align: center;
        }
        .shield { font-size: 4em; margin-bottom: 20px; }
        h1 { font-size: 1.8em; margin-bottom: 10px; }
        p { color: #888; max-width: 460px; line-height: 1.5; }
    </style>
</head>
<body>
    <div class="shield">&#128683;</div>
    <h1>Access Blocked</h1>
    <p>This destination is outside the areas this portal app is permitted
    to open. Go back to continue where you left off.</p>
</body>
</html>"#;

/// Request to substitute the blocked page into a render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interstitial {
    /// Complete HTML document to show in place of the denied navigation
    pub html: &'static str,
}

impl Interstitial {
    /// The fixed access-blocked page.
    pub fn blocked_page() -> Self {
        Self {
            html: BLOCKED_PAGE_HTML,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_page_is_a_complete_document() {
        let interstitial = Interstitial::blocked_page();
        assert!(interstitial.html.starts_with("<!DOCTYPE html>"));
        assert!(interstitial.html.contains("Access Blocked"));
    }
}
