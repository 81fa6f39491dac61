//! Tab descriptors and lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum extracted-content length carried on a descriptor. The content
/// extraction collaborator promises ≤ 2000 chars; anything longer is truncated
/// on the way in.
pub const MAX_EXTRACTED_CONTENT_CHARS: usize = 2000;

/// Opaque per-tab handle, unique while the tab is alive. Native surfaces hand
/// out integer ids; we never interpret the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the engine knows about one live tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabDescriptor {
    pub id: TabId,
    pub url: String,
    pub title: String,
    /// Truncated page text from the content-extraction collaborator, when it
    /// was reachable. Empty/absent content is always acceptable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    pub last_accessed: DateTime<Utc>,
}

impl TabDescriptor {
    /// Descriptor with no extracted content, stamped now.
    pub fn new(id: TabId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            extracted_content: None,
            favicon: None,
            last_accessed: Utc::now(),
        }
    }

    /// Attach extracted page content, truncating to the collaborator contract.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content: String = content.into();
        let truncated = match content.char_indices().nth(MAX_EXTRACTED_CONTENT_CHARS) {
            Some((byte_idx, _)) => content[..byte_idx].to_string(),
            None => content,
        };
        self.extracted_content = Some(truncated);
        self
    }

    /// Extracted content, or empty when the collaborator was unavailable.
    pub fn content(&self) -> &str {
        self.extracted_content.as_deref().unwrap_or("")
    }

    /// Whether this tab participates in categorization. Internal/system pages
    /// never do.
    pub fn is_eligible(&self) -> bool {
        const INTERNAL_PREFIXES: &[&str] = &[
            "chrome://",
            "chrome-extension://",
            "about:",
            "edge://",
            "devtools://",
        ];
        !self.url.is_empty() && !INTERNAL_PREFIXES.iter().any(|p| self.url.starts_with(p))
    }
}

/// Result of the content-extraction collaborator for one tab.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub content: String,
    #[serde(default)]
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Tab lifecycle event, as delivered by the embedding host.
#[derive(Debug, Clone)]
pub enum TabEvent {
    Created(TabDescriptor),
    /// Updates fire repeatedly during a page load; only the final
    /// `fully_loaded` update triggers re-resolution.
    Updated {
        descriptor: TabDescriptor,
        fully_loaded: bool,
    },
    Removed(TabId),
    Activated(TabId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_pages_are_ineligible() {
        for url in ["chrome://settings", "about:blank", "edge://flags", "chrome-extension://abc/popup.html"] {
            let tab = TabDescriptor::new(TabId(1), url, "internal");
            assert!(!tab.is_eligible(), "{url} should be ineligible");
        }
    }

    #[test]
    fn regular_pages_are_eligible() {
        let tab = TabDescriptor::new(TabId(1), "https://github.com/rust-lang/rust", "rust");
        assert!(tab.is_eligible());
    }

    #[test]
    fn empty_url_is_ineligible() {
        let tab = TabDescriptor::new(TabId(1), "", "");
        assert!(!tab.is_eligible());
    }

    #[test]
    fn content_truncated_to_contract() {
        let long = "x".repeat(MAX_EXTRACTED_CONTENT_CHARS + 500);
        let tab = TabDescriptor::new(TabId(1), "https://example.com", "e").with_content(long);
        assert_eq!(tab.content().chars().count(), MAX_EXTRACTED_CONTENT_CHARS);
    }

    #[test]
    fn content_truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_EXTRACTED_CONTENT_CHARS + 1);
        let tab = TabDescriptor::new(TabId(1), "https://example.com", "e").with_content(long);
        assert_eq!(tab.content().chars().count(), MAX_EXTRACTED_CONTENT_CHARS);
    }

    #[test]
    fn missing_content_reads_as_empty() {
        let tab = TabDescriptor::new(TabId(1), "https://example.com", "e");
        assert_eq!(tab.content(), "");
    }

    #[test]
    fn descriptor_serde_round_trip() {
        let tab = TabDescriptor::new(TabId(7), "https://example.com", "Example")
            .with_content("hello");
        let json = serde_json::to_string(&tab).unwrap();
        let back: TabDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, TabId(7));
        assert_eq!(back.content(), "hello");
    }
}
