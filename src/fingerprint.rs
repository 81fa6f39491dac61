//! Cache key derivation.
//!
//! Two keys per classification request:
//! - the exact fingerprint identifies a (url, title, content-prefix) tuple for
//!   O(1) repeat lookups;
//! - the domain-pattern key buckets structurally similar pages on one domain
//!   (all YouTube watch pages, all GitHub repos, ...) so one classification
//!   generalizes across them.
//!
//! Both are pure, total functions. They are not cryptographic: a collision
//! costs a wrong cache hit, never a correctness violation elsewhere.

use std::fmt::Write;

use sha2::{Digest, Sha256};
use url::Url;

/// How much page content participates in the exact fingerprint. A longer
/// prefix adds no stability (page chrome churns) and hurts hit rate.
const CONTENT_PREFIX_CHARS: usize = 500;

/// Truncated digest length, hex chars. 64 bits of digest is plenty for a
/// cache keyed by a few thousand entries.
const DIGEST_HEX_CHARS: usize = 16;

/// Exact fingerprint for a (url, title, content) tuple: `{domain}_{digest}`.
pub fn exact_key(url: &str, title: &str, content: &str) -> String {
    let prefix = match content.char_indices().nth(CONTENT_PREFIX_CHARS) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    };
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(prefix.as_bytes());
    let digest = hasher.finalize();
    let hex = digest
        .iter()
        .take(DIGEST_HEX_CHARS / 2)
        .fold(String::with_capacity(DIGEST_HEX_CHARS), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        });
    format!("{}_{}", extract_domain(url), hex)
}

/// Domain-pattern key: `{domain}_{path shape}`.
pub fn domain_key(url: &str) -> String {
    format!("{}_{}", extract_domain(url), path_shape(url))
}

/// Hostname with a leading `www.` stripped; `"unknown"` when unparseable.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Coarse path-shape bucket. Closed set plus a first-segment catch-all, so
/// structurally similar pages on one domain share a cache slot.
fn path_shape(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return "general".to_string(),
    };
    let path = parsed.path();

    if path.is_empty() || path == "/" {
        return "home".to_string();
    }
    if path.contains("/watch") {
        return "video".to_string();
    }
    if path.contains("/post") || path.contains("/status") {
        return "social".to_string();
    }
    if path.contains("/docs") || path.contains("/documentation") {
        return "docs".to_string();
    }
    if path.contains("/blog") {
        return "blog".to_string();
    }
    if path.contains("/shop") || path.contains("/product") {
        return "shopping".to_string();
    }

    path.split('/')
        .find(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "general".to_string())
}
