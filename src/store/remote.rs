//! Remote durable store client (HTTPS key/value data API).
//!
//! Best-effort by contract: every caller treats failure here as a logged
//! warning, never as an abort. Entries are keyed by content fingerprint and
//! carry the full [`CacheEntry`] as their payload.

use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::cache::CacheEntry;
use crate::config::RemoteStoreConfig;
use crate::models::Category;

/// Table path under the data API root.
const TABLE: &str = "rest/v1/tab_categorizations";

/// Transport timeout. The store is an optional tier; a slow round trip must
/// not stall classification for long.
const TIMEOUT_SECS: u64 = 10;

/// HTTPS key/value client for the durable categorization store.
///
/// Cloneable so cache writes can hand a copy to a background thread.
#[derive(Clone)]
pub struct RemoteKvStore {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

/// One stored row, as returned by the data API.
#[derive(Debug, Deserialize)]
struct CategorizationRow {
    result: CacheEntry,
}

/// Insert body. The denormalized `domain`/`category` columns exist for
/// server-side analytics only; `result` is the payload read back.
#[derive(Debug, Serialize)]
struct PutCategorization<'a> {
    cache_key: &'a str,
    result: &'a CacheEntry,
    domain: &'a str,
    category: Category,
    created_at: String,
}

impl RemoteKvStore {
    pub fn new(config: &RemoteStoreConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// Fetch the entry stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let url = format!("{}/{}?cache_key=eq.{}&select=result", self.base_url, TABLE, key);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Vec<CategorizationRow> = response
            .json()
            .map_err(|e| StoreError::Http(e.to_string()))?;
        Ok(rows.into_iter().next().map(|r| r.result))
    }

    /// Store an entry under `key`. Overwrite semantics are the server's
    /// concern; duplicate keys converge to the same category anyway.
    pub fn put(&self, key: &str, domain: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.base_url, TABLE);
        let body = PutCategorization {
            cache_key: key,
            result: entry,
            domain,
            category: entry.category,
            created_at: entry.timestamp.to_rfc3339(),
        };
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Reachability probe for diagnostics.
    pub fn test_connection(&self) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/", self.base_url);
        let response = self
            .client
            .head(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Confidence;
    use chrono::Utc;

    fn config(url: &str) -> RemoteStoreConfig {
        RemoteStoreConfig {
            base_url: url.to_string(),
            api_key: "test-key".to_string(),
        }
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let store = RemoteKvStore::new(&config("https://example.supabase.co/"));
        assert_eq!(store.base_url, "https://example.supabase.co");
    }

    #[test]
    fn row_payload_deserializes() {
        let json = r#"[{"result":{"category":"development","timestamp":"2024-05-01T00:00:00Z","confidence":"high"}}]"#;
        let rows: Vec<CategorizationRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].result.category, Category::Development);
    }

    #[test]
    fn put_body_shape() {
        let entry = CacheEntry {
            category: Category::Entertainment,
            timestamp: Utc::now(),
            confidence: Confidence::High,
        };
        let body = PutCategorization {
            cache_key: "youtube.com_abc123",
            result: &entry,
            domain: "youtube.com",
            category: entry.category,
            created_at: entry.timestamp.to_rfc3339(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["cache_key"], "youtube.com_abc123");
        assert_eq!(json["category"], "entertainment");
        assert_eq!(json["result"]["confidence"], "high");
    }
}
