//! Three-tier categorization cache.
//!
//! Lookup walks an ordered chain: exact in-memory tier, domain-pattern
//! in-memory tier, then the optional remote durable store. A hit at a deeper
//! tier back-fills the shallower ones so repeat lookups are O(1). The two
//! local tiers are served under the cache lock; the remote round trip runs
//! outside it (the resolver probes via [`TieredCache::remote_store`] and
//! feeds hits back through [`TieredCache::admit_remote`]). Both local tiers
//! are bounded FIFO maps (documented FIFO, not LRU: recency is deliberately
//! ignored) and are snapshotted wholesale to the local store after every
//! mutating batch.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::REMOTE_ENTRY_MAX_AGE_DAYS;
use crate::fingerprint;
use crate::models::{Category, TabDescriptor};
use crate::store::{RemoteKvStore, SnapshotStore, DOMAIN_CACHE_BLOB, EXACT_CACHE_BLOB};

// ═══════════════════════════════════════════════════════════
// Entries
// ═══════════════════════════════════════════════════════════

/// How trustworthy the categorization behind an entry was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

/// One cached categorization. Each tier owns its own copy; entries are never
/// shared by reference across tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub confidence: Confidence,
}

impl CacheEntry {
    pub fn new(category: Category, confidence: Confidence) -> Self {
        Self {
            category,
            timestamp: Utc::now(),
            confidence,
        }
    }
}

/// Which tier produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    Exact,
    Domain,
    Remote,
}

/// Remote entries have no server-side expiry; entries past the max age are
/// treated as misses so a changed page can eventually be re-classified.
pub(crate) fn is_fresh(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    now - entry.timestamp <= Duration::days(REMOTE_ENTRY_MAX_AGE_DAYS)
}

// ═══════════════════════════════════════════════════════════
// FifoMap — bounded insertion-order map
// ═══════════════════════════════════════════════════════════

/// Bounded map evicting in insertion order. Overwriting an existing key
/// updates the value in place and keeps the key's original queue position, so
/// repeated stores of one fingerprint neither duplicate nor rejuvenate it.
struct FifoMap {
    map: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    cap: usize,
}

impl FifoMap {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.map.get(key)
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        if self.map.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
        while self.map.len() > self.cap {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    /// Entries as a key-ordered pair array (the snapshot layout).
    fn to_pairs(&self) -> Vec<(String, CacheEntry)> {
        let mut pairs: Vec<_> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    fn restore(&mut self, pairs: Vec<(String, CacheEntry)>) {
        self.clear();
        for (key, entry) in pairs {
            self.insert(key, entry);
        }
    }
}

// ═══════════════════════════════════════════════════════════
// TieredCache
// ═══════════════════════════════════════════════════════════

/// Cache statistics for the command surface.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub exact_size: usize,
    pub exact_cap: usize,
    pub domain_size: usize,
    pub domain_cap: usize,
    pub remote_configured: bool,
    pub hits_exact: u64,
    pub hits_domain: u64,
    pub hits_remote: u64,
    pub misses: u64,
}

/// Exported cache contents for backup/diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheExport {
    pub exact: Vec<(String, CacheEntry)>,
    pub domain: Vec<(String, CacheEntry)>,
    pub exported_at: DateTime<Utc>,
}

pub struct TieredCache {
    exact: FifoMap,
    domain: FifoMap,
    remote: Option<RemoteKvStore>,
    snapshot: Arc<SnapshotStore>,
    hits_exact: u64,
    hits_domain: u64,
    hits_remote: u64,
    misses: u64,
}

impl TieredCache {
    /// Build a cache and restore both local tiers from the snapshot store.
    pub fn new(
        exact_cap: usize,
        domain_cap: usize,
        remote: Option<RemoteKvStore>,
        snapshot: Arc<SnapshotStore>,
    ) -> Self {
        let mut cache = Self {
            exact: FifoMap::new(exact_cap),
            domain: FifoMap::new(domain_cap),
            remote,
            snapshot,
            hits_exact: 0,
            hits_domain: 0,
            hits_remote: 0,
            misses: 0,
        };
        cache.restore();
        cache
    }

    fn restore(&mut self) {
        match self.snapshot.load_json::<Vec<(String, CacheEntry)>>(EXACT_CACHE_BLOB) {
            Ok(Some(pairs)) => self.exact.restore(pairs),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to restore exact cache tier"),
        }
        match self.snapshot.load_json::<Vec<(String, CacheEntry)>>(DOMAIN_CACHE_BLOB) {
            Ok(Some(pairs)) => self.domain.restore(pairs),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to restore domain cache tier"),
        }
        tracing::debug!(
            exact = self.exact.len(),
            domain = self.domain.len(),
            "cache tiers restored"
        );
    }

    /// Walk the two local tiers for `descriptor`. A domain-pattern hit
    /// back-fills the exact tier. The remote tier is probed by the resolver
    /// outside the cache lock (its round trip must not stall other commands);
    /// see [`TieredCache::admit_remote`].
    pub fn lookup_local(&mut self, descriptor: &TabDescriptor) -> Option<(CacheEntry, CacheTier)> {
        let exact_key =
            fingerprint::exact_key(&descriptor.url, &descriptor.title, descriptor.content());

        if let Some(entry) = self.exact.get(&exact_key) {
            self.hits_exact += 1;
            return Some((entry.clone(), CacheTier::Exact));
        }

        let domain_key = fingerprint::domain_key(&descriptor.url);
        if let Some(entry) = self.domain.get(&domain_key) {
            let entry = entry.clone();
            self.hits_domain += 1;
            tracing::debug!(key = %domain_key, "domain-pattern cache hit");
            self.exact.insert(exact_key, entry.clone());
            self.persist_exact();
            return Some((entry, CacheTier::Domain));
        }

        None
    }

    /// Back-fill both local tiers with an entry fetched from the remote
    /// store and count the remote-tier hit.
    pub fn admit_remote(&mut self, descriptor: &TabDescriptor, entry: CacheEntry) {
        let exact_key =
            fingerprint::exact_key(&descriptor.url, &descriptor.title, descriptor.content());
        let domain_key = fingerprint::domain_key(&descriptor.url);
        self.hits_remote += 1;
        tracing::debug!(key = %exact_key, "remote store hit admitted");
        self.exact.insert(exact_key, entry.clone());
        self.domain.insert(domain_key, entry);
        self.persist_local();
    }

    /// Count a full-chain miss.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Write a categorization to both local tiers and, best-effort on a
    /// background thread, to the remote store.
    pub fn store(&mut self, descriptor: &TabDescriptor, category: Category, confidence: Confidence) {
        let exact_key =
            fingerprint::exact_key(&descriptor.url, &descriptor.title, descriptor.content());
        let domain_key = fingerprint::domain_key(&descriptor.url);
        let entry = CacheEntry::new(category, confidence);

        self.exact.insert(exact_key.clone(), entry.clone());
        self.domain.insert(domain_key, entry.clone());
        self.persist_local();

        if let Some(remote) = &self.remote {
            let remote = remote.clone();
            let domain = fingerprint::extract_domain(&descriptor.url);
            std::thread::spawn(move || {
                if let Err(e) = remote.put(&exact_key, &domain, &entry) {
                    tracing::warn!(key = %exact_key, error = %e, "remote store write failed");
                }
            });
        }
    }

    /// Clear both local tiers and their snapshots. The remote store is left
    /// untouched.
    pub fn clear(&mut self) {
        self.exact.clear();
        self.domain.clear();
        self.persist_local();
        tracing::info!("local cache tiers cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            exact_size: self.exact.len(),
            exact_cap: self.exact.cap,
            domain_size: self.domain.len(),
            domain_cap: self.domain.cap,
            remote_configured: self.remote.is_some(),
            hits_exact: self.hits_exact,
            hits_domain: self.hits_domain,
            hits_remote: self.hits_remote,
            misses: self.misses,
        }
    }

    pub fn export(&self) -> CacheExport {
        CacheExport {
            exact: self.exact.to_pairs(),
            domain: self.domain.to_pairs(),
            exported_at: Utc::now(),
        }
    }

    /// Clone of the remote store handle, for probing outside the cache lock.
    pub fn remote_store(&self) -> Option<RemoteKvStore> {
        self.remote.clone()
    }

    fn persist_exact(&self) {
        if let Err(e) = self.snapshot.save_json(EXACT_CACHE_BLOB, &self.exact.to_pairs()) {
            tracing::warn!(error = %e, "failed to persist exact cache tier");
        }
    }

    fn persist_local(&self) {
        self.persist_exact();
        if let Err(e) = self.snapshot.save_json(DOMAIN_CACHE_BLOB, &self.domain.to_pairs()) {
            tracing::warn!(error = %e, "failed to persist domain cache tier");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TabId;

    fn cache_with_caps(exact_cap: usize, domain_cap: usize) -> TieredCache {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        TieredCache::new(exact_cap, domain_cap, None, snapshot)
    }

    fn tab(id: i64, url: &str, title: &str) -> TabDescriptor {
        TabDescriptor::new(TabId(id), url, title)
    }

    #[test]
    fn miss_on_empty_cache() {
        let mut cache = cache_with_caps(10, 10);
        assert!(cache.lookup_local(&tab(1, "https://github.com/x", "X")).is_none());
    }

    #[test]
    fn admitted_remote_entry_backfills_both_tiers() {
        let mut cache = cache_with_caps(10, 10);
        let t = tab(1, "https://youtube.com/watch?v=1", "Video");
        cache.admit_remote(&t, CacheEntry::new(Category::Entertainment, Confidence::High));

        let (entry, tier) = cache.lookup_local(&t).unwrap();
        assert_eq!(entry.category, Category::Entertainment);
        assert_eq!(tier, CacheTier::Exact);

        // Same path shape lands on the back-filled domain tier.
        let other = tab(2, "https://youtube.com/watch?v=2", "Other");
        let (_, tier) = cache.lookup_local(&other).unwrap();
        assert_eq!(tier, CacheTier::Domain);
        assert_eq!(cache.stats().hits_remote, 1);
    }

    #[test]
    fn exact_hit_after_store() {
        let mut cache = cache_with_caps(10, 10);
        let t = tab(1, "https://github.com/x", "X");
        cache.store(&t, Category::Development, Confidence::High);

        let (entry, tier) = cache.lookup_local(&t).unwrap();
        assert_eq!(entry.category, Category::Development);
        assert_eq!(tier, CacheTier::Exact);
    }

    #[test]
    fn domain_hit_backfills_exact_tier() {
        let mut cache = cache_with_caps(10, 10);
        cache.store(
            &tab(1, "https://youtube.com/watch?v=first", "First"),
            Category::Entertainment,
            Confidence::High,
        );

        // Different video, same path shape → domain tier.
        let other = tab(2, "https://youtube.com/watch?v=second", "Second");
        let (_, tier) = cache.lookup_local(&other).unwrap();
        assert_eq!(tier, CacheTier::Domain);

        // Back-filled: the identical request now hits the exact tier.
        let (_, tier) = cache.lookup_local(&other).unwrap();
        assert_eq!(tier, CacheTier::Exact);
    }

    #[test]
    fn store_is_idempotent_per_key() {
        let mut cache = cache_with_caps(10, 10);
        let t = tab(1, "https://github.com/x", "X");
        cache.store(&t, Category::Development, Confidence::High);
        cache.store(&t, Category::Development, Confidence::High);
        assert_eq!(cache.stats().exact_size, 1);
    }

    #[test]
    fn fifo_evicts_oldest_at_capacity() {
        let mut cache = cache_with_caps(3, 100);
        for i in 0..4 {
            cache.store(
                &tab(i, &format!("https://site{i}.com/page"), "t"),
                Category::General,
                Confidence::High,
            );
        }
        assert_eq!(cache.stats().exact_size, 3);
        // Newest three still answer from the exact tier.
        for i in 1..4 {
            let (_, tier) = cache
                .lookup_local(&tab(i, &format!("https://site{i}.com/page"), "t"))
                .unwrap();
            assert_eq!(tier, CacheTier::Exact, "site{i}");
        }
        // The oldest lost its exact entry; only its domain pattern remains.
        let (_, tier) = cache.lookup_local(&tab(0, "https://site0.com/page", "t")).unwrap();
        assert_eq!(tier, CacheTier::Domain);
    }

    #[test]
    fn overwrite_keeps_insertion_position() {
        let mut cache = cache_with_caps(2, 100);
        let a = tab(1, "https://a.com/page", "a");
        let b = tab(2, "https://b.com/page", "b");
        cache.store(&a, Category::General, Confidence::High);
        cache.store(&b, Category::General, Confidence::High);
        // Overwrite a — must not rejuvenate it.
        cache.store(&a, Category::Shopping, Confidence::High);
        assert_eq!(cache.stats().exact_size, 2);
        // Inserting a third entry evicts a (still oldest), not b.
        cache.store(
            &tab(3, "https://c.com/page", "c"),
            Category::General,
            Confidence::High,
        );
        let (entry, tier) = cache.lookup_local(&b).unwrap();
        assert_eq!(tier, CacheTier::Exact);
        assert_eq!(entry.category, Category::General);
    }

    #[test]
    fn tiers_restored_from_snapshot() {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        {
            let mut cache = TieredCache::new(10, 10, None, snapshot.clone());
            cache.store(
                &tab(1, "https://github.com/x", "X"),
                Category::Development,
                Confidence::High,
            );
        }
        // Same backing store, fresh cache.
        let mut cache = TieredCache::new(10, 10, None, snapshot);
        let (entry, tier) = cache.lookup_local(&tab(1, "https://github.com/x", "X")).unwrap();
        assert_eq!(entry.category, Category::Development);
        assert_eq!(tier, CacheTier::Exact);
    }

    #[test]
    fn clear_empties_tiers_and_snapshot() {
        let snapshot = Arc::new(SnapshotStore::open_in_memory().unwrap());
        let mut cache = TieredCache::new(10, 10, None, snapshot.clone());
        let t = tab(1, "https://github.com/x", "X");
        cache.store(&t, Category::Development, Confidence::High);
        cache.clear();
        assert_eq!(cache.stats().exact_size, 0);
        assert_eq!(cache.stats().domain_size, 0);

        // Snapshot reflects the clear.
        let cache = TieredCache::new(10, 10, None, snapshot);
        assert_eq!(cache.stats().exact_size, 0);
    }

    #[test]
    fn freshness_window() {
        let now = Utc::now();
        let fresh = CacheEntry {
            category: Category::General,
            timestamp: now - Duration::days(REMOTE_ENTRY_MAX_AGE_DAYS - 1),
            confidence: Confidence::High,
        };
        let stale = CacheEntry {
            category: Category::General,
            timestamp: now - Duration::days(REMOTE_ENTRY_MAX_AGE_DAYS + 1),
            confidence: Confidence::High,
        };
        assert!(is_fresh(&fresh, now));
        assert!(!is_fresh(&stale, now));
    }

    #[test]
    fn stats_track_tier_hits() {
        let mut cache = cache_with_caps(10, 10);
        let t = tab(1, "https://github.com/x", "X");
        if cache.lookup_local(&t).is_none() {
            cache.record_miss();
        }
        cache.store(&t, Category::Development, Confidence::High);
        cache.lookup_local(&t);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits_exact, 1);
        assert!(!stats.remote_configured);
    }
}
