//! Categorization resolution.
//!
//! The resolver is the single decision point that turns a tab into a
//! category. It owns the tiered cache and the remote classifier and always
//! produces an answer: cache, then remote, then the deterministic heuristic.
//!
//! Lock granularity matters here: the cache mutex is held only for the
//! in-memory tier walks and write-backs, never across a network round trip.
//! The remote-store probe and the classifier call run lock-free (the
//! classifier sits behind a read lock, so any number of resolutions can be
//! in flight at once), which is what lets unrelated commands proceed while a
//! slow classification drags on.

use std::sync::{Mutex, RwLock};

use chrono::Utc;
use serde::Serialize;

use crate::cache::{is_fresh, CacheExport, CacheStats, CacheTier, Confidence, TieredCache};
use crate::classifier::{heuristic, LlmBackend, RemoteClassifier};
use crate::fingerprint;
use crate::models::{Category, CategorySet, TabDescriptor};
use crate::store::RemoteKvStore;

/// Where a resolved category came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// Served from the tiered cache, at the named tier.
    Cache(CacheTier),
    /// Freshly classified by the remote service.
    Remote,
    /// Remote path unavailable; deterministic fallback.
    Heuristic,
}

/// Outcome of resolving one tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub category: Category,
    pub source: ResolutionSource,
}

// ═══════════════════════════════════════════════════════════
// CategorizationResolver
// ═══════════════════════════════════════════════════════════

/// Cache → remote → heuristic, in that order, infallibly.
pub struct CategorizationResolver {
    cache: Mutex<TieredCache>,
    classifier: RwLock<RemoteClassifier>,
}

impl CategorizationResolver {
    pub fn new(cache: TieredCache, classifier: RemoteClassifier) -> Self {
        Self {
            cache: Mutex::new(cache),
            classifier: RwLock::new(classifier),
        }
    }

    // Lock helpers recover from poisoning: a panicked resolution must not
    // take categorization down with it.
    fn cache(&self) -> std::sync::MutexGuard<'_, TieredCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn classifier(&self) -> std::sync::RwLockReadGuard<'_, RemoteClassifier> {
        match self.classifier.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn classifier_mut(&self) -> std::sync::RwLockWriteGuard<'_, RemoteClassifier> {
        match self.classifier.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resolve one tab to a category. Never fails.
    ///
    /// A cache hit at any tier short-circuits before the rate limiter is
    /// touched. A successful remote answer is written back to the cache with
    /// high confidence. Every remote failure mode (no credential, rate
    /// limited, transport, API error, uncoercible answer) downgrades to the
    /// heuristic, whose result is deliberately not cached so the remote path
    /// gets retried once it recovers.
    pub fn resolve(&self, descriptor: &TabDescriptor) -> Resolution {
        let remote = {
            let mut cache = self.cache();
            if let Some((entry, tier)) = cache.lookup_local(descriptor) {
                return Resolution {
                    category: entry.category,
                    source: ResolutionSource::Cache(tier),
                };
            }
            cache.remote_store()
        };

        // Remote tier, probed without holding the cache lock.
        if let Some(remote) = remote {
            if let Some(entry) = self.probe_remote_tier(&remote, descriptor) {
                let category = entry.category;
                self.cache().admit_remote(descriptor, entry);
                return Resolution {
                    category,
                    source: ResolutionSource::Cache(CacheTier::Remote),
                };
            }
        }
        self.cache().record_miss();

        let classified = self.classifier().classify(descriptor);
        match classified {
            Ok(category) => {
                self.cache().store(descriptor, category, Confidence::High);
                Resolution {
                    category,
                    source: ResolutionSource::Remote,
                }
            }
            Err(err) => {
                let category = heuristic::classify(descriptor);
                tracing::debug!(
                    url = %descriptor.url,
                    %category,
                    error = %err,
                    "remote classification unavailable, using heuristic"
                );
                Resolution {
                    category,
                    source: ResolutionSource::Heuristic,
                }
            }
        }
    }

    fn probe_remote_tier(
        &self,
        remote: &RemoteKvStore,
        descriptor: &TabDescriptor,
    ) -> Option<crate::cache::CacheEntry> {
        let key = fingerprint::exact_key(&descriptor.url, &descriptor.title, descriptor.content());
        match remote.get(&key) {
            Ok(Some(entry)) if is_fresh(&entry, Utc::now()) => Some(entry),
            Ok(Some(_)) => {
                tracing::debug!(key = %key, "remote entry past max age, ignoring");
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "remote store lookup failed, continuing without it");
                None
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    pub fn export_cache(&self) -> CacheExport {
        self.cache().export()
    }

    pub fn remote_store(&self) -> Option<RemoteKvStore> {
        self.cache().remote_store()
    }

    /// Swap the classifier backend, e.g. after a credential change.
    pub fn set_backend(&self, backend: Box<dyn LlmBackend>) {
        self.classifier_mut().set_backend(backend);
    }

    /// Replace the category set used for prompting and coercion.
    pub fn set_categories(&self, categories: CategorySet) {
        self.classifier_mut().set_categories(categories);
    }
}
