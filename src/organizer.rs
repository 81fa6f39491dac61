//! Top-level command surface.
//!
//! [`TabOrganizer`] owns the resolver and the reconciler. Group mutations run
//! under one mutex so lifecycle events never interleave mid-mutation, but the
//! resolver lives outside it: resolution can block on the network for
//! seconds, and commands like remove or activate must not queue behind it.
//! Categorization is therefore phased. The tab is registered live and
//! enriched under the lock, resolved with the lock released, and the result
//! is applied under the lock again, where [`TabGroupReconciler`]'s liveness
//! check drops resolutions for tabs removed in the meantime.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheExport, CacheStats, TieredCache};
use crate::classifier::{self, ClassifierError, GeminiClient, RemoteClassifier};
use crate::config::{OrganizerConfig, DEFAULT_UNUSED_THRESHOLD_DAYS};
use crate::extract::{enrich, ContentExtractor};
use crate::groups::{GroupState, NativeSurface, TabGroupReconciler};
use crate::models::{Category, CategoryOverride, CategorySet, TabDescriptor, TabEvent, TabId};
use crate::rate_limit::FixedWindowLimiter;
use crate::resolver::{CategorizationResolver, Resolution};
use crate::store::{RemoteKvStore, SnapshotStore, StoreError, USER_CATEGORIES_BLOB};

/// Full data export for backup and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DataExport {
    pub cache: CacheExport,
    pub groups: GroupState,
    pub exported_at: DateTime<Utc>,
}

struct Inner {
    reconciler: TabGroupReconciler,
    extractor: Box<dyn ContentExtractor>,
    categories: CategorySet,
    snapshot: std::sync::Arc<SnapshotStore>,
    classifier_endpoint: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// TabOrganizer
// ═══════════════════════════════════════════════════════════

pub struct TabOrganizer {
    resolver: CategorizationResolver,
    inner: Mutex<Inner>,
}

impl TabOrganizer {
    /// Open the snapshot store, restore all persisted state, and wire the
    /// engine together from configuration.
    pub fn new(
        config: OrganizerConfig,
        surface: Box<dyn NativeSurface>,
        extractor: Box<dyn ContentExtractor>,
    ) -> Result<Self, StoreError> {
        let snapshot = std::sync::Arc::new(SnapshotStore::open(&config.snapshot_db_path)?);

        let overrides = snapshot
            .load_json::<Vec<CategoryOverride>>(USER_CATEGORIES_BLOB)?
            .unwrap_or_default();
        let categories = CategorySet::with_overrides(&overrides);

        let remote = config.remote_store.as_ref().map(RemoteKvStore::new);
        let cache = TieredCache::new(
            config.exact_cache_cap,
            config.domain_cache_cap,
            remote,
            std::sync::Arc::clone(&snapshot),
        );

        let limiter = std::sync::Arc::new(FixedWindowLimiter::new(config.rate_limit_per_minute));
        let backend = GeminiClient::new(
            config.classifier_api_key.clone(),
            config.classifier_endpoint.clone(),
        );
        let classifier = RemoteClassifier::new(Box::new(backend), limiter, categories.clone());

        let reconciler = TabGroupReconciler::new(surface, std::sync::Arc::clone(&snapshot));

        tracing::info!(
            remote_configured = config.remote_store.is_some(),
            keyed = config.classifier_api_key.is_some(),
            "tab organizer initialized"
        );

        Ok(Self {
            resolver: CategorizationResolver::new(cache, classifier),
            inner: Mutex::new(Inner {
                reconciler,
                extractor,
                categories,
                snapshot,
                classifier_endpoint: config.classifier_endpoint,
            }),
        })
    }

    /// Assemble an organizer from already-built parts. Intended for tests and
    /// embedding hosts with custom backends.
    pub fn from_parts(
        resolver: CategorizationResolver,
        reconciler: TabGroupReconciler,
        extractor: Box<dyn ContentExtractor>,
        categories: CategorySet,
        snapshot: std::sync::Arc<SnapshotStore>,
    ) -> Self {
        Self {
            resolver,
            inner: Mutex::new(Inner {
                reconciler,
                extractor,
                categories,
                snapshot,
                classifier_endpoint: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Inner never panics while holding the lock outside tests; recover
        // the data rather than poisoning the whole engine.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Resolve a tab to a category without touching group state.
    pub fn resolve(&self, descriptor: &TabDescriptor) -> Resolution {
        let descriptor = self.lock().enriched(descriptor.clone());
        self.resolver.resolve(&descriptor)
    }

    /// Directly place a tab in a category group, bypassing resolution.
    pub fn assign(&self, descriptor: TabDescriptor, category: Category) {
        let mut inner = self.lock();
        let categories = inner.categories.clone();
        inner.reconciler.assign(descriptor, category, &categories);
    }

    /// Drop a closed tab. Returns the category it was grouped under, if any.
    pub fn remove(&self, id: TabId) -> Option<Category> {
        self.lock().reconciler.remove(id)
    }

    /// Mark a tab as just used.
    pub fn activate(&self, id: TabId) {
        self.lock().reconciler.activate(id);
    }

    /// Apply one tab lifecycle event.
    pub fn handle_event(&self, event: TabEvent) {
        match event {
            TabEvent::Created(descriptor) => self.categorize(descriptor),
            TabEvent::Updated {
                descriptor,
                fully_loaded,
            } => {
                if fully_loaded {
                    self.categorize(descriptor);
                }
            }
            TabEvent::Removed(id) => {
                self.remove(id);
            }
            TabEvent::Activated(id) => self.activate(id),
        }
    }

    /// Register, resolve, and assign one tab.
    ///
    /// The lock is released for the resolution itself; a removal observed in
    /// the gap wins, and the late result is dropped by the reconciler's
    /// liveness check.
    fn categorize(&self, descriptor: TabDescriptor) {
        if !descriptor.is_eligible() {
            tracing::debug!(url = %descriptor.url, "ineligible tab, skipping");
            return;
        }
        let descriptor = {
            let mut inner = self.lock();
            inner.reconciler.register_live(descriptor.id);
            inner.enriched(descriptor)
        };

        let resolution = self.resolver.resolve(&descriptor);

        let mut inner = self.lock();
        let categories = inner.categories.clone();
        inner
            .reconciler
            .complete_resolution(descriptor, resolution.category, &categories);
    }

    /// Full reconciliation pass over a complete tab snapshot. Also the repair
    /// path after external drift.
    pub fn organize_all(&self, tabs: Vec<TabDescriptor>) {
        self.lock().reconciler.reset(tabs.iter().map(|t| t.id));
        tracing::info!(total = tabs.len(), "organizing all tabs");
        for descriptor in tabs {
            self.categorize(descriptor);
        }
    }

    /// Tabs untouched for `threshold_days` (default 7), across all groups.
    pub fn unused_tabs(&self, threshold_days: Option<i64>) -> Vec<TabDescriptor> {
        let days = threshold_days.unwrap_or(DEFAULT_UNUSED_THRESHOLD_DAYS);
        self.lock().reconciler.unused_tabs(days)
    }

    /// Current group state snapshot.
    pub fn state(&self) -> GroupState {
        self.lock().reconciler.state().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }

    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
        tracing::info!("categorization cache cleared");
    }

    /// Everything worth backing up, in one serializable bundle.
    pub fn export_data(&self) -> DataExport {
        DataExport {
            cache: self.resolver.export_cache(),
            groups: self.state(),
            exported_at: Utc::now(),
        }
    }

    /// Probe the remote durable store. `Ok(false)` means none is configured.
    pub fn test_connection(&self) -> Result<bool, StoreError> {
        match self.resolver.remote_store() {
            Some(remote) => remote.test_connection().map(|()| true),
            None => Ok(false),
        }
    }

    /// Run one diagnostic classification with `api_key`, leaving the
    /// configured backend untouched. Lets the user validate a candidate key
    /// before saving it.
    pub fn test_api_key(&self, api_key: &str) -> Result<Category, ClassifierError> {
        let (endpoint, categories) = {
            let inner = self.lock();
            (inner.classifier_endpoint.clone(), inner.categories.clone())
        };
        let candidate = GeminiClient::new(Some(api_key.to_string()), endpoint);
        classifier::verify_backend(&candidate, &categories)
    }

    /// Supply or clear the classifier credential at runtime.
    pub fn set_api_key(&self, api_key: Option<String>) {
        let keyed = api_key.is_some();
        let endpoint = self.lock().classifier_endpoint.clone();
        self.resolver
            .set_backend(Box::new(GeminiClient::new(api_key, endpoint)));
        tracing::info!(keyed, "classifier credential updated");
    }

    /// Persist user display overrides and apply them to prompting.
    pub fn set_category_overrides(&self, overrides: Vec<CategoryOverride>) -> Result<(), StoreError> {
        let categories = {
            let mut inner = self.lock();
            inner.snapshot.save_json(USER_CATEGORIES_BLOB, &overrides)?;
            inner.categories = CategorySet::with_overrides(&overrides);
            inner.categories.clone()
        };
        self.resolver.set_categories(categories);
        Ok(())
    }
}

impl Inner {
    fn enriched(&self, descriptor: TabDescriptor) -> TabDescriptor {
        if descriptor.extracted_content.is_some() {
            descriptor
        } else {
            enrich(descriptor, self.extractor.as_ref())
        }
    }
}
