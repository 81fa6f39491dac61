use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Taborg";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote classifier quota per 60-second window. Conservative default, well
/// under the service's free-tier allowance.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 50;

/// Exact-tier cache capacity (FIFO).
pub const DEFAULT_EXACT_CACHE_CAP: usize = 1000;

/// Domain-pattern tier cache capacity (FIFO).
pub const DEFAULT_DOMAIN_CACHE_CAP: usize = 200;

/// Remote-store entries older than this are treated as cache misses.
pub const REMOTE_ENTRY_MAX_AGE_DAYS: i64 = 30;

/// Tabs not activated for this many days count as unused.
pub const DEFAULT_UNUSED_THRESHOLD_DAYS: i64 = 7;

/// Get the application data directory
/// ~/Taborg/ on all platforms (user-visible, holds the snapshot database)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}

/// Local snapshot database path.
pub fn snapshot_db_path() -> PathBuf {
    app_data_dir().join("taborg.db")
}

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "taborg=info".to_string()
}

/// Credentials for the optional remote durable store (HTTPS key/value API).
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Engine configuration. `Default` yields a keyless, local-only engine that
/// classifies heuristically and caches in the local snapshot store.
#[derive(Debug, Clone)]
pub struct OrganizerConfig {
    /// Remote classifier credential. `None` → heuristic-only operation.
    pub classifier_api_key: Option<String>,
    /// Remote classifier endpoint override. `None` → service default.
    pub classifier_endpoint: Option<String>,
    /// Remote durable store. `None` → two local tiers only.
    pub remote_store: Option<RemoteStoreConfig>,
    pub rate_limit_per_minute: u32,
    pub exact_cache_cap: usize,
    pub domain_cache_cap: usize,
    pub snapshot_db_path: PathBuf,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            classifier_api_key: None,
            classifier_endpoint: None,
            remote_store: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            exact_cache_cap: DEFAULT_EXACT_CACHE_CAP,
            domain_cache_cap: DEFAULT_DOMAIN_CACHE_CAP,
            snapshot_db_path: snapshot_db_path(),
        }
    }
}
