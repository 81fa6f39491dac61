//! Semantic tab categorization and grouping engine.
//!
//! Tabs are classified into a fixed category set through a three-stage
//! resolution pipeline (tiered cache, rate-limited remote classifier,
//! deterministic heuristic) and kept organized in named groups that mirror
//! onto the embedding host's native grouping surface. The in-memory
//! [`groups::GroupState`] is authoritative; everything external is
//! best-effort.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod extract;
pub mod fingerprint;
pub mod groups;
pub mod models;
pub mod organizer;
pub mod rate_limit;
pub mod resolver;
pub mod store;

pub use organizer::TabOrganizer;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from `RUST_LOG`, falling back to the crate default
/// filter. Call once from the embedding host.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Taborg starting v{}", config::APP_VERSION);
}
