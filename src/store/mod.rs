//! Persistence: local snapshot store and optional remote durable store.
//!
//! The local store holds three independent whole-blob snapshots (exact cache
//! tier, domain cache tier, group state) plus user category overrides. Blobs
//! are loaded once at startup and rewritten wholesale on each relevant
//! mutation — there is no incremental or append format.

pub mod remote;

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use remote::RemoteKvStore;

/// Blob key: exact cache tier, `[fingerprint, CacheEntry]` pairs.
pub const EXACT_CACHE_BLOB: &str = "exact_cache";
/// Blob key: domain-pattern cache tier, `[domain_key, CacheEntry]` pairs.
pub const DOMAIN_CACHE_BLOB: &str = "domain_cache";
/// Blob key: group state, category → ordered tab list.
pub const TAB_GROUPS_BLOB: &str = "tab_groups";
/// Blob key: user category display overrides.
pub const USER_CATEGORIES_BLOB: &str = "user_categories";

/// Errors from local or remote persistence. Callers log these and continue;
/// in-memory state stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Remote store returned {status}: {body}")]
    Api { status: u16, body: String },
}

// ═══════════════════════════════════════════════════════════
// SnapshotStore
// ═══════════════════════════════════════════════════════════

/// Local whole-blob snapshot store over SQLite.
///
/// Wraps its connection in a `Mutex` so one store can be shared (`Arc`)
/// between the cache and the reconciler.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Open (creating if needed) the snapshot database at `path` and run
    /// migrations. The parent directory is created when missing.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read a raw blob. `None` when the key has never been written.
    pub fn get_blob(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().expect("snapshot store lock poisoned");
        let value = conn
            .query_row(
                "SELECT value FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Overwrite a blob wholesale.
    pub fn put_blob(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("snapshot store lock poisoned");
        conn.execute(
            "INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Load and deserialize a blob.
    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_blob(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write a blob.
    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.put_blob(key, &raw)
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE; PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_initial.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running snapshot store migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}
