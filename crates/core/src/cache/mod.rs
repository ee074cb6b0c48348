//! On-disk address resolution cache.
//!
//! A small SQLite database under `.quorum/address_cache.db` storing one row
//! per `(provider, chain, address)` with the serialized `AddressRecord`.
//! Entries are written after a successful registry lookup and are never
//! expired automatically; `clear` is the only way to drop them.
//!
//! SQLite gives us atomic writes and safe concurrent access from several
//! pipeline processes sharing the same working directory (WAL journal plus a
//! busy timeout).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::AddressRecord;

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
const CURRENT_SCHEMA_VERSION: i32 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize cached record: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Failed to create cache directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address cache lock was poisoned by a panicking thread")]
    Poisoned,

    /// The cache was written by a newer build with a schema we do not know.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// A cached resolution as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub provider: String,
    pub chain: String,
    pub address: String,
    pub record: AddressRecord,
    pub created_at: String,
}

/// Row count per provider, for `cache-info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCount {
    pub provider: String,
    pub entries: u64,
}

pub struct AddressCache {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for AddressCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressCache").finish_non_exhaustive()
    }
}

impl AddressCache {
    /// Open (or create) the cache at `path`, creating parent directories and
    /// applying migrations.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Throwaway cache for tests and one-off runs.
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    pub fn get(
        &self,
        provider: &str,
        chain: &str,
        address: &str,
    ) -> CacheResult<Option<AddressRecord>> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(
                r#"
                SELECT record
                FROM address_records
                WHERE provider = ?1 AND chain = ?2 AND address = ?3
                "#,
                params![provider, chain, address.to_ascii_lowercase()],
                |row| row.get(0),
            )
            .optional()?;
        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the record for a key in a single statement.
    pub fn put(
        &self,
        provider: &str,
        chain: &str,
        address: &str,
        record: &AddressRecord,
    ) -> CacheResult<()> {
        let body = serde_json::to_string(record)?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO address_records (provider, chain, address, record, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![provider, chain, address.to_ascii_lowercase(), body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// List entries, optionally for one provider, ordered by key.
    pub fn entries(&self, provider: Option<&str>) -> CacheResult<Vec<CacheEntry>> {
        type RawEntry = (String, String, String, String, String);
        fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntry> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        }

        let conn = self.lock()?;
        let mut stmt = if provider.is_some() {
            conn.prepare(
                r#"
                SELECT provider, chain, address, record, created_at
                FROM address_records
                WHERE provider = ?1
                ORDER BY provider, chain, address
                "#,
            )?
        } else {
            conn.prepare(
                r#"
                SELECT provider, chain, address, record, created_at
                FROM address_records
                ORDER BY provider, chain, address
                "#,
            )?
        };

        let rows = if let Some(name) = provider {
            stmt.query_map(params![name], map_entry)?
        } else {
            stmt.query_map([], map_entry)?
        };

        let mut out = Vec::new();
        for row in rows {
            let (provider, chain, address, body, created_at) = row?;
            out.push(CacheEntry {
                provider,
                chain,
                address,
                record: serde_json::from_str(&body)?,
                created_at,
            });
        }
        Ok(out)
    }

    pub fn counts(&self) -> CacheResult<Vec<ProviderCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT provider, COUNT(*)
            FROM address_records
            GROUP BY provider
            ORDER BY provider
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let entries: i64 = row.get(1)?;
            Ok(ProviderCount { provider: row.get(0)?, entries: entries.max(0) as u64 })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Remove cached entries (all, or one provider's). Returns rows removed.
    pub fn clear(&self, provider: Option<&str>) -> CacheResult<usize> {
        let conn = self.lock()?;
        let removed = match provider {
            Some(name) => {
                conn.execute("DELETE FROM address_records WHERE provider = ?1", params![name])?
            }
            None => conn.execute("DELETE FROM address_records", [])?,
        };
        Ok(removed)
    }
}

/// Apply schema migrations, tracked with `PRAGMA user_version`.
///
/// Version map:
/// - 0: no schema
/// - 1: address_records table
fn apply_migrations(conn: &Connection) -> CacheResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(CacheError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS address_records (
                provider    TEXT NOT NULL,
                chain       TEXT NOT NULL,
                address     TEXT NOT NULL,
                record      TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                PRIMARY KEY (provider, chain, address)
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

fn current_schema_version(conn: &Connection) -> CacheResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
