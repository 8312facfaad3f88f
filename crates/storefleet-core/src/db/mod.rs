//! Durable store records backed by SQLite.
//!
//! The `stores` table is the only source of identity for a store. Rows are
//! never physically removed; deletion is a status change plus `deleted_at`.
//!
//! Every status write is conditional on the current status so a stale
//! reconciliation write can never clobber a row that was deleted in the
//! meantime.

pub mod types;

pub use types::*;

use crate::error::{Error, Result};
use crate::types::{Store, StoreStatus};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stores (
    store_id   TEXT PRIMARY KEY,
    store_name TEXT NOT NULL,
    namespace  TEXT NOT NULL UNIQUE,
    status     TEXT NOT NULL
               CHECK (status IN ('provisioning', 'ready', 'failed', 'deleted')),
    url        TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    deleted_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_stores_status ON stores(status);
";

const STORE_COLUMNS: &str =
    "store_id, store_name, namespace, status, url, created_at, deleted_at";

/// Database connection wrapper.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open database at specific path, creating the schema if needed
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Check database connectivity
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(Error::Database)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Store Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new store record in `provisioning` status.
    ///
    /// Returns `Ok(None)` when the id or namespace is already taken, so the
    /// caller can pick a fresh id.
    pub fn insert_store(&self, store: &NewStore) -> Result<Option<Store>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = chrono::Utc::now().timestamp_millis();

        let inserted = conn.execute(
            "INSERT INTO stores (store_id, store_name, namespace, status, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                store.store_id,
                store.store_name,
                store.namespace,
                StoreStatus::Provisioning.as_str(),
                store.url,
                now,
            ],
        );

        match inserted {
            Ok(_) => Ok(Some(Store {
                store_id: store.store_id.clone(),
                store_name: store.store_name.clone(),
                namespace: store.namespace.clone(),
                status: StoreStatus::Provisioning,
                url: store.url.clone(),
                created_at: now,
                deleted_at: None,
            })),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(None)
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    /// Get store by ID, including deleted stores
    pub fn get_store(&self, store_id: &str) -> Result<Option<Store>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stores WHERE store_id = ?1",
            STORE_COLUMNS
        ))?;

        Ok(stmt
            .query_row(params![store_id], Self::map_store)
            .optional()?)
    }

    /// List stores that are not deleted, newest first
    pub fn list_active_stores(&self) -> Result<Vec<Store>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stores
             WHERE status != 'deleted'
             ORDER BY created_at DESC, rowid DESC",
            STORE_COLUMNS
        ))?;

        let stores = stmt
            .query_map([], Self::map_store)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stores)
    }

    /// List stores in the given status, oldest first
    pub fn list_stores_by_status(&self, status: StoreStatus) -> Result<Vec<Store>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stores
             WHERE status = ?1
             ORDER BY created_at ASC, rowid ASC",
            STORE_COLUMNS
        ))?;

        let stores = stmt
            .query_map(params![status.as_str()], Self::map_store)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stores)
    }

    /// Move a store from `from` to `to`, only if it is still in `from`.
    ///
    /// Returns whether a row changed.
    pub fn transition_status(
        &self,
        store_id: &str,
        from: StoreStatus,
        to: StoreStatus,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(Error::Other(format!(
                "Illegal store transition {} -> {}",
                from, to
            )));
        }

        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let changed = conn.execute(
            "UPDATE stores SET status = ?1 WHERE store_id = ?2 AND status = ?3",
            params![to.as_str(), store_id, from.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Soft-delete a store. `deleted_at` is written at most once.
    ///
    /// Returns whether a row changed.
    pub fn mark_deleted(&self, store_id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = chrono::Utc::now().timestamp_millis();
        let changed = conn.execute(
            "UPDATE stores SET status = 'deleted', deleted_at = ?1
             WHERE store_id = ?2 AND status != 'deleted'",
            params![now, store_id],
        )?;
        Ok(changed > 0)
    }

    /// Count stores per status (for health check)
    pub fn count_by_status(&self) -> Result<StoreStatusCounts> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM stores GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = StoreStatusCounts::default();
        for (status, count) in rows {
            match status.parse::<StoreStatus>() {
                Ok(StoreStatus::Provisioning) => counts.provisioning = count,
                Ok(StoreStatus::Ready) => counts.ready = count,
                Ok(StoreStatus::Failed) => counts.failed = count,
                Ok(StoreStatus::Deleted) => counts.deleted = count,
                Err(_) => {}
            }
        }
        Ok(counts)
    }

    fn map_store(row: &rusqlite::Row) -> rusqlite::Result<Store> {
        let status: String = row.get(3)?;
        let status = status.parse::<StoreStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(Store {
            store_id: row.get(0)?,
            store_name: row.get(1)?,
            namespace: row.get(2)?,
            status,
            url: row.get(4)?,
            created_at: row.get(5)?,
            deleted_at: row.get(6)?,
        })
    }
}
