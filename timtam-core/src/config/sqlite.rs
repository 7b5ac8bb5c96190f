//! SQLite-backed configuration store.
//!
//! Two tables: `grasp_config` holds every saved version, `meeting_config`
//! maps a meeting to the version explicitly applied to it.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use super::parser::parse_grasp_group;
use super::store::{ConfigStore, StoredConfig};
use crate::error::StoreError;
use crate::types::MeetingId;
use crate::utils::now_ms;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS grasp_config (
    version_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_grasp_config_name ON grasp_config (name, created_at);
CREATE TABLE IF NOT EXISTS meeting_config (
    meeting_id  TEXT PRIMARY KEY,
    version_id  TEXT NOT NULL,
    assigned_at INTEGER NOT NULL
);
";

/// Thread-safe via internal Mutex. Every operation takes the lock.
pub struct SqliteConfigStore {
    conn: Mutex<Connection>,
}

impl SqliteConfigStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open_path(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "config store opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store a version as-is, without validation.
    pub fn insert(&self, config: &StoredConfig) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO grasp_config (version_id, name, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![config.version_id, config.name, config.body, config.created_at_ms],
        )?;
        Ok(())
    }

    /// All versions, newest first.
    pub fn list(&self) -> Result<Vec<StoredConfig>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT version_id, name, body, created_at FROM grasp_config
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], row_to_config)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn row_to_config(row: &Row<'_>) -> rusqlite::Result<StoredConfig> {
    Ok(StoredConfig {
        version_id: row.get(0)?,
        name: row.get(1)?,
        body: row.get(2)?,
        created_at_ms: row.get(3)?,
    })
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn assigned_version(&self, meeting_id: &MeetingId) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.query_row(
            "SELECT version_id FROM meeting_config WHERE meeting_id = ?1",
            params![meeting_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    async fn named_version(&self, name: &str) -> Result<Option<StoredConfig>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.query_row(
            "SELECT version_id, name, body, created_at FROM grasp_config
             WHERE name = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
            params![name],
            row_to_config,
        )
        .optional()
        .map_err(Into::into)
    }

    async fn version_by_id(&self, version_id: &str) -> Result<Option<StoredConfig>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.query_row(
            "SELECT version_id, name, body, created_at FROM grasp_config WHERE version_id = ?1",
            params![version_id],
            row_to_config,
        )
        .optional()
        .map_err(Into::into)
    }

    async fn save_config(&self, name: &str, body: &str) -> Result<StoredConfig, StoreError> {
        parse_grasp_group(body)?;
        let config = StoredConfig::new(name, body, now_ms());
        self.insert(&config)?;
        info!(version_id = %config.version_id, name = %name, "config saved");
        Ok(config)
    }

    async fn assign(&self, meeting_id: &MeetingId, version_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM grasp_config WHERE version_id = ?1)",
            params![version_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(version_id.to_string()));
        }
        conn.execute(
            "INSERT INTO meeting_config (meeting_id, version_id, assigned_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(meeting_id) DO UPDATE SET version_id = excluded.version_id,
                                                   assigned_at = excluded.assigned_at",
            params![meeting_id.as_str(), version_id, now_ms()],
        )?;
        Ok(())
    }

    async fn delete_version(&self, version_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let deleted = conn.execute(
            "DELETE FROM grasp_config WHERE version_id = ?1",
            params![version_id],
        )?;
        Ok(deleted > 0)
    }
}
