mod seed;
mod shape;

pub use seed::seed_record;
pub use shape::parse_record;

use crate::config::DEFAULT_STORAGE_KEY;
use crate::errors::{AppError, AppResult};
use crate::models::AppRecord;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Whole-record persistence. `load` seeds an absent slot; `save` overwrites it.
pub trait RecordStore: Send + Sync {
    fn load(&self) -> AppResult<AppRecord>;
    fn save(&self, record: &AppRecord) -> AppResult<()>;
    /// Drops the slot; the next `load` writes the seed dataset again.
    fn reset(&self) -> AppResult<()>;
}

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    storage_key: String,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        Self::with_key(path, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(path: &Path, storage_key: &str) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        Self::from_connection(conn, storage_key)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        Self::from_connection(conn, DEFAULT_STORAGE_KEY)
    }

    fn from_connection(conn: Connection, storage_key: &str) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
            storage_key: storage_key.to_string(),
        })
    }

    /// Raw stored blob, if the slot has been written.
    pub fn export_json(&self) -> AppResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        let raw = conn
            .query_row(
                "SELECT value FROM record_slots WHERE key = ?1",
                [&self.storage_key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(raw)
    }
}

impl RecordStore for Database {
    fn load(&self) -> AppResult<AppRecord> {
        if let Some(raw) = self.export_json()? {
            return parse_record(&raw);
        }

        let record = seed_record()?;
        self.save(&record)?;
        tracing::info!(key = %self.storage_key, "seeded empty record slot");
        Ok(record)
    }

    fn save(&self, record: &AppRecord) -> AppResult<()> {
        let value = serde_json::to_string(record)?;
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute(
            "INSERT INTO record_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![self.storage_key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.conn.lock().map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
        conn.execute("DELETE FROM record_slots WHERE key = ?1", [&self.storage_key])?;
        Ok(())
    }
}

/// In-process slot. Holds the serialized form so reads still deserialize in full.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &AppRecord) -> AppResult<Self> {
        Ok(Self {
            slot: Mutex::new(Some(serde_json::to_string(record)?)),
        })
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> AppResult<AppRecord> {
        let mut slot = self.slot.lock().map_err(|_| AppError::Internal("store mutex poisoned".to_string()))?;
        if let Some(raw) = slot.as_deref() {
            return parse_record(raw);
        }
        let record = seed_record()?;
        *slot = Some(serde_json::to_string(&record)?);
        Ok(record)
    }

    fn save(&self, record: &AppRecord) -> AppResult<()> {
        let raw = serde_json::to_string(record)?;
        let mut slot = self.slot.lock().map_err(|_| AppError::Internal("store mutex poisoned".to_string()))?;
        *slot = Some(raw);
        Ok(())
    }

    fn reset(&self) -> AppResult<()> {
        let mut slot = self.slot.lock().map_err(|_| AppError::Internal("store mutex poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
