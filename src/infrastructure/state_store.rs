use crate::infrastructure::error::CoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const KEY_SCHEDULE: &str = "schedule";
pub const KEY_MOOD_ENTRIES: &str = "moodEntries";
pub const KEY_FOCUS_SESSIONS: &str = "focusSessions";
pub const KEY_REWARD_STATS: &str = "rewardStats";
pub const KEY_GAME_HIGH_SCORE: &str = "gameHighScore";

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), CoreError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Flat synchronous key/value map of JSON blobs. One logical key per piece
/// of mutable state; no transactional guarantee across keys.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError>;
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteStateStore {
    db_path: PathBuf,
}

impl SqliteStateStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, CoreError> {
        Connection::open(&self.db_path).map_err(CoreError::from)
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let parsed = serde_json::from_str(&raw)?;
        Ok(Some(parsed))
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO app_state (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CoreError> {
        let values = self
            .values
            .lock()
            .map_err(|error| CoreError::InvalidState(format!("state store lock poisoned: {error}")))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), CoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|error| CoreError::InvalidState(format!("state store lock poisoned: {error}")))?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}
