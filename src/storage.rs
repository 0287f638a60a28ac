//! Durable capture counters.
//!
//! Only the last-save timestamp survives restarts. It is read once at startup
//! and written from the processing loop right after each successful save.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};

const LAST_SAVE_KEY: &str = "last_save_ms";

pub trait CounterStore {
    /// Last successful save in ms since the Unix epoch; 0 when never saved.
    fn load_last_save(&mut self) -> Result<u64>;

    fn store_last_save(&mut self, timestamp_ms: u64) -> Result<()>;
}

pub struct SqliteCounterStore {
    conn: Connection,
}

impl SqliteCounterStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| anyhow!("failed to open state db {}: {}", db_path, e))?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        let _mode: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS capture_state (
              key TEXT PRIMARY KEY,
              value INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl CounterStore for SqliteCounterStore {
    fn load_last_save(&mut self) -> Result<u64> {
        let value: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM capture_state WHERE key = ?1",
                params![LAST_SAVE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match value {
            None => Ok(0),
            Some(v) => u64::try_from(v).map_err(|_| anyhow!("corrupt capture state: {}", v)),
        }
    }

    fn store_last_save(&mut self, timestamp_ms: u64) -> Result<()> {
        let value = i64::try_from(timestamp_ms)
            .map_err(|_| anyhow!("timestamp {} exceeds i64 range", timestamp_ms))?;
        self.conn.execute(
            r#"
            INSERT INTO capture_state(key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![LAST_SAVE_KEY, value],
        )?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryCounterStore {
    last_save_ms: u64,
    writes: u64,
}

impl InMemoryCounterStore {
    pub fn with_last_save(last_save_ms: u64) -> Self {
        Self {
            last_save_ms,
            writes: 0,
        }
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl CounterStore for InMemoryCounterStore {
    fn load_last_save(&mut self) -> Result<u64> {
        Ok(self.last_save_ms)
    }

    fn store_last_save(&mut self, timestamp_ms: u64) -> Result<()> {
        self.last_save_ms = timestamp_ms;
        self.writes += 1;
        Ok(())
    }
}
