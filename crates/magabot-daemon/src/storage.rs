//! Message archive.
//!
//! A small sqlite database recording metadata about handled traffic. The
//! schema is internal; nothing outside the daemon reads it. Message text
//! is not stored, only lengths and hashed identities.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};

use crate::error::DaemonResult;

/// Direction of an archived message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From a user to the bot.
    Inbound,
    /// From the bot to a user.
    Outbound,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        }
    }
}

/// Sqlite-backed archive of message metadata.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open (or create) the archive at `path`.
    pub fn open(path: &Path) -> DaemonResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 platform TEXT NOT NULL,
                 chat_id TEXT NOT NULL,
                 user_hash TEXT NOT NULL,
                 direction TEXT NOT NULL,
                 length INTEGER NOT NULL,
                 created_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_chat
                 ON messages (platform, chat_id);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory archive for tests.
    pub fn open_in_memory() -> DaemonResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 platform TEXT NOT NULL,
                 chat_id TEXT NOT NULL,
                 user_hash TEXT NOT NULL,
                 direction TEXT NOT NULL,
                 length INTEGER NOT NULL,
                 created_at TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Record one message's metadata.
    pub fn record(
        &self,
        platform: &str,
        chat_id: &str,
        user_hash: &str,
        direction: Direction,
        length: usize,
    ) -> DaemonResult<()> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            "INSERT INTO messages (platform, chat_id, user_hash, direction, length, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                platform,
                chat_id,
                user_hash,
                direction.as_str(),
                length as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Total number of archived messages.
    pub fn message_count(&self) -> DaemonResult<i64> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}
