use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::errors::{ShelfError, ShelfResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    is_premium INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_address TEXT NOT NULL UNIQUE,
    feed_link TEXT,
    feed_title TEXT NOT NULL,
    num_subscribers INTEGER NOT NULL DEFAULT 0,
    active_subscribers INTEGER NOT NULL DEFAULT 0,
    premium_subscribers INTEGER NOT NULL DEFAULT 0,
    active INTEGER NOT NULL DEFAULT 1,
    has_feed_exception INTEGER NOT NULL DEFAULT 0,
    has_page_exception INTEGER NOT NULL DEFAULT 0,
    fetched_once INTEGER NOT NULL DEFAULT 0,
    merged_into INTEGER REFERENCES feeds(id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS duplicate_feeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    duplicate_address TEXT NOT NULL UNIQUE,
    feed_id INTEGER NOT NULL,
    FOREIGN KEY (feed_id) REFERENCES feeds(id)
);

CREATE INDEX IF NOT EXISTS idx_duplicate_feeds_feed_id ON duplicate_feeds(feed_id);

CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    feed_id INTEGER NOT NULL,
    active INTEGER NOT NULL DEFAULT 0,
    mark_read_date TEXT NOT NULL,
    last_read_date TEXT,
    needs_unread_recalc INTEGER NOT NULL DEFAULT 0,
    user_title TEXT,
    feed_opens INTEGER NOT NULL DEFAULT 0,
    is_trained INTEGER NOT NULL DEFAULT 0,
    UNIQUE (user_id, feed_id),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
    FOREIGN KEY (feed_id) REFERENCES feeds(id)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_feed_id ON subscriptions(feed_id);

CREATE TABLE IF NOT EXISTS folders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE,
    folders TEXT NOT NULL DEFAULT '[]',
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS pending_fetches (
    feed_id INTEGER PRIMARY KEY,
    queued_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (feed_id) REFERENCES feeds(id)
);
"#;

#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> ShelfResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> ShelfResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ShelfResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ShelfError> {
        self.conn
            .lock()
            .map_err(|_| ShelfError::Database(rusqlite::Error::InvalidQuery))
    }
}
