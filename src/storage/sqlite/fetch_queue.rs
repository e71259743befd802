use crate::errors::{ShelfError, ShelfResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::FetchQueue;

/// Queue table drained by the fetcher. Re-enqueueing a feed that is already
/// pending is a no-op, so repeated delivery is harmless.
pub struct SqliteFetchQueue {
    storage: SqliteStorage,
}

impl SqliteFetchQueue {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    pub fn pending(&self) -> ShelfResult<Vec<i64>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare("SELECT feed_id FROM pending_fetches ORDER BY feed_id")?;
        let ids = stmt.query_map([], |row| row.get(0))?;
        ids.collect::<Result<Vec<i64>, _>>().map_err(ShelfError::from)
    }
}

impl FetchQueue for SqliteFetchQueue {
    fn enqueue(&self, feed_ids: &[i64]) -> ShelfResult<()> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO pending_fetches (feed_id) VALUES (?1)")?;
            for feed_id in feed_ids {
                stmt.execute([feed_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
