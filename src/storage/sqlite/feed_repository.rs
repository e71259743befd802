use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{Feed, NewFeed, RegistryStats, SubscriberCounts};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::FeedRepository;

const FEED_COLUMNS: &str = "feeds.id, feeds.feed_address, feeds.feed_link, feeds.feed_title, \
     feeds.num_subscribers, feeds.active_subscribers, feeds.premium_subscribers, feeds.active, \
     feeds.has_feed_exception, feeds.has_page_exception, feeds.fetched_once, feeds.merged_into, \
     feeds.created_at";

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        feed_address: row.get(1)?,
        feed_link: row.get(2)?,
        feed_title: row.get(3)?,
        num_subscribers: row.get(4)?,
        active_subscribers: row.get(5)?,
        premium_subscribers: row.get(6)?,
        active: row.get(7)?,
        has_feed_exception: row.get(8)?,
        has_page_exception: row.get(9)?,
        fetched_once: row.get(10)?,
        merged_into: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub struct SqliteFeedRepository {
    storage: SqliteStorage,
}

impl SqliteFeedRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    fn query_one(&self, filter: &str, value: &dyn rusqlite::ToSql) -> ShelfResult<Option<Feed>> {
        let conn = self.storage.connection()?;
        let sql = format!("SELECT {} FROM feeds WHERE {}", FEED_COLUMNS, filter);
        let feed = conn.query_row(&sql, [value], feed_from_row).optional()?;
        Ok(feed)
    }
}

impl FeedRepository for SqliteFeedRepository {
    fn get_by_id(&self, id: i64) -> ShelfResult<Option<Feed>> {
        self.query_one("feeds.id = ?1", &id)
    }

    fn get_by_address(&self, address: &str) -> ShelfResult<Option<Feed>> {
        self.query_one("feeds.feed_address = ?1", &address)
    }

    fn get_or_create(&self, feed: &NewFeed) -> ShelfResult<Feed> {
        let conn = self.storage.connection()?;

        // The first subscriber is counted at creation time
        conn.execute(
            "INSERT INTO feeds (feed_address, feed_link, feed_title, num_subscribers, active_subscribers) \
             VALUES (?1, ?2, ?3, 1, 1) ON CONFLICT(feed_address) DO NOTHING",
            params![feed.feed_address, feed.feed_link, feed.feed_title],
        )?;

        let sql = format!("SELECT {} FROM feeds WHERE feed_address = ?1", FEED_COLUMNS);
        let stored = conn.query_row(&sql, [&feed.feed_address], feed_from_row)?;
        Ok(stored)
    }

    fn find_duplicate(&self, address: &str) -> ShelfResult<Option<Feed>> {
        let conn = self.storage.connection()?;
        let sql = format!(
            "SELECT {} FROM duplicate_feeds JOIN feeds ON feeds.id = duplicate_feeds.feed_id \
             WHERE duplicate_feeds.duplicate_address = ?1",
            FEED_COLUMNS
        );
        let feed = conn.query_row(&sql, [address], feed_from_row).optional()?;
        Ok(feed)
    }

    fn record_duplicate(&self, address: &str, feed_id: i64) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        conn.execute(
            "INSERT INTO duplicate_feeds (duplicate_address, feed_id) VALUES (?1, ?2) \
             ON CONFLICT(duplicate_address) DO UPDATE SET feed_id = excluded.feed_id",
            params![address, feed_id],
        )?;
        Ok(())
    }

    fn repoint_duplicates(&self, from_feed: i64, to_feed: i64) -> ShelfResult<usize> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            "UPDATE duplicate_feeds SET feed_id = ?2 WHERE feed_id = ?1",
            params![from_feed, to_feed],
        )?;
        Ok(changed)
    }

    fn reset_exceptions(&self, feed_id: i64, new_address: Option<String>) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            "UPDATE feeds SET has_feed_exception = 0, has_page_exception = 0, active = 1, \
             fetched_once = 0, feed_address = COALESCE(?2, feed_address) WHERE id = ?1",
            params![feed_id, new_address],
        )?;
        if changed == 0 {
            return Err(ShelfError::FeedNotFound(feed_id.to_string()));
        }
        Ok(())
    }

    fn absorb(&self, loser: i64, winner: i64, counts: SubscriberCounts) -> ShelfResult<bool> {
        let mut conn = self.storage.connection()?;
        let tx = conn.transaction()?;

        let stamped = tx.execute(
            "UPDATE feeds SET merged_into = ?2, active = 0 WHERE id = ?1 AND merged_into IS NULL",
            params![loser, winner],
        )?;
        if stamped == 0 {
            return Ok(false);
        }

        tx.execute(
            "UPDATE feeds SET num_subscribers = num_subscribers + ?2, \
             active_subscribers = active_subscribers + ?3, \
             premium_subscribers = premium_subscribers + ?4 WHERE id = ?1",
            params![winner, counts.total, counts.active, counts.premium],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn stats(&self) -> ShelfResult<RegistryStats> {
        let conn = self.storage.connection()?;
        let count = |sql: &str| -> ShelfResult<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        Ok(RegistryStats {
            feeds: count("SELECT COUNT(*) FROM feeds")?,
            subscriptions: count("SELECT COUNT(*) FROM subscriptions")?,
            duplicate_feeds: count("SELECT COUNT(*) FROM duplicate_feeds")?,
            exception_feeds: count("SELECT COUNT(*) FROM feeds WHERE has_feed_exception = 1")?,
            exception_pages: count("SELECT COUNT(*) FROM feeds WHERE has_page_exception = 1")?,
            inactive_feeds: count("SELECT COUNT(*) FROM feeds WHERE active = 0")?,
            active_feeds: count("SELECT COUNT(*) FROM feeds WHERE active_subscribers > 0")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_repo() -> SqliteFeedRepository {
        let storage = SqliteStorage::in_memory().unwrap();
        SqliteFeedRepository::new(storage)
    }

    fn new_feed(address: &str) -> NewFeed {
        NewFeed::new(
            address.to_string(),
            Some("http://example.com/".to_string()),
            "Example Feed".to_string(),
        )
    }

    #[test]
    fn test_get_or_create_inserts_with_first_subscriber() {
        let repo = setup_repo();
        let feed = repo.get_or_create(&new_feed("http://example.com/feed")).unwrap();

        assert!(feed.id > 0);
        assert_eq!(feed.feed_title, "Example Feed");
        assert_eq!(feed.num_subscribers, 1);
        assert_eq!(feed.active_subscribers, 1);
        assert!(!feed.fetched_once);
        assert_eq!(feed.merged_into, None);
    }

    #[test]
    fn test_get_or_create_converges_on_existing_row() {
        let repo = setup_repo();
        let first = repo.get_or_create(&new_feed("http://example.com/feed")).unwrap();

        let mut other = new_feed("http://example.com/feed");
        other.feed_title = "Something else".to_string();
        let second = repo.get_or_create(&other).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.feed_title, "Example Feed");
        assert_eq!(repo.stats().unwrap().feeds, 1);
    }

    #[test]
    fn test_concurrent_get_or_create_yields_one_row() {
        let storage = SqliteStorage::in_memory().unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = SqliteFeedRepository::new(storage.clone());
                std::thread::spawn(move || repo.get_or_create(&new_feed("http://race.example/")).unwrap().id)
            })
            .collect();

        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(SqliteFeedRepository::new(storage).stats().unwrap().feeds, 1);
    }

    #[test]
    fn test_duplicates_resolve_to_canonical_feed() {
        let repo = setup_repo();
        let canonical = repo.get_or_create(&new_feed("http://example.com/feed")).unwrap();

        assert!(repo.find_duplicate("http://old.example.com/rss").unwrap().is_none());
        repo.record_duplicate("http://old.example.com/rss", canonical.id).unwrap();
        let found = repo.find_duplicate("http://old.example.com/rss").unwrap().unwrap();
        assert_eq!(found.id, canonical.id);
    }

    #[test]
    fn test_repoint_duplicates() {
        let repo = setup_repo();
        let a = repo.get_or_create(&new_feed("http://a.example/")).unwrap();
        let b = repo.get_or_create(&new_feed("http://b.example/")).unwrap();
        repo.record_duplicate("http://older-a.example/", a.id).unwrap();

        assert_eq!(repo.repoint_duplicates(a.id, b.id).unwrap(), 1);
        let found = repo.find_duplicate("http://older-a.example/").unwrap().unwrap();
        assert_eq!(found.id, b.id);
    }

    #[test]
    fn test_absorb_only_applies_once() {
        let repo = setup_repo();
        let loser = repo.get_or_create(&new_feed("http://a.example/")).unwrap();
        let winner = repo.get_or_create(&new_feed("http://b.example/")).unwrap();

        assert!(repo.absorb(loser.id, winner.id, loser.counts()).unwrap());
        assert!(!repo.absorb(loser.id, winner.id, loser.counts()).unwrap());

        let winner = repo.get_by_id(winner.id).unwrap().unwrap();
        assert_eq!(winner.num_subscribers, 2);
        let loser = repo.get_by_id(loser.id).unwrap().unwrap();
        assert_eq!(loser.merged_into, Some(winner.id));
    }

    #[test]
    fn test_reset_exceptions_moves_address() {
        let repo = setup_repo();
        let feed = repo.get_or_create(&new_feed("http://a.example/")).unwrap();
        {
            let conn = repo.storage.connection().unwrap();
            conn.execute("UPDATE feeds SET has_feed_exception = 1, fetched_once = 1 WHERE id = ?1", [feed.id])
                .unwrap();
        }
        assert_eq!(repo.stats().unwrap().exception_feeds, 1);

        repo.reset_exceptions(feed.id, Some("http://moved.example/".to_string())).unwrap();
        let feed = repo.get_by_address("http://moved.example/").unwrap().unwrap();
        assert!(!feed.has_exception());
        assert!(!feed.fetched_once);
        assert!(matches!(
            repo.reset_exceptions(999, None),
            Err(ShelfError::FeedNotFound(_))
        ));
    }
}
