use rusqlite::{params, OptionalExtension, Row};

use crate::domain::{NewSubscription, Subscription};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::SubscriptionRepository;

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, feed_id, active, mark_read_date, last_read_date, \
     needs_unread_recalc, user_title, feed_opens, is_trained";

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        feed_id: row.get(2)?,
        active: row.get(3)?,
        mark_read_date: row.get(4)?,
        last_read_date: row.get(5)?,
        needs_unread_recalc: row.get(6)?,
        user_title: row.get(7)?,
        feed_opens: row.get(8)?,
        is_trained: row.get(9)?,
    })
}

pub struct SqliteSubscriptionRepository {
    storage: SqliteStorage,
}

impl SqliteSubscriptionRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    fn list_where(&self, filter: &str, value: i64) -> ShelfResult<Vec<Subscription>> {
        let conn = self.storage.connection()?;
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE {} ORDER BY id",
            SUBSCRIPTION_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let subs = stmt.query_map([value], subscription_from_row)?;
        subs.collect::<Result<Vec<_>, _>>().map_err(ShelfError::from)
    }

    fn update_one(&self, sql: &str, params: impl rusqlite::Params, id: i64) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        if conn.execute(sql, params)? == 0 {
            return Err(ShelfError::SubscriptionNotFound(id.to_string()));
        }
        Ok(())
    }
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    fn get(&self, user_id: i64, feed_id: i64) -> ShelfResult<Option<Subscription>> {
        let conn = self.storage.connection()?;
        let sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND feed_id = ?2",
            SUBSCRIPTION_COLUMNS
        );
        let sub = conn
            .query_row(&sql, [user_id, feed_id], subscription_from_row)
            .optional()?;
        Ok(sub)
    }

    fn get_or_create(&self, new: &NewSubscription) -> ShelfResult<(Subscription, bool)> {
        let conn = self.storage.connection()?;
        let inserted = conn.execute(
            "INSERT INTO subscriptions (user_id, feed_id, active, mark_read_date, needs_unread_recalc) \
             VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(user_id, feed_id) DO NOTHING",
            params![
                new.user_id,
                new.feed_id,
                new.active,
                new.mark_read_date,
                new.needs_unread_recalc
            ],
        )?;

        let sql = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ?1 AND feed_id = ?2",
            SUBSCRIPTION_COLUMNS
        );
        let sub = conn.query_row(&sql, [new.user_id, new.feed_id], subscription_from_row)?;
        Ok((sub, inserted > 0))
    }

    fn set_active(&self, id: i64, active: bool) -> ShelfResult<()> {
        self.update_one(
            "UPDATE subscriptions SET active = ?2 WHERE id = ?1",
            params![id, active],
            id,
        )
    }

    fn activate_all_for_user(&self, user_id: i64) -> ShelfResult<usize> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            "UPDATE subscriptions SET active = 1 WHERE user_id = ?1 AND active = 0",
            [user_id],
        )?;
        Ok(changed)
    }

    fn list_for_user(&self, user_id: i64) -> ShelfResult<Vec<Subscription>> {
        self.list_where("user_id = ?1", user_id)
    }

    fn list_for_feed(&self, feed_id: i64) -> ShelfResult<Vec<Subscription>> {
        self.list_where("feed_id = ?1", feed_id)
    }

    fn repoint(&self, id: i64, feed_id: i64) -> ShelfResult<()> {
        self.update_one(
            "UPDATE subscriptions SET feed_id = ?2 WHERE id = ?1",
            params![id, feed_id],
            id,
        )
    }

    fn delete(&self, id: i64) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        conn.execute("DELETE FROM subscriptions WHERE id = ?1", [id])?;
        Ok(())
    }

    fn delete_all_for_user(&self, user_id: i64) -> ShelfResult<usize> {
        let conn = self.storage.connection()?;
        let removed = conn.execute("DELETE FROM subscriptions WHERE user_id = ?1", [user_id])?;
        Ok(removed)
    }

    fn set_user_title(&self, id: i64, title: Option<String>) -> ShelfResult<()> {
        self.update_one(
            "UPDATE subscriptions SET user_title = ?2 WHERE id = ?1",
            params![id, title],
            id,
        )
    }

    fn unfetched_active_feed_ids(&self, user_id: i64) -> ShelfResult<Vec<i64>> {
        let conn = self.storage.connection()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT subscriptions.feed_id FROM subscriptions \
             JOIN feeds ON feeds.id = subscriptions.feed_id \
             WHERE subscriptions.user_id = ?1 AND subscriptions.active = 1 AND feeds.fetched_once = 0 \
             ORDER BY subscriptions.feed_id",
        )?;
        let ids = stmt.query_map([user_id], |row| row.get(0))?;
        ids.collect::<Result<Vec<i64>, _>>().map_err(ShelfError::from)
    }
}
