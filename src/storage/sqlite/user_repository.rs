use rusqlite::{params, OptionalExtension, Row};

use crate::domain::User;
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::UserRepository;

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_premium: row.get(2)?,
    })
}

pub struct SqliteUserRepository {
    storage: SqliteStorage,
}

impl SqliteUserRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl UserRepository for SqliteUserRepository {
    fn create(&self, username: &str, is_premium: bool) -> ShelfResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ShelfError::InvalidInput("username is empty".to_string()));
        }

        let conn = self.storage.connection()?;
        conn.execute(
            "INSERT INTO users (username, is_premium) VALUES (?1, ?2)",
            params![username, is_premium],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            is_premium,
        })
    }

    fn get_by_id(&self, id: i64) -> ShelfResult<Option<User>> {
        let conn = self.storage.connection()?;
        let user = conn
            .query_row(
                "SELECT id, username, is_premium FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn get_by_username(&self, username: &str) -> ShelfResult<Option<User>> {
        let conn = self.storage.connection()?;
        let user = conn
            .query_row(
                "SELECT id, username, is_premium FROM users WHERE username = ?1",
                [username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn set_premium(&self, id: i64, is_premium: bool) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        let changed = conn.execute(
            "UPDATE users SET is_premium = ?2 WHERE id = ?1",
            params![id, is_premium],
        )?;
        if changed == 0 {
            return Err(ShelfError::UserNotFound(id.to_string()));
        }
        Ok(())
    }
}
