use rusqlite::OptionalExtension;

use crate::domain::FolderTree;
use crate::errors::ShelfResult;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::FolderRepository;

/// Stores each user's tree as its JSON wire form in a single row.
pub struct SqliteFolderRepository {
    storage: SqliteStorage,
}

impl SqliteFolderRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl FolderRepository for SqliteFolderRepository {
    fn get(&self, user_id: i64) -> ShelfResult<Option<FolderTree>> {
        let raw: Option<String> = {
            let conn = self.storage.connection()?;
            conn.query_row(
                "SELECT folders FROM folders WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?
        };

        raw.map(|json| FolderTree::decode(&json)).transpose()
    }

    fn save(&self, user_id: i64, tree: &FolderTree) -> ShelfResult<()> {
        let encoded = tree.encode()?;
        let conn = self.storage.connection()?;
        conn.execute(
            "INSERT INTO folders (user_id, folders) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET folders = excluded.folders",
            (user_id, &encoded),
        )?;
        Ok(())
    }

    fn delete(&self, user_id: i64) -> ShelfResult<()> {
        let conn = self.storage.connection()?;
        conn.execute("DELETE FROM folders WHERE user_id = ?1", [user_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FolderNode;
    use crate::storage::sqlite::SqliteUserRepository;
    use crate::storage::traits::UserRepository;

    #[test]
    fn test_save_get_delete() {
        let storage = SqliteStorage::in_memory().unwrap();
        let user = SqliteUserRepository::new(storage.clone()).create("reader", false).unwrap();
        let repo = SqliteFolderRepository::new(storage);

        assert!(repo.get(user.id).unwrap().is_none());

        let tree = FolderTree(vec![
            FolderNode::Feed(3),
            FolderNode::folder("News", vec![FolderNode::Feed(1)]),
        ]);
        repo.save(user.id, &tree).unwrap();
        assert_eq!(repo.get(user.id).unwrap(), Some(tree));

        let replacement = FolderTree(vec![FolderNode::Feed(7)]);
        repo.save(user.id, &replacement).unwrap();
        assert_eq!(repo.get(user.id).unwrap(), Some(replacement));

        repo.delete(user.id).unwrap();
        assert!(repo.get(user.id).unwrap().is_none());
    }
}
