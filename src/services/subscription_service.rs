use chrono::Utc;

use crate::domain::{Feed, FolderTree, NewSubscription, Subscription, User};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::{FolderRepository, SubscriptionRepository};

/// Owns the per-user state an import replaces: subscriptions and the folder tree.
pub struct SubscriptionManager<S: SubscriptionRepository, D: FolderRepository> {
    subscriptions: S,
    folders: D,
}

impl<S: SubscriptionRepository, D: FolderRepository> SubscriptionManager<S, D> {
    pub fn new(subscriptions: S, folders: D) -> Self {
        Self {
            subscriptions,
            folders,
        }
    }

    /// Get or create the user's subscription to `feed`.
    ///
    /// New subscriptions start with an unread recount pending, everything
    /// older than a day marked read and `active` mirroring the user's premium
    /// status. Premium users also get an existing inactive subscription
    /// switched on, so calling this repeatedly is safe.
    pub fn ensure_subscription(&self, user: &User, feed: &Feed) -> ShelfResult<Subscription> {
        let new = NewSubscription::new(user.id, feed.id, user.is_premium, Utc::now());
        let (mut sub, created) = self.subscriptions.get_or_create(&new)?;

        if created {
            tracing::debug!(user = %user, feed_id = feed.id, "Created subscription");
        }

        if user.is_premium && !sub.active {
            self.subscriptions.set_active(sub.id, true)?;
            sub.active = true;
        }

        Ok(sub)
    }

    /// Delete every subscription and the folder tree of `user`.
    pub fn clear_all(&self, user: &User) -> ShelfResult<()> {
        let removed = self.subscriptions.delete_all_for_user(user.id)?;
        self.folders.delete(user.id)?;
        tracing::info!(user = %user, removed, "Cleared subscriptions and folders");
        Ok(())
    }

    pub fn subscription(&self, user: &User, feed_id: i64) -> ShelfResult<Subscription> {
        self.subscriptions
            .get(user.id, feed_id)?
            .ok_or_else(|| ShelfError::SubscriptionNotFound(format!("{} -> {}", user, feed_id)))
    }

    pub fn list(&self, user: &User) -> ShelfResult<Vec<Subscription>> {
        self.subscriptions.list_for_user(user.id)
    }

    pub fn tree(&self, user: &User) -> ShelfResult<FolderTree> {
        Ok(self.folders.get(user.id)?.unwrap_or_default())
    }

    pub fn save_tree(&self, user: &User, tree: &FolderTree) -> ShelfResult<()> {
        self.folders.save(user.id, tree)
    }

    /// Set (or clear, with a blank title) the user's display title for a feed.
    pub fn rename_feed(&self, user: &User, feed_id: i64, title: &str) -> ShelfResult<()> {
        let sub = self.subscription(user, feed_id)?;
        let title = Some(title.trim().to_string()).filter(|t| !t.is_empty());
        self.subscriptions.set_user_title(sub.id, title)
    }

    /// Remove the subscriptions for any of `feed_ids` that `tree` no longer references.
    pub fn drop_unreferenced(&self, user: &User, tree: &FolderTree, feed_ids: &[i64]) -> ShelfResult<usize> {
        let referenced = tree.feed_ids();
        let mut dropped = 0;
        for feed_id in feed_ids {
            if referenced.contains(feed_id) {
                continue;
            }
            if let Some(sub) = self.subscriptions.get(user.id, *feed_id)? {
                self.subscriptions.delete(sub.id)?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }

    pub fn activate_all(&self, user: &User) -> ShelfResult<usize> {
        self.subscriptions.activate_all_for_user(user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FolderNode;
    use crate::storage::sqlite::{
        SqliteFeedRepository, SqliteFolderRepository, SqliteStorage, SqliteSubscriptionRepository,
        SqliteUserRepository,
    };
    use crate::storage::traits::{FeedRepository, UserRepository};
    use crate::domain::NewFeed;

    type Manager = SubscriptionManager<SqliteSubscriptionRepository, SqliteFolderRepository>;

    fn setup() -> (Manager, SqliteStorage) {
        let storage = SqliteStorage::in_memory().unwrap();
        let manager = SubscriptionManager::new(
            SqliteSubscriptionRepository::new(storage.clone()),
            SqliteFolderRepository::new(storage.clone()),
        );
        (manager, storage)
    }

    fn feed(storage: &SqliteStorage, address: &str) -> Feed {
        SqliteFeedRepository::new(storage.clone())
            .get_or_create(&NewFeed::new(address.to_string(), None, address.to_string()))
            .unwrap()
    }

    fn user(storage: &SqliteStorage, premium: bool) -> User {
        SqliteUserRepository::new(storage.clone())
            .create(if premium { "premium" } else { "free" }, premium)
            .unwrap()
    }

    #[test]
    fn test_new_subscription_defaults_follow_premium_flag() {
        let (manager, storage) = setup();
        let feed = feed(&storage, "http://a.example/");

        let free = manager.ensure_subscription(&user(&storage, false), &feed).unwrap();
        assert!(!free.active);
        assert!(free.needs_unread_recalc);
        assert!(free.mark_read_date < Utc::now() - chrono::Duration::hours(23));

        let premium = manager.ensure_subscription(&user(&storage, true), &feed).unwrap();
        assert!(premium.active);
    }

    #[test]
    fn test_premium_promotion_is_idempotent() {
        let (manager, storage) = setup();
        let feed = feed(&storage, "http://a.example/");
        let mut reader = user(&storage, false);

        let inactive = manager.ensure_subscription(&reader, &feed).unwrap();
        assert!(!inactive.active);

        reader.is_premium = true;
        let first = manager.ensure_subscription(&reader, &feed).unwrap();
        let second = manager.ensure_subscription(&reader, &feed).unwrap();

        assert!(first.active);
        assert!(second.active);
        assert_eq!(first.id, second.id);
        assert_eq!(first.mark_read_date, inactive.mark_read_date);
        assert_eq!(manager.list(&reader).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_all_removes_subscriptions_and_tree() {
        let (manager, storage) = setup();
        let feed = feed(&storage, "http://a.example/");
        let reader = user(&storage, false);
        manager.ensure_subscription(&reader, &feed).unwrap();
        manager
            .save_tree(&reader, &FolderTree(vec![FolderNode::Feed(feed.id)]))
            .unwrap();

        manager.clear_all(&reader).unwrap();

        assert!(manager.list(&reader).unwrap().is_empty());
        assert!(manager.tree(&reader).unwrap().is_empty());
    }

    #[test]
    fn test_rename_feed_sets_and_clears_title() {
        let (manager, storage) = setup();
        let feed = feed(&storage, "http://a.example/");
        let reader = user(&storage, false);
        manager.ensure_subscription(&reader, &feed).unwrap();

        manager.rename_feed(&reader, feed.id, "My Feed").unwrap();
        assert_eq!(
            manager.subscription(&reader, feed.id).unwrap().user_title.as_deref(),
            Some("My Feed")
        );

        manager.rename_feed(&reader, feed.id, "  ").unwrap();
        assert_eq!(manager.subscription(&reader, feed.id).unwrap().user_title, None);
        assert!(matches!(
            manager.rename_feed(&reader, 999, "x"),
            Err(ShelfError::SubscriptionNotFound(_))
        ));
    }
}
