use std::collections::BTreeMap;

use crate::domain::{Feed, FolderTree, User};
use crate::errors::{ShelfError, ShelfResult};
use crate::services::registry_service::FeedRegistry;
use crate::services::subscription_service::SubscriptionManager;
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};

/// Interactive edits to a single user's subscriptions and folder tree.
pub struct FolderService<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    registry: FeedRegistry<F>,
    manager: SubscriptionManager<S, D>,
}

impl<F, S, D> FolderService<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    pub fn new(registry: FeedRegistry<F>, manager: SubscriptionManager<S, D>) -> Self {
        Self { registry, manager }
    }

    pub fn tree(&self, user: &User) -> ShelfResult<FolderTree> {
        self.manager.tree(user)
    }

    pub fn flat_folders(&self, user: &User) -> ShelfResult<BTreeMap<String, Vec<i64>>> {
        Ok(self.manager.tree(user)?.flatten())
    }

    /// Subscribe `user` to a single feed address and file it under the
    /// top-level `folder` (the top level itself when empty).
    pub fn subscribe(&self, user: &User, url: &str, folder: &str) -> ShelfResult<Feed> {
        if url.trim().is_empty() {
            return Err(ShelfError::InvalidInput("URL is empty".to_string()));
        }
        tracing::info!(user = %user, url, folder, "Adding URL");

        let feed = self.registry.resolve_or_create(url, None, None)?;
        self.manager.ensure_subscription(user, &feed)?;

        let path = folder_path(folder);
        let mut tree = self.manager.tree(user)?;
        if !tree.contains_at(&path, feed.id) {
            tree.append_leaf(&path, feed.id);
            self.manager.save_tree(user, &tree)?;
        }

        Ok(feed)
    }

    pub fn add_folder(&self, user: &User, name: &str, parent: &str) -> ShelfResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShelfError::InvalidInput("folder name is empty".to_string()));
        }
        tracing::info!(user = %user, name, parent, "Adding folder");

        let mut tree = self.manager.tree(user)?;
        tree.append_folder(&folder_path(parent), name);
        self.manager.save_tree(user, &tree)
    }

    /// Rename folders called `old` inside `in_folder`. A blank new name is ignored.
    pub fn rename_folder(&self, user: &User, old: &str, new: &str, in_folder: &str) -> ShelfResult<bool> {
        let new = new.trim();
        if new.is_empty() {
            return Ok(false);
        }

        let mut tree = self.manager.tree(user)?;
        let renamed = tree.rename_folder(old, new, in_folder);
        if renamed {
            self.manager.save_tree(user, &tree)?;
        }
        Ok(renamed)
    }

    /// Delete folders called `name` inside `in_folder`. Feeds that are no longer
    /// filed anywhere are unsubscribed. Returns how many subscriptions went.
    pub fn delete_folder(&self, user: &User, name: &str, in_folder: &str) -> ShelfResult<usize> {
        let mut tree = self.manager.tree(user)?;
        let dropped = tree.remove_folder(name, in_folder);
        self.manager.save_tree(user, &tree)?;

        let removed = self.manager.drop_unreferenced(user, &tree, &dropped)?;
        tracing::info!(user = %user, name, in_folder, removed, "Deleted folder");
        Ok(removed)
    }

    /// Remove one feed reference. The subscription only goes when the feed
    /// is not filed anywhere else.
    pub fn delete_feed(&self, user: &User, feed_id: i64, in_folder: &str) -> ShelfResult<bool> {
        let mut tree = self.manager.tree(user)?;
        if !tree.remove_feed(feed_id, in_folder) {
            return Ok(false);
        }
        self.manager.save_tree(user, &tree)?;
        self.manager.drop_unreferenced(user, &tree, &[feed_id])?;
        Ok(true)
    }

    pub fn rename_feed(&self, user: &User, feed_id: i64, title: &str) -> ShelfResult<()> {
        tracing::info!(user = %user, feed_id, title, "Renaming feed");
        self.manager.rename_feed(user, feed_id, title)
    }

    /// Replace the tree with a client-submitted arrangement in wire form.
    pub fn save_feed_order(&self, user: &User, raw: &str) -> ShelfResult<FolderTree> {
        let tree = FolderTree::decode(raw)?;

        let subscribed: Vec<i64> = self.manager.list(user)?.iter().map(|s| s.feed_id).collect();
        if let Some(unknown) = tree.feed_ids().into_iter().find(|id| !subscribed.contains(id)) {
            return Err(ShelfError::InvalidInput(format!(
                "feed {} is not subscribed",
                unknown
            )));
        }

        tracing::info!(user = %user, entries = tree.nodes().len(), "Feed re-ordering");
        self.manager.save_tree(user, &tree)?;
        Ok(tree)
    }
}

fn folder_path(folder: &str) -> Vec<&str> {
    let folder = folder.trim();
    if folder.is_empty() {
        Vec::new()
    } else {
        vec![folder]
    }
}
