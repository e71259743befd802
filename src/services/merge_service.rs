use crate::domain::Feed;
use crate::errors::{ShelfError, ShelfResult};
use crate::services::registry_service::FeedRegistry;
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};
use crate::urlnorm;

/// What a merge changed. All zero with `already_merged` set on a repeat call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub already_merged: bool,
    pub redirects_repointed: usize,
    pub subscriptions_moved: usize,
    pub subscriptions_dropped: usize,
    pub trees_updated: usize,
    pub counters_absorbed: bool,
}

/// Folds one registry entry into another.
///
/// Each step is safe to repeat, so a merge interrupted part way is finished
/// by running it again with the same pair.
pub struct MergeService<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    registry: FeedRegistry<F>,
    subscriptions: S,
    folders: D,
}

impl<F, S, D> MergeService<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    pub fn new(registry: FeedRegistry<F>, subscriptions: S, folders: D) -> Self {
        Self {
            registry,
            subscriptions,
            folders,
        }
    }

    pub fn merge(&self, losing_id: i64, winning_id: i64) -> ShelfResult<MergeReport> {
        if losing_id == winning_id {
            return Err(ShelfError::InvalidInput(format!(
                "cannot merge feed {} into itself",
                losing_id
            )));
        }

        let loser = self.registry.get(losing_id)?;
        let winner = self.registry.get(winning_id)?;
        let feeds = self.registry.repository();

        let redirected = feeds
            .find_duplicate(&loser.feed_address)?
            .map(|feed| feed.id == winner.id)
            .unwrap_or(false);
        if redirected && loser.merged_into == Some(winner.id) {
            tracing::debug!(losing_id, winning_id, "Feeds already merged");
            return Ok(MergeReport {
                already_merged: true,
                ..MergeReport::default()
            });
        }

        if let Some(target) = loser.merged_into.filter(|target| *target != winner.id) {
            return Err(ShelfError::InvalidInput(format!(
                "feed {} was already merged into {}",
                loser.id, target
            )));
        }
        if let Some(target) = winner.merged_into {
            return Err(ShelfError::InvalidInput(format!(
                "feed {} was itself merged into {}",
                winner.id, target
            )));
        }

        tracing::info!(
            losing_id,
            winning_id,
            losing = %loser.feed_address,
            winning = %winner.feed_address,
            "Merging feeds"
        );

        let mut report = MergeReport::default();

        // Redirects: the loser's address and everything that already pointed at it
        feeds.record_duplicate(&loser.feed_address, winner.id)?;
        report.redirects_repointed = feeds.repoint_duplicates(loser.id, winner.id)?;

        // Subscriptions
        let mut affected_users = Vec::new();
        for sub in self.subscriptions.list_for_feed(loser.id)? {
            affected_users.push(sub.user_id);
            if self.subscriptions.get(sub.user_id, winner.id)?.is_some() {
                self.subscriptions.delete(sub.id)?;
                report.subscriptions_dropped += 1;
            } else {
                self.subscriptions.repoint(sub.id, winner.id)?;
                report.subscriptions_moved += 1;
            }
        }

        // Folder trees. A retry after the subscriptions moved still finds
        // the users through their winner subscription.
        for sub in self.subscriptions.list_for_feed(winner.id)? {
            affected_users.push(sub.user_id);
        }
        affected_users.sort_unstable();
        affected_users.dedup();
        for user_id in affected_users {
            if let Some(mut tree) = self.folders.get(user_id)? {
                if tree.replace_feed(loser.id, winner.id) > 0 {
                    self.folders.save(user_id, &tree)?;
                    report.trees_updated += 1;
                }
            }
        }

        report.counters_absorbed = feeds.absorb(loser.id, winner.id, loser.counts())?;

        tracing::info!(
            losing_id,
            winning_id,
            moved = report.subscriptions_moved,
            dropped = report.subscriptions_dropped,
            trees = report.trees_updated,
            "Merged feeds"
        );
        Ok(report)
    }

    /// Point a broken feed at a corrected address.
    ///
    /// Only feeds flagged with a feed or page exception may be corrected.
    /// When the new address already belongs to another feed the corrected
    /// feed is merged into it, and the survivor is returned.
    pub fn change_feed_address(&self, feed_id: i64, new_address: &str) -> ShelfResult<Feed> {
        let feed = self.registry.get(feed_id)?;
        if !feed.has_exception() {
            return Err(ShelfError::AddressChangeRejected(format!(
                "feed {} has no feed or page exception",
                feed_id
            )));
        }

        let address = urlnorm::normalize(new_address)?;
        let feeds = self.registry.repository();

        // A redirect back to this feed does not rule out a row owning the address
        let owner = match self.registry.lookup(&address)? {
            Some(found) if found.id == feed.id => feeds.get_by_address(&address)?,
            other => other,
        };

        match owner {
            Some(existing) if existing.id != feed.id => {
                tracing::info!(feed_id, existing_id = existing.id, %address, "Corrected address already registered");
                feeds.reset_exceptions(feed.id, None)?;
                self.merge(feed.id, existing.id)?;
                self.registry.get(existing.id)
            }
            _ => {
                tracing::info!(feed_id, old = %feed.feed_address, new = %address, "Changing feed address");
                feeds.reset_exceptions(feed.id, Some(address.clone()))?;
                if address != feed.feed_address {
                    feeds.record_duplicate(&feed.feed_address, feed.id)?;
                }
                self.registry.get(feed.id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FolderNode, FolderTree, NewFeed, NewSubscription, User};
    use crate::storage::sqlite::{
        SqliteFeedRepository, SqliteFolderRepository, SqliteStorage, SqliteSubscriptionRepository,
        SqliteUserRepository,
    };
    use crate::storage::traits::UserRepository;
    use chrono::Utc;

    type Service = MergeService<SqliteFeedRepository, SqliteSubscriptionRepository, SqliteFolderRepository>;

    struct Fixture {
        service: Service,
        storage: SqliteStorage,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = SqliteStorage::in_memory().unwrap();
            let service = MergeService::new(
                FeedRegistry::new(SqliteFeedRepository::new(storage.clone())),
                SqliteSubscriptionRepository::new(storage.clone()),
                SqliteFolderRepository::new(storage.clone()),
            );
            Self { service, storage }
        }

        fn feed(&self, address: &str) -> Feed {
            SqliteFeedRepository::new(self.storage.clone())
                .get_or_create(&NewFeed::new(address.to_string(), None, address.to_string()))
                .unwrap()
        }

        fn user(&self, name: &str) -> User {
            SqliteUserRepository::new(self.storage.clone()).create(name, false).unwrap()
        }

        fn subscribe(&self, user: &User, feed: &Feed) {
            SqliteSubscriptionRepository::new(self.storage.clone())
                .get_or_create(&NewSubscription::new(user.id, feed.id, true, Utc::now()))
                .unwrap();
        }

        fn save_tree(&self, user: &User, tree: &FolderTree) {
            SqliteFolderRepository::new(self.storage.clone()).save(user.id, tree).unwrap();
        }

        fn tree(&self, user: &User) -> FolderTree {
            SqliteFolderRepository::new(self.storage.clone()).get(user.id).unwrap().unwrap()
        }

        fn subscribed_feeds(&self, user: &User) -> Vec<i64> {
            SqliteSubscriptionRepository::new(self.storage.clone())
                .list_for_user(user.id)
                .unwrap()
                .into_iter()
                .map(|s| s.feed_id)
                .collect()
        }

        fn flag_exception(&self, feed: &Feed) {
            self.storage
                .connection()
                .unwrap()
                .execute("UPDATE feeds SET has_feed_exception = 1 WHERE id = ?1", [feed.id])
                .unwrap();
        }
    }

    #[test]
    fn test_merge_consolidates_subscriptions_and_trees() {
        let fx = Fixture::new();
        let a = fx.feed("http://a.example/rss");
        let b = fx.feed("http://b.example/rss");
        let both = fx.user("both");
        let only_a = fx.user("only-a");

        fx.subscribe(&both, &a);
        fx.subscribe(&both, &b);
        fx.subscribe(&only_a, &a);
        fx.save_tree(
            &both,
            &FolderTree(vec![
                FolderNode::Feed(a.id),
                FolderNode::folder("x", vec![FolderNode::Feed(b.id), FolderNode::folder("y", vec![FolderNode::Feed(a.id)])]),
            ]),
        );
        fx.save_tree(&only_a, &FolderTree(vec![FolderNode::Feed(a.id)]));

        let report = fx.service.merge(a.id, b.id).unwrap();
        assert_eq!(report.subscriptions_dropped, 1);
        assert_eq!(report.subscriptions_moved, 1);
        assert_eq!(report.trees_updated, 2);
        assert!(report.counters_absorbed);

        assert_eq!(fx.subscribed_feeds(&both), vec![b.id]);
        assert_eq!(fx.subscribed_feeds(&only_a), vec![b.id]);
        assert_eq!(fx.tree(&both).feed_ids(), vec![b.id, b.id, b.id]);
        assert_eq!(fx.tree(&only_a), FolderTree(vec![FolderNode::Feed(b.id)]));

        let registry = FeedRegistry::new(SqliteFeedRepository::new(fx.storage.clone()));
        assert_eq!(registry.lookup("http://a.example/rss").unwrap().unwrap().id, b.id);
        let winner = registry.get(b.id).unwrap();
        assert_eq!(winner.num_subscribers, 2);
        assert_eq!(registry.get(a.id).unwrap().merged_into, Some(b.id));
    }

    #[test]
    fn test_repeat_merge_is_a_no_op() {
        let fx = Fixture::new();
        let a = fx.feed("http://a.example/rss");
        let b = fx.feed("http://b.example/rss");
        let reader = fx.user("reader");
        fx.subscribe(&reader, &a);

        fx.service.merge(a.id, b.id).unwrap();
        let counters = fx.service.registry.get(b.id).unwrap().counts();

        let again = fx.service.merge(a.id, b.id).unwrap();
        assert!(again.already_merged);
        assert_eq!(fx.service.registry.get(b.id).unwrap().counts(), counters);
        assert_eq!(fx.subscribed_feeds(&reader), vec![b.id]);
    }

    #[test]
    fn test_interrupted_merge_completes_on_retry() {
        let fx = Fixture::new();
        let a = fx.feed("http://a.example/rss");
        let b = fx.feed("http://b.example/rss");
        let reader = fx.user("reader");
        fx.subscribe(&reader, &a);
        fx.save_tree(&reader, &FolderTree(vec![FolderNode::Feed(a.id)]));

        // Redirect and subscription moved, tree and counters not yet
        let feeds = SqliteFeedRepository::new(fx.storage.clone());
        feeds.record_duplicate(&a.feed_address, b.id).unwrap();
        let subs = SqliteSubscriptionRepository::new(fx.storage.clone());
        let sub = subs.get(reader.id, a.id).unwrap().unwrap();
        subs.repoint(sub.id, b.id).unwrap();

        let report = fx.service.merge(a.id, b.id).unwrap();
        assert!(!report.already_merged);
        assert_eq!(report.trees_updated, 1);
        assert_eq!(fx.tree(&reader), FolderTree(vec![FolderNode::Feed(b.id)]));
        assert_eq!(feeds.get_by_id(a.id).unwrap().unwrap().merged_into, Some(b.id));
    }

    #[test]
    fn test_merge_chains_existing_redirects() {
        let fx = Fixture::new();
        let a = fx.feed("http://a.example/rss");
        let b = fx.feed("http://b.example/rss");
        let c = fx.feed("http://c.example/rss");

        fx.service.merge(a.id, b.id).unwrap();
        fx.service.merge(b.id, c.id).unwrap();

        let registry = &fx.service.registry;
        assert_eq!(registry.lookup("http://a.example/rss").unwrap().unwrap().id, c.id);
        assert_eq!(registry.lookup("http://b.example/rss").unwrap().unwrap().id, c.id);
    }

    #[test]
    fn test_merge_rejects_bad_pairs() {
        let fx = Fixture::new();
        let a = fx.feed("http://a.example/rss");
        let b = fx.feed("http://b.example/rss");
        let c = fx.feed("http://c.example/rss");

        assert!(matches!(fx.service.merge(a.id, a.id), Err(ShelfError::InvalidInput(_))));
        assert!(matches!(fx.service.merge(a.id, 999), Err(ShelfError::FeedNotFound(_))));

        fx.service.merge(a.id, b.id).unwrap();
        assert!(matches!(fx.service.merge(a.id, c.id), Err(ShelfError::InvalidInput(_))));
        assert!(matches!(fx.service.merge(c.id, a.id), Err(ShelfError::InvalidInput(_))));
    }

    #[test]
    fn test_change_address_requires_exception() {
        let fx = Fixture::new();
        let feed = fx.feed("http://broken.example/rss");

        assert!(matches!(
            fx.service.change_feed_address(feed.id, "http://fixed.example/rss"),
            Err(ShelfError::AddressChangeRejected(_))
        ));

        fx.flag_exception(&feed);
        let fixed = fx.service.change_feed_address(feed.id, "fixed.example/rss").unwrap();
        assert_eq!(fixed.id, feed.id);
        assert_eq!(fixed.feed_address, "http://fixed.example/rss");
        assert!(!fixed.has_exception());
        assert!(!fixed.fetched_once);
        assert_eq!(
            fx.service.registry.lookup("http://broken.example/rss").unwrap().unwrap().id,
            feed.id
        );
    }

    #[test]
    fn test_change_address_onto_existing_feed_merges() {
        let fx = Fixture::new();
        let broken = fx.feed("http://broken.example/rss");
        let existing = fx.feed("http://existing.example/rss");
        let reader = fx.user("reader");
        fx.subscribe(&reader, &broken);
        fx.save_tree(&reader, &FolderTree(vec![FolderNode::Feed(broken.id)]));
        fx.flag_exception(&broken);

        let survivor = fx
            .service
            .change_feed_address(broken.id, "http://EXISTING.example/rss")
            .unwrap();

        assert_eq!(survivor.id, existing.id);
        assert_eq!(fx.subscribed_feeds(&reader), vec![existing.id]);
        assert_eq!(fx.tree(&reader), FolderTree(vec![FolderNode::Feed(existing.id)]));
    }
}
