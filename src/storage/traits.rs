use crate::domain::{
    Feed, FolderTree, NewFeed, NewSubscription, RegistryStats, SubscriberCounts, Subscription,
    User,
};
use crate::errors::ShelfResult;

/// The global feed catalog plus its duplicate-address redirects.
#[cfg_attr(test, mockall::automock)]
pub trait FeedRepository: Send + Sync {
    fn get_by_id(&self, id: i64) -> ShelfResult<Option<Feed>>;
    fn get_by_address(&self, address: &str) -> ShelfResult<Option<Feed>>;
    /// Insert unless the address already exists, then return the stored row.
    /// Concurrent callers converge on a single row through the unique address.
    fn get_or_create(&self, feed: &NewFeed) -> ShelfResult<Feed>;
    /// Canonical feed for an address recorded as a duplicate.
    fn find_duplicate(&self, address: &str) -> ShelfResult<Option<Feed>>;
    fn record_duplicate(&self, address: &str, feed_id: i64) -> ShelfResult<()>;
    /// Point every redirect that targets `from_feed` at `to_feed`.
    fn repoint_duplicates(&self, from_feed: i64, to_feed: i64) -> ShelfResult<usize>;
    /// Clear exception state and optionally move the feed to a new address.
    fn reset_exceptions(&self, feed_id: i64, new_address: Option<String>) -> ShelfResult<()>;
    /// Add `counts` to `winner` and stamp `loser` as merged, atomically.
    /// Returns false when `loser` was already stamped.
    fn absorb(&self, loser: i64, winner: i64, counts: SubscriberCounts) -> ShelfResult<bool>;
    fn stats(&self) -> ShelfResult<RegistryStats>;
}

#[cfg_attr(test, mockall::automock)]
pub trait SubscriptionRepository: Send + Sync {
    fn get(&self, user_id: i64, feed_id: i64) -> ShelfResult<Option<Subscription>>;
    /// Returns the stored subscription and whether this call created it.
    fn get_or_create(&self, new: &NewSubscription) -> ShelfResult<(Subscription, bool)>;
    fn set_active(&self, id: i64, active: bool) -> ShelfResult<()>;
    fn activate_all_for_user(&self, user_id: i64) -> ShelfResult<usize>;
    fn list_for_user(&self, user_id: i64) -> ShelfResult<Vec<Subscription>>;
    fn list_for_feed(&self, feed_id: i64) -> ShelfResult<Vec<Subscription>>;
    fn repoint(&self, id: i64, feed_id: i64) -> ShelfResult<()>;
    fn delete(&self, id: i64) -> ShelfResult<()>;
    fn delete_all_for_user(&self, user_id: i64) -> ShelfResult<usize>;
    fn set_user_title(&self, id: i64, title: Option<String>) -> ShelfResult<()>;
    /// Distinct ids of feeds the user actively follows that were never fetched.
    fn unfetched_active_feed_ids(&self, user_id: i64) -> ShelfResult<Vec<i64>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait FolderRepository: Send + Sync {
    fn get(&self, user_id: i64) -> ShelfResult<Option<FolderTree>>;
    fn save(&self, user_id: i64, tree: &FolderTree) -> ShelfResult<()>;
    fn delete(&self, user_id: i64) -> ShelfResult<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    fn create(&self, username: &str, is_premium: bool) -> ShelfResult<User>;
    fn get_by_id(&self, id: i64) -> ShelfResult<Option<User>>;
    fn get_by_username(&self, username: &str) -> ShelfResult<Option<User>>;
    fn set_premium(&self, id: i64, is_premium: bool) -> ShelfResult<()>;
}

/// Transport for "fetch these new feeds" requests. Delivery is at least once.
#[cfg_attr(test, mockall::automock)]
pub trait FetchQueue: Send + Sync {
    fn enqueue(&self, feed_ids: &[i64]) -> ShelfResult<()>;
}
