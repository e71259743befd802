use crate::domain::User;
use crate::errors::ShelfResult;
use crate::storage::traits::{FetchQueue, SubscriptionRepository};

/// Split `ids` into consecutive groups of at most `size` (at least one per group).
pub fn batch_ids(ids: &[i64], size: usize) -> Vec<Vec<i64>> {
    ids.chunks(size.max(1)).map(<[i64]>::to_vec).collect()
}

/// Requests a first fetch for feeds a user just subscribed to.
pub struct QueueService<S: SubscriptionRepository, Q: FetchQueue> {
    subscriptions: S,
    queue: Q,
    batch_size: usize,
}

impl<S: SubscriptionRepository, Q: FetchQueue> QueueService<S, Q> {
    pub fn new(subscriptions: S, queue: Q, batch_size: usize) -> Self {
        Self {
            subscriptions,
            queue,
            batch_size,
        }
    }

    /// Submit every never-fetched feed the user actively follows, in batches.
    ///
    /// A batch that fails to submit is logged and skipped. Returns how many
    /// feed ids were handed to the queue.
    pub fn queue_new_feeds(&self, user: &User) -> ShelfResult<usize> {
        let ids = self.subscriptions.unfetched_active_feed_ids(user.id)?;
        if ids.is_empty() {
            tracing::debug!(user = %user, "No new feeds to fetch");
            return Ok(0);
        }

        let mut queued = 0;
        for batch in batch_ids(&ids, self.batch_size) {
            match self.queue.enqueue(&batch) {
                Ok(()) => queued += batch.len(),
                Err(e) => tracing::warn!(user = %user, ?batch, error = %e, "Failed to queue feeds"),
            }
        }

        tracing::info!(user = %user, queued, total = ids.len(), "Queued new feeds for fetching");
        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ShelfError;
    use crate::storage::traits::{MockFetchQueue, MockSubscriptionRepository};

    fn user() -> User {
        User {
            id: 7,
            username: "reader".to_string(),
            is_premium: true,
        }
    }

    #[test]
    fn test_batch_ids() {
        assert_eq!(
            batch_ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9], 4),
            vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9]]
        );
        assert_eq!(batch_ids(&[1, 2], 4), vec![vec![1, 2]]);
        assert!(batch_ids(&[], 4).is_empty());
        assert_eq!(batch_ids(&[1, 2], 0), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_failed_batch_does_not_stop_later_batches() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_unfetched_active_feed_ids()
            .withf(|user_id| *user_id == 7)
            .returning(|_| Ok(vec![1, 2, 3, 4, 5]));

        let mut queue = MockFetchQueue::new();
        queue
            .expect_enqueue()
            .withf(|ids| ids == [1, 2])
            .times(1)
            .returning(|_| Err(ShelfError::RemoteApi("queue offline".to_string())));
        queue
            .expect_enqueue()
            .withf(|ids| ids == [3, 4] || ids == [5])
            .times(2)
            .returning(|_| Ok(()));

        let service = QueueService::new(subscriptions, queue, 2);
        assert_eq!(service.queue_new_feeds(&user()).unwrap(), 3);
    }

    #[test]
    fn test_nothing_to_queue() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_unfetched_active_feed_ids()
            .returning(|_| Ok(Vec::new()));
        let mut queue = MockFetchQueue::new();
        queue.expect_enqueue().never();

        let service = QueueService::new(subscriptions, queue, 4);
        assert_eq!(service.queue_new_feeds(&user()).unwrap(), 0);
    }
}
