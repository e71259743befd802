use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stories published before `now - MARK_READ_WINDOW` start out read for a new
/// subscriber.
pub const MARK_READ_WINDOW_DAYS: i64 = 1;

/// A user's relationship to one feed. At most one exists per (user, feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub active: bool,
    pub mark_read_date: DateTime<Utc>,
    pub last_read_date: Option<DateTime<Utc>>,
    pub needs_unread_recalc: bool,
    pub user_title: Option<String>,
    pub feed_opens: i64,
    pub is_trained: bool,
}

/// Defaults applied when a subscription is first created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubscription {
    pub user_id: i64,
    pub feed_id: i64,
    pub active: bool,
    pub mark_read_date: DateTime<Utc>,
    pub needs_unread_recalc: bool,
}

impl NewSubscription {
    pub fn new(user_id: i64, feed_id: i64, active: bool, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            feed_id,
            active,
            mark_read_date: now - Duration::days(MARK_READ_WINDOW_DAYS),
            needs_unread_recalc: true,
        }
    }
}
