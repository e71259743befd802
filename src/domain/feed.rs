use serde::{Deserialize, Serialize};

/// A registry entry, shared by every subscriber. Identity is the normalized
/// feed address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub feed_address: String,
    pub feed_link: Option<String>,
    pub feed_title: String,
    pub num_subscribers: i64,
    pub active_subscribers: i64,
    pub premium_subscribers: i64,
    pub active: bool,
    pub has_feed_exception: bool,
    pub has_page_exception: bool,
    pub fetched_once: bool,
    /// Set once this entry has been folded into another feed.
    pub merged_into: Option<i64>,
    pub created_at: Option<String>,
}

impl Feed {
    pub fn has_exception(&self) -> bool {
        self.has_feed_exception || self.has_page_exception
    }

    pub fn counts(&self) -> SubscriberCounts {
        SubscriberCounts {
            total: self.num_subscribers,
            active: self.active_subscribers,
            premium: self.premium_subscribers,
        }
    }
}

/// Values used to create a feed the first time its address is seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    pub feed_address: String,
    pub feed_link: Option<String>,
    pub feed_title: String,
}

impl NewFeed {
    pub fn new(feed_address: String, feed_link: Option<String>, feed_title: String) -> Self {
        Self {
            feed_address,
            feed_link,
            feed_title,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberCounts {
    pub total: i64,
    pub active: i64,
    pub premium: i64,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub feeds: i64,
    pub subscriptions: i64,
    pub duplicate_feeds: i64,
    pub exception_feeds: i64,
    pub exception_pages: i64,
    pub inactive_feeds: i64,
    pub active_feeds: i64,
}
