use crate::config::{FEED_ADDRESS_MAX_LEN, FEED_LINK_MAX_LEN, FEED_TITLE_MAX_LEN};
use crate::domain::{Feed, NewFeed};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::FeedRepository;
use crate::urlnorm;

/// Apply the normalization and field-length policy shared by every entry
/// point that can create a feed.
///
/// The address must normalize and fit its column. A link that is blank or
/// unparseable is dropped, but one that parses and is too long makes the
/// whole feed unusable. A missing or blank title falls back to the link,
/// then the address, and is truncated rather than rejected.
pub fn prepare_feed(address: &str, link: Option<&str>, title: Option<&str>) -> ShelfResult<NewFeed> {
    let feed_address = urlnorm::normalize(address)?;
    let feed_link = urlnorm::normalize_optional(link);

    check_length("feed address", &feed_address, FEED_ADDRESS_MAX_LEN)?;
    if let Some(link) = &feed_link {
        check_length("feed link", link, FEED_LINK_MAX_LEN)?;
    }

    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .or_else(|| link.map(str::trim).filter(|l| !l.is_empty()))
        .unwrap_or_else(|| address.trim());

    Ok(NewFeed::new(
        feed_address,
        feed_link,
        truncate_chars(title, FEED_TITLE_MAX_LEN),
    ))
}

fn check_length(field: &'static str, value: &str, max: usize) -> ShelfResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(ShelfError::LengthLimitExceeded { field, len, max });
    }
    Ok(())
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((cut, _)) => value[..cut].to_string(),
        None => value.to_string(),
    }
}

/// Front door to the global feed catalog.
pub struct FeedRegistry<F: FeedRepository> {
    feeds: F,
}

impl<F: FeedRepository> FeedRegistry<F> {
    pub fn new(feeds: F) -> Self {
        Self { feeds }
    }

    pub fn repository(&self) -> &F {
        &self.feeds
    }

    /// Find the feed for an already-normalized address. Redirects win over a
    /// direct match so a known duplicate never resolves to the stale row.
    pub fn lookup(&self, normalized: &str) -> ShelfResult<Option<Feed>> {
        if let Some(feed) = self.feeds.find_duplicate(normalized)? {
            return Ok(Some(feed));
        }
        self.feeds.get_by_address(normalized)
    }

    /// Resolve a raw address to its registry entry, creating it when unseen.
    pub fn resolve_or_create(
        &self,
        address: &str,
        link: Option<&str>,
        title: Option<&str>,
    ) -> ShelfResult<Feed> {
        let new_feed = prepare_feed(address, link, title)?;

        if let Some(feed) = self.feeds.find_duplicate(&new_feed.feed_address)? {
            tracing::debug!(address = %new_feed.feed_address, feed_id = feed.id, "Address redirected to canonical feed");
            return Ok(feed);
        }

        let feed = self.feeds.get_or_create(&new_feed)?;
        Ok(feed)
    }

    pub fn get(&self, feed_id: i64) -> ShelfResult<Feed> {
        self.feeds
            .get_by_id(feed_id)?
            .ok_or_else(|| ShelfError::FeedNotFound(feed_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::{SqliteFeedRepository, SqliteStorage};
    use crate::storage::traits::MockFeedRepository;

    fn setup() -> FeedRegistry<SqliteFeedRepository> {
        FeedRegistry::new(SqliteFeedRepository::new(SqliteStorage::in_memory().unwrap()))
    }

    #[test]
    fn test_prepare_defaults_title_to_link_then_address() {
        let with_link = prepare_feed("example.com/rss", Some("http://example.com"), Some("  ")).unwrap();
        assert_eq!(with_link.feed_title, "http://example.com");
        assert_eq!(with_link.feed_link.as_deref(), Some("http://example.com/"));

        let bare = prepare_feed("example.com/rss", None, None).unwrap();
        assert_eq!(bare.feed_title, "example.com/rss");
        assert_eq!(bare.feed_address, "http://example.com/rss");
    }

    #[test]
    fn test_prepare_rejects_long_address_and_link() {
        let long_path = "a".repeat(FEED_ADDRESS_MAX_LEN);
        let address = format!("http://example.com/{}", long_path);
        assert!(matches!(
            prepare_feed(&address, None, None),
            Err(ShelfError::LengthLimitExceeded { field: "feed address", .. })
        ));

        let link = format!("http://example.com/{}", "b".repeat(FEED_LINK_MAX_LEN));
        assert!(matches!(
            prepare_feed("http://example.com/rss", Some(&link), None),
            Err(ShelfError::LengthLimitExceeded { field: "feed link", .. })
        ));
    }

    #[test]
    fn test_prepare_truncates_long_title() {
        let title = "é".repeat(FEED_TITLE_MAX_LEN + 20);
        let feed = prepare_feed("http://example.com/rss", None, Some(&title)).unwrap();
        assert_eq!(feed.feed_title.chars().count(), FEED_TITLE_MAX_LEN);
    }

    #[test]
    fn test_unparseable_link_is_dropped() {
        let feed = prepare_feed("http://example.com/rss", Some("http://"), Some("T")).unwrap();
        assert_eq!(feed.feed_link, None);
    }

    #[test]
    fn test_resolve_or_create_dedups_equivalent_addresses() {
        let registry = setup();
        let a = registry.resolve_or_create("HTTP://Example.com:80/rss", None, Some("A")).unwrap();
        let b = registry.resolve_or_create("http://example.com/rss#x", None, Some("B")).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(b.feed_title, "A");
    }

    #[test]
    fn test_resolve_or_create_prefers_redirect() {
        let registry = setup();
        let canonical = registry.resolve_or_create("http://new.example/rss", None, None).unwrap();
        let stale = registry.resolve_or_create("http://old.example/rss", None, None).unwrap();
        registry
            .repository()
            .record_duplicate(&stale.feed_address, canonical.id)
            .unwrap();

        let resolved = registry.resolve_or_create("old.example/rss", None, None).unwrap();
        assert_eq!(resolved.id, canonical.id);
        assert_eq!(registry.lookup("http://old.example/rss").unwrap().unwrap().id, canonical.id);
    }

    #[test]
    fn test_resolve_or_create_never_creates_for_known_duplicate() {
        let mut feeds = MockFeedRepository::new();
        let canonical = Feed {
            id: 7,
            feed_address: "http://new.example/rss".to_string(),
            feed_link: None,
            feed_title: "New".to_string(),
            num_subscribers: 3,
            active_subscribers: 3,
            premium_subscribers: 0,
            active: true,
            has_feed_exception: false,
            has_page_exception: false,
            fetched_once: true,
            merged_into: None,
            created_at: None,
        };
        let returned = canonical.clone();
        feeds
            .expect_find_duplicate()
            .withf(|address| address.to_string() == "http://old.example/rss")
            .return_once(move |_| Ok(Some(returned)));
        feeds.expect_get_or_create().never();

        let registry = FeedRegistry::new(feeds);
        let resolved = registry.resolve_or_create("http://old.example/rss", None, None).unwrap();
        assert_eq!(resolved, canonical);
    }

    #[test]
    fn test_resolve_or_create_propagates_normalization_error() {
        let registry = setup();
        assert!(matches!(
            registry.resolve_or_create("   ", None, None),
            Err(ShelfError::Normalization(_))
        ));
    }
}
