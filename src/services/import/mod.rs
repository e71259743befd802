//! Full-replace importers for the three supported subscription list formats.
//!
//! Every import first clears the user's subscriptions and folders, then walks
//! its document in order, running each entry through the registry and the
//! subscription manager and filing the resulting feed id in a new tree.
//! Entries whose address cannot be normalized or exceeds a column limit are
//! skipped and reported; anything wrong with the document as a whole aborts
//! the import, leaving the user with the cleared (empty) state.

mod fever;
mod google_reader;
mod outline;

pub use fever::{
    fever_api_key, FeverApi, FeverFeed, FeverFeedsGroup, FeverGroup, FeverPayload, HttpFeverClient,
    FEVER_API_VERSION, ORPHANED_CATEGORY, SPARKS_CATEGORY,
};
pub use google_reader::ROOT_CATEGORY;

use crate::domain::{FolderTree, User};
use crate::errors::ShelfResult;
use crate::services::registry_service::FeedRegistry;
use crate::services::subscription_service::SubscriptionManager;
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};

/// An entry left out of the import and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub address: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// Feed ids in the order they were filed, duplicates included.
    pub feed_ids: Vec<i64>,
    pub skipped: Vec<SkippedItem>,
    pub tree: FolderTree,
}

pub struct Importer<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    registry: FeedRegistry<F>,
    manager: SubscriptionManager<S, D>,
}

impl<F, S, D> Importer<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    pub fn new(registry: FeedRegistry<F>, manager: SubscriptionManager<S, D>) -> Self {
        Self { registry, manager }
    }

    /// Resolve one entry and subscribe the user to it. Returns `None` when
    /// the entry was skipped.
    fn import_item(
        &self,
        user: &User,
        address: &str,
        link: Option<&str>,
        title: Option<&str>,
        summary: &mut ImportSummary,
    ) -> ShelfResult<Option<i64>> {
        let feed = match self.registry.resolve_or_create(address, link, title) {
            Ok(feed) => feed,
            Err(e) if e.is_item_level() => {
                tracing::warn!(user = %user, address, error = %e, "Skipping import entry");
                summary.skipped.push(SkippedItem {
                    address: address.to_string(),
                    reason: e.to_string(),
                });
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.manager.ensure_subscription(user, &feed)?;
        summary.feed_ids.push(feed.id);
        Ok(Some(feed.id))
    }

    fn skip(&self, user: &User, summary: &mut ImportSummary, address: &str, reason: &str) {
        tracing::warn!(user = %user, address, reason, "Skipping import entry");
        summary.skipped.push(SkippedItem {
            address: address.to_string(),
            reason: reason.to_string(),
        });
    }

    fn finish(&self, user: &User, mut summary: ImportSummary, tree: FolderTree) -> ShelfResult<ImportSummary> {
        self.manager.save_tree(user, &tree)?;
        tracing::info!(
            user = %user,
            feeds = summary.feed_ids.len(),
            skipped = summary.skipped.len(),
            "Import complete"
        );
        summary.tree = tree;
        Ok(summary)
    }
}

/// Groups feed ids by category label, keeping labels in first-seen order.
#[derive(Debug, Default)]
struct CategoryGroups {
    groups: Vec<(String, Vec<i64>)>,
}

impl CategoryGroups {
    fn push(&mut self, category: &str, feed_id: i64) {
        match self.groups.iter_mut().find(|(name, _)| name == category) {
            Some((_, ids)) => ids.push(feed_id),
            None => self.groups.push((category.to_string(), vec![feed_id])),
        }
    }

    fn into_groups(self) -> Vec<(String, Vec<i64>)> {
        self.groups
    }
}
