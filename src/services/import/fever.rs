use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{CategoryGroups, ImportSummary, Importer};
use crate::domain::{FolderNode, FolderTree, User};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};

/// The only response schema this importer understands.
pub const FEVER_API_VERSION: i64 = 2;
pub const SPARKS_CATEGORY: &str = "_Sparks";
pub const ORPHANED_CATEGORY: &str = "_Orphaned";

/// Source of a Fever `groups` + `feeds` response.
#[cfg_attr(test, mockall::automock)]
pub trait FeverApi: Send + Sync {
    fn groups_and_feeds(&self) -> ShelfResult<Value>;
}

/// `api_key` for a Fever account: md5 of `username:password`, hex encoded.
pub fn fever_api_key(username: &str, password: &str) -> String {
    hex::encode(Md5::digest(format!("{}:{}", username, password).as_bytes()))
}

pub struct HttpFeverClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpFeverClient {
    pub fn new(endpoint: &str, username: &str, password: &str, timeout: Duration) -> ShelfResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
            api_key: fever_api_key(username, password),
        })
    }
}

impl FeverApi for HttpFeverClient {
    fn groups_and_feeds(&self) -> ShelfResult<Value> {
        let url = format!("{}?api&groups&feeds", self.endpoint);
        let response = self
            .client
            .post(&url)
            .form(&[("api_key", self.api_key.as_str())])
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeverGroup {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeverFeed {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub is_spark: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeverFeedsGroup {
    pub group_id: i64,
    /// Comma-separated feed ids.
    pub feed_ids: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeverPayload {
    #[serde(default)]
    pub groups: Vec<FeverGroup>,
    /// Raw feed entries, decoded one by one so a bad entry only skips itself.
    #[serde(default)]
    pub feeds: Vec<Value>,
    #[serde(default)]
    pub feeds_groups: Vec<FeverFeedsGroup>,
}

impl FeverPayload {
    /// Folder a feed belongs in: sparks first, then its first group, else orphaned.
    pub fn category_for(&self, feed: &FeverFeed) -> &str {
        if feed.is_spark == 1 {
            return SPARKS_CATEGORY;
        }

        let feed_id = feed.id.to_string();
        self.feeds_groups
            .iter()
            .find(|membership| membership.feed_ids.split(',').any(|id| id.trim() == feed_id))
            .and_then(|membership| self.groups.iter().find(|g| g.id == membership.group_id))
            .map(|group| group.title.as_str())
            .unwrap_or(ORPHANED_CATEGORY)
    }
}

impl<F, S, D> Importer<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    /// Replace the user's subscriptions with the feeds of a Fever account.
    ///
    /// A response in any other schema version is ignored and yields an empty
    /// summary without touching the folder tree.
    pub fn import_fever(&self, user: &User, api: &dyn FeverApi) -> ShelfResult<ImportSummary> {
        self.manager.clear_all(user)?;

        let response = api.groups_and_feeds()?;
        let version = response.get("api_version").and_then(Value::as_i64);
        if version != Some(FEVER_API_VERSION) {
            tracing::info!(user = %user, ?version, "Unsupported Fever API version, nothing imported");
            return Ok(ImportSummary::default());
        }
        if response.get("auth").and_then(Value::as_i64) == Some(0) {
            return Err(ShelfError::RemoteApi("Fever rejected the credentials".to_string()));
        }

        let payload: FeverPayload = serde_json::from_value(response)
            .map_err(|e| ShelfError::ImportDocumentParse(format!("Fever response: {}", e)))?;

        let mut summary = ImportSummary::default();
        let mut groups = CategoryGroups::default();
        for entry in &payload.feeds {
            let feed = match FeverFeed::deserialize(entry) {
                Ok(feed) => feed,
                Err(e) => {
                    let address = entry.get("url").and_then(Value::as_str).unwrap_or("");
                    self.skip(user, &mut summary, address, &format!("malformed Fever feed: {}", e));
                    continue;
                }
            };

            let imported = self.import_item(
                user,
                &feed.url,
                feed.site_url.as_deref(),
                feed.title.as_deref(),
                &mut summary,
            )?;
            if let Some(feed_id) = imported {
                groups.push(payload.category_for(&feed), feed_id);
            }
        }

        let tree = FolderTree(
            groups
                .into_groups()
                .into_iter()
                .map(|(category, ids)| {
                    FolderNode::folder(category, ids.into_iter().map(FolderNode::Feed).collect())
                })
                .collect(),
        );

        self.finish(user, summary, tree)
    }
}
