use roxmltree::{Document, Node};

use super::{CategoryGroups, ImportSummary, Importer};
use crate::domain::{FolderNode, FolderTree, User};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};

/// Category for items without a label. Its feeds go straight to the top level.
pub const ROOT_CATEGORY: &str = "Root";

/// One `<object>` of a Google Reader subscription export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ReaderItem {
    id: Option<String>,
    title: Option<String>,
    html_url: Option<String>,
    category: Option<String>,
}

impl ReaderItem {
    fn from_node(node: Node<'_, '_>) -> Self {
        let category = named_child(node, "list", "categories")
            .and_then(|list| list.children().find(|c| c.has_tag_name("object")))
            .and_then(|object| string_field(object, "label"));

        Self {
            id: string_field(node, "id"),
            title: string_field(node, "title"),
            html_url: string_field(node, "htmlUrl"),
            category,
        }
    }

    /// The feed address: the `feed/`-prefixed id, else the page link.
    fn address(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(|id| id.strip_prefix("feed/").unwrap_or(id))
            .filter(|address| !address.is_empty())
            .or(self.html_url.as_deref())
    }
}

fn named_child<'a, 'input>(node: Node<'a, 'input>, tag: &str, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.has_tag_name(tag) && child.attribute("name") == Some(name))
}

fn string_field(node: Node<'_, '_>, name: &str) -> Option<String> {
    named_child(node, "string", name)
        .and_then(|field| field.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn parse_items(content: &str) -> ShelfResult<Vec<ReaderItem>> {
    let document = Document::parse(content)
        .map_err(|e| ShelfError::ImportDocumentParse(format!("subscription export: {}", e)))?;

    let root = document.root_element();
    if !root.has_tag_name("object") {
        return Err(ShelfError::ImportDocumentParse(format!(
            "subscription export: expected <object> root, found <{}>",
            root.tag_name().name()
        )));
    }

    Ok(root
        .children()
        .filter(|list| list.has_tag_name("list"))
        .flat_map(|list| list.children().filter(|item| item.has_tag_name("object")))
        .map(ReaderItem::from_node)
        .collect())
}

impl<F, S, D> Importer<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    /// Replace the user's subscriptions with a Google Reader subscription export.
    ///
    /// Unlabelled feeds land at the top level; every label becomes one folder
    /// holding all of its feeds, in the order labels are first seen. Labels
    /// are used verbatim, nested subfolders are not reconstructed.
    pub fn import_google_reader(&self, user: &User, content: &str) -> ShelfResult<ImportSummary> {
        self.manager.clear_all(user)?;
        let items = parse_items(content)?;

        let mut summary = ImportSummary::default();
        let mut groups = CategoryGroups::default();
        for item in &items {
            let Some(address) = item.address() else {
                self.skip(user, &mut summary, "", "entry has neither feed id nor htmlUrl");
                continue;
            };

            let imported = self.import_item(
                user,
                address,
                item.html_url.as_deref(),
                item.title.as_deref(),
                &mut summary,
            )?;
            if let Some(feed_id) = imported {
                groups.push(item.category.as_deref().unwrap_or(ROOT_CATEGORY), feed_id);
            }
        }

        let mut tree = FolderTree::new();
        for (category, feed_ids) in groups.into_groups() {
            if category == ROOT_CATEGORY {
                for feed_id in feed_ids {
                    tree.push(FolderNode::Feed(feed_id));
                }
            } else {
                tree.push(FolderNode::folder(
                    category,
                    feed_ids.into_iter().map(FolderNode::Feed).collect(),
                ));
            }
        }

        self.finish(user, summary, tree)
    }
}
