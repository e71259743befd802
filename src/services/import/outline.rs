use ::opml::{Outline, OPML};

use super::{ImportSummary, Importer};
use crate::domain::{FolderNode, FolderTree, User};
use crate::errors::{ShelfError, ShelfResult};
use crate::storage::traits::{FeedRepository, FolderRepository, SubscriptionRepository};

/// Nesting beyond this is treated as a malformed document.
const MAX_OUTLINE_DEPTH: usize = 50;

impl<F, S, D> Importer<F, S, D>
where
    F: FeedRepository,
    S: SubscriptionRepository,
    D: FolderRepository,
{
    /// Replace the user's subscriptions with the contents of an OPML document,
    /// keeping its folder nesting and order.
    pub fn import_opml(&self, user: &User, content: &str) -> ShelfResult<ImportSummary> {
        self.manager.clear_all(user)?;

        let outlines = match OPML::from_str(content) {
            Ok(document) => document.body.outlines,
            // A well-formed but empty subscription list
            Err(::opml::Error::BodyHasNoOutlines) => Vec::new(),
            Err(e) => return Err(ShelfError::ImportDocumentParse(format!("OPML: {}", e))),
        };

        let mut summary = ImportSummary::default();
        let nodes = self.process_outlines(user, &outlines, 0, &mut summary)?;
        self.finish(user, summary, FolderTree(nodes))
    }

    fn process_outlines(
        &self,
        user: &User,
        outlines: &[Outline],
        depth: usize,
        summary: &mut ImportSummary,
    ) -> ShelfResult<Vec<FolderNode>> {
        if depth > MAX_OUTLINE_DEPTH {
            return Err(ShelfError::ImportDocumentParse(format!(
                "outline nesting exceeds {} levels",
                MAX_OUTLINE_DEPTH
            )));
        }

        let mut nodes = Vec::with_capacity(outlines.len());
        for outline in outlines {
            match outline.xml_url.as_deref() {
                // No feed address: a folder
                None => {
                    let children = self.process_outlines(user, &outline.outlines, depth + 1, summary)?;
                    nodes.push(FolderNode::folder(folder_name(outline), children));
                }
                Some(address) => {
                    let link = outline.html_url.as_deref();
                    let title = outline.title.as_deref();
                    if let Some(feed_id) = self.import_item(user, address, link, title, summary)? {
                        nodes.push(FolderNode::Feed(feed_id));
                    }
                }
            }
        }
        Ok(nodes)
    }
}

fn folder_name(outline: &Outline) -> String {
    if !outline.text.is_empty() {
        return outline.text.clone();
    }
    outline.title.clone().unwrap_or_default()
}
