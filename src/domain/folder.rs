use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ShelfError, ShelfResult};

/// Name used by the flattened view for feeds that sit at the top level.
pub const FLAT_ROOT: &str = " ";
const FLAT_SEPARATOR: &str = " - ";

/// One entry of a user's folder tree.
///
/// On the wire a feed is a bare integer and a folder is a single-key object
/// mapping its name to its children: `[1, {"Tech": [2, {"Rust": [3]}]}]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderNode {
    Feed(i64),
    Folder {
        name: String,
        children: Vec<FolderNode>,
    },
}

impl FolderNode {
    pub fn folder(name: impl Into<String>, children: Vec<FolderNode>) -> Self {
        FolderNode::Folder {
            name: name.into(),
            children,
        }
    }
}

impl Serialize for FolderNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FolderNode::Feed(id) => serializer.serialize_i64(*id),
            FolderNode::Folder { name, children } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, children)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FolderNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NodeVisitor;

        impl<'de> Visitor<'de> for NodeVisitor {
            type Value = FolderNode;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a feed id or a single-key folder object")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FolderNode, E> {
                Ok(FolderNode::Feed(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FolderNode, E> {
                i64::try_from(v)
                    .map(FolderNode::Feed)
                    .map_err(|_| E::custom(format!("feed id out of range: {}", v)))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FolderNode, A::Error> {
                let (name, children) = map
                    .next_entry::<String, Vec<FolderNode>>()?
                    .ok_or_else(|| de::Error::custom("folder object has no name"))?;
                if map.next_key::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::custom(format!(
                        "folder object for {:?} has more than one key",
                        name
                    )));
                }
                Ok(FolderNode::Folder { name, children })
            }
        }

        deserializer.deserialize_any(NodeVisitor)
    }
}

/// A user's ordered, arbitrarily nested arrangement of feed references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderTree(pub Vec<FolderNode>);

impl FolderTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&self) -> ShelfResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> ShelfResult<Self> {
        serde_json::from_str(raw).map_err(|e| ShelfError::InvalidInput(format!("folder tree: {}", e)))
    }

    pub fn nodes(&self) -> &[FolderNode] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a feed reference to the folder addressed by `path`, creating any
    /// missing folder along the way. An empty path is the top level.
    pub fn append_leaf(&mut self, path: &[&str], feed_id: i64) {
        Self::with_container(&mut self.0, path, |nodes| nodes.push(FolderNode::Feed(feed_id)));
    }

    /// Append an empty folder called `name` under `path`.
    pub fn append_folder(&mut self, path: &[&str], name: &str) {
        Self::with_container(&mut self.0, path, |nodes| {
            nodes.push(FolderNode::folder(name, Vec::new()))
        });
    }

    pub fn push(&mut self, node: FolderNode) {
        self.0.push(node);
    }

    /// Run `f` on the children of the first folder matching each `path`
    /// segment in turn. Missing folders are appended at the end of their parent.
    fn with_container<F>(nodes: &mut Vec<FolderNode>, path: &[&str], f: F)
    where
        F: FnOnce(&mut Vec<FolderNode>),
    {
        let Some((first, rest)) = path.split_first() else {
            return f(nodes);
        };

        let existing = nodes.iter_mut().find_map(|node| match node {
            FolderNode::Folder { name, children } if name == first => Some(children),
            _ => None,
        });
        if let Some(children) = existing {
            return Self::with_container(children, rest, f);
        }

        let mut children = Vec::new();
        Self::with_container(&mut children, rest, f);
        nodes.push(FolderNode::folder(*first, children));
    }

    /// Whether `feed_id` sits directly inside the folder addressed by `path`.
    pub fn contains_at(&self, path: &[&str], feed_id: i64) -> bool {
        let mut nodes = &self.0;
        for segment in path {
            let next = nodes.iter().find_map(|node| match node {
                FolderNode::Folder { name, children } if name == segment => Some(children),
                _ => None,
            });
            match next {
                Some(children) => nodes = children,
                None => return false,
            }
        }
        nodes.contains(&FolderNode::Feed(feed_id))
    }

    /// Every feed id in document order, duplicates included.
    pub fn feed_ids(&self) -> Vec<i64> {
        fn collect(nodes: &[FolderNode], out: &mut Vec<i64>) {
            for node in nodes {
                match node {
                    FolderNode::Feed(id) => out.push(*id),
                    FolderNode::Folder { children, .. } => collect(children, out),
                }
            }
        }

        let mut ids = Vec::new();
        collect(&self.0, &mut ids);
        ids
    }

    pub fn contains_feed(&self, feed_id: i64) -> bool {
        self.feed_ids().contains(&feed_id)
    }

    /// Swap every reference to `from` for `to`, at any depth, keeping position.
    /// Returns how many references were rewritten.
    pub fn replace_feed(&mut self, from: i64, to: i64) -> usize {
        fn replace(nodes: &mut [FolderNode], from: i64, to: i64) -> usize {
            let mut count = 0;
            for node in nodes {
                match node {
                    FolderNode::Feed(id) if *id == from => {
                        *id = to;
                        count += 1;
                    }
                    FolderNode::Feed(_) => {}
                    FolderNode::Folder { children, .. } => count += replace(children, from, to),
                }
            }
            count
        }

        replace(&mut self.0, from, to)
    }

    /// Remove `feed_id` from the folders called `in_folder` (top level when
    /// empty). Returns whether anything was removed.
    pub fn remove_feed(&mut self, feed_id: i64, in_folder: &str) -> bool {
        let mut removed = false;
        Self::for_each_container(&mut self.0, in_folder, &mut |children| {
            let before = children.len();
            children.retain(|node| *node != FolderNode::Feed(feed_id));
            removed |= children.len() != before;
        });
        removed
    }

    /// Rename every folder called `old` that sits inside a folder called
    /// `in_folder` (top level when empty).
    pub fn rename_folder(&mut self, old: &str, new: &str, in_folder: &str) -> bool {
        let mut renamed = false;
        Self::for_each_container(&mut self.0, in_folder, &mut |children| {
            for node in children.iter_mut() {
                if let FolderNode::Folder { name, .. } = node {
                    if name == old {
                        *name = new.to_string();
                        renamed = true;
                    }
                }
            }
        });
        renamed
    }

    /// Remove every folder called `name` inside a folder called `in_folder`
    /// (top level when empty). Returns the feed ids the removed folders held.
    pub fn remove_folder(&mut self, name: &str, in_folder: &str) -> Vec<i64> {
        let mut dropped = Vec::new();
        Self::for_each_container(&mut self.0, in_folder, &mut |children| {
            children.retain(|node| match node {
                FolderNode::Folder { name: folder, children } if folder == name => {
                    dropped.extend(FolderTree(children.clone()).feed_ids());
                    false
                }
                _ => true,
            });
        });
        dropped
    }

    fn for_each_container<F>(nodes: &mut Vec<FolderNode>, in_folder: &str, f: &mut F)
    where
        F: FnMut(&mut Vec<FolderNode>),
    {
        if in_folder.is_empty() {
            f(nodes);
            return;
        }
        for node in nodes.iter_mut() {
            if let FolderNode::Folder { name, children } = node {
                if name == in_folder {
                    f(children);
                }
                Self::for_each_container(children, in_folder, f);
            }
        }
    }

    /// Flattened view keyed by the joined folder path (`"News - Local"`),
    /// top-level feeds under [`FLAT_ROOT`]. Used by clients without nesting.
    pub fn flatten(&self) -> BTreeMap<String, Vec<i64>> {
        fn walk(nodes: &[FolderNode], parent: &str, out: &mut BTreeMap<String, Vec<i64>>) {
            for node in nodes {
                match node {
                    FolderNode::Feed(id) => {
                        let key = if parent.is_empty() { FLAT_ROOT } else { parent };
                        out.entry(key.to_string()).or_default().push(*id);
                    }
                    FolderNode::Folder { name, children } => {
                        let path = if parent.is_empty() {
                            name.clone()
                        } else {
                            format!("{}{}{}", parent, FLAT_SEPARATOR, name)
                        };
                        walk(children, &path, out);
                    }
                }
            }
        }

        let mut flat = BTreeMap::new();
        walk(&self.0, "", &mut flat);
        flat
    }
}
