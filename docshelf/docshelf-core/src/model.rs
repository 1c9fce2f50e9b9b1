//! In-memory node hierarchy. Nodes live in a flat arena keyed by id; the
//! tree shape is given by each node's `parent_id`, so structural queries
//! walk the arena instead of nested structures.

use crate::error::{EngineError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Upper bound on parent-chain walks. A well-formed tree never comes close;
/// the bound turns a corrupted chain into a stop instead of a hang.
pub const MAX_TREE_DEPTH: usize = 128;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// Document lifecycle status. The wire values are the domain slugs the
/// backing service stores.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    #[serde(rename = "valido")]
    Valid,
    #[serde(rename = "a-vencer")]
    NearExpiry,
    #[serde(rename = "vencido")]
    Expired,
    #[serde(rename = "em-renovacao")]
    InRenewal,
    #[serde(rename = "em-processo")]
    InProgress,
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl NodeStatus {
    pub const ALL: [NodeStatus; 7] = [
        NodeStatus::Valid,
        NodeStatus::NearExpiry,
        NodeStatus::Expired,
        NodeStatus::InRenewal,
        NodeStatus::InProgress,
        NodeStatus::Pending,
        NodeStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Valid => "valido",
            NodeStatus::NearExpiry => "a-vencer",
            NodeStatus::Expired => "vencido",
            NodeStatus::InRenewal => "em-renovacao",
            NodeStatus::InProgress => "em-processo",
            NodeStatus::Pending => "pendente",
            NodeStatus::Cancelled => "cancelado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// Coarse file-type buckets used by filters and badge counts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Pdf,
    Word,
    Excel,
    Powerpoint,
    Csv,
    Text,
    Image,
    Video,
    Audio,
    Compressed,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 11] = [
        FileCategory::Pdf,
        FileCategory::Word,
        FileCategory::Excel,
        FileCategory::Powerpoint,
        FileCategory::Csv,
        FileCategory::Text,
        FileCategory::Image,
        FileCategory::Video,
        FileCategory::Audio,
        FileCategory::Compressed,
        FileCategory::Other,
    ];

    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => FileCategory::Pdf,
            "doc" | "docx" => FileCategory::Word,
            "xls" | "xlsx" => FileCategory::Excel,
            "ppt" | "pptx" => FileCategory::Powerpoint,
            "csv" => FileCategory::Csv,
            "txt" => FileCategory::Text,
            "jpg" | "jpeg" | "png" | "gif" | "bmp" | "svg" => FileCategory::Image,
            "mp4" | "avi" | "mov" => FileCategory::Video,
            "mp3" | "wav" => FileCategory::Audio,
            "zip" | "rar" => FileCategory::Compressed,
            _ => FileCategory::Other,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: Uuid,
    pub kind: NodeKind,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub size: Option<u64>,
    pub extension: Option<String>,
    pub status: Option<NodeStatus>,
    pub validity_date: Option<NaiveDate>,
    pub comments: Option<String>,
    pub owner_id: Uuid,
    /// Per-node editing grant received through sharing. Widens the actor's
    /// capabilities for this node only, never restricts them.
    pub allow_editing_override: bool,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn category(&self) -> Option<FileCategory> {
        self.extension
            .as_deref()
            .map(FileCategory::from_extension)
    }
}

/// Flat arena of nodes. `parent_id == None` marks a root-level node.
#[derive(Clone, Debug, Default)]
pub struct NodeTree {
    nodes: HashMap<Uuid, Node>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an arena from an unordered node list. Parent references are
    /// not validated here; bounded walks tolerate whatever arrives.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Insert a node, validating the parent invariant: the parent must be an
    /// existing folder (files never have children).
    pub fn insert(&mut self, node: Node) -> Result<()> {
        if let Some(pid) = node.parent_id {
            match self.nodes.get(&pid) {
                None => return Err(EngineError::NotFound(pid)),
                Some(parent) if !parent.is_folder() => return Err(EngineError::NotAFolder),
                Some(_) => {}
            }
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Direct children of the given scope (`None` = root level).
    pub fn children(&self, parent: Option<Uuid>) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == parent)
            .collect()
    }

    /// Ancestor ids from the node's parent up to the root, bounded by
    /// [`MAX_TREE_DEPTH`]. A missing parent ends the walk.
    pub fn ancestors(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(pid) = current {
            if out.len() >= MAX_TREE_DEPTH {
                break;
            }
            out.push(pid);
            current = self.nodes.get(&pid).and_then(|n| n.parent_id);
        }
        out
    }

    /// The node plus every node below it, collected iteratively so deep
    /// trees cannot blow the stack. Already-visited ids are skipped, so a
    /// cyclic arena terminates with each node listed once.
    pub fn descendant_ids(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            out.push(current);
            if self.nodes.get(&current).map(|n| n.is_folder()).unwrap_or(false) {
                for child in self.nodes.values().filter(|n| n.parent_id == Some(current)) {
                    stack.push(child.id);
                }
            }
        }
        out
    }

    /// Remove the node and its whole subtree, returning the removed ids.
    pub fn remove_subtree(&mut self, id: Uuid) -> Vec<Uuid> {
        let ids = self.descendant_ids(id);
        for removed in &ids {
            self.nodes.remove(removed);
        }
        ids
    }

    /// Whether every parent chain terminates at a root within the depth
    /// bound and no file is referenced as a parent.
    pub fn is_consistent(&self) -> bool {
        self.nodes.values().all(|node| {
            let mut current = node.parent_id;
            let mut steps = 0;
            while let Some(pid) = current {
                let Some(parent) = self.nodes.get(&pid) else {
                    return false;
                };
                if !parent.is_folder() {
                    return false;
                }
                steps += 1;
                if steps > MAX_TREE_DEPTH {
                    return false;
                }
                current = parent.parent_id;
            }
            true
        })
    }
}
