//! Breadcrumb/scope state and query resolution rules.
//!
//! Filters are scope-local: every navigation clears them. Any non-default
//! filter field flips the engine into Global mode, which flattens the whole
//! accessible corpus to files and ignores the current scope.

use crate::model::{FileCategory, Node, NodeStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Label for the synthetic scope listing nodes shared with the actor.
pub const SHARED_SCOPE_LABEL: &str = "Shared with me";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Root,
    SharedWithMe,
    Folder(Uuid),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Crumb {
    pub scope: Scope,
    pub name: String,
}

/// Ordered ancestor path from root to the current scope. Never empty;
/// index 0 is always the root scope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Breadcrumb {
    crumbs: Vec<Crumb>,
}

impl Breadcrumb {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            crumbs: vec![Crumb {
                scope: Scope::Root,
                name: root_label.into(),
            }],
        }
    }

    pub fn crumbs(&self) -> &[Crumb] {
        &self.crumbs
    }

    pub fn len(&self) -> usize {
        self.crumbs.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn current(&self) -> &Crumb {
        self.crumbs.last().expect("breadcrumb is never empty")
    }

    fn root_label(&self) -> String {
        self.crumbs[0].name.clone()
    }

    fn push_folder(&mut self, id: Uuid, name: impl Into<String>) {
        self.crumbs.push(Crumb {
            scope: Scope::Folder(id),
            name: name.into(),
        });
    }

    fn reset_to_shared(&mut self) {
        let root = self.root_label();
        self.crumbs = vec![
            Crumb {
                scope: Scope::Root,
                name: root,
            },
            Crumb {
                scope: Scope::SharedWithMe,
                name: SHARED_SCOPE_LABEL.to_string(),
            },
        ];
    }

    /// Truncate to `index + 1` crumbs. Out-of-range indexes are ignored.
    fn truncate_to(&mut self, index: usize) -> bool {
        if index + 1 > self.crumbs.len() {
            return false;
        }
        self.crumbs.truncate(index + 1);
        true
    }

    fn pop(&mut self) -> bool {
        if self.crumbs.len() > 1 {
            self.crumbs.pop();
            true
        } else {
            false
        }
    }

    pub fn contains_shared(&self) -> bool {
        self.crumbs.iter().any(|c| c.scope == Scope::SharedWithMe)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub status: Option<NodeStatus>,
    pub category: Option<FileCategory>,
}

impl FilterState {
    pub fn is_default(&self) -> bool {
        self.search_term.is_empty() && self.status.is_none() && self.category.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    Scoped,
    Global,
}

pub fn query_mode(filter: &FilterState) -> QueryMode {
    if filter.is_default() {
        QueryMode::Scoped
    } else {
        QueryMode::Global
    }
}

/// Conjunction of the three filter dimensions. The search term matches the
/// node name case-insensitively.
pub fn matches(node: &Node, filter: &FilterState) -> bool {
    if let Some(status) = filter.status {
        if node.status != Some(status) {
            return false;
        }
    }
    if let Some(category) = filter.category {
        if node.category() != Some(category) {
            return false;
        }
    }
    if !filter.search_term.is_empty() {
        let name = node.name.to_lowercase();
        if !name.contains(&filter.search_term.to_lowercase()) {
            return false;
        }
    }
    true
}

/// Combined navigation state. Every transition clears the filters, an
/// explicit design decision: filters do not survive navigation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavState {
    pub breadcrumb: Breadcrumb,
    pub filter: FilterState,
}

impl NavState {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            breadcrumb: Breadcrumb::new(root_label),
            filter: FilterState::default(),
        }
    }

    pub fn current_scope(&self) -> Scope {
        self.breadcrumb.current().scope
    }

    pub fn mode(&self) -> QueryMode {
        query_mode(&self.filter)
    }

    pub fn in_shared_area(&self) -> bool {
        self.breadcrumb.contains_shared()
    }

    pub fn enter_folder(&mut self, id: Uuid, name: impl Into<String>) {
        self.breadcrumb.push_folder(id, name);
        self.filter.clear();
    }

    pub fn enter_shared(&mut self) {
        self.breadcrumb.reset_to_shared();
        self.filter.clear();
    }

    pub fn jump_to(&mut self, index: usize) -> bool {
        let moved = self.breadcrumb.truncate_to(index);
        if moved {
            self.filter.clear();
        }
        moved
    }

    /// No-op when already at the root scope.
    pub fn go_back(&mut self) -> bool {
        let moved = self.breadcrumb.pop();
        if moved {
            self.filter.clear();
        }
        moved
    }
}

/// Root listing of the shared pseudo-scope: keep an item only when its
/// parent is absent or not itself shared, hiding content reachable by
/// entering a shared ancestor folder.
pub fn dedup_shared_roots(shared: &[Node]) -> Vec<Node> {
    let ids: HashSet<Uuid> = shared.iter().map(|n| n.id).collect();
    shared
        .iter()
        .filter(|n| match n.parent_id {
            None => true,
            Some(pid) => !ids.contains(&pid),
        })
        .cloned()
        .collect()
}

/// Scope-local tallies for filter badges, computed over the listed files
/// (folders are not counted).
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ListingCounts {
    pub total_files: usize,
    pub by_status: HashMap<NodeStatus, usize>,
    pub by_category: HashMap<FileCategory, usize>,
}

impl ListingCounts {
    pub fn tally<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut counts = Self::default();
        for node in nodes {
            if !node.is_file() {
                continue;
            }
            counts.total_files += 1;
            if let Some(status) = node.status {
                *counts.by_status.entry(status).or_default() += 1;
            }
            if let Some(category) = node.category() {
                *counts.by_category.entry(category).or_default() += 1;
            }
        }
        counts
    }
}
