//! Client-side browsing engine: one navigation state, one listing, and the
//! refresh discipline that keeps them coherent.
//!
//! Every mutation funnels through [`Browser::invalidate`], which reloads the
//! current view wholesale instead of patching listings in place. Refreshes
//! carry a monotonic load token; a response that comes back after a newer
//! load started is dropped, so slow responses can never overwrite the view
//! of a scope the user already left.

use crate::caps::{actions_for, ActorContext};
use crate::error::{EngineError, Result};
use crate::follow::{FollowConfig, FollowedDocument, Follower};
use crate::model::{Node, NodeTree};
use crate::moving;
use crate::nav::{
    dedup_shared_roots, matches, ListingCounts, NavState, QueryMode, Scope,
};
use crate::services::{CreateNode, FollowService, NodePatch, NodeService, ShareService};
use crate::urgency::{classify, Urgency};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

/// Keystrokes within this window coalesce into a single search query.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// A listed node joined with everything the presentation layer needs to
/// render its row.
#[derive(Clone, Debug)]
pub struct Entry {
    pub node: Node,
    pub urgency: Urgency,
    pub actions: Vec<crate::caps::Action>,
}

#[derive(Clone, Debug)]
pub struct Listing {
    pub entries: Vec<Entry>,
    pub counts: ListingCounts,
    pub mode: QueryMode,
    /// Whether the root scope should offer the shared-with-me entry point.
    pub shared_available: bool,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            counts: ListingCounts::default(),
            mode: QueryMode::Scoped,
            shared_available: false,
        }
    }
}

struct ViewState {
    nav: NavState,
    listing: Listing,
    last_error: Option<String>,
}

/// The engine. Holds the three service seams, the actor it acts as, and
/// the current view; methods that refresh take `&Arc<Self>` so the
/// debounce task can hold a handle across the delay.
pub struct Browser {
    nodes: Arc<dyn NodeService>,
    shares: Arc<dyn ShareService>,
    follows: Arc<dyn FollowService>,
    actor: ActorContext,
    state: Mutex<ViewState>,
    load_seq: AtomicU64,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl Browser {
    pub fn new(
        nodes: Arc<dyn NodeService>,
        shares: Arc<dyn ShareService>,
        follows: Arc<dyn FollowService>,
        actor: ActorContext,
        root_label: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            nodes,
            shares,
            follows,
            actor,
            state: Mutex::new(ViewState {
                nav: NavState::new(root_label),
                listing: Listing::default(),
                last_error: None,
            }),
            load_seq: AtomicU64::new(0),
            debounce: Mutex::new(None),
        })
    }

    pub fn actor(&self) -> &ActorContext {
        &self.actor
    }

    pub async fn nav(&self) -> NavState {
        self.state.lock().await.nav.clone()
    }

    pub async fn listing(&self) -> Listing {
        self.state.lock().await.listing.clone()
    }

    /// Reload the listing for the current navigation state. Concurrent
    /// refreshes race on the load token and only the newest one lands. A
    /// failed load keeps the previous listing and records the error.
    pub async fn refresh(self: &Arc<Self>) -> Result<()> {
        let token = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (scope, filter, mode) = {
            let state = self.state.lock().await;
            (
                state.nav.current_scope(),
                state.nav.filter.clone(),
                state.nav.mode(),
            )
        };

        let loaded = self.query(scope, &filter, mode).await;

        let mut state = self.state.lock().await;
        if self.load_seq.load(Ordering::SeqCst) != token {
            debug!(token, "stale load discarded");
            return Ok(());
        }
        let (nodes, shared_available) = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                state.last_error = Some(err.to_string());
                return Err(err);
            }
        };
        let today = Utc::now().date_naive();
        let counts = ListingCounts::tally(nodes.iter());
        let mut entries: Vec<Entry> = nodes
            .into_iter()
            .map(|node| Entry {
                urgency: classify(&node, today),
                actions: actions_for(&self.actor, &node),
                node,
            })
            .collect();
        // folders first, then by name, the listing order users see
        entries.sort_by(|a, b| {
            b.node
                .is_folder()
                .cmp(&a.node.is_folder())
                .then_with(|| a.node.name.to_lowercase().cmp(&b.node.name.to_lowercase()))
        });
        state.listing = Listing {
            entries,
            counts,
            mode,
            shared_available,
        };
        state.last_error = None;
        Ok(())
    }

    async fn query(
        &self,
        scope: Scope,
        filter: &crate::nav::FilterState,
        mode: QueryMode,
    ) -> Result<(Vec<Node>, bool)> {
        match mode {
            QueryMode::Global => {
                // global queries flatten to files and ignore the scope
                let mut files = self.nodes.all_files(&self.actor).await?;
                files.retain(|n| matches(n, filter));
                Ok((files, false))
            }
            QueryMode::Scoped => match scope {
                Scope::Root => {
                    let nodes = self.nodes.list(&self.actor, None).await?;
                    let shared = self.shares.shared_with_me(&self.actor).await?;
                    Ok((nodes, !shared.is_empty()))
                }
                Scope::Folder(id) => Ok((self.nodes.list(&self.actor, Some(id)).await?, false)),
                Scope::SharedWithMe => {
                    let shared = self.shares.shared_with_me(&self.actor).await?;
                    Ok((dedup_shared_roots(&shared), false))
                }
            },
        }
    }

    /// Last load failure, cleared by the next successful refresh or an
    /// explicit dismissal.
    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.state.lock().await.last_error = None;
    }

    /// Reload after a mutation. The single seam every write path goes
    /// through, so views never go stale silently.
    pub async fn invalidate(self: &Arc<Self>) -> Result<()> {
        self.refresh().await
    }

    // --- navigation -----------------------------------------------------

    pub async fn enter_folder(self: &Arc<Self>, id: Uuid) -> Result<()> {
        let node = self.nodes.get(&self.actor, id).await?;
        if !node.is_folder() {
            return Err(EngineError::NotAFolder);
        }
        self.state.lock().await.nav.enter_folder(id, node.name);
        self.refresh().await
    }

    pub async fn enter_shared(self: &Arc<Self>) -> Result<()> {
        self.state.lock().await.nav.enter_shared();
        self.refresh().await
    }

    pub async fn go_back(self: &Arc<Self>) -> Result<bool> {
        let moved = self.state.lock().await.nav.go_back();
        if moved {
            self.refresh().await?;
        }
        Ok(moved)
    }

    pub async fn jump_to(self: &Arc<Self>, index: usize) -> Result<bool> {
        let moved = self.state.lock().await.nav.jump_to(index);
        if moved {
            self.refresh().await?;
        }
        Ok(moved)
    }

    // --- filters --------------------------------------------------------

    /// Update the search term. The refresh is debounced; fast consecutive
    /// edits produce one query for the final term.
    pub async fn set_search_term(self: &Arc<Self>, term: impl Into<String>) {
        self.state.lock().await.nav.filter.search_term = term.into();
        let mut slot = self.debounce.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        let this = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(SEARCH_DEBOUNCE).await;
            if let Err(err) = this.refresh().await {
                debug!(%err, "debounced search refresh failed");
            }
        }));
    }

    pub async fn set_status_filter(
        self: &Arc<Self>,
        status: Option<crate::model::NodeStatus>,
    ) -> Result<()> {
        self.state.lock().await.nav.filter.status = status;
        self.refresh().await
    }

    pub async fn set_category_filter(
        self: &Arc<Self>,
        category: Option<crate::model::FileCategory>,
    ) -> Result<()> {
        self.state.lock().await.nav.filter.category = category;
        self.refresh().await
    }

    pub async fn clear_filters(self: &Arc<Self>) -> Result<()> {
        self.state.lock().await.nav.filter.clear();
        self.refresh().await
    }

    // --- node mutations -------------------------------------------------

    pub async fn create(self: &Arc<Self>, req: CreateNode) -> Result<Node> {
        let node = self.nodes.create(&self.actor, req).await?;
        self.invalidate().await?;
        Ok(node)
    }

    pub async fn update(self: &Arc<Self>, id: Uuid, patch: NodePatch) -> Result<Node> {
        let node = self.nodes.update(&self.actor, id, patch).await?;
        self.invalidate().await?;
        Ok(node)
    }

    pub async fn delete(self: &Arc<Self>, id: Uuid) -> Result<()> {
        self.nodes.delete(&self.actor, id).await?;
        self.invalidate().await
    }

    /// Folders the node could legally move into, for the destination
    /// picker. Excludes the node itself and, for folders, its descendants.
    pub async fn move_targets(&self, node_id: Uuid) -> Result<Vec<Node>> {
        let tree = self.snapshot_tree(node_id).await?;
        let mut targets: Vec<Node> = tree
            .iter()
            .filter(|n| n.is_folder() && moving::can_move(&tree, node_id, Some(n.id)))
            .cloned()
            .collect();
        targets.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(targets)
    }

    /// Reparent a node. The move is pre-validated against a folder
    /// snapshot so an illegal request never leaves the client, then the
    /// service re-validates it anyway.
    pub async fn move_item(self: &Arc<Self>, node_id: Uuid, target: Option<Uuid>) -> Result<Node> {
        let mut tree = self.snapshot_tree(node_id).await?;
        moving::move_node(&mut tree, node_id, target)?;
        let node = self.nodes.move_node(&self.actor, node_id, target).await?;
        self.invalidate().await?;
        Ok(node)
    }

    /// Folder snapshot plus the moving node, enough structure for the
    /// cycle checks without pulling every file over the wire.
    async fn snapshot_tree(&self, node_id: Uuid) -> Result<NodeTree> {
        let mut nodes = self.nodes.folders(&self.actor).await?;
        if !nodes.iter().any(|n| n.id == node_id) {
            nodes.push(self.nodes.get(&self.actor, node_id).await?);
        }
        Ok(NodeTree::from_nodes(nodes))
    }

    // --- sharing and following ------------------------------------------

    pub async fn share(
        self: &Arc<Self>,
        node_id: Uuid,
        grantee_email: &str,
        allow_editing: bool,
    ) -> Result<crate::services::ShareRecord> {
        let record = self
            .shares
            .create_share(&self.actor, node_id, grantee_email, allow_editing)
            .await?;
        self.invalidate().await?;
        Ok(record)
    }

    pub async fn follow(self: &Arc<Self>, node_id: Uuid, config: FollowConfig) -> Result<Follower> {
        let follower = self.follows.follow(&self.actor, node_id, config).await?;
        self.invalidate().await?;
        Ok(follower)
    }

    pub async fn unfollow(self: &Arc<Self>, node_id: Uuid) -> Result<()> {
        self.follows.unfollow(&self.actor, node_id).await?;
        self.invalidate().await
    }

    pub async fn reconfigure_follow(
        self: &Arc<Self>,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        self.follows.reconfigure(&self.actor, node_id, config).await
    }

    pub async fn add_follower_by_email(
        self: &Arc<Self>,
        node_id: Uuid,
        email: &str,
        config: FollowConfig,
    ) -> Result<Follower> {
        self.follows
            .add_follower_by_email(&self.actor, node_id, email, config)
            .await
    }

    pub async fn followers(&self, node_id: Uuid) -> Result<Vec<Follower>> {
        self.follows.followers(&self.actor, node_id).await
    }

    pub async fn followed_documents(&self) -> Result<Vec<FollowedDocument>> {
        self.follows.followed_documents(&self.actor).await
    }
}
