//! In-memory backing service used by the server binary and the tests.
//!
//! The store re-validates everything the client pre-checks: capabilities,
//! move legality, follow invariants. Client-side checks only shape the UI;
//! this is where a request actually gets refused.

use crate::caps::{resolve_capabilities, resolve_for_node, ActorContext};
use crate::error::{EngineError, Result};
use crate::events::{Event, EventBus};
use crate::follow::{due_status, FollowConfig, FollowRegistry, FollowedDocument, Follower};
use crate::model::{Node, NodeTree};
use crate::moving;
use crate::services::{
    CreateNode, FollowService, NodePatch, NodeService, ShareRecord, ShareService,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    tree: NodeTree,
    follows: FollowRegistry,
    shares: HashMap<Uuid, Vec<ShareRecord>>,
    accounts: HashMap<String, Uuid>,
}

impl Inner {
    fn share_for(&self, node_id: Uuid, user: Uuid) -> Option<&ShareRecord> {
        self.shares
            .get(&node_id)
            .and_then(|grants| grants.iter().find(|g| g.grantee == user))
    }

    /// The grant covering this node for the user, direct or inherited from
    /// a shared ancestor folder.
    fn effective_share(&self, node_id: Uuid, user: Uuid) -> Option<&ShareRecord> {
        if let Some(grant) = self.share_for(node_id, user) {
            return Some(grant);
        }
        self.tree
            .ancestors(node_id)
            .into_iter()
            .find_map(|aid| self.share_for(aid, user))
    }

    fn visible(&self, node: &Node, actor: &ActorContext) -> bool {
        node.owner_id == actor.user_id || self.effective_share(node.id, actor.user_id).is_some()
    }

    /// Clone with the per-node editing override folded in from the actor's
    /// grant, so capability resolution sees what sharing granted.
    fn view_of(&self, node: &Node, actor: &ActorContext) -> Node {
        let mut view = node.clone();
        if let Some(grant) = self.effective_share(node.id, actor.user_id) {
            view.allow_editing_override = grant.allow_editing;
        }
        view
    }

    fn fetch(&self, actor: &ActorContext, id: Uuid) -> Result<Node> {
        let node = self.tree.get(id).ok_or(EngineError::NotFound(id))?;
        if !self.visible(node, actor) {
            return Err(EngineError::NotFound(id));
        }
        Ok(self.view_of(node, actor))
    }

    fn require_manage(&self, actor: &ActorContext, id: Uuid) -> Result<Node> {
        let node = self.fetch(actor, id)?;
        if !resolve_for_node(actor, &node).manage_files {
            return Err(EngineError::PermissionDenied);
        }
        Ok(node)
    }
}

/// Shared application state: one arena, one follow registry, one share
/// table behind a single `RwLock`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    events: EventBus,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register an account so emails can be resolved for sharing and
    /// follower management.
    pub async fn register_account(&self, email: impl Into<String>, user_id: Uuid) {
        self.inner.write().await.accounts.insert(email.into(), user_id);
    }

    #[cfg(test)]
    pub(crate) async fn node_count(&self) -> usize {
        self.inner.read().await.tree.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeService for MemoryStore {
    async fn get(&self, actor: &ActorContext, id: Uuid) -> Result<Node> {
        self.inner.read().await.fetch(actor, id)
    }

    async fn list(&self, actor: &ActorContext, parent: Option<Uuid>) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        if let Some(pid) = parent {
            inner.fetch(actor, pid)?;
        }
        Ok(inner
            .tree
            .children(parent)
            .into_iter()
            .filter(|n| match parent {
                // the root level is private; shared content surfaces
                // through the shared-with-me listing instead
                None => n.owner_id == actor.user_id,
                Some(_) => inner.visible(n, actor),
            })
            .map(|n| inner.view_of(n, actor))
            .collect())
    }

    async fn all_files(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tree
            .iter()
            .filter(|n| n.is_file() && inner.visible(n, actor))
            .map(|n| inner.view_of(n, actor))
            .collect())
    }

    async fn folders(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tree
            .iter()
            .filter(|n| n.is_folder() && inner.visible(n, actor))
            .map(|n| inner.view_of(n, actor))
            .collect())
    }

    async fn create(&self, actor: &ActorContext, req: CreateNode) -> Result<Node> {
        if !resolve_capabilities(actor).manage_files {
            return Err(EngineError::PermissionDenied);
        }
        let mut inner = self.inner.write().await;
        let node = Node {
            id: Uuid::new_v4(),
            kind: req.kind,
            name: req.name,
            parent_id: req.parent_id,
            created_at: Utc::now(),
            size: req.size,
            extension: req.extension,
            status: req.status,
            validity_date: req.validity_date,
            comments: req.comments,
            owner_id: actor.user_id,
            allow_editing_override: false,
        };
        let id = node.id;
        let guard = &mut *inner;
        guard.tree.insert(node.clone())?;
        // the owner follows their own files from the start
        guard.follows.register_owner(&node, node.created_at);
        debug!(%id, name = %node.name, "node created");
        self.events.send(Event::Created { id });
        Ok(node)
    }

    async fn update(&self, actor: &ActorContext, id: Uuid, patch: NodePatch) -> Result<Node> {
        let mut inner = self.inner.write().await;
        inner.require_manage(actor, id)?;
        let node = inner.tree.get_mut(id).ok_or(EngineError::NotFound(id))?;
        if let Some(name) = patch.name {
            node.name = name;
        }
        if let Some(status) = patch.status {
            node.status = status;
        }
        if let Some(date) = patch.validity_date {
            node.validity_date = date;
        }
        if let Some(comments) = patch.comments {
            node.comments = comments;
        }
        let updated = node.clone();
        self.events.send(Event::Updated { id });
        Ok(updated)
    }

    async fn delete(&self, actor: &ActorContext, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.require_manage(actor, id)?;
        let guard = &mut *inner;
        let removed = guard.tree.remove_subtree(id);
        guard.follows.remove_nodes(&removed);
        for rid in &removed {
            guard.shares.remove(rid);
        }
        debug!(%id, subtree = removed.len(), "node deleted");
        self.events.send(Event::Deleted { id });
        Ok(())
    }

    async fn move_node(
        &self,
        actor: &ActorContext,
        id: Uuid,
        target: Option<Uuid>,
    ) -> Result<Node> {
        let mut inner = self.inner.write().await;
        inner.require_manage(actor, id)?;
        if let Some(t) = target {
            inner.fetch(actor, t)?;
        }
        let outcome = moving::move_node(&mut inner.tree, id, target)?;
        debug!(%id, ?target, "node moved");
        self.events.send(Event::Moved {
            id,
            new_parent: outcome.new_parent,
        });
        Ok(outcome.node)
    }
}

#[async_trait]
impl ShareService for MemoryStore {
    async fn shares_of(&self, actor: &ActorContext, node_id: Uuid) -> Result<Vec<ShareRecord>> {
        let inner = self.inner.read().await;
        inner.fetch(actor, node_id)?;
        Ok(inner.shares.get(&node_id).cloned().unwrap_or_default())
    }

    async fn create_share(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        grantee_email: &str,
        allow_editing: bool,
    ) -> Result<ShareRecord> {
        if !resolve_capabilities(actor).manage_collaborators {
            return Err(EngineError::PermissionDenied);
        }
        let mut inner = self.inner.write().await;
        let node = inner.fetch(actor, node_id)?;
        if node.owner_id != actor.user_id {
            return Err(EngineError::NotOwner);
        }
        let grantee = *inner
            .accounts
            .get(grantee_email)
            .ok_or_else(|| EngineError::UnknownEmail(grantee_email.to_string()))?;
        let record = ShareRecord {
            node_id,
            grantee,
            allow_editing,
        };
        let grants = inner.shares.entry(node_id).or_default();
        grants.retain(|g| g.grantee != grantee);
        grants.push(record.clone());
        debug!(%node_id, %grantee, allow_editing, "share created");
        Ok(record)
    }

    async fn shared_with_me(&self, actor: &ActorContext) -> Result<Vec<Node>> {
        let inner = self.inner.read().await;
        let mut by_id: HashMap<Uuid, Node> = HashMap::new();
        for grants in inner.shares.values() {
            for grant in grants.iter().filter(|g| g.grantee == actor.user_id) {
                // a shared folder brings its whole subtree along; when
                // grants overlap, the widest editing flag wins
                for id in inner.tree.descendant_ids(grant.node_id) {
                    if let Some(node) = inner.tree.get(id) {
                        let view = by_id.entry(id).or_insert_with(|| node.clone());
                        view.allow_editing_override |= grant.allow_editing;
                    }
                }
            }
        }
        let mut out: Vec<Node> = by_id.into_values().collect();
        out.sort_by_key(|n| n.id);
        Ok(out)
    }
}

#[async_trait]
impl FollowService for MemoryStore {
    async fn follow(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        let mut inner = self.inner.write().await;
        inner.fetch(actor, node_id)?;
        let guard = &mut *inner;
        let follower = guard.follows.follow(&guard.tree, actor, node_id, config)?;
        self.events.send(Event::Followed {
            id: node_id,
            user: actor.user_id,
        });
        Ok(follower)
    }

    async fn unfollow(&self, actor: &ActorContext, node_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let guard = &mut *inner;
        guard.follows.unfollow(&guard.tree, actor, node_id)?;
        self.events.send(Event::Unfollowed {
            id: node_id,
            user: actor.user_id,
        });
        Ok(())
    }

    async fn reconfigure(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        let mut inner = self.inner.write().await;
        let guard = &mut *inner;
        guard.follows.reconfigure(&guard.tree, actor, node_id, config)
    }

    async fn add_follower_by_email(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        email: &str,
        config: FollowConfig,
    ) -> Result<Follower> {
        let mut inner = self.inner.write().await;
        let target = *inner
            .accounts
            .get(email)
            .ok_or_else(|| EngineError::UnknownEmail(email.to_string()))?;
        let guard = &mut *inner;
        let follower = guard
            .follows
            .add_follower(&guard.tree, actor, node_id, target, config)?;
        self.events.send(Event::Followed {
            id: node_id,
            user: target,
        });
        Ok(follower)
    }

    async fn followers(&self, actor: &ActorContext, node_id: Uuid) -> Result<Vec<Follower>> {
        let inner = self.inner.read().await;
        inner.fetch(actor, node_id)?;
        Ok(inner.follows.followers(node_id).to_vec())
    }

    async fn followed_documents(&self, actor: &ActorContext) -> Result<Vec<FollowedDocument>> {
        let inner = self.inner.read().await;
        let today = Utc::now().date_naive();
        let mut out = Vec::new();
        for follower in inner.follows.followed_by(actor.user_id) {
            let Some(node) = inner.tree.get(follower.node_id) else {
                continue;
            };
            let days_to_due = node.validity_date.map(|due| (due - today).num_days());
            let status = due_status(node.validity_date, today, follower.config.days_before_alert);
            out.push(FollowedDocument {
                node: node.clone(),
                follower,
                days_to_due,
                status,
            });
        }
        out.sort_by(|a, b| {
            a.days_to_due
                .unwrap_or(i64::MAX)
                .cmp(&b.days_to_due.unwrap_or(i64::MAX))
        });
        Ok(out)
    }
}
