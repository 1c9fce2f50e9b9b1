//! Backend seams the browser engine talks through.
//!
//! Every operation carries the [`ActorContext`] explicitly; implementations
//! are expected to re-validate permissions and move legality server-side
//! rather than trusting the client's pre-checks.

use crate::caps::ActorContext;
use crate::error::Result;
use crate::follow::{FollowConfig, Follower};
use crate::model::{Node, NodeKind, NodeStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateNode {
    pub kind: NodeKind,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub size: Option<u64>,
    pub extension: Option<String>,
    pub status: Option<NodeStatus>,
    pub validity_date: Option<NaiveDate>,
    pub comments: Option<String>,
}

impl CreateNode {
    pub fn folder(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            kind: NodeKind::Folder,
            name: name.into(),
            parent_id,
            size: None,
            extension: None,
            status: None,
            validity_date: None,
            comments: None,
        }
    }

    pub fn file(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        Self {
            kind: NodeKind::File,
            name: name.into(),
            parent_id,
            size: None,
            extension: None,
            status: None,
            validity_date: None,
            comments: None,
        }
    }
}

/// Partial update; `None` fields are left untouched. Clearing an optional
/// column goes through the double-`Option`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodePatch {
    pub name: Option<String>,
    pub status: Option<Option<NodeStatus>>,
    pub validity_date: Option<Option<NaiveDate>>,
    pub comments: Option<Option<String>>,
}

#[async_trait]
pub trait NodeService: Send + Sync {
    async fn get(&self, actor: &ActorContext, id: Uuid) -> Result<Node>;

    /// Direct children of a scope (`None` = the actor's root level).
    async fn list(&self, actor: &ActorContext, parent: Option<Uuid>) -> Result<Vec<Node>>;

    /// Every file the actor can reach, for global filter queries.
    async fn all_files(&self, actor: &ActorContext) -> Result<Vec<Node>>;

    /// Every folder the actor can reach, for move-target pickers and
    /// client-side cycle pre-checks.
    async fn folders(&self, actor: &ActorContext) -> Result<Vec<Node>>;

    async fn create(&self, actor: &ActorContext, req: CreateNode) -> Result<Node>;

    async fn update(&self, actor: &ActorContext, id: Uuid, patch: NodePatch) -> Result<Node>;

    /// Remove the node and, for folders, its whole subtree.
    async fn delete(&self, actor: &ActorContext, id: Uuid) -> Result<()>;

    /// Reparent under `target` (`None` = root). Implementations re-run the
    /// self/descendant checks regardless of any client-side pre-validation.
    async fn move_node(&self, actor: &ActorContext, id: Uuid, target: Option<Uuid>)
        -> Result<Node>;
}

/// A sharing grant from an owner to another account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShareRecord {
    pub node_id: Uuid,
    pub grantee: Uuid,
    pub allow_editing: bool,
}

#[async_trait]
pub trait ShareService: Send + Sync {
    async fn shares_of(&self, actor: &ActorContext, node_id: Uuid) -> Result<Vec<ShareRecord>>;

    async fn create_share(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        grantee_email: &str,
        allow_editing: bool,
    ) -> Result<ShareRecord>;

    /// Nodes shared with the actor, with `allow_editing_override` already
    /// applied per grant. Undeduplicated; the navigation layer derives the
    /// pseudo-scope roots.
    async fn shared_with_me(&self, actor: &ActorContext) -> Result<Vec<Node>>;
}

#[async_trait]
pub trait FollowService: Send + Sync {
    async fn follow(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower>;

    async fn unfollow(&self, actor: &ActorContext, node_id: Uuid) -> Result<()>;

    async fn reconfigure(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower>;

    /// Owner-only: subscribe the account behind `email`.
    async fn add_follower_by_email(
        &self,
        actor: &ActorContext,
        node_id: Uuid,
        email: &str,
        config: FollowConfig,
    ) -> Result<Follower>;

    async fn followers(&self, actor: &ActorContext, node_id: Uuid) -> Result<Vec<Follower>>;

    /// Subscriptions of the acting user joined with their documents.
    async fn followed_documents(
        &self,
        actor: &ActorContext,
    ) -> Result<Vec<crate::follow::FollowedDocument>>;
}
