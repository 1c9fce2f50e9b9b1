//! Per-node follower subscriptions with due-date alert configuration.
//!
//! The owner of a file is registered as an implicit follower when the file
//! is created and can never leave the set; everyone else subscribes and
//! unsubscribes freely.

use crate::caps::ActorContext;
use crate::error::{EngineError, Result};
use crate::model::{Node, NodeTree};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub const MAX_ALERT_DAYS: u16 = 90;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowConfig {
    pub days_before_alert: u16,
    pub alert_on_due_date: bool,
}

impl FollowConfig {
    /// Validates the alert window before anything leaves the client.
    pub fn new(days_before_alert: u16, alert_on_due_date: bool) -> Result<Self> {
        if days_before_alert > MAX_ALERT_DAYS {
            return Err(EngineError::AlertWindowOutOfRange {
                got: days_before_alert,
                max: MAX_ALERT_DAYS,
            });
        }
        Ok(Self {
            days_before_alert,
            alert_on_due_date,
        })
    }
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            days_before_alert: 7,
            alert_on_due_date: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Follower {
    pub node_id: Uuid,
    pub user_id: Uuid,
    pub config: FollowConfig,
    pub since: DateTime<Utc>,
}

/// Due-date standing of a followed document relative to today.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Overdue,
    DueToday,
    DueSoon,
    Current,
}

pub fn due_status(
    validity_date: Option<NaiveDate>,
    today: NaiveDate,
    days_before_alert: u16,
) -> Option<DueStatus> {
    let due = validity_date?;
    let days = (due - today).num_days();
    Some(if days < 0 {
        DueStatus::Overdue
    } else if days == 0 {
        DueStatus::DueToday
    } else if days <= i64::from(days_before_alert) {
        DueStatus::DueSoon
    } else {
        DueStatus::Current
    })
}

/// A subscription joined with its document for the "followed documents"
/// overview.
#[derive(Clone, Debug, Serialize)]
pub struct FollowedDocument {
    pub follower: Follower,
    pub node: Node,
    pub days_to_due: Option<i64>,
    pub status: Option<DueStatus>,
}

/// Follower sets keyed by node id.
#[derive(Clone, Debug, Default)]
pub struct FollowRegistry {
    followers: HashMap<Uuid, Vec<Follower>>,
}

impl FollowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the owner's implicit subscription for a freshly created
    /// file. No-op for folders.
    pub fn register_owner(&mut self, node: &Node, now: DateTime<Utc>) {
        if !node.is_file() {
            return;
        }
        let entries = self.followers.entry(node.id).or_default();
        if entries.iter().any(|f| f.user_id == node.owner_id) {
            return;
        }
        entries.push(Follower {
            node_id: node.id,
            user_id: node.owner_id,
            config: FollowConfig::default(),
            since: now,
        });
    }

    pub fn followers(&self, node_id: Uuid) -> &[Follower] {
        self.followers.get(&node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_following(&self, node_id: Uuid, user_id: Uuid) -> bool {
        self.followers(node_id).iter().any(|f| f.user_id == user_id)
    }

    pub fn follow(
        &mut self,
        tree: &NodeTree,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        let node = tree.get(node_id).ok_or(EngineError::NotFound(node_id))?;
        if !node.is_file() {
            return Err(EngineError::NotAFile);
        }
        if self.is_following(node_id, actor.user_id) {
            return Err(EngineError::AlreadyFollowing);
        }
        let follower = Follower {
            node_id,
            user_id: actor.user_id,
            config,
            since: Utc::now(),
        };
        self.followers.entry(node_id).or_default().push(follower.clone());
        Ok(follower)
    }

    pub fn unfollow(&mut self, tree: &NodeTree, actor: &ActorContext, node_id: Uuid) -> Result<()> {
        let node = tree.get(node_id).ok_or(EngineError::NotFound(node_id))?;
        if node.owner_id == actor.user_id {
            return Err(EngineError::OwnerUnfollow);
        }
        let entries = self
            .followers
            .get_mut(&node_id)
            .ok_or(EngineError::NotFollowing)?;
        let before = entries.len();
        entries.retain(|f| f.user_id != actor.user_id);
        if entries.len() == before {
            return Err(EngineError::NotFollowing);
        }
        Ok(())
    }

    pub fn reconfigure(
        &mut self,
        tree: &NodeTree,
        actor: &ActorContext,
        node_id: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        tree.get(node_id).ok_or(EngineError::NotFound(node_id))?;
        let entry = self
            .followers
            .get_mut(&node_id)
            .and_then(|entries| entries.iter_mut().find(|f| f.user_id == actor.user_id))
            .ok_or(EngineError::NotFollowing)?;
        entry.config = config;
        Ok(entry.clone())
    }

    /// Subscribe another identity on the owner's behalf. The caller has
    /// already resolved the target's email to an id.
    pub fn add_follower(
        &mut self,
        tree: &NodeTree,
        actor: &ActorContext,
        node_id: Uuid,
        target_user: Uuid,
        config: FollowConfig,
    ) -> Result<Follower> {
        let node = tree.get(node_id).ok_or(EngineError::NotFound(node_id))?;
        if node.owner_id != actor.user_id {
            return Err(EngineError::NotOwner);
        }
        if !node.is_file() {
            return Err(EngineError::NotAFile);
        }
        if self.is_following(node_id, target_user) {
            return Err(EngineError::AlreadyFollowing);
        }
        let follower = Follower {
            node_id,
            user_id: target_user,
            config,
            since: Utc::now(),
        };
        self.followers.entry(node_id).or_default().push(follower.clone());
        Ok(follower)
    }

    /// Drop follower sets for removed nodes.
    pub fn remove_nodes(&mut self, ids: &[Uuid]) {
        for id in ids {
            self.followers.remove(id);
        }
    }

    pub fn followed_by(&self, user_id: Uuid) -> Vec<Follower> {
        self.followers
            .values()
            .flat_map(|entries| entries.iter())
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect()
    }
}
