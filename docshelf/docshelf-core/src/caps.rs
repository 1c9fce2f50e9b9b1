//! Capability resolution for primary and delegated actors.
//!
//! Capabilities gate which actions the presentation layer offers; the
//! backing service re-validates every mutation independently. Resolution is
//! a pure read of the [`ActorContext`] value, which callers pass explicitly
//! instead of reading ambient session state.

use crate::model::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageFiles,
    ViewMetrics,
    ManageCollaborators,
    ViewOnly,
    ViewShared,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilitySet {
    pub manage_files: bool,
    pub view_metrics: bool,
    pub manage_collaborators: bool,
    pub view_only: bool,
    pub view_shared: bool,
}

impl CapabilitySet {
    pub fn full() -> Self {
        Self {
            manage_files: true,
            view_metrics: true,
            manage_collaborators: true,
            view_only: true,
            view_shared: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn has(&self, cap: Capability) -> bool {
        match cap {
            Capability::ManageFiles => self.manage_files,
            Capability::ViewMetrics => self.view_metrics,
            Capability::ManageCollaborators => self.manage_collaborators,
            Capability::ViewOnly => self.view_only,
            Capability::ViewShared => self.view_shared,
        }
    }

    fn set(&mut self, cap: Capability, granted: bool) {
        match cap {
            Capability::ManageFiles => self.manage_files = granted,
            Capability::ViewMetrics => self.view_metrics = granted,
            Capability::ManageCollaborators => self.manage_collaborators = granted,
            Capability::ViewOnly => self.view_only = granted,
            Capability::ViewShared => self.view_shared = granted,
        }
    }
}

/// Grant bookkeeping attached to a session: either an unrestricted account
/// or an explicit per-capability map.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Capabilities {
    Full,
    Explicit { map: HashMap<Capability, bool> },
}

/// Identity and grant state for the acting user, passed explicitly into
/// every engine that needs it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub email: String,
    /// Whether this identity acts on behalf of a primary account under a
    /// permission grant.
    pub delegated: bool,
    pub grants: Option<Capabilities>,
}

impl ActorContext {
    pub fn primary(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            delegated: false,
            grants: None,
        }
    }

    pub fn delegated(
        user_id: Uuid,
        email: impl Into<String>,
        grants: Option<Capabilities>,
    ) -> Self {
        Self {
            user_id,
            email: email.into(),
            delegated: true,
            grants,
        }
    }

    /// Build a context from a raw session blob. A malformed blob yields a
    /// context that resolves to the maximally restrictive capability set
    /// instead of an error.
    pub fn from_session(session: &Value) -> Self {
        let restricted = || Self {
            user_id: Uuid::nil(),
            email: String::new(),
            delegated: true,
            grants: Some(Capabilities::Explicit {
                map: HashMap::new(),
            }),
        };

        let Some(obj) = session.as_object() else {
            return restricted();
        };
        let Some(user_id) = obj
            .get("user_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            return restricted();
        };
        let email = obj
            .get("email")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let delegated = obj
            .get("delegated")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let grants = match obj.get("grants") {
            None | Some(Value::Null) => None,
            Some(raw) => match serde_json::from_value::<Capabilities>(raw.clone()) {
                Ok(g) => Some(g),
                Err(_) => return restricted(),
            },
        };
        Self {
            user_id,
            email,
            delegated,
            grants,
        }
    }
}

/// Resolve the actor's role-based capability set.
///
/// Primary identities default to fully granted; only an explicit `false`
/// denies. Delegated identities are granted only what their map marks
/// `true`; an absent map means fully granted, a legacy-compatibility corner
/// rather than a security boundary.
pub fn resolve_capabilities(actor: &ActorContext) -> CapabilitySet {
    match &actor.grants {
        None | Some(Capabilities::Full) => CapabilitySet::full(),
        Some(Capabilities::Explicit { map }) => {
            let mut caps = CapabilitySet::none();
            for cap in [
                Capability::ManageFiles,
                Capability::ViewMetrics,
                Capability::ManageCollaborators,
                Capability::ViewOnly,
                Capability::ViewShared,
            ] {
                let granted = if actor.delegated {
                    map.get(&cap) == Some(&true)
                } else {
                    map.get(&cap) != Some(&false)
                };
                caps.set(cap, granted);
            }
            caps
        }
    }
}

/// Role-based capabilities widened by the node's sharing grant: an editing
/// override ORs `manage_files` in for this node only.
pub fn resolve_for_node(actor: &ActorContext, node: &Node) -> CapabilitySet {
    let mut caps = resolve_capabilities(actor);
    if node.allow_editing_override {
        caps.manage_files = true;
    }
    caps
}

/// Actions the presentation layer may offer for a node. A missing
/// capability removes the action from the set entirely.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Edit,
    Delete,
    Move,
    Share,
    Follow,
    ManageFollowers,
}

pub fn actions_for(actor: &ActorContext, node: &Node) -> Vec<Action> {
    let caps = resolve_for_node(actor, node);
    let mut actions = Vec::new();
    if caps.manage_files {
        actions.push(Action::Edit);
        actions.push(Action::Delete);
        actions.push(Action::Move);
    }
    if caps.manage_collaborators {
        actions.push(Action::Share);
    }
    if node.is_file() {
        actions.push(Action::Follow);
        if node.owner_id == actor.user_id {
            actions.push(Action::ManageFollowers);
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::file;
    use serde_json::json;

    fn explicit(pairs: &[(Capability, bool)]) -> Capabilities {
        Capabilities::Explicit {
            map: pairs.iter().copied().collect(),
        }
    }

    #[test]
    fn primary_without_map_is_fully_granted() {
        let actor = ActorContext::primary(Uuid::new_v4(), "owner@example.com");
        assert_eq!(resolve_capabilities(&actor), CapabilitySet::full());
    }

    #[test]
    fn primary_explicit_false_denies() {
        let mut actor = ActorContext::primary(Uuid::new_v4(), "owner@example.com");
        actor.grants = Some(explicit(&[(Capability::ManageFiles, false)]));
        let caps = resolve_capabilities(&actor);
        assert!(!caps.manage_files);
        // absent entries stay granted for a primary identity
        assert!(caps.view_metrics);
    }

    #[test]
    fn delegated_grants_only_explicit_true() {
        let actor = ActorContext::delegated(
            Uuid::new_v4(),
            "helper@example.com",
            Some(explicit(&[
                (Capability::ViewShared, true),
                (Capability::ManageFiles, false),
            ])),
        );
        let caps = resolve_capabilities(&actor);
        assert!(caps.view_shared);
        assert!(!caps.manage_files);
        // absent from the map means denied for a delegated identity
        assert!(!caps.manage_collaborators);
    }

    #[test]
    fn delegated_without_map_fails_open() {
        let actor = ActorContext::delegated(Uuid::new_v4(), "legacy@example.com", None);
        assert_eq!(resolve_capabilities(&actor), CapabilitySet::full());
    }

    #[test]
    fn malformed_session_resolves_to_none() {
        let actor = ActorContext::from_session(&json!("not an object"));
        assert_eq!(resolve_capabilities(&actor), CapabilitySet::none());

        let actor = ActorContext::from_session(&json!({
            "user_id": "not-a-uuid",
            "email": "x@example.com"
        }));
        assert_eq!(resolve_capabilities(&actor), CapabilitySet::none());

        let actor = ActorContext::from_session(&json!({
            "user_id": Uuid::new_v4().to_string(),
            "grants": {"kind": "mystery"}
        }));
        assert_eq!(resolve_capabilities(&actor), CapabilitySet::none());
    }

    #[test]
    fn session_roundtrip_for_valid_blob() {
        let id = Uuid::new_v4();
        let actor = ActorContext::from_session(&json!({
            "user_id": id.to_string(),
            "email": "a@example.com",
            "delegated": true,
            "grants": {"kind": "explicit", "map": {"manage_files": true}}
        }));
        assert_eq!(actor.user_id, id);
        assert!(actor.delegated);
        let caps = resolve_capabilities(&actor);
        assert!(caps.manage_files);
        assert!(!caps.view_metrics);
    }

    #[test]
    fn node_override_widens_never_restricts() {
        let owner = Uuid::new_v4();
        let actor = ActorContext::delegated(
            Uuid::new_v4(),
            "helper@example.com",
            Some(explicit(&[(Capability::ManageFiles, false)])),
        );
        let mut node = file("contract.pdf", None, owner);
        assert!(!resolve_for_node(&actor, &node).manage_files);

        node.allow_editing_override = true;
        assert!(resolve_for_node(&actor, &node).manage_files);

        // an override never removes what the role already grants
        let full = ActorContext::primary(owner, "owner@example.com");
        assert!(resolve_for_node(&full, &node).manage_files);
    }

    #[test]
    fn denied_manage_files_omits_edit_actions() {
        let owner = Uuid::new_v4();
        let actor = ActorContext::delegated(
            Uuid::new_v4(),
            "helper@example.com",
            Some(explicit(&[(Capability::ManageFiles, false)])),
        );
        let node = file("contract.pdf", None, owner);
        let actions = actions_for(&actor, &node);
        assert!(!actions.contains(&Action::Edit));
        assert!(!actions.contains(&Action::Delete));
        assert!(actions.contains(&Action::Follow));
    }
}
