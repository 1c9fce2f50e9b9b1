//! Cycle-safe reparenting of nodes.
//!
//! The descendant check walks the ancestor chain upward from the target,
//! bounded by tree depth. A broken chain counts as "not a descendant" so a
//! legitimate move is never blocked by stale references; the backing
//! service re-validates anyway.

use crate::error::{EngineError, Result};
use crate::model::{Node, NodeTree, MAX_TREE_DEPTH};
use uuid::Uuid;

/// Whether `candidate` sits somewhere below `ancestor`.
pub fn is_descendant(tree: &NodeTree, ancestor: Uuid, candidate: Uuid) -> bool {
    let mut current = tree.get(candidate).and_then(|n| n.parent_id);
    let mut steps = 0;
    while let Some(pid) = current {
        if pid == ancestor {
            return true;
        }
        steps += 1;
        if steps > MAX_TREE_DEPTH {
            return false;
        }
        current = tree.get(pid).and_then(|n| n.parent_id);
    }
    false
}

/// Whether the node may be reparented under `target` (`None` = root).
pub fn can_move(tree: &NodeTree, node_id: Uuid, target: Option<Uuid>) -> bool {
    if target == Some(node_id) {
        return false;
    }
    let Some(node) = tree.get(node_id) else {
        return false;
    };
    match target {
        None => true,
        Some(t) => {
            let Some(dest) = tree.get(t) else {
                return false;
            };
            if !dest.is_folder() {
                return false;
            }
            // files have no descendants, so only folders need the walk
            !(node.is_folder() && is_descendant(tree, node_id, t))
        }
    }
}

/// Result of a successful move: the reparented node plus the two scopes
/// whose listings are now stale.
#[derive(Clone, Debug)]
pub struct MoveOutcome {
    pub node: Node,
    pub old_parent: Option<Uuid>,
    pub new_parent: Option<Uuid>,
}

/// Reparent a node, rejecting self-targets and descendant cycles before any
/// mutation. No other node changes identity.
pub fn move_node(tree: &mut NodeTree, node_id: Uuid, target: Option<Uuid>) -> Result<MoveOutcome> {
    if target == Some(node_id) {
        return Err(EngineError::MoveIntoSelf);
    }
    let node = tree.get(node_id).ok_or(EngineError::NotFound(node_id))?;
    let is_folder = node.is_folder();
    let old_parent = node.parent_id;
    if let Some(t) = target {
        let dest = tree.get(t).ok_or(EngineError::NotFound(t))?;
        if !dest.is_folder() {
            return Err(EngineError::NotAFolder);
        }
        if is_folder && is_descendant(tree, node_id, t) {
            return Err(EngineError::MoveIntoDescendant);
        }
    }
    let node = tree
        .get_mut(node_id)
        .ok_or(EngineError::NotFound(node_id))?;
    node.parent_id = target;
    Ok(MoveOutcome {
        node: node.clone(),
        old_parent,
        new_parent: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::{file, folder};

    fn sample_tree() -> (NodeTree, Uuid, Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let mut tree = NodeTree::new();
        let a = folder("a", None, owner);
        let a_id = a.id;
        tree.insert(a).unwrap();
        let b = folder("b", Some(a_id), owner);
        let b_id = b.id;
        tree.insert(b).unwrap();
        let doc = file("doc.pdf", Some(a_id), owner);
        let doc_id = doc.id;
        tree.insert(doc).unwrap();
        (tree, a_id, b_id, doc_id)
    }

    #[test]
    fn cannot_move_into_self_or_descendant() {
        let (tree, a, b, _) = sample_tree();
        assert!(!can_move(&tree, a, Some(a)));
        assert!(!can_move(&tree, a, Some(b)));
        assert!(can_move(&tree, b, Some(a)));
    }

    #[test]
    fn move_rejections_are_distinguishable() {
        let (mut tree, a, b, _) = sample_tree();
        assert!(matches!(
            move_node(&mut tree, a, Some(a)),
            Err(EngineError::MoveIntoSelf)
        ));
        assert!(matches!(
            move_node(&mut tree, a, Some(b)),
            Err(EngineError::MoveIntoDescendant)
        ));
        // rejected moves leave the tree untouched
        assert_eq!(tree.get(a).unwrap().parent_id, None);
        assert_eq!(tree.get(b).unwrap().parent_id, Some(a));
    }

    #[test]
    fn files_cannot_be_targets() {
        let (tree, _, b, doc) = sample_tree();
        assert!(!can_move(&tree, b, Some(doc)));
    }

    #[test]
    fn file_moves_skip_descendant_walk() {
        let (mut tree, _, b, doc) = sample_tree();
        let outcome = move_node(&mut tree, doc, Some(b)).unwrap();
        assert_eq!(outcome.new_parent, Some(b));
        assert_eq!(tree.get(doc).unwrap().parent_id, Some(b));
    }

    #[test]
    fn move_to_root_allowed() {
        let (mut tree, a, b, _) = sample_tree();
        let outcome = move_node(&mut tree, b, None).unwrap();
        assert_eq!(outcome.old_parent, Some(a));
        assert_eq!(outcome.new_parent, None);
    }

    #[test]
    fn broken_chain_fails_open() {
        let owner = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let orphan_target = folder("orphaned", Some(ghost), owner);
        let target_id = orphan_target.id;
        let moving = folder("moving", None, owner);
        let moving_id = moving.id;
        // target's parent chain dangles; the walk treats it as not a
        // descendant instead of blocking the move
        let mut tree = NodeTree::from_nodes([orphan_target, moving]);
        assert!(can_move(&tree, moving_id, Some(target_id)));
        assert!(move_node(&mut tree, moving_id, Some(target_id)).is_ok());
    }

    #[test]
    fn move_preserves_other_nodes() {
        let (mut tree, a, b, doc) = sample_tree();
        let before: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = tree.iter().map(|n| n.id).collect();
            ids.sort();
            ids
        };
        move_node(&mut tree, doc, Some(b)).unwrap();
        let mut after: Vec<Uuid> = tree.iter().map(|n| n.id).collect();
        after.sort();
        assert_eq!(before, after);
        assert_eq!(tree.get(a).unwrap().parent_id, None);
    }
}
