//! Builder utilities for ergonomic behavior tree construction.
//!
//! Each helper adds one node to the tree and connects the given children in
//! order, so a tree can be written bottom-up in nested calls. Nodes added
//! this way come after their children in the node list; finish with
//! [`BehaviorTree::change_root`] on the outermost node.
//!
//! ```rust
//! use behavior_tree::{BehaviorTree, builder};
//! use decision_core::{Engine, FunctionalAction, Status};
//!
//! let mut tree = BehaviorTree::new("guard");
//! let look = builder::action(&mut tree, "look", FunctionalAction::new(|| Status::Failure));
//! let walk = builder::action(&mut tree, "walk", FunctionalAction::new(|| Status::Success));
//! let root = builder::selector(&mut tree, "root", &[look, walk]).unwrap();
//! tree.change_root(root).unwrap();
//!
//! tree.start().unwrap();
//! tree.update().unwrap();
//! tree.update().unwrap();
//! assert_eq!(tree.status(), Status::Success);
//! ```

use decision_core::{Action, GraphError, NodeId, Perception};

use crate::{BehaviorTree, BtNode};

/// Adds `node` and connects `children` to it in order.
pub fn composite(
    tree: &mut BehaviorTree,
    name: &str,
    node: BtNode,
    children: &[NodeId],
) -> Result<NodeId, GraphError> {
    let id = tree.add(name, node);
    for &child in children {
        tree.connect(id, child)?;
    }
    Ok(id)
}

/// Creates a sequence node over `children`.
#[inline]
pub fn sequence(
    tree: &mut BehaviorTree,
    name: &str,
    children: &[NodeId],
) -> Result<NodeId, GraphError> {
    composite(tree, name, BtNode::sequence(), children)
}

/// Creates a selector node over `children`.
#[inline]
pub fn selector(
    tree: &mut BehaviorTree,
    name: &str,
    children: &[NodeId],
) -> Result<NodeId, GraphError> {
    composite(tree, name, BtNode::selector(), children)
}

/// Adds a decorator `node` wrapping `child`.
pub fn decorate(
    tree: &mut BehaviorTree,
    name: &str,
    node: BtNode,
    child: NodeId,
) -> Result<NodeId, GraphError> {
    composite(tree, name, node, &[child])
}

/// Creates an inverter over `child`.
#[inline]
pub fn inverter(tree: &mut BehaviorTree, name: &str, child: NodeId) -> Result<NodeId, GraphError> {
    decorate(tree, name, BtNode::inverter(), child)
}

/// Creates a succeeder over `child`.
#[inline]
pub fn succeeder(tree: &mut BehaviorTree, name: &str, child: NodeId) -> Result<NodeId, GraphError> {
    decorate(tree, name, BtNode::succeeder(), child)
}

/// Creates an action leaf.
#[inline]
pub fn action(tree: &mut BehaviorTree, name: &str, action: impl Action + 'static) -> NodeId {
    tree.add(name, BtNode::action(action))
}

/// Creates a perception leaf.
#[inline]
pub fn perception(
    tree: &mut BehaviorTree,
    name: &str,
    perception: impl Perception + 'static,
) -> NodeId {
    tree.add(name, BtNode::perception(perception))
}
