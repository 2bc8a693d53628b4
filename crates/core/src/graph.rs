//! Validated node/edge store shared by every engine.
//!
//! A [`Graph`] owns its nodes in an arena addressed by [`NodeId`] handles and
//! is the only place adjacency can change. Every edge is recorded twice, as a
//! child entry on the parent and a parent entry on the child, and both lists
//! keep their order so positions can be used for reordering.
//!
//! Node payloads describe their own connection rules through [`NodeKind`];
//! [`Graph::connect_at`] checks them before touching anything, so a failed
//! call never leaves a half-made edge behind.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::GraphError;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(0);

/// Stable handle to a node inside one specific graph.
///
/// Handles are never reused: removing a node retires its handle, and handles
/// from another graph are rejected by every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    graph: u32,
    index: u32,
}

impl NodeId {
    /// Returns the arena slot of this node.
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.graph, self.index)
    }
}

/// Free-form layout metadata. Never read by execution.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Maximum number of connections on one side of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Capacity {
    /// No limit.
    Unbounded,
    /// At most this many.
    AtMost(usize),
}

impl Capacity {
    /// Converts the `-1 = unbounded` convention used by authoring tools.
    pub const fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            Capacity::Unbounded
        } else {
            Capacity::AtMost(raw as usize)
        }
    }

    /// Returns `true` if one more connection fits next to `current` ones.
    #[inline]
    pub fn has_room(self, current: usize) -> bool {
        match self {
            Capacity::Unbounded => true,
            Capacity::AtMost(limit) => current < limit,
        }
    }
}

/// Connection rules of a node payload.
pub trait NodeKind {
    /// Short name of the concrete node type, used in error messages.
    fn kind_name(&self) -> &'static str;

    /// Maximum number of parents.
    fn max_inputs(&self) -> Capacity;

    /// Maximum number of children.
    fn max_outputs(&self) -> Capacity;

    /// Returns `true` if `child` is of the type this node may parent.
    fn accepts_child(&self, child: &Self) -> bool;
}

/// A node together with its adjacency and layout metadata.
#[derive(Debug)]
pub struct Vertex<N> {
    name: String,
    position: Position,
    parents: Vec<NodeId>,
    children: Vec<NodeId>,
    data: N,
}

impl<N> Vertex<N> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Parents in connection order.
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Children in connection order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn data(&self) -> &N {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut N {
        &mut self.data
    }

    /// Borrows the name and the payload at the same time.
    pub fn split_mut(&mut self) -> (&str, &mut N) {
        (&self.name, &mut self.data)
    }
}

/// Insertion-ordered arena of nodes and their edges.
#[derive(Debug)]
pub struct Graph<N> {
    id: u32,
    slots: Vec<Option<Vertex<N>>>,
    order: Vec<NodeId>,
    allow_loops: bool,
}

impl<N> Graph<N> {
    /// Creates an empty graph. `allow_loops` controls whether cycles may be formed.
    pub fn new(allow_loops: bool) -> Self {
        Self {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            order: Vec::new(),
            allow_loops,
        }
    }

    pub fn allows_loops(&self) -> bool {
        self.allow_loops
    }

    /// Adds an unconnected node at the end of the node list.
    pub fn add_node(&mut self, name: impl Into<String>, data: N) -> NodeId {
        let id = NodeId {
            graph: self.id,
            index: self.slots.len() as u32,
        };
        self.slots.push(Some(Vertex {
            name: name.into(),
            position: Position::ORIGIN,
            parents: Vec::new(),
            children: Vec::new(),
            data,
        }));
        self.order.push(id);
        tracing::trace!("graph {}: added node {}", self.id, id);
        id
    }

    /// Returns `true` if the node is owned by this graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.vertex(id).is_some()
    }

    pub fn vertex(&self, id: NodeId) -> Option<&Vertex<N>> {
        if id.graph != self.id {
            return None;
        }
        self.slots.get(id.index())?.as_ref()
    }

    pub fn vertex_mut(&mut self, id: NodeId) -> Option<&mut Vertex<N>> {
        if id.graph != self.id {
            return None;
        }
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub fn data(&self, id: NodeId) -> Option<&N> {
        self.vertex(id).map(Vertex::data)
    }

    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut N> {
        self.vertex_mut(id).map(Vertex::data_mut)
    }

    /// Name of the node, or an empty string for foreign handles.
    pub fn name(&self, id: NodeId) -> &str {
        self.vertex(id).map_or("", Vertex::name)
    }

    /// Children of the node in order; empty for foreign handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.vertex(id).map_or(&[] as &[NodeId], Vertex::children)
    }

    /// Parents of the node in order; empty for foreign handles.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        self.vertex(id).map_or(&[] as &[NodeId], Vertex::parents)
    }

    /// First node of the node list, used as root or entry point by engines.
    pub fn first(&self) -> Option<NodeId> {
        self.order.first().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node handles in list order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    /// Nodes in list order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Vertex<N>)> + '_ {
        self.order
            .iter()
            .filter_map(|&id| self.vertex(id).map(|vertex| (id, vertex)))
    }

    /// Position of the node in the node list.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    pub fn set_position(&mut self, id: NodeId, position: Position) -> Result<(), GraphError> {
        self.vertex_mut(id).ok_or(GraphError::NotOwned(id))?.position = position;
        Ok(())
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), GraphError> {
        self.vertex_mut(id).ok_or(GraphError::NotOwned(id))?.name = name.into();
        Ok(())
    }

    /// Removes an unconnected node and returns its payload.
    ///
    /// # Errors
    ///
    /// `StillConnected` if the node has any parent or child.
    pub fn remove_node(&mut self, id: NodeId) -> Result<N, GraphError> {
        let vertex = self.vertex(id).ok_or(GraphError::NotOwned(id))?;
        if !vertex.parents.is_empty() || !vertex.children.is_empty() {
            return Err(GraphError::StillConnected(vertex.name.clone()));
        }
        self.order.retain(|&other| other != id);
        let vertex = self.slots[id.index()]
            .take()
            .ok_or(GraphError::NotOwned(id))?;
        tracing::trace!("graph {}: removed node {}", self.id, id);
        Ok(vertex.data)
    }

    /// Removes every edge of the node, then the node itself.
    pub fn disconnect_and_remove(&mut self, id: NodeId) -> Result<N, GraphError> {
        let vertex = self.vertex(id).ok_or(GraphError::NotOwned(id))?;
        let parents = vertex.parents.clone();
        let children = vertex.children.clone();
        for parent in parents {
            self.unlink(parent, id);
        }
        for child in children {
            self.unlink(id, child);
        }
        self.remove_node(id)
    }

    /// Moves a node to `index` in the node list.
    pub fn reorder_node(&mut self, id: NodeId, index: usize) -> Result<(), GraphError> {
        let current = self.index_of(id).ok_or(GraphError::NotOwned(id))?;
        if index >= self.order.len() {
            return Err(GraphError::IndexOutOfBounds {
                index,
                len: self.order.len(),
            });
        }
        let node = self.order.remove(current);
        self.order.insert(index, node);
        Ok(())
    }

    /// Returns `true` if `ancestor` can be reached from `node` by walking
    /// parent edges. A node reaches itself.
    pub fn are_nodes_connected(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if current == ancestor {
                return true;
            }
            if visited.insert(current) {
                pending.extend_from_slice(self.parents(current));
            }
        }
        false
    }

    /// Removes the edge `parent -> child`.
    pub fn disconnect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.check_owned(parent)?;
        self.check_owned(child)?;
        if !self.children(parent).contains(&child) {
            return Err(GraphError::NotConnected {
                parent: self.name(parent).to_owned(),
                child: self.name(child).to_owned(),
            });
        }
        self.unlink(parent, child);
        Ok(())
    }

    /// Removes the edge to the child at `index`.
    pub fn disconnect_child(&mut self, node: NodeId, index: usize) -> Result<(), GraphError> {
        let children = self.vertex(node).ok_or(GraphError::NotOwned(node))?.children();
        let child = *children.get(index).ok_or(GraphError::IndexOutOfBounds {
            index,
            len: children.len(),
        })?;
        self.unlink(node, child);
        Ok(())
    }

    /// Removes the edge from the parent at `index`.
    pub fn disconnect_parent(&mut self, node: NodeId, index: usize) -> Result<(), GraphError> {
        let parents = self.vertex(node).ok_or(GraphError::NotOwned(node))?.parents();
        let parent = *parents.get(index).ok_or(GraphError::IndexOutOfBounds {
            index,
            len: parents.len(),
        })?;
        self.unlink(parent, node);
        Ok(())
    }

    fn check_owned(&self, id: NodeId) -> Result<&Vertex<N>, GraphError> {
        self.vertex(id).ok_or(GraphError::NotOwned(id))
    }

    /// Removes both entries of an edge. Callers guarantee the edge exists.
    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(vertex) = self.vertex_mut(parent)
            && let Some(pos) = vertex.children.iter().position(|&c| c == child)
        {
            vertex.children.remove(pos);
        }
        if let Some(vertex) = self.vertex_mut(child)
            && let Some(pos) = vertex.parents.iter().position(|&p| p == parent)
        {
            vertex.parents.remove(pos);
        }
        tracing::trace!("graph {}: disconnected {} -> {}", self.id, parent, child);
    }
}

impl<N: NodeKind> Graph<N> {
    /// Appends the edge `parent -> child`.
    pub fn connect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.connect_at(parent, child, None, None)
    }

    /// Inserts the edge `parent -> child`, optionally at given positions in
    /// the parent's child list and the child's parent list.
    ///
    /// # Errors
    ///
    /// Checked in order: self connection, ownership, child type, output
    /// limit, input limit, duplicate edge, loop (unless loops are allowed),
    /// and finally the insertion indices. Nothing changes on error.
    pub fn connect_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        child_index: Option<usize>,
        parent_index: Option<usize>,
    ) -> Result<(), GraphError> {
        if parent == child {
            return Err(GraphError::SelfConnection(parent));
        }
        let source = self.check_owned(parent)?;
        let target = self.check_owned(child)?;

        if !source.data.accepts_child(&target.data) {
            return Err(GraphError::IncompatibleChild {
                parent: source.name.clone(),
                parent_kind: source.data.kind_name(),
                child: target.name.clone(),
                child_kind: target.data.kind_name(),
            });
        }
        if let Capacity::AtMost(limit) = source.data.max_outputs()
            && source.children.len() >= limit
        {
            return Err(GraphError::OutputLimitReached {
                node: source.name.clone(),
                limit,
            });
        }
        if let Capacity::AtMost(limit) = target.data.max_inputs()
            && target.parents.len() >= limit
        {
            return Err(GraphError::InputLimitReached {
                node: target.name.clone(),
                limit,
            });
        }
        if source.children.contains(&child) {
            return Err(GraphError::AlreadyConnected {
                parent: source.name.clone(),
                child: target.name.clone(),
            });
        }
        if !self.allow_loops && self.are_nodes_connected(child, parent) {
            return Err(GraphError::LoopDetected {
                parent: source.name.clone(),
                child: target.name.clone(),
            });
        }

        let child_slot = child_index.unwrap_or(source.children.len());
        if child_slot > source.children.len() {
            return Err(GraphError::IndexOutOfBounds {
                index: child_slot,
                len: source.children.len(),
            });
        }
        let parent_slot = parent_index.unwrap_or(target.parents.len());
        if parent_slot > target.parents.len() {
            return Err(GraphError::IndexOutOfBounds {
                index: parent_slot,
                len: target.parents.len(),
            });
        }

        if let Some(vertex) = self.vertex_mut(parent) {
            vertex.children.insert(child_slot, child);
        }
        if let Some(vertex) = self.vertex_mut(child) {
            vertex.parents.insert(parent_slot, parent);
        }
        tracing::trace!("graph {}: connected {} -> {}", self.id, parent, child);
        Ok(())
    }
}

impl<N> Default for Graph<N> {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Kind {
        Branch,
        Leaf,
        Single,
    }

    impl NodeKind for Kind {
        fn kind_name(&self) -> &'static str {
            match self {
                Kind::Branch => "branch",
                Kind::Leaf => "leaf",
                Kind::Single => "single",
            }
        }

        fn max_inputs(&self) -> Capacity {
            match self {
                Kind::Single => Capacity::AtMost(1),
                _ => Capacity::Unbounded,
            }
        }

        fn max_outputs(&self) -> Capacity {
            match self {
                Kind::Leaf => Capacity::AtMost(0),
                Kind::Single => Capacity::AtMost(1),
                Kind::Branch => Capacity::Unbounded,
            }
        }

        fn accepts_child(&self, _child: &Self) -> bool {
            true
        }
    }

    #[test]
    fn connect_then_disconnect_restores_adjacency() {
        let mut graph = Graph::new(false);
        let root = graph.add_node("root", Kind::Branch);
        let first = graph.add_node("first", Kind::Leaf);
        let second = graph.add_node("second", Kind::Leaf);
        graph.connect(root, first).unwrap();

        graph.connect_at(root, second, Some(0), None).unwrap();
        assert_eq!(graph.children(root), &[second, first]);
        assert_eq!(graph.parents(second), &[root]);

        graph.disconnect(root, second).unwrap();
        assert_eq!(graph.children(root), &[first]);
        assert!(graph.parents(second).is_empty());
    }

    #[test]
    fn detects_transitive_cycle() {
        let mut graph = Graph::new(false);
        let a = graph.add_node("a", Kind::Branch);
        let b = graph.add_node("b", Kind::Branch);
        let c = graph.add_node("c", Kind::Branch);
        graph.connect(a, b).unwrap();
        graph.connect(b, c).unwrap();

        assert!(graph.are_nodes_connected(a, c));
        assert!(!graph.are_nodes_connected(c, a));
        assert!(matches!(
            graph.connect(c, a),
            Err(GraphError::LoopDetected { .. })
        ));
        assert!(graph.children(c).is_empty());
    }

    #[test]
    fn loops_are_accepted_when_enabled() {
        let mut graph = Graph::new(true);
        let a = graph.add_node("a", Kind::Branch);
        let b = graph.add_node("b", Kind::Branch);
        let c = graph.add_node("c", Kind::Branch);
        graph.connect(a, b).unwrap();
        graph.connect(b, c).unwrap();
        graph.connect(c, a).unwrap();
        assert_eq!(graph.children(c), &[a]);
    }

    #[test]
    fn cardinality_limits_are_enforced() {
        let mut graph = Graph::new(false);
        let root = graph.add_node("root", Kind::Branch);
        let other = graph.add_node("other", Kind::Branch);
        let single = graph.add_node("single", Kind::Single);
        let leaf = graph.add_node("leaf", Kind::Leaf);

        graph.connect(root, single).unwrap();
        assert_eq!(
            graph.connect(other, single),
            Err(GraphError::InputLimitReached {
                node: "single".into(),
                limit: 1
            })
        );
        assert!(matches!(
            graph.connect(leaf, other),
            Err(GraphError::OutputLimitReached { .. })
        ));
        assert!(matches!(
            graph.connect(root, single),
            Err(GraphError::AlreadyConnected { .. })
        ));
    }

    #[test]
    fn connected_nodes_cannot_be_removed() {
        let mut graph = Graph::new(false);
        let root = graph.add_node("root", Kind::Branch);
        let leaf = graph.add_node("leaf", Kind::Leaf);
        graph.connect(root, leaf).unwrap();

        assert_eq!(
            graph.remove_node(leaf),
            Err(GraphError::StillConnected("leaf".into()))
        );
        assert_eq!(graph.disconnect_and_remove(leaf), Ok(Kind::Leaf));
        assert!(graph.children(root).is_empty());
        assert!(!graph.contains(leaf));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn handles_from_other_graphs_are_rejected() {
        let mut graph = Graph::new(false);
        let mut other = Graph::new(false);
        let local = graph.add_node("local", Kind::Branch);
        let foreign = other.add_node("foreign", Kind::Leaf);

        assert_eq!(
            graph.connect(local, foreign),
            Err(GraphError::NotOwned(foreign))
        );
    }

    #[test]
    fn reorder_moves_node_in_list() {
        let mut graph = Graph::new(false);
        let a = graph.add_node("a", Kind::Leaf);
        let b = graph.add_node("b", Kind::Leaf);
        assert_eq!(graph.first(), Some(a));

        graph.reorder_node(b, 0).unwrap();
        assert_eq!(graph.first(), Some(b));
        assert_eq!(graph.ids().collect::<Vec<_>>(), vec![b, a]);
        assert!(matches!(
            graph.reorder_node(a, 5),
            Err(GraphError::IndexOutOfBounds { index: 5, len: 2 })
        ));
    }

    #[test]
    fn disconnect_by_index() {
        let mut graph = Graph::new(false);
        let root = graph.add_node("root", Kind::Branch);
        let a = graph.add_node("a", Kind::Leaf);
        let b = graph.add_node("b", Kind::Leaf);
        graph.connect(root, a).unwrap();
        graph.connect(root, b).unwrap();

        graph.disconnect_child(root, 1).unwrap();
        assert_eq!(graph.children(root), &[a]);
        graph.disconnect_parent(a, 0).unwrap();
        assert!(graph.children(root).is_empty());
        assert!(graph.disconnect_child(root, 0).is_err());
    }
}
