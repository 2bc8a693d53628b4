//! Behaviour tree engine.

use decision_core::{
    Engine, ExecutionContext, ExecutionError, ExecutionResult, Graph, GraphError, Lifecycle, NodeId,
    Status,
};

use crate::node::{BtKind, BtNode};

/// Walks a tree graph and applies the strict node lifecycle.
///
/// While a node's own hooks run, its payload is moved out of the graph so the
/// hooks can recurse into children. Nodes have at most one parent and the
/// graph has no loops, so a node is never reached again from its own subtree.
pub(crate) struct Ticker<'a> {
    graph: &'a mut Graph<BtNode>,
    ctx: &'a ExecutionContext,
}

impl<'a> Ticker<'a> {
    pub(crate) fn new(graph: &'a mut Graph<BtNode>, ctx: &'a ExecutionContext) -> Self {
        Self { graph, ctx }
    }

    pub(crate) fn ctx(&self) -> &'a ExecutionContext {
        self.ctx
    }

    pub(crate) fn name(&self, id: NodeId) -> String {
        self.graph.name(id).to_owned()
    }

    pub(crate) fn child_count(&self, id: NodeId) -> usize {
        self.graph.children(id).len()
    }

    /// Child at `index`, or `MissingConnection` naming the parent.
    pub(crate) fn child(&self, id: NodeId, index: usize) -> ExecutionResult<NodeId> {
        self.graph
            .children(id)
            .get(index)
            .copied()
            .ok_or_else(|| ExecutionError::MissingConnection(self.name(id)))
    }

    pub(crate) fn status(&self, id: NodeId) -> Status {
        self.graph
            .data(id)
            .map_or(Status::None, |node| node.lifecycle.status())
    }

    pub(crate) fn start(&mut self, id: NodeId) -> ExecutionResult<()> {
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_startable(name)?;
        node.lifecycle.mark_started();
        tracing::trace!("start '{}'", name);
        self.with_kind(id, |kind, tree| kind.start(tree, id))
    }

    /// Ticks a node once and records the status it returns. Finished nodes
    /// keep their status without running any hook.
    pub(crate) fn update(&mut self, id: NodeId) -> ExecutionResult<Status> {
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_started(name)?;
        if node.lifecycle.take_paused() {
            tracing::trace!("resume '{}'", name);
            self.with_kind(id, |kind, tree| {
                kind.resume(tree);
                Ok(())
            })?;
        }

        let current = self.status(id);
        if current.is_finished() {
            return Ok(current);
        }
        let status = self.with_kind(id, |kind, tree| kind.update(tree, id))?;
        if let Some(node) = self.graph.data_mut(id) {
            node.lifecycle.set_status(status);
        }
        Ok(status)
    }

    pub(crate) fn stop(&mut self, id: NodeId) -> ExecutionResult<()> {
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_started(name)?;
        node.lifecycle.mark_stopped();
        tracing::trace!("stop '{}'", name);
        self.with_kind(id, |kind, tree| kind.stop(tree, id))
    }

    /// Stops the node unless it already is.
    pub(crate) fn stop_if_started(&mut self, id: NodeId) -> ExecutionResult<()> {
        if self.status(id) == Status::None {
            return Ok(());
        }
        self.stop(id)
    }

    /// Stops the child at `index` if it exists and is started. A node whose
    /// start failed can be stopped without its children.
    pub(crate) fn stop_child(&mut self, id: NodeId, index: usize) -> ExecutionResult<()> {
        match self.child(id, index) {
            Ok(child) => self.stop_if_started(child),
            Err(_) => Ok(()),
        }
    }

    /// Pauses a running node; no-op otherwise.
    pub(crate) fn pause(&mut self, id: NodeId) {
        let Some(node) = self.graph.data_mut(id) else {
            return;
        };
        if node.lifecycle.mark_paused() {
            let _ = self.with_kind(id, |kind, tree| {
                kind.pause(tree, id);
                Ok(())
            });
        }
    }

    fn with_kind<R>(
        &mut self,
        id: NodeId,
        op: impl FnOnce(&mut BtKind, &mut Self) -> ExecutionResult<R>,
    ) -> ExecutionResult<R> {
        let node = self
            .graph
            .data_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let mut kind = std::mem::replace(&mut node.kind, BtKind::vacant());
        let result = op(&mut kind, self);
        if let Some(node) = self.graph.data_mut(id) {
            node.kind = kind;
        }
        result
    }
}

/// Hierarchical task tree executed from its root, the first node of the graph.
///
/// # Example
///
/// ```rust
/// use behavior_tree::{BehaviorTree, BtNode};
/// use decision_core::{Engine, FunctionalAction, Status};
///
/// let mut tree = BehaviorTree::new("guard");
/// let root = tree.add("patrol", BtNode::sequence());
/// let walk = tree.add("walk", BtNode::action(FunctionalAction::new(|| Status::Success)));
/// tree.connect(root, walk).unwrap();
///
/// tree.start().unwrap();
/// tree.update().unwrap();
/// assert_eq!(tree.status(), Status::Success);
/// ```
#[derive(Debug)]
pub struct BehaviorTree {
    name: String,
    lifecycle: Lifecycle,
    context: ExecutionContext,
    graph: Graph<BtNode>,
}

impl BehaviorTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::new(),
            context: ExecutionContext::empty(),
            graph: Graph::new(false),
        }
    }

    /// Adds an unconnected node. The first node added is the root.
    pub fn add(&mut self, name: impl Into<String>, node: BtNode) -> NodeId {
        self.graph.add_node(name, node)
    }

    pub fn connect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.connect(parent, child)
    }

    /// Connects `child` at position `index` among the children of `parent`.
    pub fn connect_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
    ) -> Result<(), GraphError> {
        self.graph.connect_at(parent, child, Some(index), None)
    }

    pub fn disconnect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.disconnect(parent, child)
    }

    /// Removes an unconnected node and returns it.
    pub fn remove(&mut self, id: NodeId) -> Result<BtNode, GraphError> {
        self.graph.remove_node(id)
    }

    /// Makes `id` the root by moving it to the front of the node list.
    pub fn change_root(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.graph.reorder_node(id, 0)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.graph.first()
    }

    pub fn graph(&self) -> &Graph<BtNode> {
        &self.graph
    }

    /// Mutable access for editors. Adjacency still only changes through the
    /// validated graph API.
    pub fn graph_mut(&mut self) -> &mut Graph<BtNode> {
        &mut self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&BtNode> {
        self.graph.data(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut BtNode> {
        self.graph.data_mut(id)
    }

    pub fn status_of(&self, id: NodeId) -> Option<Status> {
        self.node(id).map(BtNode::status)
    }

    pub fn is_node_paused(&self, id: NodeId) -> Option<bool> {
        self.node(id).map(BtNode::is_paused)
    }

    fn ticker(&mut self) -> (Ticker<'_>, ExecutionResult<NodeId>) {
        let root = self
            .graph
            .first()
            .ok_or_else(|| ExecutionError::EmptyGraph(self.name.clone()));
        (Ticker::new(&mut self.graph, &self.context), root)
    }
}

impl Engine for BehaviorTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn set_context(&mut self, ctx: ExecutionContext) {
        self.context = ctx;
    }

    fn on_started(&mut self) -> ExecutionResult<()> {
        let (mut ticker, root) = self.ticker();
        ticker.start(root?)
    }

    fn on_updated(&mut self) -> ExecutionResult<()> {
        let (mut ticker, root) = self.ticker();
        let status = ticker.update(root?)?;
        if status.is_finished() {
            tracing::debug!("tree '{}' finished with {}", self.name, status);
            self.lifecycle.set_status(status);
        }
        Ok(())
    }

    fn on_stopped(&mut self) -> ExecutionResult<()> {
        let (mut ticker, root) = self.ticker();
        match root {
            Ok(root) => ticker.stop_if_started(root),
            Err(_) => Ok(()),
        }
    }

    fn on_paused(&mut self) {
        let (mut ticker, root) = self.ticker();
        if let Ok(root) = root {
            ticker.pause(root);
        }
    }

    fn on_resumed(&mut self) {}
}
