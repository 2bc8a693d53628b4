//! Utility system engine.

use decision_core::{
    Engine, ExecutionContext, ExecutionError, ExecutionResult, Graph, GraphError, Lifecycle,
    NodeId, Status,
};

use crate::config::UtilityConfig;
use crate::element::{BucketPolicy, ElementKind};
use crate::node::{UtilityKind, UtilityNode};

/// How a node derives its utility.
#[derive(Clone, Copy)]
enum Scoring {
    /// From its child factors.
    Factor,
    /// From its single factor child.
    Element,
    /// From its best child element.
    Bucket,
}

/// Walks a utility graph: evaluates utilities and applies the element
/// lifecycle.
pub(crate) struct Evaluator<'a> {
    graph: &'a mut Graph<UtilityNode>,
    ctx: &'a ExecutionContext,
    /// Terminal status requested for the whole system during this call.
    finish: Option<Status>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(graph: &'a mut Graph<UtilityNode>, ctx: &'a ExecutionContext) -> Self {
        Self {
            graph,
            ctx,
            finish: None,
        }
    }

    fn name(&self, id: NodeId) -> String {
        self.graph.name(id).to_owned()
    }

    fn status(&self, id: NodeId) -> Status {
        self.graph
            .data(id)
            .map_or(Status::None, |node| node.lifecycle.status())
    }

    fn is_high_priority(&self, id: NodeId) -> bool {
        self.graph
            .data(id)
            .and_then(UtilityNode::as_element)
            .is_some_and(|element| element.is_high_priority())
    }

    /// Marks every node for recomputation.
    pub(crate) fn mark_dirty(&mut self) {
        let ids: Vec<NodeId> = self.graph.ids().collect();
        for id in ids {
            if let Some(node) = self.graph.data_mut(id) {
                node.dirty = true;
            }
        }
    }

    /// Returns the utility of `id`, recomputing it if the node is dirty or
    /// `force` is set.
    pub(crate) fn utility(&mut self, id: NodeId, force: bool) -> ExecutionResult<f32> {
        let node = self.graph.data(id).ok_or(ExecutionError::UnknownNode(id))?;
        if !force && !node.dirty {
            return Ok(node.utility);
        }
        let scoring = match &node.kind {
            UtilityKind::Factor(_) => Scoring::Factor,
            UtilityKind::Element(element) if element.is_bucket() => Scoring::Bucket,
            UtilityKind::Element(_) => Scoring::Element,
        };
        let children = self.graph.children(id).to_vec();

        let utility = match scoring {
            Scoring::Factor => {
                let inputs = children
                    .iter()
                    .map(|&child| self.utility(child, false))
                    .collect::<ExecutionResult<Vec<f32>>>()?;
                let computed = match self.graph.data_mut(id) {
                    Some(UtilityNode {
                        kind: UtilityKind::Factor(factor),
                        ..
                    }) => factor.compute(&inputs),
                    _ => None,
                };
                computed.ok_or_else(|| ExecutionError::MissingConnection(self.name(id)))?
            }
            Scoring::Element => {
                let factor = children
                    .first()
                    .copied()
                    .ok_or_else(|| ExecutionError::MissingFactor(self.name(id)))?;
                self.utility(factor, false)?
            }
            Scoring::Bucket => {
                let mut best = 0.0_f32;
                for child in children {
                    best = best.max(self.utility(child, false)?);
                }
                best
            }
        };

        if let Some(node) = self.graph.data_mut(id) {
            node.utility = utility;
            node.dirty = false;
        }
        tracing::trace!("utility of '{}' = {}", self.graph.name(id), utility);
        Ok(utility)
    }

    /// Picks the strictly best candidate; the first one wins ties. The
    /// utility of `previous` is multiplied by `inertia`. With `priority_cut`
    /// a high-priority candidate that is best so far ends the scan.
    pub(crate) fn select(
        &mut self,
        candidates: &[NodeId],
        previous: Option<NodeId>,
        inertia: f32,
        priority_cut: bool,
    ) -> ExecutionResult<Option<NodeId>> {
        let mut best: Option<(NodeId, f32)> = None;
        for &candidate in candidates {
            let mut utility = self.utility(candidate, false)?;
            if previous == Some(candidate) {
                utility *= inertia;
            }
            if best.is_none_or(|(_, top)| utility > top) {
                best = Some((candidate, utility));
                if priority_cut && self.is_high_priority(candidate) {
                    break;
                }
            }
        }
        Ok(best.map(|(id, _)| id))
    }

    /// Runs `selected` for this tick, given the element that ran last tick.
    ///
    /// A new selection stops the previous element and starts the new one
    /// without updating it. A selection that already finished is restarted.
    /// Otherwise the selection is updated.
    pub(crate) fn run(&mut self, previous: Option<NodeId>, selected: NodeId) -> ExecutionResult<Status> {
        if previous != Some(selected) {
            if let Some(previous) = previous {
                tracing::debug!(
                    "selection changed from '{}' to '{}'",
                    self.graph.name(previous),
                    self.graph.name(selected)
                );
                self.stop_if_started(previous)?;
            }
            self.start_or_restart(selected)?;
            return Ok(self.status(selected));
        }
        match self.status(selected) {
            Status::Running => self.update(selected),
            _ => {
                self.start_or_restart(selected)?;
                Ok(self.status(selected))
            }
        }
    }

    fn start_or_restart(&mut self, id: NodeId) -> ExecutionResult<()> {
        self.stop_if_started(id)?;
        self.start(id)
    }

    pub(crate) fn start(&mut self, id: NodeId) -> ExecutionResult<()> {
        let ctx = self.ctx;
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_startable(name)?;
        node.lifecycle.mark_started();
        tracing::trace!("start '{}'", name);

        let Some(kind) = node.element_kind_mut() else {
            return Ok(());
        };
        match kind {
            ElementKind::Action(action) => {
                let task = action
                    .task
                    .as_mut()
                    .ok_or_else(|| ExecutionError::MissingTask(name.to_owned()))?;
                task.start(ctx)
            }
            ElementKind::Exit(status) => {
                let status = *status;
                if !status.is_finished() {
                    return Err(ExecutionError::InvalidFinishStatus(status));
                }
                node.lifecycle.set_status(status);
                self.finish = Some(status);
                Ok(())
            }
            ElementKind::Bucket(bucket) => {
                let (policy, inertia) = (bucket.policy, bucket.config.inertia);
                let children = self.graph.children(id).to_vec();
                let selected = self
                    .select(&children, None, inertia, policy == BucketPolicy::Inertia)?
                    .ok_or_else(|| ExecutionError::MissingConnection(self.name(id)))?;
                self.set_bucket_selection(id, Some(selected));
                self.start_or_restart(selected)
            }
        }
    }

    pub(crate) fn update(&mut self, id: NodeId) -> ExecutionResult<Status> {
        let ctx = self.ctx;
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_started(name)?;
        let resumed = node.lifecycle.take_paused();
        let current = node.lifecycle.status();
        if current.is_finished() {
            return Ok(current);
        }

        let status = match node.element_kind_mut() {
            Some(ElementKind::Action(action)) => {
                let finishes_system = action.finish_system_on_complete;
                let task = action
                    .task
                    .as_mut()
                    .ok_or_else(|| ExecutionError::MissingTask(name.to_owned()))?;
                if resumed {
                    task.resume(ctx);
                }
                let status = match task.update(ctx)? {
                    Status::None => Status::Running,
                    status => status,
                };
                if finishes_system && status.is_finished() {
                    tracing::debug!("'{}' completed with {}, finishing system", name, status);
                    self.finish = Some(status);
                }
                status
            }
            Some(ElementKind::Exit(status)) => *status,
            Some(ElementKind::Bucket(bucket)) => {
                let (policy, inertia, previous) =
                    (bucket.policy, bucket.config.inertia, bucket.selected);
                self.update_bucket(id, policy, inertia, previous)?
            }
            None => current,
        };
        if let Some(node) = self.graph.data_mut(id) {
            node.lifecycle.set_status(status);
        }
        Ok(status)
    }

    fn update_bucket(
        &mut self,
        id: NodeId,
        policy: BucketPolicy,
        inertia: f32,
        previous: Option<NodeId>,
    ) -> ExecutionResult<Status> {
        let locked = policy == BucketPolicy::Lock
            && previous.is_some_and(|element| self.status(element) == Status::Running);
        let selected = if locked {
            previous
        } else {
            let children = self.graph.children(id).to_vec();
            self.select(&children, previous, inertia, policy == BucketPolicy::Inertia)?
        };
        let selected = selected.ok_or_else(|| ExecutionError::MissingConnection(self.name(id)))?;
        self.set_bucket_selection(id, Some(selected));
        self.run(previous, selected)
    }

    fn set_bucket_selection(&mut self, id: NodeId, selected: Option<NodeId>) {
        if let Some(ElementKind::Bucket(bucket)) =
            self.graph.data_mut(id).and_then(UtilityNode::element_kind_mut)
        {
            bucket.selected = selected;
        }
    }

    pub(crate) fn stop(&mut self, id: NodeId) -> ExecutionResult<()> {
        let ctx = self.ctx;
        let vertex = self
            .graph
            .vertex_mut(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_started(name)?;
        node.lifecycle.mark_stopped();
        tracing::trace!("stop '{}'", name);

        match node.element_kind_mut() {
            Some(ElementKind::Action(action)) => match &mut action.task {
                Some(task) => task.stop(ctx),
                None => Ok(()),
            },
            Some(ElementKind::Bucket(bucket)) => match bucket.selected.take() {
                Some(selected) => self.stop_if_started(selected),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    pub(crate) fn stop_if_started(&mut self, id: NodeId) -> ExecutionResult<()> {
        if self.status(id) == Status::None {
            return Ok(());
        }
        self.stop(id)
    }

    /// Pauses a running element and its running selection.
    pub(crate) fn pause(&mut self, id: NodeId) {
        let ctx = self.ctx;
        let Some(node) = self.graph.data_mut(id) else {
            return;
        };
        if !node.lifecycle.mark_paused() {
            return;
        }
        match node.element_kind_mut() {
            Some(ElementKind::Action(action)) => {
                if let Some(task) = &mut action.task {
                    task.pause(ctx);
                }
            }
            Some(ElementKind::Bucket(bucket)) => {
                if let Some(selected) = bucket.selected {
                    self.pause(selected);
                }
            }
            _ => {}
        }
    }
}

/// Utility-driven arbitration between root-level elements.
///
/// Candidates are the elements without a parent. Every tick all utilities
/// are marked dirty, the candidates are scored, the running one gets the
/// inertia bonus, and the strictly best candidate runs.
///
/// # Example
///
/// ```rust
/// use decision_core::{Engine, FunctionalAction, Status};
/// use utility_system::{UtilityNode, UtilitySystem};
///
/// let mut system = UtilitySystem::new("needs");
/// let eat = system.add("eat", UtilityNode::action(FunctionalAction::new(|| Status::Running)));
/// let hunger = system.add("hunger", UtilityNode::constant(0.8));
/// system.connect(eat, hunger).unwrap();
/// let sleep = system.add("sleep", UtilityNode::action(FunctionalAction::new(|| Status::Running)));
/// let tired = system.add("tired", UtilityNode::constant(0.3));
/// system.connect(sleep, tired).unwrap();
///
/// system.start().unwrap();
/// assert_eq!(system.selected(), Some(eat));
/// ```
#[derive(Debug)]
pub struct UtilitySystem {
    name: String,
    lifecycle: Lifecycle,
    context: ExecutionContext,
    graph: Graph<UtilityNode>,
    config: UtilityConfig,
    selected: Option<NodeId>,
}

impl UtilitySystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, UtilityConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: UtilityConfig) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::new(),
            context: ExecutionContext::empty(),
            graph: Graph::new(false),
            config,
            selected: None,
        }
    }

    pub fn add(&mut self, name: impl Into<String>, node: UtilityNode) -> NodeId {
        self.graph.add_node(name, node)
    }

    pub fn connect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.connect(parent, child)
    }

    pub fn disconnect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.disconnect(parent, child)
    }

    /// Removes an unconnected node and returns it.
    pub fn remove(&mut self, id: NodeId) -> Result<UtilityNode, GraphError> {
        self.graph.remove_node(id)
    }

    pub fn config(&self) -> UtilityConfig {
        self.config
    }

    pub fn set_config(&mut self, config: UtilityConfig) {
        self.config = config;
    }

    /// Elements without a parent, in node order.
    pub fn candidates(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|(_, vertex)| vertex.data().is_element() && vertex.parents().is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Candidate currently running.
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn graph(&self) -> &Graph<UtilityNode> {
        &self.graph
    }

    /// Mutable access for editors. Adjacency still only changes through the
    /// validated graph API.
    pub fn graph_mut(&mut self) -> &mut Graph<UtilityNode> {
        &mut self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&UtilityNode> {
        self.graph.data(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut UtilityNode> {
        self.graph.data_mut(id)
    }

    pub fn status_of(&self, id: NodeId) -> Option<Status> {
        self.node(id).map(UtilityNode::status)
    }

    /// Utility cached by the last evaluation of `id`.
    pub fn utility_of(&self, id: NodeId) -> Option<f32> {
        self.node(id).map(UtilityNode::utility)
    }

    /// Recomputes the utility of `id` from fresh inputs.
    ///
    /// # Errors
    ///
    /// `MissingFactor` or `MissingConnection` when part of the subgraph is
    /// not wired.
    pub fn evaluate(&mut self, id: NodeId) -> ExecutionResult<f32> {
        let mut evaluator = Evaluator::new(&mut self.graph, &self.context);
        evaluator.mark_dirty();
        evaluator.utility(id, true)
    }

    /// Checks the wiring every element needs before anything starts.
    fn validate(&self) -> ExecutionResult<()> {
        for (_, vertex) in self.graph.iter() {
            let Some(element) = vertex.data().as_element() else {
                continue;
            };
            if vertex.children().is_empty() {
                let name = vertex.name().to_owned();
                return Err(match element.kind() {
                    ElementKind::Bucket(_) => ExecutionError::MissingConnection(name),
                    _ => ExecutionError::MissingFactor(name),
                });
            }
        }
        Ok(())
    }

    fn apply_finish(&mut self, finish: Option<Status>) {
        if let Some(status) = finish {
            tracing::debug!("utility system '{}' finished with {}", self.name, status);
            self.lifecycle.set_status(status);
        }
    }
}

impl Engine for UtilitySystem {
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
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err(ExecutionError::MissingCandidates(self.name.clone()));
        }
        self.validate()?;

        let mut evaluator = Evaluator::new(&mut self.graph, &self.context);
        evaluator.mark_dirty();
        let selected = evaluator
            .select(&candidates, None, self.config.inertia, false)?
            .ok_or_else(|| ExecutionError::MissingCandidates(self.name.clone()))?;
        let result = evaluator.start(selected);
        let finish = evaluator.finish;
        self.selected = Some(selected);
        result?;
        self.apply_finish(finish);
        Ok(())
    }

    fn on_updated(&mut self) -> ExecutionResult<()> {
        let candidates = self.candidates();
        let previous = self.selected;

        let mut evaluator = Evaluator::new(&mut self.graph, &self.context);
        evaluator.mark_dirty();
        let selected = evaluator
            .select(&candidates, previous, self.config.inertia, false)?
            .ok_or_else(|| ExecutionError::MissingCandidates(self.name.clone()))?;
        let result = evaluator.run(previous, selected);
        let finish = evaluator.finish;
        self.selected = Some(selected);
        result?;
        self.apply_finish(finish);
        Ok(())
    }

    fn on_stopped(&mut self) -> ExecutionResult<()> {
        let Some(selected) = self.selected.take() else {
            return Ok(());
        };
        Evaluator::new(&mut self.graph, &self.context).stop_if_started(selected)
    }

    fn on_paused(&mut self) {
        if let Some(selected) = self.selected {
            Evaluator::new(&mut self.graph, &self.context).pause(selected);
        }
    }

    fn on_resumed(&mut self) {}
}
