//! State machine engine.

use decision_core::{
    Engine, ExecutionContext, ExecutionError, ExecutionResult, Graph, GraphError, Lifecycle,
    NodeId, Status, weighted_index,
};

use crate::state::{FsmKind, FsmNode, StateKind};
use crate::transition::{Transition, TransitionKind};

/// Finite-state machine executed from its entry state, the first node of the
/// graph.
///
/// Each tick updates the current state, then scans its outgoing transitions
/// in declaration order followed by those of every any-state. The first
/// eligible transition fires and ends the scan.
///
/// # Example
///
/// ```rust
/// use decision_core::{Engine, FunctionalAction, Status};
/// use state_machine::{FsmNode, StateMachine, Transition};
///
/// let mut fsm = StateMachine::new("door");
/// let closed = fsm.add("closed", FsmNode::state(FunctionalAction::new(|| Status::Running)));
/// let open = fsm.add("open", FsmNode::state(FunctionalAction::new(|| Status::Running)));
/// fsm.add_transition("push", closed, Transition::to_state(), &[open]).unwrap();
///
/// fsm.start().unwrap();
/// fsm.update().unwrap();
/// assert_eq!(fsm.current_state(), Some(open));
/// ```
#[derive(Debug)]
pub struct StateMachine {
    name: String,
    lifecycle: Lifecycle,
    context: ExecutionContext,
    graph: Graph<FsmNode>,
    current: Option<NodeId>,
    stack: Vec<NodeId>,
}

impl StateMachine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::new(),
            context: ExecutionContext::empty(),
            graph: Graph::new(true),
            current: None,
            stack: Vec::new(),
        }
    }

    /// Adds an unconnected node. The first node added is the entry state.
    pub fn add(&mut self, name: impl Into<String>, node: FsmNode) -> NodeId {
        self.graph.add_node(name, node)
    }

    pub fn connect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.connect(parent, child)
    }

    pub fn disconnect(&mut self, parent: NodeId, child: NodeId) -> Result<(), GraphError> {
        self.graph.disconnect(parent, child)
    }

    /// Adds a transition below `from` pointing at `targets`.
    pub fn add_transition(
        &mut self,
        name: impl Into<String>,
        from: NodeId,
        transition: Transition,
        targets: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let id = self.graph.add_node(name, FsmNode::transition(transition));
        let linked = self.graph.connect(from, id).and_then(|()| {
            targets
                .iter()
                .try_for_each(|&target| self.graph.connect(id, target))
        });
        match linked {
            Ok(()) => Ok(id),
            Err(err) => {
                // Leave the graph as it was.
                let _ = self.graph.disconnect_and_remove(id);
                Err(err)
            }
        }
    }

    /// Removes an unconnected node and returns it.
    pub fn remove(&mut self, id: NodeId) -> Result<FsmNode, GraphError> {
        self.graph.remove_node(id)
    }

    /// Makes `id` the entry state by moving it to the front of the node list.
    pub fn change_entry_state(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.graph.reorder_node(id, 0)
    }

    pub fn entry_state(&self) -> Option<NodeId> {
        self.graph.first()
    }

    pub fn current_state(&self) -> Option<NodeId> {
        self.current
    }

    /// States saved by push transitions, oldest first.
    pub fn stack(&self) -> &[NodeId] {
        &self.stack
    }

    pub fn graph(&self) -> &Graph<FsmNode> {
        &self.graph
    }

    /// Mutable access for editors. Adjacency still only changes through the
    /// validated graph API.
    pub fn graph_mut(&mut self) -> &mut Graph<FsmNode> {
        &mut self.graph
    }

    pub fn node(&self, id: NodeId) -> Option<&FsmNode> {
        self.graph.data(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut FsmNode> {
        self.graph.data_mut(id)
    }

    pub fn status_of(&self, id: NodeId) -> Option<Status> {
        self.node(id).map(FsmNode::status)
    }

    /// Fires a transition immediately, without checking its mask or
    /// perception.
    ///
    /// # Errors
    ///
    /// `NotStarted` unless the machine runs, `UnknownNode` for handles that
    /// are not transitions of this machine, `InvalidTransition` when the
    /// transition hangs below a state that is not current.
    pub fn perform_transition(&mut self, id: NodeId) -> ExecutionResult<()> {
        self.lifecycle.ensure_started(&self.name)?;
        self.perform(id)
    }

    fn any_states(&self) -> Vec<NodeId> {
        self.graph
            .iter()
            .filter(|(_, vertex)| vertex.data().is_any_state())
            .map(|(id, _)| id)
            .collect()
    }

    /// Outgoing transitions of `state`.
    fn transitions(&self, state: NodeId) -> Vec<NodeId> {
        self.graph.children(state).to_vec()
    }

    fn set_perceptions(&mut self, state: NodeId, op: PerceptionOp) -> ExecutionResult<()> {
        for id in self.transitions(state) {
            let ctx = &self.context;
            let Some(perception) = self
                .graph
                .data_mut(id)
                .and_then(FsmNode::as_transition_mut)
                .and_then(|transition| transition.perception.as_mut())
            else {
                continue;
            };
            match op {
                PerceptionOp::Start => perception.start(ctx)?,
                PerceptionOp::Stop => perception.stop(ctx)?,
                PerceptionOp::Pause => perception.pause(ctx),
                PerceptionOp::Resume => perception.resume(ctx),
            }
        }
        Ok(())
    }

    fn enter(&mut self, state: NodeId) -> ExecutionResult<()> {
        let ctx = &self.context;
        let vertex = self
            .graph
            .vertex_mut(state)
            .ok_or(ExecutionError::UnknownNode(state))?;
        let (name, node) = vertex.split_mut();
        node.lifecycle.ensure_startable(name)?;
        let FsmKind::State(StateKind::Action(task)) = &mut node.kind else {
            return Err(ExecutionError::InvalidEntryState(name.to_owned()));
        };
        let task = task
            .as_mut()
            .ok_or_else(|| ExecutionError::MissingTask(name.to_owned()))?;
        node.lifecycle.mark_started();
        tracing::debug!("fsm '{}' entering '{}'", self.name, name);
        self.current = Some(state);
        task.start(ctx)?;
        self.set_perceptions(state, PerceptionOp::Start)
    }

    fn exit(&mut self, state: NodeId) -> ExecutionResult<()> {
        let ctx = &self.context;
        let vertex = self
            .graph
            .vertex_mut(state)
            .ok_or(ExecutionError::UnknownNode(state))?;
        let (name, node) = vertex.split_mut();
        if node.lifecycle.status() == Status::None {
            return Ok(());
        }
        node.lifecycle.mark_stopped();
        tracing::trace!("fsm '{}' exiting '{}'", self.name, name);
        if let FsmKind::State(StateKind::Action(Some(task))) = &mut node.kind {
            task.stop(ctx)?;
        }
        self.set_perceptions(state, PerceptionOp::Stop)
    }

    fn change_state(&mut self, target: NodeId) -> ExecutionResult<()> {
        if let Some(current) = self.current.take() {
            self.exit(current)?;
        }
        self.enter(target)
    }

    /// Ticks the current state and returns its status. Finished states keep
    /// their status without running the action again.
    fn update_state(&mut self, state: NodeId) -> ExecutionResult<Status> {
        let ctx = &self.context;
        let vertex = self
            .graph
            .vertex_mut(state)
            .ok_or(ExecutionError::UnknownNode(state))?;
        let (name, node) = vertex.split_mut();
        let current = node.lifecycle.status();
        if current.is_finished() {
            return Ok(current);
        }
        let FsmKind::State(StateKind::Action(Some(task))) = &mut node.kind else {
            return Err(ExecutionError::MissingTask(name.to_owned()));
        };
        let status = match task.update(ctx)? {
            Status::None => Status::Running,
            status => status,
        };
        node.lifecycle.set_status(status);
        Ok(status)
    }

    /// Checks the transitions below `state` against the current status and
    /// fires the first eligible one.
    fn scan(&mut self, state: NodeId, status: Status) -> ExecutionResult<bool> {
        for id in self.transitions(state) {
            let ctx = &self.context;
            let Some(transition) = self.graph.data_mut(id).and_then(FsmNode::as_transition_mut)
            else {
                continue;
            };
            if transition.is_eligible(status, ctx)? {
                self.perform(id)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn perform(&mut self, id: NodeId) -> ExecutionResult<()> {
        let vertex = self
            .graph
            .vertex(id)
            .ok_or(ExecutionError::UnknownNode(id))?;
        let kind = vertex
            .data()
            .as_transition()
            .map(|transition| transition.kind().clone())
            .ok_or(ExecutionError::UnknownNode(id))?;

        if let Some(&source) = vertex.parents().first() {
            let from_any = self.graph.data(source).is_some_and(FsmNode::is_any_state);
            if !from_any && self.current != Some(source) {
                return Err(ExecutionError::InvalidTransition {
                    transition: vertex.name().to_owned(),
                    current: self
                        .current
                        .map_or_else(String::new, |current| self.graph.name(current).to_owned()),
                });
            }
        }
        tracing::debug!("fsm '{}' performing '{}'", self.name, vertex.name());

        let ctx = &self.context;
        if let Some(transition) = self.graph.data_mut(id).and_then(FsmNode::as_transition_mut) {
            transition.run_action(ctx)?;
        }

        let target = |index: usize| {
            self.graph
                .children(id)
                .get(index)
                .copied()
                .ok_or_else(|| ExecutionError::MissingConnection(self.graph.name(id).to_owned()))
        };
        match kind {
            TransitionKind::State => {
                let target = target(0)?;
                self.change_state(target)
            }
            TransitionKind::Exit(status) => {
                if !status.is_finished() {
                    return Err(ExecutionError::InvalidFinishStatus(status));
                }
                tracing::debug!("fsm '{}' finished with {}", self.name, status);
                self.lifecycle.set_status(status);
                Ok(())
            }
            TransitionKind::Probability(weights) => {
                let count = self.graph.children(id).len();
                let random = self.context.random()?;
                let index = weighted_index(&weights, count, random)
                    .ok_or_else(|| ExecutionError::MissingConnection(self.graph.name(id).to_owned()))?;
                let target = target(index)?;
                self.change_state(target)
            }
            TransitionKind::Push => {
                let target = target(0)?;
                if let Some(current) = self.current {
                    self.stack.push(current);
                }
                self.change_state(target)
            }
            TransitionKind::Pop => match self.stack.pop() {
                Some(previous) => self.change_state(previous),
                None => Ok(()),
            },
        }
    }
}

#[derive(Clone, Copy)]
enum PerceptionOp {
    Start,
    Stop,
    Pause,
    Resume,
}

impl Engine for StateMachine {
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
        let entry = self
            .graph
            .first()
            .ok_or_else(|| ExecutionError::EmptyGraph(self.name.clone()))?;
        if !self.graph.data(entry).is_some_and(FsmNode::is_action_state) {
            return Err(ExecutionError::InvalidEntryState(
                self.graph.name(entry).to_owned(),
            ));
        }
        self.stack.clear();
        for any in self.any_states() {
            self.set_perceptions(any, PerceptionOp::Start)?;
        }
        self.enter(entry)
    }

    fn on_updated(&mut self) -> ExecutionResult<()> {
        let Some(current) = self.current else {
            return Ok(());
        };
        let status = self.update_state(current)?;
        if self.scan(current, status)? {
            return Ok(());
        }
        for any in self.any_states() {
            if self.scan(any, status)? {
                break;
            }
        }
        Ok(())
    }

    fn on_stopped(&mut self) -> ExecutionResult<()> {
        self.stack.clear();
        if let Some(current) = self.current.take() {
            self.exit(current)?;
        }
        for any in self.any_states() {
            self.set_perceptions(any, PerceptionOp::Stop)?;
        }
        Ok(())
    }

    fn on_paused(&mut self) {
        let mut states = self.any_states();
        if let Some(current) = self.current {
            let ctx = &self.context;
            if let Some(node) = self.graph.data_mut(current)
                && node.lifecycle.mark_paused()
                && let FsmKind::State(StateKind::Action(Some(task))) = &mut node.kind
            {
                task.pause(ctx);
            }
            states.push(current);
        }
        for state in states {
            let _ = self.set_perceptions(state, PerceptionOp::Pause);
        }
    }

    fn on_resumed(&mut self) {
        let mut states = self.any_states();
        if let Some(current) = self.current {
            let ctx = &self.context;
            if let Some(node) = self.graph.data_mut(current)
                && node.lifecycle.take_paused()
                && let FsmKind::State(StateKind::Action(Some(task))) = &mut node.kind
            {
                task.resume(ctx);
            }
            states.push(current);
        }
        for state in states {
            let _ = self.set_perceptions(state, PerceptionOp::Resume);
        }
    }
}
