//! Behaviour tree node payload.
//!
//! Every vertex of a [`BehaviorTree`](crate::BehaviorTree) graph carries a
//! [`BtNode`]: a strict [`Lifecycle`] plus one of three closed categories.
//! Composites order many children, decorators wrap exactly one, leaves wrap
//! one task and have none.

use std::time::Duration;

use decision_core::{
    Action, ActionTask, Capacity, ExecutionResult, Lifecycle, NodeId, NodeKind, Perception,
    PerceptionTask, Status,
};

use crate::composite::{BranchSelection, Composite, ParallelPolicy, Serial};
use crate::decorator::{ConditionGate, Decorator, Repeat, Wait};
use crate::leaf::{Leaf, PerceptionLeaf};
use crate::tree::Ticker;

/// Category of a behaviour tree node.
#[derive(Debug)]
pub enum BtKind {
    Composite(Composite),
    Decorator(Decorator),
    Leaf(Leaf),
}

impl BtKind {
    /// Stand-in left in the graph while the real payload is executing.
    pub(crate) fn vacant() -> Self {
        BtKind::Leaf(Leaf::Action(None))
    }

    pub(crate) fn start(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        match self {
            BtKind::Composite(composite) => composite.start(tree, id),
            BtKind::Decorator(decorator) => decorator.start(tree, id),
            BtKind::Leaf(leaf) => leaf.start(tree, id),
        }
    }

    pub(crate) fn update(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<Status> {
        match self {
            BtKind::Composite(composite) => composite.update(tree, id),
            BtKind::Decorator(decorator) => decorator.update(tree, id),
            BtKind::Leaf(leaf) => leaf.update(tree, id),
        }
    }

    pub(crate) fn stop(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        match self {
            BtKind::Composite(composite) => composite.stop(tree, id),
            BtKind::Decorator(decorator) => decorator.stop(tree, id),
            BtKind::Leaf(leaf) => leaf.stop(tree, id),
        }
    }

    pub(crate) fn pause(&mut self, tree: &mut Ticker<'_>, id: NodeId) {
        match self {
            BtKind::Composite(composite) => composite.pause(tree, id),
            BtKind::Decorator(decorator) => decorator.pause(tree, id),
            BtKind::Leaf(leaf) => leaf.pause(tree),
        }
    }

    pub(crate) fn resume(&mut self, tree: &mut Ticker<'_>) {
        match self {
            BtKind::Composite(_) => {}
            BtKind::Decorator(decorator) => decorator.resume(tree),
            BtKind::Leaf(leaf) => leaf.resume(tree),
        }
    }
}

/// A behaviour tree node: lifecycle state plus behaviour.
#[derive(Debug)]
pub struct BtNode {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) kind: BtKind,
}

impl BtNode {
    pub fn new(kind: BtKind) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            kind,
        }
    }

    /// Runs children in order while they succeed.
    pub fn sequence() -> Self {
        Self::new(BtKind::Composite(Composite::Sequence(Serial::default())))
    }

    /// Runs children in order until one succeeds.
    pub fn selector() -> Self {
        Self::new(BtKind::Composite(Composite::Selector(Serial::default())))
    }

    /// Runs every child on every tick.
    pub fn parallel(policy: ParallelPolicy) -> Self {
        Self::new(BtKind::Composite(Composite::Parallel(policy)))
    }

    /// Runs the child whose index `select` returns when the node starts.
    pub fn function_branch(select: impl FnMut() -> usize + 'static) -> Self {
        Self::new(BtKind::Composite(Composite::Branch(BranchSelection::function(
            select,
        ))))
    }

    /// Runs a child picked at random, proportionally to `weights`, when the
    /// node starts.
    pub fn random_branch(weights: impl Into<Vec<f32>>) -> Self {
        Self::new(BtKind::Composite(Composite::Branch(BranchSelection::random(
            weights.into(),
        ))))
    }

    pub fn inverter() -> Self {
        Self::new(BtKind::Decorator(Decorator::Inverter))
    }

    /// Turns a failing child into a success.
    pub fn succeeder() -> Self {
        Self::new(BtKind::Decorator(Decorator::Succeeder))
    }

    /// Repeats the child `max_iterations` times; negative repeats forever.
    pub fn repeat(max_iterations: i32) -> Self {
        Self::new(BtKind::Decorator(Decorator::Loop(Repeat::new(
            None,
            max_iterations,
        ))))
    }

    /// Repeats the child until it returns `target`, at most `max_iterations`
    /// times; negative means no limit.
    pub fn repeat_until(target: Status, max_iterations: i32) -> Self {
        Self::new(BtKind::Decorator(Decorator::LoopUntil(Repeat::new(
            Some(target),
            max_iterations,
        ))))
    }

    /// Gates the child on a perception. A reactive gate re-checks every tick,
    /// otherwise the perception is checked once when the node starts.
    pub fn condition(perception: impl Perception + 'static, reactive: bool) -> Self {
        Self::new(BtKind::Decorator(Decorator::Condition(ConditionGate::new(
            Some(PerceptionTask::new(perception)),
            reactive,
        ))))
    }

    /// Waits for `duration` before starting the child.
    pub fn timer(duration: Duration) -> Self {
        Self::new(BtKind::Decorator(Decorator::Timer(Wait::new(duration))))
    }

    /// Fails if the child is still running after `duration`.
    pub fn rush(duration: Duration) -> Self {
        Self::new(BtKind::Decorator(Decorator::Rush(Wait::new(duration))))
    }

    pub fn action(action: impl Action + 'static) -> Self {
        Self::new(BtKind::Leaf(Leaf::Action(Some(ActionTask::new(action)))))
    }

    /// Action leaf whose task is assigned later with [`BtNode::set_action`].
    pub fn empty_action() -> Self {
        Self::new(BtKind::Leaf(Leaf::Action(None)))
    }

    /// Leaf reporting Success when the perception holds, Failure otherwise.
    pub fn perception(perception: impl Perception + 'static) -> Self {
        Self::perception_mapped(perception, Status::Success, Status::Failure)
    }

    /// Leaf mapping the perception result to custom terminal statuses.
    pub fn perception_mapped(
        perception: impl Perception + 'static,
        on_true: Status,
        on_false: Status,
    ) -> Self {
        Self::new(BtKind::Leaf(Leaf::Perception(PerceptionLeaf::new(
            Some(PerceptionTask::new(perception)),
            on_true,
            on_false,
        ))))
    }

    /// Registers a callback fired by `Loop` nodes with the iteration count
    /// and status each time the child completes (builder pattern). Other
    /// nodes ignore it.
    #[must_use]
    pub fn on_iteration(mut self, observer: impl FnMut(u32, Status) + 'static) -> Self {
        if let BtKind::Decorator(Decorator::Loop(repeat)) = &mut self.kind {
            repeat.subscribe(observer);
        }
        self
    }

    /// Assigns the task of an action leaf. Returns `false` for other nodes.
    pub fn set_action(&mut self, action: impl Action + 'static) -> bool {
        match &mut self.kind {
            BtKind::Leaf(Leaf::Action(task)) => {
                *task = Some(ActionTask::new(action));
                true
            }
            _ => false,
        }
    }

    /// Assigns the perception of a condition decorator or perception leaf.
    /// Returns `false` for other nodes.
    pub fn set_perception(&mut self, perception: impl Perception + 'static) -> bool {
        let task = Some(PerceptionTask::new(perception));
        match &mut self.kind {
            BtKind::Decorator(Decorator::Condition(gate)) => {
                gate.perception = task;
                true
            }
            BtKind::Leaf(Leaf::Perception(leaf)) => {
                leaf.task = task;
                true
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> &BtKind {
        &self.kind
    }

    pub fn status(&self) -> Status {
        self.lifecycle.status()
    }

    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    /// Registers a callback fired on every status change of this node.
    pub fn subscribe(&mut self, observer: impl FnMut(Status) + 'static) {
        self.lifecycle.subscribe(observer);
    }
}

impl NodeKind for BtNode {
    fn kind_name(&self) -> &'static str {
        match &self.kind {
            BtKind::Composite(composite) => composite.kind_name(),
            BtKind::Decorator(decorator) => decorator.kind_name(),
            BtKind::Leaf(leaf) => leaf.kind_name(),
        }
    }

    fn max_inputs(&self) -> Capacity {
        Capacity::AtMost(1)
    }

    fn max_outputs(&self) -> Capacity {
        match self.kind {
            BtKind::Composite(_) => Capacity::Unbounded,
            BtKind::Decorator(_) => Capacity::AtMost(1),
            BtKind::Leaf(_) => Capacity::AtMost(0),
        }
    }

    fn accepts_child(&self, _child: &Self) -> bool {
        true
    }
}
