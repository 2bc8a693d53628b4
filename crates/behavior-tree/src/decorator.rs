//! Decorator nodes.
//!
//! Decorators wrap a single child and modify its result or its execution.

use std::fmt;
use std::time::Duration;

use decision_core::{ExecutionError, ExecutionResult, NodeId, PerceptionTask, Status, Timer};

use crate::tree::Ticker;

/// Node with exactly one child.
#[derive(Debug)]
pub enum Decorator {
    /// Swaps Success and Failure; Running passes through.
    Inverter,

    /// Turns Failure into Success; everything else passes through.
    Succeeder,

    /// Restarts the child each time it finishes, up to a number of
    /// iterations, and reports every completed iteration to its observers.
    Loop(Repeat),

    /// Restarts the child until it returns a target status, up to a number of
    /// iterations.
    LoopUntil(Repeat),

    /// Runs the child only while a perception holds.
    Condition(ConditionGate),

    /// Starts the child once a timer elapses.
    Timer(Wait),

    /// Fails the child if it is still running when a timer elapses.
    Rush(Wait),
}

impl Decorator {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Decorator::Inverter => "inverter",
            Decorator::Succeeder => "succeeder",
            Decorator::Loop(_) => "loop",
            Decorator::LoopUntil(_) => "loop_until",
            Decorator::Condition(_) => "condition",
            Decorator::Timer(_) => "timer",
            Decorator::Rush(_) => "rush",
        }
    }

    pub(crate) fn start(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        let child = tree.child(id, 0)?;
        let ctx = tree.ctx();
        match self {
            Decorator::Inverter | Decorator::Succeeder => tree.start(child),
            Decorator::Loop(repeat) | Decorator::LoopUntil(repeat) => {
                repeat.iterations = 0;
                tree.start(child)
            }
            Decorator::Condition(gate) => {
                let perception = gate
                    .perception
                    .as_mut()
                    .ok_or_else(|| ExecutionError::MissingPerception(tree.name(id)))?;
                perception.start(ctx)?;
                if gate.reactive {
                    return Ok(());
                }
                gate.blocked = !perception.check(ctx)?;
                if gate.blocked {
                    tracing::trace!("'{}' blocked by its condition", tree.name(id));
                    return Ok(());
                }
                tree.start(child)
            }
            Decorator::Timer(wait) => {
                wait.start(tree)?;
                Ok(())
            }
            Decorator::Rush(wait) => {
                wait.start(tree)?;
                tree.start(child)
            }
        }
    }

    pub(crate) fn update(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<Status> {
        let child = tree.child(id, 0)?;
        match self {
            Decorator::Inverter => Ok(tree.update(child)?.invert()),
            Decorator::Succeeder => Ok(match tree.update(child)? {
                Status::Failure => Status::Success,
                status => status,
            }),
            Decorator::Loop(repeat) => repeat.update(tree, child, true),
            Decorator::LoopUntil(repeat) => repeat.update(tree, child, false),
            Decorator::Condition(gate) => gate.update(tree, child),
            Decorator::Timer(wait) => {
                if tree.status(child) == Status::None {
                    if !wait.is_elapsed() {
                        return Ok(Status::Running);
                    }
                    tree.start(child)?;
                }
                tree.update(child)
            }
            Decorator::Rush(wait) => {
                let status = tree.update(child)?;
                if status.is_running() && wait.is_elapsed() {
                    tracing::trace!("'{}' ran out of time", tree.name(id));
                    tree.stop(child)?;
                    return Ok(Status::Failure);
                }
                Ok(status)
            }
        }
    }

    pub(crate) fn stop(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        match self {
            Decorator::Condition(gate) => {
                gate.blocked = false;
                if let Some(perception) = &mut gate.perception {
                    perception.stop(tree.ctx())?;
                }
            }
            Decorator::Timer(wait) | Decorator::Rush(wait) => wait.stop(),
            _ => {}
        }
        tree.stop_child(id, 0)
    }

    pub(crate) fn pause(&mut self, tree: &mut Ticker<'_>, id: NodeId) {
        match self {
            Decorator::Condition(gate) => {
                if let Some(perception) = &mut gate.perception {
                    perception.pause(tree.ctx());
                }
            }
            Decorator::Timer(wait) | Decorator::Rush(wait) => {
                if let Some(timer) = &mut wait.timer {
                    timer.pause();
                }
            }
            _ => {}
        }
        if let Ok(child) = tree.child(id, 0) {
            tree.pause(child);
        }
    }

    pub(crate) fn resume(&mut self, tree: &mut Ticker<'_>) {
        match self {
            Decorator::Condition(gate) => {
                if let Some(perception) = &mut gate.perception {
                    perception.resume(tree.ctx());
                }
            }
            Decorator::Timer(wait) | Decorator::Rush(wait) => {
                if let Some(timer) = &mut wait.timer {
                    timer.resume();
                }
            }
            _ => {}
        }
    }
}

type IterationObserver = Box<dyn FnMut(u32, Status)>;

/// Iteration state of the loop decorators.
pub struct Repeat {
    target: Option<Status>,
    max_iterations: i32,
    iterations: u32,
    observers: Vec<IterationObserver>,
}

impl Repeat {
    pub(crate) fn new(target: Option<Status>, max_iterations: i32) -> Self {
        Self {
            target,
            max_iterations,
            iterations: 0,
            observers: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, observer: impl FnMut(u32, Status) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Status that ends the loop early, if any.
    pub fn target(&self) -> Option<Status> {
        self.target
    }

    /// Iteration limit; negative means none.
    pub fn max_iterations(&self) -> i32 {
        self.max_iterations
    }

    /// Iterations completed since the node started.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    fn limit_reached(&self) -> bool {
        u32::try_from(self.max_iterations).is_ok_and(|max| self.iterations >= max)
    }

    fn update(&mut self, tree: &mut Ticker<'_>, child: NodeId, notify: bool) -> ExecutionResult<Status> {
        let status = tree.update(child)?;
        if !status.is_finished() || self.target == Some(status) {
            return Ok(status);
        }

        self.iterations += 1;
        if notify {
            for observer in &mut self.observers {
                observer(self.iterations, status);
            }
        }
        if self.limit_reached() {
            return Ok(status);
        }
        tree.stop(child)?;
        tree.start(child)?;
        Ok(Status::Running)
    }
}

impl fmt::Debug for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeat")
            .field("target", &self.target)
            .field("max_iterations", &self.max_iterations)
            .field("iterations", &self.iterations)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Perception gate of a condition decorator.
#[derive(Debug)]
pub struct ConditionGate {
    pub(crate) perception: Option<PerceptionTask>,
    reactive: bool,
    blocked: bool,
}

impl ConditionGate {
    pub(crate) fn new(perception: Option<PerceptionTask>, reactive: bool) -> Self {
        Self {
            perception,
            reactive,
            blocked: false,
        }
    }

    pub fn is_reactive(&self) -> bool {
        self.reactive
    }

    fn update(&mut self, tree: &mut Ticker<'_>, child: NodeId) -> ExecutionResult<Status> {
        if !self.reactive {
            return if self.blocked {
                Ok(Status::Failure)
            } else {
                tree.update(child)
            };
        }

        let open = match &mut self.perception {
            Some(perception) => perception.check(tree.ctx())?,
            None => false,
        };
        let started = tree.status(child) != Status::None;
        match (open, started) {
            (true, false) => {
                tree.start(child)?;
                tree.update(child)
            }
            (true, true) => tree.update(child),
            (false, true) => {
                tree.stop(child)?;
                Ok(Status::Running)
            }
            (false, false) => Ok(Status::Running),
        }
    }
}

/// Timer owned by a timer or rush decorator, created from the context's
/// timer provider each time the node starts.
pub struct Wait {
    duration: Duration,
    timer: Option<Box<dyn Timer>>,
}

impl Wait {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            duration,
            timer: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn start(&mut self, tree: &Ticker<'_>) -> ExecutionResult<()> {
        let mut timer = tree.ctx().timer()?.create_timer(self.duration);
        timer.start();
        self.timer = Some(timer);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }

    fn is_elapsed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| timer.is_elapsed())
    }
}

impl fmt::Debug for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("duration", &self.duration)
            .field("started", &self.timer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use decision_core::testing::{FlagPerception, ScriptedAction};
    use decision_core::{Engine, ExecutionContext, ManualClock};

    use super::*;
    use crate::{BehaviorTree, BtNode};

    fn decorated(node: BtNode, action: ScriptedAction) -> BehaviorTree {
        let mut tree = BehaviorTree::new("test");
        let root = tree.add("root", node);
        let leaf = tree.add("leaf", BtNode::action(action));
        tree.connect(root, leaf).unwrap();
        tree
    }

    fn first_tick(tree: &mut BehaviorTree) -> Status {
        tree.start().unwrap();
        tree.update().unwrap();
        tree.status()
    }

    #[test]
    fn inverter_swaps_terminal_statuses() {
        let mut tree = decorated(BtNode::inverter(), ScriptedAction::success());
        assert_eq!(first_tick(&mut tree), Status::Failure);

        let mut tree = decorated(BtNode::inverter(), ScriptedAction::failure());
        assert_eq!(first_tick(&mut tree), Status::Success);

        let mut tree = decorated(BtNode::inverter(), ScriptedAction::running());
        assert_eq!(first_tick(&mut tree), Status::Running);
    }

    #[test]
    fn succeeder_hides_failure() {
        let mut tree = decorated(BtNode::succeeder(), ScriptedAction::failure());
        assert_eq!(first_tick(&mut tree), Status::Success);
    }

    #[test]
    fn unbounded_loop_until_never_finishes_on_other_status() {
        let action = ScriptedAction::failure();
        let probe = action.probe();
        let mut tree = decorated(BtNode::repeat_until(Status::Success, -1), action);
        tree.start().unwrap();
        for _ in 0..20 {
            tree.update().unwrap();
            assert_eq!(tree.status(), Status::Running);
        }
        assert_eq!(probe.starts(), 21);
    }

    #[test]
    fn loop_until_with_single_iteration_returns_child_status() {
        let action = ScriptedAction::failure();
        let probe = action.probe();
        let mut tree = decorated(BtNode::repeat_until(Status::Success, 1), action);
        assert_eq!(first_tick(&mut tree), Status::Failure);
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.updates(), 1);
    }

    #[test]
    fn loop_until_stops_on_target() {
        let action = ScriptedAction::new([Status::Failure]);
        let mut tree = decorated(BtNode::repeat_until(Status::Failure, -1), action);
        assert_eq!(first_tick(&mut tree), Status::Failure);
    }

    #[test]
    fn loop_reports_each_iteration() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let node = BtNode::repeat(3).on_iteration(move |i, status| log.borrow_mut().push((i, status)));
        let mut tree = decorated(node, ScriptedAction::success());

        tree.start().unwrap();
        tree.update().unwrap();
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Running);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Success);
        assert_eq!(
            *seen.borrow(),
            vec![
                (1, Status::Success),
                (2, Status::Success),
                (3, Status::Success)
            ]
        );
    }

    #[test]
    fn reactive_condition_gates_child_every_tick() {
        let flag = FlagPerception::new(false);
        let action = ScriptedAction::running();
        let probe = action.probe();
        let mut tree = decorated(BtNode::condition(flag.clone(), true), action);

        assert_eq!(first_tick(&mut tree), Status::Running);
        assert_eq!(probe.starts(), 0);

        flag.set(true);
        tree.update().unwrap();
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.updates(), 1);

        flag.set(false);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Running);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn non_reactive_condition_fails_until_restarted() {
        let flag = FlagPerception::new(false);
        let action = ScriptedAction::success();
        let probe = action.probe();
        let mut tree = decorated(BtNode::condition(flag.clone(), false), action);

        assert_eq!(first_tick(&mut tree), Status::Failure);
        flag.set(true);
        assert_eq!(flag.probe().checks(), 1);
        assert_eq!(probe.starts(), 0);

        tree.stop().unwrap();
        assert_eq!(first_tick(&mut tree), Status::Success);
    }

    #[test]
    fn condition_without_perception_cannot_start() {
        let mut node = BtNode::condition(FlagPerception::new(true), true);
        if let crate::BtKind::Decorator(Decorator::Condition(gate)) = &mut node.kind {
            gate.perception = None;
        }
        let mut tree = decorated(node, ScriptedAction::success());
        assert_eq!(
            tree.start(),
            Err(ExecutionError::MissingPerception("root".into()))
        );
    }

    #[test]
    fn timer_starts_child_once_elapsed() {
        let clock = ManualClock::new();
        let action = ScriptedAction::success();
        let probe = action.probe();
        let mut tree = decorated(BtNode::timer(Duration::from_secs(2)), action);
        tree.set_context(ExecutionContext::empty().with_timer(clock.clone()));

        assert_eq!(first_tick(&mut tree), Status::Running);
        clock.advance_secs(1);
        tree.update().unwrap();
        assert_eq!(probe.starts(), 0);

        clock.advance_secs(1);
        tree.update().unwrap();
        assert_eq!(probe.starts(), 1);
        assert_eq!(tree.status(), Status::Success);
    }

    #[test]
    fn paused_timer_does_not_count() {
        let clock = ManualClock::new();
        let mut tree = decorated(BtNode::timer(Duration::from_secs(2)), ScriptedAction::success());
        tree.set_context(ExecutionContext::empty().with_timer(clock.clone()));
        first_tick(&mut tree);

        tree.pause();
        clock.advance_secs(5);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Running);

        clock.advance_secs(2);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Success);
    }

    #[test]
    fn rush_fails_slow_child() {
        let clock = ManualClock::new();
        let action = ScriptedAction::running();
        let probe = action.probe();
        let mut tree = decorated(BtNode::rush(Duration::from_secs(1)), action);
        tree.set_context(ExecutionContext::empty().with_timer(clock.clone()));

        assert_eq!(first_tick(&mut tree), Status::Running);
        clock.advance_secs(1);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Failure);
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn timer_needs_timer_provider() {
        let mut tree = decorated(BtNode::timer(Duration::from_secs(1)), ScriptedAction::success());
        assert_eq!(
            tree.start(),
            Err(decision_core::ProviderError::TimerNotAvailable.into())
        );
    }
}
