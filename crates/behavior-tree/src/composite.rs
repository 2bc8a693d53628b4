//! Composite nodes.
//!
//! Composites control the execution flow of an ordered list of children:
//! [`Composite::Sequence`] (AND logic), [`Composite::Selector`] (OR logic),
//! [`Composite::Parallel`] (every child every tick) and
//! [`Composite::Branch`] (one child chosen when the node starts).

use std::fmt;

use decision_core::{ExecutionError, ExecutionResult, NodeId, Status, weighted_index};

use crate::tree::Ticker;

/// Node with any number of ordered children.
#[derive(Debug)]
pub enum Composite {
    /// Executes children in order until one fails.
    ///
    /// - a `Success` moves on to the next child, which starts now and is
    ///   first updated on the next tick
    /// - a `Failure` ends the sequence immediately with `Failure`
    /// - the last child's `Success` ends the sequence with `Success`
    Sequence(Serial),

    /// Executes children in order until one succeeds. The mirror of
    /// [`Composite::Sequence`].
    Selector(Serial),

    /// Starts, updates and stops every child together.
    Parallel(ParallelPolicy),

    /// Runs exactly one child, chosen once when the node starts.
    Branch(BranchSelection),
}

impl Composite {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Composite::Sequence(_) => "sequence",
            Composite::Selector(_) => "selector",
            Composite::Parallel(_) => "parallel",
            Composite::Branch(branch) => match branch.selector {
                BranchSelector::Function(_) => "function_branch",
                BranchSelector::Random(_) => "random_branch",
            },
        }
    }

    pub(crate) fn start(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        match self {
            Composite::Sequence(serial) | Composite::Selector(serial) => {
                let first = tree.child(id, 0)?;
                serial.current = 0;
                tree.start(first)
            }
            Composite::Parallel(_) => {
                if tree.child_count(id) == 0 {
                    return Err(ExecutionError::MissingConnection(tree.name(id)));
                }
                for index in 0..tree.child_count(id) {
                    tree.start(tree.child(id, index)?)?;
                }
                Ok(())
            }
            Composite::Branch(branch) => {
                let index = branch.select(tree, id)?;
                tree.start(tree.child(id, index)?)
            }
        }
    }

    pub(crate) fn update(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<Status> {
        match self {
            Composite::Sequence(serial) => serial.update(tree, id, Status::Success),
            Composite::Selector(serial) => serial.update(tree, id, Status::Failure),
            Composite::Parallel(policy) => policy.update(tree, id),
            Composite::Branch(branch) => {
                let child = tree.child(id, branch.selected)?;
                tree.update(child)
            }
        }
    }

    pub(crate) fn stop(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        match self {
            Composite::Sequence(serial) | Composite::Selector(serial) => {
                let current = std::mem::take(&mut serial.current);
                tree.stop_child(id, current)
            }
            Composite::Parallel(_) => {
                for index in 0..tree.child_count(id) {
                    tree.stop_child(id, index)?;
                }
                Ok(())
            }
            Composite::Branch(branch) => tree.stop_child(id, branch.selected),
        }
    }

    pub(crate) fn pause(&mut self, tree: &mut Ticker<'_>, id: NodeId) {
        let active = match self {
            Composite::Sequence(serial) | Composite::Selector(serial) => vec![serial.current],
            Composite::Parallel(_) => (0..tree.child_count(id)).collect(),
            Composite::Branch(branch) => vec![branch.selected],
        };
        for index in active {
            if let Ok(child) = tree.child(id, index) {
                tree.pause(child);
            }
        }
    }
}

/// Cursor of a sequence or selector.
#[derive(Clone, Copy, Debug, Default)]
pub struct Serial {
    current: usize,
}

impl Serial {
    /// Index of the child currently executing.
    pub fn current(&self) -> usize {
        self.current
    }

    fn update(
        &mut self,
        tree: &mut Ticker<'_>,
        id: NodeId,
        advance_on: Status,
    ) -> ExecutionResult<Status> {
        let child = tree.child(id, self.current)?;
        let status = tree.update(child)?;
        if status != advance_on || self.current + 1 >= tree.child_count(id) {
            return Ok(status);
        }

        tracing::trace!(
            "'{}' advancing past child {} ({})",
            tree.name(id),
            self.current,
            status
        );
        tree.stop(child)?;
        self.current += 1;
        tree.start(tree.child(id, self.current)?)?;
        Ok(Status::Running)
    }
}

/// Early-exit rules of a parallel node.
///
/// Early exit never skips children: every child is still updated on the
/// tick where the condition is met.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParallelPolicy {
    /// Succeed as soon as any child succeeds.
    pub finish_on_any_success: bool,

    /// Fail as soon as any child fails.
    pub finish_on_any_failure: bool,
}

impl ParallelPolicy {
    fn update(&self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<Status> {
        let mut early_exit = None;
        let mut any_running = false;
        let mut last = Status::None;

        for index in 0..tree.child_count(id) {
            let status = tree.update(tree.child(id, index)?)?;
            let exits = match status {
                Status::Success => self.finish_on_any_success,
                Status::Failure => self.finish_on_any_failure,
                _ => false,
            };
            if exits && early_exit.is_none() {
                early_exit = Some(status);
            }
            any_running |= status.is_running();
            last = status;
        }

        Ok(match early_exit {
            Some(status) => status,
            None if any_running => Status::Running,
            None => last,
        })
    }
}

/// How a branch node picks its child.
pub enum BranchSelector {
    /// Index returned by a function; index 0 when none is set.
    Function(Option<Box<dyn FnMut() -> usize>>),

    /// Weighted random pick using the context's random provider.
    Random(Vec<f32>),
}

impl fmt::Debug for BranchSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchSelector::Function(select) => f
                .debug_tuple("Function")
                .field(&select.is_some())
                .finish(),
            BranchSelector::Random(weights) => f.debug_tuple("Random").field(weights).finish(),
        }
    }
}

/// Branch selector plus the branch chosen at the last start.
#[derive(Debug)]
pub struct BranchSelection {
    selector: BranchSelector,
    selected: usize,
}

impl BranchSelection {
    pub(crate) fn function(select: impl FnMut() -> usize + 'static) -> Self {
        Self {
            selector: BranchSelector::Function(Some(Box::new(select))),
            selected: 0,
        }
    }

    pub(crate) fn random(weights: Vec<f32>) -> Self {
        Self {
            selector: BranchSelector::Random(weights),
            selected: 0,
        }
    }

    pub fn selector(&self) -> &BranchSelector {
        &self.selector
    }

    /// Index of the branch chosen at the last start.
    pub fn selected(&self) -> usize {
        self.selected
    }

    fn select(&mut self, tree: &Ticker<'_>, id: NodeId) -> ExecutionResult<usize> {
        let count = tree.child_count(id);
        let index = match &mut self.selector {
            BranchSelector::Function(select) => select.as_mut().map_or(0, |select| select()),
            BranchSelector::Random(weights) => {
                let random = tree.ctx().random()?;
                weighted_index(weights.as_slice(), count, random)
                    .ok_or_else(|| ExecutionError::MissingConnection(tree.name(id)))?
            }
        };
        if index >= count {
            return Err(ExecutionError::MissingConnection(tree.name(id)));
        }
        tracing::trace!("'{}' selected branch {}", tree.name(id), index);
        self.selected = index;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use decision_core::testing::{ScriptedAction, SequenceRandom};
    use decision_core::{Engine, ExecutionContext};

    use super::*;
    use crate::{BehaviorTree, BtNode};

    fn tree_with(root: BtNode, children: Vec<ScriptedAction>) -> BehaviorTree {
        let mut tree = BehaviorTree::new("test");
        let root = tree.add("root", root);
        for (index, action) in children.into_iter().enumerate() {
            let leaf = tree.add(format!("leaf{index}"), BtNode::action(action));
            tree.connect(root, leaf).unwrap();
        }
        tree
    }

    fn run(tree: &mut BehaviorTree, ticks: usize) -> Status {
        tree.start().unwrap();
        for _ in 0..ticks {
            tree.update().unwrap();
        }
        tree.status()
    }

    #[test]
    fn sequence_all_success() {
        let mut tree = tree_with(
            BtNode::sequence(),
            vec![ScriptedAction::success(), ScriptedAction::success()],
        );
        assert_eq!(run(&mut tree, 1), Status::Running);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Success);
    }

    #[test]
    fn sequence_fails_on_second_failure() {
        let mut tree = tree_with(
            BtNode::sequence(),
            vec![ScriptedAction::success(), ScriptedAction::failure()],
        );
        assert_eq!(run(&mut tree, 2), Status::Failure);
    }

    #[test]
    fn sequence_never_starts_child_after_failure() {
        let second = ScriptedAction::success();
        let probe = second.probe();
        let mut tree = tree_with(
            BtNode::sequence(),
            vec![ScriptedAction::failure(), second],
        );
        assert_eq!(run(&mut tree, 1), Status::Failure);
        assert_eq!(probe.starts(), 0);
    }

    #[test]
    fn selector_succeeds_on_first_success() {
        let third = ScriptedAction::failure();
        let probe = third.probe();
        let mut tree = tree_with(
            BtNode::selector(),
            vec![ScriptedAction::failure(), ScriptedAction::success(), third],
        );
        assert_eq!(run(&mut tree, 2), Status::Success);
        assert_eq!(probe.starts(), 0);
    }

    #[test]
    fn selector_fails_when_all_fail() {
        let mut tree = tree_with(
            BtNode::selector(),
            vec![ScriptedAction::failure(), ScriptedAction::failure()],
        );
        assert_eq!(run(&mut tree, 2), Status::Failure);
    }

    #[test]
    fn empty_serial_composite_cannot_start() {
        let mut tree = tree_with(BtNode::sequence(), vec![]);
        assert_eq!(
            tree.start(),
            Err(ExecutionError::MissingConnection("root".into()))
        );
    }

    #[test]
    fn stopping_sequence_stops_current_child_once() {
        let first = ScriptedAction::running();
        let probe = first.probe();
        let mut tree = tree_with(BtNode::sequence(), vec![first, ScriptedAction::success()]);
        run(&mut tree, 2);
        tree.stop().unwrap();
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn parallel_ticks_every_child_despite_early_exit() {
        let slow = ScriptedAction::running();
        let probe = slow.probe();
        let policy = ParallelPolicy {
            finish_on_any_success: true,
            finish_on_any_failure: false,
        };
        let mut tree = tree_with(
            BtNode::parallel(policy),
            vec![ScriptedAction::success(), slow],
        );
        assert_eq!(run(&mut tree, 1), Status::Success);
        assert_eq!(probe.updates(), 1);

        tree.stop().unwrap();
        assert_eq!(probe.stops(), 1);
    }

    #[test]
    fn parallel_waits_for_running_children() {
        let mut tree = tree_with(
            BtNode::parallel(ParallelPolicy::default()),
            vec![
                ScriptedAction::failure(),
                ScriptedAction::new([Status::Running, Status::Success]),
            ],
        );
        assert_eq!(run(&mut tree, 1), Status::Running);
        tree.update().unwrap();
        assert_eq!(tree.status(), Status::Success);
    }

    #[test]
    fn function_branch_runs_selected_child_only() {
        let skipped = ScriptedAction::success();
        let probe = skipped.probe();
        let mut tree = tree_with(
            BtNode::function_branch(|| 1),
            vec![skipped, ScriptedAction::failure()],
        );
        assert_eq!(run(&mut tree, 1), Status::Failure);
        assert_eq!(probe.starts(), 0);
    }

    #[test]
    fn function_branch_out_of_range_is_missing_connection() {
        let mut tree = tree_with(
            BtNode::function_branch(|| 3),
            vec![ScriptedAction::success()],
        );
        assert_eq!(
            tree.start(),
            Err(ExecutionError::MissingConnection("root".into()))
        );
    }

    #[test]
    fn random_branch_boundary_sample_selects_next_branch() {
        let first = ScriptedAction::success();
        let first_probe = first.probe();
        let mut tree = tree_with(
            BtNode::random_branch([0.5, 0.5]),
            vec![first, ScriptedAction::failure()],
        );
        tree.set_context(ExecutionContext::empty().with_random(SequenceRandom::new([0.5])));

        assert_eq!(run(&mut tree, 1), Status::Failure);
        assert_eq!(first_probe.starts(), 0);
    }

    #[test]
    fn random_branch_needs_random_provider() {
        let mut tree = tree_with(
            BtNode::random_branch([1.0]),
            vec![ScriptedAction::success()],
        );
        assert_eq!(
            tree.start(),
            Err(decision_core::ProviderError::RandomNotAvailable.into())
        );
    }
}
