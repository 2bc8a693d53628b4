//! State machine node payload.
//!
//! The graph of a [`StateMachine`](crate::StateMachine) alternates between
//! states and transitions: a state's children are its outgoing transitions,
//! a transition's children are its target states.

use decision_core::{Action, ActionTask, Capacity, Lifecycle, NodeKind, Status};

use crate::transition::{Transition, TransitionKind};

/// Kind of state.
#[derive(Debug)]
pub enum StateKind {
    /// Runs an action while current.
    Action(Option<ActionTask>),

    /// Never current; its transitions may fire from whichever state is.
    Any,
}

/// Category of a state machine node.
#[derive(Debug)]
pub enum FsmKind {
    State(StateKind),
    Transition(Transition),
}

/// A state machine node: lifecycle state plus behaviour.
#[derive(Debug)]
pub struct FsmNode {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) kind: FsmKind,
}

impl FsmNode {
    pub fn new(kind: FsmKind) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            kind,
        }
    }

    /// State running `action` while it is current.
    pub fn state(action: impl Action + 'static) -> Self {
        Self::new(FsmKind::State(StateKind::Action(Some(ActionTask::new(
            action,
        )))))
    }

    /// State whose action is assigned later with [`FsmNode::set_action`].
    pub fn empty_state() -> Self {
        Self::new(FsmKind::State(StateKind::Action(None)))
    }

    pub fn any_state() -> Self {
        Self::new(FsmKind::State(StateKind::Any))
    }

    pub fn transition(transition: Transition) -> Self {
        Self::new(FsmKind::Transition(transition))
    }

    /// Assigns the action of an action state. Returns `false` for other nodes.
    pub fn set_action(&mut self, action: impl Action + 'static) -> bool {
        match &mut self.kind {
            FsmKind::State(StateKind::Action(task)) => {
                *task = Some(ActionTask::new(action));
                true
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> &FsmKind {
        &self.kind
    }

    pub fn is_action_state(&self) -> bool {
        matches!(self.kind, FsmKind::State(StateKind::Action(_)))
    }

    pub fn is_any_state(&self) -> bool {
        matches!(self.kind, FsmKind::State(StateKind::Any))
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match &self.kind {
            FsmKind::Transition(transition) => Some(transition),
            FsmKind::State(_) => None,
        }
    }

    pub(crate) fn as_transition_mut(&mut self) -> Option<&mut Transition> {
        match &mut self.kind {
            FsmKind::Transition(transition) => Some(transition),
            FsmKind::State(_) => None,
        }
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

impl NodeKind for FsmNode {
    fn kind_name(&self) -> &'static str {
        match &self.kind {
            FsmKind::State(StateKind::Action(_)) => "action_state",
            FsmKind::State(StateKind::Any) => "any_state",
            FsmKind::Transition(transition) => transition.kind.kind_name(),
        }
    }

    fn max_inputs(&self) -> Capacity {
        match &self.kind {
            FsmKind::State(StateKind::Action(_)) => Capacity::Unbounded,
            FsmKind::State(StateKind::Any) => Capacity::AtMost(0),
            FsmKind::Transition(_) => Capacity::AtMost(1),
        }
    }

    fn max_outputs(&self) -> Capacity {
        match &self.kind {
            FsmKind::State(_) => Capacity::Unbounded,
            FsmKind::Transition(transition) => match transition.kind {
                TransitionKind::State | TransitionKind::Push => Capacity::AtMost(1),
                TransitionKind::Exit(_) | TransitionKind::Pop => Capacity::AtMost(0),
                TransitionKind::Probability(_) => Capacity::Unbounded,
            },
        }
    }

    fn accepts_child(&self, child: &Self) -> bool {
        match &self.kind {
            FsmKind::State(_) => matches!(child.kind, FsmKind::Transition(_)),
            FsmKind::Transition(_) => child.is_action_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use decision_core::testing::ScriptedAction;
    use decision_core::{Graph, GraphError};

    use super::*;

    #[test]
    fn states_and_transitions_alternate() {
        let mut graph = Graph::new(true);
        let a = graph.add_node("a", FsmNode::state(ScriptedAction::running()));
        let b = graph.add_node("b", FsmNode::state(ScriptedAction::running()));
        let any = graph.add_node("any", FsmNode::any_state());
        let t = graph.add_node("t", FsmNode::transition(Transition::to_state()));

        assert!(matches!(
            graph.connect(a, b),
            Err(GraphError::IncompatibleChild { .. })
        ));
        graph.connect(a, t).unwrap();
        assert!(matches!(
            graph.connect(t, any),
            Err(GraphError::IncompatibleChild { .. })
        ));
        graph.connect(t, b).unwrap();
        assert!(matches!(
            graph.connect(t, a),
            Err(GraphError::OutputLimitReached { .. })
        ));
        assert!(matches!(
            graph.connect(any, t),
            Err(GraphError::InputLimitReached { .. })
        ));
    }

    #[test]
    fn exit_and_pop_have_no_targets() {
        let mut graph = Graph::new(true);
        let a = graph.add_node("a", FsmNode::state(ScriptedAction::running()));
        for transition in [Transition::exit(Status::Success), Transition::pop()] {
            let t = graph.add_node("t", FsmNode::transition(transition));
            assert!(matches!(
                graph.connect(t, a),
                Err(GraphError::OutputLimitReached { limit: 0, .. })
            ));
        }
    }

    #[test]
    fn set_action_only_applies_to_action_states() {
        assert!(FsmNode::empty_state().set_action(ScriptedAction::success()));
        assert!(!FsmNode::any_state().set_action(ScriptedAction::success()));
    }
}
