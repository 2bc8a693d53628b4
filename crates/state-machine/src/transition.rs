//! Transitions between states.
//!
//! A transition hangs below its source state and points at its target
//! states. It fires when the source's status intersects its status mask and
//! its perception, if any, holds.

use decision_core::{
    Action, ActionTask, ExecutionContext, ExecutionResult, Perception, PerceptionTask, Status,
    StatusFlags,
};

/// What a transition does when it fires.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionKind {
    /// Exits the current state and enters the single target.
    State,

    /// Finishes the machine with the given terminal status.
    Exit(Status),

    /// Enters one of the targets, picked proportionally to the weights.
    Probability(Vec<f32>),

    /// Saves the current state on the stack, then moves to the target.
    Push,

    /// Returns to the most recently pushed state.
    Pop,
}

impl TransitionKind {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            TransitionKind::State => "state_transition",
            TransitionKind::Exit(_) => "exit_transition",
            TransitionKind::Probability(_) => "probability_transition",
            TransitionKind::Push => "push_transition",
            TransitionKind::Pop => "pop_transition",
        }
    }
}

/// Transition payload: kind, firing condition and optional side action.
///
/// ```rust
/// use decision_core::{ConditionPerception, StatusFlags};
/// use state_machine::Transition;
///
/// let on_done = Transition::to_state()
///     .on_status(StatusFlags::FINISHED)
///     .when(ConditionPerception::new(|| true));
/// assert_eq!(on_done.mask(), StatusFlags::FINISHED);
/// ```
#[derive(Debug)]
pub struct Transition {
    pub(crate) kind: TransitionKind,
    mask: StatusFlags,
    pub(crate) perception: Option<PerceptionTask>,
    pub(crate) action: Option<ActionTask>,
}

impl Transition {
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            mask: StatusFlags::ACTIVE,
            perception: None,
            action: None,
        }
    }

    pub fn to_state() -> Self {
        Self::new(TransitionKind::State)
    }

    /// Finishes the machine with `status`, which must be Success or Failure.
    pub fn exit(status: Status) -> Self {
        Self::new(TransitionKind::Exit(status))
    }

    pub fn probability(weights: impl Into<Vec<f32>>) -> Self {
        Self::new(TransitionKind::Probability(weights.into()))
    }

    pub fn push() -> Self {
        Self::new(TransitionKind::Push)
    }

    pub fn pop() -> Self {
        Self::new(TransitionKind::Pop)
    }

    /// Only fires while the source status is in `mask`.
    #[must_use]
    pub fn on_status(mut self, mask: StatusFlags) -> Self {
        self.mask = mask;
        self
    }

    /// Only fires while `perception` holds.
    #[must_use]
    pub fn when(mut self, perception: impl Perception + 'static) -> Self {
        self.perception = Some(PerceptionTask::new(perception));
        self
    }

    /// Runs `action` once each time the transition fires.
    #[must_use]
    pub fn with_action(mut self, action: impl Action + 'static) -> Self {
        self.action = Some(ActionTask::new(action));
        self
    }

    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    pub fn mask(&self) -> StatusFlags {
        self.mask
    }

    /// Whether the transition may fire from a source in `status`.
    pub(crate) fn is_eligible(
        &mut self,
        status: Status,
        ctx: &ExecutionContext,
    ) -> ExecutionResult<bool> {
        if !status.matches(self.mask) {
            return Ok(false);
        }
        match &mut self.perception {
            Some(perception) => perception.check(ctx),
            None => Ok(true),
        }
    }

    /// Runs the side action to completion of a single tick.
    pub(crate) fn run_action(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        if let Some(action) = &mut self.action {
            action.start(ctx)?;
            action.update(ctx)?;
            action.stop(ctx)?;
        }
        Ok(())
    }
}
