//! Leaf work units with a lenient lifecycle.
//!
//! Nodes delegate the actual work to an [`ActionTask`] or a
//! [`PerceptionTask`]. Unlike nodes, tasks forgive out-of-order calls:
//! starting twice, stopping or pausing something inactive are silent no-ops,
//! and an inactive task answers `update` with its last result and `check`
//! with `false` without running any hook.

use std::fmt;

use crate::context::ExecutionContext;
use crate::error::ExecutionResult;
use crate::status::Status;

/// Behaviour of an action. Only `on_update` is required.
pub trait Action {
    fn on_start(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        Ok(())
    }

    /// Advances the action and reports its status.
    fn on_update(&mut self, ctx: &ExecutionContext) -> ExecutionResult<Status>;

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {}

    fn on_resume(&mut self, _ctx: &ExecutionContext) {}
}

/// Behaviour of a perception. Only `check` is required.
pub trait Perception {
    fn on_start(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        Ok(())
    }

    /// Evaluates the perception.
    fn check(&mut self, ctx: &ExecutionContext) -> ExecutionResult<bool>;

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {}

    fn on_resume(&mut self, _ctx: &ExecutionContext) {}
}

/// Lenient wrapper around an [`Action`].
pub struct ActionTask {
    action: Box<dyn Action>,
    active: bool,
    paused: bool,
    last: Status,
}

impl ActionTask {
    pub fn new(action: impl Action + 'static) -> Self {
        Self::from_boxed(Box::new(action))
    }

    pub fn from_boxed(action: Box<dyn Action>) -> Self {
        Self {
            action,
            active: false,
            paused: false,
            last: Status::None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Result of the latest update.
    pub fn last_status(&self) -> Status {
        self.last
    }

    pub fn start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        if self.active {
            return Ok(());
        }
        self.active = true;
        self.paused = false;
        self.last = Status::Running;
        self.action.on_start(ctx)
    }

    pub fn update(&mut self, ctx: &ExecutionContext) -> ExecutionResult<Status> {
        if !self.active {
            return Ok(self.last);
        }
        self.resume(ctx);
        self.last = self.action.on_update(ctx)?;
        Ok(self.last)
    }

    pub fn stop(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.paused = false;
        self.action.on_stop(ctx)
    }

    pub fn pause(&mut self, ctx: &ExecutionContext) {
        if !self.active || self.paused {
            return;
        }
        self.paused = true;
        self.action.on_pause(ctx);
    }

    pub fn resume(&mut self, ctx: &ExecutionContext) {
        if !self.active || !self.paused {
            return;
        }
        self.paused = false;
        self.action.on_resume(ctx);
    }
}

impl fmt::Debug for ActionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTask")
            .field("active", &self.active)
            .field("paused", &self.paused)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

/// Lenient wrapper around a [`Perception`].
pub struct PerceptionTask {
    perception: Box<dyn Perception>,
    active: bool,
    paused: bool,
}

impl PerceptionTask {
    pub fn new(perception: impl Perception + 'static) -> Self {
        Self::from_boxed(Box::new(perception))
    }

    pub fn from_boxed(perception: Box<dyn Perception>) -> Self {
        Self {
            perception,
            active: false,
            paused: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        if self.active {
            return Ok(());
        }
        self.active = true;
        self.paused = false;
        self.perception.on_start(ctx)
    }

    /// Evaluates the perception; `false` while inactive.
    pub fn check(&mut self, ctx: &ExecutionContext) -> ExecutionResult<bool> {
        if !self.active {
            return Ok(false);
        }
        self.resume(ctx);
        self.perception.check(ctx)
    }

    pub fn stop(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.paused = false;
        self.perception.on_stop(ctx)
    }

    pub fn pause(&mut self, ctx: &ExecutionContext) {
        if !self.active || self.paused {
            return;
        }
        self.paused = true;
        self.perception.on_pause(ctx);
    }

    pub fn resume(&mut self, ctx: &ExecutionContext) {
        if !self.active || !self.paused {
            return;
        }
        self.paused = false;
        self.perception.on_resume(ctx);
    }
}

impl fmt::Debug for PerceptionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerceptionTask")
            .field("active", &self.active)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FlagPerception, ScriptedAction};

    #[test]
    fn inactive_action_returns_cached_result_without_hooks() {
        let action = ScriptedAction::new([Status::Success]);
        let probe = action.probe();
        let mut task = ActionTask::new(action);
        let ctx = ExecutionContext::empty();

        assert_eq!(task.update(&ctx), Ok(Status::None));
        assert_eq!(probe.updates(), 0);

        task.start(&ctx).unwrap();
        assert_eq!(task.update(&ctx), Ok(Status::Success));
        task.stop(&ctx).unwrap();

        assert_eq!(task.update(&ctx), Ok(Status::Success));
        assert_eq!(probe.updates(), 1);
    }

    #[test]
    fn out_of_order_calls_are_ignored() {
        let action = ScriptedAction::new([Status::Running]);
        let probe = action.probe();
        let mut task = ActionTask::new(action);
        let ctx = ExecutionContext::empty();

        task.stop(&ctx).unwrap();
        task.pause(&ctx);
        task.start(&ctx).unwrap();
        task.start(&ctx).unwrap();
        task.pause(&ctx);
        task.pause(&ctx);

        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.stops(), 0);
        assert_eq!(probe.pauses(), 1);

        task.update(&ctx).unwrap();
        assert_eq!(probe.resumes(), 1);
        assert!(!task.is_paused());
    }

    #[test]
    fn inactive_perception_checks_false() {
        let flag = FlagPerception::new(true);
        let mut task = PerceptionTask::new(flag.clone());
        let ctx = ExecutionContext::empty();

        assert_eq!(task.check(&ctx), Ok(false));
        task.start(&ctx).unwrap();
        assert_eq!(task.check(&ctx), Ok(true));
        flag.set(false);
        assert_eq!(task.check(&ctx), Ok(false));
        assert_eq!(flag.probe().checks(), 2);
    }
}
