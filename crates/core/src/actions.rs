//! Ready-made actions.

use std::cell::RefMut;
use std::fmt;

use crate::context::ExecutionContext;
use crate::engine::{Engine, SharedEngine};
use crate::error::{ExecutionError, ExecutionResult};
use crate::status::Status;
use crate::task::Action;

type Hook = Box<dyn FnMut()>;

/// Action built from closures.
///
/// # Example
///
/// ```rust
/// use decision_core::{FunctionalAction, Status};
///
/// let mut hits = 0;
/// let action = FunctionalAction::new(move || {
///     hits += 1;
///     if hits < 3 { Status::Running } else { Status::Success }
/// });
/// ```
pub struct FunctionalAction {
    update: Box<dyn FnMut() -> Status>,
    start: Option<Hook>,
    stop: Option<Hook>,
}

impl FunctionalAction {
    pub fn new(update: impl FnMut() -> Status + 'static) -> Self {
        Self {
            update: Box::new(update),
            start: None,
            stop: None,
        }
    }

    /// Runs `hook` whenever the action starts (builder pattern).
    #[must_use]
    pub fn on_start(mut self, hook: impl FnMut() + 'static) -> Self {
        self.start = Some(Box::new(hook));
        self
    }

    /// Runs `hook` whenever the action stops (builder pattern).
    #[must_use]
    pub fn on_stop(mut self, hook: impl FnMut() + 'static) -> Self {
        self.stop = Some(Box::new(hook));
        self
    }
}

impl Action for FunctionalAction {
    fn on_start(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        if let Some(hook) = &mut self.start {
            hook();
        }
        Ok(())
    }

    fn on_update(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<Status> {
        Ok((self.update)())
    }

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        if let Some(hook) = &mut self.stop {
            hook();
        }
        Ok(())
    }
}

impl fmt::Debug for FunctionalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalAction")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .finish_non_exhaustive()
    }
}

/// Action that runs a nested engine and reports its status.
///
/// The nested engine receives the parent's context when the action starts.
/// The engine can be assigned after construction, once every engine of a
/// composed system exists.
#[derive(Default)]
pub struct SubsystemAction {
    subsystem: Option<SharedEngine>,
    execute_on_loop: bool,
    dont_stop_on_interrupt: bool,
}

impl SubsystemAction {
    pub fn new(subsystem: SharedEngine) -> Self {
        Self {
            subsystem: Some(subsystem),
            ..Self::default()
        }
    }

    /// Creates the action without an engine; starting it fails until
    /// [`SubsystemAction::set_subsystem`] is called.
    pub fn unassigned() -> Self {
        Self::default()
    }

    pub fn set_subsystem(&mut self, subsystem: SharedEngine) {
        self.subsystem = Some(subsystem);
    }

    /// Restarts the nested engine whenever it finishes, so the action keeps
    /// running (builder pattern).
    #[must_use]
    pub fn execute_on_loop(mut self, enabled: bool) -> Self {
        self.execute_on_loop = enabled;
        self
    }

    /// Pauses instead of stopping the nested engine when the action is
    /// interrupted, and continues it on the next start (builder pattern).
    #[must_use]
    pub fn dont_stop_on_interrupt(mut self, enabled: bool) -> Self {
        self.dont_stop_on_interrupt = enabled;
        self
    }

    fn engine(&self) -> ExecutionResult<RefMut<'_, dyn Engine + 'static>> {
        let subsystem = self
            .subsystem
            .as_ref()
            .ok_or(ExecutionError::MissingSubsystem)?;
        subsystem
            .try_borrow_mut()
            .map_err(|_| ExecutionError::SubsystemBusy)
    }
}

impl Action for SubsystemAction {
    fn on_start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        let resume = self.dont_stop_on_interrupt;
        let mut engine = self.engine()?;
        engine.set_context(ctx.clone());
        match engine.status() {
            Status::None => engine.start(),
            Status::Running if resume => Ok(()),
            _ => {
                engine.stop()?;
                engine.start()
            }
        }
    }

    fn on_update(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<Status> {
        let execute_on_loop = self.execute_on_loop;
        let mut engine = self.engine()?;
        engine.update()?;
        let status = engine.status();
        if execute_on_loop && status.is_finished() {
            tracing::trace!("subsystem '{}' finished, restarting", engine.name());
            engine.stop()?;
            engine.start()?;
            return Ok(Status::Running);
        }
        Ok(status)
    }

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        let pause_only = self.dont_stop_on_interrupt;
        let mut engine = self.engine()?;
        match engine.status() {
            Status::None => Ok(()),
            Status::Running if pause_only => {
                engine.pause();
                Ok(())
            }
            _ => engine.stop(),
        }
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {
        if let Ok(mut engine) = self.engine() {
            engine.pause();
        }
    }
}

impl fmt::Debug for SubsystemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubsystemAction")
            .field("assigned", &self.subsystem.is_some())
            .field("execute_on_loop", &self.execute_on_loop)
            .field("dont_stop_on_interrupt", &self.dont_stop_on_interrupt)
            .finish()
    }
}
