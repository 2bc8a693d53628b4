//! Top-level executable contract shared by every engine.
//!
//! An engine owns a graph and a [`Lifecycle`]. The host supplies an
//! [`ExecutionContext`], calls [`Engine::start`] once, [`Engine::update`] once
//! per external tick while the status is `Running`, and [`Engine::stop`] or
//! [`Engine::pause`] when needed. Engines implement the `on_*` hooks; the
//! provided methods enforce the strict lifecycle around them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::ExecutionContext;
use crate::error::{ExecutionError, ExecutionResult};
use crate::lifecycle::Lifecycle;
use crate::status::Status;

/// Engine handle that can be shared with subsystem actions and perceptions.
pub type SharedEngine = Rc<RefCell<dyn Engine>>;

/// Wraps an engine into a [`SharedEngine`].
pub fn share<E: Engine + 'static>(engine: E) -> SharedEngine {
    Rc::new(RefCell::new(engine))
}

/// Executable owner of a graph.
pub trait Engine {
    fn name(&self) -> &str;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn context(&self) -> &ExecutionContext;

    /// Replaces the provider bundle. Call before `start`.
    fn set_context(&mut self, ctx: ExecutionContext);

    /// Runs after the engine entered `Running`.
    fn on_started(&mut self) -> ExecutionResult<()>;

    /// Runs once per update while the engine is `Running`.
    fn on_updated(&mut self) -> ExecutionResult<()>;

    /// Runs after the engine returned to `None`.
    fn on_stopped(&mut self) -> ExecutionResult<()>;

    fn on_paused(&mut self);

    /// Runs on the first update after a pause, before `on_updated`.
    fn on_resumed(&mut self);

    fn status(&self) -> Status {
        self.lifecycle().status()
    }

    fn is_paused(&self) -> bool {
        self.lifecycle().is_paused()
    }

    /// # Errors
    ///
    /// `AlreadyStarted` unless the engine is stopped, plus anything the graph
    /// raises while starting.
    fn start(&mut self) -> ExecutionResult<()> {
        self.lifecycle().ensure_startable(self.name())?;
        tracing::debug!("starting engine '{}'", self.name());
        self.lifecycle_mut().mark_started();
        self.on_started()
    }

    /// Ticks the engine once. A finished engine is left as it is.
    ///
    /// # Errors
    ///
    /// `NotStarted` if the engine was never started or has been stopped.
    fn update(&mut self) -> ExecutionResult<()> {
        self.lifecycle().ensure_started(self.name())?;
        if self.lifecycle_mut().take_paused() {
            tracing::trace!("resuming engine '{}'", self.name());
            self.on_resumed();
        }
        if self.status().is_finished() {
            return Ok(());
        }
        self.on_updated()
    }

    /// # Errors
    ///
    /// `NotStarted` if the engine is already stopped.
    fn stop(&mut self) -> ExecutionResult<()> {
        self.lifecycle().ensure_started(self.name())?;
        tracing::debug!("stopping engine '{}'", self.name());
        self.lifecycle_mut().mark_stopped();
        self.on_stopped()
    }

    /// Pauses a running engine; no-op otherwise.
    fn pause(&mut self) {
        if self.lifecycle_mut().mark_paused() {
            tracing::debug!("pausing engine '{}'", self.name());
            self.on_paused();
        }
    }

    /// Forces a terminal status, bypassing the per-tick computation.
    ///
    /// # Errors
    ///
    /// `InvalidFinishStatus` unless `status` is Success or Failure,
    /// `NotStarted` if the engine is stopped.
    fn finish(&mut self, status: Status) -> ExecutionResult<()> {
        if !status.is_finished() {
            return Err(ExecutionError::InvalidFinishStatus(status));
        }
        self.lifecycle().ensure_started(self.name())?;
        tracing::debug!("engine '{}' finished with {}", self.name(), status);
        self.lifecycle_mut().set_status(status);
        Ok(())
    }
}
