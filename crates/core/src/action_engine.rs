//! Engine running a single action.

use crate::context::ExecutionContext;
use crate::engine::Engine;
use crate::error::ExecutionResult;
use crate::lifecycle::Lifecycle;
use crate::task::{Action, ActionTask};

/// Smallest possible engine: one [`ActionTask`] driven by the engine
/// lifecycle. The engine finishes with the action's terminal status.
#[derive(Debug)]
pub struct ActionEngine {
    name: String,
    lifecycle: Lifecycle,
    context: ExecutionContext,
    task: ActionTask,
}

impl ActionEngine {
    pub fn new(name: impl Into<String>, action: impl Action + 'static) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::new(),
            context: ExecutionContext::empty(),
            task: ActionTask::new(action),
        }
    }

    pub fn task(&self) -> &ActionTask {
        &self.task
    }
}

impl Engine for ActionEngine {
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
        self.task.start(&self.context)
    }

    fn on_updated(&mut self) -> ExecutionResult<()> {
        let status = self.task.update(&self.context)?;
        if status.is_finished() {
            self.lifecycle.set_status(status);
        }
        Ok(())
    }

    fn on_stopped(&mut self) -> ExecutionResult<()> {
        self.task.stop(&self.context)
    }

    fn on_paused(&mut self) {
        self.task.pause(&self.context);
    }

    fn on_resumed(&mut self) {
        self.task.resume(&self.context);
    }
}
