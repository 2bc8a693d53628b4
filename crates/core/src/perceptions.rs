//! Ready-made perceptions.

use std::fmt;
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::engine::SharedEngine;
use crate::error::{ExecutionError, ExecutionResult};
use crate::status::StatusFlags;
use crate::task::Perception;
use crate::timer::Timer;

/// Perception evaluating a closure.
pub struct ConditionPerception {
    condition: Box<dyn FnMut() -> bool>,
}

impl ConditionPerception {
    pub fn new(condition: impl FnMut() -> bool + 'static) -> Self {
        Self {
            condition: Box::new(condition),
        }
    }
}

impl Perception for ConditionPerception {
    fn check(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<bool> {
        Ok((self.condition)())
    }
}

impl fmt::Debug for ConditionPerception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionPerception").finish_non_exhaustive()
    }
}

/// Hooks of every member are forwarded in declaration order; checks
/// short-circuit.
#[derive(Default)]
struct Compound {
    members: Vec<Box<dyn Perception>>,
}

impl Compound {
    fn start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.members.iter_mut().try_for_each(|p| p.on_start(ctx))
    }

    fn stop(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.members.iter_mut().try_for_each(|p| p.on_stop(ctx))
    }

    fn pause(&mut self, ctx: &ExecutionContext) {
        self.members.iter_mut().for_each(|p| p.on_pause(ctx));
    }

    fn resume(&mut self, ctx: &ExecutionContext) {
        self.members.iter_mut().for_each(|p| p.on_resume(ctx));
    }

    /// Checks members until one returns `stop_on`.
    fn check_until(&mut self, ctx: &ExecutionContext, stop_on: bool) -> ExecutionResult<bool> {
        for member in &mut self.members {
            if member.check(ctx)? == stop_on {
                return Ok(stop_on);
            }
        }
        Ok(!stop_on)
    }
}

/// True when every member is true. An empty list is true.
#[derive(Default)]
pub struct AndPerception {
    inner: Compound,
}

impl AndPerception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member (builder pattern).
    #[must_use]
    pub fn with(mut self, perception: impl Perception + 'static) -> Self {
        self.inner.members.push(Box::new(perception));
        self
    }

    pub fn push(&mut self, perception: Box<dyn Perception>) {
        self.inner.members.push(perception);
    }
}

impl Perception for AndPerception {
    fn on_start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.inner.start(ctx)
    }

    fn check(&mut self, ctx: &ExecutionContext) -> ExecutionResult<bool> {
        self.inner.check_until(ctx, false)
    }

    fn on_stop(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.inner.stop(ctx)
    }

    fn on_pause(&mut self, ctx: &ExecutionContext) {
        self.inner.pause(ctx);
    }

    fn on_resume(&mut self, ctx: &ExecutionContext) {
        self.inner.resume(ctx);
    }
}

impl fmt::Debug for AndPerception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndPerception")
            .field("members", &self.inner.members.len())
            .finish()
    }
}

/// True when any member is true. An empty list is false.
#[derive(Default)]
pub struct OrPerception {
    inner: Compound,
}

impl OrPerception {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member (builder pattern).
    #[must_use]
    pub fn with(mut self, perception: impl Perception + 'static) -> Self {
        self.inner.members.push(Box::new(perception));
        self
    }

    pub fn push(&mut self, perception: Box<dyn Perception>) {
        self.inner.members.push(perception);
    }
}

impl Perception for OrPerception {
    fn on_start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.inner.start(ctx)
    }

    fn check(&mut self, ctx: &ExecutionContext) -> ExecutionResult<bool> {
        self.inner.check_until(ctx, true)
    }

    fn on_stop(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.inner.stop(ctx)
    }

    fn on_pause(&mut self, ctx: &ExecutionContext) {
        self.inner.pause(ctx);
    }

    fn on_resume(&mut self, ctx: &ExecutionContext) {
        self.inner.resume(ctx);
    }
}

impl fmt::Debug for OrPerception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrPerception")
            .field("members", &self.inner.members.len())
            .finish()
    }
}

/// True once `duration` has elapsed since the perception started.
///
/// The timer comes from the context's timer provider, so starting fails with
/// `TimerNotAvailable` when the context has none.
pub struct TimerPerception {
    duration: Duration,
    timer: Option<Box<dyn Timer>>,
}

impl TimerPerception {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            timer: None,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Perception for TimerPerception {
    fn on_start(&mut self, ctx: &ExecutionContext) -> ExecutionResult<()> {
        let mut timer = ctx.timer()?.create_timer(self.duration);
        timer.start();
        self.timer = Some(timer);
        Ok(())
    }

    fn check(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<bool> {
        Ok(self.timer.as_ref().is_some_and(|timer| timer.is_elapsed()))
    }

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {
        if let Some(timer) = &mut self.timer {
            timer.pause();
        }
    }

    fn on_resume(&mut self, _ctx: &ExecutionContext) {
        if let Some(timer) = &mut self.timer {
            timer.resume();
        }
    }
}

impl fmt::Debug for TimerPerception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerPerception")
            .field("duration", &self.duration)
            .field("started", &self.timer.is_some())
            .finish()
    }
}

/// True while a shared engine's status intersects `mask`.
pub struct ExecutionStatusPerception {
    engine: SharedEngine,
    mask: StatusFlags,
}

impl ExecutionStatusPerception {
    pub fn new(engine: SharedEngine, mask: StatusFlags) -> Self {
        Self { engine, mask }
    }
}

impl Perception for ExecutionStatusPerception {
    fn check(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<bool> {
        let engine = self
            .engine
            .try_borrow()
            .map_err(|_| ExecutionError::SubsystemBusy)?;
        Ok(engine.status().matches(self.mask))
    }
}

impl fmt::Debug for ExecutionStatusPerception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionStatusPerception")
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::context::ProviderError;
    use crate::testing::FlagPerception;
    use crate::timer::ManualClock;

    #[test]
    fn and_short_circuits_on_first_false() {
        let first = FlagPerception::new(false);
        let second = FlagPerception::new(true);
        let mut and = AndPerception::new()
            .with(first.clone())
            .with(second.clone());
        let ctx = ExecutionContext::empty();

        and.on_start(&ctx).unwrap();
        assert_eq!(and.check(&ctx), Ok(false));
        assert_eq!(second.probe().checks(), 0);
        assert_eq!(second.probe().starts(), 1);

        first.set(true);
        assert_eq!(and.check(&ctx), Ok(true));
    }

    #[test]
    fn or_short_circuits_on_first_true() {
        let first = FlagPerception::new(true);
        let second = FlagPerception::new(false);
        let mut or = OrPerception::new().with(first.clone()).with(second.clone());
        let ctx = ExecutionContext::empty();

        assert_eq!(or.check(&ctx), Ok(true));
        assert_eq!(second.probe().checks(), 0);

        first.set(false);
        assert_eq!(or.check(&ctx), Ok(false));
        assert!(!OrPerception::new().check(&ctx).unwrap());
        assert!(AndPerception::new().check(&ctx).unwrap());
    }

    #[test]
    fn timer_perception_needs_a_timer_provider() {
        let mut perception = TimerPerception::new(Duration::from_secs(1));
        assert_eq!(
            perception.on_start(&ExecutionContext::empty()),
            Err(ProviderError::TimerNotAvailable.into())
        );

        let clock = ManualClock::new();
        let ctx = ExecutionContext::empty().with_timer(clock.clone());
        perception.on_start(&ctx).unwrap();
        assert_eq!(perception.check(&ctx), Ok(false));
        clock.advance_secs(1);
        assert_eq!(perception.check(&ctx), Ok(true));
    }

    #[test]
    fn condition_perception_calls_closure() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut perception = ConditionPerception::new(move || {
            counter.set(counter.get() + 1);
            counter.get() > 1
        });
        let ctx = ExecutionContext::empty();
        assert_eq!(perception.check(&ctx), Ok(false));
        assert_eq!(perception.check(&ctx), Ok(true));
        assert_eq!(calls.get(), 2);
    }
}
