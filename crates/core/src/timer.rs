//! Injected timing.
//!
//! Nodes never read a clock themselves. They ask the context's
//! [`TimerProvider`] for a [`Timer`] and poll it once per tick, so the host
//! decides what time means: wall time through [`SystemClock`], or a
//! deterministic, manually advanced [`ManualClock`] for turn-based hosts and
//! tests.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Creates timers for nodes that need to wait.
pub trait TimerProvider {
    fn create_timer(&self, duration: Duration) -> Box<dyn Timer>;
}

/// A countdown polled by its owner.
pub trait Timer {
    /// Starts (or restarts) the countdown.
    fn start(&mut self);

    /// Stops and resets the countdown.
    fn stop(&mut self);

    /// Freezes the countdown. No-op unless running.
    fn pause(&mut self);

    /// Continues a frozen countdown. No-op unless paused.
    fn resume(&mut self);

    /// Returns `true` once the full duration has run while started.
    fn is_elapsed(&self) -> bool;

    fn duration(&self) -> Duration;
}

/// Monotonic time source used by [`ClockTimer`].
pub trait TimeSource {
    fn now(&self) -> Duration;
}

/// Timer measuring a duration against any [`TimeSource`].
#[derive(Clone, Debug)]
pub struct ClockTimer<S> {
    source: S,
    duration: Duration,
    started_at: Option<Duration>,
    paused_at: Option<Duration>,
    paused_total: Duration,
}

impl<S: TimeSource> ClockTimer<S> {
    pub fn new(source: S, duration: Duration) -> Self {
        Self {
            source,
            duration,
            started_at: None,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Time counted so far, excluding paused spans.
    pub fn elapsed(&self) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        let now = self.paused_at.unwrap_or_else(|| self.source.now());
        now.saturating_sub(started_at)
            .saturating_sub(self.paused_total)
    }
}

impl<S: TimeSource> Timer for ClockTimer<S> {
    fn start(&mut self) {
        self.started_at = Some(self.source.now());
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    fn stop(&mut self) {
        self.started_at = None;
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    fn pause(&mut self) {
        if self.started_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(self.source.now());
        }
    }

    fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += self.source.now().saturating_sub(paused_at);
        }
    }

    fn is_elapsed(&self) -> bool {
        self.started_at.is_some() && self.elapsed() >= self.duration
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

/// Clock advanced explicitly by the host.
///
/// Clones share the same time, so the host keeps one handle and gives
/// another to the context.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Moves time forward by whole seconds.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl TimerProvider for ManualClock {
    fn create_timer(&self, duration: Duration) -> Box<dyn Timer> {
        Box::new(ClockTimer::new(self.clone(), duration))
    }
}

/// Wall clock based on [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl TimerProvider for SystemClock {
    fn create_timer(&self, duration: Duration) -> Box<dyn Timer> {
        Box::new(ClockTimer::new(*self, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_timer_elapses_after_duration() {
        let clock = ManualClock::new();
        let mut timer = clock.create_timer(Duration::from_secs(2));
        assert!(!timer.is_elapsed());

        timer.start();
        clock.advance_secs(1);
        assert!(!timer.is_elapsed());
        clock.advance_secs(1);
        assert!(timer.is_elapsed());

        timer.stop();
        assert!(!timer.is_elapsed());
    }

    #[test]
    fn paused_span_is_not_counted() {
        let clock = ManualClock::new();
        let mut timer = ClockTimer::new(clock.clone(), Duration::from_secs(3));
        timer.start();
        clock.advance_secs(2);
        timer.pause();
        clock.advance_secs(10);
        assert!(!timer.is_elapsed());
        assert_eq!(timer.elapsed(), Duration::from_secs(2));

        timer.resume();
        clock.advance_secs(1);
        assert!(timer.is_elapsed());
    }
}
