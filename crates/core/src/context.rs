//! Provider bundle handed to engines before they start.
//!
//! The [`ExecutionContext`] aggregates optional services (timers, random
//! numbers) so nodes can reach them without being coupled to concrete
//! implementations. Nothing is required up front: a missing provider only
//! fails the node that actually asks for it, at the moment it asks.

use std::fmt;
use std::rc::Rc;

use crate::error::{EngineError, ErrorClass};
use crate::random::RandomProvider;
use crate::timer::TimerProvider;

/// A provider requested by a node is not part of the context.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// No timer provider was supplied.
    #[error("timer provider not available")]
    TimerNotAvailable,

    /// No random provider was supplied.
    #[error("random provider not available")]
    RandomNotAvailable,
}

impl EngineError for ProviderError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Execution
    }

    fn error_code(&self) -> &'static str {
        match self {
            ProviderError::TimerNotAvailable => "PROVIDER_TIMER_NOT_AVAILABLE",
            ProviderError::RandomNotAvailable => "PROVIDER_RANDOM_NOT_AVAILABLE",
        }
    }
}

/// Optional providers shared by every node of an engine.
#[derive(Clone, Default)]
pub struct ExecutionContext {
    timer: Option<Rc<dyn TimerProvider>>,
    random: Option<Rc<dyn RandomProvider>>,
}

impl ExecutionContext {
    /// Creates a context without providers.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        timer: Option<Rc<dyn TimerProvider>>,
        random: Option<Rc<dyn RandomProvider>>,
    ) -> Self {
        Self { timer, random }
    }

    /// Attaches a timer provider (builder pattern).
    #[must_use]
    pub fn with_timer(mut self, timer: impl TimerProvider + 'static) -> Self {
        self.timer = Some(Rc::new(timer));
        self
    }

    /// Attaches a random provider (builder pattern).
    #[must_use]
    pub fn with_random(mut self, random: impl RandomProvider + 'static) -> Self {
        self.random = Some(Rc::new(random));
        self
    }

    /// Returns the timer provider, or an error if not available.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::TimerNotAvailable` if no timer provider was supplied.
    pub fn timer(&self) -> Result<&dyn TimerProvider, ProviderError> {
        self.timer.as_deref().ok_or_else(|| {
            tracing::debug!("node requested a timer but the context has none");
            ProviderError::TimerNotAvailable
        })
    }

    /// Returns the random provider, or an error if not available.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::RandomNotAvailable` if no random provider was supplied.
    pub fn random(&self) -> Result<&dyn RandomProvider, ProviderError> {
        self.random.as_deref().ok_or_else(|| {
            tracing::debug!("node requested random numbers but the context has none");
            ProviderError::RandomNotAvailable
        })
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("timer", &self.timer.is_some())
            .field("random", &self.random.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use crate::timer::ManualClock;

    #[test]
    fn missing_providers_fail_lazily() {
        let ctx = ExecutionContext::empty();
        assert_eq!(ctx.timer().err(), Some(ProviderError::TimerNotAvailable));
        assert_eq!(ctx.random().err(), Some(ProviderError::RandomNotAvailable));

        let ctx = ctx.with_random(SeededRandom::new(7));
        assert!(ctx.random().is_ok());
        assert!(ctx.timer().is_err());

        let ctx = ctx.with_timer(ManualClock::new());
        assert!(ctx.timer().is_ok());
    }
}
