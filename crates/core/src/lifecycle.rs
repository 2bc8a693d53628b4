//! Strict Start/Update/Stop/Pause bookkeeping shared by nodes and engines.
//!
//! [`Lifecycle`] only records state and validates calls; the owner runs its
//! own hooks around it. The rules:
//!
//! - start requires `None` and leaves `Running`
//! - update and stop require anything but `None`
//! - pause only applies to a `Running`, not yet paused owner
//! - the first update after a pause clears the flag and must run the owner's
//!   resume hook before anything else
//!
//! Status changes are reported to observers synchronously, once per change.

use std::fmt;

use crate::error::ExecutionError;
use crate::status::Status;

type StatusObserver = Box<dyn FnMut(Status)>;

/// Status and pause flag of a node or engine.
#[derive(Default)]
pub struct Lifecycle {
    status: Status,
    paused: bool,
    observers: Vec<StatusObserver>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Registers a callback fired after every status change.
    pub fn subscribe(&mut self, observer: impl FnMut(Status) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Fails unless the owner is stopped.
    pub fn ensure_startable(&self, owner: &str) -> Result<(), ExecutionError> {
        if self.status == Status::None {
            Ok(())
        } else {
            Err(ExecutionError::AlreadyStarted(owner.to_owned()))
        }
    }

    /// Fails if the owner is stopped.
    pub fn ensure_started(&self, owner: &str) -> Result<(), ExecutionError> {
        if self.status == Status::None {
            Err(ExecutionError::NotStarted(owner.to_owned()))
        } else {
            Ok(())
        }
    }

    /// Enters `Running` with the pause flag cleared.
    pub fn mark_started(&mut self) {
        self.paused = false;
        self.set_status(Status::Running);
    }

    /// Returns to `None` with the pause flag cleared.
    pub fn mark_stopped(&mut self) {
        self.paused = false;
        self.set_status(Status::None);
    }

    /// Sets the pause flag. Returns `false`, doing nothing, unless the owner
    /// is running and not already paused.
    pub fn mark_paused(&mut self) -> bool {
        if self.status != Status::Running || self.paused {
            return false;
        }
        self.paused = true;
        true
    }

    /// Clears the pause flag, returning whether it was set.
    #[must_use]
    pub fn take_paused(&mut self) -> bool {
        std::mem::take(&mut self.paused)
    }

    /// Records a new status and notifies observers if it changed.
    pub fn set_status(&mut self, status: Status) {
        if self.status == status {
            return;
        }
        self.status = status;
        for observer in &mut self.observers {
            observer(status);
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("status", &self.status)
            .field("paused", &self.paused)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn strict_ordering_is_enforced() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.ensure_started("node").is_err());
        lifecycle.ensure_startable("node").unwrap();
        lifecycle.mark_started();

        assert_eq!(
            lifecycle.ensure_startable("node"),
            Err(ExecutionError::AlreadyStarted("node".into()))
        );
        lifecycle.mark_stopped();
        assert_eq!(
            lifecycle.ensure_started("node"),
            Err(ExecutionError::NotStarted("node".into()))
        );
    }

    #[test]
    fn pause_applies_only_while_running() {
        let mut lifecycle = Lifecycle::new();
        assert!(!lifecycle.mark_paused());

        lifecycle.mark_started();
        assert!(lifecycle.mark_paused());
        assert!(!lifecycle.mark_paused());
        assert!(lifecycle.take_paused());
        assert!(!lifecycle.take_paused());

        lifecycle.set_status(Status::Success);
        assert!(!lifecycle.mark_paused());
    }

    #[test]
    fn observers_fire_once_per_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut lifecycle = Lifecycle::new();
        let sink = Rc::clone(&seen);
        lifecycle.subscribe(move |status| sink.borrow_mut().push(status));

        lifecycle.mark_started();
        lifecycle.set_status(Status::Running);
        lifecycle.set_status(Status::Failure);
        lifecycle.mark_stopped();

        assert_eq!(
            *seen.borrow(),
            vec![Status::Running, Status::Failure, Status::None]
        );
    }
}
