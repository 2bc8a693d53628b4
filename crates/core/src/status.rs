//! Execution status shared by every node, task and engine.

use bitflags::bitflags;

/// The result of executing a node, task or engine.
///
/// # Lifecycle
///
/// - `None`: not started, or stopped.
/// - `Running`: started and still working. The caller must update again.
/// - `Success` / `Failure`: finished; stays there until the owner is stopped.
///
/// Pausing is tracked separately as a flag on a `Running` owner, it is not a
/// status of its own.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Status {
    /// Not started.
    #[default]
    None,

    /// Started and not yet finished.
    Running,

    /// Finished successfully.
    ///
    /// For perceptions mapped to statuses: the check returned the mapped value.
    Success,

    /// Finished unsuccessfully.
    Failure,
}

impl Status {
    /// Returns `true` if this status is `Success`.
    #[inline]
    pub fn is_success(self) -> bool {
        matches!(self, Status::Success)
    }

    /// Returns `true` if this status is `Failure`.
    #[inline]
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Failure)
    }

    /// Returns `true` if this status is `Running`.
    #[inline]
    pub fn is_running(self) -> bool {
        matches!(self, Status::Running)
    }

    /// Returns `true` for the two terminal statuses.
    #[inline]
    pub fn is_finished(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }

    /// Inverts the status: Success becomes Failure and vice versa.
    ///
    /// `None` and `Running` are returned unchanged.
    #[inline]
    pub fn invert(self) -> Self {
        match self {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            other => other,
        }
    }

    /// Returns the flag bit matching this status. `None` maps to the empty set.
    #[inline]
    pub fn flags(self) -> StatusFlags {
        match self {
            Status::None => StatusFlags::empty(),
            Status::Running => StatusFlags::RUNNING,
            Status::Success => StatusFlags::SUCCESS,
            Status::Failure => StatusFlags::FAILURE,
        }
    }

    /// Returns `true` if this status is contained in `mask`.
    #[inline]
    pub fn matches(self, mask: StatusFlags) -> bool {
        mask.intersects(self.flags())
    }
}

bitflags! {
    /// Set of statuses, used by transitions and status perceptions as a mask.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusFlags: u8 {
        const RUNNING  = 1 << 0;
        const SUCCESS  = 1 << 1;
        const FAILURE  = 1 << 2;
        const FINISHED = Self::SUCCESS.bits() | Self::FAILURE.bits();
        const ACTIVE   = Self::RUNNING.bits() | Self::FINISHED.bits();
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::ACTIVE
    }
}

impl From<Status> for StatusFlags {
    fn from(status: Status) -> Self {
        status.flags()
    }
}
