//! Common error infrastructure for the decision engines.
//!
//! Errors come in two tiers, both raised synchronously by the call that
//! triggered them and never retried internally:
//!
//! - **Creation**: invalid graph mutations ([`GraphError`]). Deterministic and
//!   correctable by the caller; the graph is left untouched.
//! - **Execution**: lifecycle misuse or missing wiring ([`ExecutionError`]).
//!   These signal an incompletely authored graph or a host bug.

use crate::blackboard::BlackboardError;
use crate::context::ProviderError;
use crate::graph::NodeId;
use crate::status::Status;

/// Tier an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorClass {
    /// Raised by a graph mutation call.
    Creation,

    /// Raised while starting, updating, stopping or finishing.
    Execution,
}

impl ErrorClass {
    /// Returns a human-readable description of this class.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Execution => "execution",
        }
    }
}

/// Common trait for every error raised by the engines.
///
/// # Implementation Guidelines
///
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Return one stable code per variant so tests and logs can match on it
pub trait EngineError: core::fmt::Display + core::fmt::Debug {
    /// Returns the tier of this error.
    fn class(&self) -> ErrorClass;

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Invalid graph mutation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The handle was issued by a different graph, or the node was removed.
    #[error("node {0} is not owned by this graph")]
    NotOwned(NodeId),

    /// A node cannot be connected to itself.
    #[error("cannot connect node {0} to itself")]
    SelfConnection(NodeId),

    /// The target is not of the type the source accepts as a child.
    #[error("node '{child}' ({child_kind}) is not a valid child of '{parent}' ({parent_kind})")]
    IncompatibleChild {
        parent: String,
        parent_kind: &'static str,
        child: String,
        child_kind: &'static str,
    },

    /// The source already has as many children as it may have.
    #[error("node '{node}' cannot have more than {limit} children")]
    OutputLimitReached { node: String, limit: usize },

    /// The target already has as many parents as it may have.
    #[error("node '{node}' cannot have more than {limit} parents")]
    InputLimitReached { node: String, limit: usize },

    /// The edge already exists.
    #[error("'{parent}' is already connected to '{child}'")]
    AlreadyConnected { parent: String, child: String },

    /// The edge would close a cycle in a graph that forbids loops.
    #[error("connecting '{parent}' to '{child}' would create a loop")]
    LoopDetected { parent: String, child: String },

    /// The edge to remove does not exist.
    #[error("'{parent}' is not connected to '{child}'")]
    NotConnected { parent: String, child: String },

    /// Connected nodes must be disconnected before removal.
    #[error("node '{0}' still has connections")]
    StillConnected(String),

    /// A positional argument is outside the valid range.
    #[error("index {index} is out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl EngineError for GraphError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Creation
    }

    fn error_code(&self) -> &'static str {
        use GraphError::*;
        match self {
            NotOwned(_) => "GRAPH_NOT_OWNED",
            SelfConnection(_) => "GRAPH_SELF_CONNECTION",
            IncompatibleChild { .. } => "GRAPH_INCOMPATIBLE_CHILD",
            OutputLimitReached { .. } => "GRAPH_OUTPUT_LIMIT",
            InputLimitReached { .. } => "GRAPH_INPUT_LIMIT",
            AlreadyConnected { .. } => "GRAPH_ALREADY_CONNECTED",
            LoopDetected { .. } => "GRAPH_LOOP_DETECTED",
            NotConnected { .. } => "GRAPH_NOT_CONNECTED",
            StillConnected(_) => "GRAPH_STILL_CONNECTED",
            IndexOutOfBounds { .. } => "GRAPH_INDEX_OUT_OF_BOUNDS",
        }
    }
}

/// Lifecycle misuse or missing wiring detected at execution time.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// `start` was called on something that is not stopped.
    #[error("'{0}' is already started")]
    AlreadyStarted(String),

    /// `update`, `stop` or `finish` was called before `start`.
    #[error("'{0}' is not started")]
    NotStarted(String),

    /// `finish` or a status mapping was given a non-terminal status.
    #[error("{0} is not a terminal status (expected success or failure)")]
    InvalidFinishStatus(Status),

    /// The engine graph has no nodes.
    #[error("graph '{0}' is empty")]
    EmptyGraph(String),

    /// A node needs a connection it does not have.
    #[error("node '{0}' is missing a required connection")]
    MissingConnection(String),

    /// A leaf or state has no task assigned.
    #[error("node '{0}' has no task")]
    MissingTask(String),

    /// A condition node has no perception assigned.
    #[error("node '{0}' has no perception")]
    MissingPerception(String),

    /// A utility element has no factor child.
    #[error("utility element '{0}' has no factor")]
    MissingFactor(String),

    /// A utility system has no root-level elements.
    #[error("utility system '{0}' has no candidates")]
    MissingCandidates(String),

    /// A subsystem action has no engine assigned.
    #[error("subsystem action has no engine")]
    MissingSubsystem,

    /// A subsystem engine is already borrowed, which means it is ticking itself.
    #[error("subsystem engine is already executing")]
    SubsystemBusy,

    /// The first node of a state machine cannot be entered.
    #[error("node '{0}' cannot be used as entry state")]
    InvalidEntryState(String),

    /// A transition was performed while its source is not the current state.
    #[error("transition '{transition}' cannot be performed from current state '{current}'")]
    InvalidTransition { transition: String, current: String },

    /// The node handle does not belong to the engine.
    #[error("node {0} is not part of this engine")]
    UnknownNode(NodeId),

    /// A required context provider is missing.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A blackboard lookup failed.
    #[error(transparent)]
    Blackboard(#[from] BlackboardError),
}

impl EngineError for ExecutionError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Execution
    }

    fn error_code(&self) -> &'static str {
        use ExecutionError::*;
        match self {
            AlreadyStarted(_) => "EXEC_ALREADY_STARTED",
            NotStarted(_) => "EXEC_NOT_STARTED",
            InvalidFinishStatus(_) => "EXEC_INVALID_FINISH_STATUS",
            EmptyGraph(_) => "EXEC_EMPTY_GRAPH",
            MissingConnection(_) => "EXEC_MISSING_CONNECTION",
            MissingTask(_) => "EXEC_MISSING_TASK",
            MissingPerception(_) => "EXEC_MISSING_PERCEPTION",
            MissingFactor(_) => "EXEC_MISSING_FACTOR",
            MissingCandidates(_) => "EXEC_MISSING_CANDIDATES",
            MissingSubsystem => "EXEC_MISSING_SUBSYSTEM",
            SubsystemBusy => "EXEC_SUBSYSTEM_BUSY",
            InvalidEntryState(_) => "EXEC_INVALID_ENTRY_STATE",
            InvalidTransition { .. } => "EXEC_INVALID_TRANSITION",
            UnknownNode(_) => "EXEC_UNKNOWN_NODE",
            Provider(err) => err.error_code(),
            Blackboard(err) => err.error_code(),
        }
    }
}

/// Convenience alias for execution results.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
