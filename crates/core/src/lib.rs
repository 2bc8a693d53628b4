//! Shared foundation of the decision engines.
//!
//! This crate holds everything the behaviour tree, state machine and utility
//! system have in common:
//!
//! - **Graph model**: [`Graph`] is an arena of typed nodes with validated,
//!   cardinality-limited connections
//! - **Lifecycle**: [`Lifecycle`] enforces the strict Start/Update/Stop/Pause
//!   protocol of nodes and engines, [`Engine`] is the top-level contract
//! - **Tasks**: [`ActionTask`] and [`PerceptionTask`] wrap user behaviour with a
//!   lenient lifecycle
//! - **Context**: [`ExecutionContext`] carries the optional timer and random
//!   providers
//! - **Blackboard**: [`Blackboard`] fields and live-binding [`Parameter`]s
//!
//! Execution is single-threaded and call-driven. `Running` is a return value;
//! the host calls `update` again on its next tick.

pub mod action_engine;
pub mod actions;
pub mod blackboard;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod perceptions;
pub mod random;
pub mod status;
pub mod task;
pub mod timer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action_engine::ActionEngine;
pub use actions::{FunctionalAction, SubsystemAction};
pub use blackboard::{Blackboard, BlackboardError, BlackboardField, Parameter, SubscriptionId};
pub use context::{ExecutionContext, ProviderError};
pub use engine::{Engine, SharedEngine, share};
pub use error::{EngineError, ErrorClass, ExecutionError, ExecutionResult, GraphError};
pub use graph::{Capacity, Graph, NodeId, NodeKind, Position, Vertex};
pub use lifecycle::Lifecycle;
pub use perceptions::{
    AndPerception, ConditionPerception, ExecutionStatusPerception, OrPerception, TimerPerception,
};
pub use random::{RandomProvider, SeededRandom, weighted_index};
pub use status::{Status, StatusFlags};
pub use task::{Action, ActionTask, Perception, PerceptionTask};
pub use timer::{ClockTimer, ManualClock, SystemClock, TimeSource, Timer, TimerProvider};
