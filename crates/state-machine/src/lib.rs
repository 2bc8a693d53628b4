//! Finite-state machine engine on top of the shared decision graph.
//!
//! A [`StateMachine`] graph alternates states and transitions. The first
//! node is the entry state. While a state is current its action runs every
//! tick; afterwards its outgoing transitions are checked in order and the
//! first eligible one fires.
//!
//! # Architecture
//!
//! - [`StateMachine`]: the engine, implementing [`decision_core::Engine`]
//! - [`FsmNode`]: lifecycle plus a state or a transition
//! - [`Transition`]: state, exit, probability, push and pop transitions
//!
//! Any-states ([`FsmNode::any_state`]) are never current; their transitions
//! are checked after those of the current state and may fire from anywhere.

pub mod machine;
pub mod state;
pub mod transition;

pub use machine::StateMachine;
pub use state::{FsmKind, FsmNode, StateKind};
pub use transition::{Transition, TransitionKind};
