//! Behaviour tree engine on top of the shared decision graph.
//!
//! A [`BehaviorTree`] owns a loop-free graph of [`BtNode`]s and runs it from
//! the root, the first node in the graph. Every node follows the strict
//! lifecycle: it is started once, updated once per tick while running, and
//! stopped recursively when its parent no longer needs it.
//!
//! # Architecture
//!
//! - [`BehaviorTree`]: the engine, implementing [`decision_core::Engine`]
//! - [`BtNode`]: lifecycle plus one of the three node categories
//! - Composite nodes: [`Composite`] (sequence, selector, parallel, branch)
//! - Decorator nodes: [`Decorator`] (inverter, succeeder, loops, condition,
//!   timer, rush)
//! - Leaf nodes: [`Leaf`] (action, perception)
//! - [`builder`]: helpers to assemble trees bottom-up

pub mod builder;
pub mod composite;
pub mod decorator;
pub mod leaf;
pub mod node;
pub mod tree;

// Re-export core types for ergonomic API
pub use composite::{BranchSelection, BranchSelector, Composite, ParallelPolicy, Serial};
pub use decorator::{ConditionGate, Decorator, Repeat, Wait};
pub use leaf::{Leaf, PerceptionLeaf};
pub use node::{BtKind, BtNode};
pub use tree::BehaviorTree;
