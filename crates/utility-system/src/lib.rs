//! Utility-based selection on top of the shared decision graph.
//!
//! A [`UtilitySystem`] graph holds two kinds of nodes:
//!
//! - **Factors** compute a score in `[0, 1]` from constants, sampled
//!   variables, curves and fusions of other factors
//! - **Elements** compete for selection: actions, exits and buckets
//!
//! Root-level elements are the candidates. Each tick every utility is
//! recomputed, the running candidate gets an inertia bonus and the strictly
//! best candidate runs. Buckets repeat that selection among their own
//! elements, either with inertia or locked until the selection finishes.

pub mod config;
pub mod element;
pub mod factor;
pub mod node;
pub mod system;

pub use config::{BucketConfig, UtilityConfig};
pub use element::{Bucket, BucketPolicy, Element, ElementKind, UtilityAction};
pub use factor::{Curve, Factor, Fusion, Variable, normalize};
pub use node::{UtilityKind, UtilityNode};
pub use system::UtilitySystem;
