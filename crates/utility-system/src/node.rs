//! Utility system node payload.
//!
//! Every vertex of a [`UtilitySystem`](crate::UtilitySystem) graph is either a
//! [`Factor`] or an [`Element`]. Each node caches its last utility; the
//! cache is refreshed only when the node is dirty, so a factor shared by
//! several elements is computed once per tick.

use decision_core::{Action, ActionTask, Capacity, Lifecycle, NodeKind, Status};

use crate::config::BucketConfig;
use crate::element::{Bucket, BucketPolicy, Element, ElementKind, UtilityAction};
use crate::factor::{Curve, Factor, Fusion, Variable};

/// Category of a utility node.
#[derive(Debug)]
pub enum UtilityKind {
    Factor(Factor),
    Element(Element),
}

/// A utility node: lifecycle, cached utility and behaviour.
#[derive(Debug)]
pub struct UtilityNode {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) kind: UtilityKind,
    pub(crate) utility: f32,
    pub(crate) dirty: bool,
}

impl UtilityNode {
    pub fn new(kind: UtilityKind) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            kind,
            utility: 0.0,
            dirty: true,
        }
    }

    fn factor(factor: Factor) -> Self {
        Self::new(UtilityKind::Factor(factor))
    }

    fn element(kind: ElementKind) -> Self {
        Self::new(UtilityKind::Element(Element::new(kind)))
    }

    pub fn constant(value: f32) -> Self {
        Self::factor(Factor::Constant(value))
    }

    /// Factor sampling `function` and mapping `[min, max]` onto `[0, 1]`.
    pub fn variable(function: impl FnMut() -> f32 + 'static, min: f32, max: f32) -> Self {
        Self::factor(Factor::Variable(Variable::new(function, min, max)))
    }

    pub fn curve(curve: Curve) -> Self {
        Self::factor(Factor::Curve(curve))
    }

    pub fn linear(slope: f32, intercept: f32) -> Self {
        Self::curve(Curve::Linear { slope, intercept })
    }

    pub fn exponential(exponent: f32, dx: f32, dy: f32) -> Self {
        Self::curve(Curve::Exponential { exponent, dx, dy })
    }

    pub fn sigmoid(grow_rate: f32, midpoint: f32) -> Self {
        Self::curve(Curve::Sigmoid {
            grow_rate,
            midpoint,
        })
    }

    pub fn dashed(points: impl Into<Vec<(f32, f32)>>) -> Self {
        Self::curve(Curve::dashed(points))
    }

    pub fn custom(function: impl FnMut(f32) -> f32 + 'static) -> Self {
        Self::curve(Curve::custom(function))
    }

    pub fn fusion(fusion: Fusion) -> Self {
        Self::factor(Factor::Fusion(fusion))
    }

    pub fn min() -> Self {
        Self::fusion(Fusion::Min)
    }

    pub fn max() -> Self {
        Self::fusion(Fusion::Max)
    }

    pub fn weighted(weights: impl Into<Vec<f32>>) -> Self {
        Self::fusion(Fusion::Weighted(weights.into()))
    }

    pub fn action(action: impl Action + 'static) -> Self {
        Self::element(ElementKind::Action(UtilityAction::new(Some(
            ActionTask::new(action),
        ))))
    }

    /// Action element whose task is assigned later with
    /// [`UtilityNode::set_action`].
    pub fn empty_action() -> Self {
        Self::element(ElementKind::Action(UtilityAction::new(None)))
    }

    /// Element finishing the system with `status` when selected.
    pub fn exit(status: Status) -> Self {
        Self::element(ElementKind::Exit(status))
    }

    pub fn bucket(policy: BucketPolicy, config: BucketConfig) -> Self {
        Self::element(ElementKind::Bucket(Bucket::new(policy, config)))
    }

    pub fn inertia_bucket() -> Self {
        Self::bucket(BucketPolicy::Inertia, BucketConfig::default())
    }

    pub fn lock_bucket() -> Self {
        Self::bucket(BucketPolicy::Lock, BucketConfig::default())
    }

    /// Marks an element as high priority (builder pattern). Factors ignore it.
    #[must_use]
    pub fn high_priority(mut self) -> Self {
        if let UtilityKind::Element(element) = &mut self.kind {
            element.high_priority = true;
        }
        self
    }

    /// Makes an action element finish the whole system with its terminal
    /// status when it completes (builder pattern). Other nodes ignore it.
    #[must_use]
    pub fn finish_system_on_complete(mut self) -> Self {
        if let Some(ElementKind::Action(action)) = self.element_kind_mut() {
            action.finish_system_on_complete = true;
        }
        self
    }

    /// Assigns the task of an action element. Returns `false` for other nodes.
    pub fn set_action(&mut self, action: impl Action + 'static) -> bool {
        match self.element_kind_mut() {
            Some(ElementKind::Action(element)) => {
                element.task = Some(ActionTask::new(action));
                true
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> &UtilityKind {
        &self.kind
    }

    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            UtilityKind::Element(element) => Some(element),
            UtilityKind::Factor(_) => None,
        }
    }

    pub(crate) fn element_kind_mut(&mut self) -> Option<&mut ElementKind> {
        match &mut self.kind {
            UtilityKind::Element(element) => Some(&mut element.kind),
            UtilityKind::Factor(_) => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, UtilityKind::Element(_))
    }

    /// Utility computed on the last evaluation.
    pub fn utility(&self) -> f32 {
        self.utility
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn status(&self) -> Status {
        self.lifecycle.status()
    }

    pub fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    /// Registers a callback fired on every status change of this node.
    pub fn subscribe(&mut self, observer: impl FnMut(Status) + 'static) {
        self.lifecycle.subscribe(observer);
    }
}

impl NodeKind for UtilityNode {
    fn kind_name(&self) -> &'static str {
        match &self.kind {
            UtilityKind::Factor(factor) => factor.kind_name(),
            UtilityKind::Element(element) => element.kind_name(),
        }
    }

    fn max_inputs(&self) -> Capacity {
        match &self.kind {
            // Factors may be shared between several parents.
            UtilityKind::Factor(_) => Capacity::Unbounded,
            UtilityKind::Element(_) => Capacity::AtMost(1),
        }
    }

    fn max_outputs(&self) -> Capacity {
        match &self.kind {
            UtilityKind::Factor(factor) => match factor.max_inputs() {
                Some(limit) => Capacity::AtMost(limit),
                None => Capacity::Unbounded,
            },
            UtilityKind::Element(element) if element.is_bucket() => Capacity::Unbounded,
            UtilityKind::Element(_) => Capacity::AtMost(1),
        }
    }

    fn accepts_child(&self, child: &Self) -> bool {
        match &self.kind {
            UtilityKind::Element(element) if element.is_bucket() => child.is_element(),
            _ => !child.is_element(),
        }
    }
}
