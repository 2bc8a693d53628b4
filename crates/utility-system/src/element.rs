//! Selectable utility elements.
//!
//! Elements compete by utility. An action or exit element scores with its
//! single factor child; a bucket scores with its best child element and
//! runs its own selection among them.

use decision_core::{ActionTask, NodeId, Status};

use crate::config::BucketConfig;

/// Element competing for selection.
#[derive(Debug)]
pub struct Element {
    pub(crate) kind: ElementKind,
    pub(crate) high_priority: bool,
}

impl Element {
    pub(crate) fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            high_priority: false,
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_high_priority(&self) -> bool {
        self.high_priority
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match &self.kind {
            ElementKind::Action(_) => "utility_action",
            ElementKind::Exit(_) => "utility_exit",
            ElementKind::Bucket(bucket) => match bucket.policy {
                BucketPolicy::Inertia => "inertia_bucket",
                BucketPolicy::Lock => "lock_bucket",
            },
        }
    }

    /// Buckets group elements; everything else is scored by one factor.
    pub(crate) fn is_bucket(&self) -> bool {
        matches!(self.kind, ElementKind::Bucket(_))
    }
}

/// Behaviour of an element once selected.
#[derive(Debug)]
pub enum ElementKind {
    Action(UtilityAction),

    /// Finishes the whole system with the given terminal status.
    Exit(Status),

    Bucket(Bucket),
}

/// Element running an action while selected.
#[derive(Debug)]
pub struct UtilityAction {
    pub(crate) task: Option<ActionTask>,
    pub(crate) finish_system_on_complete: bool,
}

impl UtilityAction {
    pub(crate) fn new(task: Option<ActionTask>) -> Self {
        Self {
            task,
            finish_system_on_complete: false,
        }
    }

    /// Whether completing the action finishes the whole system.
    pub fn finishes_system(&self) -> bool {
        self.finish_system_on_complete
    }
}

/// How a bucket keeps or changes its selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BucketPolicy {
    /// Re-selects every tick with inertia; a high-priority best element ends
    /// the scan early.
    #[default]
    Inertia,

    /// Keeps a running selection until it finishes.
    Lock,
}

/// Group of elements with its own selection.
#[derive(Debug)]
pub struct Bucket {
    pub(crate) policy: BucketPolicy,
    pub(crate) config: BucketConfig,
    pub(crate) selected: Option<NodeId>,
}

impl Bucket {
    pub(crate) fn new(policy: BucketPolicy, config: BucketConfig) -> Self {
        Self {
            policy,
            config,
            selected: None,
        }
    }

    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    pub fn config(&self) -> BucketConfig {
        self.config
    }

    /// Element currently selected by the bucket.
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }
}
