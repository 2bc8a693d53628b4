/// Tunables of a utility system.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtilityConfig {
    /// Multiplier applied to the utility of the running candidate, so a
    /// challenger has to beat it by a margin before selection flips.
    pub inertia: f32,
}

impl UtilityConfig {
    pub const DEFAULT_INERTIA: f32 = 1.3;

    pub fn new() -> Self {
        Self {
            inertia: Self::DEFAULT_INERTIA,
        }
    }

    pub fn with_inertia(inertia: f32) -> Self {
        Self { inertia }
    }
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Tunables of a bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketConfig {
    /// Multiplier applied to the utility of the element the bucket selected.
    pub inertia: f32,
}

impl BucketConfig {
    pub fn new() -> Self {
        Self {
            inertia: UtilityConfig::DEFAULT_INERTIA,
        }
    }

    pub fn with_inertia(inertia: f32) -> Self {
        Self { inertia }
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self::new()
    }
}
