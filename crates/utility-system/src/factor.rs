//! Utility factors.
//!
//! A factor turns its inputs into a desirability score in `[0, 1]`:
//!
//! - **Leaf** factors read nothing: [`Factor::Constant`], [`Factor::Variable`]
//! - **Curve** factors reshape one child factor: [`Curve`]
//! - **Fusion** factors combine any number of child factors: [`Fusion`]
//!
//! Whatever the math, the result is clamped to `[0, 1]`; NaN becomes 0.

use std::fmt;

/// Node producing a normalized utility score.
pub enum Factor {
    /// Fixed score.
    Constant(f32),

    /// Score read from a function and renormalized from its range.
    Variable(Variable),

    /// Score of the child reshaped by a curve.
    Curve(Curve),

    /// Scores of the children combined into one.
    Fusion(Fusion),
}

impl Factor {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Factor::Constant(_) => "constant_factor",
            Factor::Variable(_) => "variable_factor",
            Factor::Curve(curve) => curve.kind_name(),
            Factor::Fusion(fusion) => fusion.kind_name(),
        }
    }

    /// Number of child factors this factor reads; `None` means any number.
    pub(crate) fn max_inputs(&self) -> Option<usize> {
        match self {
            Factor::Constant(_) | Factor::Variable(_) => Some(0),
            Factor::Curve(_) => Some(1),
            Factor::Fusion(_) => None,
        }
    }

    /// Computes the clamped score from the child scores. Returns `None` when
    /// a curve has no input to reshape.
    pub(crate) fn compute(&mut self, inputs: &[f32]) -> Option<f32> {
        let raw = match self {
            Factor::Constant(value) => *value,
            Factor::Variable(variable) => variable.sample(),
            Factor::Curve(curve) => curve.evaluate(*inputs.first()?),
            Factor::Fusion(fusion) => fusion.combine(inputs),
        };
        Some(normalize(raw))
    }
}

impl fmt::Debug for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Factor::Variable(variable) => fmt::Debug::fmt(variable, f),
            Factor::Curve(curve) => fmt::Debug::fmt(curve, f),
            Factor::Fusion(fusion) => fmt::Debug::fmt(fusion, f),
        }
    }
}

/// Clamps a score to `[0, 1]`, mapping NaN to 0.
pub fn normalize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Function sampled on every evaluation and mapped from `[min, max]` onto
/// `[0, 1]`.
pub struct Variable {
    function: Box<dyn FnMut() -> f32>,
    min: f32,
    max: f32,
}

impl Variable {
    pub fn new(function: impl FnMut() -> f32 + 'static, min: f32, max: f32) -> Self {
        Self {
            function: Box::new(function),
            min,
            max,
        }
    }

    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    fn sample(&mut self) -> f32 {
        let value = (self.function)();
        // An empty range carries no information.
        if self.max == self.min {
            return 0.0;
        }
        (value - self.min) / (self.max - self.min)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

/// Shape applied to the score of a single child.
pub enum Curve {
    /// `slope * x + intercept`
    Linear { slope: f32, intercept: f32 },

    /// `(x - dx)^exponent + dy`
    Exponential { exponent: f32, dx: f32, dy: f32 },

    /// Logistic curve `1 / (1 + e^(-grow_rate * (x - midpoint)))`.
    Sigmoid { grow_rate: f32, midpoint: f32 },

    /// Piecewise-linear interpolation between points sorted by `x`. Outside
    /// the points the nearest end point's `y` applies. Without points the
    /// input passes through.
    Dashed(Vec<(f32, f32)>),

    /// Arbitrary function; identity when absent.
    Custom(Option<Box<dyn FnMut(f32) -> f32>>),
}

impl Curve {
    /// Dashed curve through `points`, sorted by `x`.
    pub fn dashed(points: impl Into<Vec<(f32, f32)>>) -> Self {
        let mut points = points.into();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Curve::Dashed(points)
    }

    pub fn custom(function: impl FnMut(f32) -> f32 + 'static) -> Self {
        Curve::Custom(Some(Box::new(function)))
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Curve::Linear { .. } => "linear_curve",
            Curve::Exponential { .. } => "exponential_curve",
            Curve::Sigmoid { .. } => "sigmoid_curve",
            Curve::Dashed(_) => "dashed_curve",
            Curve::Custom(_) => "custom_curve",
        }
    }

    pub fn evaluate(&mut self, x: f32) -> f32 {
        match self {
            Curve::Linear { slope, intercept } => *slope * x + *intercept,
            Curve::Exponential { exponent, dx, dy } => (x - *dx).powf(*exponent) + *dy,
            Curve::Sigmoid {
                grow_rate,
                midpoint,
            } => 1.0 / (1.0 + (-*grow_rate * (x - *midpoint)).exp()),
            Curve::Dashed(points) => interpolate(points, x),
            Curve::Custom(Some(function)) => function(x),
            Curve::Custom(None) => x,
        }
    }
}

fn interpolate(points: &[(f32, f32)], x: f32) -> f32 {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return x;
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for pair in points.windows(2) {
        let [(x0, y0), (x1, y1)] = [pair[0], pair[1]];
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    last.1
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::Linear { slope, intercept } => f
                .debug_struct("Linear")
                .field("slope", slope)
                .field("intercept", intercept)
                .finish(),
            Curve::Exponential { exponent, dx, dy } => f
                .debug_struct("Exponential")
                .field("exponent", exponent)
                .field("dx", dx)
                .field("dy", dy)
                .finish(),
            Curve::Sigmoid {
                grow_rate,
                midpoint,
            } => f
                .debug_struct("Sigmoid")
                .field("grow_rate", grow_rate)
                .field("midpoint", midpoint)
                .finish(),
            Curve::Dashed(points) => f.debug_tuple("Dashed").field(points).finish(),
            Curve::Custom(function) => f
                .debug_tuple("Custom")
                .field(&function.is_some())
                .finish(),
        }
    }
}

/// Combination of the scores of every child.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fusion {
    Min,
    Max,

    /// Sum of the child scores multiplied by the weight at the same
    /// position. Children without a weight and weights without a child do
    /// not count.
    Weighted(Vec<f32>),
}

impl Fusion {
    fn kind_name(&self) -> &'static str {
        match self {
            Fusion::Min => "min_fusion",
            Fusion::Max => "max_fusion",
            Fusion::Weighted(_) => "weighted_fusion",
        }
    }

    /// Combines `inputs`; an empty input list scores 0.
    pub fn combine(&self, inputs: &[f32]) -> f32 {
        if inputs.is_empty() {
            return 0.0;
        }
        match self {
            Fusion::Min => inputs.iter().copied().fold(f32::INFINITY, f32::min),
            Fusion::Max => inputs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            Fusion::Weighted(weights) => inputs.iter().zip(weights).map(|(x, w)| x * w).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn results_are_clamped() {
        assert_eq!(Factor::Constant(-5.0).compute(&[]), Some(0.0));
        assert_eq!(Factor::Constant(5.0).compute(&[]), Some(1.0));
        assert_eq!(Factor::Constant(f32::NAN).compute(&[]), Some(0.0));

        let mut steep = Factor::Curve(Curve::Linear {
            slope: 10.0,
            intercept: 0.0,
        });
        assert_eq!(steep.compute(&[0.5]), Some(1.0));
    }

    #[test]
    fn variable_renormalizes_range() {
        let mut factor = Factor::Variable(Variable::new(|| 75.0, 50.0, 150.0));
        assert_eq!(factor.compute(&[]), Some(0.25));

        let mut empty_range = Factor::Variable(Variable::new(|| 3.0, 2.0, 2.0));
        assert_eq!(empty_range.compute(&[]), Some(0.0));
    }

    #[test]
    fn curve_without_input_has_no_result() {
        assert_eq!(Factor::Curve(Curve::Custom(None)).compute(&[]), None);
    }

    #[test]
    fn curves_follow_their_formulas() {
        let mut exponential = Curve::Exponential {
            exponent: 2.0,
            dx: 0.5,
            dy: 0.1,
        };
        assert!(close(exponential.evaluate(1.0), 0.35));

        let mut sigmoid = Curve::Sigmoid {
            grow_rate: 10.0,
            midpoint: 0.5,
        };
        assert!(close(sigmoid.evaluate(0.5), 0.5));
        assert!(sigmoid.evaluate(0.9) > 0.95);

        let mut custom = Curve::custom(|x| 1.0 - x);
        assert!(close(custom.evaluate(0.2), 0.8));
        assert!(close(Curve::Custom(None).evaluate(0.2), 0.2));
    }

    #[test]
    fn dashed_curve_interpolates_and_clamps() {
        let mut curve = Curve::dashed([(1.0, 0.0), (0.0, 1.0), (0.5, 0.8)]);
        assert!(close(curve.evaluate(-1.0), 1.0));
        assert!(close(curve.evaluate(0.25), 0.9));
        assert!(close(curve.evaluate(0.75), 0.4));
        assert!(close(curve.evaluate(2.0), 0.0));

        assert!(close(Curve::Dashed(Vec::new()).evaluate(0.3), 0.3));
    }

    #[test]
    fn fusions_combine_children() {
        let inputs = [0.2, 0.8, 0.5];
        assert!(close(Fusion::Min.combine(&inputs), 0.2));
        assert!(close(Fusion::Max.combine(&inputs), 0.8));
        assert!(close(Fusion::Weighted(vec![0.5, 0.5]).combine(&inputs), 0.5));
        assert!(close(
            Fusion::Weighted(vec![1.0, 0.0, 0.0, 9.0]).combine(&inputs),
            0.2
        ));
        assert_eq!(Fusion::Max.combine(&[]), 0.0);
    }
}
