//! Injected randomness and weighted sampling.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of random samples for nodes that choose between options.
pub trait RandomProvider {
    /// Uniform sample in `[0, 1)`.
    fn next_f32(&self) -> f32;

    /// Uniform index in `[0, len)`. `len` is never zero.
    fn next_index(&self, len: usize) -> usize {
        ((self.next_f32() * len as f32) as usize).min(len.saturating_sub(1))
    }
}

/// Deterministic provider backed by a seeded [`StdRng`].
#[derive(Debug)]
pub struct SeededRandom {
    rng: RefCell<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomProvider for SeededRandom {
    fn next_f32(&self) -> f32 {
        self.rng.borrow_mut().r#gen::<f32>()
    }

    fn next_index(&self, len: usize) -> usize {
        self.rng.borrow_mut().gen_range(0..len)
    }
}

/// Picks an index in `[0, count)` proportionally to `weights`.
///
/// Weights pair with indices positionally; missing weights count as zero and
/// extra ones are ignored, negative weights count as zero. With a zero total
/// the pick is uniform. Otherwise a sample `u` in `[0, total)` selects the
/// first index whose cumulative weight is strictly greater than `u`.
///
/// Returns `None` when `count` is zero.
pub fn weighted_index(weights: &[f32], count: usize, random: &dyn RandomProvider) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let weight = |index: usize| weights.get(index).copied().unwrap_or(0.0).max(0.0);
    let total: f32 = (0..count).map(weight).sum();
    if total <= 0.0 {
        return Some(random.next_index(count));
    }

    let sample = random.next_f32() * total;
    let mut cumulative = 0.0;
    for index in 0..count {
        cumulative += weight(index);
        if cumulative > sample {
            return Some(index);
        }
    }
    // Rounding can leave the sample at the very top; the last weighted index wins.
    (0..count).rev().find(|&index| weight(index) > 0.0)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Fixed(Cell<f32>);

    impl RandomProvider for Fixed {
        fn next_f32(&self) -> f32 {
            self.0.get()
        }
    }

    #[test]
    fn sample_on_boundary_selects_next_index() {
        let random = Fixed(Cell::new(0.5));
        assert_eq!(weighted_index(&[0.5, 0.5], 2, &random), Some(1));

        random.0.set(0.49);
        assert_eq!(weighted_index(&[0.5, 0.5], 2, &random), Some(0));
    }

    #[test]
    fn zero_weights_fall_back_to_uniform() {
        let random = Fixed(Cell::new(0.75));
        assert_eq!(weighted_index(&[0.0, 0.0], 4, &random), Some(3));
        assert_eq!(weighted_index(&[], 0, &random), None);
    }

    #[test]
    fn zero_weight_options_are_never_picked() {
        let random = Fixed(Cell::new(0.0));
        assert_eq!(weighted_index(&[0.0, 1.0, 0.0], 3, &random), Some(1));
        random.0.set(0.999);
        assert_eq!(weighted_index(&[0.0, 1.0, 0.0], 3, &random), Some(1));
    }

    #[test]
    fn seeded_random_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        for _ in 0..8 {
            let sample = a.next_f32();
            assert_eq!(sample, b.next_f32());
            assert!((0.0..1.0).contains(&sample));
        }
        assert!(a.next_index(3) < 3);
    }
}
