//! Seedable random state shared by every randomized component.
//!
//! A [`RandomState`] remembers the seed it was created with, so a run can be
//! replayed with [`RandomState::reset`] and child states can be derived
//! deterministically with [`RandomState::create_random_state`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Half-open range from which generated seeds are drawn.
pub const SEED_RANGE: (u64, u64) = (0, 1_000_000_000);

/// A random number generator that knows its own seed.
#[derive(Debug, Clone)]
pub struct RandomState {
    seed: u64,
    rng: StdRng,
}

impl RandomState {
    /// Creates a state seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a state with a seed drawn from the thread-local generator.
    pub fn from_entropy() -> Self {
        let seed = rand::rng().random_range(SEED_RANGE.0..SEED_RANGE.1);
        Self::new(seed)
    }

    /// The seed this state was (last) seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Reseeds the state.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Rewinds the state so it replays the same draws from its seed.
    pub fn reset(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Draws a new seed from [`SEED_RANGE`].
    pub fn generate_seed(&mut self) -> u64 {
        self.rng.random_range(SEED_RANGE.0..SEED_RANGE.1)
    }

    /// Creates a new state. Without an explicit seed, one is generated from
    /// this state, so derived states are reproducible too.
    pub fn create_random_state(&mut self, seed: Option<u64>) -> RandomState {
        let seed = seed.unwrap_or_else(|| self.generate_seed());
        RandomState::new(seed)
    }

    /// Shuffles a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Uniform sample from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random()
    }

    /// Uniform integer from `0..=upper`.
    pub fn below_or_equal(&mut self, upper: usize) -> usize {
        self.rng.random_range(0..=upper)
    }

    /// Returns `true` with probability `p`. `p` outside `[0, 1]` is clamped.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    /// Underlying generator, for sampling from `rand_distr` distributions.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Default for RandomState {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = RandomState::new(7);
        let mut b = RandomState::new(7);
        let xs: Vec<f64> = (0..5).map(|_| a.uniform()).collect();
        let ys: Vec<f64> = (0..5).map(|_| b.uniform()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_reset_replays() {
        let mut rnd = RandomState::new(123);
        let first: Vec<u64> = (0..4).map(|_| rnd.generate_seed()).collect();
        rnd.reset();
        let second: Vec<u64> = (0..4).map(|_| rnd.generate_seed()).collect();
        assert_eq!(first, second);
        assert_eq!(rnd.seed(), 123);
    }

    #[test]
    fn test_generated_seeds_in_range() {
        let mut rnd = RandomState::new(1);
        for _ in 0..100 {
            let s = rnd.generate_seed();
            assert!(s >= SEED_RANGE.0 && s < SEED_RANGE.1);
        }
    }

    #[test]
    fn test_create_random_state() {
        let mut rnd = RandomState::new(5);
        assert_eq!(rnd.create_random_state(Some(42)).seed(), 42);

        let derived = rnd.create_random_state(None).seed();
        rnd.reset();
        assert_eq!(rnd.create_random_state(None).seed(), derived);
    }

    #[test]
    fn test_set_seed() {
        let mut rnd = RandomState::new(1);
        rnd.set_seed(99);
        let mut fresh = RandomState::new(99);
        assert_eq!(rnd.seed(), 99);
        assert_eq!(rnd.uniform(), fresh.uniform());
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rnd = RandomState::new(3);
        let mut items: Vec<usize> = (0..20).collect();
        rnd.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
