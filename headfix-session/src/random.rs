use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seedable source for every random draw in a session.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    seed: u64,
}

impl RandomSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seeds from the thread RNG; the seed is kept so the session can be replayed.
    pub fn from_entropy() -> Self {
        let seed: u64 = rand::rng().random();
        Self::from_seed(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn uniform_inclusive(&mut self, lo: u32, hi: u32) -> u32 {
        self.rng.random_range(lo..=hi)
    }

    /// Draws `amount` distinct entries of `candidates`, or `None` if there are too few.
    pub fn sample_without_replacement(
        &mut self,
        candidates: &[usize],
        amount: usize,
    ) -> Option<Vec<usize>> {
        if amount > candidates.len() {
            return None;
        }
        let picked = rand::seq::index::sample(&mut self.rng, candidates.len(), amount)
            .into_iter()
            .map(|i| candidates[i])
            .collect();
        Some(picked)
    }
}
