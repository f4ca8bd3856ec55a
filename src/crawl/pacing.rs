// src/crawl/pacing.rs
// =============================================================================
// Request pacing ("polite crawling").
//
// Each delay is `base + random(0..=jitter)`. The random part is drawn again
// for every page, so requests don't arrive on a fixed beat that a rate
// limiter on the other end could spot.
// =============================================================================

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug)]
pub struct Pacer {
    base: Duration,
    jitter: Duration,
    rng: StdRng,
}

impl Pacer {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self {
            base,
            jitter,
            rng: StdRng::from_entropy(),
        }
    }

    // Same as new() but with a fixed seed, for reproducible tests
    #[cfg(test)]
    pub fn with_seed(base: Duration, jitter: Duration, seed: u64) -> Self {
        Self {
            base,
            jitter,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    // Delay to wait before the next fetch
    pub fn next_delay(&mut self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let max_nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        let extra = Duration::from_nanos(self.rng.gen_range(0..=max_nanos));
        self.base.saturating_add(extra)
    }
}
