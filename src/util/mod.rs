//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Draws a duration uniformly from `[min, max)`; returns `min` when the range is empty
pub fn jittered<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    let secs = Uniform::new(min.as_secs_f64(), max.as_secs_f64()).sample(rng);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_jitter_within_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let min = Duration::from_secs(4);
        let max = Duration::from_secs(8);
        for _ in 0..1000 {
            let delay = jittered(&mut rng, min, max);
            assert!(delay >= min && delay < max, "{:?}", delay);
        }
    }

    #[test]
    fn test_empty_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let bound = Duration::from_secs(5);
        assert_eq!(jittered(&mut rng, bound, bound), bound);
        assert_eq!(jittered(&mut rng, Duration::ZERO, Duration::ZERO), Duration::ZERO);
    }
}
