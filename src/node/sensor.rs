use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::Reading;

/// Source of a sensor node's own readings
pub trait SensorSource: Send {
    fn sample(&mut self) -> Reading;
}

/// Simulated sensor producing uniform readings in `1..=99`
#[derive(Debug)]
pub struct RandomSensor {
    rng: StdRng,
}

impl RandomSensor {
    /// Creates a sensor; seeded sensors produce a reproducible sequence
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RandomSensor { rng }
    }
}

impl SensorSource for RandomSensor {
    fn sample(&mut self) -> Reading {
        Reading::saturating(self.rng.gen_range(1..=Reading::MAX))
    }
}

impl<F> SensorSource for F
where
    F: FnMut() -> Reading + Send,
{
    fn sample(&mut self) -> Reading {
        self()
    }
}
