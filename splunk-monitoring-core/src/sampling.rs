//! Sample-rate policy for metric events
//!
//! A log rate is a percentage in `[0, 100]`. Each sampled call draws a value
//! uniformly from `[0, 100)` and emits only when the draw is `<=` the rate.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Returns true if `rate` is a usable percentage.
pub fn is_valid_rate(rate: f64) -> bool {
    (0.0..=100.0).contains(&rate)
}

/// Source of uniform draws in `[0, 100)`.
pub trait Sampler: Send + Sync {
    fn draw(&self) -> f64;

    /// Emit decision for an optional rate. No rate means always emit.
    fn should_emit(&self, rate: Option<f64>) -> bool {
        match rate {
            Some(rate) => self.draw() <= rate,
            None => true,
        }
    }
}

/// Default sampler backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSampler;

impl Sampler for ThreadRngSampler {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..100.0)
    }
}

/// Reproducible sampler for tests and replays.
#[derive(Debug)]
pub struct SeededSampler {
    rng: Mutex<StdRng>,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Sampler for SeededSampler {
    fn draw(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0.0..100.0)
    }
}

/// Sampler that always returns the same draw.
#[derive(Debug, Clone, Copy)]
pub struct FixedSampler(pub f64);

impl Sampler for FixedSampler {
    fn draw(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds() {
        assert!(is_valid_rate(0.0));
        assert!(is_valid_rate(100.0));
        assert!(is_valid_rate(42.5));
        assert!(!is_valid_rate(-0.1));
        assert!(!is_valid_rate(100.1));
        assert!(!is_valid_rate(f64::NAN));
    }

    #[test]
    fn test_no_rate_always_emits() {
        let sampler = FixedSampler(99.9);
        assert!(sampler.should_emit(None));
    }

    #[test]
    fn test_draw_equal_to_rate_emits() {
        assert!(FixedSampler(30.0).should_emit(Some(30.0)));
        assert!(!FixedSampler(30.5).should_emit(Some(30.0)));
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let a = SeededSampler::new(7);
        let b = SeededSampler::new(7);
        for _ in 0..32 {
            let draw = a.draw();
            assert_eq!(draw, b.draw());
            assert!((0.0..100.0).contains(&draw));
        }
    }

    #[test]
    fn test_emit_frequency_tracks_rate() {
        let sampler = SeededSampler::new(42);
        let trials = 20_000;

        for rate in [0.0, 10.0, 50.0, 90.0, 100.0] {
            let emitted = (0..trials)
                .filter(|_| sampler.should_emit(Some(rate)))
                .count();
            let observed = emitted as f64 / trials as f64;
            let expected = rate / 100.0;
            assert!(
                (observed - expected).abs() < 0.02,
                "rate {rate}: observed {observed}, expected {expected}"
            );
        }
    }
}
