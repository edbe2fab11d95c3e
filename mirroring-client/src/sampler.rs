//! The read sampler (§4.1, §4.3): decides, per read (or per batch), whether the secondary should
//! be exercised at all.

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// `mirroring.mismatch-detector`'s sibling collaborator for reads: `should_next_read_operation_be_sampled`.
pub trait ReadSampler: Send + Sync + 'static {
    fn should_next_read_operation_be_sampled(&self) -> bool;
}

/// Samples every read. The useful default for migration validation, where the point is to
/// observe every divergence.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSample;

impl ReadSampler for AlwaysSample {
    fn should_next_read_operation_be_sampled(&self) -> bool {
        true
    }
}

/// Never samples reads: only writes are mirrored to the secondary. Useful once a migration's read
/// path has already been validated and only the write path still needs shadowing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSample;

impl ReadSampler for NeverSample {
    fn should_next_read_operation_be_sampled(&self) -> bool {
        false
    }
}

/// Samples reads at a fixed rate, e.g. to bound the secondary's read load under heavy traffic.
pub struct RatioSampler {
    rate: f64,
    rng: Mutex<SmallRng>,
}

impl RatioSampler {
    /// `rate` is clamped to `[0.0, 1.0]`.
    pub fn new(rate: f64) -> Self {
        RatioSampler {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(SmallRng::from_os_rng()),
        }
    }
}

impl ReadSampler for RatioSampler {
    fn should_next_read_operation_be_sampled(&self) -> bool {
        self.rng.lock().random_bool(self.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_and_never_are_constant() {
        assert!(AlwaysSample.should_next_read_operation_be_sampled());
        assert!(!NeverSample.should_next_read_operation_be_sampled());
    }

    #[test]
    fn ratio_sampler_at_zero_never_samples() {
        let sampler = RatioSampler::new(0.0);
        for _ in 0..100 {
            assert!(!sampler.should_next_read_operation_be_sampled());
        }
    }

    #[test]
    fn ratio_sampler_at_one_always_samples() {
        let sampler = RatioSampler::new(1.0);
        for _ in 0..100 {
            assert!(sampler.should_next_read_operation_be_sampled());
        }
    }
}
