//! Parameter initialisation.
//!
//! Convolution weights and biases are drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, which is
//! Kaiming-uniform with `a = sqrt(5)`. The generator is process-global and can be reseeded so
//! two modules built after the same seed get identical parameters.

use crate::tensor::{Result, Tensor, TensorError, filled, numel_of};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard, OnceLock};

static GENERATOR: OnceLock<Mutex<StdRng>> = OnceLock::new();

fn generator() -> MutexGuard<'static, StdRng> {
    GENERATOR
        .get_or_init(|| Mutex::new(StdRng::from_os_rng()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reseeds the parameter generator.
pub fn manual_seed(seed: u64) {
    *generator() = StdRng::seed_from_u64(seed);
}

/// Samples a tensor of `shape` from `U(-bound, bound)`.
pub fn uniform(shape: &[usize], bound: f32) -> Result<Tensor> {
    if !(bound.is_finite() && bound > 0.0) {
        return Err(TensorError::InvalidArgument(format!(
            "uniform bound must be finite and positive, got {bound}"
        )));
    }
    let mut data = filled(numel_of(shape)?, 0.0f32)?;
    let mut rng = generator();
    for value in data.iter_mut() {
        *value = rng.random_range(-bound..bound);
    }
    Tensor::new(data, shape)
}

/// Bound used for both weight and bias given the weight's fan-in.
pub fn fan_in_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_respects_bound() {
        let t = uniform(&[4, 8], 0.25).unwrap();
        assert_eq!(t.shape(), &[4, 8]);
        assert!(t.data().iter().all(|v| (-0.25..0.25).contains(v)));
    }

    #[test]
    fn test_uniform_rejects_bad_bound() {
        assert!(uniform(&[2], 0.0).is_err());
        assert!(uniform(&[2], f32::INFINITY).is_err());
    }

    #[test]
    fn test_uniform_rejects_oversized_shape() {
        let err = uniform(&[1 << 20, 1 << 20, 1 << 12], 0.1);
        assert!(matches!(err, Err(TensorError::InvalidArgument(msg)) if msg.contains("too large")));
        assert!(uniform(&[1 << 32, 1 << 32], 0.1).is_err());
    }

    #[test]
    fn test_fan_in_bound() {
        assert_eq!(fan_in_bound(4), 0.5);
    }
}
