//! Gaussian sampling via a hand-rolled Box-Muller transform.
//!
//! Avoids a `rand_distr` dependency for what is otherwise a single
//! well-known formula, used for both the initiative draw (§4.4.1) and the
//! attack-power draw (§4.4.4).

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Standard normal sample via Box-Muller, using only the cosine branch
/// (one uniform pair in, one normal sample out).
fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-300); // avoid ln(0)
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Sample `N(mean, sigma)`.
pub fn sample(rng: &mut ChaCha8Rng, mean: f64, sigma: f64) -> f64 {
    mean + sigma * standard_normal(rng)
}

/// Sample `N(mean, sigma)` and round to the nearest integer, floored at 0.
/// Used for experience awards, which must not go negative.
pub fn sample_rounded_nonneg(rng: &mut ChaCha8Rng, mean: f64, sigma: f64) -> i32 {
    let v = sample(rng, mean, sigma).round();
    if v < 0.0 {
        0
    } else {
        v as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn sample_mean_converges_over_many_draws() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| sample(&mut rng, 50.0, 10.0)).sum();
        let mean = sum / n as f64;
        assert!((mean - 50.0).abs() < 1.0, "sample mean {mean} drifted too far from 50.0");
    }

    #[test]
    fn sample_rounded_nonneg_never_goes_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..5_000 {
            assert!(sample_rounded_nonneg(&mut rng, 5.0, 20.0) >= 0);
        }
    }

    #[test]
    fn same_seed_is_deterministic() {
        let mut a = ChaCha8Rng::seed_from_u64(99);
        let mut b = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..100 {
            assert_eq!(sample(&mut a, 0.0, 1.0), sample(&mut b, 0.0, 1.0));
        }
    }
}
