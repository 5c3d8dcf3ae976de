//! Discrete volume sampling.
//!
//! Small expectations use an exact Poisson draw (Knuth's multiplicative
//! method). Larger ones use the normal approximation N(λ, √λ), rounded and
//! floored at zero, because the multiplicative method needs O(λ) uniforms
//! and underflows `exp(-λ)` for large λ.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// λ below which the exact Poisson draw is used.
pub const POISSON_CUTOFF: f64 = 30.0;

/// Range of the year-scoped macro factor.
pub const MACRO_MIN: f64 = 0.85;
pub const MACRO_MAX: f64 = 1.15;

/// Range of the per-day jitter factor.
pub const JITTER_MIN: f64 = 0.8;
pub const JITTER_MAX: f64 = 1.2;

const MACRO_SALT: u64 = 0x6d61_6372_6f5f_7972;

/// Draw a non-negative count with expectation `lambda`.
pub fn sample_count<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u64 {
    if !(lambda > 0.0) || !lambda.is_finite() {
        return 0;
    }
    if lambda < POISSON_CUTOFF {
        poisson_knuth(rng, lambda)
    } else {
        let draw = lambda + lambda.sqrt() * standard_normal(rng);
        draw.round().max(0.0) as u64
    }
}

fn poisson_knuth<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u64 {
    let limit = (-lambda).exp();
    let mut product: f64 = rng.random();
    let mut count = 0;
    while product > limit {
        count += 1;
        product *= rng.random::<f64>();
    }
    count
}

/// One standard normal variate (Box-Muller).
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - u keeps the log argument in (0, 1].
    let u1 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Economic-cycle factor for `year`, in [`MACRO_MIN`, `MACRO_MAX`].
///
/// Depends on the year only, so every day of a year shares it and two runs
/// with different seeds still agree on it.
pub fn macro_year_factor(year: i32) -> f64 {
    let mut rng = StdRng::seed_from_u64(MACRO_SALT ^ year as i64 as u64);
    MACRO_MIN + (MACRO_MAX - MACRO_MIN) * rng.random::<f64>()
}

/// Fresh per-day noise factor in [`JITTER_MIN`, `JITTER_MAX`).
pub fn jitter<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random_range(JITTER_MIN..JITTER_MAX)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_non_positive_lambda_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_count(&mut rng, 0.0), 0);
        assert_eq!(sample_count(&mut rng, -5.0), 0);
        assert_eq!(sample_count(&mut rng, f64::NAN), 0);
    }

    #[test]
    fn test_poisson_mean_is_close_to_lambda() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let total: u64 = (0..n).map(|_| sample_count(&mut rng, 4.0)).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 4.0).abs() < 0.1, "mean was {}", mean);
    }

    #[test]
    fn test_normal_branch_mean_is_close_to_lambda() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let total: u64 = (0..n).map(|_| sample_count(&mut rng, 1_000.0)).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 1_000.0).abs() < 2.0, "mean was {}", mean);
    }

    #[test]
    fn test_macro_factor_depends_on_year_only() {
        assert_eq!(macro_year_factor(2024), macro_year_factor(2024));
        for year in 1990..2060 {
            let f = macro_year_factor(year);
            assert!((MACRO_MIN..=MACRO_MAX).contains(&f));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_jitter_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let j = jitter(&mut rng);
            prop_assert!((JITTER_MIN..JITTER_MAX).contains(&j));
        }

        #[test]
        fn prop_same_seed_same_count(seed in any::<u64>(), lambda in 0.0f64..5_000.0) {
            let mut a = StdRng::seed_from_u64(seed);
            let mut b = StdRng::seed_from_u64(seed);
            prop_assert_eq!(sample_count(&mut a, lambda), sample_count(&mut b, lambda));
        }
    }
}
