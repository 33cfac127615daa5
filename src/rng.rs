//! Seeded deterministic PRNG (spec.md §5) plus the derived distributions
//! required by §4.6.
//!
//! Each compilation owns its own [`Rng`] instance; nothing here is
//! process-global, so concurrent compilations with distinct seeds cannot
//! interfere with each other (spec.md §5 determinism/seed-isolation).

use std::time::{SystemTime, UNIX_EPOCH};

const A: u64 = 1_103_515_245;
const C: u64 = 12_345;
const M: u64 = 1 << 31;

/// A linear congruential generator: `state <- (a*state + c) mod 2^31`,
/// yielding `state / 2^31` in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Creates a generator seeded deterministically.
    pub fn new(seed: u64) -> Self {
        Self { state: seed % M }
    }

    /// Creates a generator seeded from the platform's random source, used
    /// when the caller supplies no seed (spec.md §5).
    pub fn from_platform_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos ^ (std::process::id() as u64))
    }

    /// The next uniform value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        self.state as f64 / M as f64
    }

    /// A uniform integer in the inclusive range `[min, max]`.
    pub fn range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = (max - min + 1) as f64;
        min + (self.next_f64() * span).floor() as i64
    }

    /// A uniform decimal in the half-open range `[min, max)`.
    pub fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + self.next_f64() * (max - min)
    }

    /// `true` with probability `p`.
    pub fn bool_with_probability(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// A fair coin flip.
    pub fn bool(&mut self) -> bool {
        self.bool_with_probability(0.5)
    }

    /// Picks an index with probability proportional to `weights`. Weights
    /// need not sum to 1 (spec.md §3 invariant); an all-zero or empty
    /// slice yields index 0.
    pub fn weighted_index(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || total <= 0.0 {
            return 0;
        }
        let mut target = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            target -= w;
            if target < 0.0 {
                return i;
            }
        }
        weights.len() - 1
    }

    /// A uniform index in `[0, len)`.
    pub fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next_f64() * len as f64).floor() as usize % len
    }

    /// Standard normal deviate via the Box-Muller transform, scaled to
    /// `N(mean, std_dev)`, clamped into `[min, max]` by re-sampling rather
    /// than truncation (spec.md §4.6).
    pub fn gaussian(&mut self, mean: f64, std_dev: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        loop {
            let u1 = self.next_f64().max(f64::MIN_POSITIVE);
            let u2 = self.next_f64();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            let value = mean + std_dev * z;
            if min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m) {
                return value;
            }
        }
    }

    /// Exponential distribution with the given rate, re-sampled into
    /// `[min, max]`.
    pub fn exponential(&mut self, rate: f64, min: f64, max: Option<f64>) -> f64 {
        loop {
            let u = self.next_f64().max(f64::MIN_POSITIVE);
            let value = -u.ln() / rate;
            if value >= min && max.map_or(true, |m| value <= m) {
                return value;
            }
        }
    }

    /// Log-normal distribution: `exp(N(mu, sigma))`, re-sampled into
    /// `[min, max]`.
    pub fn lognormal(&mut self, mu: f64, sigma: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        loop {
            let value = self.gaussian(mu, sigma, None, None).exp();
            if min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m) {
                return value;
            }
        }
    }

    /// Poisson distribution via Knuth's algorithm.
    pub fn poisson(&mut self, lambda: f64) -> u64 {
        if lambda <= 0.0 {
            return 0;
        }
        let l = (-lambda).exp();
        let mut k = 0u64;
        let mut p = 1.0;
        loop {
            k += 1;
            p *= self.next_f64();
            if p <= l {
                return k - 1;
            }
        }
    }

    /// Beta distribution via two gamma draws (integer-shape approximation
    /// using the sum-of-exponentials construction, adequate for
    /// synthetic-data generation rather than exact statistical work).
    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let x = self.gamma(alpha);
        let y = self.gamma(beta);
        if x + y == 0.0 {
            0.0
        } else {
            x / (x + y)
        }
    }

    fn gamma(&mut self, shape: f64) -> f64 {
        if shape < 1.0 {
            let u = self.next_f64().max(f64::MIN_POSITIVE);
            return self.gamma(shape + 1.0) * u.powf(1.0 / shape);
        }
        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.gaussian(0.0, 1.0, None, None);
            let v = (1.0 + c * x).powi(3);
            if v <= 0.0 {
                continue;
            }
            let u = self.next_f64();
            if u < 1.0 - 0.0331 * x.powi(4) || u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_identical_sequence() {
        let mut a = Rng::new(12345);
        let mut b = Rng::new(12345);
        let seq_a: Vec<f64> = (0..10).map(|_| a.next_f64()).collect();
        let seq_b: Vec<f64> = (0..10).map(|_| b.next_f64()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Rng::new(1);
        let mut b = Rng::new(2);
        assert_ne!(a.next_f64(), b.next_f64());
    }

    #[test]
    fn values_stay_in_unit_interval() {
        let mut r = Rng::new(42);
        for _ in 0..1000 {
            let v = r.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn range_i64_is_inclusive_and_bounded() {
        let mut r = Rng::new(7);
        for _ in 0..200 {
            let v = r.range_i64(1, 10);
            assert!((1..=10).contains(&v));
        }
    }

    #[test]
    fn weighted_index_respects_zero_weight_options() {
        let mut r = Rng::new(99);
        for _ in 0..200 {
            assert_ne!(r.weighted_index(&[0.0, 1.0]), 0);
        }
    }
}
