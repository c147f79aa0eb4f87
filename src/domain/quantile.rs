//! Targeted Quantile Estimator - Streaming Percentiles for Summaries
//!
//! Implements the biased/targeted quantile algorithm of Cormode, Korn,
//! Muthukrishnan and Srivastava (CKMS, ICDE 2005). Only a compressed
//! list of samples is kept; each tracked quantile `q` is answered with a
//! rank error of at most `ε·n` where `n` is the number of observations.
//!
//! Observations are buffered and merged in sorted batches. The estimator
//! is unwindowed: it reflects every observation since creation.

/// Rank error tolerated for every target quantile.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// Observations buffered before a merge pass.
const BUFFER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy)]
struct Sample {
    value: f64,
    /// Rank difference to the previous sample (`g` in the paper).
    width: f64,
    /// Maximum rank uncertainty of this sample (`Δ` in the paper).
    delta: f64,
}

/// Streaming estimator for a fixed set of target quantiles.
#[derive(Debug, Clone)]
pub struct TargetedQuantiles {
    /// `(quantile, epsilon)` pairs.
    targets: Vec<(f64, f64)>,
    samples: Vec<Sample>,
    buffer: Vec<f64>,
    n: f64,
}

impl TargetedQuantiles {
    /// Track `quantiles` with the default error bound.
    pub fn new(quantiles: &[f64]) -> Self {
        Self::with_epsilon(quantiles, DEFAULT_EPSILON)
    }

    /// Track `quantiles`, each with rank error `epsilon`.
    ///
    /// Quantiles are expected to lie in (0, 1); callers validate them.
    pub fn with_epsilon(quantiles: &[f64], epsilon: f64) -> Self {
        Self {
            targets: quantiles.iter().map(|&q| (q, epsilon)).collect(),
            samples: Vec::new(),
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            n: 0.0,
        }
    }

    /// Record one observation.
    pub fn insert(&mut self, value: f64) {
        self.buffer.push(value);
        if self.buffer.len() >= BUFFER_CAPACITY {
            self.flush();
        }
    }

    /// Estimate the `q` quantile. Returns NaN when nothing was observed.
    pub fn query(&mut self, q: f64) -> f64 {
        self.flush();
        let Some(first) = self.samples.first().copied() else {
            return f64::NAN;
        };

        let mut t = (q * self.n).ceil();
        t += (self.invariant(t) / 2.0).ceil();

        let mut prev = first;
        let mut rank = 0.0;
        for current in &self.samples[1..] {
            rank += prev.width;
            if rank + current.width + current.delta > t {
                return prev.value;
            }
            prev = *current;
        }
        prev.value
    }

    /// Number of observations recorded so far.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self) -> u64 {
        self.n as u64 + self.buffer.len() as u64
    }

    /// Number of retained samples after compression (test/diagnostic aid).
    pub fn retained(&mut self) -> usize {
        self.flush();
        self.samples.len()
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut batch = std::mem::take(&mut self.buffer);
        batch.sort_by(f64::total_cmp);
        self.merge(&batch);
        batch.clear();
        self.buffer = batch;
    }

    /// Allowed rank error at rank `r` (`f(r, n)` in the paper).
    fn invariant(&self, r: f64) -> f64 {
        self.targets
            .iter()
            .map(|&(q, eps)| {
                if q * self.n <= r {
                    2.0 * eps * r / q
                } else {
                    2.0 * eps * (self.n - r) / (1.0 - q)
                }
            })
            .fold(f64::MAX, f64::min)
    }

    fn merge(&mut self, sorted: &[f64]) {
        let mut rank = 0.0;
        let mut i = 0;
        for &value in sorted {
            while i < self.samples.len() && self.samples[i].value <= value {
                rank += self.samples[i].width;
                i += 1;
            }
            // New extremes are exact.
            let delta = if i == 0 || i == self.samples.len() {
                0.0
            } else {
                (self.invariant(rank).floor() - 1.0).max(0.0)
            };
            self.samples.insert(
                i,
                Sample {
                    value,
                    width: 1.0,
                    delta,
                },
            );
            i += 1;
            rank += 1.0;
            self.n += 1.0;
        }
        self.compress();
    }

    fn compress(&mut self) {
        if self.samples.len() < 2 {
            return;
        }
        let mut xi = self.samples.len() - 1;
        let mut x = self.samples[xi];
        let mut rank = self.n - 1.0 - x.width;

        let mut i = xi;
        while i > 0 {
            i -= 1;
            let current = self.samples[i];
            if current.width + x.width + x.delta <= self.invariant(rank) {
                x.width += current.width;
                self.samples[xi] = x;
                self.samples.remove(i);
                xi -= 1;
            } else {
                x = current;
                xi = i;
            }
            rank -= current.width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_within(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_empty_estimator_returns_nan() {
        let mut est = TargetedQuantiles::new(&[0.5]);
        assert!(est.query(0.5).is_nan());
        assert_eq!(est.count(), 0);
    }

    #[test]
    fn test_single_observation_is_every_quantile() {
        let mut est = TargetedQuantiles::new(&[0.01, 0.5, 0.99]);
        est.insert(100.0);
        assert_eq!(est.query(0.01), 100.0);
        assert_eq!(est.query(0.5), 100.0);
        assert_eq!(est.query(0.99), 100.0);
    }

    #[test]
    fn test_uniform_stream_within_error_bound() {
        let mut est = TargetedQuantiles::new(&[0.5, 0.9, 0.99]);
        for v in 1..=10_000 {
            est.insert(f64::from(v));
        }
        assert_eq!(est.count(), 10_000);
        // ε·n = 100 ranks; allow twice that for the discrete walk.
        assert_within(est.query(0.5), 5_000.0, 200.0);
        assert_within(est.query(0.9), 9_000.0, 200.0);
        assert_within(est.query(0.99), 9_900.0, 200.0);
    }

    #[test]
    fn test_reverse_order_stream() {
        let mut est = TargetedQuantiles::new(&[0.5]);
        for v in (1..=2_000).rev() {
            est.insert(f64::from(v));
        }
        assert_within(est.query(0.5), 1_000.0, 40.0);
    }

    #[test]
    fn test_compression_bounds_memory() {
        let mut est = TargetedQuantiles::new(&[0.5, 0.9]);
        for v in 0..50_000 {
            est.insert(f64::from(v % 997));
        }
        assert!(est.retained() < 5_000, "retained {}", est.retained());
    }
}
