//! Instrument Kinds - Shared Vocabulary for Metric Types
//!
//! Defines the four supported instrument kinds, their default bucket
//! and quantile layouts, and validation of those layouts.

use std::fmt;

use crate::error::{MetricsError, Result};

/// Histogram boundaries used when the caller supplies none.
pub const DEFAULT_BUCKETS: [f64; 5] = [0.1, 0.5, 1.0, 2.0, 5.0];

/// Summary quantiles used when the caller supplies none.
pub const DEFAULT_QUANTILES: [f64; 6] = [0.01, 0.05, 0.5, 0.9, 0.95, 0.99];

/// The type of a registered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically increasing value.
    Counter,
    /// Arbitrary value, overwritten on set.
    Gauge,
    /// Cumulative bucket counts with sum and count.
    Histogram,
    /// Streaming quantiles with sum and count.
    Summary,
}

impl MetricKind {
    /// Lower-case name as used in `# TYPE` lines.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Summary => "summary",
        }
    }

    /// Help text given to lazily created instruments.
    pub fn help_for(self, name: &str) -> String {
        let prefix = match self {
            Self::Counter => "Counter",
            Self::Gauge => "Gauge",
            Self::Histogram => "Histogram",
            Self::Summary => "Summary",
        };
        format!("{prefix} for {name}")
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that histogram buckets are non-empty, finite and strictly ascending.
///
/// # Errors
/// `MetricsError::InvalidBuckets` describing the first violation.
pub fn validate_buckets(metric: &str, buckets: &[f64]) -> Result<()> {
    let invalid = |reason: &str| MetricsError::InvalidBuckets {
        metric: metric.to_string(),
        reason: reason.to_string(),
    };

    if buckets.is_empty() {
        return Err(invalid("at least one bucket is required"));
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return Err(invalid("bucket boundaries must be finite (+Inf is implicit)"));
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid("bucket boundaries must be strictly ascending"));
    }
    Ok(())
}

/// Check that every quantile lies in the open interval (0, 1).
///
/// # Errors
/// `MetricsError::InvalidQuantile` for the first offending value.
pub fn validate_quantiles(metric: &str, quantiles: &[f64]) -> Result<()> {
    match quantiles.iter().find(|q| !(**q > 0.0 && **q < 1.0)) {
        Some(&quantile) => Err(MetricsError::InvalidQuantile {
            metric: metric.to_string(),
            quantile,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_per_kind() {
        assert_eq!(MetricKind::Counter.help_for("jobs"), "Counter for jobs");
        assert_eq!(MetricKind::Summary.help_for("lat"), "Summary for lat");
    }

    #[test]
    fn test_default_layouts_are_valid() {
        assert!(validate_buckets("h", &DEFAULT_BUCKETS).is_ok());
        assert!(validate_quantiles("s", &DEFAULT_QUANTILES).is_ok());
    }

    #[test]
    fn test_unsorted_buckets_rejected() {
        let err = validate_buckets("h", &[1.0, 0.5]).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidBuckets { .. }));
    }

    #[test]
    fn test_empty_and_infinite_buckets_rejected() {
        assert!(validate_buckets("h", &[]).is_err());
        assert!(validate_buckets("h", &[0.1, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_out_of_range_quantiles_rejected() {
        assert!(validate_quantiles("s", &[0.5, 1.0]).is_err());
        assert!(validate_quantiles("s", &[0.0]).is_err());
        assert!(validate_quantiles("s", &[f64::NAN]).is_err());
    }
}
