//! Error Taxonomy - Metrics Core Failures
//!
//! Every fallible operation of the registry, the lazy-creation service
//! and the reporter lifecycle returns `MetricsError`. Push failures use
//! their own type (`crate::ports::push_transport::PushTransportError`)
//! because they are folded into a `PushResponse` and never surface as
//! errors to callers.

use thiserror::Error;

use crate::domain::instrument::MetricKind;
use crate::ports::push_transport::PushTransportError;

/// Errors raised by metric creation, observation and rendering.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A label map contained an empty key.
    #[error("invalid label for metric `{metric}`: label names must not be empty")]
    InvalidLabel {
        /// Metric the label was supplied for.
        metric: String,
    },

    /// A label set used keys the instrument was not created with.
    #[error(
        "label mismatch for metric `{metric}`: expected a subset of {expected:?}, got {actual:?}"
    )]
    LabelMismatch {
        /// Metric being observed.
        metric: String,
        /// Label names fixed at creation time.
        expected: Vec<String>,
        /// Label names supplied by the caller.
        actual: Vec<String>,
    },

    /// A name is already bound to an instrument.
    #[error("metric `{name}` is already registered as a {existing}, cannot register it as a {requested}")]
    DuplicateName {
        /// Conflicting metric name.
        name: String,
        /// Kind the name is bound to.
        existing: MetricKind,
        /// Kind requested by the caller.
        requested: MetricKind,
    },

    /// The process-wide reporter was used before `init`.
    #[error("metrics reporter has not been initialized")]
    NotInitialized,

    /// The process-wide reporter was initialized twice.
    #[error("metrics reporter has already been initialized")]
    AlreadyInitialized,

    /// Histogram buckets were empty, unordered or not finite.
    #[error("invalid buckets for histogram `{metric}`: {reason}")]
    InvalidBuckets {
        /// Histogram name.
        metric: String,
        /// What was wrong with the buckets.
        reason: String,
    },

    /// A summary quantile was outside (0, 1).
    #[error("invalid quantile {quantile} for summary `{metric}`: quantiles must lie in (0, 1)")]
    InvalidQuantile {
        /// Summary name.
        metric: String,
        /// Offending quantile.
        quantile: f64,
    },

    /// An observation value was rejected (negative counter increment, NaN).
    #[error("invalid value {value} for metric `{metric}`: {reason}")]
    InvalidValue {
        /// Metric being observed.
        metric: String,
        /// Offending value.
        value: f64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The underlying Prometheus library rejected a descriptor or encoding.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The push gateway settings could not produce a transport.
    #[error("invalid push gateway configuration: {0}")]
    PushConfig(#[from] PushTransportError),

    /// Internal state was poisoned by a panicking writer.
    #[error("metrics state is corrupted: {0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, MetricsError>;
