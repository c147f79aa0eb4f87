//! Metrics Service - Lazy-Creating Facade over the Registry
//!
//! Callers record by name; the first call for a name creates and
//! registers the instrument, later calls only mutate it:
//! - Label names are fixed from the first call's label keys
//! - Help text is generated from the kind ("Counter for <name>")
//! - Histogram buckets and summary quantiles apply at creation only
//!
//! Label keys are validated before anything is created, so a rejected
//! call leaves the registry untouched.

use std::sync::Arc;

use tracing::debug;

use crate::adapters::metrics::{Instrument, MetricRegistry};
use crate::domain::instrument::{
  DEFAULT_BUCKETS, DEFAULT_QUANTILES, MetricKind, validate_buckets, validate_quantiles,
};
use crate::domain::labels::LabelSet;
use crate::error::{MetricsError, Result};

/// Name-addressed recording API shared by the application.
#[derive(Debug, Clone)]
pub struct MetricsService {
  /// Registry instruments are created in.
  registry: Arc<MetricRegistry>,
}

impl MetricsService {
  /// Create a service recording into `registry`.
  pub fn new(registry: Arc<MetricRegistry>) -> Self {
    Self { registry }
  }

  /// Registry backing this service.
  pub fn registry(&self) -> &Arc<MetricRegistry> {
    &self.registry
  }

  /// Increment a counter by one.
  ///
  /// # Errors
  /// `InvalidLabel`, `LabelMismatch`, or `DuplicateName` when `name`
  /// is bound to another kind.
  pub fn increment_counter(&self, name: &str, labels: Option<&LabelSet>) -> Result<()> {
    self.increment_counter_by(name, 1.0, labels)
  }

  /// Increment a counter by a non-negative amount.
  ///
  /// # Errors
  /// As `increment_counter`, plus `InvalidValue` for negative or NaN
  /// amounts.
  pub fn increment_counter_by(
    &self,
    name: &str,
    amount: f64,
    labels: Option<&LabelSet>,
  ) -> Result<()> {
    let empty = LabelSet::new();
    let labels = labels.unwrap_or(&empty);
    labels.validate(name)?;
    if amount.is_nan() || amount < 0.0 {
      return Err(MetricsError::InvalidValue {
        metric: name.to_string(),
        value: amount,
        reason: "counters can only increase",
      });
    }

    let counter = self.registry.get_or_register(name, MetricKind::Counter, || {
      Instrument::counter(name, &MetricKind::Counter.help_for(name), labels.names())
    })?;
    counter.inc_by(labels, amount)
  }

  /// Set a gauge to `value`. Negative values are accepted.
  ///
  /// # Errors
  /// `InvalidLabel`, `LabelMismatch` or `DuplicateName`.
  pub fn set_gauge(&self, name: &str, value: f64, labels: Option<&LabelSet>) -> Result<()> {
    let empty = LabelSet::new();
    let labels = labels.unwrap_or(&empty);
    labels.validate(name)?;

    let gauge = self.registry.get_or_register(name, MetricKind::Gauge, || {
      Instrument::gauge(name, &MetricKind::Gauge.help_for(name), labels.names())
    })?;
    gauge.set(labels, value)
  }

  /// Record a histogram observation.
  ///
  /// `buckets` is used only when this call creates the histogram;
  /// `None` selects `[0.1, 0.5, 1, 2, 5]`.
  ///
  /// # Errors
  /// `InvalidLabel`, `LabelMismatch`, `DuplicateName`, or
  /// `InvalidBuckets` on creation.
  pub fn observe_histogram(
    &self,
    name: &str,
    value: f64,
    labels: Option<&LabelSet>,
    buckets: Option<&[f64]>,
  ) -> Result<()> {
    let empty = LabelSet::new();
    let labels = labels.unwrap_or(&empty);
    labels.validate(name)?;

    let histogram = self.registry.get_or_register(name, MetricKind::Histogram, || {
      let buckets = buckets.unwrap_or(&DEFAULT_BUCKETS);
      validate_buckets(name, buckets)?;
      debug!(name, ?buckets, "Creating histogram");
      Instrument::histogram(
        name,
        &MetricKind::Histogram.help_for(name),
        labels.names(),
        buckets.to_vec(),
      )
    })?;
    histogram.observe(labels, value)
  }

  /// Record a summary observation.
  ///
  /// `quantiles` is used only when this call creates the summary;
  /// `None` selects `[0.01, 0.05, 0.5, 0.9, 0.95, 0.99]`.
  ///
  /// # Errors
  /// `InvalidLabel`, `LabelMismatch`, `DuplicateName`, or
  /// `InvalidQuantile` on creation. A `quantile` label is rejected on
  /// creation with `Prometheus`.
  pub fn observe_summary(
    &self,
    name: &str,
    value: f64,
    labels: Option<&LabelSet>,
    quantiles: Option<&[f64]>,
  ) -> Result<()> {
    let empty = LabelSet::new();
    let labels = labels.unwrap_or(&empty);
    labels.validate(name)?;

    let summary = self.registry.get_or_register(name, MetricKind::Summary, || {
      let quantiles = quantiles.unwrap_or(&DEFAULT_QUANTILES);
      validate_quantiles(name, quantiles)?;
      debug!(name, ?quantiles, "Creating summary");
      Instrument::summary(
        name,
        &MetricKind::Summary.help_for(name),
        labels.names(),
        quantiles,
      )
    })?;
    summary.observe(labels, value)
  }

  /// Render the registry in the text exposition format.
  ///
  /// # Errors
  /// See `MetricRegistry::render`.
  pub fn render(&self) -> Result<String> {
    self.registry.render()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn service() -> MetricsService {
    MetricsService::new(Arc::new(MetricRegistry::new()))
  }

  #[test]
  fn test_first_call_fixes_label_names() {
    let service = service();
    let labels = LabelSet::from([("method", "GET"), ("status", "200")]);
    service.increment_counter("requests", Some(&labels)).unwrap();

    let counter = service.registry().get("requests").unwrap().unwrap();
    assert_eq!(counter.label_names(), ["method", "status"]);
    assert_eq!(counter.help(), "Counter for requests");
  }

  #[test]
  fn test_subset_of_labels_accepted() {
    let service = service();
    let full = LabelSet::from([("method", "GET"), ("status", "200")]);
    service.increment_counter("requests", Some(&full)).unwrap();
    service
      .increment_counter("requests", Some(&LabelSet::from([("method", "POST")])))
      .unwrap();
    service.increment_counter("requests", None).unwrap();

    let output = service.render().unwrap();
    assert!(output.contains("requests{method=\"POST\"} 1"), "{output}");
    assert!(output.contains("requests 1"), "{output}");
  }

  #[test]
  fn test_unknown_label_is_mismatch() {
    let service = service();
    service
      .increment_counter("requests", Some(&LabelSet::from([("method", "GET")])))
      .unwrap();
    let err = service
      .increment_counter("requests", Some(&LabelSet::from([("route", "/")])))
      .unwrap_err();
    assert!(matches!(err, MetricsError::LabelMismatch { .. }));
  }

  #[test]
  fn test_empty_label_key_creates_nothing() {
    let service = service();
    let err = service
      .set_gauge("temp", 1.0, Some(&LabelSet::from([("", "v")])))
      .unwrap_err();
    assert!(matches!(err, MetricsError::InvalidLabel { .. }));
    assert!(service.registry().is_empty().unwrap());
  }

  #[test]
  fn test_kind_conflict_is_duplicate_name() {
    let service = service();
    service.increment_counter("shared", None).unwrap();
    let err = service.set_gauge("shared", 1.0, None).unwrap_err();
    assert!(matches!(
      err,
      MetricsError::DuplicateName {
        existing: MetricKind::Counter,
        requested: MetricKind::Gauge,
        ..
      }
    ));
  }

  #[test]
  fn test_invalid_buckets_create_nothing() {
    let service = service();
    let err = service
      .observe_histogram("latency", 0.2, None, Some(&[1.0, 0.5]))
      .unwrap_err();
    assert!(matches!(err, MetricsError::InvalidBuckets { .. }));
    assert!(service.registry().get("latency").unwrap().is_none());
  }

  #[test]
  fn test_later_buckets_are_ignored() {
    let service = service();
    service
      .observe_histogram("latency", 0.2, None, Some(&[0.25, 1.0]))
      .unwrap();
    service
      .observe_histogram("latency", 0.3, None, Some(&[10.0]))
      .unwrap();
    let histogram = service.registry().get("latency").unwrap().unwrap();
    assert_eq!(histogram.buckets(), Some(&[0.25, 1.0][..]));
  }

  #[test]
  fn test_default_quantiles_used() {
    let service = service();
    service.observe_summary("payload", 3.0, None, None).unwrap();
    let summary = service.registry().get("payload").unwrap().unwrap();
    assert_eq!(summary.quantiles(), Some(&DEFAULT_QUANTILES[..]));
  }

  #[test]
  fn test_invalid_quantile_rejected() {
    let service = service();
    let err = service
      .observe_summary("payload", 3.0, None, Some(&[0.5, 1.5]))
      .unwrap_err();
    assert!(matches!(err, MetricsError::InvalidQuantile { .. }));
  }

  #[test]
  fn test_reserved_quantile_label_creates_nothing() {
    let service = service();
    let labels = LabelSet::from([("quantile", "x")]);
    let err = service
      .observe_summary("s", 1.0, Some(&labels), Some(&[0.5]))
      .unwrap_err();
    assert!(matches!(err, MetricsError::Prometheus(_)));
    assert!(service.registry().is_empty().unwrap());
    assert_eq!(service.render().unwrap(), "");
  }

  #[test]
  fn test_counter_by_amount() {
    let service = service();
    service.increment_counter_by("bytes", 512.0, None).unwrap();
    service.increment_counter_by("bytes", 0.0, None).unwrap();
    let counter = service.registry().get("bytes").unwrap().unwrap();
    assert!((counter.value(&LabelSet::new()).unwrap() - 512.0).abs() < f64::EPSILON);
    assert!(service.increment_counter_by("bytes", -1.0, None).is_err());
  }
}
