//! Reporter - Process-Wide Fire-and-Forget Recording
//!
//! A `Reporter` wraps a `MetricsService` for call sites that must never
//! fail because of metrics. Errors are swallowed and, when
//! `log_errors` is set, logged at `error`.
//!
//! The module also holds one global reporter installed by `init`. The
//! free functions (`counter`, `gauge`, ...) forward to it and return
//! `NotInitialized` until `init` has run; a second `init` returns
//! `AlreadyInitialized`.

use std::sync::OnceLock;

use tracing::{error, info};

use crate::config::ReporterOptions;
use crate::domain::labels::LabelSet;
use crate::error::{MetricsError, Result};
use crate::usecases::metrics_service::MetricsService;

static GLOBAL: OnceLock<Reporter> = OnceLock::new();

/// Recording facade that never returns recording errors.
#[derive(Debug, Clone)]
pub struct Reporter {
  service: MetricsService,
  default_labels: LabelSet,
  log_errors: bool,
}

impl Reporter {
  /// Create a reporter over `service`.
  pub fn new(service: MetricsService, options: &ReporterOptions) -> Self {
    Self {
      service,
      default_labels: LabelSet::from(&options.default_labels),
      log_errors: options.log_errors,
    }
  }

  /// Service the reporter records through.
  pub fn service(&self) -> &MetricsService {
    &self.service
  }

  /// Increment a counter by one.
  pub fn counter(&self, name: &str, labels: Option<&LabelSet>) {
    let labels = self.merge(labels);
    self.report(name, self.service.increment_counter(name, labels.as_ref()));
  }

  /// Set a gauge.
  pub fn gauge(&self, name: &str, value: f64, labels: Option<&LabelSet>) {
    let labels = self.merge(labels);
    self.report(name, self.service.set_gauge(name, value, labels.as_ref()));
  }

  /// Record a histogram observation.
  pub fn histogram(
    &self,
    name: &str,
    value: f64,
    labels: Option<&LabelSet>,
    buckets: Option<&[f64]>,
  ) {
    let labels = self.merge(labels);
    self.report(
      name,
      self
        .service
        .observe_histogram(name, value, labels.as_ref(), buckets),
    );
  }

  /// Record a summary observation.
  pub fn summary(
    &self,
    name: &str,
    value: f64,
    labels: Option<&LabelSet>,
    quantiles: Option<&[f64]>,
  ) {
    let labels = self.merge(labels);
    self.report(
      name,
      self
        .service
        .observe_summary(name, value, labels.as_ref(), quantiles),
    );
  }

  fn merge(&self, labels: Option<&LabelSet>) -> Option<LabelSet> {
    match labels {
      Some(labels) => Some(labels.merged_over(&self.default_labels)),
      None if self.default_labels.is_empty() => None,
      None => Some(self.default_labels.clone()),
    }
  }

  fn report(&self, name: &str, result: Result<()>) {
    if let Err(e) = result {
      if self.log_errors {
        error!(metric = name, error = %e, "Failed to record metric");
      }
    }
  }
}

/// Install the process-wide reporter.
///
/// # Errors
/// `AlreadyInitialized` if a reporter is already installed.
pub fn init(service: MetricsService, options: &ReporterOptions) -> Result<()> {
  GLOBAL
    .set(Reporter::new(service, options))
    .map_err(|_| MetricsError::AlreadyInitialized)?;
  info!(log_errors = options.log_errors, "Metrics reporter initialized");
  Ok(())
}

/// Whether `init` has run.
pub fn has_been_initialized() -> bool {
  GLOBAL.get().is_some()
}

/// The process-wide reporter.
///
/// # Errors
/// `NotInitialized` before `init`.
pub fn global() -> Result<&'static Reporter> {
  GLOBAL.get().ok_or(MetricsError::NotInitialized)
}

/// Increment a counter through the global reporter.
///
/// # Errors
/// `NotInitialized` before `init`; recording errors are only logged.
pub fn counter(name: &str, labels: Option<&LabelSet>) -> Result<()> {
  global()?.counter(name, labels);
  Ok(())
}

/// Set a gauge through the global reporter.
///
/// # Errors
/// `NotInitialized` before `init`; recording errors are only logged.
pub fn gauge(name: &str, value: f64, labels: Option<&LabelSet>) -> Result<()> {
  global()?.gauge(name, value, labels);
  Ok(())
}

/// Record a histogram observation through the global reporter.
///
/// # Errors
/// `NotInitialized` before `init`; recording errors are only logged.
pub fn histogram(
  name: &str,
  value: f64,
  labels: Option<&LabelSet>,
  buckets: Option<&[f64]>,
) -> Result<()> {
  global()?.histogram(name, value, labels, buckets);
  Ok(())
}

/// Record a summary observation through the global reporter.
///
/// # Errors
/// `NotInitialized` before `init`; recording errors are only logged.
pub fn summary(
  name: &str,
  value: f64,
  labels: Option<&LabelSet>,
  quantiles: Option<&[f64]>,
) -> Result<()> {
  global()?.summary(name, value, labels, quantiles);
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::adapters::metrics::MetricRegistry;

  fn reporter(defaults: &[(&str, &str)]) -> Reporter {
    let options = ReporterOptions {
      log_errors: true,
      default_labels: defaults
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect(),
    };
    Reporter::new(MetricsService::new(Arc::new(MetricRegistry::new())), &options)
  }

  #[test]
  fn test_errors_are_swallowed() {
    let reporter = reporter(&[]);
    reporter.counter("shared", None);
    reporter.gauge("shared", 1.0, None);
    reporter.counter("bad", Some(&LabelSet::from([("", "x")])));

    let output = reporter.service().render().unwrap();
    assert!(output.contains("shared 1"), "{output}");
    assert!(!output.contains("bad"), "{output}");
  }

  #[test]
  fn test_default_labels_merged_under_call_labels() {
    let reporter = reporter(&[("service", "billing"), ("region", "eu")]);
    reporter.counter("calls", Some(&LabelSet::from([("region", "us")])));

    let output = reporter.service().render().unwrap();
    assert!(
      output.contains("calls{region=\"us\",service=\"billing\"} 1"),
      "{output}"
    );
  }

  #[test]
  fn test_default_labels_apply_without_call_labels() {
    let reporter = reporter(&[("service", "billing")]);
    reporter.histogram("latency", 0.3, None, None);
    reporter.summary("size", 10.0, None, None);

    let output = reporter.service().render().unwrap();
    assert!(output.contains("latency_count{service=\"billing\"} 1"), "{output}");
    assert!(output.contains("size_sum{service=\"billing\"} 10"), "{output}");
  }
}
