//! Registered Instruments - Typed Wrappers over Prometheus Vectors
//!
//! An `Instrument` binds a metric name to one of the four kinds and to
//! the label names fixed at creation. Counters, gauges and histograms
//! delegate storage to the atomic `prometheus` vectors; summaries use
//! the crate's own `SummaryVec`.

use std::fmt;

use prometheus::core::Collector;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts};

use super::summary::SummaryVec;
use crate::domain::instrument::MetricKind;
use crate::domain::labels::LabelSet;
use crate::error::{MetricsError, Result};

#[derive(Clone)]
enum Handle {
    Counter(CounterVec),
    Gauge(GaugeVec),
    Histogram(HistogramVec, Vec<f64>),
    Summary(SummaryVec),
}

/// A named, typed metric with a fixed label schema.
#[derive(Clone)]
pub struct Instrument {
    name: String,
    help: String,
    label_names: Vec<String>,
    handle: Handle,
}

impl Instrument {
    /// Build a counter.
    ///
    /// # Errors
    /// Invalid metric or label names.
    pub fn counter(name: &str, help: &str, label_names: Vec<String>) -> Result<Self> {
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let vec = CounterVec::new(Opts::new(name, help), &names)?;
        Ok(Self::from_parts(name, help, label_names, Handle::Counter(vec)))
    }

    /// Build a gauge.
    ///
    /// # Errors
    /// Invalid metric or label names.
    pub fn gauge(name: &str, help: &str, label_names: Vec<String>) -> Result<Self> {
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let vec = GaugeVec::new(Opts::new(name, help), &names)?;
        Ok(Self::from_parts(name, help, label_names, Handle::Gauge(vec)))
    }

    /// Build a histogram with the given ascending bucket boundaries.
    ///
    /// # Errors
    /// Invalid metric or label names, or buckets rejected by Prometheus.
    pub fn histogram(
        name: &str,
        help: &str,
        label_names: Vec<String>,
        buckets: Vec<f64>,
    ) -> Result<Self> {
        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let vec = HistogramVec::new(
            HistogramOpts::new(name, help).buckets(buckets.clone()),
            &names,
        )?;
        Ok(Self::from_parts(
            name,
            help,
            label_names,
            Handle::Histogram(vec, buckets),
        ))
    }

    /// Build a summary tracking the given quantiles.
    ///
    /// # Errors
    /// Invalid metric or label names.
    pub fn summary(
        name: &str,
        help: &str,
        label_names: Vec<String>,
        quantiles: &[f64],
    ) -> Result<Self> {
        let vec = SummaryVec::new(name, help, &label_names, quantiles)?;
        Ok(Self::from_parts(name, help, label_names, Handle::Summary(vec)))
    }

    fn from_parts(name: &str, help: &str, label_names: Vec<String>, handle: Handle) -> Self {
        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names,
            handle,
        }
    }

    /// Metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Label names fixed at creation.
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Instrument kind.
    pub fn kind(&self) -> MetricKind {
        match self.handle {
            Handle::Counter(_) => MetricKind::Counter,
            Handle::Gauge(_) => MetricKind::Gauge,
            Handle::Histogram(..) => MetricKind::Histogram,
            Handle::Summary(_) => MetricKind::Summary,
        }
    }

    /// Histogram bucket boundaries, if this is a histogram.
    pub fn buckets(&self) -> Option<&[f64]> {
        match &self.handle {
            Handle::Histogram(_, buckets) => Some(buckets),
            _ => None,
        }
    }

    /// Summary quantiles, if this is a summary.
    pub fn quantiles(&self) -> Option<&[f64]> {
        match &self.handle {
            Handle::Summary(summary) => Some(summary.quantiles()),
            _ => None,
        }
    }

    /// Collector handle for registration with a Prometheus registry.
    pub fn collector(&self) -> Box<dyn Collector> {
        match &self.handle {
            Handle::Counter(vec) => Box::new(vec.clone()),
            Handle::Gauge(vec) => Box::new(vec.clone()),
            Handle::Histogram(vec, _) => Box::new(vec.clone()),
            Handle::Summary(vec) => Box::new(vec.clone()),
        }
    }

    /// Add `amount` to a counter series.
    ///
    /// # Errors
    /// Wrong kind, label mismatch, or a negative/NaN amount.
    pub fn inc_by(&self, labels: &LabelSet, amount: f64) -> Result<()> {
        let Handle::Counter(vec) = &self.handle else {
            return Err(self.kind_mismatch(MetricKind::Counter));
        };
        if amount.is_nan() || amount < 0.0 {
            return Err(MetricsError::InvalidValue {
                metric: self.name.clone(),
                value: amount,
                reason: "counters can only increase",
            });
        }
        let values = labels.values_for(&self.name, &self.label_names)?;
        vec.get_metric_with_label_values(&values)?.inc_by(amount);
        Ok(())
    }

    /// Overwrite a gauge series.
    ///
    /// # Errors
    /// Wrong kind or label mismatch.
    pub fn set(&self, labels: &LabelSet, value: f64) -> Result<()> {
        let Handle::Gauge(vec) = &self.handle else {
            return Err(self.kind_mismatch(MetricKind::Gauge));
        };
        let values = labels.values_for(&self.name, &self.label_names)?;
        vec.get_metric_with_label_values(&values)?.set(value);
        Ok(())
    }

    /// Record a histogram or summary observation.
    ///
    /// # Errors
    /// Wrong kind or label mismatch.
    pub fn observe(&self, labels: &LabelSet, value: f64) -> Result<()> {
        let values = labels.values_for(&self.name, &self.label_names)?;
        match &self.handle {
            Handle::Histogram(vec, _) => {
                vec.get_metric_with_label_values(&values)?.observe(value);
                Ok(())
            }
            Handle::Summary(vec) => vec.observe(&values, value),
            _ => Err(self.kind_mismatch(MetricKind::Histogram)),
        }
    }

    /// Current value of a counter or gauge series (test/diagnostic aid).
    ///
    /// # Errors
    /// Wrong kind or label mismatch.
    pub fn value(&self, labels: &LabelSet) -> Result<f64> {
        let values = labels.values_for(&self.name, &self.label_names)?;
        match &self.handle {
            Handle::Counter(vec) => Ok(vec.get_metric_with_label_values(&values)?.get()),
            Handle::Gauge(vec) => Ok(vec.get_metric_with_label_values(&values)?.get()),
            _ => Err(self.kind_mismatch(MetricKind::Gauge)),
        }
    }

    fn kind_mismatch(&self, requested: MetricKind) -> MetricsError {
        MetricsError::DuplicateName {
            name: self.name.clone(),
            existing: self.kind(),
            requested,
        }
    }
}

impl fmt::Debug for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("label_names", &self.label_names)
            .finish_non_exhaustive()
    }
}
