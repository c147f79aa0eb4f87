//! Prometheus Metric Registry - Named Instruments and Text Exposition
//!
//! Wraps a `prometheus::Registry` with the bookkeeping the lazy facade
//! needs: one instrument per name, kind conflicts reported as
//! `DuplicateName`, default labels merged into every rendered series,
//! and an optional process collector for built-in metrics.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use prometheus::proto;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, info};

use super::instrument::Instrument;
use crate::domain::instrument::MetricKind;
use crate::domain::labels::LabelSet;
use crate::error::{MetricsError, Result};

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Construction options for a `MetricRegistry`.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Labels added to every rendered series unless the series sets them.
    pub default_labels: LabelSet,
    /// Register the process collector (CPU, memory, file descriptors).
    pub builtin_metrics: bool,
}

/// Process-wide store of named instruments.
///
/// Shared through `Arc`; every method takes `&self`.
pub struct MetricRegistry {
    /// Prometheus registry holding the collectors.
    registry: Registry,
    /// Instruments by name.
    instruments: RwLock<BTreeMap<String, Arc<Instrument>>>,
    /// Labels merged into every rendered series.
    default_labels: RwLock<LabelSet>,
    /// Whether the process collector is registered.
    builtin_metrics: RwLock<bool>,
}

impl MetricRegistry {
    /// Create an empty registry with no default labels.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            instruments: RwLock::new(BTreeMap::new()),
            default_labels: RwLock::new(LabelSet::new()),
            builtin_metrics: RwLock::new(false),
        }
    }

    /// Create a registry from options.
    ///
    /// # Errors
    /// Invalid default label names, or a process collector that fails
    /// to register.
    pub fn with_options(options: RegistryOptions) -> Result<Self> {
        let registry = Self::new();
        registry.set_default_labels(options.default_labels)?;
        registry.enable_builtin_metrics(options.builtin_metrics)?;
        Ok(registry)
    }

    /// Replace the labels merged into every rendered series.
    ///
    /// # Errors
    /// `InvalidLabel` if a key is empty.
    pub fn set_default_labels(&self, labels: LabelSet) -> Result<()> {
        labels.validate("default labels")?;
        *self
            .default_labels
            .write()
            .map_err(|_| MetricsError::LockPoisoned("default labels"))? = labels;
        Ok(())
    }

    /// Current default labels.
    ///
    /// # Errors
    /// Fails if the lock was poisoned.
    pub fn default_labels(&self) -> Result<LabelSet> {
        Ok(self
            .default_labels
            .read()
            .map_err(|_| MetricsError::LockPoisoned("default labels"))?
            .clone())
    }

    /// Toggle the built-in process metrics.
    ///
    /// Only Linux exposes a process collector; elsewhere enabling is
    /// logged as unsupported and the flag stays off.
    ///
    /// # Errors
    /// Registration failure of the process collector.
    pub fn enable_builtin_metrics(&self, enabled: bool) -> Result<()> {
        let mut current = self
            .builtin_metrics
            .write()
            .map_err(|_| MetricsError::LockPoisoned("builtin metrics"))?;
        if *current == enabled {
            return Ok(());
        }
        let active = self.toggle_process_collector(enabled)?;
        *current = active;
        info!(enabled = active, "Built-in process metrics toggled");
        Ok(())
    }

    /// Returns whether the process collector is now registered.
    #[cfg(target_os = "linux")]
    fn toggle_process_collector(&self, enabled: bool) -> Result<bool> {
        use prometheus::process_collector::ProcessCollector;

        let collector = Box::new(ProcessCollector::for_self());
        if enabled {
            self.registry.register(collector)?;
        } else {
            self.registry.unregister(collector)?;
        }
        Ok(enabled)
    }

    #[cfg(not(target_os = "linux"))]
    fn toggle_process_collector(&self, enabled: bool) -> Result<bool> {
        if enabled {
            tracing::warn!("Built-in process metrics are only collected on Linux");
        }
        Ok(false)
    }

    /// Whether built-in process metrics are enabled.
    ///
    /// # Errors
    /// Fails if the lock was poisoned.
    pub fn builtin_metrics_enabled(&self) -> Result<bool> {
        Ok(*self
            .builtin_metrics
            .read()
            .map_err(|_| MetricsError::LockPoisoned("builtin metrics"))?)
    }

    /// Add an instrument under its name.
    ///
    /// # Errors
    /// `DuplicateName` if the name is already bound, or the Prometheus
    /// registration error (e.g. a clash with a built-in metric).
    pub fn register(&self, instrument: Instrument) -> Result<Arc<Instrument>> {
        let mut instruments = self
            .instruments
            .write()
            .map_err(|_| MetricsError::LockPoisoned("instrument index"))?;
        self.register_locked(&mut instruments, instrument)
    }

    /// Look up `name`, building and registering it with `build` if absent.
    ///
    /// The fast path only takes the read lock. Creation re-checks under
    /// the write lock, so concurrent first use builds one instrument.
    ///
    /// # Errors
    /// `DuplicateName` if `name` is bound to another kind, or any error
    /// returned by `build` or by registration.
    pub fn get_or_register<F>(&self, name: &str, kind: MetricKind, build: F) -> Result<Arc<Instrument>>
    where
        F: FnOnce() -> Result<Instrument>,
    {
        if let Some(existing) = self.get(name)? {
            return Self::expect_kind(existing, kind);
        }

        let mut instruments = self
            .instruments
            .write()
            .map_err(|_| MetricsError::LockPoisoned("instrument index"))?;
        if let Some(existing) = instruments.get(name) {
            return Self::expect_kind(Arc::clone(existing), kind);
        }
        self.register_locked(&mut instruments, build()?)
    }

    /// Instrument bound to `name`, if any.
    ///
    /// # Errors
    /// Fails if the lock was poisoned.
    pub fn get(&self, name: &str) -> Result<Option<Arc<Instrument>>> {
        Ok(self
            .instruments
            .read()
            .map_err(|_| MetricsError::LockPoisoned("instrument index"))?
            .get(name)
            .cloned())
    }

    /// Number of registered instruments (built-in metrics excluded).
    ///
    /// # Errors
    /// Fails if the lock was poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .instruments
            .read()
            .map_err(|_| MetricsError::LockPoisoned("instrument index"))?
            .len())
    }

    /// Whether no instrument has been registered.
    ///
    /// # Errors
    /// Fails if the lock was poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Unregister every instrument. Built-in metrics stay registered.
    ///
    /// # Errors
    /// Fails if the lock was poisoned or Prometheus refuses to unregister.
    pub fn clear(&self) -> Result<()> {
        let mut instruments = self
            .instruments
            .write()
            .map_err(|_| MetricsError::LockPoisoned("instrument index"))?;
        for instrument in instruments.values() {
            self.registry.unregister(instrument.collector())?;
        }
        instruments.clear();
        debug!("Metric registry cleared");
        Ok(())
    }

    /// Collect every family with default labels merged in.
    ///
    /// Empty label values are dropped (Prometheus treats them as absent)
    /// before defaults fill in missing names. A series whose labels then
    /// equal another series' is folded into it: counters, histograms and
    /// summary sums and counts add up, gauges keep the explicitly
    /// labeled value.
    ///
    /// # Errors
    /// Fails if the default label lock was poisoned.
    pub fn gather(&self) -> Result<Vec<proto::MetricFamily>> {
        let defaults = self.default_labels()?;
        let mut families = self.registry.gather();
        for family in &mut families {
            let filled: Vec<bool> = family
                .mut_metric()
                .iter_mut()
                .map(|metric| merge_labels(metric, &defaults))
                .collect();
            if filled.contains(&true) {
                fold_duplicate_series(family, &filled);
            }
        }
        Ok(families)
    }

    /// Render the text exposition format.
    ///
    /// An empty registry renders to the empty string.
    ///
    /// # Errors
    /// Poisoned internal state or an encoding failure.
    pub fn render(&self) -> Result<String> {
        let families = self.gather()?;
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| MetricsError::Prometheus(prometheus::Error::Msg(e.to_string())))
    }

    /// Underlying Prometheus registry, for application-owned collectors.
    pub fn inner(&self) -> &Registry {
        &self.registry
    }

    fn register_locked(
        &self,
        instruments: &mut BTreeMap<String, Arc<Instrument>>,
        instrument: Instrument,
    ) -> Result<Arc<Instrument>> {
        if let Some(existing) = instruments.get(instrument.name()) {
            return Err(MetricsError::DuplicateName {
                name: instrument.name().to_string(),
                existing: existing.kind(),
                requested: instrument.kind(),
            });
        }

        self.registry.register(instrument.collector())?;
        debug!(
            name = instrument.name(),
            kind = %instrument.kind(),
            labels = ?instrument.label_names(),
            "Instrument registered"
        );

        let instrument = Arc::new(instrument);
        instruments.insert(instrument.name().to_string(), Arc::clone(&instrument));
        Ok(instrument)
    }

    fn expect_kind(existing: Arc<Instrument>, kind: MetricKind) -> Result<Arc<Instrument>> {
        if existing.kind() == kind {
            Ok(existing)
        } else {
            Err(MetricsError::DuplicateName {
                name: existing.name().to_string(),
                existing: existing.kind(),
                requested: kind,
            })
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("instruments", &self.instruments)
            .field("default_labels", &self.default_labels)
            .finish_non_exhaustive()
    }
}

/// Returns true when a default filled a label the series left empty.
fn merge_labels(metric: &mut proto::Metric, defaults: &LabelSet) -> bool {
    let mut pairs = metric.take_label().into_vec();
    let declared: Vec<String> = pairs
        .iter()
        .map(|pair| pair.get_name().to_string())
        .collect();
    pairs.retain(|pair| !pair.get_value().is_empty());

    let mut filled = false;
    for (name, value) in defaults.iter() {
        if value.is_empty() || pairs.iter().any(|pair| pair.get_name() == name) {
            continue;
        }
        filled |= declared.iter().any(|declared| declared == name);
        let mut pair = proto::LabelPair::default();
        pair.set_name(name.to_string());
        pair.set_value(value.to_string());
        pairs.push(pair);
    }

    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    metric.set_label(pairs.into());
    filled
}

/// Fold series of one family that share identical label pairs.
///
/// `filled[i]` tells whether series `i` got a declared label from the
/// defaults; such series yield to explicitly labeled ones.
fn fold_duplicate_series(family: &mut proto::MetricFamily, filled: &[bool]) {
    let kind = family.get_field_type();
    let mut index: BTreeMap<Vec<(String, String)>, usize> = BTreeMap::new();
    let mut folded: Vec<(proto::Metric, bool)> = Vec::new();

    for (metric, is_filled) in family.take_metric().into_vec().into_iter().zip(filled) {
        let key = metric
            .get_label()
            .iter()
            .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
            .collect();
        match index.get(&key) {
            Some(&at) => {
                let (kept, kept_filled) = &mut folded[at];
                fold_metric(kind, kept, *kept_filled && !is_filled, metric);
                *kept_filled &= *is_filled;
            }
            None => {
                index.insert(key, folded.len());
                folded.push((metric, *is_filled));
            }
        }
    }

    let metrics: Vec<proto::Metric> = folded.into_iter().map(|(metric, _)| metric).collect();
    family.set_metric(metrics.into());
}

/// Add `other` into `kept`. With `prefer_other`, point-in-time values
/// (gauge value, summary quantiles) come from `other`.
fn fold_metric(
    kind: proto::MetricType,
    kept: &mut proto::Metric,
    prefer_other: bool,
    other: proto::Metric,
) {
    match kind {
        proto::MetricType::COUNTER => {
            let total = kept.get_counter().get_value() + other.get_counter().get_value();
            kept.mut_counter().set_value(total);
        }
        proto::MetricType::HISTOGRAM => {
            let other = other.get_histogram();
            let kept = kept.mut_histogram();
            kept.set_sample_count(kept.get_sample_count() + other.get_sample_count());
            kept.set_sample_sum(kept.get_sample_sum() + other.get_sample_sum());
            for (bucket, extra) in kept.mut_bucket().iter_mut().zip(other.get_bucket()) {
                let count = bucket.get_cumulative_count() + extra.get_cumulative_count();
                bucket.set_cumulative_count(count);
            }
        }
        proto::MetricType::SUMMARY => {
            let (kept_summary, other_summary) = (kept.get_summary(), other.get_summary());
            let count = kept_summary.get_sample_count() + other_summary.get_sample_count();
            let sum = kept_summary.get_sample_sum() + other_summary.get_sample_sum();
            if prefer_other {
                kept.set_summary(other.get_summary().clone());
            }
            let summary = kept.mut_summary();
            summary.set_sample_count(count);
            summary.set_sample_sum(sum);
        }
        _ => {
            if prefer_other {
                *kept = other;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(name: &str, labels: &[&str]) -> Instrument {
        Instrument::counter(
            name,
            &MetricKind::Counter.help_for(name),
            labels.iter().map(|l| (*l).to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_empty_registry_renders_empty() {
        let registry = MetricRegistry::new();
        assert_eq!(registry.render().unwrap(), "");
    }

    #[test]
    fn test_registered_but_untouched_instrument_renders_nothing() {
        let registry = MetricRegistry::new();
        registry.register(counter("idle", &["queue"])).unwrap();
        assert_eq!(registry.render().unwrap().trim(), "");
    }

    #[test]
    fn test_render_help_type_and_value() {
        let registry = MetricRegistry::new();
        let jobs = registry.register(counter("jobs", &[])).unwrap();
        jobs.inc_by(&LabelSet::new(), 1.0).unwrap();

        let text = registry.render().unwrap();
        assert!(text.contains("# HELP jobs Counter for jobs"), "{text}");
        assert!(text.contains("# TYPE jobs counter"), "{text}");
        assert!(text.contains("jobs 1"), "{text}");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = MetricRegistry::new();
        registry.register(counter("jobs", &[])).unwrap();
        let gauge = Instrument::gauge("jobs", "Gauge for jobs", vec![]).unwrap();
        let err = registry.register(gauge).unwrap_err();
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
    fn test_get_or_register_builds_once() {
        let registry = MetricRegistry::new();
        let mut builds = 0;
        for _ in 0..3 {
            registry
                .get_or_register("jobs", MetricKind::Counter, || {
                    builds += 1;
                    Ok(counter("jobs", &[]))
                })
                .unwrap();
        }
        assert_eq!(builds, 1);
        assert_eq!(registry.len().unwrap(), 1);
    }

    #[test]
    fn test_default_labels_merged_and_overridden() {
        let registry = MetricRegistry::new();
        registry
            .set_default_labels(LabelSet::from([("app", "api"), ("env", "prod")]))
            .unwrap();
        let jobs = registry.register(counter("jobs", &["env"])).unwrap();
        jobs.inc_by(&LabelSet::from([("env", "staging")]), 2.0).unwrap();

        let text = registry.render().unwrap();
        assert!(text.contains(r#"jobs{app="api",env="staging"} 2"#), "{text}");
    }

    #[test]
    fn test_series_equal_after_defaults_are_folded() {
        let registry = MetricRegistry::new();
        registry
            .set_default_labels(LabelSet::from([("env", "prod")]))
            .unwrap();
        let jobs = registry.register(counter("jobs", &["env"])).unwrap();
        jobs.inc_by(&LabelSet::from([("env", "prod")]), 1.0).unwrap();
        jobs.inc_by(&LabelSet::new(), 1.0).unwrap();

        let text = registry.render().unwrap();
        let samples: Vec<&str> = text.lines().filter(|l| l.starts_with("jobs{")).collect();
        assert_eq!(samples, [r#"jobs{env="prod"} 2"#], "{text}");
    }

    #[test]
    fn test_folded_gauge_keeps_explicit_value() {
        let registry = MetricRegistry::new();
        registry
            .set_default_labels(LabelSet::from([("env", "prod")]))
            .unwrap();
        let depth = registry
            .register(
                Instrument::gauge(
                    "depth",
                    &MetricKind::Gauge.help_for("depth"),
                    vec!["env".to_string()],
                )
                .unwrap(),
            )
            .unwrap();
        depth.set(&LabelSet::new(), 3.0).unwrap();
        depth.set(&LabelSet::from([("env", "prod")]), 7.0).unwrap();

        let text = registry.render().unwrap();
        let samples: Vec<&str> = text.lines().filter(|l| l.starts_with("depth{")).collect();
        assert_eq!(samples, [r#"depth{env="prod"} 7"#], "{text}");
    }

    #[test]
    fn test_folded_histogram_adds_buckets() {
        let registry = MetricRegistry::new();
        registry
            .set_default_labels(LabelSet::from([("env", "prod")]))
            .unwrap();
        let latency = registry
            .register(
                Instrument::histogram(
                    "latency",
                    &MetricKind::Histogram.help_for("latency"),
                    vec!["env".to_string()],
                    vec![1.0],
                )
                .unwrap(),
            )
            .unwrap();
        latency.observe(&LabelSet::new(), 0.5).unwrap();
        latency.observe(&LabelSet::from([("env", "prod")]), 2.0).unwrap();

        let text = registry.render().unwrap();
        assert!(text.contains(r#"latency_bucket{env="prod",le="1"} 1"#), "{text}");
        assert!(text.contains(r#"latency_bucket{env="prod",le="+Inf"} 2"#), "{text}");
        assert!(text.contains(r#"latency_count{env="prod"} 2"#), "{text}");
        assert_eq!(text.matches("latency_count").count(), 1, "{text}");
    }

    #[test]
    fn test_builtin_flag_reflects_collector() {
        let registry = MetricRegistry::new();
        registry.enable_builtin_metrics(true).unwrap();
        assert_eq!(
            registry.builtin_metrics_enabled().unwrap(),
            cfg!(target_os = "linux")
        );
        registry.enable_builtin_metrics(false).unwrap();
        assert!(!registry.builtin_metrics_enabled().unwrap());
    }

    #[test]
    fn test_missing_label_value_is_omitted() {
        let registry = MetricRegistry::new();
        let jobs = registry.register(counter("jobs", &["queue"])).unwrap();
        jobs.inc_by(&LabelSet::new(), 1.0).unwrap();

        let text = registry.render().unwrap();
        assert!(text.lines().any(|l| l == "jobs 1"), "{text}");
    }

    #[test]
    fn test_label_values_are_escaped() {
        let registry = MetricRegistry::new();
        let jobs = registry.register(counter("jobs", &["path"])).unwrap();
        jobs.inc_by(&LabelSet::from([("path", "a\"b\\c\nd")]), 1.0)
            .unwrap();

        let text = registry.render().unwrap();
        assert!(text.contains(r#"jobs{path="a\"b\\c\nd"} 1"#), "{text}");
    }

    #[test]
    fn test_clear_unregisters_instruments() {
        let registry = MetricRegistry::new();
        let jobs = registry.register(counter("jobs", &[])).unwrap();
        jobs.inc_by(&LabelSet::new(), 1.0).unwrap();
        registry.clear().unwrap();

        assert!(registry.is_empty().unwrap());
        assert_eq!(registry.render().unwrap(), "");
        assert!(registry.register(counter("jobs", &[])).is_ok());
    }

    #[test]
    fn test_empty_default_label_key_rejected() {
        let registry = MetricRegistry::new();
        let err = registry
            .set_default_labels(LabelSet::from([("", "x")]))
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidLabel { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_builtin_metrics_rendered_when_enabled() {
        let registry = MetricRegistry::with_options(RegistryOptions {
            default_labels: LabelSet::new(),
            builtin_metrics: true,
        })
        .unwrap();
        assert!(registry.builtin_metrics_enabled().unwrap());
        let text = registry.render().unwrap();
        assert!(text.contains("process_cpu_seconds_total"), "{text}");

        registry.enable_builtin_metrics(false).unwrap();
        assert_eq!(registry.render().unwrap(), "");
    }
}
