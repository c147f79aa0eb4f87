//! Summary Collector - Labeled Streaming Quantiles
//!
//! The `prometheus` crate ships counters, gauges and histograms but no
//! summary. `SummaryVec` fills that gap as a custom `Collector`: one
//! series per label-value combination, each holding a running sum, a
//! count and a `TargetedQuantiles` estimator. Collected families use
//! the `SUMMARY` metric type so the stock `TextEncoder` renders them.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use prometheus::core::{Collector, Desc};
use prometheus::proto;

use crate::domain::quantile::TargetedQuantiles;
use crate::error::{MetricsError, Result};

/// Label the encoder adds to each quantile sample.
const QUANTILE_LABEL: &str = "quantile";

/// State of one label series.
#[derive(Debug)]
struct SummarySeries {
    sum: f64,
    count: u64,
    estimator: TargetedQuantiles,
}

#[derive(Debug)]
struct SummaryCore {
    desc: Desc,
    quantiles: Vec<f64>,
    series: RwLock<BTreeMap<Vec<String>, Arc<Mutex<SummarySeries>>>>,
}

/// A summary partitioned by label values.
///
/// Cloning is cheap and yields a handle to the same series.
#[derive(Debug, Clone)]
pub struct SummaryVec {
    core: Arc<SummaryCore>,
}

/// Point-in-time values of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySnapshot {
    /// Sum of observed values.
    pub sum: f64,
    /// Number of observations.
    pub count: u64,
    /// `(quantile, estimate)` pairs in configured order.
    pub quantiles: Vec<(f64, f64)>,
}

impl SummaryVec {
    /// Create a summary with the given label names and target quantiles.
    ///
    /// # Errors
    /// Returns the descriptor error if the name or a label name is invalid.
    /// `quantile` is reserved for the rendered quantile samples.
    pub fn new(name: &str, help: &str, label_names: &[String], quantiles: &[f64]) -> Result<Self> {
        if label_names.iter().any(|label| label == QUANTILE_LABEL) {
            return Err(prometheus::Error::Msg(format!(
                "{QUANTILE_LABEL} is not allowed as label name in summaries"
            ))
            .into());
        }
        let desc = Desc::new(
            name.to_string(),
            help.to_string(),
            label_names.to_vec(),
            HashMap::new(),
        )?;
        Ok(Self {
            core: Arc::new(SummaryCore {
                desc,
                quantiles: quantiles.to_vec(),
                series: RwLock::new(BTreeMap::new()),
            }),
        })
    }

    /// Target quantiles of this summary.
    pub fn quantiles(&self) -> &[f64] {
        &self.core.quantiles
    }

    /// Record `value` into the series identified by `label_values`.
    ///
    /// # Errors
    /// Fails if the number of values does not match the label names, or
    /// if the series lock was poisoned.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        let series = self.series_for(label_values)?;
        let mut state = series
            .lock()
            .map_err(|_| MetricsError::LockPoisoned("summary series"))?;
        state.sum += value;
        state.count += 1;
        state.estimator.insert(value);
        Ok(())
    }

    /// Current values of a series, if it has been observed.
    ///
    /// # Errors
    /// Fails if a lock was poisoned.
    pub fn snapshot(&self, label_values: &[&str]) -> Result<Option<SummarySnapshot>> {
        let key: Vec<String> = label_values.iter().map(|v| (*v).to_string()).collect();
        let series = self
            .core
            .series
            .read()
            .map_err(|_| MetricsError::LockPoisoned("summary index"))?
            .get(&key)
            .cloned();
        let Some(series) = series else {
            return Ok(None);
        };
        let mut state = series
            .lock()
            .map_err(|_| MetricsError::LockPoisoned("summary series"))?;
        Ok(Some(snapshot_of(&mut state, &self.core.quantiles)))
    }

    fn series_for(&self, label_values: &[&str]) -> Result<Arc<Mutex<SummarySeries>>> {
        let expected = self.core.desc.variable_labels.len();
        if label_values.len() != expected {
            return Err(prometheus::Error::InconsistentCardinality {
                expect: expected,
                got: label_values.len(),
            }
            .into());
        }

        let key: Vec<String> = label_values.iter().map(|v| (*v).to_string()).collect();
        if let Some(series) = self
            .core
            .series
            .read()
            .map_err(|_| MetricsError::LockPoisoned("summary index"))?
            .get(&key)
        {
            return Ok(Arc::clone(series));
        }

        let mut index = self
            .core
            .series
            .write()
            .map_err(|_| MetricsError::LockPoisoned("summary index"))?;
        let series = index.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(SummarySeries {
                sum: 0.0,
                count: 0,
                estimator: TargetedQuantiles::new(&self.core.quantiles),
            }))
        });
        Ok(Arc::clone(series))
    }
}

fn snapshot_of(state: &mut SummarySeries, quantiles: &[f64]) -> SummarySnapshot {
    SummarySnapshot {
        sum: state.sum,
        count: state.count,
        quantiles: quantiles
            .iter()
            .map(|&q| (q, state.estimator.query(q)))
            .collect(),
    }
}

fn label_pairs(names: &[String], values: &[String]) -> Vec<proto::LabelPair> {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| {
            let mut pair = proto::LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            pair
        })
        .collect()
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        // Poisoned series are still rendered; `observe` reports the poisoning.
        let index = self
            .core
            .series
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut metrics = Vec::with_capacity(index.len());
        for (values, series) in index.iter() {
            let mut state = series.lock().unwrap_or_else(PoisonError::into_inner);
            let snapshot = snapshot_of(&mut state, &self.core.quantiles);

            let quantiles: Vec<proto::Quantile> = snapshot
                .quantiles
                .iter()
                .map(|&(q, estimate)| {
                    let mut quantile = proto::Quantile::default();
                    quantile.set_quantile(q);
                    quantile.set_value(estimate);
                    quantile
                })
                .collect();

            let mut summary = proto::Summary::default();
            summary.set_sample_count(snapshot.count);
            summary.set_sample_sum(snapshot.sum);
            summary.set_quantile(quantiles.into());

            let mut metric = proto::Metric::default();
            metric.set_label(label_pairs(&self.core.desc.variable_labels, values).into());
            metric.set_summary(summary);
            metrics.push(metric);
        }

        let mut family = proto::MetricFamily::default();
        family.set_name(self.core.desc.fq_name.clone());
        family.set_help(self.core.desc.help.clone());
        family.set_field_type(proto::MetricType::SUMMARY);
        family.set_metric(metrics.into());
        vec![family]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_sum_and_count_accumulate() {
        let summary = SummaryVec::new("lat", "Summary for lat", &names(&["endpoint"]), &[0.5]).unwrap();
        summary.observe(&["/api"], 100.0).unwrap();
        summary.observe(&["/api"], 50.0).unwrap();

        let snap = summary.snapshot(&["/api"]).unwrap().unwrap();
        assert_eq!(snap.count, 2);
        assert!((snap.sum - 150.0).abs() < f64::EPSILON);
        assert!(summary.snapshot(&["/other"]).unwrap().is_none());
    }

    #[test]
    fn test_wrong_cardinality_rejected() {
        let summary = SummaryVec::new("lat", "h", &names(&["a", "b"]), &[0.5]).unwrap();
        let err = summary.observe(&["x"], 1.0).unwrap_err();
        assert!(matches!(err, MetricsError::Prometheus(_)));
    }

    #[test]
    fn test_collect_emits_summary_family() {
        let summary = SummaryVec::new("lat", "h", &[], &[0.5, 0.9]).unwrap();
        summary.observe(&[], 3.0).unwrap();

        let families = summary.collect();
        assert_eq!(families.len(), 1);
        let family = &families[0];
        assert_eq!(family.get_name(), "lat");
        assert_eq!(family.get_field_type(), proto::MetricType::SUMMARY);

        let metric = &family.get_metric()[0];
        let s = metric.get_summary();
        assert_eq!(s.get_sample_count(), 1);
        assert_eq!(s.get_quantile().len(), 2);
        assert!((s.get_quantile()[0].get_value() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_quantile_label_name_reserved() {
        let err = SummaryVec::new("lat", "h", &names(&["quantile"]), &[0.5]).unwrap_err();
        assert!(err.to_string().contains("quantile is not allowed"), "{err}");
    }

    #[test]
    fn test_invalid_name_rejected() {
        assert!(SummaryVec::new("bad name", "h", &[], &[0.5]).is_err());
    }
}
