//! Label Sets - Series Identity for Labeled Instruments
//!
//! A `LabelSet` maps label names to values. Values may be given as
//! strings or numbers and are stored in their rendered text form.
//! Keys are kept ordered so that label names inferred from a first
//! observation are deterministic.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{MetricsError, Result};

/// A single label value, stored as exposition text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelValue(String);

impl LabelValue {
    /// Text form of the value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for LabelValue {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

macro_rules! numeric_label_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for LabelValue {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

numeric_label_value!(i32, i64, u16, u32, u64, usize, f64);

/// Ordered mapping from label name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(BTreeMap<String, LabelValue>);

impl LabelSet {
    /// Create an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or overwrite a label.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<LabelValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Value of a label, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(LabelValue::as_str)
    }

    /// Label names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `self` on top of `base`: keys present in both keep the
    /// value from `self`.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        let mut merged = base.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Reject empty label names.
    ///
    /// # Errors
    /// `MetricsError::InvalidLabel` if any key is the empty string.
    pub fn validate(&self, metric: &str) -> Result<()> {
        if self.0.keys().any(String::is_empty) {
            return Err(MetricsError::InvalidLabel {
                metric: metric.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve values in the order of `names`.
    ///
    /// Names absent from the set resolve to the empty value, which the
    /// exposition omits.
    ///
    /// # Errors
    /// `MetricsError::LabelMismatch` if the set carries a key that is not
    /// one of `names`.
    pub fn values_for<'a>(&'a self, metric: &str, names: &[String]) -> Result<Vec<&'a str>> {
        if self.0.keys().any(|k| !names.contains(k)) {
            return Err(MetricsError::LabelMismatch {
                metric: metric.to_string(),
                expected: names.to_vec(),
                actual: self.names(),
            });
        }
        Ok(names
            .iter()
            .map(|n| self.0.get(n).map_or("", LabelValue::as_str))
            .collect())
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for LabelSet
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<&BTreeMap<String, String>> for LabelSet {
    fn from(map: &BTreeMap<String, String>) -> Self {
        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values_render_as_text() {
        let labels = LabelSet::new().with("status", 200u16).with("ratio", 0.5);
        assert_eq!(labels.get("status"), Some("200"));
        assert_eq!(labels.get("ratio"), Some("0.5"));
    }

    #[test]
    fn test_names_are_sorted() {
        let labels = LabelSet::from([("region", "us"), ("instance", "a")]);
        assert_eq!(labels.names(), vec!["instance", "region"]);
    }

    #[test]
    fn test_empty_key_rejected() {
        let labels = LabelSet::from([("", "invalid")]);
        let err = labels.validate("x").unwrap_err();
        assert!(matches!(err, MetricsError::InvalidLabel { .. }));
    }

    #[test]
    fn test_merged_over_prefers_own_values() {
        let defaults = LabelSet::from([("env", "prod"), ("app", "api")]);
        let call = LabelSet::from([("env", "staging")]);
        let merged = call.merged_over(&defaults);
        assert_eq!(merged.get("env"), Some("staging"));
        assert_eq!(merged.get("app"), Some("api"));
    }

    #[test]
    fn test_values_for_fills_missing_with_empty() {
        let names = vec!["method".to_string(), "status".to_string()];
        let labels = LabelSet::from([("method", "GET")]);
        assert_eq!(labels.values_for("m", &names).unwrap(), vec!["GET", ""]);
    }

    #[test]
    fn test_values_for_rejects_unknown_key() {
        let names = vec!["method".to_string()];
        let labels = LabelSet::from([("path", "/")]);
        let err = labels.values_for("m", &names).unwrap_err();
        assert!(matches!(err, MetricsError::LabelMismatch { .. }));
    }
}
