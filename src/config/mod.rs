//! Configuration Module - Metrics, Push Gateway and Reporter Settings
//!
//! `MetricsConfig` is the shape both module bootstrap modes resolve to.
//! `AppConfig` wraps it for the standalone binary and is loaded from a
//! TOML file by `loader::load_config`.

pub mod loader;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::metrics::RegistryOptions;
use crate::domain::labels::LabelSet;

/// Metrics core configuration.
///
/// Everything is optional: an empty config yields a registry without
/// default labels, without built-in metrics, and a disabled push client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
  /// Labels added to every rendered series.
  #[serde(default)]
  pub default_labels: BTreeMap<String, String>,
  /// Register built-in process metrics.
  #[serde(default)]
  pub default_metrics_enabled: bool,
  /// Push gateway base URL; pushing is disabled when absent.
  #[serde(default)]
  pub pushgateway_url: Option<String>,
  /// Transport options for the push gateway.
  #[serde(default)]
  pub pushgateway_options: PushgatewayOptions,
}

impl MetricsConfig {
  /// Set the push gateway URL.
  #[must_use]
  pub fn with_pushgateway(mut self, url: impl Into<String>) -> Self {
    self.pushgateway_url = Some(url.into());
    self
  }

  /// Add a default label.
  #[must_use]
  pub fn with_default_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.default_labels.insert(name.into(), value.into());
    self
  }

  /// Enable or disable built-in process metrics.
  #[must_use]
  pub fn with_default_metrics(mut self, enabled: bool) -> Self {
    self.default_metrics_enabled = enabled;
    self
  }

  /// Registry construction options derived from this config.
  pub fn registry_options(&self) -> RegistryOptions {
    RegistryOptions {
      default_labels: LabelSet::from(&self.default_labels),
      builtin_metrics: self.default_metrics_enabled,
    }
  }
}

/// Push gateway transport options.
#[derive(Debug, Clone, Deserialize)]
pub struct PushgatewayOptions {
  /// Request timeout in milliseconds.
  #[serde(default = "default_push_timeout_ms")]
  pub timeout_ms: u64,
  /// Extra headers sent with every push.
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  /// Optional basic-auth credentials.
  #[serde(default)]
  pub auth: Option<BasicAuth>,
}

impl PushgatewayOptions {
  /// Request timeout as a `Duration`.
  pub const fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }
}

impl Default for PushgatewayOptions {
  fn default() -> Self {
    Self {
      timeout_ms: default_push_timeout_ms(),
      headers: BTreeMap::new(),
      auth: None,
    }
  }
}

/// Basic-auth credentials for the push gateway.
#[derive(Clone, Deserialize)]
pub struct BasicAuth {
  /// User name.
  pub username: String,
  /// Password (redacted from `Debug` output).
  pub password: String,
}

impl fmt::Debug for BasicAuth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BasicAuth")
      .field("username", &self.username)
      .field("password", &"***")
      .finish()
  }
}

/// Options of the process-wide reporter.
#[derive(Debug, Clone, Deserialize)]
pub struct ReporterOptions {
  /// Log swallowed recording errors.
  #[serde(default = "default_true")]
  pub log_errors: bool,
  /// Labels merged under every reporter call's labels.
  #[serde(default)]
  pub default_labels: BTreeMap<String, String>,
}

impl Default for ReporterOptions {
  fn default() -> Self {
    Self {
      log_errors: true,
      default_labels: BTreeMap::new(),
    }
  }
}

/// Top-level configuration of the `prom-reporter` binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Scrape server and logging.
  #[serde(default)]
  pub server: ServerConfig,
  /// Metrics core.
  #[serde(default)]
  pub metrics: MetricsConfig,
  /// Process-wide reporter.
  #[serde(default)]
  pub reporter: ReporterOptions,
  /// Periodic push schedule.
  #[serde(default)]
  pub push: PushScheduleConfig,
}

/// Scrape server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Metrics server bind address.
  #[serde(default = "default_bind_address")]
  pub bind_address: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind_address: default_bind_address(),
      log_level: default_log_level(),
    }
  }
}

/// Periodic push configuration, used when a gateway URL is set.
#[derive(Debug, Clone, Deserialize)]
pub struct PushScheduleConfig {
  /// Job name pushed under.
  #[serde(default = "default_job_name")]
  pub job_name: String,
  /// Seconds between pushes.
  #[serde(default = "default_push_interval")]
  pub interval_seconds: u64,
}

impl Default for PushScheduleConfig {
  fn default() -> Self {
    Self {
      job_name: default_job_name(),
      interval_seconds: default_push_interval(),
    }
  }
}

// Default value functions for serde

fn default_true() -> bool {
  true
}

fn default_push_timeout_ms() -> u64 {
  10_000
}

fn default_bind_address() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_job_name() -> String {
  "prom_reporter".to_string()
}

fn default_push_interval() -> u64 {
  15
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_toml_uses_defaults() {
    let config: AppConfig = toml::from_str("").unwrap();
    assert_eq!(config.server.bind_address, "0.0.0.0:9090");
    assert!(config.metrics.pushgateway_url.is_none());
    assert!(!config.metrics.default_metrics_enabled);
    assert_eq!(config.metrics.pushgateway_options.timeout_ms, 10_000);
    assert!(config.reporter.log_errors);
    assert_eq!(config.push.interval_seconds, 15);
  }

  #[test]
  fn test_full_metrics_section() {
    let config: AppConfig = toml::from_str(
      r#"
      [metrics]
      default_metrics_enabled = true
      pushgateway_url = "http://gateway:9091"

      [metrics.default_labels]
      app = "billing"

      [metrics.pushgateway_options]
      timeout_ms = 2500

      [metrics.pushgateway_options.headers]
      x-tenant = "acme"

      [metrics.pushgateway_options.auth]
      username = "svc"
      password = "hunter2"
      "#,
    )
    .unwrap();

    let metrics = &config.metrics;
    assert_eq!(metrics.pushgateway_url.as_deref(), Some("http://gateway:9091"));
    assert_eq!(metrics.default_labels.get("app").map(String::as_str), Some("billing"));
    assert_eq!(metrics.pushgateway_options.timeout(), Duration::from_millis(2500));
    assert_eq!(metrics.pushgateway_options.headers.len(), 1);
    let auth = metrics.pushgateway_options.auth.as_ref().unwrap();
    assert_eq!(auth.username, "svc");
    assert!(!format!("{auth:?}").contains("hunter2"));
  }

  #[test]
  fn test_registry_options_carry_labels() {
    let config = MetricsConfig::default()
      .with_default_label("env", "prod")
      .with_default_metrics(true);
    let options = config.registry_options();
    assert_eq!(options.default_labels.get("env"), Some("prod"));
    assert!(options.builtin_metrics);
  }
}
