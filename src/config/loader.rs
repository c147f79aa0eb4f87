//! Configuration Loader - File Loading and Validation
//!
//! Handles loading the TOML config, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the TOML file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)
    .with_context(|| format!("Invalid config file: {}", path.display()))?;

  info!(
    bind_address = %config.server.bind_address,
    pushgateway = config.metrics.pushgateway_url.is_some(),
    default_labels = config.metrics.default_labels.len(),
    builtin_metrics = config.metrics.default_metrics_enabled,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
/// TOML syntax errors or validation failures.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse TOML")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty bind address and job name
/// - Positive push interval and timeout
/// - http(s) push gateway URL
/// - Non-empty label names
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.server.bind_address.is_empty(),
    "server.bind_address must not be empty"
  );

  // Push gateway validation
  if let Some(url) = &config.metrics.pushgateway_url {
    anyhow::ensure!(
      url.starts_with("http://") || url.starts_with("https://"),
      "metrics.pushgateway_url must be an http(s) URL, got {url}"
    );
  }
  anyhow::ensure!(
    config.metrics.pushgateway_options.timeout_ms > 0,
    "metrics.pushgateway_options.timeout_ms must be positive"
  );
  anyhow::ensure!(
    !config.push.job_name.is_empty(),
    "push.job_name must not be empty"
  );
  anyhow::ensure!(
    config.push.interval_seconds > 0,
    "push.interval_seconds must be positive"
  );

  // Label validation
  anyhow::ensure!(
    !config.metrics.default_labels.contains_key(""),
    "metrics.default_labels must not contain an empty label name"
  );
  anyhow::ensure!(
    !config.reporter.default_labels.contains_key(""),
    "reporter.default_labels must not contain an empty label name"
  );

  Ok(())
}
