//! Metrics Module - Bootstrap of Registry, Service and Push Client
//!
//! Construction is two-phase: resolve a `MetricsConfig` (directly with
//! `for_root`, or by awaiting a factory with `for_root_async`), then
//! build every handle from it in `from_config`. Both entry points yield
//! identically behaving modules.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::adapters::metrics::{MetricRegistry, server};
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::usecases::metrics_service::MetricsService;
use crate::usecases::push_client::PushClient;

/// Wired metrics handles shared by the application.
#[derive(Debug, Clone)]
pub struct MetricsModule {
  registry: Arc<MetricRegistry>,
  service: MetricsService,
  push_client: PushClient,
}

impl MetricsModule {
  /// Build the module from a resolved configuration.
  ///
  /// # Errors
  /// Invalid default labels, a failing process collector, or invalid
  /// push gateway settings.
  pub fn from_config(config: &MetricsConfig) -> Result<Self> {
    let registry = Arc::new(MetricRegistry::with_options(config.registry_options())?);
    let service = MetricsService::new(Arc::clone(&registry));
    let push_client = PushClient::from_config(Arc::clone(&registry), config)?;

    info!(
      default_labels = config.default_labels.len(),
      builtin_metrics = config.default_metrics_enabled,
      push_enabled = push_client.is_enabled(),
      "Metrics module initialized"
    );

    Ok(Self {
      registry,
      service,
      push_client,
    })
  }

  /// Build the module from a configuration known up front.
  ///
  /// # Errors
  /// See `from_config`.
  pub fn for_root(config: MetricsConfig) -> Result<Self> {
    Self::from_config(&config)
  }

  /// Build the module once `factory` has produced the configuration.
  ///
  /// # Errors
  /// See `from_config`.
  pub async fn for_root_async<F, Fut>(factory: F) -> Result<Self>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = MetricsConfig>,
  {
    let config = factory().await;
    Self::from_config(&config)
  }

  /// Shared registry.
  pub fn registry(&self) -> &Arc<MetricRegistry> {
    &self.registry
  }

  /// Lazy-creating recording service.
  pub fn service(&self) -> &MetricsService {
    &self.service
  }

  /// Push gateway client (disabled when no URL is configured).
  pub fn push_client(&self) -> &PushClient {
    &self.push_client
  }

  /// Scrape routes (`/metrics`, `/live`) for mounting in an axum app.
  pub fn router(&self) -> Router {
    server::router(Arc::clone(&self.registry))
  }
}
