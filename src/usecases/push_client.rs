//! Push Client - Pushgateway Delivery with Status Responses
//!
//! Renders the registry and hands it to a `PushTransport`. Push never
//! fails from the caller's point of view: every outcome is a
//! `PushResponse`.
//!
//! Response mapping:
//! - 200 / success when the gateway accepted the payload
//! - 500 / failure with the error text on any transport or render error
//! - 400 / failure when no gateway URL was configured (no I/O happens)

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::adapters::metrics::MetricRegistry;
use crate::adapters::push::HttpPushTransport;
use crate::config::MetricsConfig;
use crate::domain::labels::LabelSet;
use crate::error::Result;
use crate::ports::push_transport::{PushMethod, PushRequest, PushTransport};

/// Message returned when pushing without a configured gateway.
pub const NOT_CONFIGURED_MESSAGE: &str = "Pushgateway is not configured";

/// Outcome of a push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushResponse {
  /// HTTP-like status: 200, 400 or 500.
  pub status: u16,
  /// Whether the gateway accepted the request.
  pub success: bool,
  /// Failure description, absent on success.
  pub message: Option<String>,
}

impl PushResponse {
  /// Accepted by the gateway.
  pub const fn ok() -> Self {
    Self {
      status: 200,
      success: true,
      message: None,
    }
  }

  /// Delivery failed.
  pub fn failed(message: impl Into<String>) -> Self {
    Self {
      status: 500,
      success: false,
      message: Some(message.into()),
    }
  }

  /// Pushing is disabled.
  pub fn not_configured() -> Self {
    Self {
      status: 400,
      success: false,
      message: Some(NOT_CONFIGURED_MESSAGE.to_string()),
    }
  }
}

/// Pushes the registry's current state to a Pushgateway.
#[derive(Clone)]
pub struct PushClient {
  /// Registry whose exposition is pushed.
  registry: Arc<MetricRegistry>,
  /// Gateway transport; `None` disables pushing.
  transport: Option<Arc<dyn PushTransport>>,
}

impl PushClient {
  /// Create a client pushing through `transport`.
  pub fn new(registry: Arc<MetricRegistry>, transport: Arc<dyn PushTransport>) -> Self {
    Self {
      registry,
      transport: Some(transport),
    }
  }

  /// Create a client that answers every push with 400.
  pub fn disabled(registry: Arc<MetricRegistry>) -> Self {
    Self {
      registry,
      transport: None,
    }
  }

  /// Create a client from the metrics configuration.
  ///
  /// # Errors
  /// `PushConfig` if the gateway URL or headers are invalid.
  pub fn from_config(registry: Arc<MetricRegistry>, config: &MetricsConfig) -> Result<Self> {
    match &config.pushgateway_url {
      Some(url) => {
        let transport = HttpPushTransport::new(url, &config.pushgateway_options)?;
        debug!(url = %url, "Push gateway client configured");
        Ok(Self::new(registry, Arc::new(transport)))
      }
      None => Ok(Self::disabled(registry)),
    }
  }

  /// Whether a gateway is configured.
  pub fn is_enabled(&self) -> bool {
    self.transport.is_some()
  }

  /// Push-add (POST) the registry under `job`.
  pub async fn push(&self, job: &str) -> PushResponse {
    self.send(PushMethod::Add, job, LabelSet::new()).await
  }

  /// Push-add (POST) under `job` with extra grouping labels.
  pub async fn push_with_grouping(&self, job: &str, grouping: &LabelSet) -> PushResponse {
    self.send(PushMethod::Add, job, grouping.clone()).await
  }

  /// Replace (PUT) every metric in the `job` group.
  pub async fn replace(&self, job: &str) -> PushResponse {
    self.send(PushMethod::Replace, job, LabelSet::new()).await
  }

  /// Delete the `job` group from the gateway.
  pub async fn delete(&self, job: &str) -> PushResponse {
    self.send(PushMethod::Delete, job, LabelSet::new()).await
  }

  #[instrument(skip(self, method, grouping), fields(method = method.as_str()))]
  async fn send(&self, method: PushMethod, job: &str, grouping: LabelSet) -> PushResponse {
    let Some(transport) = &self.transport else {
      debug!("Push skipped: no gateway configured");
      return PushResponse::not_configured();
    };

    let body = if method == PushMethod::Delete {
      Vec::new()
    } else {
      match self.registry.render() {
        Ok(text) => text.into_bytes(),
        Err(e) => {
          warn!(error = %e, "Failed to render metrics for push");
          return PushResponse::failed(e.to_string());
        }
      }
    };

    let request = PushRequest {
      method,
      job: job.to_string(),
      grouping,
      body,
    };
    match transport.send(request).await {
      Ok(()) => {
        debug!("Metrics pushed");
        PushResponse::ok()
      }
      Err(e) => {
        warn!(error = %e, "Push to gateway failed");
        PushResponse::failed(e.to_string())
      }
    }
  }
}

impl std::fmt::Debug for PushClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PushClient")
      .field("enabled", &self.is_enabled())
      .finish_non_exhaustive()
  }
}
