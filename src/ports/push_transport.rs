//! Push Transport Port - Delivery of Exposition Payloads to a Gateway
//!
//! The push client serializes the registry and hands a `PushRequest` to
//! a `PushTransport`. The HTTP adapter talks to a real Prometheus
//! Pushgateway; tests substitute mocks to script failures.
//!
//! Key design decisions:
//! - Transport failures are typed (`PushTransportError`) but never
//!   escape the push client; they become a `PushResponse`
//! - No retries at this layer; callers re-invoke push on a schedule

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::labels::LabelSet;

/// How the gateway should merge the pushed metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMethod {
  /// POST: replace only metrics with the same names in the group.
  Add,
  /// PUT: replace every metric in the group.
  Replace,
  /// DELETE: drop the whole group.
  Delete,
}

impl PushMethod {
  /// HTTP verb used for this method.
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Add => "POST",
      Self::Replace => "PUT",
      Self::Delete => "DELETE",
    }
  }
}

/// A single push to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
  /// Merge semantics.
  pub method: PushMethod,
  /// Job name (first grouping key).
  pub job: String,
  /// Additional grouping key labels.
  pub grouping: LabelSet,
  /// Text exposition payload; empty for deletes.
  pub body: Vec<u8>,
}

/// Why a push failed.
#[derive(Debug, Error)]
pub enum PushTransportError {
  /// The request could not be sent or the connection failed.
  #[error("{0}")]
  Request(String),

  /// No response within the configured timeout.
  #[error("push gateway request timed out after {0:?}")]
  Timeout(Duration),

  /// The gateway answered with a non-2xx status.
  #[error("push gateway responded with status {status}: {body}")]
  Status {
    /// HTTP status code.
    status: u16,
    /// Response body, possibly empty.
    body: String,
  },

  /// The configured URL cannot carry a job path, or the job is empty.
  #[error("invalid push gateway URL `{url}`: {reason}")]
  InvalidUrl {
    /// Configured URL.
    url: String,
    /// Parser message.
    reason: String,
  },

  /// The configured request timeout is zero.
  #[error("push gateway timeout must be positive")]
  InvalidTimeout,

  /// A configured extra header is not valid HTTP.
  #[error("invalid push gateway header `{name}`: {reason}")]
  InvalidHeader {
    /// Header name as configured.
    name: String,
    /// Parser message.
    reason: String,
  },
}

/// Delivers push requests to a gateway.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
  /// Send one request.
  ///
  /// # Errors
  /// Any failure to deliver the payload or a non-2xx answer.
  async fn send(&self, request: PushRequest) -> Result<(), PushTransportError>;
}
