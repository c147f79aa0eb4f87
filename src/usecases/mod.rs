//! Use Cases Layer - Application-Facing Metrics API
//!
//! Orchestrates the registry and the push transport port into the
//! operations applications call.
//!
//! Use cases:
//! - `MetricsService`: Lazy-creating counter/gauge/histogram/summary facade
//! - `PushClient`: Push-add, replace and delete against a Pushgateway
//! - `Reporter`: Fire-and-forget facade plus the process-wide instance
//! - `MetricsModule`: Sync/async bootstrap wiring all of the above

pub mod metrics_service;
pub mod module;
pub mod push_client;
pub mod reporter;

pub use metrics_service::MetricsService;
pub use module::MetricsModule;
pub use push_client::{PushClient, PushResponse};
pub use reporter::Reporter;
