//! prom-reporter - Library Root
//!
//! Prometheus metrics core: a named registry with text exposition, a
//! lazy-creating recording facade, a Pushgateway client and a
//! process-wide reporter. Re-exports all modules for integration tests
//! and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod usecases;

pub use adapters::metrics::MetricRegistry;
pub use config::{MetricsConfig, ReporterOptions};
pub use domain::{LabelSet, MetricKind};
pub use error::{MetricsError, Result};
pub use usecases::{MetricsModule, MetricsService, PushClient, PushResponse, Reporter, reporter};
