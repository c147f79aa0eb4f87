//! Metrics Adapters
//!
//! Prometheus-backed instruments, the named registry with text
//! exposition, the summary collector, and the axum scrape server.

pub mod instrument;
pub mod registry;
pub mod server;
pub mod summary;

pub use instrument::Instrument;
pub use registry::{MetricRegistry, RegistryOptions, TEXT_CONTENT_TYPE};
pub use server::MetricsServer;
pub use summary::SummaryVec;
