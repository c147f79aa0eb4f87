//! Domain layer - Metric vocabulary and pure algorithms.
//!
//! Label sets, instrument kinds with their default layouts, and the
//! streaming quantile estimator. Nothing here touches the Prometheus
//! library or the network, so every type is testable in isolation.

pub mod instrument;
pub mod labels;
pub mod quantile;

// Re-export core types for convenience
pub use instrument::{DEFAULT_BUCKETS, DEFAULT_QUANTILES, MetricKind};
pub use labels::{LabelSet, LabelValue};
pub use quantile::TargetedQuantiles;
