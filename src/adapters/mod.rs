//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` and wraps the
//! external libraries (Prometheus client, axum, reqwest). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus-backed registry, instruments and scrape server
//! - `push`: Pushgateway HTTP transport

pub mod metrics;
pub mod push;
