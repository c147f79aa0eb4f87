//! Push Gateway Adapters
//!
//! HTTP implementation of the `PushTransport` port.

pub mod http;

pub use http::HttpPushTransport;
