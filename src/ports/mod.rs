//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `PushTransport`: Delivery of exposition payloads to a push gateway

pub mod push_transport;

pub use push_transport::{PushMethod, PushRequest, PushTransport, PushTransportError};
