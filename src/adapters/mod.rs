//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the licensing engine to external systems:
//! - `memory` - In-process stores
//! - `postgres` - PostgreSQL stores and the audit log
//! - `events` - Event publishers (in-memory, tracing, fan-out)
//! - `http` - Axum REST API

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;

pub use events::{FanOutPublisher, InMemoryEventBus, TracingEventPublisher};
pub use memory::{InMemoryLicenseStore, InMemoryRequestStore, InMemoryUsageStore};
