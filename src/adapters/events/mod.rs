//! Event publisher adapters.
//!
//! - `InMemoryEventBus` - Captures envelopes for tests
//! - `TracingEventPublisher` - Access log on the `licensing::audit` target
//! - `FanOutPublisher` - Delivers to several publishers
//!
//! The durable audit table lives with the other Postgres adapters.

mod fan_out;
mod in_memory;
mod tracing_publisher;

pub use fan_out::FanOutPublisher;
pub use in_memory::InMemoryEventBus;
pub use tracing_publisher::TracingEventPublisher;
