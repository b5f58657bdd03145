//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the licensing engine and the outside world. Adapters implement these ports.
//!
//! - `Clock` - Source of the current instant
//! - `LicenseStore` - Keyed License rows with upsert as the only write
//! - `RequestStore` - Append-only module requests with a guarded review write
//! - `UsageStore` - Daily usage snapshots
//! - `EventPublisher` - Access-log and notification events

mod clock;
mod event_publisher;
mod license_store;
mod request_store;
mod usage_store;

pub use clock::{Clock, MockClock, SystemClock};
pub use event_publisher::EventPublisher;
pub use license_store::LicenseStore;
pub use request_store::RequestStore;
pub use usage_store::UsageStore;
