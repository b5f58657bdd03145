//! In-process store adapters.
//!
//! Used when no database is configured and by the integration tests.
//! State lives behind `tokio::sync::RwLock` and is lost on restart.

mod license_store;
mod request_store;
mod usage_store;

pub use license_store::InMemoryLicenseStore;
pub use request_store::InMemoryRequestStore;
pub use usage_store::InMemoryUsageStore;
