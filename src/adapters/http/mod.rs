//! HTTP adapters - REST API implementations.

pub mod licensing;

// Re-export key types for convenience
pub use licensing::licensing_router;
pub use licensing::LicensingAppState;
