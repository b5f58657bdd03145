//! PostgreSQL adapters - Database implementations for the store ports.
//!
//! - `PostgresLicenseStore` - `organization_modules`, upsert keyed by (org, module)
//! - `PostgresRequestStore` - `module_requests`, pending-only review update
//! - `PostgresUsageStore` - `module_usage`, upsert keyed by (org, module, day)
//! - `PostgresAuditLog` - `licensing_audit_log`, append-only event sink
//!
//! Schema lives in `migrations/` and is applied with [`run_migrations`].

mod audit_log;
mod license_store;
mod request_store;
mod usage_store;

use std::fmt;

use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode};

pub use audit_log::PostgresAuditLog;
pub use license_store::PostgresLicenseStore;
pub use request_store::PostgresRequestStore;
pub use usage_store::PostgresUsageStore;

/// Applies the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Migration failed: {}", e)))
}

fn db_error(context: &str, err: sqlx::Error) -> DomainError {
    DomainError::database(format!("{}: {}", context, err))
}

/// A stored value the domain refuses to load.
fn corrupt(err: impl fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Corrupt row: {}", err))
}
