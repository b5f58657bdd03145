//! License store port.
//!
//! A durable mapping keyed by (organization, module). Writes are upserts
//! keyed by that pair; rows are never deleted.
//!
//! # Concurrency
//!
//! The lifecycle manager serializes writes per key before calling
//! [`LicenseStore::upsert`]. Implementations must still write the whole row
//! atomically so a reader never sees a torn record.
//!
//! [`LicenseStore::insert_unless_live`] decides and writes in one atomic
//! step, so two processes sharing a store cannot both start a trial.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrganizationId, Timestamp};
use crate::domain::licensing::{GracePolicy, License, LicenseKey};

#[async_trait]
pub trait LicenseStore: Send + Sync {
    /// Snapshot of one row, `None` if the pair was never licensed.
    async fn get(&self, key: &LicenseKey) -> Result<Option<License>, DomainError>;

    /// Insert-or-replace keyed by `license.key()`.
    async fn upsert(&self, license: &License) -> Result<(), DomainError>;

    /// Writes `license` only when its key holds no row that is live at
    /// `now` under `grace`: the row is absent, cancelled, or past its grace
    /// window.
    ///
    /// Returns `false`, leaving the stored row untouched, when a live row
    /// blocked the write.
    async fn insert_unless_live(
        &self,
        license: &License,
        now: Timestamp,
        grace: &GracePolicy,
    ) -> Result<bool, DomainError>;

    /// Every row for the organization, ordered by module code.
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<License>, DomainError>;

    /// Non-cancelled rows with `from < expires_at <= to`, soonest first.
    async fn list_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<License>, DomainError>;
}
