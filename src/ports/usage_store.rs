//! Usage store port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, OrganizationId};
use crate::domain::licensing::{ModuleCode, UsageRecord};

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Insert-or-replace keyed by (organization, module, day).
    async fn upsert(&self, record: &UsageRecord) -> Result<(), DomainError>;

    /// Rows newest day first, at most `limit`.
    async fn list(
        &self,
        organization_id: &OrganizationId,
        module_code: Option<&ModuleCode>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, DomainError>;

    /// The most recent row of each module the organization has usage for.
    async fn latest_per_module(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<UsageRecord>, DomainError>;
}
