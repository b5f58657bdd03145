//! Module request store port.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ModuleRequestId, OrganizationId};
use crate::domain::licensing::ModuleRequest;

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Appends a new request.
    async fn insert(&self, request: &ModuleRequest) -> Result<(), DomainError>;

    async fn find(&self, id: &ModuleRequestId) -> Result<Option<ModuleRequest>, DomainError>;

    /// Persists the review fields of `request`, but only while the stored
    /// row is still `pending`.
    ///
    /// Returns `false` when another review got there first; nothing is
    /// written in that case.
    async fn mark_reviewed(&self, request: &ModuleRequest) -> Result<bool, DomainError>;

    /// Pending requests across all organizations, oldest first.
    async fn list_pending(&self) -> Result<Vec<ModuleRequest>, DomainError>;

    /// All requests of one organization, newest first.
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ModuleRequest>, DomainError>;
}
