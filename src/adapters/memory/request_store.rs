//! In-memory RequestStore.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ModuleRequestId, OrganizationId};
use crate::domain::licensing::ModuleRequest;
use crate::ports::RequestStore;

#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<ModuleRequestId, ModuleRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: &ModuleRequest) -> Result<(), DomainError> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn find(&self, id: &ModuleRequestId) -> Result<Option<ModuleRequest>, DomainError> {
        Ok(self.requests.read().await.get(id).cloned())
    }

    async fn mark_reviewed(&self, request: &ModuleRequest) -> Result<bool, DomainError> {
        // Check and write under one write guard.
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            Some(stored) if stored.is_pending() => {
                stored.status = request.status;
                stored.reviewed_by = request.reviewed_by.clone();
                stored.review_notes = request.review_notes.clone();
                stored.reviewed_at = request.reviewed_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_pending(&self) -> Result<Vec<ModuleRequest>, DomainError> {
        let requests = self.requests.read().await;
        let mut pending: Vec<ModuleRequest> =
            requests.values().filter(|r| r.is_pending()).cloned().collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ModuleRequest>, DomainError> {
        let requests = self.requests.read().await;
        let mut listed: Vec<ModuleRequest> = requests
            .values()
            .filter(|r| &r.organization_id == organization_id)
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::licensing::{ModuleCode, RequestType, ReviewDecision};

    fn request(org: &str, created_at: Timestamp) -> ModuleRequest {
        ModuleRequest::new(
            OrganizationId::new(org).unwrap(),
            UserId::new("requester").unwrap(),
            ModuleCode::new("meter_reading").unwrap(),
            RequestType::Trial,
            created_at,
        )
    }

    #[tokio::test]
    async fn mark_reviewed_succeeds_once() {
        let store = InMemoryRequestStore::new();
        let pending = request("org-a", Timestamp::now());
        store.insert(&pending).await.unwrap();

        let mut approved = pending.clone();
        approved
            .review(UserId::new("r1").unwrap(), ReviewDecision::Approved, None, Timestamp::now())
            .unwrap();
        let mut rejected = pending.clone();
        rejected
            .review(UserId::new("r2").unwrap(), ReviewDecision::Rejected, None, Timestamp::now())
            .unwrap();

        assert!(store.mark_reviewed(&approved).await.unwrap());
        assert!(!store.mark_reviewed(&rejected).await.unwrap());

        let stored = store.find(&pending.id).await.unwrap().unwrap();
        assert_eq!(stored.reviewed_by.unwrap().as_str(), "r1");
    }

    #[tokio::test]
    async fn mark_reviewed_of_unknown_request_is_false() {
        let store = InMemoryRequestStore::new();
        let mut request = request("org-a", Timestamp::now());
        request
            .review(UserId::system(), ReviewDecision::Approved, None, Timestamp::now())
            .unwrap();
        assert!(!store.mark_reviewed(&request).await.unwrap());
    }

    #[tokio::test]
    async fn organization_listing_is_newest_first() {
        let store = InMemoryRequestStore::new();
        let t0 = Timestamp::now();
        let older = request("org-a", t0);
        let newer = request("org-a", t0.plus_secs(60));
        let other = request("org-b", t0);
        for r in [&older, &newer, &other] {
            store.insert(r).await.unwrap();
        }

        let listed = store
            .list_for_organization(&OrganizationId::new("org-a").unwrap())
            .await
            .unwrap();

        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
        assert_eq!(store.list_pending().await.unwrap().len(), 3);
    }
}
