//! In-memory LicenseStore.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, OrganizationId, Timestamp};
use crate::domain::licensing::{GracePolicy, License, LicenseKey, LicenseStatus};
use crate::ports::LicenseStore;

/// License rows keyed by (organization, module).
///
/// A `BTreeMap` keeps per-organization listings ordered by module code.
#[derive(Debug, Default)]
pub struct InMemoryLicenseStore {
    rows: RwLock<BTreeMap<LicenseKey, License>>,
}

impl InMemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds rows directly, bypassing the lifecycle manager.
    pub async fn with_licenses(licenses: impl IntoIterator<Item = License>) -> Self {
        let store = Self::new();
        {
            let mut rows = store.rows.write().await;
            for license in licenses {
                rows.insert(license.key(), license);
            }
        }
        store
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl LicenseStore for InMemoryLicenseStore {
    async fn get(&self, key: &LicenseKey) -> Result<Option<License>, DomainError> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn upsert(&self, license: &License) -> Result<(), DomainError> {
        self.rows
            .write()
            .await
            .insert(license.key(), license.clone());
        Ok(())
    }

    async fn insert_unless_live(
        &self,
        license: &License,
        now: Timestamp,
        grace: &GracePolicy,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.write().await;
        let key = license.key();
        let vacant = rows
            .get(&key)
            .map_or(true, |existing| !existing.is_live(now, grace));
        if vacant {
            rows.insert(key, license.clone());
        }
        Ok(vacant)
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<License>, DomainError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|l| &l.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<License>, DomainError> {
        let rows = self.rows.read().await;
        let mut expiring: Vec<License> = rows
            .values()
            .filter(|l| l.status != LicenseStatus::Cancelled)
            .filter(|l| matches!(l.expires_at, Some(e) if e > from && e <= to))
            .cloned()
            .collect();
        expiring.sort_by_key(|l| l.expires_at);
        Ok(expiring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::licensing::{ModuleCode, ModuleTier};
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn license(org: &str, module: &str, expires_in_days: Option<i64>) -> License {
        License::activated(
            LicenseKey::new(
                OrganizationId::new(org).unwrap(),
                ModuleCode::new(module).unwrap(),
            ),
            ModuleTier::Standard,
            UserId::system(),
            t0(),
            expires_in_days.map(|d| t0().add_days(d)),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_replaces_the_row_for_a_key() {
        let store = InMemoryLicenseStore::new();
        let first = license("org-a", "meter_reading", Some(10));
        let second = license("org-a", "meter_reading", Some(20));

        store.upsert(&first).await.unwrap();
        store.upsert(&second).await.unwrap();

        assert_eq!(store.len().await, 1);
        let stored = store.get(&first.key()).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, Some(t0().add_days(20)));
    }

    #[tokio::test]
    async fn insert_unless_live_refuses_a_live_row() {
        let existing = license("org-a", "meter_reading", Some(10));
        let store = InMemoryLicenseStore::with_licenses([existing.clone()]).await;
        let replacement = license("org-a", "meter_reading", Some(40));

        // Expired on day 10, grace runs to day 17.
        let written = store
            .insert_unless_live(&replacement, t0().add_days(12), &GracePolicy::default())
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(store.get(&existing.key()).await.unwrap(), Some(existing));
    }

    #[tokio::test]
    async fn insert_unless_live_writes_over_absent_lapsed_and_cancelled_rows() {
        let mut cancelled = license("org-c", "meter_reading", None);
        cancelled.cancel(UserId::system(), t0());
        let store = InMemoryLicenseStore::with_licenses([
            license("org-b", "meter_reading", Some(10)),
            cancelled,
        ])
        .await;

        for org in ["org-a", "org-b", "org-c"] {
            let fresh = license(org, "meter_reading", Some(60));
            let written = store
                .insert_unless_live(&fresh, t0().add_days(20), &GracePolicy::default())
                .await
                .unwrap();
            assert!(written, "{}", org);
            assert_eq!(store.get(&fresh.key()).await.unwrap(), Some(fresh));
        }
    }

    #[tokio::test]
    async fn insert_unless_live_never_replaces_a_perpetual_row() {
        let perpetual = license("org-a", "meter_reading", None);
        let store = InMemoryLicenseStore::with_licenses([perpetual.clone()]).await;

        let written = store
            .insert_unless_live(
                &license("org-a", "meter_reading", Some(30)),
                t0().add_days(900),
                &GracePolicy::default(),
            )
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(store.get(&perpetual.key()).await.unwrap(), Some(perpetual));
    }

    #[tokio::test]
    async fn lists_only_the_requested_organization() {
        let store = InMemoryLicenseStore::with_licenses([
            license("org-a", "meter_reading", None),
            license("org-a", "document_management", None),
            license("org-b", "meter_reading", None),
        ])
        .await;

        let listed = store
            .list_for_organization(&OrganizationId::new("org-a").unwrap())
            .await
            .unwrap();

        let codes: Vec<&str> = listed.iter().map(|l| l.module_code.as_str()).collect();
        assert_eq!(codes, vec!["document_management", "meter_reading"]);
    }

    #[tokio::test]
    async fn expiring_window_is_half_open_and_skips_cancelled() {
        let mut cancelled = license("org-c", "meter_reading", Some(5));
        cancelled.cancel(UserId::system(), t0());
        let store = InMemoryLicenseStore::with_licenses([
            license("org-a", "meter_reading", Some(5)),
            license("org-b", "meter_reading", Some(10)),
            license("org-d", "meter_reading", Some(11)),
            license("org-e", "meter_reading", None),
            cancelled,
        ])
        .await;

        let expiring = store
            .list_expiring_between(t0().add_days(5), t0().add_days(10))
            .await
            .unwrap();

        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].organization_id.as_str(), "org-b");
    }
}
