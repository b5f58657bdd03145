//! In-memory UsageStore.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, OrganizationId};
use crate::domain::licensing::{ModuleCode, UsageRecord};
use crate::ports::UsageStore;

type UsageKey = (OrganizationId, ModuleCode, NaiveDate);

#[derive(Debug, Default)]
pub struct InMemoryUsageStore {
    records: RwLock<BTreeMap<UsageKey, UsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn upsert(&self, record: &UsageRecord) -> Result<(), DomainError> {
        let key = (
            record.organization_id.clone(),
            record.module_code.clone(),
            record.day,
        );
        self.records.write().await.insert(key, record.clone());
        Ok(())
    }

    async fn list(
        &self,
        organization_id: &OrganizationId,
        module_code: Option<&ModuleCode>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let records = self.records.read().await;
        let mut listed: Vec<UsageRecord> = records
            .values()
            .filter(|r| &r.organization_id == organization_id)
            .filter(|r| module_code.map_or(true, |code| &r.module_code == code))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.day.cmp(&a.day).then_with(|| a.module_code.cmp(&b.module_code)));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn latest_per_module(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let records = self.records.read().await;
        let mut latest: BTreeMap<ModuleCode, UsageRecord> = BTreeMap::new();
        // Keys sort by day within a module, so the last write wins.
        for record in records.values().filter(|r| &r.organization_id == organization_id) {
            latest.insert(record.module_code.clone(), record.clone());
        }
        Ok(latest.into_values().collect())
    }
}
