//! UsageTracker - daily usage snapshots and soft-limit warnings.
//!
//! Observational only. Nothing recorded here changes an entitlement
//! decision.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::foundation::OrganizationId;
use crate::domain::licensing::{
    Catalog, LicensingError, ModuleCode, SoftLimitWarning, UsageCounters, UsageRecord,
};
use crate::ports::{Clock, LicenseStore, UsageStore};

/// Rows returned by [`UsageTracker::get_usage`] when not configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

#[derive(Debug, Clone)]
pub struct TrackUsageCommand {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub day: NaiveDate,
    pub counters: UsageCounters,
}

pub struct UsageTracker {
    usage: Arc<dyn UsageStore>,
    licenses: Arc<dyn LicenseStore>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    history_limit: usize,
}

impl UsageTracker {
    pub fn new(
        usage: Arc<dyn UsageStore>,
        licenses: Arc<dyn LicenseStore>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            usage,
            licenses,
            catalog,
            clock,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Stores the day's counters, replacing any earlier snapshot for the
    /// same day.
    ///
    /// # Errors
    ///
    /// `InvalidModule` for a code missing from the catalog.
    pub async fn track(&self, cmd: TrackUsageCommand) -> Result<UsageRecord, LicensingError> {
        let module = self.catalog.modules().lookup(&cmd.module_code)?;
        let record = UsageRecord {
            organization_id: cmd.organization_id,
            module_code: module.code.clone(),
            day: cmd.day,
            counters: cmd.counters,
            recorded_at: self.clock.now(),
        };
        self.usage.upsert(&record).await?;

        info!(
            organization_id = %record.organization_id,
            module_code = %record.module_code,
            day = %record.day,
            active_users = record.counters.active_users,
            "Usage recorded"
        );
        Ok(record)
    }

    /// Recent rows, newest day first.
    pub async fn get_usage(
        &self,
        organization_id: &OrganizationId,
        module_code: Option<&str>,
    ) -> Result<Vec<UsageRecord>, LicensingError> {
        let module_code: Option<ModuleCode> = module_code
            .map(|code| self.catalog.modules().lookup(code).map(|m| m.code.clone()))
            .transpose()?;
        let records = self
            .usage
            .list(organization_id, module_code.as_ref(), self.history_limit)
            .await?;
        debug!(organization_id = %organization_id, rows = records.len(), "Usage listed");
        Ok(records)
    }

    /// Modules whose latest snapshot exceeds the License's `max_users`.
    pub async fn warnings(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<SoftLimitWarning>, LicensingError> {
        let licenses: HashMap<ModuleCode, _> = self
            .licenses
            .list_for_organization(organization_id)
            .await?
            .into_iter()
            .filter(|l| l.max_users.is_some())
            .map(|l| (l.module_code.clone(), l))
            .collect();
        if licenses.is_empty() {
            return Ok(Vec::new());
        }

        let latest = self.usage.latest_per_module(organization_id).await?;
        Ok(latest
            .iter()
            .filter_map(|record| {
                licenses
                    .get(&record.module_code)
                    .and_then(|license| record.soft_limit_warning(license))
            })
            .collect())
    }
}
