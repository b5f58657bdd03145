//! Daily usage counters.
//!
//! Purely observational. Nothing here feeds back into entitlement.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrganizationId, Timestamp};

use super::{License, ModuleCode};

/// Absolute snapshot of one day's usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    #[serde(default)]
    pub active_users: u32,
    #[serde(default)]
    pub transactions: u64,
    #[serde(default)]
    pub api_calls: u64,
    /// Bytes.
    #[serde(default)]
    pub storage_used: u64,
}

/// One row per (organization, module, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub organization_id: OrganizationId,
    pub module_code: ModuleCode,
    pub day: NaiveDate,
    pub counters: UsageCounters,
    pub recorded_at: Timestamp,
}

/// Active users above a License's soft cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftLimitWarning {
    pub organization_id: OrganizationId,
    pub module_code: ModuleCode,
    pub day: NaiveDate,
    pub active_users: u32,
    pub max_users: u32,
}

impl UsageRecord {
    /// Compares this record against the License's `max_users`, if any.
    pub fn soft_limit_warning(&self, license: &License) -> Option<SoftLimitWarning> {
        let max_users = license.max_users?;
        if license.module_code != self.module_code
            || license.organization_id != self.organization_id
            || self.counters.active_users <= max_users
        {
            return None;
        }
        Some(SoftLimitWarning {
            organization_id: self.organization_id.clone(),
            module_code: self.module_code.clone(),
            day: self.day,
            active_users: self.counters.active_users,
            max_users,
        })
    }
}
