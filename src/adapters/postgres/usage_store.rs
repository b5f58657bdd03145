//! PostgreSQL implementation of UsageStore.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, OrganizationId, Timestamp};
use crate::domain::licensing::{ModuleCode, UsageCounters, UsageRecord};
use crate::ports::UsageStore;

use super::{corrupt, db_error};

pub struct PostgresUsageStore {
    pool: PgPool,
}

impl PostgresUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    organization_id: String,
    module_code: String,
    usage_date: NaiveDate,
    active_users: i32,
    transactions: i64,
    api_calls: i64,
    storage_used: i64,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(UsageRecord {
            organization_id: OrganizationId::new(row.organization_id).map_err(corrupt)?,
            module_code: ModuleCode::new(row.module_code).map_err(corrupt)?,
            day: row.usage_date,
            counters: UsageCounters {
                active_users: u32::try_from(row.active_users).map_err(corrupt)?,
                transactions: u64::try_from(row.transactions).map_err(corrupt)?,
                api_calls: u64::try_from(row.api_calls).map_err(corrupt)?,
                storage_used: u64::try_from(row.storage_used).map_err(corrupt)?,
            },
            recorded_at: Timestamp::from_datetime(row.recorded_at),
        })
    }
}

fn to_column<T: TryInto<i64>>(field: &str, value: T) -> Result<i64, DomainError> {
    value
        .try_into()
        .map_err(|_| DomainError::validation(field, "exceeds the storable range"))
}

#[async_trait]
impl UsageStore for PostgresUsageStore {
    async fn upsert(&self, record: &UsageRecord) -> Result<(), DomainError> {
        let counters = &record.counters;
        let active_users = i32::try_from(counters.active_users)
            .map_err(|_| DomainError::validation("active_users", "exceeds the storable range"))?;

        sqlx::query(
            r#"
            INSERT INTO module_usage (
                organization_id, module_code, usage_date, active_users, transactions,
                api_calls, storage_used, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (organization_id, module_code, usage_date) DO UPDATE SET
                active_users = EXCLUDED.active_users,
                transactions = EXCLUDED.transactions,
                api_calls = EXCLUDED.api_calls,
                storage_used = EXCLUDED.storage_used,
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(record.organization_id.as_str())
        .bind(record.module_code.as_str())
        .bind(record.day)
        .bind(active_users)
        .bind(to_column("transactions", counters.transactions)?)
        .bind(to_column("api_calls", counters.api_calls)?)
        .bind(to_column("storage_used", counters.storage_used)?)
        .bind(record.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record usage", e))?;

        Ok(())
    }

    async fn list(
        &self,
        organization_id: &OrganizationId,
        module_code: Option<&ModuleCode>,
        limit: usize,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT organization_id, module_code, usage_date, active_users, transactions,
                   api_calls, storage_used, recorded_at
            FROM module_usage
            WHERE organization_id = $1 AND ($2::TEXT IS NULL OR module_code = $2)
            ORDER BY usage_date DESC, module_code
            LIMIT $3
            "#,
        )
        .bind(organization_id.as_str())
        .bind(module_code.map(ModuleCode::as_str))
        .bind(to_column("limit", limit)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list usage", e))?;

        rows.into_iter().map(UsageRecord::try_from).collect()
    }

    async fn latest_per_module(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT ON (module_code)
                   organization_id, module_code, usage_date, active_users, transactions,
                   api_calls, storage_used, recorded_at
            FROM module_usage
            WHERE organization_id = $1
            ORDER BY module_code, usage_date DESC
            "#,
        )
        .bind(organization_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to load latest usage", e))?;

        rows.into_iter().map(UsageRecord::try_from).collect()
    }
}
