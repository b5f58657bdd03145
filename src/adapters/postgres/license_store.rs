//! PostgreSQL implementation of LicenseStore.
//!
//! One row per (organization_id, module_code). The only write is
//! `INSERT ... ON CONFLICT DO UPDATE`, so a write never needs a prior read
//! and the row is replaced as a whole. Trials add a `WHERE` to the conflict
//! arm so a live row is never replaced, even across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

use crate::domain::foundation::{DomainError, OrganizationId, Timestamp, UserId};
use crate::domain::licensing::{GracePolicy, License, LicenseKey, ModuleCode};
use crate::ports::LicenseStore;

use super::{corrupt, db_error};

pub struct PostgresLicenseStore {
    pool: PgPool,
}

impl PostgresLicenseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT organization_id, module_code, status, tier, activated_at, activated_by,
           expires_at, max_users, updated_at, updated_by
    FROM organization_modules
"#;

const UPSERT: &str = r#"
    INSERT INTO organization_modules (
        organization_id, module_code, status, tier, activated_at, activated_by,
        expires_at, max_users, updated_at, updated_by
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (organization_id, module_code) DO UPDATE SET
        status = EXCLUDED.status,
        tier = EXCLUDED.tier,
        activated_at = EXCLUDED.activated_at,
        activated_by = EXCLUDED.activated_by,
        expires_at = EXCLUDED.expires_at,
        max_users = EXCLUDED.max_users,
        updated_at = EXCLUDED.updated_at,
        updated_by = EXCLUDED.updated_by
"#;

/// Binds `license` to the ten columns of [`UPSERT`].
fn bind_license<'q>(
    sql: &'q str,
    license: &'q License,
) -> Result<Query<'q, Postgres, PgArguments>, DomainError> {
    let max_users = license
        .max_users
        .map(i32::try_from)
        .transpose()
        .map_err(|_| DomainError::validation("max_users", "exceeds the storable range"))?;

    Ok(sqlx::query(sql)
        .bind(license.organization_id.as_str())
        .bind(license.module_code.as_str())
        .bind(license.status.as_str())
        .bind(license.tier.as_str())
        .bind(license.activated_at.as_datetime())
        .bind(license.activated_by.as_str())
        .bind(license.expires_at.map(|t| *t.as_datetime()))
        .bind(max_users)
        .bind(license.updated_at.as_datetime())
        .bind(license.updated_by.as_str()))
}

/// Database row representation of a License.
#[derive(Debug, sqlx::FromRow)]
struct LicenseRow {
    organization_id: String,
    module_code: String,
    status: String,
    tier: String,
    activated_at: DateTime<Utc>,
    activated_by: String,
    expires_at: Option<DateTime<Utc>>,
    max_users: Option<i32>,
    updated_at: DateTime<Utc>,
    updated_by: String,
}

impl TryFrom<LicenseRow> for License {
    type Error = DomainError;

    fn try_from(row: LicenseRow) -> Result<Self, Self::Error> {
        Ok(License {
            organization_id: OrganizationId::new(row.organization_id).map_err(corrupt)?,
            module_code: ModuleCode::new(row.module_code).map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            tier: row.tier.parse().map_err(corrupt)?,
            activated_at: Timestamp::from_datetime(row.activated_at),
            activated_by: UserId::new(row.activated_by).map_err(corrupt)?,
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            max_users: row
                .max_users
                .map(u32::try_from)
                .transpose()
                .map_err(|e| corrupt(format!("max_users: {}", e)))?,
            updated_at: Timestamp::from_datetime(row.updated_at),
            updated_by: UserId::new(row.updated_by).map_err(corrupt)?,
        })
    }
}

#[async_trait]
impl LicenseStore for PostgresLicenseStore {
    async fn get(&self, key: &LicenseKey) -> Result<Option<License>, DomainError> {
        let sql = format!(
            "{} WHERE organization_id = $1 AND module_code = $2",
            SELECT_COLUMNS
        );
        let row: Option<LicenseRow> = sqlx::query_as(&sql)
            .bind(key.organization_id.as_str())
            .bind(key.module_code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load license", e))?;

        row.map(License::try_from).transpose()
    }

    async fn upsert(&self, license: &License) -> Result<(), DomainError> {
        bind_license(UPSERT, license)?
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to upsert license", e))?;

        Ok(())
    }

    async fn insert_unless_live(
        &self,
        license: &License,
        now: Timestamp,
        grace: &GracePolicy,
    ) -> Result<bool, DomainError> {
        // Past grace means expires_at < now - grace. A NULL expires_at is
        // perpetual and never satisfies the comparison.
        let lapsed_before = now.minus(grace.period());
        let sql = format!(
            "{} WHERE organization_modules.status = 'cancelled' \
             OR organization_modules.expires_at < $11",
            UPSERT
        );
        let result = bind_license(&sql, license)?
            .bind(*lapsed_before.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to start trial", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<License>, DomainError> {
        let sql = format!(
            "{} WHERE organization_id = $1 ORDER BY module_code",
            SELECT_COLUMNS
        );
        let rows: Vec<LicenseRow> = sqlx::query_as(&sql)
            .bind(organization_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list licenses", e))?;

        rows.into_iter().map(License::try_from).collect()
    }

    async fn list_expiring_between(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<License>, DomainError> {
        let sql = format!(
            "{} WHERE status <> 'cancelled' AND expires_at > $1 AND expires_at <= $2 \
             ORDER BY expires_at, organization_id, module_code",
            SELECT_COLUMNS
        );
        let rows: Vec<LicenseRow> = sqlx::query_as(&sql)
            .bind(from.as_datetime())
            .bind(to.as_datetime())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list expiring licenses", e))?;

        rows.into_iter().map(License::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::licensing::{LicenseStatus, ModuleTier};

    fn row() -> LicenseRow {
        let now = Utc::now();
        LicenseRow {
            organization_id: "org-a".to_string(),
            module_code: "meter_reading".to_string(),
            status: "trial".to_string(),
            tier: "standard".to_string(),
            activated_at: now,
            activated_by: "system".to_string(),
            expires_at: Some(now),
            max_users: Some(12),
            updated_at: now,
            updated_by: "system".to_string(),
        }
    }

    #[test]
    fn row_converts_to_license() {
        let license = License::try_from(row()).unwrap();
        assert_eq!(license.status, LicenseStatus::Trial);
        assert_eq!(license.tier, ModuleTier::Standard);
        assert_eq!(license.max_users, Some(12));
        assert!(license.activated_by.is_system());
    }

    #[test]
    fn unknown_status_is_reported_as_corrupt_row() {
        let mut bad = row();
        bad.status = "expired".to_string();
        let err = License::try_from(bad).unwrap_err();
        assert!(err.is_infrastructure());
    }

    #[test]
    fn negative_max_users_is_rejected() {
        let mut bad = row();
        bad.max_users = Some(-1);
        assert!(License::try_from(bad).is_err());
    }
}
