//! PostgreSQL implementation of RequestStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ModuleRequestId, OrganizationId, Timestamp, UserId};
use crate::domain::licensing::{ModuleCode, ModuleRequest};
use crate::ports::RequestStore;

use super::{corrupt, db_error};

pub struct PostgresRequestStore {
    pool: PgPool,
}

impl PostgresRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, organization_id, requested_by, module_code, request_type, status,
           justification, expected_usage, reviewed_by, review_notes, reviewed_at, created_at
    FROM module_requests
"#;

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    organization_id: String,
    requested_by: String,
    module_code: String,
    request_type: String,
    status: String,
    justification: Option<String>,
    expected_usage: Option<String>,
    reviewed_by: Option<String>,
    review_notes: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for ModuleRequest {
    type Error = DomainError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(ModuleRequest {
            id: ModuleRequestId::from_uuid(row.id),
            organization_id: OrganizationId::new(row.organization_id).map_err(corrupt)?,
            requested_by: UserId::new(row.requested_by).map_err(corrupt)?,
            module_code: ModuleCode::new(row.module_code).map_err(corrupt)?,
            request_type: row.request_type.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            justification: row.justification,
            expected_usage: row.expected_usage,
            reviewed_by: row.reviewed_by.map(UserId::new).transpose().map_err(corrupt)?,
            review_notes: row.review_notes,
            reviewed_at: row.reviewed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl RequestStore for PostgresRequestStore {
    async fn insert(&self, request: &ModuleRequest) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO module_requests (
                id, organization_id, requested_by, module_code, request_type, status,
                justification, expected_usage, reviewed_by, review_notes, reviewed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.organization_id.as_str())
        .bind(request.requested_by.as_str())
        .bind(request.module_code.as_str())
        .bind(request.request_type.as_str())
        .bind(request.status.as_str())
        .bind(&request.justification)
        .bind(&request.expected_usage)
        .bind(request.reviewed_by.as_ref().map(UserId::as_str))
        .bind(&request.review_notes)
        .bind(request.reviewed_at.map(|t| *t.as_datetime()))
        .bind(request.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to save module request", e))?;

        Ok(())
    }

    async fn find(&self, id: &ModuleRequestId) -> Result<Option<ModuleRequest>, DomainError> {
        let sql = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<RequestRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load module request", e))?;

        row.map(ModuleRequest::try_from).transpose()
    }

    async fn mark_reviewed(&self, request: &ModuleRequest) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE module_requests SET
                status = $2,
                reviewed_by = $3,
                review_notes = $4,
                reviewed_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.reviewed_by.as_ref().map(UserId::as_str))
        .bind(&request.review_notes)
        .bind(request.reviewed_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to review module request", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_pending(&self) -> Result<Vec<ModuleRequest>, DomainError> {
        let sql = format!("{} WHERE status = 'pending' ORDER BY created_at", SELECT_COLUMNS);
        let rows: Vec<RequestRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list pending requests", e))?;

        rows.into_iter().map(ModuleRequest::try_from).collect()
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ModuleRequest>, DomainError> {
        let sql = format!(
            "{} WHERE organization_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows: Vec<RequestRow> = sqlx::query_as(&sql)
            .bind(organization_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list module requests", e))?;

        rows.into_iter().map(ModuleRequest::try_from).collect()
    }
}
