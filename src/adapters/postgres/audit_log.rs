//! Durable access log.
//!
//! Appends every licensing envelope to `licensing_audit_log`. Replaying an
//! envelope is a no-op thanks to the event id primary key.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

use super::db_error;

pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventPublisher for PostgresAuditLog {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| DomainError::new(ErrorCode::SerializationError, e.to_string()))?;
        let schema_version = i32::try_from(event.schema_version)
            .map_err(|e| DomainError::new(ErrorCode::SerializationError, e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO licensing_audit_log (
                event_id, event_type, schema_version, aggregate_type, aggregate_id,
                actor, correlation_id, occurred_at, payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::JSONB)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event.event_id.as_str())
        .bind(&event.event_type)
        .bind(schema_version)
        .bind(&event.aggregate_type)
        .bind(&event.aggregate_id)
        .bind(&event.metadata.user_id)
        .bind(&event.metadata.correlation_id)
        .bind(event.occurred_at.as_datetime())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to append audit log entry", e))?;

        Ok(())
    }
}
