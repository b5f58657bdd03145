//! Access log written through `tracing`.
//!
//! Each envelope becomes one structured `info` record on the
//! `licensing::audit` target, so the log pipeline doubles as the access
//! log when no database is configured.

use async_trait::async_trait;
use tracing::info;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl TracingEventPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| DomainError::new(ErrorCode::SerializationError, e.to_string()))?;
        info!(
            target: "licensing::audit",
            event_id = %event.event_id,
            event_type = %event.event_type,
            aggregate_type = %event.aggregate_type,
            aggregate_id = %event.aggregate_id,
            actor = event.metadata.user_id.as_deref().unwrap_or("-"),
            occurred_at = %event.occurred_at,
            payload = %payload,
            "licensing event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, EventMetadata, Timestamp};

    #[tokio::test]
    async fn publish_never_fails_for_json_payloads() {
        let envelope = EventEnvelope {
            event_id: EventId::new(),
            event_type: "license.deactivated.v1".to_string(),
            schema_version: 1,
            aggregate_id: "org-a/meter_reading".to_string(),
            aggregate_type: "License".to_string(),
            occurred_at: Timestamp::now(),
            payload: serde_json::json!({"change": "deactivated"}),
            metadata: EventMetadata::default(),
        };

        assert!(TracingEventPublisher::new().publish(envelope).await.is_ok());
    }
}
