//! In-memory event bus.
//!
//! Captures every published envelope in order. Used by the integration
//! tests and by the server when no audit sink is configured alongside the
//! tracing publisher.

use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard};

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;

/// Event bus that records what it is given.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// manager.activate(cmd).await?;
/// assert!(bus.has_event("license.activated.v1"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Returns all published events, oldest first.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.read().clone()
    }

    /// Returns events of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns events for a specific aggregate.
    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.published
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }

    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.read().iter().any(|e| e.event_type == event_type)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.published.read().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        self.published
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, EventMetadata, Timestamp};
    use serde_json::json;

    fn test_envelope(event_type: &str, aggregate_id: &str) -> EventEnvelope {
        EventEnvelope {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            schema_version: 1,
            aggregate_id: aggregate_id.to_string(),
            aggregate_type: "License".to_string(),
            occurred_at: Timestamp::now(),
            payload: json!({}),
            metadata: EventMetadata::default(),
        }
    }

    #[tokio::test]
    async fn publish_stores_event() {
        let bus = InMemoryEventBus::new();

        bus.publish(test_envelope("license.activated.v1", "org-a/meter_reading"))
            .await
            .unwrap();

        assert_eq!(bus.event_count(), 1);
        assert!(bus.has_event("license.activated.v1"));
    }

    #[tokio::test]
    async fn filters_by_type_and_aggregate() {
        let bus = InMemoryEventBus::new();
        bus.publish_all(vec![
            test_envelope("license.activated.v1", "org-a/meter_reading"),
            test_envelope("license.renewed.v1", "org-b/meter_reading"),
            test_envelope("license.activated.v1", "org-b/meter_reading"),
        ])
        .await
        .unwrap();

        assert_eq!(bus.events_of_type("license.activated.v1").len(), 2);
        assert_eq!(bus.events_for_aggregate("org-b/meter_reading").len(), 2);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let bus = InMemoryEventBus::new();
        bus.publish(test_envelope("license.lapsed.v1", "x")).await.unwrap();

        bus.clear();

        assert_eq!(bus.event_count(), 0);
        assert!(bus.published_events().is_empty());
    }
}
