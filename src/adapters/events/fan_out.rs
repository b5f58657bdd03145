//! Publishes each event to several publishers.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::EventPublisher;

/// Delivers to every inner publisher in order. All are attempted; the
/// first error is returned.
#[derive(Clone, Default)]
pub struct FanOutPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl FanOutPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

#[async_trait]
impl EventPublisher for FanOutPublisher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let mut first_error = None;
        for publisher in &self.publishers {
            if let Err(error) = publisher.publish(event.clone()).await {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
