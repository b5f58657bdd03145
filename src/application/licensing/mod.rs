//! Licensing services.
//!
//! ## Commands
//! - Start trial, activate, deactivate, renew, activate tier ([`LifecycleManager`])
//! - Create and review module requests ([`RequestWorkflow`])
//! - Track usage ([`UsageTracker`])
//!
//! ## Queries
//! - Resolve access, list licenses, module overview, expiring and grace
//!   listings ([`EntitlementService`])
//! - Request and usage listings
//!
//! ## Background
//! - Expiry notifications ([`ExpirySweep`])

mod entitlement_service;
mod expiry_sweep;
mod key_locks;
mod lifecycle_manager;
mod request_workflow;
mod usage_tracker;

use tracing::warn;

use crate::domain::foundation::DomainEvent;
use crate::domain::licensing::LicensingEvent;
use crate::ports::EventPublisher;

pub use entitlement_service::{EntitlementService, LicenseView, ModuleAccess};
pub use expiry_sweep::{ExpirySweep, ExpirySweepConfig, SweepReport};
pub use key_locks::KeyLocks;
pub use lifecycle_manager::{
    ActivateCommand, ActivateTierCommand, DeactivateCommand, LifecycleManager, RenewCommand,
    StartTrialCommand, DEFAULT_TRIAL_DAYS,
};
pub use request_workflow::{
    CreateRequestCommand, DispatchSummary, RequestWorkflow, ReviewOutcome, ReviewRequestCommand,
    DEFAULT_TERM_DAYS,
};
pub use usage_tracker::{TrackUsageCommand, UsageTracker, DEFAULT_HISTORY_LIMIT};

/// Publishes after a committed write. The write is the source of truth, so
/// a failed publish is logged rather than returned.
async fn publish_best_effort(publisher: &dyn EventPublisher, event: LicensingEvent) {
    if let Err(error) = publisher.publish(event.to_envelope()).await {
        warn!(
            event_type = event.event_type(),
            organization_id = %event.organization_id,
            error = %error,
            "Failed to publish licensing event"
        );
    }
}
