//! Application layer - Commands, Queries, and Services.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Writes go through the lifecycle manager and request workflow; reads go
//! through the entitlement service and never take a lock.

pub mod licensing;

pub use licensing::{
    ActivateCommand, ActivateTierCommand, CreateRequestCommand, DeactivateCommand,
    EntitlementService, ExpirySweep, ExpirySweepConfig, LicenseView, LifecycleManager,
    ModuleAccess, RenewCommand, RequestWorkflow, ReviewOutcome, ReviewRequestCommand,
    StartTrialCommand, SweepReport, TrackUsageCommand, UsageTracker,
};
