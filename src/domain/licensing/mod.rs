//! Licensing domain - module entitlements per organization.
//!
//! # Module Organization
//!
//! - `module` / `catalog` - Module definitions, module and tier catalogs
//! - `license` - The per (organization, module) License record
//! - `entitlement` - Pure access resolution with the grace window
//! - `request` - Trial/purchase/upgrade/renewal requests and their review
//! - `usage` - Daily usage snapshots and soft-limit warnings
//! - `events` - Access log events
//! - `errors` - Licensing error taxonomy

mod builtin_catalog;
mod catalog;
mod entitlement;
mod errors;
mod events;
mod license;
mod module;
mod request;
mod usage;

pub use catalog::{Catalog, CatalogError, ModuleCatalog, TierActivationPlan, TierCatalog};
pub use entitlement::{resolve, AccessMode, Decision, DecisionReason, GracePolicy};
pub use errors::LicensingError;
pub use events::{LicenseChange, LicensingEvent};
pub use license::{DisplayStatus, License, LicenseKey, LicenseStatus};
pub use module::{ModuleCode, ModuleDefinition, ModuleTier};
pub use request::{ModuleRequest, RequestStatus, RequestType, ReviewDecision};
pub use usage::{SoftLimitWarning, UsageCounters, UsageRecord};
