//! CMMS Licensing - module entitlements for a multi-tenant CMMS.
//!
//! Decides, per organization and module, whether access is full, read-only
//! or locked, and manages the License lifecycle behind that decision:
//! trials, activations, renewals, tier bundles, reviewed module requests,
//! usage snapshots and expiry notifications.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
