//! Entitlement resolution.
//!
//! [`resolve`] is a pure function of (license row or absence, module, now)
//! and the grace policy. It never errors and never touches a store; the
//! read path calls it on a snapshot of a single row.
//!
//! Rules, in order:
//!
//! 1. core module: `Full`
//! 2. no row, or cancelled: `Locked`
//! 3. no expiry: `Full`
//! 4. `now <= expires_at`: `Full`
//! 5. `now <= expires_at + grace`: `ReadOnly`
//! 6. otherwise `Locked`
//!
//! Trial and active rows share the same grace window.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::Timestamp;

use super::{License, ModuleDefinition};

/// Length of the read-only window after expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GracePolicy {
    period: Duration,
}

impl GracePolicy {
    pub const DEFAULT_DAYS: u32 = 7;

    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Last instant that still resolves to `ReadOnly`.
    ///
    /// Clamped to the latest representable instant for far-future expiries.
    pub fn grace_ends(&self, expires_at: Timestamp) -> Timestamp {
        expires_at.saturating_plus(self.period)
    }
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self::from_days(Self::DEFAULT_DAYS)
    }
}

/// What the caller may do with a gated module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Full,
    /// Reads succeed; the guarding service must reject every mutation.
    ReadOnly,
    Locked,
}

impl AccessMode {
    pub fn allows_read(&self) -> bool {
        !matches!(self, AccessMode::Locked)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, AccessMode::Full)
    }
}

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    CoreModule,
    NotLicensed,
    PerpetualLicense,
    WithinValidity,
    GracePeriod,
    LicenseExpired,
}

impl DecisionReason {
    pub fn message(&self) -> &'static str {
        match self {
            DecisionReason::CoreModule => "core modules are always entitled",
            DecisionReason::NotLicensed => "not licensed",
            DecisionReason::PerpetualLicense => "perpetual license",
            DecisionReason::WithinValidity => "within validity window",
            DecisionReason::GracePeriod => "grace period - renew to restore full access",
            DecisionReason::LicenseExpired => "license expired",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Resolved, time-aware answer for one (organization, module) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub mode: AccessMode,
    pub reason: DecisionReason,
}

impl Decision {
    fn new(mode: AccessMode, reason: DecisionReason) -> Self {
        Self { mode, reason }
    }
}

/// Classifies access for `module` at `now`.
pub fn resolve(
    license: Option<&License>,
    module: &ModuleDefinition,
    now: Timestamp,
    grace: &GracePolicy,
) -> Decision {
    if module.is_core() {
        return Decision::new(AccessMode::Full, DecisionReason::CoreModule);
    }

    let license = match license {
        Some(license) if license.status.may_grant_access() => license,
        _ => return Decision::new(AccessMode::Locked, DecisionReason::NotLicensed),
    };

    let expires_at = match license.expires_at {
        None => return Decision::new(AccessMode::Full, DecisionReason::PerpetualLicense),
        Some(expires_at) => expires_at,
    };

    if now <= expires_at {
        Decision::new(AccessMode::Full, DecisionReason::WithinValidity)
    } else if now <= grace.grace_ends(expires_at) {
        Decision::new(AccessMode::ReadOnly, DecisionReason::GracePeriod)
    } else {
        Decision::new(AccessMode::Locked, DecisionReason::LicenseExpired)
    }
}
