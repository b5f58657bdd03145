//! License record.
//!
//! One License exists per (organization, module) pair. Every activation,
//! renewal or deactivation mutates that row in place; rows are never
//! deleted. Expiry is never stored as a status: `expired` and `grace` are
//! views computed from `expires_at` against the current instant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{OrganizationId, Timestamp, UserId, ValidationError};

use super::{GracePolicy, LicensingError, ModuleCode, ModuleTier};

/// Unique key of a License.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LicenseKey {
    pub organization_id: OrganizationId,
    pub module_code: ModuleCode,
}

impl LicenseKey {
    pub fn new(organization_id: OrganizationId, module_code: ModuleCode) -> Self {
        Self {
            organization_id,
            module_code,
        }
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_id, self.module_code)
    }
}

/// Persisted License status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Trial,
    Active,
    Cancelled,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Trial => "trial",
            LicenseStatus::Active => "active",
            LicenseStatus::Cancelled => "cancelled",
        }
    }

    /// Trial and active rows may still grant access; cancelled never does.
    pub fn may_grant_access(&self) -> bool {
        !matches!(self, LicenseStatus::Cancelled)
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LicenseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(LicenseStatus::Trial),
            "active" => Ok(LicenseStatus::Active),
            "cancelled" => Ok(LicenseStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "license_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Status as shown to people, including the time-derived phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Trial,
    Active,
    /// Past `expires_at`, still inside the grace window.
    Grace,
    Expired,
    Cancelled,
}

/// An organization's entitlement to one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub organization_id: OrganizationId,
    pub module_code: ModuleCode,
    pub status: LicenseStatus,
    /// Module tier at the time of activation. Informational.
    pub tier: ModuleTier,
    pub activated_at: Timestamp,
    pub activated_by: UserId,
    /// `None` means perpetual.
    pub expires_at: Option<Timestamp>,
    /// Soft cap on active users; never enforced by the resolver.
    pub max_users: Option<u32>,
    pub updated_at: Timestamp,
    pub updated_by: UserId,
}

impl License {
    /// A fresh trial row.
    pub fn trial(
        key: LicenseKey,
        tier: ModuleTier,
        requested_by: UserId,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<Self, LicensingError> {
        check_window(now, Some(expires_at))?;
        Ok(Self {
            organization_id: key.organization_id,
            module_code: key.module_code,
            status: LicenseStatus::Trial,
            tier,
            activated_at: now,
            activated_by: requested_by.clone(),
            expires_at: Some(expires_at),
            max_users: None,
            updated_at: now,
            updated_by: requested_by,
        })
    }

    /// The full row written by an activation, whatever state preceded it.
    pub fn activated(
        key: LicenseKey,
        tier: ModuleTier,
        activated_by: UserId,
        now: Timestamp,
        expires_at: Option<Timestamp>,
        max_users: Option<u32>,
    ) -> Result<Self, LicensingError> {
        check_window(now, expires_at)?;
        Ok(Self {
            organization_id: key.organization_id,
            module_code: key.module_code,
            status: LicenseStatus::Active,
            tier,
            activated_at: now,
            activated_by: activated_by.clone(),
            expires_at,
            max_users,
            updated_at: now,
            updated_by: activated_by,
        })
    }

    pub fn key(&self) -> LicenseKey {
        LicenseKey::new(self.organization_id.clone(), self.module_code.clone())
    }

    /// Moves to `cancelled` and clears the expiry; history fields are kept.
    pub fn cancel(&mut self, deactivated_by: UserId, now: Timestamp) {
        self.status = LicenseStatus::Cancelled;
        self.expires_at = None;
        self.updated_at = now;
        self.updated_by = deactivated_by;
    }

    /// Extends a trial or active row, including one already past expiry.
    pub fn renew(
        &mut self,
        renewed_by: UserId,
        now: Timestamp,
        new_expires_at: Timestamp,
    ) -> Result<(), LicensingError> {
        if !self.status.may_grant_access() {
            return Err(LicensingError::not_found(self.key()));
        }
        check_window(self.activated_at, Some(new_expires_at))?;
        self.status = LicenseStatus::Active;
        self.expires_at = Some(new_expires_at);
        self.updated_at = now;
        self.updated_by = renewed_by;
        Ok(())
    }

    /// True while the row still grants any access (full or read-only).
    pub fn is_live(&self, now: Timestamp, grace: &GracePolicy) -> bool {
        if !self.status.may_grant_access() {
            return false;
        }
        match self.expires_at {
            None => true,
            Some(expires_at) => now <= grace.grace_ends(expires_at),
        }
    }

    pub fn display_status(&self, now: Timestamp, grace: &GracePolicy) -> DisplayStatus {
        match (self.status, self.expires_at) {
            (LicenseStatus::Cancelled, _) => DisplayStatus::Cancelled,
            (_, Some(expires_at)) if now > expires_at => {
                if now <= grace.grace_ends(expires_at) {
                    DisplayStatus::Grace
                } else {
                    DisplayStatus::Expired
                }
            }
            (LicenseStatus::Trial, _) => DisplayStatus::Trial,
            (LicenseStatus::Active, _) => DisplayStatus::Active,
        }
    }
}

fn check_window(activated_at: Timestamp, expires_at: Option<Timestamp>) -> Result<(), LicensingError> {
    match expires_at {
        Some(expires_at) if expires_at < activated_at => Err(LicensingError::validation(
            "expires_at",
            "must not be earlier than the activation time",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    fn key() -> LicenseKey {
        LicenseKey::new(
            OrganizationId::new("org-a").unwrap(),
            ModuleCode::new("preventive_maintenance").unwrap(),
        )
    }

    fn operator() -> UserId {
        UserId::new("operator-1").unwrap()
    }

    fn active_until(days: i64) -> License {
        License::activated(
            key(),
            ModuleTier::Standard,
            operator(),
            t0(),
            Some(t0().add_days(days)),
            Some(10),
        )
        .unwrap()
    }

    #[test]
    fn activation_rejects_expiry_before_activation() {
        let result = License::activated(
            key(),
            ModuleTier::Standard,
            operator(),
            t0(),
            Some(t0().minus_days(1)),
            None,
        );
        assert!(matches!(result, Err(LicensingError::ValidationFailed { .. })));
    }

    #[test]
    fn cancel_clears_expiry_but_keeps_history() {
        let mut license = active_until(30);
        let later = t0().add_days(3);
        license.cancel(UserId::new("operator-2").unwrap(), later);

        assert_eq!(license.status, LicenseStatus::Cancelled);
        assert_eq!(license.expires_at, None);
        assert_eq!(license.activated_at, t0());
        assert_eq!(license.activated_by, operator());
        assert_eq!(license.updated_by.as_str(), "operator-2");
    }

    #[test]
    fn renew_turns_trial_into_active() {
        let mut license =
            License::trial(key(), ModuleTier::Standard, UserId::system(), t0(), t0().add_days(30))
                .unwrap();
        license
            .renew(operator(), t0().add_days(40), t0().add_days(400))
            .unwrap();

        assert_eq!(license.status, LicenseStatus::Active);
        assert_eq!(license.expires_at, Some(t0().add_days(400)));
    }

    #[test]
    fn renew_of_cancelled_row_is_not_found() {
        let mut license = active_until(30);
        license.cancel(operator(), t0());
        let result = license.renew(operator(), t0(), t0().add_days(10));
        assert_eq!(result, Err(LicensingError::not_found(key())));
    }

    #[test]
    fn display_status_walks_through_grace_to_expired() {
        let license = active_until(10);
        let grace = GracePolicy::default();

        assert_eq!(license.display_status(t0().add_days(5), &grace), DisplayStatus::Active);
        assert_eq!(license.display_status(t0().add_days(12), &grace), DisplayStatus::Grace);
        assert_eq!(license.display_status(t0().add_days(18), &grace), DisplayStatus::Expired);
        assert!(license.is_live(t0().add_days(17), &grace));
        assert!(!license.is_live(t0().add_days(18), &grace));
    }

    #[test]
    fn status_parses_only_persisted_values() {
        assert_eq!("trial".parse::<LicenseStatus>().unwrap(), LicenseStatus::Trial);
        assert!("expired".parse::<LicenseStatus>().is_err());
    }
}
