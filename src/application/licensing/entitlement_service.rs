//! EntitlementService - the read path.
//!
//! Every answer is computed fresh from a snapshot read and `now`. Nothing
//! here takes a lock or writes.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use tracing::debug;

use crate::domain::foundation::{OrganizationId, Timestamp};
use crate::domain::licensing::{
    resolve, AccessMode, Catalog, Decision, DisplayStatus, GracePolicy, License, LicenseKey,
    LicensingError, ModuleCode, ModuleDefinition,
};
use crate::ports::{Clock, LicenseStore};

/// A stored License with its computed decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseView {
    pub license: License,
    pub decision: Decision,
    pub display_status: DisplayStatus,
}

/// One catalog module as an organization sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleAccess {
    pub module: ModuleDefinition,
    pub license: Option<License>,
    pub decision: Decision,
}

pub struct EntitlementService {
    licenses: Arc<dyn LicenseStore>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    grace: GracePolicy,
}

impl EntitlementService {
    pub fn new(
        licenses: Arc<dyn LicenseStore>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        grace: GracePolicy,
    ) -> Self {
        Self {
            licenses,
            catalog,
            clock,
            grace,
        }
    }

    pub fn grace(&self) -> GracePolicy {
        self.grace
    }

    /// Access decision for one pair at `at`, or at `Clock::now()`.
    ///
    /// Core modules resolve without touching the store.
    ///
    /// # Errors
    ///
    /// - `InvalidModule` for a code missing from the catalog
    /// - `StoreUnavailable` if the row cannot be read
    pub async fn resolve(
        &self,
        organization_id: &OrganizationId,
        module_code: &str,
        at: Option<Timestamp>,
    ) -> Result<Decision, LicensingError> {
        let module = self.catalog.modules().lookup(module_code)?;
        let now = at.unwrap_or_else(|| self.clock.now());

        let license = if module.is_core() {
            None
        } else {
            let key = LicenseKey::new(organization_id.clone(), module.code.clone());
            self.licenses.get(&key).await?
        };

        let decision = resolve(license.as_ref(), module, now, &self.grace);
        debug!(
            organization_id = %organization_id,
            module_code = %module.code,
            mode = ?decision.mode,
            "Entitlement resolved"
        );
        Ok(decision)
    }

    /// All stored Licenses of an organization, cancelled ones included.
    pub async fn list_licenses(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<LicenseView>, LicensingError> {
        let now = self.clock.now();
        let licenses = self.licenses.list_for_organization(organization_id).await?;
        Ok(licenses
            .into_iter()
            .map(|license| self.view(license, now))
            .collect())
    }

    /// Every catalog module, core included, with the organization's row
    /// (if any) and its decision.
    pub async fn module_overview(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ModuleAccess>, LicensingError> {
        let now = self.clock.now();
        let mut licenses = self.licenses.list_for_organization(organization_id).await?;

        Ok(self
            .catalog
            .modules()
            .iter()
            .map(|module| {
                let license = licenses
                    .iter()
                    .position(|l| l.module_code == module.code)
                    .map(|index| licenses.swap_remove(index))
                    .filter(|_| !module.is_core());
                let decision = resolve(license.as_ref(), module, now, &self.grace);
                ModuleAccess {
                    module: module.clone(),
                    license,
                    decision,
                }
            })
            .collect())
    }

    /// Declared dependencies of `module_code` that do not currently
    /// resolve to `Full` for the organization, in catalog order.
    ///
    /// Activation never enforces dependencies; callers that gate on them
    /// check this first.
    ///
    /// # Errors
    ///
    /// `InvalidModule` for a code missing from the catalog.
    pub async fn missing_dependencies(
        &self,
        organization_id: &OrganizationId,
        module_code: &str,
    ) -> Result<Vec<ModuleCode>, LicensingError> {
        let module = self.catalog.modules().lookup(module_code)?;
        if module.dependencies.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let licenses = self.licenses.list_for_organization(organization_id).await?;
        Ok(module
            .dependencies
            .iter()
            .filter_map(|code| self.catalog.modules().get(code))
            .filter(|dependency| {
                let license = licenses.iter().find(|l| l.module_code == dependency.code);
                resolve(license, dependency, now, &self.grace).mode != AccessMode::Full
            })
            .map(|dependency| dependency.code.clone())
            .collect())
    }

    /// Licenses whose `expires_at` falls in `(now, now + within_days]`.
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the window ends past the latest supported date.
    pub async fn list_expiring(&self, within_days: u32) -> Result<Vec<LicenseView>, LicensingError> {
        let now = self.clock.now();
        let until = now
            .checked_add_days(i64::from(within_days))
            .ok_or_else(|| LicensingError::validation("days", "window ends past the latest supported date"))?;
        let licenses = self.licenses.list_expiring_between(now, until).await?;
        Ok(licenses
            .into_iter()
            .map(|license| self.view(license, now))
            .collect())
    }

    /// Licenses currently resolving to `ReadOnly`.
    pub async fn list_in_grace(&self) -> Result<Vec<LicenseView>, LicensingError> {
        let now = self.clock.now();
        // One extra day so the store's half-open window covers the boundary.
        let from = now.minus(self.grace.period() + Duration::days(1));
        let licenses = self.licenses.list_expiring_between(from, now).await?;
        Ok(licenses
            .into_iter()
            .map(|license| self.view(license, now))
            .filter(|view| view.display_status == DisplayStatus::Grace)
            .collect())
    }

    fn view(&self, license: License, now: Timestamp) -> LicenseView {
        let decision = match self.catalog.modules().get(&license.module_code) {
            Some(module) => resolve(Some(&license), module, now, &self.grace),
            // Module dropped from the catalog since activation: judge by the stored tier.
            None => {
                let module = ModuleDefinition::new(
                    license.module_code.clone(),
                    license.module_code.as_str(),
                    license.tier,
                );
                resolve(Some(&license), &module, now, &self.grace)
            }
        };
        let display_status = license.display_status(now, &self.grace);
        LicenseView {
            license,
            decision,
            display_status,
        }
    }
}
