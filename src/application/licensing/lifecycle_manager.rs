//! LifecycleManager - the only writer of License rows.
//!
//! Every mutation follows the same shape:
//!
//! 1. Validate the module code against the catalog (core and unknown codes
//!    are rejected before any lock is taken)
//! 2. Take the per-key lock
//! 3. Read the current row, apply the transition, upsert the whole row
//! 4. Publish one licensing event (best-effort)
//!
//! Writes on one (organization, module) key are linearizable; writes on
//! different keys never contend.

use std::sync::Arc;

use tracing::info;

use crate::domain::foundation::{OrganizationId, Timestamp, UserId};
use crate::domain::licensing::{
    Catalog, GracePolicy, License, LicenseChange, LicenseKey, LicensingError, LicensingEvent,
    ModuleDefinition,
};
use crate::ports::{Clock, EventPublisher, LicenseStore};

use super::{publish_best_effort, KeyLocks};

/// Trial length when the caller does not pass one.
pub const DEFAULT_TRIAL_DAYS: u32 = 30;

#[derive(Debug, Clone)]
pub struct StartTrialCommand {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub requested_by: UserId,
    /// Falls back to the manager's default trial length.
    pub days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ActivateCommand {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub activated_by: UserId,
    /// `None` means perpetual.
    pub expires_at: Option<Timestamp>,
    pub max_users: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DeactivateCommand {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub deactivated_by: UserId,
}

#[derive(Debug, Clone)]
pub struct RenewCommand {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub renewed_by: UserId,
    pub new_expires_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct ActivateTierCommand {
    pub organization_id: OrganizationId,
    pub tier: String,
    pub activated_by: UserId,
    /// Overrides every module's default duration when set.
    pub expires_at: Option<Timestamp>,
}

pub struct LifecycleManager {
    licenses: Arc<dyn LicenseStore>,
    event_publisher: Arc<dyn EventPublisher>,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    grace: GracePolicy,
    default_trial_days: u32,
    locks: KeyLocks,
}

impl LifecycleManager {
    pub fn new(
        licenses: Arc<dyn LicenseStore>,
        event_publisher: Arc<dyn EventPublisher>,
        catalog: Arc<Catalog>,
        clock: Arc<dyn Clock>,
        grace: GracePolicy,
    ) -> Self {
        Self {
            licenses,
            event_publisher,
            catalog,
            clock,
            grace,
            default_trial_days: DEFAULT_TRIAL_DAYS,
            locks: KeyLocks::new(),
        }
    }

    pub fn with_default_trial_days(mut self, days: u32) -> Self {
        self.default_trial_days = days;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// `none -> trial`, or a fresh trial over a cancelled or fully lapsed row.
    ///
    /// # Errors
    ///
    /// - `AlreadyEntitled` if a trial or active row is still inside its
    ///   validity or grace window; the stored row is left untouched
    /// - `ValidationFailed` if `days` is zero
    pub async fn start_trial(&self, cmd: StartTrialCommand) -> Result<License, LicensingError> {
        let definition = self.catalog.modules().licensable(&cmd.module_code)?;
        let days = cmd.days.unwrap_or(self.default_trial_days);
        if days == 0 {
            return Err(LicensingError::validation("days", "trial length must be at least one day"));
        }
        let key = LicenseKey::new(cmd.organization_id, definition.code.clone());

        let _guard = self.locks.lock(&key).await;
        let now = self.clock.now();
        let expires_at = now
            .checked_add_days(i64::from(days))
            .ok_or_else(|| LicensingError::validation("days", "trial would end past the latest supported date"))?;
        let license = License::trial(
            key.clone(),
            definition.tier,
            cmd.requested_by.clone(),
            now,
            expires_at,
        )?;
        // The store decides liveness atomically; the key lock only covers
        // this process.
        if !self.licenses.insert_unless_live(&license, now, &self.grace).await? {
            return Err(LicensingError::already_entitled(key));
        }

        info!(
            organization_id = %key.organization_id,
            module_code = %key.module_code,
            days,
            "Trial started"
        );
        self.publish(LicensingEvent::for_key(
            &key,
            Some(cmd.requested_by),
            now,
            LicenseChange::TrialStarted { expires_at },
        ))
        .await;

        Ok(license)
    }

    /// `any -> active`, unconditionally replacing the row.
    ///
    /// Calling twice with the same arguments leaves one row holding the
    /// second call's values.
    pub async fn activate(&self, cmd: ActivateCommand) -> Result<License, LicensingError> {
        let definition = self.catalog.modules().licensable(&cmd.module_code)?;
        let key = LicenseKey::new(cmd.organization_id, definition.code.clone());
        let now = self.clock.now();

        self.activate_key(key, definition, cmd.activated_by, now, cmd.expires_at, cmd.max_users)
            .await
    }

    /// `any -> cancelled`, clearing `expires_at`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the pair was never licensed.
    pub async fn deactivate(&self, cmd: DeactivateCommand) -> Result<License, LicensingError> {
        let definition = self.catalog.modules().licensable(&cmd.module_code)?;
        let key = LicenseKey::new(cmd.organization_id, definition.code.clone());

        let _guard = self.locks.lock(&key).await;
        let now = self.clock.now();
        let mut license = self
            .licenses
            .get(&key)
            .await?
            .ok_or_else(|| LicensingError::not_found(key.clone()))?;

        license.cancel(cmd.deactivated_by.clone(), now);
        self.licenses.upsert(&license).await?;

        info!(
            organization_id = %key.organization_id,
            module_code = %key.module_code,
            "License deactivated"
        );
        self.publish(LicensingEvent::for_key(
            &key,
            Some(cmd.deactivated_by),
            now,
            LicenseChange::Deactivated,
        ))
        .await;

        Ok(license)
    }

    /// Extends a trial or active row, including one already in grace or
    /// fully expired, and marks it active.
    ///
    /// # Errors
    ///
    /// `NotFound` if no row exists or the row is cancelled.
    pub async fn renew(&self, cmd: RenewCommand) -> Result<License, LicensingError> {
        let definition = self.catalog.modules().licensable(&cmd.module_code)?;
        let key = LicenseKey::new(cmd.organization_id, definition.code.clone());

        let _guard = self.locks.lock(&key).await;
        let now = self.clock.now();
        let mut license = self
            .licenses
            .get(&key)
            .await?
            .ok_or_else(|| LicensingError::not_found(key.clone()))?;

        let previous_expires_at = license.expires_at;
        license.renew(cmd.renewed_by.clone(), now, cmd.new_expires_at)?;
        self.licenses.upsert(&license).await?;

        info!(
            organization_id = %key.organization_id,
            module_code = %key.module_code,
            new_expires_at = %cmd.new_expires_at,
            "License renewed"
        );
        self.publish(LicensingEvent::for_key(
            &key,
            Some(cmd.renewed_by),
            now,
            LicenseChange::Renewed {
                previous_expires_at,
                new_expires_at: cmd.new_expires_at,
            },
        ))
        .await;

        Ok(license)
    }

    /// Activates every module of a tier.
    ///
    /// The plan is resolved and validated before the first write. After
    /// that each module is an independent upsert; a failure part way
    /// through returns the error and re-running the same command converges
    /// on the same end state.
    ///
    /// # Errors
    ///
    /// - `InvalidTier` for a tier name missing from the catalog
    /// - `ValidationFailed` if `expires_at` is in the past
    pub async fn activate_tier(
        &self,
        cmd: ActivateTierCommand,
    ) -> Result<Vec<License>, LicensingError> {
        let plan = self.catalog.tier_plan(&cmd.tier)?;
        let now = self.clock.now();

        let planned = plan
            .iter()
            .map(|entry| {
                let expires_at = match cmd.expires_at {
                    Some(expires_at) => expires_at,
                    None => now
                        .checked_add_days(i64::from(entry.default_duration_days))
                        .ok_or_else(|| {
                            LicensingError::validation(
                                "default_duration_days",
                                "term would end past the latest supported date",
                            )
                        })?,
                };
                Ok((entry.definition, Some(expires_at)))
            })
            .collect::<Result<Vec<(&ModuleDefinition, Option<Timestamp>)>, LicensingError>>()?;
        if planned.iter().any(|(_, expires_at)| matches!(expires_at, Some(e) if *e < now)) {
            return Err(LicensingError::validation(
                "expires_at",
                "must not be earlier than the activation time",
            ));
        }

        let mut licenses = Vec::with_capacity(planned.len());
        for (definition, expires_at) in planned {
            let key = LicenseKey::new(cmd.organization_id.clone(), definition.code.clone());
            let license = self
                .activate_key(key, definition, cmd.activated_by.clone(), now, expires_at, None)
                .await?;
            licenses.push(license);
        }

        info!(
            organization_id = %cmd.organization_id,
            tier = %cmd.tier,
            modules = licenses.len(),
            "Tier activated"
        );
        self.publish(LicensingEvent::for_organization(
            cmd.organization_id,
            Some(cmd.activated_by),
            now,
            LicenseChange::TierActivated {
                tier: cmd.tier,
                module_codes: licenses.iter().map(|l| l.module_code.clone()).collect(),
                expires_at: cmd.expires_at,
            },
        ))
        .await;

        Ok(licenses)
    }

    async fn activate_key(
        &self,
        key: LicenseKey,
        definition: &ModuleDefinition,
        activated_by: UserId,
        now: Timestamp,
        expires_at: Option<Timestamp>,
        max_users: Option<u32>,
    ) -> Result<License, LicensingError> {
        let license = License::activated(
            key.clone(),
            definition.tier,
            activated_by.clone(),
            now,
            expires_at,
            max_users,
        )?;

        {
            let _guard = self.locks.lock(&key).await;
            self.licenses.upsert(&license).await?;
        }

        info!(
            organization_id = %key.organization_id,
            module_code = %key.module_code,
            perpetual = expires_at.is_none(),
            "License activated"
        );
        self.publish(LicensingEvent::for_key(
            &key,
            Some(activated_by),
            now,
            LicenseChange::Activated {
                expires_at,
                max_users,
            },
        ))
        .await;

        Ok(license)
    }

    async fn publish(&self, event: LicensingEvent) {
        publish_best_effort(self.event_publisher.as_ref(), event).await;
    }
}
