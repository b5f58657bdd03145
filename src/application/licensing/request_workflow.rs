//! RequestWorkflow - human approval gate in front of the lifecycle manager.
//!
//! Requests are append-only. A review is recorded first (guarded by the
//! store's pending-only write), then an approval is dispatched to the
//! lifecycle manager. The two writes are not atomic: a dispatch failure
//! leaves the request approved and comes back in [`ReviewOutcome::dispatch`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::foundation::{ModuleRequestId, OrganizationId, Timestamp, UserId};
use crate::domain::licensing::{
    License, LicenseChange, LicenseKey, LicensingError, LicensingEvent, ModuleRequest,
    RequestType, ReviewDecision,
};
use crate::ports::{Clock, EventPublisher, RequestStore};

use super::{
    publish_best_effort, ActivateCommand, LifecycleManager, RenewCommand, StartTrialCommand,
};

/// Term granted by purchase, upgrade and renewal approvals without an override.
pub const DEFAULT_TERM_DAYS: u32 = 365;

#[derive(Debug, Clone)]
pub struct CreateRequestCommand {
    pub organization_id: OrganizationId,
    pub requested_by: UserId,
    pub module_code: String,
    pub request_type: RequestType,
    pub justification: Option<String>,
    pub expected_usage: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewRequestCommand {
    pub request_id: ModuleRequestId,
    pub reviewed_by: UserId,
    pub decision: ReviewDecision,
    pub review_notes: Option<String>,
    /// Replaces the default term for purchase, upgrade and renewal approvals.
    pub expires_at: Option<Timestamp>,
}

/// The recorded review plus whatever the approval dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub request: ModuleRequest,
    /// `None` for rejections.
    pub dispatch: Option<Result<License, LicensingError>>,
}

impl ReviewOutcome {
    pub fn dispatch_failed(&self) -> bool {
        matches!(self.dispatch, Some(Err(_)))
    }
}

/// Serializable form of a dispatch result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchSummary {
    Applied { license: License },
    Failed { error_code: String, message: String },
}

impl From<&Result<License, LicensingError>> for DispatchSummary {
    fn from(result: &Result<License, LicensingError>) -> Self {
        match result {
            Ok(license) => DispatchSummary::Applied {
                license: license.clone(),
            },
            Err(error) => DispatchSummary::Failed {
                error_code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

pub struct RequestWorkflow {
    requests: Arc<dyn RequestStore>,
    lifecycle: Arc<LifecycleManager>,
    event_publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    default_term_days: u32,
}

impl RequestWorkflow {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        lifecycle: Arc<LifecycleManager>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests,
            lifecycle,
            event_publisher,
            clock,
            default_term_days: DEFAULT_TERM_DAYS,
        }
    }

    pub fn with_default_term_days(mut self, days: u32) -> Self {
        self.default_term_days = days;
        self
    }

    /// Files a new pending request. Duplicates are allowed.
    ///
    /// # Errors
    ///
    /// `InvalidModule` for unknown or core modules.
    pub async fn create(&self, cmd: CreateRequestCommand) -> Result<ModuleRequest, LicensingError> {
        let definition = self.lifecycle.catalog().modules().licensable(&cmd.module_code)?;
        let now = self.clock.now();

        let request = ModuleRequest::new(
            cmd.organization_id,
            cmd.requested_by.clone(),
            definition.code.clone(),
            cmd.request_type,
            now,
        )
        .with_justification(cmd.justification)
        .with_expected_usage(cmd.expected_usage);
        self.requests.insert(&request).await?;

        info!(
            request_id = %request.id,
            organization_id = %request.organization_id,
            module_code = %request.module_code,
            request_type = %request.request_type,
            "Module request created"
        );
        publish_best_effort(
            self.event_publisher.as_ref(),
            LicensingEvent::for_key(
                &key_of(&request),
                Some(cmd.requested_by),
                now,
                LicenseChange::RequestCreated {
                    request_id: request.id,
                    request_type: request.request_type,
                },
            ),
        )
        .await;

        Ok(request)
    }

    /// Records a review and, on approval, applies it.
    ///
    /// # Errors
    ///
    /// - `RequestNotFound` if the id is unknown
    /// - `AlreadyReviewed` if the request left `pending`, including when a
    ///   concurrent review won the race
    ///
    /// Lifecycle failures after an approval are not errors here; they are
    /// returned in the outcome.
    pub async fn review(&self, cmd: ReviewRequestCommand) -> Result<ReviewOutcome, LicensingError> {
        let mut request = self
            .requests
            .find(&cmd.request_id)
            .await?
            .ok_or_else(|| LicensingError::request_not_found(cmd.request_id))?;

        let now = self.clock.now();
        request.review(cmd.reviewed_by.clone(), cmd.decision, cmd.review_notes, now)?;
        if !self.requests.mark_reviewed(&request).await? {
            return Err(LicensingError::already_reviewed(request.id));
        }

        info!(
            request_id = %request.id,
            organization_id = %request.organization_id,
            module_code = %request.module_code,
            decision = ?cmd.decision,
            "Module request reviewed"
        );
        publish_best_effort(
            self.event_publisher.as_ref(),
            LicensingEvent::for_key(
                &key_of(&request),
                Some(cmd.reviewed_by.clone()),
                now,
                LicenseChange::RequestReviewed {
                    request_id: request.id,
                    request_type: request.request_type,
                    decision: cmd.decision,
                },
            ),
        )
        .await;

        let dispatch = match cmd.decision {
            ReviewDecision::Rejected => None,
            ReviewDecision::Approved => {
                let result = self.dispatch(&request, cmd.reviewed_by, cmd.expires_at, now).await;
                if let Err(error) = &result {
                    warn!(
                        request_id = %request.id,
                        error_code = error.error_code(),
                        error = %error,
                        "Approved request could not be applied"
                    );
                }
                Some(result)
            }
        };

        Ok(ReviewOutcome { request, dispatch })
    }

    pub async fn get(&self, id: &ModuleRequestId) -> Result<ModuleRequest, LicensingError> {
        self.requests
            .find(id)
            .await?
            .ok_or_else(|| LicensingError::request_not_found(*id))
    }

    /// Pending requests across all organizations, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<ModuleRequest>, LicensingError> {
        Ok(self.requests.list_pending().await?)
    }

    /// One organization's requests, newest first.
    pub async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ModuleRequest>, LicensingError> {
        Ok(self.requests.list_for_organization(organization_id).await?)
    }

    async fn dispatch(
        &self,
        request: &ModuleRequest,
        reviewed_by: UserId,
        expires_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Result<License, LicensingError> {
        let organization_id = request.organization_id.clone();
        let module_code = request.module_code.to_string();
        let term_end = || match expires_at {
            Some(expires_at) => Ok(expires_at),
            None => now
                .checked_add_days(i64::from(self.default_term_days))
                .ok_or_else(|| {
                    LicensingError::validation("expires_at", "default term ends past the latest supported date")
                }),
        };

        match request.request_type {
            RequestType::Trial => {
                self.lifecycle
                    .start_trial(StartTrialCommand {
                        organization_id,
                        module_code,
                        requested_by: reviewed_by,
                        days: None,
                    })
                    .await
            }
            RequestType::Purchase | RequestType::Upgrade => {
                self.lifecycle
                    .activate(ActivateCommand {
                        organization_id,
                        module_code,
                        activated_by: reviewed_by,
                        expires_at: Some(term_end()?),
                        max_users: None,
                    })
                    .await
            }
            RequestType::Renewal => {
                self.lifecycle
                    .renew(RenewCommand {
                        organization_id,
                        module_code,
                        renewed_by: reviewed_by,
                        new_expires_at: term_end()?,
                    })
                    .await
            }
        }
    }
}

fn key_of(request: &ModuleRequest) -> LicenseKey {
    LicenseKey::new(request.organization_id.clone(), request.module_code.clone())
}
