//! HTTP handlers for licensing endpoints.
//!
//! These handlers connect Axum routes to the licensing services.

use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::licensing::{
    ActivateCommand, ActivateTierCommand, CreateRequestCommand, DeactivateCommand,
    EntitlementService, ExpirySweep, LifecycleManager, RenewCommand, RequestWorkflow,
    ReviewRequestCommand, StartTrialCommand, TrackUsageCommand, UsageTracker,
};
use crate::domain::foundation::{ModuleRequestId, OrganizationId, UserId};
use crate::domain::licensing::{Catalog, LicensingError};

use super::dto::{
    AccessQuery, AccessResponse, ActivateRequest, ActivateTierRequest, CatalogResponse,
    CreateModuleRequestRequest, DeactivateRequest, DependencyCheckResponse, ErrorResponse,
    ExpiringQuery, HealthResponse, LicenseListResponse, LicenseResponse, ModuleOverviewResponse,
    ModuleRequestListResponse, ModuleRequestResponse, RenewRequest, RequestListQuery,
    ReviewModuleRequestRequest, ReviewResponse, StartTrialRequest, SweepRunResponse,
    TierActivationResponse, TrackUsageRequest, UsageHistoryResponse, UsageQuery,
    UsageRecordResponse, UsageWarningsResponse,
};

/// Look-ahead for `GET /api/licensing/expiring` without `?days=`.
pub const DEFAULT_EXPIRING_DAYS: u32 = 30;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; every service sits behind an `Arc`.
#[derive(Clone)]
pub struct LicensingAppState {
    pub lifecycle: Arc<LifecycleManager>,
    pub entitlements: Arc<EntitlementService>,
    pub requests: Arc<RequestWorkflow>,
    pub usage: Arc<UsageTracker>,
    pub sweep: Arc<ExpirySweep>,
    pub catalog: Arc<Catalog>,
}

impl LicensingAppState {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        entitlements: Arc<EntitlementService>,
        requests: Arc<RequestWorkflow>,
        usage: Arc<UsageTracker>,
        sweep: Arc<ExpirySweep>,
        catalog: Arc<Catalog>,
    ) -> Self {
        Self {
            lifecycle,
            entitlements,
            requests,
            usage,
            sweep,
            catalog,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Actor identity taken from the `X-User-Id` header.
///
/// The gateway in front of this service authenticates the caller and
/// decides whether they may perform administrative operations.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = parts
                .headers
                .get("X-User-Id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| UserId::new(s).ok())
                .ok_or(AuthenticationRequired)?;

            Ok(AuthenticatedUser { user_id })
        })
    }
}

fn organization(raw: String) -> Result<OrganizationId, LicensingError> {
    Ok(OrganizationId::new(raw)?)
}

fn request_id(raw: &str) -> Result<ModuleRequestId, LicensingError> {
    raw.parse()
        .map_err(|_| LicensingError::validation("id", format!("'{}' is not a request id", raw)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Entitlement Queries
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/licensing/organizations/:org_id/modules/:module_code/access
pub async fn check_access(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path((org_id, module_code)): Path<(String, String)>,
    Query(query): Query<AccessQuery>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let decision = state
        .entitlements
        .resolve(&organization_id, &module_code, query.at)
        .await?;

    Ok(Json(AccessResponse::new(&organization_id, &module_code, decision)))
}

/// GET /api/licensing/organizations/:org_id/modules/:module_code/dependencies
pub async fn check_dependencies(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path((org_id, module_code)): Path<(String, String)>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let missing = state
        .entitlements
        .missing_dependencies(&organization_id, &module_code)
        .await?;

    Ok(Json(DependencyCheckResponse::new(&organization_id, &module_code, missing)))
}

/// GET /api/licensing/organizations/:org_id/licenses
pub async fn list_licenses(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let views = state.entitlements.list_licenses(&organization_id).await?;
    Ok(Json(LicenseListResponse::from(views)))
}

/// GET /api/licensing/organizations/:org_id/modules
pub async fn module_overview(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let modules = state.entitlements.module_overview(&organization_id).await?;
    Ok(Json(ModuleOverviewResponse { modules }))
}

/// GET /api/licensing/expiring?days=
pub async fn list_expiring(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Query(query): Query<ExpiringQuery>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let days = query.days.unwrap_or(DEFAULT_EXPIRING_DAYS);
    let views = state.entitlements.list_expiring(days).await?;
    Ok(Json(LicenseListResponse::from(views)))
}

/// GET /api/licensing/grace-period
pub async fn list_in_grace(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, LicensingApiError> {
    let views = state.entitlements.list_in_grace().await?;
    Ok(Json(LicenseListResponse::from(views)))
}

/// GET /api/licensing/catalog
pub async fn get_catalog(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    Json(CatalogResponse::from(state.catalog.as_ref()))
}

// ════════════════════════════════════════════════════════════════════════════════
// Lifecycle Commands
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/licensing/trials
pub async fn start_trial(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<StartTrialRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = StartTrialCommand {
        organization_id: request.organization_id,
        module_code: request.module_code,
        requested_by: user.user_id,
        days: request.days,
    };

    let license = state.lifecycle.start_trial(cmd).await?;
    Ok((StatusCode::CREATED, Json(LicenseResponse { license })))
}

/// POST /api/licensing/activations
pub async fn activate(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ActivateRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = ActivateCommand {
        organization_id: request.organization_id,
        module_code: request.module_code,
        activated_by: user.user_id,
        expires_at: request.expires_at,
        max_users: request.max_users,
    };

    let license = state.lifecycle.activate(cmd).await?;
    Ok(Json(LicenseResponse { license }))
}

/// POST /api/licensing/deactivations
pub async fn deactivate(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<DeactivateRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = DeactivateCommand {
        organization_id: request.organization_id,
        module_code: request.module_code,
        deactivated_by: user.user_id,
    };

    let license = state.lifecycle.deactivate(cmd).await?;
    Ok(Json(LicenseResponse { license }))
}

/// POST /api/licensing/renewals
pub async fn renew(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<RenewRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = RenewCommand {
        organization_id: request.organization_id,
        module_code: request.module_code,
        renewed_by: user.user_id,
        new_expires_at: request.new_expires_at,
    };

    let license = state.lifecycle.renew(cmd).await?;
    Ok(Json(LicenseResponse { license }))
}

/// POST /api/licensing/tier-activations
pub async fn activate_tier(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ActivateTierRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let tier = request.tier.clone();
    let cmd = ActivateTierCommand {
        organization_id: request.organization_id,
        tier: request.tier,
        activated_by: user.user_id,
        expires_at: request.expires_at,
    };

    let licenses = state.lifecycle.activate_tier(cmd).await?;
    Ok(Json(TierActivationResponse { tier, licenses }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Usage
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/licensing/usage
pub async fn track_usage(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Json(request): Json<TrackUsageRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = TrackUsageCommand {
        organization_id: request.organization_id,
        module_code: request.module_code,
        day: request.day,
        counters: request.counters,
    };

    let record = state.usage.track(cmd).await?;
    Ok(Json(UsageRecordResponse { record }))
}

/// GET /api/licensing/organizations/:org_id/usage?module_code=
pub async fn get_usage(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path(org_id): Path<String>,
    Query(query): Query<UsageQuery>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let records = state
        .usage
        .get_usage(&organization_id, query.module_code.as_deref())
        .await?;
    Ok(Json(UsageHistoryResponse { records }))
}

/// GET /api/licensing/organizations/:org_id/usage/warnings
pub async fn usage_warnings(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let organization_id = organization(org_id)?;
    let warnings = state.usage.warnings(&organization_id).await?;
    Ok(Json(UsageWarningsResponse { warnings }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Module Requests
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/module-requests
pub async fn create_request(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateModuleRequestRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = CreateRequestCommand {
        organization_id: request.organization_id,
        requested_by: user.user_id,
        module_code: request.module_code,
        request_type: request.request_type,
        justification: request.justification,
        expected_usage: request.expected_usage,
    };

    let request = state.requests.create(cmd).await?;
    Ok((StatusCode::CREATED, Json(ModuleRequestResponse { request })))
}

/// GET /api/module-requests/pending
pub async fn list_pending_requests(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, LicensingApiError> {
    let requests = state.requests.list_pending().await?;
    Ok(Json(ModuleRequestListResponse::from(requests)))
}

/// GET /api/module-requests?organization_id=
pub async fn list_organization_requests(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Query(query): Query<RequestListQuery>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let requests = state
        .requests
        .list_for_organization(&query.organization_id)
        .await?;
    Ok(Json(ModuleRequestListResponse::from(requests)))
}

/// GET /api/module-requests/:id
pub async fn get_request(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let request = state.requests.get(&request_id(&id)?).await?;
    Ok(Json(ModuleRequestResponse { request }))
}

/// POST /api/module-requests/:id/review
///
/// The review is recorded even when the approval's dispatch fails; the
/// failure is reported in the body's `dispatch` field.
pub async fn review_request(
    State(state): State<LicensingAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(request): Json<ReviewModuleRequestRequest>,
) -> Result<impl IntoResponse, LicensingApiError> {
    let cmd = ReviewRequestCommand {
        request_id: request_id(&id)?,
        reviewed_by: user.user_id,
        decision: request.decision,
        review_notes: request.review_notes,
        expires_at: request.expires_at,
    };

    let outcome = state.requests.review(cmd).await?;
    Ok(Json(ReviewResponse::from(outcome)))
}

/// POST /api/licensing/sweep/run
pub async fn run_sweep(
    State(state): State<LicensingAppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, LicensingApiError> {
    let report = state.sweep.run_now().await?;
    Ok(Json(SweepRunResponse { report }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts licensing errors to HTTP responses.
#[derive(Debug)]
pub struct LicensingApiError(LicensingError);

impl From<LicensingError> for LicensingApiError {
    fn from(err: LicensingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for LicensingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            LicensingError::NotFound(_) | LicensingError::RequestNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            LicensingError::AlreadyEntitled(_) | LicensingError::AlreadyReviewed(_) => {
                StatusCode::CONFLICT
            }
            LicensingError::InvalidModule { .. }
            | LicensingError::InvalidTier(_)
            | LicensingError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            LicensingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let error_code = self.0.error_code();
        let message = self.0.message();
        let body = match &self.0 {
            LicensingError::ValidationFailed { field, .. } => ErrorResponse::with_details(
                error_code,
                message,
                serde_json::json!({ "field": field }),
            ),
            LicensingError::InvalidModule { code, .. } => ErrorResponse::with_details(
                error_code,
                message,
                serde_json::json!({ "module_code": code }),
            ),
            _ => ErrorResponse::new(error_code, message),
        };
        (status, Json(body)).into_response()
    }
}
