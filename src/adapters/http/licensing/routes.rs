//! Route configuration for licensing endpoints.
//!
//! Configures Axum router with licensing-related routes.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    activate, activate_tier, check_access, check_dependencies, create_request, deactivate,
    get_catalog, get_request, get_usage, health, list_expiring, list_in_grace, list_licenses,
    list_organization_requests, list_pending_requests, module_overview, renew, review_request,
    run_sweep, start_trial, track_usage, usage_warnings, LicensingAppState,
};

/// Creates the licensing router with all endpoints.
///
/// Routes:
/// - `GET /api/licensing/organizations/:org_id/modules/:module_code/access?at=` - Resolve access
/// - `GET /api/licensing/organizations/:org_id/modules/:module_code/dependencies` - Unmet dependencies
/// - `GET /api/licensing/organizations/:org_id/licenses` - Stored licenses
/// - `GET /api/licensing/organizations/:org_id/modules` - Whole catalog with decisions
/// - `GET /api/licensing/organizations/:org_id/usage?module_code=` - Usage history
/// - `GET /api/licensing/organizations/:org_id/usage/warnings` - Soft-limit warnings
/// - `POST /api/licensing/trials` - Start trial
/// - `POST /api/licensing/activations` - Activate
/// - `POST /api/licensing/deactivations` - Deactivate
/// - `POST /api/licensing/renewals` - Renew
/// - `POST /api/licensing/tier-activations` - Activate a subscription tier
/// - `POST /api/licensing/usage` - Record a usage snapshot
/// - `GET /api/licensing/expiring?days=` - Expiring soon
/// - `GET /api/licensing/grace-period` - In grace
/// - `GET /api/licensing/catalog` - Module and tier catalogs
/// - `POST /api/licensing/sweep/run` - Run one expiry sweep pass now
/// - `POST /api/module-requests` - File a request
/// - `GET /api/module-requests?organization_id=` - Requests of one organization
/// - `GET /api/module-requests/pending` - Review queue
/// - `GET /api/module-requests/:id` - One request
/// - `POST /api/module-requests/:id/review` - Approve or reject
/// - `GET /health` - Liveness
pub fn licensing_router() -> Router<LicensingAppState> {
    Router::new()
        .route(
            "/api/licensing/organizations/:org_id/modules/:module_code/access",
            get(check_access),
        )
        .route(
            "/api/licensing/organizations/:org_id/modules/:module_code/dependencies",
            get(check_dependencies),
        )
        .route("/api/licensing/organizations/:org_id/licenses", get(list_licenses))
        .route("/api/licensing/organizations/:org_id/modules", get(module_overview))
        .route("/api/licensing/organizations/:org_id/usage", get(get_usage))
        .route(
            "/api/licensing/organizations/:org_id/usage/warnings",
            get(usage_warnings),
        )
        .route("/api/licensing/trials", post(start_trial))
        .route("/api/licensing/activations", post(activate))
        .route("/api/licensing/deactivations", post(deactivate))
        .route("/api/licensing/renewals", post(renew))
        .route("/api/licensing/tier-activations", post(activate_tier))
        .route("/api/licensing/usage", post(track_usage))
        .route("/api/licensing/expiring", get(list_expiring))
        .route("/api/licensing/grace-period", get(list_in_grace))
        .route("/api/licensing/catalog", get(get_catalog))
        .route("/api/licensing/sweep/run", post(run_sweep))
        .route(
            "/api/module-requests",
            get(list_organization_requests).post(create_request),
        )
        .route("/api/module-requests/pending", get(list_pending_requests))
        .route("/api/module-requests/:id", get(get_request))
        .route("/api/module-requests/:id/review", post(review_request))
        .route("/health", get(health))
}
