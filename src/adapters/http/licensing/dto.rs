//! HTTP DTOs (Data Transfer Objects) for licensing endpoints.
//!
//! These types define the JSON request/response structure for the licensing API.
//! Domain records that are already `Serialize` are embedded as-is.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::application::licensing::{
    DispatchSummary, LicenseView, ModuleAccess, ReviewOutcome, SweepReport,
};
use crate::domain::foundation::{OrganizationId, Timestamp};
use crate::domain::licensing::{
    AccessMode, Catalog, Decision, DecisionReason, License, ModuleCode, ModuleDefinition,
    ModuleRequest, RequestType, ReviewDecision, SoftLimitWarning, TierCatalog, UsageCounters,
    UsageRecord,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a trial.
#[derive(Debug, Clone, Deserialize)]
pub struct StartTrialRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
    /// Trial length; the server default applies when absent.
    #[serde(default)]
    pub days: Option<u32>,
}

/// Request to activate a module.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
    /// Absent means perpetual.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
    #[serde(default)]
    pub max_users: Option<u32>,
}

/// Request to deactivate a module.
#[derive(Debug, Clone, Deserialize)]
pub struct DeactivateRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
}

/// Request to move a License's expiry.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub new_expires_at: Timestamp,
}

/// Request to activate every module of a subscription tier.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateTierRequest {
    pub organization_id: OrganizationId,
    pub tier: String,
    /// Overrides every module's default duration.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

/// One day's usage snapshot. Counters sit at the top level of the body.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackUsageRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub day: NaiveDate,
    #[serde(flatten)]
    pub counters: UsageCounters,
}

/// Request to file a module request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateModuleRequestRequest {
    pub organization_id: OrganizationId,
    pub module_code: String,
    pub request_type: RequestType,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub expected_usage: Option<String>,
}

/// Reviewer's verdict on a pending request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewModuleRequestRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub review_notes: Option<String>,
    /// Replaces the default term for purchase, upgrade and renewal approvals.
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Parameters
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessQuery {
    /// Resolve at this instant instead of now.
    #[serde(default)]
    pub at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpiringQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageQuery {
    #[serde(default)]
    pub module_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestListQuery {
    pub organization_id: OrganizationId,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Access decision for one (organization, module) pair.
#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    pub organization_id: String,
    pub module_code: String,
    pub mode: AccessMode,
    pub reason: DecisionReason,
    /// Human-readable reason.
    pub message: String,
    pub can_read: bool,
    pub can_write: bool,
}

impl AccessResponse {
    pub fn new(organization_id: &OrganizationId, module_code: &str, decision: Decision) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            module_code: module_code.to_string(),
            mode: decision.mode,
            reason: decision.reason,
            message: decision.reason.message().to_string(),
            can_read: decision.mode.allows_read(),
            can_write: decision.mode.allows_write(),
        }
    }
}

/// Dependencies a module still needs before it is usable.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyCheckResponse {
    pub organization_id: String,
    pub module_code: String,
    pub satisfied: bool,
    pub missing: Vec<ModuleCode>,
}

impl DependencyCheckResponse {
    pub fn new(organization_id: &OrganizationId, module_code: &str, missing: Vec<ModuleCode>) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            module_code: module_code.to_string(),
            satisfied: missing.is_empty(),
            missing,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseResponse {
    pub license: License,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseListResponse {
    pub licenses: Vec<LicenseView>,
    pub total: usize,
}

impl From<Vec<LicenseView>> for LicenseListResponse {
    fn from(licenses: Vec<LicenseView>) -> Self {
        Self {
            total: licenses.len(),
            licenses,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleOverviewResponse {
    pub modules: Vec<ModuleAccess>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierActivationResponse {
    pub tier: String,
    pub licenses: Vec<License>,
}

/// Module and tier catalogs as configured on this server.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogResponse {
    pub modules: Vec<ModuleDefinition>,
    pub tiers: TierCatalog,
}

impl From<&Catalog> for CatalogResponse {
    fn from(catalog: &Catalog) -> Self {
        Self {
            modules: catalog.modules().iter().cloned().collect(),
            tiers: catalog.tiers().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageRecordResponse {
    pub record: UsageRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageHistoryResponse {
    pub records: Vec<UsageRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageWarningsResponse {
    pub warnings: Vec<SoftLimitWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleRequestResponse {
    pub request: ModuleRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleRequestListResponse {
    pub requests: Vec<ModuleRequest>,
    pub total: usize,
}

impl From<Vec<ModuleRequest>> for ModuleRequestListResponse {
    fn from(requests: Vec<ModuleRequest>) -> Self {
        Self {
            total: requests.len(),
            requests,
        }
    }
}

/// A recorded review. `dispatch` is absent for rejections.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub request: ModuleRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchSummary>,
}

impl From<ReviewOutcome> for ReviewResponse {
    fn from(outcome: ReviewOutcome) -> Self {
        Self {
            dispatch: outcome.dispatch.as_ref().map(DispatchSummary::from),
            request: outcome.request,
        }
    }
}

/// Result of an operator-triggered expiry sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRunResponse {
    pub report: SweepReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::licensing::{ModuleCode, ModuleTier};

    #[test]
    fn track_usage_request_reads_flat_counters() {
        let json = r#"{
            "organization_id": "org-a",
            "module_code": "meter_reading",
            "day": "2024-09-01",
            "active_users": 12,
            "api_calls": 300
        }"#;
        let request: TrackUsageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.counters.active_users, 12);
        assert_eq!(request.counters.api_calls, 300);
        assert_eq!(request.counters.transactions, 0);
    }

    #[test]
    fn activate_request_defaults_to_perpetual() {
        let json = r#"{"organization_id": "org-a", "module_code": "meter_reading"}"#;
        let request: ActivateRequest = serde_json::from_str(json).unwrap();
        assert!(request.expires_at.is_none());
        assert!(request.max_users.is_none());
    }

    #[test]
    fn review_request_parses_decision() {
        let json = r#"{"decision": "rejected", "review_notes": "budget"}"#;
        let request: ReviewModuleRequestRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.decision, ReviewDecision::Rejected);
    }

    #[test]
    fn blank_organization_id_is_rejected() {
        let json = r#"{"organization_id": "", "module_code": "meter_reading"}"#;
        assert!(serde_json::from_str::<DeactivateRequest>(json).is_err());
    }

    #[test]
    fn access_response_flags_follow_mode() {
        let org = OrganizationId::new("org-a").unwrap();
        let decision = crate::domain::licensing::resolve(
            None,
            &ModuleDefinition::new(
                ModuleCode::new("meter_reading").unwrap(),
                "Meter Reading",
                ModuleTier::Standard,
            ),
            Timestamp::now(),
            &Default::default(),
        );

        let response = AccessResponse::new(&org, "meter_reading", decision);

        assert_eq!(response.mode, AccessMode::Locked);
        assert!(!response.can_read);
        assert!(!response.can_write);
        assert_eq!(response.message, "not licensed");
    }

    #[test]
    fn review_response_omits_dispatch_for_rejections() {
        let request = ModuleRequest::new(
            OrganizationId::new("org-a").unwrap(),
            UserId::new("user-1").unwrap(),
            ModuleCode::new("meter_reading").unwrap(),
            RequestType::Purchase,
            Timestamp::now(),
        );
        let response = ReviewResponse::from(ReviewOutcome {
            request,
            dispatch: None,
        });

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("dispatch").is_none());
    }

    #[test]
    fn dependency_check_is_satisfied_without_missing_modules() {
        let org = OrganizationId::new("org-a").unwrap();

        let satisfied = DependencyCheckResponse::new(&org, "failure_analysis", vec![]);
        let blocked = DependencyCheckResponse::new(
            &org,
            "predictive_maintenance",
            vec![ModuleCode::new("meter_reading").unwrap()],
        );

        assert!(satisfied.satisfied);
        assert!(!blocked.satisfied);
        assert_eq!(serde_json::to_value(&blocked).unwrap()["missing"][0], "meter_reading");
    }

    #[test]
    fn error_response_with_details_includes_details() {
        let details = serde_json::json!({"field": "expires_at"});
        let response = ErrorResponse::with_details("VALIDATION_FAILED", "Invalid", details.clone());
        assert_eq!(response.details, Some(details));
    }
}
