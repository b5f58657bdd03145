//! Licensing engine error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | RequestNotFound | 404 |
//! | AlreadyEntitled | 409 |
//! | AlreadyReviewed | 409 |
//! | InvalidModule | 400 |
//! | InvalidTier | 400 |
//! | ValidationFailed | 400 |
//! | StoreUnavailable | 503 |

use crate::domain::foundation::{DomainError, ModuleRequestId, ValidationError};

use super::{LicenseKey, ModuleCode};

/// Errors returned by the lifecycle manager, request workflow and usage tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicensingError {
    /// No License row exists for the key.
    NotFound(LicenseKey),

    /// No ModuleRequest exists with this id.
    RequestNotFound(ModuleRequestId),

    /// A live trial or active License already exists.
    AlreadyEntitled(LicenseKey),

    /// The request has already been approved or rejected.
    AlreadyReviewed(ModuleRequestId),

    /// The module code is unknown or cannot be licensed.
    InvalidModule { code: String, reason: String },

    /// The tier is not in the tier catalog.
    InvalidTier(String),

    /// An argument violates a License or request invariant.
    ValidationFailed { field: String, message: String },

    /// The backing store failed; safe to retry.
    StoreUnavailable(String),
}

impl LicensingError {
    pub fn not_found(key: LicenseKey) -> Self {
        LicensingError::NotFound(key)
    }

    pub fn request_not_found(id: ModuleRequestId) -> Self {
        LicensingError::RequestNotFound(id)
    }

    pub fn already_entitled(key: LicenseKey) -> Self {
        LicensingError::AlreadyEntitled(key)
    }

    pub fn already_reviewed(id: ModuleRequestId) -> Self {
        LicensingError::AlreadyReviewed(id)
    }

    pub fn unknown_module(code: impl Into<String>) -> Self {
        LicensingError::InvalidModule {
            code: code.into(),
            reason: "not in the module catalog".to_string(),
        }
    }

    pub fn core_module(code: &ModuleCode) -> Self {
        LicensingError::InvalidModule {
            code: code.to_string(),
            reason: "core modules are always entitled".to_string(),
        }
    }

    pub fn invalid_module(code: impl Into<String>, reason: impl Into<String>) -> Self {
        LicensingError::InvalidModule {
            code: code.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_tier(tier: impl Into<String>) -> Self {
        LicensingError::InvalidTier(tier.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        LicensingError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        LicensingError::StoreUnavailable(message.into())
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            LicensingError::NotFound(_) => "NOT_FOUND",
            LicensingError::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            LicensingError::AlreadyEntitled(_) => "ALREADY_ENTITLED",
            LicensingError::AlreadyReviewed(_) => "ALREADY_REVIEWED",
            LicensingError::InvalidModule { .. } => "INVALID_MODULE",
            LicensingError::InvalidTier(_) => "INVALID_TIER",
            LicensingError::ValidationFailed { .. } => "VALIDATION_FAILED",
            LicensingError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            LicensingError::NotFound(key) => format!("No license found for {}", key),
            LicensingError::RequestNotFound(id) => format!("Module request not found: {}", id),
            LicensingError::AlreadyEntitled(key) => {
                format!("{} already has a live license", key)
            }
            LicensingError::AlreadyReviewed(id) => {
                format!("Module request {} has already been reviewed", id)
            }
            LicensingError::InvalidModule { code, reason } => {
                format!("Invalid module '{}': {}", code, reason)
            }
            LicensingError::InvalidTier(tier) => format!("Unknown subscription tier: {}", tier),
            LicensingError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            LicensingError::StoreUnavailable(msg) => format!("License store unavailable: {}", msg),
        }
    }

    /// Returns true if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LicensingError::StoreUnavailable(_))
    }

    /// Outcomes callers treat as "nothing to do" rather than failures.
    pub fn is_nothing_to_do(&self) -> bool {
        matches!(
            self,
            LicensingError::AlreadyEntitled(_) | LicensingError::AlreadyReviewed(_)
        )
    }
}

impl std::fmt::Display for LicensingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for LicensingError {}

impl From<DomainError> for LicensingError {
    fn from(err: DomainError) -> Self {
        if err.is_infrastructure() {
            return LicensingError::store_unavailable(err.to_string());
        }
        let field = err
            .details
            .get("field")
            .cloned()
            .unwrap_or_else(|| "input".to_string());
        LicensingError::validation(field, err.message)
    }
}

impl From<ValidationError> for LicensingError {
    fn from(err: ValidationError) -> Self {
        LicensingError::validation(err.field().to_string(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::OrganizationId;

    fn key() -> LicenseKey {
        LicenseKey::new(
            OrganizationId::new("org-1").unwrap(),
            ModuleCode::new("meter_reading").unwrap(),
        )
    }

    #[test]
    fn store_errors_are_the_only_retryable_kind() {
        assert!(LicensingError::store_unavailable("timeout").is_retryable());
        assert!(!LicensingError::not_found(key()).is_retryable());
        assert!(!LicensingError::already_entitled(key()).is_retryable());
    }

    #[test]
    fn database_domain_errors_become_store_unavailable() {
        let err: LicensingError = DomainError::database("connection reset").into();
        assert!(matches!(err, LicensingError::StoreUnavailable(_)));
    }

    #[test]
    fn validation_domain_errors_keep_their_field() {
        let err: LicensingError = DomainError::validation("expires_at", "in the past").into();
        assert_eq!(
            err,
            LicensingError::validation("expires_at", "in the past")
        );
    }

    #[test]
    fn core_module_error_explains_itself() {
        let code = ModuleCode::new("user_management").unwrap();
        let err = LicensingError::core_module(&code);
        assert_eq!(err.error_code(), "INVALID_MODULE");
        assert_eq!(
            err.to_string(),
            "Invalid module 'user_management': core modules are always entitled"
        );
    }

    #[test]
    fn conflicts_are_nothing_to_do() {
        assert!(LicensingError::already_entitled(key()).is_nothing_to_do());
        assert!(LicensingError::already_reviewed(ModuleRequestId::new()).is_nothing_to_do());
        assert!(!LicensingError::not_found(key()).is_nothing_to_do());
    }
}
