//! Module request records.
//!
//! A request is an append-only audit record of someone asking for a trial,
//! purchase, upgrade or renewal. The only mutation it ever sees is a single
//! review, which moves it out of `pending` for good.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    ModuleRequestId, OrganizationId, StateMachine, Timestamp, UserId, ValidationError,
};

use super::{LicensingError, ModuleCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Trial,
    Purchase,
    Upgrade,
    Renewal,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Trial => "trial",
            RequestType::Purchase => "purchase",
            RequestType::Upgrade => "upgrade",
            RequestType::Renewal => "renewal",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(RequestType::Trial),
            "purchase" => Ok(RequestType::Purchase),
            "upgrade" => Ok(RequestType::Upgrade),
            "renewal" => Ok(RequestType::Renewal),
            other => Err(ValidationError::invalid_format(
                "request_type",
                format!("unknown request type '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(ValidationError::invalid_format(
                "request_status",
                format!("unknown request status '{}'", other),
            )),
        }
    }
}

impl StateMachine for RequestStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RequestStatus::*;
        matches!((self, target), (Pending, Approved) | (Pending, Rejected))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RequestStatus::*;
        match self {
            Pending => vec![Approved, Rejected],
            Approved | Rejected => vec![],
        }
    }
}

/// Reviewer's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for RequestStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => RequestStatus::Approved,
            ReviewDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRequest {
    pub id: ModuleRequestId,
    pub organization_id: OrganizationId,
    pub requested_by: UserId,
    pub module_code: ModuleCode,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub justification: Option<String>,
    pub expected_usage: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ModuleRequest {
    pub fn new(
        organization_id: OrganizationId,
        requested_by: UserId,
        module_code: ModuleCode,
        request_type: RequestType,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: ModuleRequestId::new(),
            organization_id,
            requested_by,
            module_code,
            request_type,
            status: RequestStatus::Pending,
            justification: None,
            expected_usage: None,
            reviewed_by: None,
            review_notes: None,
            reviewed_at: None,
            created_at,
        }
    }

    pub fn with_justification(mut self, justification: Option<String>) -> Self {
        self.justification = non_blank(justification);
        self
    }

    pub fn with_expected_usage(mut self, expected_usage: Option<String>) -> Self {
        self.expected_usage = non_blank(expected_usage);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Records the single review this request will ever get.
    pub fn review(
        &mut self,
        reviewed_by: UserId,
        decision: ReviewDecision,
        review_notes: Option<String>,
        now: Timestamp,
    ) -> Result<(), LicensingError> {
        self.status = self
            .status
            .transition_to(decision.into())
            .map_err(|_| LicensingError::already_reviewed(self.id))?;
        self.reviewed_by = Some(reviewed_by);
        self.review_notes = non_blank(review_notes);
        self.reviewed_at = Some(now);
        Ok(())
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
