//! Licensing domain events.
//!
//! Every successful lifecycle mutation and request transition emits one
//! event. Together they form the access log: who granted, extended or
//! revoked what, and when. The expiry sweep emits the time-driven
//! notifications (`expiring_soon`, `grace_started`, `lapsed`).

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainEvent, EventEnvelope, EventId, ModuleRequestId, OrganizationId, Timestamp, UserId,
};

use super::{LicenseKey, ModuleCode, RequestType, ReviewDecision};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum LicenseChange {
    TrialStarted {
        expires_at: Timestamp,
    },
    Activated {
        expires_at: Option<Timestamp>,
        max_users: Option<u32>,
    },
    Deactivated,
    Renewed {
        previous_expires_at: Option<Timestamp>,
        new_expires_at: Timestamp,
    },
    TierActivated {
        tier: String,
        module_codes: Vec<ModuleCode>,
        expires_at: Option<Timestamp>,
    },
    ExpiringSoon {
        expires_at: Timestamp,
        days_remaining: u32,
    },
    GraceStarted {
        expires_at: Timestamp,
        grace_ends_at: Timestamp,
    },
    Lapsed {
        expires_at: Timestamp,
    },
    RequestCreated {
        request_id: ModuleRequestId,
        request_type: RequestType,
    },
    RequestReviewed {
        request_id: ModuleRequestId,
        request_type: RequestType,
        decision: ReviewDecision,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicensingEvent {
    pub event_id: EventId,
    pub organization_id: OrganizationId,
    pub module_code: Option<ModuleCode>,
    /// `None` for changes nobody initiated, e.g. expiry notifications.
    pub actor: Option<UserId>,
    pub occurred_at: Timestamp,
    #[serde(flatten)]
    pub change: LicenseChange,
}

impl LicensingEvent {
    /// Event about one (organization, module) License or request.
    pub fn for_key(
        key: &LicenseKey,
        actor: Option<UserId>,
        occurred_at: Timestamp,
        change: LicenseChange,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            organization_id: key.organization_id.clone(),
            module_code: Some(key.module_code.clone()),
            actor,
            occurred_at,
            change,
        }
    }

    /// Event about an organization as a whole (tier activation).
    pub fn for_organization(
        organization_id: OrganizationId,
        actor: Option<UserId>,
        occurred_at: Timestamp,
        change: LicenseChange,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            organization_id,
            module_code: None,
            actor,
            occurred_at,
            change,
        }
    }

    /// Wraps the event for publishing, tagging the actor for audit.
    pub fn to_envelope(&self) -> EventEnvelope {
        let envelope = EventEnvelope::from_event(self);
        match &self.actor {
            Some(actor) => envelope.with_user_id(actor.as_str()),
            None => envelope,
        }
    }
}

impl DomainEvent for LicensingEvent {
    fn event_type(&self) -> &'static str {
        match self.change {
            LicenseChange::TrialStarted { .. } => "license.trial_started.v1",
            LicenseChange::Activated { .. } => "license.activated.v1",
            LicenseChange::Deactivated => "license.deactivated.v1",
            LicenseChange::Renewed { .. } => "license.renewed.v1",
            LicenseChange::TierActivated { .. } => "license.tier_activated.v1",
            LicenseChange::ExpiringSoon { .. } => "license.expiring_soon.v1",
            LicenseChange::GraceStarted { .. } => "license.grace_started.v1",
            LicenseChange::Lapsed { .. } => "license.lapsed.v1",
            LicenseChange::RequestCreated { .. } => "module_request.created.v1",
            LicenseChange::RequestReviewed { .. } => "module_request.reviewed.v1",
        }
    }

    fn schema_version(&self) -> u32 {
        1
    }

    fn aggregate_id(&self) -> String {
        match (&self.change, &self.module_code) {
            (LicenseChange::RequestCreated { request_id, .. }, _)
            | (LicenseChange::RequestReviewed { request_id, .. }, _) => request_id.to_string(),
            (_, Some(module_code)) => format!("{}/{}", self.organization_id, module_code),
            (_, None) => self.organization_id.to_string(),
        }
    }

    fn aggregate_type(&self) -> &'static str {
        match (&self.change, &self.module_code) {
            (LicenseChange::RequestCreated { .. }, _)
            | (LicenseChange::RequestReviewed { .. }, _) => "ModuleRequest",
            (_, Some(_)) => "License",
            (_, None) => "Organization",
        }
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn event_id(&self) -> EventId {
        self.event_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LicenseKey {
        LicenseKey::new(
            OrganizationId::new("org-a").unwrap(),
            ModuleCode::new("safety_compliance").unwrap(),
        )
    }

    #[test]
    fn license_event_envelope_carries_actor_and_key() {
        let event = LicensingEvent::for_key(
            &key(),
            Some(UserId::new("operator-1").unwrap()),
            Timestamp::now(),
            LicenseChange::Deactivated,
        );

        let envelope = event.to_envelope();

        assert_eq!(envelope.event_type, "license.deactivated.v1");
        assert_eq!(envelope.aggregate_type, "License");
        assert_eq!(envelope.aggregate_id, "org-a/safety_compliance");
        assert_eq!(envelope.metadata.user_id.as_deref(), Some("operator-1"));
        assert_eq!(envelope.payload["change"], "deactivated");
    }

    #[test]
    fn tier_event_is_scoped_to_the_organization() {
        let event = LicensingEvent::for_organization(
            OrganizationId::new("org-a").unwrap(),
            Some(UserId::system()),
            Timestamp::now(),
            LicenseChange::TierActivated {
                tier: "professional".to_string(),
                module_codes: vec![],
                expires_at: None,
            },
        );

        assert_eq!(event.aggregate_type(), "Organization");
        assert_eq!(event.aggregate_id(), "org-a");
    }

    #[test]
    fn request_events_are_keyed_by_request_id() {
        let request_id = ModuleRequestId::new();
        let event = LicensingEvent::for_key(
            &key(),
            None,
            Timestamp::now(),
            LicenseChange::RequestReviewed {
                request_id,
                request_type: RequestType::Trial,
                decision: ReviewDecision::Approved,
            },
        );

        assert_eq!(event.event_type(), "module_request.reviewed.v1");
        assert_eq!(event.aggregate_id(), request_id.to_string());
    }

    #[test]
    fn payload_deserializes_back_into_the_event() {
        let event = LicensingEvent::for_key(
            &key(),
            None,
            Timestamp::now(),
            LicenseChange::ExpiringSoon {
                expires_at: Timestamp::now().add_days(7),
                days_remaining: 7,
            },
        );

        let parsed: LicensingEvent = event.to_envelope().payload_as().unwrap();
        assert_eq!(parsed, event);
    }
}
