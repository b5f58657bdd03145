//! Integration tests for the licensing engine.
//!
//! These tests drive the services end-to-end over the in-memory adapters:
//! 1. Lifecycle operations write Licenses and publish the access log
//! 2. Entitlement resolution honours the grace window at both edges
//! 3. The request workflow dispatches approvals exactly once
//! 4. Per-key writes never tear under concurrency

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use futures::future::join_all;
use proptest::prelude::*;

use cmms_licensing::adapters::events::InMemoryEventBus;
use cmms_licensing::adapters::memory::{InMemoryLicenseStore, InMemoryRequestStore};
use cmms_licensing::application::licensing::{
    ActivateCommand, ActivateTierCommand, CreateRequestCommand, DeactivateCommand,
    EntitlementService, LifecycleManager, RequestWorkflow, ReviewRequestCommand,
    StartTrialCommand,
};
use cmms_licensing::domain::foundation::{OrganizationId, Timestamp, UserId};
use cmms_licensing::domain::licensing::{
    AccessMode, Catalog, GracePolicy, LicenseKey, LicenseStatus, LicensingError, ModuleCatalog,
    ModuleCode, ModuleDefinition, ModuleTier, RequestStatus, RequestType, ReviewDecision,
    TierCatalog,
};
use cmms_licensing::ports::{LicenseStore, MockClock};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn t0() -> Timestamp {
    Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
}

fn org(id: &str) -> OrganizationId {
    OrganizationId::new(id).unwrap()
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn key(org_id: &str, module: &str) -> LicenseKey {
    LicenseKey::new(org(org_id), ModuleCode::new(module).unwrap())
}

/// All services wired over shared in-memory stores and one mock clock.
struct Engine {
    clock: Arc<MockClock>,
    licenses: Arc<InMemoryLicenseStore>,
    events: Arc<InMemoryEventBus>,
    lifecycle: Arc<LifecycleManager>,
    entitlements: EntitlementService,
    requests: RequestWorkflow,
}

impl Engine {
    fn new() -> Self {
        Self::with_catalog(Catalog::builtin())
    }

    fn with_catalog(catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        let clock = Arc::new(MockClock::new(t0()));
        let licenses = Arc::new(InMemoryLicenseStore::new());
        let events = Arc::new(InMemoryEventBus::new());
        let grace = GracePolicy::default();

        let lifecycle = Arc::new(LifecycleManager::new(
            licenses.clone(),
            events.clone(),
            catalog.clone(),
            clock.clone(),
            grace,
        ));
        let entitlements =
            EntitlementService::new(licenses.clone(), catalog, clock.clone(), grace);
        let requests = RequestWorkflow::new(
            Arc::new(InMemoryRequestStore::new()),
            lifecycle.clone(),
            events.clone(),
            clock.clone(),
        );

        Self {
            clock,
            licenses,
            events,
            lifecycle,
            entitlements,
            requests,
        }
    }

    async fn mode_at(&self, org_id: &str, module: &str, at: Timestamp) -> AccessMode {
        self.entitlements
            .resolve(&org(org_id), module, Some(at))
            .await
            .unwrap()
            .mode
    }

    async fn trial(&self, org_id: &str, module: &str, days: u32) -> Result<(), LicensingError> {
        self.lifecycle
            .start_trial(StartTrialCommand {
                organization_id: org(org_id),
                module_code: module.to_string(),
                requested_by: user("u1"),
                days: Some(days),
            })
            .await
            .map(|_| ())
    }

    fn activate_cmd(
        org_id: &str,
        module: &str,
        expires_at: Option<Timestamp>,
        max_users: Option<u32>,
    ) -> ActivateCommand {
        ActivateCommand {
            organization_id: org(org_id),
            module_code: module.to_string(),
            activated_by: user("ops"),
            expires_at,
            max_users,
        }
    }
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn trial_walks_through_full_grace_and_locked() {
    let engine = Engine::new();
    engine.trial("A", "inventory_management", 30).await.unwrap();

    assert_eq!(
        engine.mode_at("A", "inventory_management", t0().add_days(29)).await,
        AccessMode::Full
    );
    assert_eq!(
        engine.mode_at("A", "inventory_management", t0().add_days(35)).await,
        AccessMode::ReadOnly
    );
    assert_eq!(
        engine.mode_at("A", "inventory_management", t0().add_days(40)).await,
        AccessMode::Locked
    );
}

#[tokio::test]
async fn grace_window_edges_are_exact() {
    let engine = Engine::new();
    let expires_at = t0().add_days(10);
    engine
        .lifecycle
        .activate(Engine::activate_cmd("A", "meter_reading", Some(expires_at), None))
        .await
        .unwrap();

    let cases = [
        (expires_at, AccessMode::Full),
        (expires_at.plus(Duration::seconds(1)), AccessMode::ReadOnly),
        (
            expires_at.plus(Duration::days(6) + Duration::hours(23)),
            AccessMode::ReadOnly,
        ),
        (expires_at.plus(Duration::days(7)), AccessMode::ReadOnly),
        (
            expires_at.plus(Duration::days(7) + Duration::seconds(1)),
            AccessMode::Locked,
        ),
        (expires_at.plus(Duration::days(8)), AccessMode::Locked),
    ];
    for (at, expected) in cases {
        assert_eq!(engine.mode_at("A", "meter_reading", at).await, expected, "at {}", at);
    }
}

#[tokio::test]
async fn unlicensed_modules_are_locked_except_core() {
    let engine = Engine::new();
    let overview = engine.entitlements.module_overview(&org("A")).await.unwrap();

    for access in overview {
        let expected = if access.module.tier == ModuleTier::Core {
            AccessMode::Full
        } else {
            AccessMode::Locked
        };
        assert_eq!(access.decision.mode, expected, "{}", access.module.code);
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn activate_twice_keeps_one_row_with_second_arguments() {
    let engine = Engine::new();
    let first = Engine::activate_cmd("A", "meter_reading", Some(t0().add_days(30)), Some(5));
    let second = Engine::activate_cmd("A", "meter_reading", Some(t0().add_days(90)), Some(25));

    engine.lifecycle.activate(first).await.unwrap();
    engine.lifecycle.activate(second).await.unwrap();

    assert_eq!(engine.licenses.len().await, 1);
    let stored = engine.licenses.get(&key("A", "meter_reading")).await.unwrap().unwrap();
    assert_eq!(stored.status, LicenseStatus::Active);
    assert_eq!(stored.expires_at, Some(t0().add_days(90)));
    assert_eq!(stored.max_users, Some(25));
}

#[tokio::test]
async fn second_trial_is_already_entitled_and_changes_nothing() {
    let engine = Engine::new();
    engine.trial("A", "meter_reading", 30).await.unwrap();
    let original = engine.licenses.get(&key("A", "meter_reading")).await.unwrap().unwrap();

    engine.clock.advance(Duration::days(3));
    let err = engine.trial("A", "meter_reading", 30).await.unwrap_err();

    assert!(matches!(err, LicensingError::AlreadyEntitled(_)));
    assert!(err.is_nothing_to_do());
    let after = engine.licenses.get(&key("A", "meter_reading")).await.unwrap().unwrap();
    assert_eq!(after.expires_at, original.expires_at);
    assert_eq!(engine.events.events_of_type("license.trial_started.v1").len(), 1);
}

#[tokio::test]
async fn deactivate_then_activate_restores_full_access() {
    let engine = Engine::new();
    engine
        .lifecycle
        .activate(Engine::activate_cmd("A", "document_management", None, None))
        .await
        .unwrap();

    engine
        .lifecycle
        .deactivate(DeactivateCommand {
            organization_id: org("A"),
            module_code: "document_management".to_string(),
            deactivated_by: user("ops"),
        })
        .await
        .unwrap();
    assert_eq!(
        engine.mode_at("A", "document_management", t0()).await,
        AccessMode::Locked
    );

    engine
        .lifecycle
        .activate(Engine::activate_cmd("A", "document_management", None, None))
        .await
        .unwrap();
    assert_eq!(
        engine.mode_at("A", "document_management", t0()).await,
        AccessMode::Full
    );
}

#[tokio::test]
async fn professional_tier_activates_exactly_its_modules() {
    let code = |c: &str| ModuleCode::new(c).unwrap();
    let modules = ModuleCatalog::new([
        ModuleDefinition::new(code("work_order_basic"), "Work Orders", ModuleTier::Core),
        ModuleDefinition::new(code("preventive_maintenance"), "PM", ModuleTier::Standard),
        ModuleDefinition::new(code("inventory_management"), "Inventory", ModuleTier::Standard),
        ModuleDefinition::new(code("meter_reading"), "Meters", ModuleTier::Standard),
    ])
    .unwrap();
    let tiers = TierCatalog::default().with_tier(
        "professional",
        [
            (code("preventive_maintenance"), 365),
            (code("inventory_management"), 365),
        ],
    );
    let engine = Engine::with_catalog(Catalog::new(modules, tiers).unwrap());

    let licenses = engine
        .lifecycle
        .activate_tier(ActivateTierCommand {
            organization_id: org("A"),
            tier: "professional".to_string(),
            activated_by: user("ops"),
            expires_at: None,
        })
        .await
        .unwrap();

    assert_eq!(licenses.len(), 2);
    assert_eq!(engine.licenses.len().await, 2);
    for license in &licenses {
        assert_eq!(license.status, LicenseStatus::Active);
        assert_eq!(license.expires_at, Some(t0().add_days(365)));
    }
    assert_eq!(
        engine.mode_at("A", "meter_reading", t0()).await,
        AccessMode::Locked
    );
}

// =============================================================================
// Request Workflow
// =============================================================================

#[tokio::test]
async fn reviewing_an_approved_request_changes_no_license() {
    let engine = Engine::new();
    let request = engine
        .requests
        .create(CreateRequestCommand {
            organization_id: org("A"),
            requested_by: user("tech-7"),
            module_code: "meter_reading".to_string(),
            request_type: RequestType::Purchase,
            justification: Some("meters on every pump".to_string()),
            expected_usage: None,
        })
        .await
        .unwrap();

    let review = |by: &str, decision| ReviewRequestCommand {
        request_id: request.id,
        reviewed_by: user(by),
        decision,
        review_notes: None,
        expires_at: None,
    };

    let outcome = engine
        .requests
        .review(review("admin-1", ReviewDecision::Approved))
        .await
        .unwrap();
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert!(!outcome.dispatch_failed());
    let licensed = engine.licenses.get(&key("A", "meter_reading")).await.unwrap();

    engine.clock.advance(Duration::hours(1));
    let err = engine
        .requests
        .review(review("admin-2", ReviewDecision::Approved))
        .await
        .unwrap_err();

    assert!(matches!(err, LicensingError::AlreadyReviewed(_)));
    assert_eq!(
        engine.licenses.get(&key("A", "meter_reading")).await.unwrap(),
        licensed
    );
    assert_eq!(engine.events.events_of_type("license.activated.v1").len(), 1);
}

#[tokio::test]
async fn approved_trial_over_live_license_records_dispatch_failure() {
    let engine = Engine::new();
    let request = engine
        .requests
        .create(CreateRequestCommand {
            organization_id: org("A"),
            requested_by: user("tech-7"),
            module_code: "scheduling_planning".to_string(),
            request_type: RequestType::Trial,
            justification: None,
            expected_usage: Some("two planners".to_string()),
        })
        .await
        .unwrap();
    engine.trial("A", "scheduling_planning", 14).await.unwrap();

    let outcome = engine
        .requests
        .review(ReviewRequestCommand {
            request_id: request.id,
            reviewed_by: user("admin-1"),
            decision: ReviewDecision::Approved,
            review_notes: Some("ok".to_string()),
            expires_at: None,
        })
        .await
        .unwrap();

    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert!(matches!(
        outcome.dispatch,
        Some(Err(LicensingError::AlreadyEntitled(_)))
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_activations_on_one_key_never_tear() {
    let engine = Engine::new();

    let calls = (1..=32u32).map(|i| {
        let lifecycle = engine.lifecycle.clone();
        let cmd = Engine::activate_cmd(
            "A",
            "meter_reading",
            Some(t0().add_days(i64::from(i))),
            Some(i),
        );
        async move { lifecycle.activate(cmd).await }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(engine.licenses.len().await, 1);
    let stored = engine.licenses.get(&key("A", "meter_reading")).await.unwrap().unwrap();
    let max_users = stored.max_users.unwrap();
    assert_eq!(stored.expires_at, Some(t0().add_days(i64::from(max_users))));
}

#[tokio::test]
async fn concurrent_trials_admit_exactly_one() {
    let engine = Arc::new(Engine::new());

    let calls = (0..16).map(|_| {
        let engine = engine.clone();
        async move { engine.trial("A", "failure_analysis", 30).await }
    });
    let results = join_all(calls).await;

    let started = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(LicensingError::AlreadyEntitled(_))))
        .count();
    assert_eq!(started, 1);
    assert_eq!(refused, 15);
}

#[tokio::test]
async fn different_organizations_do_not_interfere() {
    let engine = Arc::new(Engine::new());

    let calls = ["A", "B", "C", "D"].map(|org_id| {
        let engine = engine.clone();
        async move { engine.trial(org_id, "meter_reading", 30).await }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(engine.licenses.len().await, 4);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn activate_is_idempotent(
        days in 1i64..3650,
        max_users in proptest::option::of(1u32..10_000),
        repeats in 1usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let engine = Engine::new();
            let cmd = Engine::activate_cmd(
                "A",
                "meter_reading",
                Some(t0().add_days(days)),
                max_users,
            );

            let mut last = None;
            for _ in 0..repeats {
                last = Some(engine.lifecycle.activate(cmd.clone()).await.unwrap());
            }

            let stored = engine.licenses.get(&key("A", "meter_reading")).await.unwrap();
            prop_assert_eq!(engine.licenses.len().await, 1);
            prop_assert_eq!(stored, last);
            Ok(())
        })?;
    }

    #[test]
    fn trial_mode_follows_elapsed_days(days in 1u32..120, elapsed in 0i64..200) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let engine = Engine::new();
            engine.trial("A", "meter_reading", days).await.unwrap();

            let mode = engine.mode_at("A", "meter_reading", t0().add_days(elapsed)).await;
            let expected = if elapsed <= i64::from(days) {
                AccessMode::Full
            } else if elapsed <= i64::from(days) + 7 {
                AccessMode::ReadOnly
            } else {
                AccessMode::Locked
            };
            prop_assert_eq!(mode, expected);
            Ok(())
        })?;
    }
}
