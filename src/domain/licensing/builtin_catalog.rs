//! Catalog content shipped with the engine.

use super::{ModuleCatalog, ModuleCode, ModuleDefinition, ModuleTier, TierCatalog};

/// Default term for every tier entry.
const DEFAULT_TERM_DAYS: u32 = 365;

type Row = (
    &'static str,
    &'static str,
    &'static str,
    ModuleTier,
    &'static [&'static str],
    &'static [&'static str],
);

const MODULES: &[Row] = &[
    // core
    ("user_management", "User Management & Administration", "User accounts, roles, permissions", ModuleTier::Core, &[], &["User authentication", "RBAC", "User profiles"]),
    ("asset_management_basic", "Asset Management (Basic)", "Asset registry and basic tracking", ModuleTier::Core, &[], &["Asset registry", "Basic tracking", "Asset photos"]),
    ("work_order_basic", "Work Order Management (Basic)", "Create, assign, complete work orders", ModuleTier::Core, &[], &["Create work orders", "Assign tasks", "Simple workflow"]),
    ("mobile_basic", "Mobile-Responsive Web Interface", "Access the CMMS from any mobile browser", ModuleTier::Core, &[], &["Responsive design", "Mobile browser access", "Touch-optimized UI"]),
    ("mobile_advanced", "Enhanced Mobile Features", "Advanced mobile capabilities for field operations", ModuleTier::Core, &[], &["Camera access for photos", "Location services", "File uploads"]),
    ("basic_reporting", "Basic Reporting", "Standard reports and dashboards", ModuleTier::Core, &[], &["Pre-built reports", "Basic dashboards", "Export to PDF/Excel"]),
    // standard
    ("preventive_maintenance", "Preventive Maintenance", "Scheduled maintenance and PM compliance", ModuleTier::Standard, &[], &["PM scheduling", "Auto-generation", "PM templates", "Compliance tracking"]),
    ("inventory_management", "Inventory Management", "Parts tracking and stock management", ModuleTier::Standard, &[], &["Parts catalog", "Stock levels", "Reorder points", "Multi-location"]),
    ("scheduling_planning", "Scheduling & Planning", "Calendar views and resource allocation", ModuleTier::Standard, &[], &["Calendar view", "Drag-and-drop scheduling", "Resource allocation"]),
    ("asset_management_advanced", "Asset Management (Advanced)", "Asset hierarchy, criticality, genealogy", ModuleTier::Standard, &[], &["Asset hierarchy", "Criticality rating", "Asset genealogy", "QR codes"]),
    ("work_order_advanced", "Work Order Management (Advanced)", "Approval workflows, templates, SLA tracking", ModuleTier::Standard, &[], &["Approval workflows", "WO templates", "SLA tracking", "Advanced routing"]),
    ("document_management", "Document Management", "Centralized document repository", ModuleTier::Standard, &[], &["Document repository", "Version control", "Document tagging"]),
    ("meter_reading", "Meter Reading", "Usage-based maintenance triggers", ModuleTier::Standard, &[], &["Meter tracking", "Usage-based PM", "Meter history"]),
    // advanced
    ("predictive_maintenance", "Predictive Maintenance", "IoT integration and condition monitoring", ModuleTier::Advanced, &["asset_management_advanced", "meter_reading"], &["IoT integration", "Condition monitoring", "ML predictions", "Anomaly detection"]),
    ("purchasing_procurement", "Purchasing & Procurement", "PO management and vendor contracts", ModuleTier::Advanced, &["inventory_management"], &["Purchase orders", "Vendor contracts", "Requisition workflows"]),
    ("advanced_analytics", "Advanced Analytics & BI", "Custom dashboards and KPI tracking", ModuleTier::Advanced, &[], &["Custom dashboards", "KPI tracking", "Advanced visualizations", "Report builder"]),
    ("safety_compliance", "Safety & Compliance", "LOTO, permits, incident tracking", ModuleTier::Advanced, &["document_management"], &["LOTO management", "Work permits", "Incident tracking", "Safety audits"]),
    ("calibration_management", "Calibration Management", "Instrument calibration tracking", ModuleTier::Advanced, &["asset_management_advanced", "document_management"], &["Calibration schedules", "Certificate management", "Out-of-tolerance alerts"]),
    ("failure_analysis", "Failure Analysis", "RCA and FMEA tools", ModuleTier::Advanced, &[], &["Root cause analysis", "FMEA templates", "Failure tracking"]),
    ("project_management", "Project Management", "Large maintenance projects", ModuleTier::Advanced, &["work_order_advanced"], &["Project planning", "Gantt charts", "Resource management", "Budget tracking"]),
    ("energy_management", "Energy Management", "Utility tracking and sustainability", ModuleTier::Advanced, &["meter_reading", "advanced_analytics"], &["Utility tracking", "Energy dashboards", "Sustainability metrics"]),
    // premium
    ("vendor_management", "Vendor Management", "Vendor scorecards and performance tracking", ModuleTier::Premium, &[], &["Vendor scorecards", "Performance tracking", "Certification management"]),
    ("audit_quality", "Audit & Quality", "Audit management and CAPA tracking", ModuleTier::Premium, &[], &["Audit scheduling", "Findings management", "CAPA tracking", "Quality metrics"]),
    ("integration_hub", "Integration Hub & API", "Pre-built integrations and custom API access", ModuleTier::Premium, &[], &["ERP integration", "Custom API access", "Webhooks", "Data sync"]),
    ("multi_tenancy", "Multi-tenancy Management", "Manage multiple organizations", ModuleTier::Premium, &[], &["White-label", "Multi-org management", "Cross-tenant reporting"]),
    ("advanced_workflow", "Advanced Workflow Engine", "Custom approval chains and automation", ModuleTier::Premium, &[], &["Visual workflow builder", "Custom automation", "Complex approval chains"]),
    ("ai_optimization", "AI-Powered Optimization", "Schedule optimization and predictive insights", ModuleTier::Premium, &[], &["AI scheduling", "Predictive insights", "Optimization algorithms"]),
];

/// Subscription tiers and the highest module tier each one bundles.
const TIERS: &[(&str, Option<ModuleTier>)] = &[
    ("starter", None),
    ("professional", Some(ModuleTier::Standard)),
    ("enterprise", Some(ModuleTier::Advanced)),
    ("enterprise_plus", Some(ModuleTier::Premium)),
];

fn definitions() -> impl Iterator<Item = ModuleDefinition> {
    MODULES
        .iter()
        .map(|(code, name, description, tier, dependencies, features)| {
            ModuleDefinition::new(ModuleCode::trusted(code), *name, *tier)
                .with_description(*description)
                .with_dependencies(dependencies.iter().map(|d| ModuleCode::trusted(d)).collect())
                .with_features(features.iter().copied())
        })
}

pub(super) fn modules() -> ModuleCatalog {
    // Codes in MODULES are unique; the unit test below pins that.
    ModuleCatalog::new(definitions()).unwrap_or_default()
}

pub(super) fn tiers() -> TierCatalog {
    TIERS
        .iter()
        .fold(TierCatalog::default(), |catalog, (name, ceiling)| {
            let entries = definitions()
                .filter(|d| !d.is_core() && ceiling.map_or(false, |max| d.tier <= max))
                .map(|d| (d.code, DEFAULT_TERM_DAYS));
            catalog.with_tier(*name, entries)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_row_is_a_valid_unique_code() {
        let catalog = ModuleCatalog::new(definitions()).unwrap();
        assert_eq!(catalog.len(), MODULES.len());
        for (code, ..) in MODULES {
            assert!(ModuleCode::new(*code).is_ok(), "bad code {}", code);
        }
    }

    #[test]
    fn enterprise_plus_covers_every_licensable_module() {
        let licensable = definitions().filter(|d| !d.is_core()).count();
        assert_eq!(tiers().modules("enterprise_plus").unwrap().len(), licensable);
    }
}
