//! Module and tier catalogs.
//!
//! The module catalog classifies every module code; the tier catalog maps a
//! subscription tier name to the modules it bundles, each with a default
//! validity duration in days. Both are validated together before any
//! lifecycle operation can use them, so a tier that references an unknown
//! module is a configuration error caught at startup.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::builtin_catalog;
use super::{LicensingError, ModuleCode, ModuleDefinition};

/// Errors raised while loading a catalog from YAML.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Catalog is inconsistent: {0}")]
    Invalid(#[from] LicensingError),
}

/// All known modules, keyed by code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleCatalog {
    modules: BTreeMap<ModuleCode, ModuleDefinition>,
}

impl ModuleCatalog {
    /// Builds a catalog, rejecting duplicate codes.
    pub fn new(definitions: impl IntoIterator<Item = ModuleDefinition>) -> Result<Self, LicensingError> {
        let mut modules = BTreeMap::new();
        for definition in definitions {
            let code = definition.code.clone();
            if modules.insert(code.clone(), definition).is_some() {
                return Err(LicensingError::invalid_module(
                    code.as_str(),
                    "defined more than once",
                ));
            }
        }
        Ok(Self { modules })
    }

    pub fn get(&self, code: &ModuleCode) -> Option<&ModuleDefinition> {
        self.modules.get(code)
    }

    pub fn contains(&self, code: &ModuleCode) -> bool {
        self.modules.contains_key(code)
    }

    /// Resolves a raw code string against the catalog.
    pub fn lookup(&self, code: &str) -> Result<&ModuleDefinition, LicensingError> {
        let parsed = ModuleCode::new(code).map_err(|_| LicensingError::unknown_module(code))?;
        self.modules
            .get(&parsed)
            .ok_or_else(|| LicensingError::unknown_module(code))
    }

    /// Like [`lookup`](Self::lookup) but also rejects core modules, which are
    /// never written to the license store.
    pub fn licensable(&self, code: &str) -> Result<&ModuleDefinition, LicensingError> {
        let definition = self.lookup(code)?;
        if definition.is_core() {
            return Err(LicensingError::core_module(&definition.code));
        }
        Ok(definition)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    fn validate(&self) -> Result<(), LicensingError> {
        for definition in self.iter() {
            for dependency in &definition.dependencies {
                if !self.contains(dependency) {
                    return Err(LicensingError::invalid_module(
                        dependency.as_str(),
                        format!("dependency of '{}' is not in the catalog", definition.code),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Tier name to `{ module code -> default duration days }`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierCatalog {
    tiers: BTreeMap<String, BTreeMap<ModuleCode, u32>>,
}

impl TierCatalog {
    pub fn new(tiers: BTreeMap<String, BTreeMap<ModuleCode, u32>>) -> Self {
        Self { tiers }
    }

    /// Adds or replaces one tier.
    pub fn with_tier<I>(mut self, name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (ModuleCode, u32)>,
    {
        self.tiers.insert(name.into(), entries.into_iter().collect());
        self
    }

    pub fn modules(&self, tier: &str) -> Option<&BTreeMap<ModuleCode, u32>> {
        self.tiers.get(tier)
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.tiers.keys().map(String::as_str)
    }

    fn validate(&self, modules: &ModuleCatalog) -> Result<(), LicensingError> {
        for (tier, entries) in &self.tiers {
            for (code, days) in entries {
                let definition = modules.get(code).ok_or_else(|| {
                    LicensingError::invalid_module(
                        code.as_str(),
                        format!("listed in tier '{}' but not in the module catalog", tier),
                    )
                })?;
                if definition.is_core() {
                    return Err(LicensingError::invalid_module(
                        code.as_str(),
                        format!("core module listed in tier '{}'", tier),
                    ));
                }
                if *days == 0 {
                    return Err(LicensingError::validation(
                        "default_duration_days",
                        format!("'{}' in tier '{}' has a zero duration", code, tier),
                    ));
                }
                for dependency in &definition.dependencies {
                    let dependency_is_core =
                        modules.get(dependency).map(ModuleDefinition::is_core).unwrap_or(false);
                    if !dependency_is_core && !entries.contains_key(dependency) {
                        return Err(LicensingError::invalid_module(
                            code.as_str(),
                            format!(
                                "tier '{}' is missing dependency '{}'",
                                tier, dependency
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// One module activation planned by a tier activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierActivationPlan<'a> {
    pub definition: &'a ModuleDefinition,
    pub default_duration_days: u32,
}

/// The validated pair of module and tier catalogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    modules: ModuleCatalog,
    tiers: TierCatalog,
}

#[derive(Deserialize)]
struct CatalogFile {
    modules: Vec<ModuleDefinition>,
    #[serde(default)]
    tiers: TierCatalog,
}

static BUILTIN: Lazy<Catalog> = Lazy::new(|| Catalog {
    modules: builtin_catalog::modules(),
    tiers: builtin_catalog::tiers(),
});

impl Catalog {
    /// Validates and pairs the two catalogs.
    pub fn new(modules: ModuleCatalog, tiers: TierCatalog) -> Result<Self, LicensingError> {
        modules.validate()?;
        tiers.validate(&modules)?;
        Ok(Self { modules, tiers })
    }

    /// The catalog shipped with the engine.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parses a catalog from YAML of the form
    /// `{ modules: [ModuleDefinition], tiers: { name: { code: days } } }`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let modules = ModuleCatalog::new(file.modules)?;
        Ok(Self::new(modules, file.tiers)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn modules(&self) -> &ModuleCatalog {
        &self.modules
    }

    pub fn tiers(&self) -> &TierCatalog {
        &self.tiers
    }

    /// Every module a tier activation will touch, resolved up front so an
    /// unknown tier or module aborts before anything is written.
    pub fn tier_plan(&self, tier: &str) -> Result<Vec<TierActivationPlan<'_>>, LicensingError> {
        let entries = self
            .tiers
            .modules(tier)
            .ok_or_else(|| LicensingError::invalid_tier(tier))?;

        entries
            .iter()
            .map(|(code, days)| {
                let definition = self.modules.licensable(code.as_str())?;
                Ok(TierActivationPlan {
                    definition,
                    default_duration_days: *days,
                })
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::licensing::ModuleTier;

    fn code(s: &str) -> ModuleCode {
        ModuleCode::new(s).unwrap()
    }

    fn module(s: &str, tier: ModuleTier) -> ModuleDefinition {
        ModuleDefinition::new(code(s), s, tier)
    }

    #[test]
    fn builtin_catalog_is_consistent() {
        let builtin = Catalog::builtin();
        assert!(Catalog::new(builtin.modules().clone(), builtin.tiers().clone()).is_ok());
    }

    #[test]
    fn builtin_tiers_grow_monotonically() {
        let catalog = Catalog::builtin();
        let size = |t: &str| catalog.tiers().modules(t).map(|m| m.len()).unwrap_or(0);

        assert_eq!(size("starter"), 0);
        assert!(size("professional") < size("enterprise"));
        assert!(size("enterprise") < size("enterprise_plus"));
        assert!(catalog
            .tiers()
            .modules("professional")
            .unwrap()
            .contains_key(&code("inventory_management")));
    }

    #[test]
    fn lookup_rejects_unknown_and_malformed_codes() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            catalog.modules().lookup("teleportation"),
            Err(LicensingError::InvalidModule { .. })
        ));
        assert!(matches!(
            catalog.modules().lookup("Not A Code"),
            Err(LicensingError::InvalidModule { .. })
        ));
    }

    #[test]
    fn licensable_rejects_core_modules() {
        let catalog = Catalog::builtin();
        assert!(catalog.modules().lookup("user_management").is_ok());
        assert_eq!(
            catalog.modules().licensable("user_management"),
            Err(LicensingError::core_module(&code("user_management")))
        );
    }

    #[test]
    fn tier_referencing_unknown_module_is_rejected() {
        let modules = ModuleCatalog::new(vec![module("meter_reading", ModuleTier::Standard)]).unwrap();
        let tiers = TierCatalog::default()
            .with_tier("professional", vec![(code("meter_reading"), 365), (code("ghost"), 365)]);

        let err = Catalog::new(modules, tiers).unwrap_err();
        assert!(matches!(err, LicensingError::InvalidModule { code, .. } if code == "ghost"));
    }

    #[test]
    fn tier_must_include_non_core_dependencies() {
        let modules = ModuleCatalog::new(vec![
            module("meter_reading", ModuleTier::Standard),
            module("energy_management", ModuleTier::Advanced)
                .with_dependencies(vec![code("meter_reading")]),
        ])
        .unwrap();
        let tiers =
            TierCatalog::default().with_tier("enterprise", vec![(code("energy_management"), 365)]);

        assert!(Catalog::new(modules, tiers).is_err());
    }

    #[test]
    fn duplicate_module_codes_are_rejected() {
        let result = ModuleCatalog::new(vec![
            module("meter_reading", ModuleTier::Standard),
            module("meter_reading", ModuleTier::Advanced),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn tier_plan_fails_for_unknown_tier() {
        assert_eq!(
            Catalog::builtin().tier_plan("platinum"),
            Err(LicensingError::invalid_tier("platinum"))
        );
    }

    #[test]
    fn catalog_loads_from_yaml() {
        let yaml = r#"
modules:
  - code: preventive_maintenance
    name: Preventive Maintenance
    tier: standard
  - code: inventory_management
    name: Inventory Management
    tier: standard
    features: [Parts catalog]
tiers:
  professional:
    preventive_maintenance: 365
    inventory_management: 180
"#;
        let catalog = Catalog::from_yaml_str(yaml).unwrap();
        let plan = catalog.tier_plan("professional").unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan
            .iter()
            .any(|p| p.definition.code == code("inventory_management") && p.default_duration_days == 180));
    }

    #[test]
    fn yaml_with_inconsistent_tier_reports_invalid() {
        let yaml = "modules: []\ntiers:\n  starter:\n    ghost: 30\n";
        assert!(matches!(
            Catalog::from_yaml_str(yaml),
            Err(CatalogError::Invalid(_))
        ));
    }
}
