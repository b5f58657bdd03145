//! Module catalog entries.
//!
//! A module is a named optional feature area. `core` modules are always
//! entitled and never appear in the license store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Stable identifier of a feature module, e.g. `preventive_maintenance`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleCode(String);

impl ModuleCode {
    /// Creates a module code; only lowercase ASCII letters, digits and `_`.
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ValidationError::empty_field("module_code"));
        }
        let well_formed = code
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !well_formed || code.starts_with('_') {
            return Err(ValidationError::invalid_format(
                "module_code",
                format!("'{}' must be lowercase snake_case", code),
            ));
        }
        Ok(Self(code))
    }

    /// For codes that are compile-time constants of this crate.
    pub(crate) fn trusted(code: &str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleCode> for String {
    fn from(code: ModuleCode) -> Self {
        code.0
    }
}

impl FromStr for ModuleCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for ModuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commercial classification of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleTier {
    /// Always entitled.
    Core,
    Standard,
    Advanced,
    Premium,
}

impl ModuleTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleTier::Core => "core",
            ModuleTier::Standard => "standard",
            ModuleTier::Advanced => "advanced",
            ModuleTier::Premium => "premium",
        }
    }
}

impl fmt::Display for ModuleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModuleTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "core" => Ok(ModuleTier::Core),
            "standard" => Ok(ModuleTier::Standard),
            "advanced" => Ok(ModuleTier::Advanced),
            "premium" => Ok(ModuleTier::Premium),
            other => Err(ValidationError::invalid_format(
                "module_tier",
                format!("unknown tier '{}'", other),
            )),
        }
    }
}

/// Catalog entry for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub code: ModuleCode,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: ModuleTier,
    /// Modules this one builds on.
    #[serde(default)]
    pub dependencies: Vec<ModuleCode>,
    /// Display-only feature list.
    #[serde(default)]
    pub features: Vec<String>,
}

impl ModuleDefinition {
    pub fn new(code: ModuleCode, name: impl Into<String>, tier: ModuleTier) -> Self {
        Self {
            code,
            name: name.into(),
            description: String::new(),
            tier,
            dependencies: Vec::new(),
            features: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<ModuleCode>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_core(&self) -> bool {
        self.tier == ModuleTier::Core
    }
}
