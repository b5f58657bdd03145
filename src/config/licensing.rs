//! Licensing engine configuration

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::domain::licensing::{Catalog, CatalogError, GracePolicy};

use super::error::ValidationError;

/// Licensing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LicensingConfig {
    /// Read-only window after a License expires
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,

    /// Trial length when a caller does not pass one
    #[serde(default = "default_trial_days")]
    pub default_trial_days: u32,

    /// Term granted by purchase, upgrade and renewal approvals
    #[serde(default = "default_term_days")]
    pub default_term_days: u32,

    /// Rows returned by usage history queries
    #[serde(default = "default_usage_history_days")]
    pub usage_history_days: u32,

    /// Run the expiry notification sweep
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,

    /// Seconds between sweep passes
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Advance notice days before expiry (comma-separated)
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: String,

    /// YAML module and tier catalog; the built-in catalog is used when unset
    pub catalog_path: Option<String>,
}

impl LicensingConfig {
    pub fn grace_policy(&self) -> GracePolicy {
        GracePolicy::from_days(self.grace_period_days)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Parsed warning days, largest first, without duplicates.
    pub fn warning_days(&self) -> Result<Vec<u32>, ValidationError> {
        let mut days = self
            .expiry_warning_days
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| ValidationError::InvalidWarningDays(s.to_string()))
            })
            .collect::<Result<Vec<u32>, _>>()?;
        days.sort_unstable_by(|a, b| b.cmp(a));
        days.dedup();
        Ok(days)
    }

    /// The configured catalog file, or the built-in catalog.
    pub fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog_path {
            Some(path) => Catalog::from_yaml_file(path),
            None => Ok(Catalog::builtin()),
        }
    }

    /// Validate licensing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_days("grace_period_days", self.grace_period_days, 0, 90)?;
        check_days("default_trial_days", self.default_trial_days, 1, 365)?;
        check_days("default_term_days", self.default_term_days, 1, 3650)?;
        check_days("usage_history_days", self.usage_history_days, 1, 366)?;
        if !(60..=86_400).contains(&self.sweep_interval_secs) {
            return Err(ValidationError::InvalidSweepInterval);
        }
        self.warning_days()?;
        if let Some(path) = &self.catalog_path {
            if !Path::new(path).is_file() {
                return Err(ValidationError::CatalogNotFound(path.clone()));
            }
        }
        Ok(())
    }
}

fn check_days(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::DaysOutOfRange { field, min, max });
    }
    Ok(())
}

impl Default for LicensingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: default_grace_period_days(),
            default_trial_days: default_trial_days(),
            default_term_days: default_term_days(),
            usage_history_days: default_usage_history_days(),
            sweep_enabled: default_sweep_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            expiry_warning_days: default_expiry_warning_days(),
            catalog_path: None,
        }
    }
}

fn default_grace_period_days() -> u32 {
    GracePolicy::DEFAULT_DAYS
}

fn default_trial_days() -> u32 {
    30
}

fn default_term_days() -> u32 {
    365
}

fn default_usage_history_days() -> u32 {
    30
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    3600
}

fn default_expiry_warning_days() -> String {
    "30,14,7".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_licensing_config_defaults() {
        let config = LicensingConfig::default();
        assert_eq!(config.grace_period_days, 7);
        assert_eq!(config.default_trial_days, 30);
        assert_eq!(config.default_term_days, 365);
        assert!(config.sweep_enabled);
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.warning_days().unwrap(), vec![30, 14, 7]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warning_days_are_sorted_and_deduplicated() {
        let config = LicensingConfig {
            expiry_warning_days: "7, 30,7,1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.warning_days().unwrap(), vec![30, 7, 1]);
    }

    #[test]
    fn test_warning_days_reject_garbage_and_zero() {
        for raw in ["7,soon", "0"] {
            let config = LicensingConfig {
                expiry_warning_days: raw.to_string(),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ValidationError::InvalidWarningDays(_))
            ));
        }
    }

    #[test]
    fn test_zero_grace_is_allowed_but_zero_trial_is_not() {
        let config = LicensingConfig {
            grace_period_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = LicensingConfig {
            default_trial_days: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::DaysOutOfRange {
                field: "default_trial_days",
                min: 1,
                max: 365
            })
        );
    }

    #[test]
    fn test_sweep_interval_bounds() {
        let config = LicensingConfig {
            sweep_interval_secs: 5,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidSweepInterval));
    }

    #[test]
    fn test_missing_catalog_file_fails_validation() {
        let config = LicensingConfig {
            catalog_path: Some("/nonexistent/catalog.yaml".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::CatalogNotFound(_))
        ));
    }

    #[test]
    fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
modules:
  - code: work_order_basic
    name: Work Orders
    tier: core
  - code: meter_reading
    name: Meter Reading
    tier: standard
tiers:
  professional:
    meter_reading: 90
"#
        )
        .unwrap();
        let config = LicensingConfig {
            catalog_path: Some(file.path().to_string_lossy().into_owned()),
            ..Default::default()
        };

        let catalog = config.load_catalog().unwrap();

        assert_eq!(catalog.modules().len(), 2);
        assert_eq!(catalog.tier_plan("professional").unwrap()[0].default_duration_days, 90);
    }

    #[test]
    fn test_builtin_catalog_without_path() {
        let catalog = LicensingConfig::default().load_catalog().unwrap();
        assert_eq!(catalog, Catalog::builtin());
    }
}
