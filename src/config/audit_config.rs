//! Audit Configuration - engine tuning as operator-editable TOML values
//!
//! Each section implements `Default` with the values in `defaults.rs`,
//! so a missing file or a missing section behaves exactly like the
//! built-in configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::prediction::FitOptions;
use crate::types::ModelKind;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for an audit deployment.
///
/// Load with `AuditConfig::locate()` which searches:
/// 1. `$GREENDC_CONFIG` env var
/// 2. `./audit_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Facility identification (reports only)
    #[serde(default)]
    pub facility: FacilityInfo,

    /// Scenario classification
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Rule store location
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseSettings,

    /// Prediction module tuning
    #[serde(default)]
    pub prediction: PredictionConfig,
}

impl AuditConfig {
    /// Load configuration using the standard search order and report which
    /// settings the chosen file actually set:
    /// 1. `$GREENDC_CONFIG` environment variable
    /// 2. `./audit_config.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A candidate file that fails to load is skipped with a warning.
    pub fn locate() -> (Self, ConfigProvenance) {
        for source in ConfigSource::candidates() {
            let Some(path) = source.path() else { continue };
            if !path.exists() {
                if matches!(source, ConfigSource::EnvVar(_)) {
                    warn!(path = %path.display(), "GREENDC_CONFIG points to non-existent file, falling back");
                }
                continue;
            }
            match Self::load_from_file(path) {
                Ok((config, mut provenance)) => {
                    provenance.source = source;
                    info!(
                        source = %provenance.source,
                        explicit_keys = provenance.explicit_keys.len(),
                        facility = %config.facility.name,
                        "Loaded audit config"
                    );
                    return (config, provenance);
                }
                Err(e) => warn!(source = %source, error = %e, "Failed to load audit config, falling back"),
            }
        }

        info!("No audit_config.toml found, using built-in defaults");
        (Self::default(), ConfigProvenance::defaults())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<(Self, ConfigProvenance), ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let keys = super::validation::document_keys(&contents).unwrap_or_default();
        let config = Self::parse(&contents, &keys).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })?;
        let provenance = ConfigProvenance {
            source: ConfigSource::Explicit(path.to_path_buf()),
            explicit_keys: keys,
        };
        Ok((config, provenance))
    }

    /// Parse and validate a TOML document.
    ///
    /// Two-pass: unknown keys are reported as warnings first, then the
    /// document is deserialized and validated.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let keys = super::validation::document_keys(contents).unwrap_or_default();
        Self::parse(contents, &keys)
    }

    fn parse(contents: &str, keys: &BTreeSet<String>) -> Result<Self, ConfigError> {
        for w in super::validation::unknown_key_warnings(keys) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all settings for internal consistency.
    ///
    /// Rules:
    /// - Target must lie in (0, 100]
    /// - At least 2 history records are needed before fitting
    /// - Tree depth within 1..=TREE_MAX_DEPTH_LIMIT, leaves hold >= 1 sample
    /// - Ridge penalty finite and >= 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let target = self.simulation.target_saving_percent;
        if !target.is_finite() || target <= 0.0 || target > defaults::MAX_SAVING_PERCENT {
            errors.push(format!(
                "simulation.target_saving_percent ({target}) must be in (0, 100]"
            ));
        }

        let p = &self.prediction;
        if p.min_history < 2 {
            errors.push(format!(
                "prediction.min_history ({}) must be >= 2",
                p.min_history
            ));
        }
        if p.tree_max_depth == 0 || p.tree_max_depth > defaults::TREE_MAX_DEPTH_LIMIT {
            errors.push(format!(
                "prediction.tree_max_depth ({}) must be in 1..={}",
                p.tree_max_depth,
                defaults::TREE_MAX_DEPTH_LIMIT
            ));
        }
        if p.tree_min_samples_leaf == 0 {
            errors.push("prediction.tree_min_samples_leaf must be > 0".to_string());
        }
        if !p.ridge_lambda.is_finite() || p.ridge_lambda < 0.0 {
            errors.push(format!(
                "prediction.ridge_lambda ({}) must be a finite number >= 0",
                p.ridge_lambda
            ));
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line
    Explicit(PathBuf),
    /// Path taken from `$GREENDC_CONFIG`
    EnvVar(PathBuf),
    /// `./audit_config.toml`
    WorkingDir(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Search order used by `AuditConfig::locate()`.
    fn candidates() -> Vec<ConfigSource> {
        let mut out = Vec::with_capacity(2);
        if let Some(path) = std::env::var_os(defaults::CONFIG_ENV_VAR) {
            out.push(ConfigSource::EnvVar(PathBuf::from(path)));
        }
        out.push(ConfigSource::WorkingDir(PathBuf::from(defaults::LOCAL_CONFIG_FILE)));
        out
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(p) | ConfigSource::EnvVar(p) | ConfigSource::WorkingDir(p) => {
                Some(p)
            }
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} (${})", p.display(), defaults::CONFIG_ENV_VAR),
            ConfigSource::WorkingDir(p) => write!(f, "{} (working directory)", p.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Which settings the operator wrote down, as opposed to inherited defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigProvenance {
    pub source: ConfigSource,
    /// Dotted keys present in the file, sections included
    pub explicit_keys: BTreeSet<String>,
}

impl ConfigProvenance {
    pub fn defaults() -> Self {
        Self {
            source: ConfigSource::Defaults,
            explicit_keys: BTreeSet::new(),
        }
    }

    pub fn is_explicit(&self, key: &str) -> bool {
        self.explicit_keys.contains(key)
    }

    /// Explicitly set keys that are real settings (no sections, no typos).
    pub fn explicit_settings(&self) -> Vec<&str> {
        let known = super::validation::known_config_keys();
        self.explicit_keys
            .iter()
            .map(String::as_str)
            .filter(|k| k.contains('.') && known.contains(k))
            .collect()
    }

    /// Settings left at their built-in value, sorted.
    pub fn defaulted_settings(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = super::validation::known_config_keys()
            .into_iter()
            .filter(|k| k.contains('.') && !self.is_explicit(k))
            .collect();
        keys.sort_unstable();
        keys
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Facility Info
// ============================================================================

/// Identification metadata, not used for logic but shown in reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityInfo {
    #[serde(default = "default_facility_name")]
    pub name: String,
}

fn default_facility_name() -> String {
    "Unnamed facility".to_string()
}

impl Default for FacilityInfo {
    fn default() -> Self {
        Self {
            name: default_facility_name(),
        }
    }
}

// ============================================================================
// Simulation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Scenario reaches its goal when the combined saving is >= this (%)
    #[serde(default = "default_target")]
    pub target_saving_percent: f64,
}

fn default_target() -> f64 {
    defaults::TARGET_SAVING_PERCENT
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_saving_percent: default_target(),
        }
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBaseSettings {
    /// Rule file (`.toml` or `.json`); the embedded rule set is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// ============================================================================
// Prediction
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Fit a model at startup when a history file is available
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub model: ModelKind,
    /// Fewer records than this fails the fit with InsufficientHistory
    #[serde(default = "default_min_history")]
    pub min_history: usize,
    #[serde(default = "default_tree_max_depth")]
    pub tree_max_depth: usize,
    #[serde(default = "default_tree_min_samples_leaf")]
    pub tree_min_samples_leaf: usize,
    #[serde(default = "default_ridge_lambda")]
    pub ridge_lambda: f64,
    /// JSON file with past audit records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}
fn default_min_history() -> usize {
    defaults::MIN_HISTORY_RECORDS
}
fn default_tree_max_depth() -> usize {
    defaults::TREE_MAX_DEPTH
}
fn default_tree_min_samples_leaf() -> usize {
    defaults::TREE_MIN_SAMPLES_LEAF
}
fn default_ridge_lambda() -> f64 {
    defaults::RIDGE_LAMBDA
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: ModelKind::default(),
            min_history: default_min_history(),
            tree_max_depth: default_tree_max_depth(),
            tree_min_samples_leaf: default_tree_min_samples_leaf(),
            ridge_lambda: default_ridge_lambda(),
            history_path: None,
        }
    }
}

impl PredictionConfig {
    /// Fit options derived from this section
    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            kind: self.model,
            min_history: self.min_history,
            tree_max_depth: self.tree_max_depth,
            tree_min_samples_leaf: self.tree_min_samples_leaf,
            ridge_lambda: self.ridge_lambda,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.target_saving_percent, 25.0);
        assert_eq!(config.prediction.min_history, 3);
        assert_eq!(config.prediction.model, ModelKind::Linear);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = AuditConfig::from_toml_str(
            r#"
[simulation]
target_saving_percent = 30.0
"#,
        )
        .unwrap();
        assert_eq!(config.simulation.target_saving_percent, 30.0);
        assert_eq!(config.prediction.tree_max_depth, 3);
        assert_eq!(config.facility.name, "Unnamed facility");
    }

    #[test]
    fn test_invalid_target_rejected() {
        let result = AuditConfig::from_toml_str("[simulation]\ntarget_saving_percent = 0.0\n");
        match result {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("target_saving_percent")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_multiple_errors_collected() {
        let result = AuditConfig::from_toml_str(
            "[prediction]\nmin_history = 1\ntree_max_depth = 0\nridge_lambda = -1.0\n",
        );
        if let Err(ConfigError::Validation(errors)) = result {
            assert_eq!(errors.len(), 3, "{errors:?}");
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_model_kind_parses() {
        let config = AuditConfig::from_toml_str("[prediction]\nmodel = \"tree\"\n").unwrap();
        assert_eq!(config.prediction.model, ModelKind::Tree);
        assert_eq!(config.prediction.fit_options().kind, ModelKind::Tree);
    }

    #[test]
    fn test_toml_roundtrip_stays_valid() {
        let config = AuditConfig::default();
        let s = config.to_toml().unwrap();
        let back = AuditConfig::from_toml_str(&s).unwrap();
        assert_eq!(back.simulation.target_saving_percent, 25.0);
    }

    #[test]
    fn test_provenance_splits_explicit_and_defaulted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("audit_config.toml");
        std::fs::write(
            &path,
            "[simulation]\ntarget_saving_percent = 40.0\n[prediction]\nmodle = \"tree\"\n",
        )
        .unwrap();

        let (config, provenance) = AuditConfig::load_from_file(&path).unwrap();
        assert_eq!(config.simulation.target_saving_percent, 40.0);
        assert_eq!(provenance.source, ConfigSource::Explicit(path.clone()));
        assert!(provenance.is_explicit("simulation.target_saving_percent"));
        assert!(provenance.is_explicit("prediction"));
        assert_eq!(provenance.explicit_settings(), vec!["simulation.target_saving_percent"]);

        let defaulted = provenance.defaulted_settings();
        assert!(defaulted.contains(&"prediction.model"));
        assert!(!defaulted.contains(&"simulation.target_saving_percent"));
        assert!(!defaulted.contains(&"prediction"));
    }

    #[test]
    fn test_defaults_provenance() {
        let provenance = ConfigProvenance::defaults();
        assert_eq!(provenance.source.path(), None);
        assert!(provenance.explicit_settings().is_empty());
        assert_eq!(
            provenance.defaulted_settings().len(),
            crate::config::validation::known_config_keys()
                .iter()
                .filter(|k| k.contains('.'))
                .count()
        );
        assert_eq!(provenance.source.to_string(), "built-in defaults");
    }
}
