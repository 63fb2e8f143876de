//! System-wide default constants.
//!
//! Centralises the numbers the audit engine falls back to when no
//! configuration file overrides them. Grouped by subsystem.

// ============================================================================
// Simulation
// ============================================================================

/// CO2 reduction target used to classify a scenario (%).
pub const TARGET_SAVING_PERCENT: f64 = 25.0;

/// Upper bound of the additive saving sum (%).
pub const MAX_SAVING_PERCENT: f64 = 100.0;

// ============================================================================
// Prediction
// ============================================================================

/// Minimum number of historical audits required to fit a model.
pub const MIN_HISTORY_RECORDS: usize = 3;

/// Default maximum depth of the regression tree.
///
/// Depth 3 = at most 8 leaves, small enough to read off by hand.
pub const TREE_MAX_DEPTH: usize = 3;

/// Upper bound accepted for `prediction.tree_max_depth`.
pub const TREE_MAX_DEPTH_LIMIT: usize = 6;

/// Minimum samples in each leaf of the regression tree.
pub const TREE_MIN_SAMPLES_LEAF: usize = 1;

/// Ridge penalty applied to the standardised least-squares system.
///
/// Keeps the normal equations solvable when history is short or features collinear.
pub const RIDGE_LAMBDA: f64 = 1e-3;

/// How long the CLI waits for a background model fit before evaluating without it.
pub const FIT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Files
// ============================================================================

/// Environment variable pointing at the TOML config file.
pub const CONFIG_ENV_VAR: &str = "GREENDC_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "audit_config.toml";
