//! Audit Configuration Module
//!
//! Provides engine configuration loaded from TOML files: the reduction
//! target, knowledge base location, and prediction-module tuning.
//!
//! ## Loading Order
//!
//! 1. `GREENDC_CONFIG` environment variable (path to TOML file)
//! 2. `audit_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The binary calls `config::init()` once at startup. Library code takes
//! the values it needs as explicit arguments instead of reading the global.
//!
//! ```ignore
//! let (cfg, _provenance) = AuditConfig::locate();
//! config::init(cfg);
//! let target = config::get().simulation.target_saving_percent;
//! ```

mod audit_config;
pub mod defaults;
pub mod validation;

pub use audit_config::*;

use std::sync::OnceLock;

/// Global audit configuration, initialized once at startup.
static AUDIT_CONFIG: OnceLock<AuditConfig> = OnceLock::new();

/// Initialize the global audit configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: AuditConfig) {
    if AUDIT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global audit configuration, falling back to defaults if `init()`
/// was never called.
pub fn get() -> &'static AuditConfig {
    AUDIT_CONFIG.get_or_init(AuditConfig::default)
}

