//! Prediction types: historical audit records, model kind, forecast output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FacilityInput;

/// Regressor family used by the prediction module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Ridge-stabilised least squares on standardised features
    #[default]
    Linear,
    /// Shallow regression tree
    Tree,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Linear => write!(f, "linear"),
            ModelKind::Tree => write!(f, "tree"),
        }
    }
}

/// One past audit: the facility state and the CO2 reduction that was achieved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub input: FacilityInput,
    /// Observed CO2 reduction after the audit's actions (%)
    pub observed_co2_reduction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Advisory forecast surfaced next to a scenario; never overrides it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Predicted CO2 reduction (%, 0-100)
    pub predicted_co2_reduction_percent: f64,
    pub model: ModelKind,
    /// Number of history records the model was fitted on
    pub training_samples: usize,
    /// Coefficient of determination on the training set
    pub fit_r_squared: f64,
}
