//! Recommendation and scenario output types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CarbonUnit, Co2Impact, FacilityInput, Forecast, Metrics};

/// One matched rule, carried verbatim from the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub rule_id: String,
    pub action: String,
    /// Estimated energy saving of this action alone (%)
    pub saving_percent: f64,
    pub co2_impact: Co2Impact,
    pub justification: String,
    /// Observed values that satisfied the rule, e.g. `cpu_utilization = 18.0 < 20`
    pub trigger: String,
}

/// Whether the combined saving reaches the reduction target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    TargetAchieved,
    AdditionalActionsRequired,
}

impl std::fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioStatus::TargetAchieved => write!(f, "TARGET ACHIEVED"),
            ScenarioStatus::AdditionalActionsRequired => write!(f, "ADDITIONAL ACTIONS REQUIRED"),
        }
    }
}

/// Before/after projection of applying a set of recommendations.
///
/// Created once per evaluation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Applied recommendations, in knowledge-base order
    pub recommendations: Vec<Recommendation>,
    /// Additive saving, capped at 100 (%)
    pub total_saving_percent: f64,
    /// Target used for `status` (%)
    pub target_percent: f64,
    pub status: ScenarioStatus,
    /// Annual CO2 before actions (`co2_unit`)
    pub before_co2: f64,
    /// Annual CO2 after actions (`co2_unit`), never negative
    pub after_co2: f64,
    /// `before_co2 - after_co2`
    pub co2_avoided: f64,
    pub co2_unit: CarbonUnit,
    /// Annual facility energy before actions (kWh)
    pub before_energy: f64,
    /// Annual facility energy after actions (kWh)
    pub after_energy: f64,
    /// Advisory regression forecast, absent when no model is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<Forecast>,
}

impl ScenarioResult {
    pub fn target_achieved(&self) -> bool {
        self.status == ScenarioStatus::TargetAchieved
    }
}

/// Complete output of one pipeline evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    pub input: FacilityInput,
    pub metrics: Metrics,
    pub scenario: ScenarioResult,
    pub generated_at: DateTime<Utc>,
}
