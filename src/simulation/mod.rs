//! Scenario Simulation
//!
//! Combines a set of recommendations into a before/after projection of
//! annual energy and CO2.
//!
//! ## Aggregation
//!
//! Savings are **additive**: `total = min(100, Σ saving_percent)`.
//! This overstates the effect of several overlapping actions (two 50 %
//! measures do not remove all emissions in practice), but it matches how
//! audit rule estimates are quoted and keeps the result explainable line by
//! line. A compounding model would be `1 - Π(1 - s_i/100)`.
//!
//! ```text
//! after_co2  = before_co2  × (1 − total/100)
//! status     = TargetAchieved  if total ≥ target
//!              AdditionalActionsRequired otherwise
//! ```

use tracing::debug;

use crate::config::defaults::{MAX_SAVING_PERCENT, TARGET_SAVING_PERCENT};
use crate::config::SimulationConfig;
use crate::types::{Forecast, Metrics, Recommendation, ScenarioResult, ScenarioStatus};

/// Aggregates recommendations against a CO2 reduction target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationAggregator {
    target_percent: f64,
}

impl Default for SimulationAggregator {
    fn default() -> Self {
        Self::new(TARGET_SAVING_PERCENT)
    }
}

impl SimulationAggregator {
    /// `target_percent` is taken as-is; config validation keeps it in (0, 100].
    pub fn new(target_percent: f64) -> Self {
        Self { target_percent }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.target_saving_percent)
    }

    pub fn target_percent(&self) -> f64 {
        self.target_percent
    }

    /// Project `metrics` after applying every recommendation.
    pub fn aggregate(&self, recommendations: Vec<Recommendation>, metrics: &Metrics) -> ScenarioResult {
        let raw_total: f64 = recommendations.iter().map(|r| r.saving_percent).sum();
        let total = raw_total.clamp(0.0, MAX_SAVING_PERCENT);
        let factor = (1.0 - total / 100.0).max(0.0);

        let before_co2 = metrics.co2_annual;
        let after_co2 = (before_co2 * factor).max(0.0);
        let before_energy = metrics.total_energy;
        let after_energy = (before_energy * factor).max(0.0);

        let status = if total >= self.target_percent {
            ScenarioStatus::TargetAchieved
        } else {
            ScenarioStatus::AdditionalActionsRequired
        };

        debug!(
            actions = recommendations.len(),
            raw_total,
            total,
            target = self.target_percent,
            status = ?status,
            "Scenario aggregated"
        );

        ScenarioResult {
            recommendations,
            total_saving_percent: total,
            target_percent: self.target_percent,
            status,
            before_co2,
            after_co2,
            co2_avoided: before_co2 - after_co2,
            co2_unit: metrics.co2_unit,
            before_energy,
            after_energy,
            forecast: None,
        }
    }
}

/// Aggregate with the default 25 % target.
pub fn aggregate(recommendations: Vec<Recommendation>, metrics: &Metrics) -> ScenarioResult {
    SimulationAggregator::default().aggregate(recommendations, metrics)
}

/// Keep only recommendations whose rule id is in `ids`, preserving rule order.
///
/// Ids that match nothing are ignored.
pub fn retain_selected<S: AsRef<str>>(
    recommendations: Vec<Recommendation>,
    ids: &[S],
) -> Vec<Recommendation> {
    recommendations
        .into_iter()
        .filter(|r| ids.iter().any(|id| id.as_ref() == r.rule_id))
        .collect()
}

/// Attach an advisory forecast. Totals and status are left untouched.
pub fn with_forecast(mut scenario: ScenarioResult, forecast: Option<Forecast>) -> ScenarioResult {
    scenario.forecast = forecast;
    scenario
}
