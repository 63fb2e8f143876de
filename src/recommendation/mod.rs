//! Recommendation Engine
//!
//! Matches facility input and derived metrics against the knowledge base.
//! Each rule is checked independently, in knowledge-base order, and every
//! match becomes one `Recommendation` that carries the rule's action,
//! saving and justification verbatim plus the observed values that
//! triggered it.
//!
//! Evaluation is a pure function of `(input, metrics, rules)`: no state,
//! no I/O, identical output for identical arguments.

use std::sync::Arc;
use tracing::debug;

use crate::knowledge_base::KnowledgeBase;
use crate::types::{Condition, FacilityInput, Field, Metrics, Recommendation, Rule};

// ============================================================================
// Field Snapshot
// ============================================================================

/// Read-only view over the union of input and metric fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldSnapshot<'a> {
    input: &'a FacilityInput,
    metrics: &'a Metrics,
}

impl<'a> FieldSnapshot<'a> {
    pub fn new(input: &'a FacilityInput, metrics: &'a Metrics) -> Self {
        Self { input, metrics }
    }

    /// Value of a field as `f64`; booleans map to 1.0 / 0.0.
    ///
    /// `None` for an optional input that was not provided. A comparison on a
    /// missing value never matches.
    pub fn get(&self, field: Field) -> Option<f64> {
        let i = self.input;
        let m = self.metrics;
        match field {
            Field::ItEnergy => Some(i.it_energy),
            Field::TotalEnergy => Some(i.total_energy),
            Field::CpuUtilization => Some(i.cpu_utilization),
            Field::CoolingRatio => Some(i.cooling_ratio),
            Field::CarbonFactor => Some(i.carbon_factor),
            Field::CoolingSetpoint => Some(i.cooling_setpoint),
            Field::AisleContainment => Some(if i.aisle_containment { 1.0 } else { 0.0 }),
            Field::VirtualizationLevel => i.virtualization_level,
            Field::Pue => Some(m.pue),
            Field::Dcie => Some(m.dcie),
            Field::Co2Annual => Some(m.co2_annual),
        }
    }
}

// ============================================================================
// Condition Evaluation
// ============================================================================

/// Whether `condition` holds for the snapshot.
pub fn condition_holds(condition: &Condition, snapshot: &FieldSnapshot<'_>) -> bool {
    match condition {
        Condition::Compare { field, op, threshold } => snapshot
            .get(*field)
            .is_some_and(|value| op.apply(value, *threshold)),
        Condition::All(parts) => parts.iter().all(|c| condition_holds(c, snapshot)),
        Condition::Any(parts) => parts.iter().any(|c| condition_holds(c, snapshot)),
    }
}

/// Human-readable account of the values that satisfied a matched condition.
///
/// e.g. `cpu_utilization = 18.0 < 20` or `aisle_containment = false`.
fn explain(condition: &Condition, snapshot: &FieldSnapshot<'_>) -> String {
    match condition {
        Condition::Compare { field, op, threshold } => {
            let value = snapshot.get(*field).unwrap_or(f64::NAN);
            if field.is_boolean() {
                format!("{field} = {}", value >= 0.5)
            } else {
                format!("{field} = {value:.1} {op} {threshold}")
            }
        }
        Condition::All(parts) => parts
            .iter()
            .map(|c| explain(c, snapshot))
            .collect::<Vec<_>>()
            .join(", "),
        Condition::Any(parts) => parts
            .iter()
            .filter(|c| condition_holds(c, snapshot))
            .map(|c| explain(c, snapshot))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Evaluate `rules` in order and return one recommendation per match.
///
/// An empty result is valid: nothing in the facility crossed a rule threshold.
pub fn evaluate(input: &FacilityInput, metrics: &Metrics, rules: &[Rule]) -> Vec<Recommendation> {
    let snapshot = FieldSnapshot::new(input, metrics);
    rules
        .iter()
        .filter(|rule| condition_holds(&rule.condition, &snapshot))
        .map(|rule| Recommendation {
            rule_id: rule.id.clone(),
            action: rule.action.clone(),
            saving_percent: rule.estimated_saving_percent,
            co2_impact: rule.co2_impact,
            justification: rule.justification.clone(),
            trigger: explain(&rule.condition, &snapshot),
        })
        .collect()
}

// ============================================================================
// Engine
// ============================================================================

/// Evaluates facilities against a shared, immutable knowledge base
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    kb: Arc<KnowledgeBase>,
}

impl RecommendationEngine {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn evaluate(&self, input: &FacilityInput, metrics: &Metrics) -> Vec<Recommendation> {
        let recs = evaluate(input, metrics, self.kb.rules());
        for rec in &recs {
            debug!(
                rule = %rec.rule_id,
                saving = rec.saving_percent,
                trigger = %rec.trigger,
                "Rule fired"
            );
        }
        debug!(
            matched = recs.len(),
            rules = self.kb.len(),
            "Recommendation pass complete"
        );
        recs
    }
}
