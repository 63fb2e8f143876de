//! Shared data structures for the data-center audit pipeline
//!
//! This module defines the value types that flow through the pipeline:
//! - Input: FacilityInput (raw operating parameters)
//! - Metrics: PUE / DCiE / CO2 derived from the input
//! - Knowledge base: Rule, Condition, Field, Comparator
//! - Output: Recommendation, ScenarioResult, AuditReport
//! - Prediction: AuditRecord (history), Forecast, ModelKind
//!
//! Every type here is a plain value object; nothing holds shared mutable state.

mod facility;
mod rules;
mod scenario;
mod prediction;

pub use facility::*;
pub use rules::*;
pub use scenario::*;
pub use prediction::*;
