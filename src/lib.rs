//! GreenDC Audit: knowledge-based energy and CO2 audits for data centers
//!
//! Computes efficiency indicators for a facility, matches them against a
//! declarative rule base, and projects the combined effect of the
//! recommended actions against a CO2 reduction target.
//!
//! ## Architecture
//!
//! - **Metrics**: PUE, DCiE and annual CO2 from validated facility input
//! - **Knowledge Base**: rules and reference standards, validated at load time
//! - **Recommendation Engine**: rule matching in knowledge-base order
//! - **Simulation**: additive before/after scenario and target status
//! - **Prediction**: optional regression forecast from past audits
//! - **Pipeline**: the above wired together behind `AuditPipeline::run`

pub mod config;
pub mod types;
pub mod metrics;
pub mod knowledge_base;
pub mod recommendation;
pub mod simulation;
pub mod prediction;
pub mod pipeline;
pub mod report;

// Re-export configuration
pub use config::{AuditConfig, ConfigError};

// Re-export commonly used types
pub use types::{
    AuditRecord, AuditReport, CarbonUnit, Co2Impact, Comparator, Condition, FacilityInput, Field,
    Forecast, InvalidInputError, Metrics, ModelKind, Recommendation, Rule, ScenarioResult,
    ScenarioStatus,
};

// Re-export the processing stages
pub use knowledge_base::{KnowledgeBase, KnowledgeBaseLoadError, RuleFormat};
pub use metrics::compute_metrics;
pub use pipeline::{AuditPipeline, PipelineStats};
pub use recommendation::{evaluate, RecommendationEngine};
pub use simulation::{aggregate, SimulationAggregator};

// Re-export prediction components
pub use prediction::{
    fit, predict, spawn_fit, FitOptions, HistorySource, JsonHistoryFile, Model, ModelStore,
    PredictionError,
};
