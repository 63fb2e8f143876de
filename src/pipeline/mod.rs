//! Audit Pipeline
//!
//! ## Phases
//!
//! ```text
//! PHASE 1: Metrics        (validate input, PUE / DCiE / CO2)
//! PHASE 2: Rule matching  (knowledge base, in rule order)
//! PHASE 3: Selection      (run_selected only: keep the chosen rule ids)
//! PHASE 4: Aggregation    (additive saving, before/after, target status)
//! PHASE 5: Forecast       (ONLY if a model is published; advisory)
//! ```
//!
//! Phases 1-4 are synchronous and deterministic. Phase 5 reads the current
//! model from the `ModelStore` without waiting; a missing model or a failed
//! prediction just leaves the forecast out.
//!
//! The pipeline only takes `&self` and holds no locks, so one instance can
//! be shared across threads.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::knowledge_base::KnowledgeBase;
use crate::metrics::compute_metrics;
use crate::prediction::{self, ModelStore};
use crate::recommendation::RecommendationEngine;
use crate::simulation::{retain_selected, with_forecast, SimulationAggregator};
use crate::types::{AuditReport, FacilityInput, Forecast, InvalidInputError, Recommendation};

/// Counters since the pipeline was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub evaluations: u64,
    pub targets_achieved: u64,
    pub forecasts: u64,
}

pub struct AuditPipeline {
    engine: RecommendationEngine,
    aggregator: SimulationAggregator,
    models: Option<ModelStore>,
    evaluations: AtomicU64,
    targets_achieved: AtomicU64,
    forecasts: AtomicU64,
}

impl AuditPipeline {
    pub fn new(kb: Arc<KnowledgeBase>, aggregator: SimulationAggregator) -> Self {
        info!(
            rules = kb.len(),
            target = aggregator.target_percent(),
            "Initializing audit pipeline"
        );
        Self {
            engine: RecommendationEngine::new(kb),
            aggregator,
            models: None,
            evaluations: AtomicU64::new(0),
            targets_achieved: AtomicU64::new(0),
            forecasts: AtomicU64::new(0),
        }
    }

    /// Attach a model store; forecasts are added whenever it holds a model.
    pub fn with_model_store(mut self, store: ModelStore) -> Self {
        self.models = Some(store);
        self
    }

    /// Evaluate a facility against every rule.
    pub fn run(&self, input: &FacilityInput) -> Result<AuditReport, InvalidInputError> {
        self.execute(input, None)
    }

    /// Evaluate a facility, aggregating only the recommendations whose rule id
    /// is in `ids`.
    pub fn run_selected<S: AsRef<str>>(
        &self,
        input: &FacilityInput,
        ids: &[S],
    ) -> Result<AuditReport, InvalidInputError> {
        let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        self.execute(input, Some(ids.as_slice()))
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            targets_achieved: self.targets_achieved.load(Ordering::Relaxed),
            forecasts: self.forecasts.load(Ordering::Relaxed),
        }
    }

    fn execute(
        &self,
        input: &FacilityInput,
        selection: Option<&[&str]>,
    ) -> Result<AuditReport, InvalidInputError> {
        // PHASE 1
        let metrics = compute_metrics(input).map_err(|e| {
            warn!(field = e.field(), error = %e, "Rejected facility input");
            e
        })?;

        // PHASE 2
        let mut recommendations: Vec<Recommendation> = self.engine.evaluate(input, &metrics);

        // PHASE 3
        if let Some(ids) = selection {
            let matched = recommendations.len();
            recommendations = retain_selected(recommendations, ids);
            debug!(matched, selected = recommendations.len(), "Applied rule selection");
        }

        // PHASE 4
        let scenario = self.aggregator.aggregate(recommendations, &metrics);

        // PHASE 5
        let scenario = with_forecast(scenario, self.forecast(input));

        self.evaluations.fetch_add(1, Ordering::Relaxed);
        if scenario.target_achieved() {
            self.targets_achieved.fetch_add(1, Ordering::Relaxed);
        }
        if scenario.forecast.is_some() {
            self.forecasts.fetch_add(1, Ordering::Relaxed);
        }

        info!(
            facility = input.name.as_deref().unwrap_or("-"),
            pue = metrics.pue,
            actions = scenario.recommendations.len(),
            total_saving = scenario.total_saving_percent,
            status = %scenario.status,
            "Audit evaluated"
        );

        Ok(AuditReport {
            facility: input.name.clone(),
            input: input.clone(),
            metrics,
            scenario,
            generated_at: Utc::now(),
        })
    }

    /// Forecast errors never reach the caller.
    fn forecast(&self, input: &FacilityInput) -> Option<Forecast> {
        let model = self.models.as_ref()?.current()?;
        match prediction::predict(&model, input) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(error = %e, "Forecast failed, omitting");
                None
            }
        }
    }
}
