//! Prediction Module
//!
//! Optional, advisory forecast of the CO2 reduction a facility is likely
//! to achieve, learned from past audits. Two regressors are available:
//!
//! - `linear`: ridge-stabilised least squares on standardised features
//! - `tree`: shallow regression tree with variance-reduction splits
//!
//! Features are PUE, CPU utilization, cooling ratio, cooling setpoint and
//! aisle containment (0/1). Predictions are clamped to 0-100 %.
//!
//! The forecast sits next to the rule-based scenario and never replaces
//! it. Fitting can run in the background (`spawn_fit`) and publishes into
//! a lock-free `ModelStore`; evaluation reads whatever model is current.
//!
//! ## Submodules
//!
//! - `features`: feature vector extraction
//! - `linear`: ridge regression
//! - `tree`: regression tree
//! - `store`: `ModelStore` and the cancelable background fit
//! - `history`: `HistorySource` trait and the JSON file source

pub mod features;
pub mod history;
pub mod linear;
pub mod store;
pub mod tree;

pub use history::{HistoryError, HistorySource, JsonHistoryFile};
pub use store::{spawn_fit, ModelStore};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::defaults;
use crate::types::{AuditRecord, FacilityInput, Forecast, InvalidInputError, ModelKind};
use features::FeatureVector;
use linear::LinearModel;
use tree::RegressionTree;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("insufficient history: have {have} records, need at least {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("history record #{index} has invalid input: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: InvalidInputError,
    },

    #[error("history record #{index}: observed_co2_reduction = {value} is outside 0-100")]
    ObservedOutOfRange { index: usize, value: f64 },

    #[error("invalid facility input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("normal equations are singular (try a positive ridge_lambda)")]
    Singular,

    #[error("model fit was cancelled")]
    Cancelled,

    #[error("model fit task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Fit Options
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub kind: ModelKind,
    /// Fewer records fail with `InsufficientHistory`
    pub min_history: usize,
    pub tree_max_depth: usize,
    pub tree_min_samples_leaf: usize,
    pub ridge_lambda: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            kind: ModelKind::Linear,
            min_history: defaults::MIN_HISTORY_RECORDS,
            tree_max_depth: defaults::TREE_MAX_DEPTH,
            tree_min_samples_leaf: defaults::TREE_MIN_SAMPLES_LEAF,
            ridge_lambda: defaults::RIDGE_LAMBDA,
        }
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Regressor {
    Linear(LinearModel),
    Tree(RegressionTree),
}

/// A fitted regressor plus its training summary
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    regressor: Regressor,
    training_samples: usize,
    r_squared: f64,
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        match self.regressor {
            Regressor::Linear(_) => ModelKind::Linear,
            Regressor::Tree(_) => ModelKind::Tree,
        }
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    /// Coefficient of determination on the training set
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    fn raw_predict(&self, features: &FeatureVector) -> f64 {
        match &self.regressor {
            Regressor::Linear(m) => m.predict(features),
            Regressor::Tree(t) => t.predict(features),
        }
    }
}

/// Fit a model on past audits.
pub fn fit(history: &[AuditRecord], options: &FitOptions) -> Result<Model, PredictionError> {
    let need = options.min_history.max(2);
    if history.len() < need {
        return Err(PredictionError::InsufficientHistory {
            have: history.len(),
            need,
        });
    }

    let mut x: Vec<FeatureVector> = Vec::with_capacity(history.len());
    let mut y: Vec<f64> = Vec::with_capacity(history.len());
    for (index, record) in history.iter().enumerate() {
        record
            .input
            .validate()
            .map_err(|source| PredictionError::InvalidRecord { index, source })?;
        let observed = record.observed_co2_reduction;
        if !observed.is_finite() || !(0.0..=100.0).contains(&observed) {
            return Err(PredictionError::ObservedOutOfRange { index, value: observed });
        }
        x.push(features::extract(&record.input));
        y.push(observed);
    }

    let regressor = match options.kind {
        ModelKind::Linear => Regressor::Linear(LinearModel::fit(&x, &y, options.ridge_lambda)?),
        ModelKind::Tree => Regressor::Tree(RegressionTree::fit(
            &x,
            &y,
            options.tree_max_depth,
            options.tree_min_samples_leaf,
        )),
    };

    let mut model = Model {
        regressor,
        training_samples: history.len(),
        r_squared: 0.0,
    };
    model.r_squared = r_squared(&model, &x, &y);

    info!(
        model = %model.kind(),
        samples = model.training_samples,
        r_squared = model.r_squared,
        "Prediction model fitted"
    );
    log_structure(&model);
    Ok(model)
}

fn log_structure(model: &Model) {
    match &model.regressor {
        Regressor::Linear(m) => {
            debug!(intercept = m.intercept(), "Linear model intercept");
            for (feature, beta) in features::FEATURE_NAMES.iter().zip(m.coefficients()) {
                debug!(feature, coefficient = beta, "Linear model coefficient");
            }
        }
        Regressor::Tree(t) => {
            debug!(depth = t.depth(), leaves = t.leaf_count(), "Regression tree shape");
        }
    }
}

fn r_squared(model: &Model, x: &[FeatureVector], y: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = x
        .iter()
        .zip(y)
        .map(|(row, v)| (v - model.raw_predict(row)).powi(2))
        .sum();
    if ss_tot <= f64::EPSILON {
        return if ss_res <= 1e-9 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Forecast the CO2 reduction for a facility, clamped to 0-100 %.
pub fn predict(model: &Model, input: &FacilityInput) -> Result<Forecast, PredictionError> {
    input.validate()?;
    let raw = model.raw_predict(&features::extract(input));
    let clamped = if raw.is_finite() { raw.clamp(0.0, 100.0) } else { 0.0 };
    debug!(model = %model.kind(), raw, clamped, "Forecast computed");

    Ok(Forecast {
        predicted_co2_reduction_percent: clamped,
        model: model.kind(),
        training_samples: model.training_samples,
        fit_r_squared: model.r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CarbonUnit;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn facility(pue: f64, cpu: f64, cooling: f64) -> FacilityInput {
        FacilityInput {
            name: None,
            it_energy: 1000.0,
            total_energy: 1000.0 * pue,
            cpu_utilization: cpu,
            cooling_ratio: cooling,
            carbon_factor: 0.3,
            cooling_setpoint: 22.0,
            aisle_containment: false,
            virtualization_level: None,
            carbon_unit: CarbonUnit::Kg,
        }
    }

    fn record(pue: f64, cpu: f64, cooling: f64, observed: f64) -> AuditRecord {
        AuditRecord {
            input: facility(pue, cpu, cooling),
            observed_co2_reduction: observed,
            recorded_at: None,
            label: None,
        }
    }

    #[test]
    fn test_insufficient_history() {
        let history = vec![record(1.5, 20.0, 50.0, 10.0), record(1.8, 15.0, 60.0, 20.0)];
        match fit(&history, &FitOptions::default()) {
            Err(PredictionError::InsufficientHistory { have, need }) => {
                assert_eq!(have, 2);
                assert_eq!(need, 3);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_record_rejected() {
        let mut history = vec![
            record(1.5, 20.0, 50.0, 10.0),
            record(1.8, 15.0, 60.0, 20.0),
            record(1.6, 25.0, 55.0, 12.0),
        ];
        history[1].input.cpu_utilization = 140.0;
        assert!(matches!(
            fit(&history, &FitOptions::default()),
            Err(PredictionError::InvalidRecord { index: 1, .. })
        ));

        history[1].input.cpu_utilization = 15.0;
        history[2].observed_co2_reduction = 120.0;
        assert!(matches!(
            fit(&history, &FitOptions::default()),
            Err(PredictionError::ObservedOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_linear_tracks_noisy_relation() {
        let mut rng = StdRng::seed_from_u64(42);
        let history: Vec<AuditRecord> = (0..40)
            .map(|_| {
                let pue: f64 = rng.gen_range(1.2..2.2);
                let cpu: f64 = rng.gen_range(5.0..60.0);
                let cooling: f64 = rng.gen_range(30.0..70.0);
                let noise: f64 = rng.gen_range(-0.5..0.5);
                let observed = (5.0 + 20.0 * (pue - 1.2) + 0.2 * cooling + noise).clamp(0.0, 100.0);
                record(pue, cpu, cooling, observed)
            })
            .collect();

        let model = fit(&history, &FitOptions::default()).unwrap();
        assert_eq!(model.kind(), ModelKind::Linear);
        assert!(model.r_squared() > 0.95, "r2 = {}", model.r_squared());

        let forecast = predict(&model, &facility(1.7, 30.0, 50.0)).unwrap();
        let expected = 5.0 + 20.0 * 0.5 + 0.2 * 50.0;
        assert!(
            (forecast.predicted_co2_reduction_percent - expected).abs() < 1.5,
            "forecast = {forecast:?}"
        );
        assert_eq!(forecast.training_samples, 40);
    }

    #[test]
    fn test_prediction_is_clamped() {
        let history = vec![
            record(1.2, 20.0, 40.0, 0.0),
            record(1.5, 20.0, 40.0, 30.0),
            record(1.8, 20.0, 40.0, 60.0),
            record(2.1, 20.0, 40.0, 90.0),
        ];
        let model = fit(&history, &FitOptions::default()).unwrap();
        let high = predict(&model, &facility(4.0, 20.0, 40.0)).unwrap();
        assert_eq!(high.predicted_co2_reduction_percent, 100.0);
        let low = predict(&model, &facility(1.0, 20.0, 40.0)).unwrap();
        assert_eq!(low.predicted_co2_reduction_percent, 0.0);
    }

    #[test]
    fn test_tree_model() {
        let history = vec![
            record(1.3, 40.0, 40.0, 5.0),
            record(1.35, 45.0, 42.0, 6.0),
            record(1.9, 12.0, 65.0, 28.0),
            record(2.0, 10.0, 68.0, 30.0),
        ];
        let options = FitOptions { kind: ModelKind::Tree, ..FitOptions::default() };
        let model = fit(&history, &options).unwrap();
        assert_eq!(model.kind(), ModelKind::Tree);
        let f = predict(&model, &facility(1.95, 11.0, 66.0)).unwrap();
        assert!(f.predicted_co2_reduction_percent > 25.0);
        assert_eq!(f.model, ModelKind::Tree);
    }

    #[test]
    fn test_predict_rejects_invalid_input() {
        let history = vec![
            record(1.3, 40.0, 40.0, 5.0),
            record(1.6, 30.0, 50.0, 15.0),
            record(1.9, 12.0, 65.0, 28.0),
        ];
        let model = fit(&history, &FitOptions::default()).unwrap();
        let mut bad = facility(1.5, 20.0, 40.0);
        bad.it_energy = 0.0;
        assert!(matches!(predict(&model, &bad), Err(PredictionError::InvalidInput(_))));
    }
}
