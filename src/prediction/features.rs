//! Feature extraction for the CO2 reduction regressor

use crate::metrics;
use crate::types::FacilityInput;

/// Number of features per facility
pub const FEATURE_COUNT: usize = 5;

/// Feature names, in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "pue",
    "cpu_utilization",
    "cooling_ratio",
    "cooling_setpoint",
    "aisle_containment",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Build the feature vector for a facility.
///
/// Caller has validated the input (`it_energy > 0`).
pub fn extract(input: &FacilityInput) -> FeatureVector {
    [
        metrics::pue(input.it_energy, input.total_energy),
        input.cpu_utilization,
        input.cooling_ratio,
        input.cooling_setpoint,
        if input.aisle_containment { 1.0 } else { 0.0 },
    ]
}
