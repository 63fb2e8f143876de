//! Energy-efficiency metrics for data-center audits
//!
//! Pure formulas, no side effects. `compute_metrics` validates the input
//! before any division so invalid records are rejected instead of producing
//! `inf`/`NaN` indicators.

use crate::types::{FacilityInput, InvalidInputError, Metrics};

/// Power Usage Effectiveness
///
/// Formula: PUE = total_energy / it_energy
///
/// ## Expected Values
/// - 1.0: theoretical ideal (every kWh reaches IT equipment)
/// - 1.2-1.4: efficient hyperscale facility
/// - 1.5-1.8: typical enterprise facility
/// - > 2.0: poor efficiency, large cooling/power overhead
///
/// Caller guarantees `it_energy > 0`.
pub fn pue(it_energy: f64, total_energy: f64) -> f64 {
    total_energy / it_energy
}

/// Data Center infrastructure Efficiency (%)
///
/// Formula: DCiE = it_energy / total_energy × 100, which is 100 / PUE.
///
/// Caller guarantees `total_energy > 0`.
pub fn dcie(it_energy: f64, total_energy: f64) -> f64 {
    (it_energy / total_energy) * 100.0
}

/// Annual CO2 emissions
///
/// Formula: CO2 = total_energy (kWh) × carbon_factor (mass / kWh).
/// The result is in whatever mass unit `carbon_factor` is declared in.
pub fn co2_annual(total_energy: f64, carbon_factor: f64) -> f64 {
    total_energy * carbon_factor
}

/// Compute PUE, DCiE and annual CO2 for a facility.
///
/// Fails with `InvalidInputError` when `it_energy <= 0`, `total_energy < it_energy`,
/// a percentage field is outside 0-100, or a value is not finite.
pub fn compute_metrics(input: &FacilityInput) -> Result<Metrics, InvalidInputError> {
    input.validate()?;

    Ok(Metrics {
        pue: pue(input.it_energy, input.total_energy),
        dcie: dcie(input.it_energy, input.total_energy),
        co2_annual: co2_annual(input.total_energy, input.carbon_factor),
        co2_unit: input.carbon_unit,
        total_energy: input.total_energy,
    })
}
