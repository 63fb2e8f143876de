//! Facility input, derived efficiency metrics, and input validation errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Carbon Unit
// ============================================================================

/// Mass unit produced by `carbon_factor` per kWh.
///
/// Carried through to the metrics as metadata; values are never converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarbonUnit {
    /// kg CO2 per kWh (most grid intensity tables)
    #[default]
    #[serde(alias = "kg_co2")]
    Kg,
    /// tonnes CO2 per kWh
    #[serde(alias = "t", alias = "tonne")]
    Tonnes,
}

impl std::fmt::Display for CarbonUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CarbonUnit::Kg => write!(f, "kg"),
            CarbonUnit::Tonnes => write!(f, "t"),
        }
    }
}

// ============================================================================
// Facility Input
// ============================================================================

/// Raw operating parameters of one data center, normalized by the ingestion layer.
///
/// Energies are annual figures in kWh. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityInput {
    /// Optional facility label (reporting only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// IT equipment energy (kWh/yr)
    pub it_energy: f64,
    /// Total facility energy (kWh/yr)
    pub total_energy: f64,
    /// Average CPU utilization (%)
    pub cpu_utilization: f64,
    /// Share of facility energy spent on cooling (%)
    pub cooling_ratio: f64,
    /// Carbon intensity (CO2 mass per kWh, see `carbon_unit`)
    pub carbon_factor: f64,
    /// Cooling setpoint (°C)
    pub cooling_setpoint: f64,
    /// Hot/cold aisle containment in place
    pub aisle_containment: bool,
    /// Server virtualization level (%), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtualization_level: Option<f64>,
    /// Unit of `carbon_factor`
    #[serde(default)]
    pub carbon_unit: CarbonUnit,
}

impl FacilityInput {
    /// Check every invariant of the input record.
    ///
    /// Violations are reported, never clamped. The first violated constraint wins,
    /// checked in field order so the error is stable for a given input.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        let numeric = [
            ("it_energy", self.it_energy),
            ("total_energy", self.total_energy),
            ("cpu_utilization", self.cpu_utilization),
            ("cooling_ratio", self.cooling_ratio),
            ("carbon_factor", self.carbon_factor),
            ("cooling_setpoint", self.cooling_setpoint),
        ];
        for (field, value) in numeric {
            if !value.is_finite() {
                return Err(InvalidInputError::NotFinite { field, value });
            }
        }
        if let Some(v) = self.virtualization_level {
            if !v.is_finite() {
                return Err(InvalidInputError::NotFinite {
                    field: "virtualization_level",
                    value: v,
                });
            }
        }

        if self.it_energy <= 0.0 {
            return Err(InvalidInputError::NonPositiveItEnergy(self.it_energy));
        }
        if self.total_energy < self.it_energy {
            return Err(InvalidInputError::TotalBelowIt {
                total: self.total_energy,
                it: self.it_energy,
            });
        }

        check_percent("cpu_utilization", self.cpu_utilization)?;
        check_percent("cooling_ratio", self.cooling_ratio)?;
        if let Some(v) = self.virtualization_level {
            check_percent("virtualization_level", v)?;
        }

        if self.carbon_factor < 0.0 {
            return Err(InvalidInputError::NegativeCarbonFactor(self.carbon_factor));
        }

        Ok(())
    }
}

fn check_percent(field: &'static str, value: f64) -> Result<(), InvalidInputError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(InvalidInputError::PercentOutOfRange { field, value })
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Efficiency indicators derived from a `FacilityInput`.
///
/// Always recomputed from the input that produced it; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Power Usage Effectiveness (total / IT), >= 1 on valid input
    pub pue: f64,
    /// Data Center infrastructure Efficiency (%), = 100 / PUE
    pub dcie: f64,
    /// Annual CO2 emissions, in `co2_unit`
    pub co2_annual: f64,
    /// Mass unit of `co2_annual`
    pub co2_unit: CarbonUnit,
    /// Annual facility energy the indicators were derived from (kWh)
    pub total_energy: f64,
}

// ============================================================================
// Error Type
// ============================================================================

/// A `FacilityInput` violates one of its invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInputError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("it_energy must be > 0 kWh, got {0}")]
    NonPositiveItEnergy(f64),

    #[error("total_energy ({total}) must be >= it_energy ({it})")]
    TotalBelowIt { total: f64, it: f64 },

    #[error("{field} = {value} is outside the 0-100 % range")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("carbon_factor must be >= 0, got {0}")]
    NegativeCarbonFactor(f64),
}

impl InvalidInputError {
    /// Name of the offending input field.
    pub fn field(&self) -> &'static str {
        match self {
            InvalidInputError::NotFinite { field, .. }
            | InvalidInputError::PercentOutOfRange { field, .. } => field,
            InvalidInputError::NonPositiveItEnergy(_) => "it_energy",
            InvalidInputError::TotalBelowIt { .. } => "total_energy",
            InvalidInputError::NegativeCarbonFactor(_) => "carbon_factor",
        }
    }
}
