//! Knowledge base rule types: fields, comparators, conditions, and rules

use serde::{Deserialize, Serialize};

/// Ordinal CO2 impact class of a rule's action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Co2Impact {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

impl std::fmt::Display for Co2Impact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Co2Impact::Low => write!(f, "Low"),
            Co2Impact::Medium => write!(f, "Medium"),
            Co2Impact::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Co2Impact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Co2Impact::Low),
            "medium" => Ok(Co2Impact::Medium),
            "high" => Ok(Co2Impact::High),
            other => Err(format!("unknown co2_impact '{other}' (expected Low, Medium or High)")),
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Named value a rule condition may reference.
///
/// Union of the `FacilityInput` fields and the derived `Metrics` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ItEnergy,
    TotalEnergy,
    CpuUtilization,
    CoolingRatio,
    CarbonFactor,
    CoolingSetpoint,
    AisleContainment,
    VirtualizationLevel,
    Pue,
    Dcie,
    Co2Annual,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: [Field; 11] = [
        Field::ItEnergy,
        Field::TotalEnergy,
        Field::CpuUtilization,
        Field::CoolingRatio,
        Field::CarbonFactor,
        Field::CoolingSetpoint,
        Field::AisleContainment,
        Field::VirtualizationLevel,
        Field::Pue,
        Field::Dcie,
        Field::Co2Annual,
    ];

    /// Name used in condition expressions
    pub fn as_str(self) -> &'static str {
        match self {
            Field::ItEnergy => "it_energy",
            Field::TotalEnergy => "total_energy",
            Field::CpuUtilization => "cpu_utilization",
            Field::CoolingRatio => "cooling_ratio",
            Field::CarbonFactor => "carbon_factor",
            Field::CoolingSetpoint => "cooling_setpoint",
            Field::AisleContainment => "aisle_containment",
            Field::VirtualizationLevel => "virtualization_level",
            Field::Pue => "pue",
            Field::Dcie => "dcie",
            Field::Co2Annual => "co2_annual",
        }
    }

    /// Look up a field by its expression name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(name))
    }

    /// Boolean fields compare as 1.0 (true) / 0.0 (false)
    pub fn is_boolean(self) -> bool {
        matches!(self, Field::AisleContainment)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Comparators
// ============================================================================

/// Tolerance for `=` / `!=` on floating point values
const EQ_TOLERANCE: f64 = 1e-9;

/// Comparison operator of a single-predicate condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl Comparator {
    /// Canonical ASCII symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Le => "<=",
            Comparator::Ge => ">=",
            Comparator::Eq => "=",
            Comparator::Ne => "!=",
        }
    }

    /// Parse an operator token; accepts `≤`, `≥` and `==` as aliases.
    pub fn from_symbol(token: &str) -> Option<Self> {
        match token {
            "<" => Some(Comparator::Lt),
            ">" => Some(Comparator::Gt),
            "<=" | "≤" => Some(Comparator::Le),
            ">=" | "≥" => Some(Comparator::Ge),
            "=" | "==" => Some(Comparator::Eq),
            "!=" => Some(Comparator::Ne),
            _ => None,
        }
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::Lt => lhs < rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Eq => (lhs - rhs).abs() <= EQ_TOLERANCE,
            Comparator::Ne => (lhs - rhs).abs() > EQ_TOLERANCE,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Typed rule condition.
///
/// `Compare` is the baseline shape; `All` / `Any` hold `and` / `or` compounds.
/// Serialized as its expression string (see `knowledge_base::condition`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    Compare {
        field: Field,
        op: Comparator,
        threshold: f64,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// Fields referenced anywhere in the condition, in first-seen order.
    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<Field>) {
        match self {
            Condition::Compare { field, .. } => {
                if !out.contains(field) {
                    out.push(*field);
                }
            }
            Condition::All(parts) | Condition::Any(parts) => {
                for part in parts {
                    part.collect_fields(out);
                }
            }
        }
    }
}

impl Condition {
    /// Disjunctive normal form: an `or` of `and`-clauses of comparisons.
    ///
    /// The expression grammar has no parentheses, so this is the only shape
    /// it can write back. A nested `All([Any(a, b), c])` becomes
    /// `[[a, c], [b, c]]`, which means the same thing.
    pub fn clauses(&self) -> Vec<Vec<&Condition>> {
        match self {
            Condition::Compare { .. } => vec![vec![self]],
            Condition::Any(parts) => parts.iter().flat_map(Condition::clauses).collect(),
            Condition::All(parts) => parts.iter().fold(vec![Vec::new()], |acc, part| {
                let rhs = part.clauses();
                acc.iter()
                    .flat_map(|left| {
                        rhs.iter().map(move |right| {
                            let mut clause = left.clone();
                            clause.extend(right.iter().copied());
                            clause
                        })
                    })
                    .collect()
            }),
        }
    }

    /// True when no `All` / `Any` in the tree is empty.
    ///
    /// Empty compounds have no expression form.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Condition::Compare { .. } => true,
            Condition::All(parts) | Condition::Any(parts) => {
                !parts.is_empty() && parts.iter().all(Condition::is_well_formed)
            }
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Condition::Compare { field, op, threshold } = self {
            return if field.is_boolean() {
                let literal = if *threshold >= 0.5 { "true" } else { "false" };
                write!(f, "{field} {op} {literal}")
            } else {
                write!(f, "{field} {op} {threshold}")
            };
        }
        for (i, clause) in self.clauses().iter().enumerate() {
            if i > 0 {
                f.write_str(" or ")?;
            }
            for (j, cmp) in clause.iter().enumerate() {
                if j > 0 {
                    f.write_str(" and ")?;
                }
                write!(f, "{cmp}")?;
            }
        }
        Ok(())
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}

// ============================================================================
// Rule
// ============================================================================

/// One declarative audit rule. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier (e.g. `CPU_LOW`)
    pub id: String,
    /// Predicate over input/metric fields
    pub condition: Condition,
    /// Recommended action
    pub action: String,
    /// Estimated energy saving of the action (%, 0-100)
    #[serde(rename = "estimated_energy_saving_percent")]
    pub estimated_saving_percent: f64,
    /// Ordinal CO2 impact class
    pub co2_impact: Co2Impact,
    /// Why the action helps
    pub justification: String,
}
