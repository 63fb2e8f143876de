//! Knowledge base: declarative audit rules and the standards they cite
//!
//! Rules are stored as TOML or JSON and validated completely at load time.
//! A malformed rule fails the load with a `KnowledgeBaseLoadError` naming
//! the rule and the problem; evaluation never sees a half-valid rule.
//!
//! ## TOML Layout
//!
//! ```toml
//! version = "2024.1"
//! standards = ["ISO/IEC 30134-2 (PUE)"]
//!
//! [[rules]]
//! id = "CPU_LOW"
//! condition = "cpu_utilization < 20"
//! action = "Server consolidation"
//! estimated_energy_saving_percent = 15
//! co2_impact = "High"
//! justification = "..."
//! ```
//!
//! JSON uses the same keys, either as an object with a `rules` array or as
//! a bare array of rules.
//!
//! A `KnowledgeBase` is immutable once built. Share it as `Arc<KnowledgeBase>`.

pub mod condition;

pub use condition::{parse_condition, ConditionParseError};

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{Co2Impact, Rule};

/// Rule store shipped with the crate.
const BUILTIN_RULES: &str = include_str!("../../data/knowledge_base/rules.toml");

// ============================================================================
// Errors
// ============================================================================

/// The rule store could not be turned into a valid `KnowledgeBase`.
#[derive(Debug, Error)]
pub enum KnowledgeBaseLoadError {
    #[error("cannot read knowledge base {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("knowledge base TOML is malformed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("knowledge base JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported knowledge base format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),

    #[error("knowledge base JSON has an unexpected shape: {0}")]
    JsonShape(String),

    #[error("rule #{index} ({id}) is malformed: {source}")]
    MalformedRule {
        index: usize,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule #{index} ({id}) is missing required field '{field}'")]
    MissingField {
        index: usize,
        id: String,
        field: &'static str,
    },

    #[error("rule {id} has an invalid condition: {source}")]
    InvalidCondition {
        id: String,
        #[source]
        source: ConditionParseError,
    },

    #[error("rule {id}: estimated_energy_saving_percent = {value} is outside 0-100")]
    SavingOutOfRange { id: String, value: f64 },

    #[error("rule {id}: {message}")]
    InvalidImpact { id: String, message: String },

    #[error("duplicate rule id '{0}'")]
    DuplicateId(String),
}

// ============================================================================
// Source Format
// ============================================================================

/// Serialization format of a rule store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Toml,
    Json,
}

impl RuleFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, KnowledgeBaseLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(RuleFormat::Toml),
            "json" => Ok(RuleFormat::Json),
            _ => Err(KnowledgeBaseLoadError::UnsupportedFormat(ext)),
        }
    }
}

// ============================================================================
// Raw Document
// ============================================================================

// Every rule field is optional here so a missing one is reported with the
// rule's position and id instead of a bare serde message.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    standards: Vec<String>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    id: Option<String>,
    condition: Option<String>,
    action: Option<String>,
    #[serde(alias = "saving_percent", alias = "estimated_saving_percent")]
    estimated_energy_saving_percent: Option<f64>,
    co2_impact: Option<String>,
    justification: Option<String>,
}

impl RawRule {
    fn into_rule(self, index: usize) -> Result<Rule, KnowledgeBaseLoadError> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                return Err(KnowledgeBaseLoadError::MissingField {
                    index,
                    id: "<unnamed>".to_string(),
                    field: "id",
                })
            }
        };
        let missing = |field: &'static str| KnowledgeBaseLoadError::MissingField {
            index,
            id: id.clone(),
            field,
        };

        let text = |value: Option<String>, field: &'static str| match value {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(missing(field)),
        };

        let condition_text = text(self.condition, "condition")?;
        let action = text(self.action, "action")?;
        let saving = self
            .estimated_energy_saving_percent
            .ok_or_else(|| missing("estimated_energy_saving_percent"))?;
        let impact_text = text(self.co2_impact, "co2_impact")?;
        let justification = text(self.justification, "justification")?;

        let condition = parse_condition(&condition_text).map_err(|source| {
            KnowledgeBaseLoadError::InvalidCondition {
                id: id.clone(),
                source,
            }
        })?;

        if !saving.is_finite() || !(0.0..=100.0).contains(&saving) {
            return Err(KnowledgeBaseLoadError::SavingOutOfRange { id, value: saving });
        }

        let co2_impact: Co2Impact = impact_text
            .parse()
            .map_err(|message| KnowledgeBaseLoadError::InvalidImpact {
                id: id.clone(),
                message,
            })?;

        Ok(Rule {
            id,
            condition,
            action,
            estimated_saving_percent: saving,
            co2_impact,
            justification,
        })
    }
}

/// Decode a JSON store rule by rule so a bad value is reported against
/// the rule it belongs to.
fn raw_json_document(value: Value) -> Result<RawDocument, KnowledgeBaseLoadError> {
    let (mut doc, rules) = match value {
        Value::Array(rules) => (RawDocument::default(), rules),
        Value::Object(mut map) => {
            let rules = match map.remove("rules") {
                None => Vec::new(),
                Some(Value::Array(rules)) => rules,
                Some(other) => {
                    return Err(KnowledgeBaseLoadError::JsonShape(format!(
                        "'rules' must be an array, found {}",
                        json_kind(&other)
                    )))
                }
            };
            (serde_json::from_value(Value::Object(map))?, rules)
        }
        other => {
            return Err(KnowledgeBaseLoadError::JsonShape(format!(
                "expected an object or an array of rules, found {}",
                json_kind(&other)
            )))
        }
    };

    doc.rules = rules
        .into_iter()
        .enumerate()
        .map(|(index, rule)| {
            let id = rule
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<unnamed>")
                .to_string();
            serde_json::from_value(rule)
                .map_err(|source| KnowledgeBaseLoadError::MalformedRule { index, id, source })
        })
        .collect::<Result<_, _>>()?;
    Ok(doc)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Knowledge Base
// ============================================================================

/// Ordered, validated rule set plus the standards it references
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    version: Option<String>,
    rules: Vec<Rule>,
    standards: Vec<String>,
}

impl KnowledgeBase {
    /// Build from already-typed rules, enforcing unique ids.
    pub fn new(rules: Vec<Rule>, standards: Vec<String>) -> Result<Self, KnowledgeBaseLoadError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !rule.condition.is_well_formed() {
                return Err(KnowledgeBaseLoadError::InvalidCondition {
                    id: rule.id.clone(),
                    source: ConditionParseError::Empty,
                });
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(KnowledgeBaseLoadError::DuplicateId(rule.id.clone()));
            }
            if !rule.estimated_saving_percent.is_finite()
                || !(0.0..=100.0).contains(&rule.estimated_saving_percent)
            {
                return Err(KnowledgeBaseLoadError::SavingOutOfRange {
                    id: rule.id.clone(),
                    value: rule.estimated_saving_percent,
                });
            }
        }
        Ok(Self {
            version: None,
            rules,
            standards,
        })
    }

    /// Parse and validate a rule store from text.
    pub fn load_rules(source: &str, format: RuleFormat) -> Result<Self, KnowledgeBaseLoadError> {
        let raw = match format {
            RuleFormat::Toml => toml::from_str::<RawDocument>(source)?,
            RuleFormat::Json => raw_json_document(serde_json::from_str(source)?)?,
        };

        let rules = raw
            .rules
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.into_rule(i))
            .collect::<Result<Vec<_>, _>>()?;

        let mut kb = Self::new(rules, raw.standards)?;
        kb.version = raw.version;
        debug!(rules = kb.rules.len(), standards = kb.standards.len(), "Parsed knowledge base");
        Ok(kb)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, KnowledgeBaseLoadError> {
        Self::load_rules(source, RuleFormat::Toml)
    }

    pub fn from_json_str(source: &str) -> Result<Self, KnowledgeBaseLoadError> {
        Self::load_rules(source, RuleFormat::Json)
    }

    /// Load a rule store from disk; the extension selects the format.
    pub fn load(path: &Path) -> Result<Self, KnowledgeBaseLoadError> {
        let format = RuleFormat::from_path(path)?;
        let contents =
            std::fs::read_to_string(path).map_err(|source| KnowledgeBaseLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let kb = Self::load_rules(&contents, format)?;
        info!(
            path = %path.display(),
            rules = kb.rules.len(),
            version = kb.version.as_deref().unwrap_or("-"),
            "Loaded knowledge base"
        );
        Ok(kb)
    }

    /// The rule set bundled with the crate.
    pub fn builtin() -> Result<Self, KnowledgeBaseLoadError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn standards(&self) -> &[String] {
        &self.standards
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Comparator, Condition, Field};

    const ONE_RULE: &str = r#"
[[rules]]
id = "CPU_LOW"
condition = "cpu_utilization < 20"
action = "Server consolidation"
estimated_energy_saving_percent = 15
co2_impact = "High"
justification = "Low utilization"
"#;

    #[test]
    fn test_builtin_loads() {
        let kb = KnowledgeBase::builtin().unwrap();
        assert!(kb.len() >= 6);
        assert!(!kb.standards().is_empty());
        assert_eq!(kb.rules()[0].id, "CPU_LOW");
        assert_eq!(kb.rules()[1].id, "COOLING_HIGH");
        let cpu = kb.get("CPU_LOW").unwrap();
        assert_eq!(cpu.estimated_saving_percent, 15.0);
        assert_eq!(cpu.co2_impact, Co2Impact::High);
        assert_eq!(
            cpu.condition,
            Condition::Compare { field: Field::CpuUtilization, op: Comparator::Lt, threshold: 20.0 }
        );
    }

    #[test]
    fn test_toml_single_rule() {
        let kb = KnowledgeBase::from_toml_str(ONE_RULE).unwrap();
        assert_eq!(kb.len(), 1);
        assert!(kb.version().is_none());
        assert!(kb.standards().is_empty());
    }

    #[test]
    fn test_json_bare_array_and_document() {
        let bare = r#"[{"id": "A", "condition": "pue > 2", "action": "x",
            "estimated_energy_saving_percent": 5, "co2_impact": "low", "justification": "j"}]"#;
        let kb = KnowledgeBase::from_json_str(bare).unwrap();
        assert_eq!(kb.rules()[0].co2_impact, Co2Impact::Low);

        let doc = r#"{"version": "1", "standards": ["ISO 50001"], "rules": [{"id": "A",
            "condition": "pue > 2", "action": "x", "saving_percent": 5,
            "co2_impact": "Medium", "justification": "j"}]}"#;
        let kb = KnowledgeBase::from_json_str(doc).unwrap();
        assert_eq!(kb.version(), Some("1"));
        assert_eq!(kb.standards(), ["ISO 50001".to_string()]);
    }

    #[test]
    fn test_missing_field_named() {
        let src = ONE_RULE.replace("action = \"Server consolidation\"\n", "");
        let err = KnowledgeBase::from_toml_str(&src).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeBaseLoadError::MissingField { index: 0, field: "action", .. }
        ));
        assert!(err.to_string().contains("CPU_LOW"));
    }

    #[test]
    fn test_unknown_condition_field_rejected() {
        let src = ONE_RULE.replace("cpu_utilization < 20", "inlet_temp > 27");
        let err = KnowledgeBase::from_toml_str(&src).unwrap_err();
        match err {
            KnowledgeBaseLoadError::InvalidCondition { id, source } => {
                assert_eq!(id, "CPU_LOW");
                assert_eq!(source, ConditionParseError::UnknownField("inlet_temp".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_saving_out_of_range_rejected() {
        let src = ONE_RULE.replace("= 15", "= 150");
        assert!(matches!(
            KnowledgeBase::from_toml_str(&src),
            Err(KnowledgeBaseLoadError::SavingOutOfRange { value, .. }) if value == 150.0
        ));
        let src = ONE_RULE.replace("= 15", "= -1");
        assert!(KnowledgeBase::from_toml_str(&src).is_err());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let src = format!("{ONE_RULE}{ONE_RULE}");
        assert!(matches!(
            KnowledgeBase::from_toml_str(&src),
            Err(KnowledgeBaseLoadError::DuplicateId(id)) if id == "CPU_LOW"
        ));
    }

    #[test]
    fn test_bad_impact_rejected() {
        let src = ONE_RULE.replace("\"High\"", "\"Extreme\"");
        assert!(matches!(
            KnowledgeBase::from_toml_str(&src),
            Err(KnowledgeBaseLoadError::InvalidImpact { .. })
        ));
    }

    #[test]
    fn test_blank_text_fields_rejected() {
        for (from, to, field) in [
            ("\"Server consolidation\"", "\"\"", "action"),
            ("\"Low utilization\"", "\"   \"", "justification"),
            ("\"cpu_utilization < 20\"", "\" \"", "condition"),
        ] {
            let err = KnowledgeBase::from_toml_str(&ONE_RULE.replace(from, to)).unwrap_err();
            assert!(
                matches!(err, KnowledgeBaseLoadError::MissingField { field: f, .. } if f == field),
                "{field}: {err}"
            );
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            KnowledgeBase::from_toml_str(&ONE_RULE.replace("[[rules]]", "[[rule]]")),
            Err(KnowledgeBaseLoadError::Toml(_))
        ));
        assert!(matches!(
            KnowledgeBase::from_toml_str(&ONE_RULE.replace("co2_impact", "co2_impakt")),
            Err(KnowledgeBaseLoadError::Toml(_))
        ));
        assert!(matches!(
            KnowledgeBase::from_json_str(r#"{"rulez": [{"id": "A"}]}"#),
            Err(KnowledgeBaseLoadError::Json(_))
        ));
    }

    #[test]
    fn test_json_shape_errors() {
        assert!(matches!(
            KnowledgeBase::from_json_str(r#"{"rules": {"id": "A"}}"#),
            Err(KnowledgeBaseLoadError::JsonShape(_))
        ));
        assert!(matches!(
            KnowledgeBase::from_json_str("42"),
            Err(KnowledgeBaseLoadError::JsonShape(_))
        ));
    }

    #[test]
    fn test_empty_compound_condition_rejected() {
        let rule = Rule {
            id: "EMPTY".to_string(),
            condition: Condition::Any(Vec::new()),
            action: "x".to_string(),
            estimated_saving_percent: 1.0,
            co2_impact: Co2Impact::Low,
            justification: "j".to_string(),
        };
        assert!(matches!(
            KnowledgeBase::new(vec![rule], Vec::new()),
            Err(KnowledgeBaseLoadError::InvalidCondition { ref id, .. }) if id == "EMPTY"
        ));
    }

    #[test]
    fn test_empty_store_is_valid() {
        let kb = KnowledgeBase::from_toml_str("").unwrap();
        assert!(kb.is_empty());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(RuleFormat::from_path(Path::new("kb/Rules.TOML")).unwrap(), RuleFormat::Toml);
        assert_eq!(RuleFormat::from_path(Path::new("rules.json")).unwrap(), RuleFormat::Json);
        assert!(RuleFormat::from_path(Path::new("rules.yaml")).is_err());
    }
}
