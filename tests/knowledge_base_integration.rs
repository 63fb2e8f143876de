//! Knowledge Base Integration Tests
//!
//! Loads rule stores from disk in both supported formats and checks that
//! every class of malformed rule is rejected at load time with an error
//! naming the offending rule.

use greendc_audit::knowledge_base::{ConditionParseError, KnowledgeBaseLoadError};
use greendc_audit::types::{Co2Impact, FacilityInput};
use greendc_audit::{compute_metrics, evaluate, KnowledgeBase};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn builtin_rules_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/knowledge_base/rules.toml")
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

const VALID_RULE: &str = r#"
[[rules]]
id = "PUE_CRITICAL"
condition = "pue > 2.0"
action = "Commission a cooling retrofit study"
estimated_energy_saving_percent = 12
co2_impact = "High"
justification = "Overhead exceeds IT load"
"#;

fn load_err(toml: &str) -> KnowledgeBaseLoadError {
    let tmp = TempDir::new().unwrap();
    let path = write_file(tmp.path(), "rules.toml", toml);
    KnowledgeBase::load(&path).unwrap_err()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn builtin_file_matches_embedded_copy() {
    let from_disk = KnowledgeBase::load(&builtin_rules_path()).unwrap();
    let embedded = KnowledgeBase::builtin().unwrap();
    assert_eq!(from_disk, embedded);
    assert_eq!(from_disk.version(), Some("2024.1"));
}

#[test]
fn json_store_loads_and_evaluates() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(
        tmp.path(),
        "rules.json",
        r#"{
            "version": "site-7",
            "standards": ["ISO 50001"],
            "rules": [
                {"id": "HOT_AND_IDLE",
                 "condition": "cpu_utilization < 25 and cooling_setpoint < 22",
                 "action": "Consolidate and raise setpoint",
                 "estimated_energy_saving_percent": 18,
                 "co2_impact": "high",
                 "justification": "Both levers at once"}
            ]
        }"#,
    );
    let kb = KnowledgeBase::load(&path).unwrap();
    assert_eq!(kb.len(), 1);
    assert_eq!(kb.rules()[0].co2_impact, Co2Impact::High);

    let mut input = FacilityInput {
        name: None,
        it_energy: 100.0,
        total_energy: 150.0,
        cpu_utilization: 20.0,
        cooling_ratio: 40.0,
        carbon_factor: 0.2,
        cooling_setpoint: 21.0,
        aisle_containment: true,
        virtualization_level: None,
        carbon_unit: Default::default(),
    };
    let m = compute_metrics(&input).unwrap();
    assert_eq!(evaluate(&input, &m, kb.rules()).len(), 1);

    input.cooling_setpoint = 24.0;
    assert!(evaluate(&input, &m, kb.rules()).is_empty());
}

#[test]
fn missing_file_is_io_error() {
    let err = KnowledgeBase::load(Path::new("/nonexistent/rules.toml")).unwrap_err();
    assert!(matches!(err, KnowledgeBaseLoadError::Io { .. }));
}

#[test]
fn unsupported_extension_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(tmp.path(), "rules.yaml", VALID_RULE);
    assert!(matches!(
        KnowledgeBase::load(&path),
        Err(KnowledgeBaseLoadError::UnsupportedFormat(_))
    ));
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn unknown_field_rejected() {
    let err = load_err(&VALID_RULE.replace("pue > 2.0", "inlet_temperature > 27"));
    match err {
        KnowledgeBaseLoadError::InvalidCondition { id, source } => {
            assert_eq!(id, "PUE_CRITICAL");
            assert!(matches!(source, ConditionParseError::UnknownField(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn bad_operator_rejected() {
    let err = load_err(&VALID_RULE.replace("pue > 2.0", "pue >> 2.0"));
    assert!(matches!(err, KnowledgeBaseLoadError::InvalidCondition { .. }));
    assert!(err.to_string().contains("PUE_CRITICAL"));
}

#[test]
fn saving_above_hundred_rejected() {
    let err = load_err(&VALID_RULE.replace("= 12", "= 120"));
    assert!(matches!(
        err,
        KnowledgeBaseLoadError::SavingOutOfRange { ref id, value } if id == "PUE_CRITICAL" && value == 120.0
    ));
}

#[test]
fn duplicate_id_rejected() {
    let err = load_err(&format!("{VALID_RULE}\n{VALID_RULE}"));
    assert!(matches!(err, KnowledgeBaseLoadError::DuplicateId(ref id) if id == "PUE_CRITICAL"));
}

#[test]
fn missing_action_rejected() {
    let err = load_err(&VALID_RULE.replace("action = \"Commission a cooling retrofit study\"\n", ""));
    assert!(matches!(
        err,
        KnowledgeBaseLoadError::MissingField { field: "action", .. }
    ));
    assert!(err.to_string().contains("PUE_CRITICAL"));
}

#[test]
fn malformed_toml_rejected() {
    let err = load_err("[[rules]\nid = ");
    assert!(matches!(err, KnowledgeBaseLoadError::Toml(_)));
}

#[test]
fn misspelled_rules_table_rejected() {
    let err = load_err(&VALID_RULE.replace("[[rules]]", "[[rule]]"));
    assert!(matches!(err, KnowledgeBaseLoadError::Toml(_)));
    assert!(err.to_string().contains("rule"));
}

#[test]
fn misspelled_rules_key_in_json_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(
        tmp.path(),
        "rules.json",
        r#"{"version": "x", "rulez": [{"id": "A"}]}"#,
    );
    let err = KnowledgeBase::load(&path).unwrap_err();
    assert!(matches!(err, KnowledgeBaseLoadError::Json(_)));
    assert!(err.to_string().contains("rulez"));
}

#[test]
fn blank_action_and_justification_rejected() {
    let err = load_err(&VALID_RULE.replace("\"Commission a cooling retrofit study\"", "\"\""));
    assert!(matches!(
        err,
        KnowledgeBaseLoadError::MissingField { field: "action", ref id, .. } if id == "PUE_CRITICAL"
    ));

    let err = load_err(&VALID_RULE.replace("\"Overhead exceeds IT load\"", "\"  \""));
    assert!(matches!(
        err,
        KnowledgeBaseLoadError::MissingField { field: "justification", .. }
    ));
}

#[test]
fn json_type_error_names_the_rule() {
    let tmp = TempDir::new().unwrap();
    let path = write_file(
        tmp.path(),
        "rules.json",
        r#"{"rules": [
            {"id": "OK", "condition": "pue > 2", "action": "a",
             "estimated_energy_saving_percent": 5, "co2_impact": "low", "justification": "j"},
            {"id": "PUE_CRITICAL", "condition": "pue > 2", "action": "a",
             "estimated_energy_saving_percent": "fifteen", "co2_impact": "low", "justification": "j"}
        ]}"#,
    );
    let err = KnowledgeBase::load(&path).unwrap_err();
    match &err {
        KnowledgeBaseLoadError::MalformedRule { index, id, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(id, "PUE_CRITICAL");
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("PUE_CRITICAL"), "{message}");
    assert!(!message.contains("untagged"), "{message}");
}
