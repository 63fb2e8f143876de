//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::{BTreeSet, HashSet};

use crate::types::ModelKind;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for AuditConfig.
///
/// Maintained by hand to match the struct hierarchy in audit_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [facility]
        "facility",
        "facility.name",
        // [simulation]
        "simulation",
        "simulation.target_saving_percent",
        // [knowledge_base]
        "knowledge_base",
        "knowledge_base.path",
        // [prediction]
        "prediction",
        "prediction.enabled",
        "prediction.model",
        "prediction.min_history",
        "prediction.tree_max_depth",
        "prediction.tree_min_samples_leaf",
        "prediction.ridge_lambda",
        "prediction.history_path",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// Document Keys
// ============================================================================

/// Dotted key paths of a TOML document, sections included, sorted.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`. Returns `None`
/// when the text is not TOML; serde reports that error later.
pub fn document_keys(raw_toml: &str) -> Option<BTreeSet<String>> {
    let root: toml::Table = raw_toml.parse().ok()?;
    let mut keys = BTreeSet::new();
    let mut pending: Vec<(String, &toml::Table)> = vec![(String::new(), &root)];
    while let Some((prefix, table)) = pending.pop() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            if let toml::Value::Table(inner) = v {
                pending.push((path.clone(), inner));
            }
            keys.insert(path);
        }
    }
    Some(keys)
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smaller key so the suggestion is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        best = match best {
            Some((bk, bd)) if bd < dist || (bd == dist && bk <= k) => Some((bk, bd)),
            _ => Some((k, dist)),
        };
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for every key in `keys` that `AuditConfig` does not define.
pub fn unknown_key_warnings(keys: &BTreeSet<String>) -> Vec<ValidationWarning> {
    let known = known_config_keys();
    keys.iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            field: key.clone(),
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(key, &known),
        })
        .collect()
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Does not fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    document_keys(raw_toml)
        .map(|keys| unknown_key_warnings(&keys))
        .unwrap_or_default()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed AuditConfig.
///
/// Returns (errors, warnings). Errors are values that must prevent startup;
/// warnings are suspicious but not fatal.
pub fn validate_ranges(config: &super::AuditConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Rule store must be a format the loader understands
    if let Some(ref path) = config.knowledge_base.path {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if !matches!(ext.as_deref(), Some("toml" | "json")) {
            errors.push(format!(
                "knowledge_base.path = {} must be a .toml or .json file",
                path.display()
            ));
        }
    }

    // Targets outside 5-60 % are legal but rarely intended
    let target = config.simulation.target_saving_percent;
    if target.is_finite() && target > 0.0 && !(5.0..=60.0).contains(&target) {
        warnings.push(ValidationWarning {
            field: "simulation.target_saving_percent".to_string(),
            message: format!(
                "simulation.target_saving_percent = {target:.1} is outside the typical 5-60 % range"
            ),
            suggestion: None,
        });
    }

    // A tree needs room to split: with min_history < 2 * leaf size it stays a single leaf
    let p = &config.prediction;
    if p.model == ModelKind::Tree && p.min_history < 2 * p.tree_min_samples_leaf.max(1) {
        warnings.push(ValidationWarning {
            field: "prediction.min_history".to_string(),
            message: format!(
                "prediction.min_history = {} cannot produce a split with tree_min_samples_leaf = {}",
                p.min_history, p.tree_min_samples_leaf
            ),
            suggestion: None,
        });
    }

    if !p.enabled && p.history_path.is_some() {
        warnings.push(ValidationWarning {
            field: "prediction.history_path".to_string(),
            message: "prediction.history_path is set but prediction.enabled = false".to_string(),
            suggestion: None,
        });
    }

    (errors, warnings)
}
