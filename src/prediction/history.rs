//! Historical audit datasets

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::types::AuditRecord;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("cannot read history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {path} is not a JSON array of audit records: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Anything that can supply past audit records for model fitting
pub trait HistorySource: Send + Sync {
    fn load(&self) -> Result<Vec<AuditRecord>, HistoryError>;

    /// Short label for log lines
    fn describe(&self) -> String;
}

/// JSON file holding an array of `AuditRecord`
#[derive(Debug, Clone)]
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySource for JsonHistoryFile {
    fn load(&self) -> Result<Vec<AuditRecord>, HistoryError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let records: Vec<AuditRecord> =
            serde_json::from_str(&contents).map_err(|source| HistoryError::Json {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path.display(), records = records.len(), "Loaded audit history");
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// In-memory history, mostly for tests and embedding callers
impl HistorySource for Vec<AuditRecord> {
    fn load(&self) -> Result<Vec<AuditRecord>, HistoryError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        format!("memory:{} records", self.len())
    }
}
