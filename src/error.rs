// ============================================================
// Errors
// ============================================================
// Library-level error type. The CLI and application layers wrap
// these in anyhow::Error with extra context; everything below
// them returns ExecError so callers can match on the cause.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ExecError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("missing configuration key '{key}'")]
    MissingKey { key: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("unknown {kind} node '{name}'")]
    UnknownNode { kind: &'static str, name: String },

    #[error("distributed training was requested but no process-group backend is available")]
    Distributed,

    #[error("machine '{machine}' is not supported by the {backend} backend")]
    UnsupportedMachine { machine: String, backend: &'static str },

    #[error("'{path}' exists but is not a directory")]
    NotDirectory { path: PathBuf },

    #[error("no such directory: '{path}'")]
    NoSuchDirectory { path: PathBuf },

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("record error: {0}")]
    Record(String),
}

impl ExecError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    pub fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
