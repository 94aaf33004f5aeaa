//! Usage and environment errors.
//!
//! Anything in here aborts the whole run with exit code 2. Per-item
//! problems (unmatched files, undecodable images, failed checks) never
//! surface as a `ToolError`; they are recorded in the item's result.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    InvalidInput(String),

    #[error("Deliverables line {line}: {reason}")]
    Deliverable { line: usize, reason: String },

    #[error("Unknown plan '{0}'")]
    UnknownPlan(String),

    #[error("No image files found for the given input")]
    NoImages,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json { path: path.to_path_buf(), source }
    }
}

/// Read and parse a JSON file, reporting a missing file distinctly from an
/// unreadable or malformed one.
pub fn read_json<T: serde::de::DeserializeOwned>(
    what: &'static str,
    path: &Path,
) -> Result<T, ToolError> {
    if !path.is_file() {
        return Err(ToolError::NotFound(what, path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| ToolError::json(path, e))
}
