use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Run-level failures. Only these ever stop a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("payload source unavailable: {path}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { path: path.into(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Failure of a single probe. Recorded on the outcome, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "reason")]
pub enum ProbeError {
    #[error("request failed: {0}")]
    RequestFailed(String),
}

impl ProbeError {
    pub fn request_failed(reason: impl ToString) -> Self {
        Self::RequestFailed(reason.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out: {}", err)
        } else if err.is_connect() {
            format!("connection error: {}", err)
        } else if let Some(status) = err.status() {
            format!("HTTP {}", status.as_u16())
        } else {
            err.to_string()
        };
        Self::RequestFailed(reason)
    }
}
