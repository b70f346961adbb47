pub mod engine;
pub mod probe;
pub mod result_aggregator;

use serde::Serialize;

use crate::error::{ProbeError, ScanError};

/// Which injection flow a target exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeKind {
    Stored,
    Reflected,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Stored => write!(f, "Stored"),
            ProbeKind::Reflected => write!(f, "Reflected"),
        }
    }
}

/// A single endpoint under test.
///
/// Stored targets receive the payload as a form field; reflected targets are a
/// URL prefix (e.g. `http://host/search?q=`) the encoded payload is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub kind: ProbeKind,
    pub base_url: String,
}

impl Target {
    pub fn new(kind: ProbeKind, base_url: &str) -> Result<Self, ScanError> {
        let base_url = normalize_url(base_url);
        if base_url.is_empty() {
            return Err(ScanError::ConfigInvalid(format!("{} target URL is empty", kind)));
        }
        // A reflected prefix is only a valid URL once the payload is appended.
        if kind == ProbeKind::Stored {
            url::Url::parse(&base_url).map_err(|e| {
                ScanError::ConfigInvalid(format!("stored target '{}': {}", base_url, e))
            })?;
        }
        Ok(Self { kind, base_url })
    }

    pub fn stored(base_url: &str) -> Result<Self, ScanError> {
        Self::new(ProbeKind::Stored, base_url)
    }

    pub fn reflected(base_url: &str) -> Result<Self, ScanError> {
        Self::new(ProbeKind::Reflected, base_url)
    }
}

/// Prepends `http://` to operator input lacking a scheme.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// HTTP statuses worth a dedicated log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerAnomaly {
    PageNotFound,
    ServerError,
}

impl ServerAnomaly {
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            404 => Some(ServerAnomaly::PageNotFound),
            500 => Some(ServerAnomaly::ServerError),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServerAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerAnomaly::PageNotFound => write!(f, "Page not found (404)"),
            ServerAnomaly::ServerError => write!(f, "Server error (500)"),
        }
    }
}

/// Result of one probe. Failures are folded in as `vulnerable == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub payload: String,
    pub kind: ProbeKind,
    pub vulnerable: bool,
    pub status: Option<u16>,
    pub anomaly: Option<ServerAnomaly>,
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    pub fn classified(kind: ProbeKind, payload: &str, status: u16, vulnerable: bool) -> Self {
        Self {
            payload: payload.to_string(),
            kind,
            vulnerable,
            status: Some(status),
            anomaly: ServerAnomaly::from_status(status),
            error: None,
        }
    }

    pub fn failed(kind: ProbeKind, payload: &str, status: Option<u16>, error: ProbeError) -> Self {
        Self {
            payload: payload.to_string(),
            kind,
            vulnerable: false,
            status,
            anomaly: status.and_then(ServerAnomaly::from_status),
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}
