use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::Response;

use crate::core::{ProbeKind, ProbeOutcome, ServerAnomaly, Target};
use crate::error::ProbeError;
use crate::http::{encode_payload, HttpClient};

/// Form field the stored probe submits the payload in.
pub const STORED_FIELD: &str = "input";

/// Crude reflection check: any unescaped script tag or `onerror` handler in
/// the body counts, whether or not it is the exact payload that was sent.
pub fn looks_injected(body: &str) -> bool {
    body.contains("<script>") || body.contains("onerror")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOptions {
    pub timeout: Duration,
    /// Classify bodies of 4xx/5xx responses instead of failing the attempt.
    pub classify_error_pages: bool,
}

impl ProbeOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, classify_error_pages: false }
    }
}

/// Submits `payload` as the `input` form field and classifies the response.
pub async fn probe_stored(
    client: &HttpClient,
    target: &Target,
    payload: &str,
    options: &ProbeOptions,
) -> ProbeOutcome {
    let response = client
        .post_form(&target.base_url, &[(STORED_FIELD, payload)], options.timeout)
        .await;
    classify_response(ProbeKind::Stored, payload, &target.base_url, response, options).await
}

/// Appends the encoded `payload` to the target prefix, fetches it and
/// classifies the response.
pub async fn probe_reflected(
    client: &HttpClient,
    target: &Target,
    payload: &str,
    options: &ProbeOptions,
) -> ProbeOutcome {
    let url = format!("{}{}", target.base_url, encode_payload(payload));
    let response = client.get(&url, options.timeout).await;
    classify_response(ProbeKind::Reflected, payload, &url, response, options).await
}

async fn classify_response(
    kind: ProbeKind,
    payload: &str,
    url: &str,
    response: Result<Response, reqwest::Error>,
    options: &ProbeOptions,
) -> ProbeOutcome {
    let response = match response {
        Ok(response) => response,
        Err(e) => {
            warn!("{} probe against {} failed: {}", kind, url, e);
            return ProbeOutcome::failed(kind, payload, None, ProbeError::from(e));
        }
    };

    let status = response.status().as_u16();
    match ServerAnomaly::from_status(status) {
        Some(anomaly @ ServerAnomaly::PageNotFound) => warn!("{} at {}", anomaly, url),
        Some(anomaly @ ServerAnomaly::ServerError) => error!("{} at {}", anomaly, url),
        None => {}
    }

    if status >= 400 && !options.classify_error_pages {
        return ProbeOutcome::failed(
            kind,
            payload,
            Some(status),
            ProbeError::request_failed(format!("HTTP {}", status)),
        );
    }

    match response.text().await {
        Ok(body) => {
            let vulnerable = looks_injected(&body);
            debug!("{} probe {} -> {} (vulnerable: {})", kind, url, status, vulnerable);
            ProbeOutcome::classified(kind, payload, status, vulnerable)
        }
        Err(e) => {
            warn!("Failed to read response body from {}: {}", url, e);
            ProbeOutcome::failed(kind, payload, Some(status), ProbeError::from(e))
        }
    }
}

/// A probe bound to one target, as driven by the scan engine.
#[async_trait]
pub trait Probe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    /// Never fails: transport problems come back as a failed outcome.
    async fn probe(&self, payload: &str) -> ProbeOutcome;
}

pub type ProbeRef = Arc<dyn Probe>;

/// HTTP-backed probe; dispatches on the target kind.
pub struct HttpProbe {
    client: Arc<HttpClient>,
    target: Target,
    options: ProbeOptions,
}

impl HttpProbe {
    pub fn new(client: Arc<HttpClient>, target: Target, options: ProbeOptions) -> Self {
        Self { client, target, options }
    }

    pub fn into_ref(self) -> ProbeRef {
        Arc::new(self)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> ProbeKind {
        self.target.kind
    }

    async fn probe(&self, payload: &str) -> ProbeOutcome {
        match self.target.kind {
            ProbeKind::Stored => probe_stored(&self.client, &self.target, payload, &self.options).await,
            ProbeKind::Reflected => {
                probe_reflected(&self.client, &self.target, payload, &self.options).await
            }
        }
    }
}
