use rand::prelude::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy, RequestBuilder, Response};
use std::time::Duration;

use crate::error::ScanError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (XSS Scanner)";

const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) \
     Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Shared HTTP session. Cheap to share behind an `Arc`; reqwest pools
/// connections internally and is safe for concurrent use.
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    random_agent: bool,
    default_headers: HeaderMap,
}

impl HttpClient {
    pub fn new(
        user_agent: Option<&str>,
        random_agent: bool,
        proxy_url: Option<&str>,
        custom_headers: &[(String, String)],
    ) -> Result<Self, ScanError> {
        let mut builder = ClientBuilder::new().danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy_url {
            let p = Proxy::all(proxy)
                .map_err(|e| ScanError::ConfigInvalid(format!("proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(p);
        }

        let inner = builder
            .build()
            .map_err(|e| ScanError::ConfigInvalid(format!("http client: {}", e)))?;

        let mut default_headers = HeaderMap::new();
        for (key, val) in custom_headers {
            match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(val)) {
                (Ok(name), Ok(value)) => {
                    default_headers.insert(name, value);
                }
                _ => log::warn!("Ignoring malformed header '{}: {}'", key, val),
            }
        }

        Ok(Self {
            inner,
            user_agent: user_agent.unwrap_or(DEFAULT_USER_AGENT).to_string(),
            random_agent,
            default_headers,
        })
    }

    /// Client with the stock user agent and no extra headers.
    pub fn with_defaults() -> Result<Self, ScanError> {
        Self::new(None, false, None, &[])
    }

    /// Submits `fields` as an `application/x-www-form-urlencoded` POST.
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Response, reqwest::Error> {
        self.prepare(self.inner.post(url), timeout).form(fields).send().await
    }

    pub async fn get(&self, url: &str, timeout: Duration) -> Result<Response, reqwest::Error> {
        self.prepare(self.inner.get(url), timeout).send().await
    }

    fn prepare(&self, mut builder: RequestBuilder, timeout: Duration) -> RequestBuilder {
        for (name, value) in self.default_headers.iter() {
            builder = builder.header(name, value);
        }
        if !self.default_headers.contains_key(USER_AGENT) {
            builder = builder.header(USER_AGENT, self.pick_user_agent());
        }
        builder.timeout(timeout)
    }

    fn pick_user_agent(&self) -> &str {
        if !self.random_agent {
            return &self.user_agent;
        }
        let mut rng = rand::rng();
        USER_AGENT_POOL
            .choose(&mut rng)
            .copied()
            .unwrap_or(self.user_agent.as_str())
    }
}
