pub mod core;
pub mod error;
pub mod http;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use crate::core::engine::{map_bounded, ScanEngine, DEFAULT_CONCURRENCY};
pub use crate::core::probe::{looks_injected, probe_reflected, probe_stored, HttpProbe, Probe, ProbeOptions};
pub use crate::core::result_aggregator::{ResultAggregator, RunReport, RunSummary};
pub use crate::core::{normalize_url, ProbeKind, ProbeOutcome, ServerAnomaly, Target};
pub use crate::error::{ProbeError, ScanError};
pub use crate::http::HttpClient;
pub use crate::utils::event_log::{EventLog, EventLogRef, DEFAULT_LOG_FILE};
pub use crate::utils::payload_loader::{list_payload_files, PayloadLoader, DEFAULT_PAYLOAD_DIR};
pub use crate::utils::read_lines;

pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;

/// Scan configuration assembled by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub stored_url: String,
    pub reflected_url: String,
    pub timeout_secs: f64,
    pub concurrency: usize,
    pub log_file: String,
    pub output: Option<String>,
    pub user_agent: Option<String>,
    pub random_agent: bool,
    pub proxy: Option<String>,
    pub headers: Vec<String>,
    pub classify_error_pages: bool,
    pub dry_run: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            stored_url: String::new(),
            reflected_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            log_file: DEFAULT_LOG_FILE.to_string(),
            output: None,
            user_agent: None,
            random_agent: false,
            proxy: None,
            headers: Vec::new(),
            classify_error_pages: false,
            dry_run: false,
        }
    }
}

impl ScanConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: self.timeout(),
            classify_error_pages: self.classify_error_pages,
        }
    }

    pub fn parsed_headers(&self) -> Vec<(String, String)> {
        parse_custom_headers(&self.headers)
    }

    /// Shared HTTP session for this configuration.
    pub fn build_client(&self) -> Result<HttpClient, ScanError> {
        HttpClient::new(
            self.user_agent.as_deref(),
            self.random_agent,
            self.proxy.as_deref(),
            &self.parsed_headers(),
        )
    }
}

/// Parses a timeout in (fractional) seconds. Must be finite and positive.
pub fn parse_timeout(raw: &str) -> Result<f64, ScanError> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ScanError::ConfigInvalid(format!("timeout '{}' is not a number", raw.trim())))?;
    if !secs.is_finite() || secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
        return Err(ScanError::ConfigInvalid(format!("timeout '{}' must be a positive number of seconds", raw.trim())));
    }
    Ok(secs)
}

/// Like `parse_timeout`, falling back to the default with a warning.
pub fn timeout_or_default(raw: &str) -> f64 {
    parse_timeout(raw).unwrap_or_else(|e| {
        log::warn!("{}; using {}s", e, DEFAULT_TIMEOUT_SECS);
        DEFAULT_TIMEOUT_SECS
    })
}

pub fn parse_custom_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter().filter_map(|h| {
        let mut parts = h.splitn(2, ':');
        let key = parts.next()?.trim().to_string();
        let val = parts.next().unwrap_or("").trim().to_string();
        if key.is_empty() { return None; }
        Some((key, val))
    }).collect()
}

/// Output abstraction for the scan pipeline.
pub trait ScanEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_finding(&self, outcome: &ProbeOutcome);
    fn on_progress(&self, phase: &str, current: usize, total: usize);
}

pub type SinkRef = Arc<dyn ScanEventSink>;

/// Sink that swallows everything.
pub struct SilentSink;

impl SilentSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl ScanEventSink for SilentSink {
    fn on_log(&self, _level: &str, _message: &str) {}
    fn on_finding(&self, _outcome: &ProbeOutcome) {}
    fn on_progress(&self, _phase: &str, _current: usize, _total: usize) {}
}

/// Terminal output: colored lines and one progress bar per phase.
#[derive(Default)]
pub struct ConsoleSink {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self::default())
    }

    // Prints above the bar while one is active so it isn't torn.
    fn emit(&self, text: &str) {
        let bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        match bar.as_ref() {
            Some(bar) => bar.println(text),
            None => println!("{}", text),
        }
    }
}

impl ScanEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        let colored = match level {
            "success" => message.green().to_string(),
            "error"   => message.red().to_string(),
            "warn"    => message.yellow().to_string(),
            "phase"   => message.bright_cyan().bold().to_string(),
            _         => message.to_string(),
        };
        self.emit(&colored);
    }

    fn on_finding(&self, outcome: &ProbeOutcome) {
        use colored::*;
        self.emit(&format!(
            "{} {} XSS detected with payload: {}",
            "[+]".green().bold(),
            outcome.kind.to_string().red().bold(),
            outcome.payload.bright_yellow()
        ));
    }

    fn on_progress(&self, phase: &str, current: usize, total: usize) {
        let mut slot = self.bar.lock().unwrap_or_else(|e| e.into_inner());
        if current == 0 {
            let bar = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos}/{len}") {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_message(phase.to_string());
            *slot = Some(bar);
        } else if let Some(bar) = slot.as_ref() {
            bar.set_position(current as u64);
        }

        if current >= total {
            if let Some(bar) = slot.take() {
                bar.finish();
            }
        }
    }
}
