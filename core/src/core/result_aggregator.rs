use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::core::{ProbeKind, ProbeOutcome};
use crate::error::ScanError;
use crate::utils::event_log::EventLog;
use crate::SinkRef;

/// Final counts of a run. Failed probes are included in the totals as
/// not-vulnerable; the `*_failed` fields say how many of those were never
/// actually answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    pub total_payloads: usize,
    pub stored_vulnerable: usize,
    pub reflected_vulnerable: usize,
    pub stored_failed: usize,
    pub reflected_failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(total: usize, stored: &[ProbeOutcome], reflected: &[ProbeOutcome]) -> Self {
        Self {
            total_payloads: total,
            stored_vulnerable: tally(stored),
            reflected_vulnerable: tally(reflected),
            stored_failed: failures(stored),
            reflected_failed: failures(reflected),
        }
    }

    pub fn stored_clean(&self) -> usize {
        self.total_payloads - self.stored_vulnerable
    }

    pub fn reflected_clean(&self) -> usize {
        self.total_payloads - self.reflected_vulnerable
    }
}

/// Everything a run produced, as written to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub stored: Vec<ProbeOutcome>,
    pub reflected: Vec<ProbeOutcome>,
}

pub fn tally(outcomes: &[ProbeOutcome]) -> usize {
    outcomes.iter().filter(|o| o.vulnerable).count()
}

pub fn failures(outcomes: &[ProbeOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_failed()).count()
}

/// Folds and reports probe outcomes.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Writes one event line per outcome in payload order, notifies the sink
    /// of every positive one, and returns the phase's vulnerable count.
    pub fn narrate_phase(outcomes: &[ProbeOutcome], log: &EventLog, sink: &SinkRef) -> usize {
        for outcome in outcomes {
            for line in event_lines(outcome) {
                log.record(&line);
            }
            if outcome.vulnerable {
                sink.on_finding(outcome);
            }
        }
        tally(outcomes)
    }

    pub fn report_summary(summary: &RunSummary, log: &EventLog, sink: &SinkRef) {
        let lines = summary_lines(summary);
        for line in &lines {
            log.record(line);
        }

        sink.on_log("phase", "\nSCAN SUMMARY :");
        for line in &lines {
            sink.on_log("info", &format!("  {}", line));
        }

        let found = summary.stored_vulnerable + summary.reflected_vulnerable;
        if found == 0 {
            sink.on_log("success", "[+] No vulnerabilities found.");
        } else {
            sink.on_log("warn", &format!("[+] {} positive classification(s).", found));
        }
        if summary.stored_failed + summary.reflected_failed > 0 {
            sink.on_log(
                "warn",
                "[!] Failed requests are counted as not vulnerable; those payloads were not actually tested.",
            );
        }
    }

    /// Writes the full report as pretty-printed JSON.
    pub fn write_report(report: &RunReport, path: impl AsRef<Path>) -> Result<(), ScanError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| ScanError::io(path, std::io::Error::other(e)))?;
        fs::write(path, json).map_err(|e| ScanError::io(path, e))
    }
}

fn event_lines(outcome: &ProbeOutcome) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);
    if let Some(anomaly) = outcome.anomaly {
        lines.push(format!("{} during {} test with payload: {}", anomaly, outcome.kind, outcome.payload));
    }
    let verdict = match (&outcome.error, outcome.vulnerable) {
        (Some(err), _) => format!("{} test error for payload {}: {}", outcome.kind, outcome.payload, err),
        (None, true) => format!("{} XSS found with payload: {}", outcome.kind, outcome.payload),
        (None, false) => format!("{} test passed (not vulnerable) for payload: {}", outcome.kind, outcome.payload),
    };
    lines.push(verdict);
    lines
}

fn summary_lines(summary: &RunSummary) -> Vec<String> {
    vec![
        format!("Total payloads tested: {}", summary.total_payloads),
        format!("{} XSS vulnerabilities found: {}", ProbeKind::Stored, summary.stored_vulnerable),
        format!("{} XSS vulnerabilities found: {}", ProbeKind::Reflected, summary.reflected_vulnerable),
        format!(
            "Failed requests: {} stored, {} reflected",
            summary.stored_failed, summary.reflected_failed
        ),
    ]
}
