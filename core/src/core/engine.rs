use std::future::Future;
use std::sync::Arc;

use futures::{stream, StreamExt};
use log::info;

use crate::core::probe::{HttpProbe, Probe, ProbeRef};
use crate::core::result_aggregator::{ResultAggregator, RunReport, RunSummary};
use crate::core::{ProbeKind, ProbeOutcome, Target};
use crate::error::ScanError;
use crate::http::HttpClient;
use crate::utils::event_log::EventLogRef;
use crate::{ScanConfig, SinkRef};

pub const DEFAULT_CONCURRENCY: usize = 5;

/// Runs `f` over every item with at most `limit` futures in flight.
///
/// Results come back in input order no matter which future finishes first.
/// `on_done` is called with the running completion count after each one.
pub async fn map_bounded<'a, T, R, F, Fut>(
    items: &'a [T],
    limit: usize,
    f: F,
    mut on_done: impl FnMut(usize),
) -> Vec<R>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();

    let mut completions = stream::iter(items.iter().enumerate())
        .map(|(index, item)| {
            let fut = f(item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(limit.max(1));

    let mut done = 0;
    while let Some((index, result)) = completions.next().await {
        slots[index] = Some(result);
        done += 1;
        on_done(done);
    }

    slots.into_iter().flatten().collect()
}

/// Two-phase payload runner.
///
/// The stored phase runs every payload to completion, its results are folded
/// and narrated, then the reflected phase does the same. Within a phase at
/// most `concurrency_limit` probes are outstanding.
pub struct ScanEngine {
    stored: ProbeRef,
    reflected: ProbeRef,
    concurrency_limit: usize,
    event_log: EventLogRef,
    sink: SinkRef,
}

impl ScanEngine {
    pub fn new(
        stored: ProbeRef,
        reflected: ProbeRef,
        concurrency_limit: usize,
        event_log: EventLogRef,
        sink: SinkRef,
    ) -> Self {
        Self {
            stored,
            reflected,
            concurrency_limit: concurrency_limit.max(1),
            event_log,
            sink,
        }
    }

    /// Builds HTTP probes for both targets named in `config`.
    pub fn from_config(
        config: &ScanConfig,
        client: Arc<HttpClient>,
        event_log: EventLogRef,
        sink: SinkRef,
    ) -> Result<Self, ScanError> {
        let options = config.probe_options();
        let stored = HttpProbe::new(Arc::clone(&client), Target::stored(&config.stored_url)?, options);
        let reflected = HttpProbe::new(client, Target::reflected(&config.reflected_url)?, options);
        Ok(Self::new(
            stored.into_ref(),
            reflected.into_ref(),
            config.concurrency,
            event_log,
            sink,
        ))
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Runs both phases over `payloads` and reports the summary.
    pub async fn run(&self, payloads: &[String]) -> Result<RunReport, ScanError> {
        if payloads.is_empty() {
            return Err(ScanError::source_unavailable("<payloads>", "no payloads to test"));
        }

        self.event_log.record(&format!(
            "Starting scan with {} payload(s), concurrency {}",
            payloads.len(),
            self.concurrency_limit
        ));

        let stored = self.run_phase(self.stored.as_ref(), payloads).await;
        let reflected = self.run_phase(self.reflected.as_ref(), payloads).await;

        let summary = RunSummary::from_outcomes(payloads.len(), &stored, &reflected);
        ResultAggregator::report_summary(&summary, &self.event_log, &self.sink);
        self.event_log.flush();

        Ok(RunReport { summary, stored, reflected })
    }

    /// One phase: every payload through `probe`, then narrate in payload order.
    pub async fn run_phase(&self, probe: &dyn Probe, payloads: &[String]) -> Vec<ProbeOutcome> {
        let kind = probe.kind();
        let phase = phase_label(kind);
        let total = payloads.len();

        info!("{} phase: {} payload(s)", kind, total);
        self.sink.on_progress(&phase, 0, total);

        let outcomes = map_bounded(
            payloads,
            self.concurrency_limit,
            |payload| probe.probe(payload),
            |done| self.sink.on_progress(&phase, done, total),
        )
        .await;

        let vulnerable = ResultAggregator::narrate_phase(&outcomes, &self.event_log, &self.sink);
        self.sink.on_log(
            "phase",
            &format!("[*] {} phase complete: {}/{} payload(s) flagged", kind, vulnerable, total),
        );
        outcomes
    }
}

fn phase_label(kind: ProbeKind) -> String {
    format!("Testing {} XSS", kind)
}
