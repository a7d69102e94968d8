use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::histogram::LatencyHistogram;
use super::types::{AttemptOutcome, OutcomeKind, RunSummary};

/// Running totals for one run. Owned by a single task.
#[derive(Debug)]
pub struct ResultAggregator {
    requested: u64,
    total: u64,
    successes: u64,
    http_errors: u64,
    transport_errors: u64,
    total_duration: Duration,
    min_latency: Option<Duration>,
    max_latency: Duration,
    histogram: Option<LatencyHistogram>,
}

impl ResultAggregator {
    #[must_use]
    pub fn new(requested: u64) -> Self {
        let histogram = match LatencyHistogram::new() {
            Ok(histogram) => Some(histogram),
            Err(err) => {
                warn!("Latency percentiles disabled: {}", err);
                None
            }
        };
        Self {
            requested,
            total: 0,
            successes: 0,
            http_errors: 0,
            transport_errors: 0,
            total_duration: Duration::ZERO,
            min_latency: None,
            max_latency: Duration::ZERO,
            histogram,
        }
    }

    /// Folds one outcome into the totals.
    pub fn record(&mut self, outcome: &AttemptOutcome) {
        self.total = self.total.saturating_add(1);
        match &outcome.kind {
            OutcomeKind::Success { .. } => self.successes = self.successes.saturating_add(1),
            OutcomeKind::HttpError { .. } => self.http_errors = self.http_errors.saturating_add(1),
            OutcomeKind::TransportError { .. } => {
                self.transport_errors = self.transport_errors.saturating_add(1);
            }
        }

        self.total_duration = self.total_duration.saturating_add(outcome.duration);
        self.min_latency = Some(
            self.min_latency
                .map_or(outcome.duration, |min| min.min(outcome.duration)),
        );
        self.max_latency = self.max_latency.max(outcome.duration);

        if let Some(histogram) = self.histogram.as_mut()
            && let Err(err) = histogram.record(duration_micros(outcome.duration))
        {
            warn!("Dropping latency sample for attempt {}: {}", outcome.index, err);
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Produces the summary. Call only once every outcome has been recorded.
    #[must_use]
    pub fn finalize(self, cancelled: bool) -> RunSummary {
        let (p50, p90, p99) = self
            .histogram
            .as_ref()
            .map_or((0, 0, 0), LatencyHistogram::percentiles);

        RunSummary {
            requested: self.requested,
            total: self.total,
            successes: self.successes,
            http_errors: self.http_errors,
            transport_errors: self.transport_errors,
            total_duration: self.total_duration,
            mean_latency: mean_latency(self.total_duration, self.successes),
            min_latency: self.min_latency.unwrap_or(Duration::ZERO),
            max_latency: self.max_latency,
            p50_latency: Duration::from_micros(p50),
            p90_latency: Duration::from_micros(p90),
            p99_latency: Duration::from_micros(p99),
            cancelled,
        }
    }
}

/// Runs the fold on its own task until every sender is dropped.
#[must_use]
pub fn spawn_aggregator(
    mut outcome_rx: mpsc::Receiver<AttemptOutcome>,
    requested: u64,
) -> JoinHandle<ResultAggregator> {
    tokio::spawn(async move {
        let mut aggregator = ResultAggregator::new(requested);
        while let Some(outcome) = outcome_rx.recv().await {
            aggregator.record(&outcome);
        }
        aggregator
    })
}

fn mean_latency(total: Duration, successes: u64) -> Duration {
    if successes == 0 {
        return Duration::ZERO;
    }
    let nanos = total
        .as_nanos()
        .checked_div(u128::from(successes))
        .unwrap_or(0);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

pub(crate) fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
