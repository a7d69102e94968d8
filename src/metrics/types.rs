use std::time::Duration;

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeKind {
    /// A response arrived and matched the expected status, if any.
    Success { status: u16 },
    /// A response arrived with a status other than the expected one.
    HttpError { status: u16 },
    /// No response: the request could not be built, sent or finished in time.
    TransportError { message: String },
}

/// Result of one attempt, reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub index: usize,
    pub duration: Duration,
    pub kind: OutcomeKind,
}

/// Aggregate statistics for a finished run.
///
/// `mean_latency` is the summed duration of every attempt divided by the
/// number of successes, and zero when nothing succeeded. Percentiles cover
/// every attempt regardless of outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub requested: u64,
    pub total: u64,
    pub successes: u64,
    pub http_errors: u64,
    pub transport_errors: u64,
    pub total_duration: Duration,
    pub mean_latency: Duration,
    pub min_latency: Duration,
    pub max_latency: Duration,
    pub p50_latency: Duration,
    pub p90_latency: Duration,
    pub p99_latency: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    /// Summary of a run that folded no attempts.
    #[must_use]
    pub const fn empty(requested: u64, cancelled: bool) -> Self {
        Self {
            requested,
            total: 0,
            successes: 0,
            http_errors: 0,
            transport_errors: 0,
            total_duration: Duration::ZERO,
            mean_latency: Duration::ZERO,
            min_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            p50_latency: Duration::ZERO,
            p90_latency: Duration::ZERO,
            p99_latency: Duration::ZERO,
            cancelled,
        }
    }

    #[must_use]
    pub const fn failures(&self) -> u64 {
        self.total.saturating_sub(self.successes)
    }
}
