//! Bounded-concurrency dispatch of traced attempts.
//!
//! [`trace_and_time`] opens the run span, hands attempts to [`dispatch`] and
//! closes the run span once the summary exists. [`dispatch`] admits at most
//! `concurrency` attempts at a time through a semaphore; each admitted
//! attempt runs on its own task and reports one [`AttemptOutcome`] to the
//! aggregator task.
mod attempt;


use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::args::PositiveUsize;
use crate::config::RunConfig;
use crate::http::{HttpExecutor, RequestTemplate};
use crate::metrics::{
    AttemptOutcome, OutcomeKind, ResultAggregator, RunSummary, duration_micros, spawn_aggregator,
};
use crate::shutdown::ShutdownReceiver;
use crate::telemetry::{SpanTracer, TracingContext};

pub use attempt::classify_outcome;

use attempt::Attempt;

pub const RUN_SPAN_NAME: &str = "tracefire-run";

const OUTCOME_CHANNEL_CAPACITY: usize = 1024;

/// Per-run dispatch knobs.
#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub count: usize,
    pub concurrency: PositiveUsize,
    pub attempt_timeout: Option<Duration>,
    pub expected_status: Option<u16>,
}

impl From<&RunConfig> for DispatchSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            count: config.count,
            concurrency: config.concurrency,
            attempt_timeout: config.timeout,
            expected_status: config.expected_status,
        }
    }
}

/// Runs every attempt under one run span and returns the summary.
///
/// The run span is closed after the summary is built, including when the
/// run was cancelled.
pub async fn trace_and_time<T, E>(
    settings: DispatchSettings,
    template: &Arc<RequestTemplate>,
    tracer: Arc<T>,
    executor: &Arc<E>,
    shutdown_rx: &mut ShutdownReceiver,
) -> RunSummary
where
    T: SpanTracer,
    E: HttpExecutor,
{
    let context = TracingContext::start_run(tracer, RUN_SPAN_NAME);
    context.set_attributes(vec![
        KeyValue::new("tracefire.attempts", to_i64(settings.count)),
        KeyValue::new("tracefire.concurrency", to_i64(settings.concurrency.get())),
        KeyValue::new("http.request.method", template.method().as_str().to_owned()),
        KeyValue::new("url.full", template.url().to_string()),
    ]);
    info!(
        "Sending {} {} request(s) to {} with concurrency {}",
        settings.count,
        template.method(),
        template.url(),
        settings.concurrency.get()
    );

    let summary = dispatch(settings, template, &context, executor, shutdown_rx).await;

    context.set_attributes(vec![
        KeyValue::new("tracefire.successes", to_i64_u64(summary.successes)),
        KeyValue::new("tracefire.failures", to_i64_u64(summary.failures())),
        KeyValue::new(
            "tracefire.mean_latency_us",
            to_i64_u64(duration_micros(summary.mean_latency)),
        ),
        KeyValue::new("tracefire.cancelled", summary.cancelled),
    ]);
    context.finish();
    summary
}

/// Issues `settings.count` attempts and folds their outcomes.
///
/// Never fails: per-attempt errors are counted, not propagated. A shutdown
/// signal stops further admissions; attempts already admitted run to
/// completion and the summary is marked cancelled.
pub async fn dispatch<T, E>(
    settings: DispatchSettings,
    template: &Arc<RequestTemplate>,
    context: &TracingContext<T>,
    executor: &Arc<E>,
    shutdown_rx: &mut ShutdownReceiver,
) -> RunSummary
where
    T: SpanTracer,
    E: HttpExecutor,
{
    let requested = u64::try_from(settings.count).unwrap_or(u64::MAX);
    if settings.count == 0 {
        return RunSummary::empty(requested, false);
    }

    let (outcome_tx, outcome_rx) = mpsc::channel::<AttemptOutcome>(OUTCOME_CHANNEL_CAPACITY);
    let aggregator = spawn_aggregator(outcome_rx, requested);
    let permits = Arc::new(Semaphore::new(settings.concurrency.get()));
    let mut shutdown_open = true;
    let mut cancelled = false;
    let mut tasks = JoinSet::new();
    let mut task_indices: HashMap<Id, usize> = HashMap::new();

    for index in 0..settings.count {
        let Some(permit) = admit(&permits, shutdown_rx, &mut shutdown_open).await else {
            warn!(
                "Shutdown requested; {} of {} attempts were not started",
                settings.count.saturating_sub(index),
                settings.count
            );
            cancelled = true;
            break;
        };
        while let Some(joined) = tasks.try_join_next_with_id() {
            reap(joined, &mut task_indices, &outcome_tx).await;
        }

        let attempt = Attempt {
            index,
            template: Arc::clone(template),
            context: context.clone(),
            executor: Arc::clone(executor),
            outcome_tx: outcome_tx.clone(),
            timeout: settings.attempt_timeout,
            expected_status: settings.expected_status,
        };
        let task = tasks.spawn(attempt.run(permit));
        task_indices.insert(task.id(), index);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        reap(joined, &mut task_indices, &outcome_tx).await;
    }
    drop(outcome_tx);

    match aggregator.await {
        Ok(aggregator) => aggregator.finalize(cancelled),
        Err(err) => {
            error!("Result aggregator failed: {}", err);
            ResultAggregator::new(requested).finalize(cancelled)
        }
    }
}

/// Forgets a finished attempt task; a task that died without reporting is
/// folded as a transport error.
async fn reap(
    joined: Result<(Id, ()), JoinError>,
    task_indices: &mut HashMap<Id, usize>,
    outcome_tx: &mpsc::Sender<AttemptOutcome>,
) {
    let err = match joined {
        Ok((id, ())) => {
            task_indices.remove(&id);
            return;
        }
        Err(err) => err,
    };
    let index = task_indices.remove(&err.id()).unwrap_or(usize::MAX);
    error!("Attempt {} task failed: {}", index, err);
    let outcome = AttemptOutcome {
        index,
        duration: Duration::ZERO,
        kind: OutcomeKind::TransportError {
            message: format!("attempt task failed: {}", err),
        },
    };
    if outcome_tx.send(outcome).await.is_err() {
        error!("Result aggregator stopped before attempt {} was recorded", index);
    }
}

/// Waits for a free slot, or returns `None` once shutdown is signalled.
async fn admit(
    permits: &Arc<Semaphore>,
    shutdown_rx: &mut ShutdownReceiver,
    shutdown_open: &mut bool,
) -> Option<OwnedSemaphorePermit> {
    loop {
        tokio::select! {
            biased;
            signal = shutdown_rx.recv(), if *shutdown_open => match signal {
                Ok(()) | Err(RecvError::Lagged(_)) => return None,
                Err(RecvError::Closed) => *shutdown_open = false,
            },
            permit = Arc::clone(permits).acquire_owned() => return permit.ok(),
        }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_i64_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
