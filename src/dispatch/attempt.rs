use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use tokio::sync::{OwnedSemaphorePermit, mpsc};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::AttemptError;
use crate::http::{AttemptRequest, AttemptResponse, HttpExecutor, RequestTemplate};
use crate::metrics::{AttemptOutcome, OutcomeKind, duration_micros};
use crate::telemetry::{SpanTracer, TracingContext};

/// Maps an executor result onto an outcome kind.
///
/// Without an expected status every response counts as a success.
#[must_use]
pub fn classify_outcome(
    result: &Result<u16, AttemptError>,
    expected_status: Option<u16>,
) -> OutcomeKind {
    match result {
        Ok(status) => match expected_status {
            Some(expected) if expected != *status => OutcomeKind::HttpError { status: *status },
            Some(_) | None => OutcomeKind::Success { status: *status },
        },
        Err(err) => OutcomeKind::TransportError {
            message: err.to_string(),
        },
    }
}

pub(super) struct Attempt<T: SpanTracer, E: HttpExecutor> {
    pub(super) index: usize,
    pub(super) template: Arc<RequestTemplate>,
    pub(super) context: TracingContext<T>,
    pub(super) executor: Arc<E>,
    pub(super) outcome_tx: mpsc::Sender<AttemptOutcome>,
    pub(super) timeout: Option<Duration>,
    pub(super) expected_status: Option<u16>,
}

impl<T: SpanTracer, E: HttpExecutor> Attempt<T, E> {
    /// Runs the attempt, frees its slot and reports the outcome.
    pub(super) async fn run(self, permit: OwnedSemaphorePermit) {
        let outcome = self.traced().await;
        drop(permit);

        match &outcome.kind {
            OutcomeKind::Success { status } => debug!(
                "Request {} completed with status {} in {:?}",
                outcome.index, status, outcome.duration
            ),
            OutcomeKind::HttpError { status } => warn!(
                "Request {} returned unexpected status {}",
                outcome.index, status
            ),
            OutcomeKind::TransportError { message } => {
                warn!("Error sending request {}: {}", outcome.index, message);
            }
        }

        if self.outcome_tx.send(outcome).await.is_err() {
            debug!("Result aggregator closed before request {} reported", self.index);
        }
    }

    async fn traced(&self) -> AttemptOutcome {
        let span = self.context.start_child(self.template.span_name(self.index));
        span.set_attributes(vec![
            KeyValue::new(
                "tracefire.attempt.index",
                i64::try_from(self.index).unwrap_or(i64::MAX),
            ),
            KeyValue::new(
                "http.request.method",
                self.template.method().as_str().to_owned(),
            ),
            KeyValue::new("url.full", self.template.url().to_string()),
        ]);

        let (result, duration) = match self.template.build_request() {
            Ok(mut request) => {
                span.inject(&mut request.headers);
                let start = Instant::now();
                let response = self.send(request).await;
                let duration = start.elapsed();
                (self.finish_body(response).await, duration)
            }
            Err(err) => (Err(AttemptError::from(err)), Duration::ZERO),
        };
        let kind = classify_outcome(&result, self.expected_status);

        let duration_us = i64::try_from(duration_micros(duration)).unwrap_or(i64::MAX);
        match &result {
            Ok(status) => span.set_attributes(vec![
                KeyValue::new("http.response.status_code", i64::from(*status)),
                KeyValue::new("tracefire.attempt.duration_us", duration_us),
            ]),
            Err(err) => {
                span.record_error(err);
                span.set_attributes(vec![KeyValue::new(
                    "tracefire.attempt.duration_us",
                    duration_us,
                )]);
            }
        }
        span.end();

        AttemptOutcome {
            index: self.index,
            duration,
            kind,
        }
    }

    /// Drains the body after the clock stopped, within the same timeout.
    async fn finish_body(
        &self,
        response: Result<AttemptResponse, AttemptError>,
    ) -> Result<u16, AttemptError> {
        let response = response?;
        let status = response.status();
        match self.timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, response.drain()).await.is_err() {
                    debug!("Request {} body not drained within {:?}", self.index, timeout);
                }
            }
            None => response.drain().await,
        }
        Ok(status)
    }

    async fn send(&self, request: AttemptRequest) -> Result<AttemptResponse, AttemptError> {
        let call = self.executor.execute(request);
        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::TimedOut { timeout }),
            },
            None => call.await,
        }
    }
}
