use std::sync::Arc;

use http::HeaderMap;
use opentelemetry::KeyValue;

/// Span operations needed from a tracing backend.
///
/// Every span returned by `start_run` or `start_child` is passed to `end`
/// exactly once. Implementations are called from many attempts at once.
pub trait SpanTracer: Send + Sync + 'static {
    type Span: Send + Sync + 'static;

    fn start_run(&self, name: &str) -> Self::Span;

    fn start_child(&self, parent: &Self::Span, name: String) -> Self::Span;

    fn set_attributes(&self, span: &Self::Span, attributes: Vec<KeyValue>);

    fn record_error(&self, span: &Self::Span, error: &dyn std::error::Error);

    /// Writes the span's trace context into outgoing request headers.
    fn inject(&self, span: &Self::Span, headers: &mut HeaderMap);

    fn end(&self, span: Self::Span);
}

struct RunScope<T: SpanTracer> {
    tracer: Arc<T>,
    span: Option<T::Span>,
}

impl<T: SpanTracer> Drop for RunScope<T> {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            self.tracer.end(span);
        }
    }
}

/// Handle on the run span that every attempt span nests under.
///
/// Clones share the same run span. The span ends when the last clone is
/// dropped or finished, so attempts still holding a clone keep it open.
pub struct TracingContext<T: SpanTracer> {
    scope: Arc<RunScope<T>>,
}

impl<T: SpanTracer> Clone for TracingContext<T> {
    fn clone(&self) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
        }
    }
}

impl<T: SpanTracer> TracingContext<T> {
    #[must_use]
    pub fn start_run(tracer: Arc<T>, name: &str) -> Self {
        let span = tracer.start_run(name);
        Self {
            scope: Arc::new(RunScope {
                tracer,
                span: Some(span),
            }),
        }
    }

    pub fn set_attributes(&self, attributes: Vec<KeyValue>) {
        if let Some(span) = self.scope.span.as_ref() {
            self.scope.tracer.set_attributes(span, attributes);
        }
    }

    /// Opens a span for one attempt as a child of the run span.
    #[must_use]
    pub fn start_child(&self, name: String) -> AttemptSpan<T> {
        let span = self
            .scope
            .span
            .as_ref()
            .map(|parent| self.scope.tracer.start_child(parent, name));
        AttemptSpan {
            tracer: Arc::clone(&self.scope.tracer),
            span,
        }
    }

    /// Releases this handle on the run span.
    pub fn finish(self) {
        drop(self);
    }
}

/// One attempt's span. Ends on [`AttemptSpan::end`] or when dropped.
pub struct AttemptSpan<T: SpanTracer> {
    tracer: Arc<T>,
    span: Option<T::Span>,
}

impl<T: SpanTracer> AttemptSpan<T> {
    pub fn set_attributes(&self, attributes: Vec<KeyValue>) {
        if let Some(span) = self.span.as_ref() {
            self.tracer.set_attributes(span, attributes);
        }
    }

    pub fn record_error(&self, error: &dyn std::error::Error) {
        if let Some(span) = self.span.as_ref() {
            self.tracer.record_error(span, error);
        }
    }

    /// Propagates this attempt's trace context to the server.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Some(span) = self.span.as_ref() {
            self.tracer.inject(span, headers);
        }
    }

    pub fn end(mut self) {
        if let Some(span) = self.span.take() {
            self.tracer.end(span);
        }
    }
}

impl<T: SpanTracer> Drop for AttemptSpan<T> {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            self.tracer.end(span);
        }
    }
}
