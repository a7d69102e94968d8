//! Span lifecycle for a run and its attempts.
mod context;
mod otel;


pub use context::{AttemptSpan, SpanTracer, TracingContext};
pub use otel::{OtelTracer, TracerHandle, init_tracer};
