//! Core library for the `tracefire` CLI.
//!
//! `tracefire` sends one configured HTTP request a fixed number of times with
//! a bound on how many are in flight, wraps every attempt in an
//! OpenTelemetry span nested under a single run span, and reports latency
//! and success counts. The dispatcher is generic over [`http::HttpExecutor`]
//! and [`telemetry::SpanTracer`] so it can run without a network or a
//! collector.
pub mod args;
pub mod config;
pub mod dispatch;
mod entry;
pub mod error;
pub mod http;
pub mod metrics;
pub mod shutdown;
mod shutdown_handlers;
mod system;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use entry::run;
pub use shutdown_handlers::shutdown_channel;
