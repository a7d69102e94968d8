use serde::Serialize;

use crate::args::OutputFormat;
use crate::error::AppResult;
use crate::metrics::{RunSummary, duration_micros};

#[derive(Debug, Serialize)]
struct SummaryReport {
    requested: u64,
    total: u64,
    successes: u64,
    http_errors: u64,
    transport_errors: u64,
    cancelled: bool,
    total_duration_us: u64,
    mean_latency_us: u64,
    min_latency_us: u64,
    max_latency_us: u64,
    p50_latency_us: u64,
    p90_latency_us: u64,
    p99_latency_us: u64,
}

impl From<&RunSummary> for SummaryReport {
    fn from(summary: &RunSummary) -> Self {
        Self {
            requested: summary.requested,
            total: summary.total,
            successes: summary.successes,
            http_errors: summary.http_errors,
            transport_errors: summary.transport_errors,
            cancelled: summary.cancelled,
            total_duration_us: duration_micros(summary.total_duration),
            mean_latency_us: duration_micros(summary.mean_latency),
            min_latency_us: duration_micros(summary.min_latency),
            max_latency_us: duration_micros(summary.max_latency),
            p50_latency_us: duration_micros(summary.p50_latency),
            p90_latency_us: duration_micros(summary.p90_latency),
            p99_latency_us: duration_micros(summary.p99_latency),
        }
    }
}

pub(crate) fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Total requests: {}, Successful: {}, Average response time: {:?}",
        summary.total, summary.successes, summary.mean_latency
    )];
    if summary.failures() > 0 {
        lines.push(format!(
            "Failed: {} (HTTP status: {}, transport: {})",
            summary.failures(),
            summary.http_errors,
            summary.transport_errors
        ));
    }
    if summary.total > 0 {
        lines.push(format!(
            "Latency: min {:?} | p50 {:?} | p90 {:?} | p99 {:?} | max {:?}",
            summary.min_latency,
            summary.p50_latency,
            summary.p90_latency,
            summary.p99_latency,
            summary.max_latency
        ));
    }
    if summary.cancelled {
        lines.push(format!(
            "Run cancelled: {} of {} requests were sent.",
            summary.total, summary.requested
        ));
    }
    lines
}

pub(crate) fn summary_json(summary: &RunSummary) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(&SummaryReport::from(summary))?)
}

pub(crate) fn print_summary(summary: &RunSummary, format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Text => {
            for line in summary_lines(summary) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => println!("{}", summary_json(summary)?),
    }
    Ok(())
}
