//! Attempt outcomes and their fold into a run summary.
mod aggregator;
mod histogram;
mod types;


pub use aggregator::{ResultAggregator, spawn_aggregator};
pub use histogram::LatencyHistogram;
pub use types::{AttemptOutcome, OutcomeKind, RunSummary};

pub(crate) use aggregator::duration_micros;
