mod app;
mod config;
mod http;
mod telemetry;
mod validation;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use http::{AttemptError, HttpError, RequestBuildError, TransportError};
pub use telemetry::TelemetryError;
pub use validation::ValidationError;
