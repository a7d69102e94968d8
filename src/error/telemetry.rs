use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to set up tracer for '{endpoint}': {message}")]
    Setup { endpoint: String, message: String },
    #[error("Failed to shut down tracer: {message}")]
    Shutdown { message: String },
}
