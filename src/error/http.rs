use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {source}")]
    BuildClientFailed {
        #[source]
        source: reqwest::Error,
    },
}

/// A per-attempt request could not be assembled from the template.
#[derive(Debug, Error)]
pub enum RequestBuildError {
    #[error("Invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: http::header::InvalidHeaderName,
    },
    #[error("Invalid value for header '{name}': {source}")]
    InvalidHeaderValue {
        name: String,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("Failed to build request: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },
}

/// Network-level failure reported by an HTTP executor.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self { message }
    }
}

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Failed to build request: {source}")]
    Build {
        #[source]
        source: RequestBuildError,
    },
    #[error("Request failed: {source}")]
    Transport {
        #[source]
        source: TransportError,
    },
    #[error("Request timed out after {timeout:?}.")]
    TimedOut { timeout: Duration },
}

impl From<RequestBuildError> for AttemptError {
    fn from(source: RequestBuildError) -> Self {
        AttemptError::Build { source }
    }
}

impl From<TransportError> for AttemptError {
    fn from(source: TransportError) -> Self {
        AttemptError::Transport { source }
    }
}
