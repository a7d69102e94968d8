use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::args::DEFAULT_USER_AGENT;
use crate::error::{AttemptError, HttpError, RequestBuildError, TransportError};

use super::template::AttemptRequest;

/// Sends one request and hands back the response once its head arrived.
///
/// Implementations are shared by every in-flight attempt, so they must be
/// safe for concurrent use.
#[async_trait]
pub trait HttpExecutor: Send + Sync + 'static {
    async fn execute(&self, request: AttemptRequest) -> Result<AttemptResponse, AttemptError>;
}

/// Status line of a response whose body may still be in flight.
#[derive(Debug)]
pub struct AttemptResponse {
    status: u16,
    body: Option<reqwest::Response>,
}

impl AttemptResponse {
    /// A response with nothing left to read.
    #[must_use]
    pub const fn status_only(status: u16) -> Self {
        Self { status, body: None }
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Reads and discards whatever is left of the body.
    pub async fn drain(self) {
        let Some(mut response) = self.body else {
            return;
        };
        loop {
            match response.chunk().await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => {
                    debug!("Failed to drain response body: {}", err);
                    break;
                }
            }
        }
    }
}

impl From<reqwest::Response> for AttemptResponse {
    fn from(response: reqwest::Response) -> Self {
        Self {
            status: response.status().as_u16(),
            body: Some(response),
        }
    }
}

/// [`HttpExecutor`] backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new() -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|err| HttpError::BuildClientFailed { source: err })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: AttemptRequest) -> Result<AttemptResponse, AttemptError> {
        let AttemptRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let request = builder
            .build()
            .map_err(|err| RequestBuildError::Client { source: err })?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(TransportError::from)?;
        Ok(AttemptResponse::from(response))
    }
}
