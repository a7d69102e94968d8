use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tracing::debug;
use url::Url;

use crate::config::RunConfig;
use crate::error::{ConfigError, RequestBuildError};

/// Immutable description of the request every attempt sends.
///
/// Built once before dispatch and shared read-only; attempts call
/// [`RequestTemplate::build_request`] to get their own request value.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

/// One attempt's private copy of the request.
#[derive(Debug)]
pub struct AttemptRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Splits a raw `Name: Value` header on its first colon and trims both sides.
///
/// Returns `None` when there is no colon at all.
#[must_use]
pub fn parse_raw_header(raw: &str) -> Option<(String, String)> {
    raw.split_once(':')
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
}

impl RequestTemplate {
    /// Builds a template from raw request parts.
    ///
    /// Header strings without a colon are dropped. An empty body means the
    /// request carries no body at all.
    ///
    /// # Errors
    ///
    /// Returns an error when the method or URL cannot be parsed.
    pub fn new(
        method: &str,
        url: &str,
        raw_headers: &[String],
        body: &str,
    ) -> Result<Self, ConfigError> {
        let method = parse_method(method)?;
        let url = parse_url(url)?;

        let mut headers = Vec::with_capacity(raw_headers.len());
        for raw in raw_headers {
            match parse_raw_header(raw) {
                Some(header) => headers.push(header),
                None => debug!("Dropping header without ':' separator: '{}'", raw),
            }
        }

        let body = if body.is_empty() {
            None
        } else {
            Some(Bytes::from(body.to_owned()))
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// # Errors
    ///
    /// Returns an error when the configured method or URL is malformed.
    pub fn from_config(config: &RunConfig) -> Result<Self, ConfigError> {
        Self::new(&config.method, &config.url, &config.headers, &config.body)
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Span name for one attempt, e.g. `GET /health - request-3`.
    #[must_use]
    pub fn span_name(&self, index: usize) -> String {
        format!("{} {} - request-{}", self.method, self.url.path(), index)
    }

    /// Builds a fresh request for a single attempt.
    ///
    /// # Errors
    ///
    /// Returns an error when a header name or value is not valid HTTP.
    pub fn build_request(&self) -> Result<AttemptRequest, RequestBuildError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                RequestBuildError::InvalidHeaderName {
                    name: name.clone(),
                    source: err,
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|err| RequestBuildError::InvalidHeaderValue {
                    name: name.clone(),
                    source: err,
                })?;
            headers.append(header_name, header_value);
        }

        Ok(AttemptRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers,
            body: self.body.clone(),
        })
    }
}

fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(trimmed.to_ascii_uppercase().as_bytes()).map_err(|err| {
        ConfigError::InvalidMethod {
            method: raw.to_owned(),
            source: err,
        }
    })
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|err| ConfigError::InvalidUrl {
        url: raw.to_owned(),
        source: err,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            url: raw.to_owned(),
            scheme: other.to_owned(),
        }),
    }
}
