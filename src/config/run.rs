use std::time::Duration;

use crate::args::{OutputFormat, PositiveUsize, TraceArgs};
use crate::error::ConfigError;

/// Validated, immutable description of one traced run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub endpoint: String,
    pub url: String,
    pub method: String,
    pub headers: Vec<String>,
    pub body: String,
    pub count: usize,
    pub concurrency: PositiveUsize,
    pub timeout: Option<Duration>,
    pub expected_status: Option<u16>,
    pub service_name: String,
    pub export: bool,
    pub output_format: OutputFormat,
}

impl TryFrom<&TraceArgs> for RunConfig {
    type Error = ConfigError;

    fn try_from(args: &TraceArgs) -> Result<Self, Self::Error> {
        let url = args
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingUrl)?;

        Ok(Self {
            endpoint: args.endpoint.trim().to_owned(),
            url: url.to_owned(),
            method: args.method.clone(),
            headers: args.headers.clone(),
            body: args.body.clone(),
            count: args.count,
            concurrency: args.concurrency,
            timeout: args.timeout,
            expected_status: args.expected_status,
            service_name: args.service_name.clone(),
            export: !args.no_export,
            output_format: args.output_format,
        })
    }
}
