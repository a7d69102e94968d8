use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{PositiveUsize, TraceArgs};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments.
///
/// Values given on the command line or through environment variables win
/// over the config file.
///
/// # Errors
///
/// Returns an error when config values are invalid.
pub fn apply_config(
    args: &mut TraceArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_explicit(matches, "endpoint")
        && let Some(endpoint) = config.endpoint.clone()
    {
        args.endpoint = endpoint;
    }

    if !is_explicit(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_explicit(matches, "method")
        && let Some(method) = config.method.clone()
    {
        args.method = method;
    }

    if !is_explicit(matches, "headers")
        && let Some(headers) = config.headers.clone()
    {
        args.headers = headers;
    }

    if !is_explicit(matches, "body")
        && let Some(body) = config.body.clone()
    {
        args.body = body;
    }

    if !is_explicit(matches, "count")
        && let Some(count) = config.count
    {
        args.count = count;
    }

    if !is_explicit(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "concurrency")?;
    }

    if !is_explicit(matches, "timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        let timeout = timeout
            .to_duration()
            .map_err(|err| AppError::config(ConfigError::InvalidTimeout { source: err }))?;
        args.timeout = Some(timeout);
    }

    if !is_explicit(matches, "expected_status")
        && let Some(status) = config.status
    {
        args.expected_status = Some(status);
    }

    if !is_explicit(matches, "service_name")
        && let Some(service_name) = config.service_name.clone()
    {
        args.service_name = service_name;
    }

    if !is_explicit(matches, "no_export")
        && let Some(no_export) = config.no_export
    {
        args.no_export = no_export;
    }

    if !is_explicit(matches, "output_format")
        && let Some(output_format) = config.output_format
    {
        args.output_format = output_format;
    }

    Ok(())
}

fn is_explicit(matches: &ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}
