use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use super::defaults::{DEFAULT_ENDPOINT, DEFAULT_SERVICE_NAME};
use super::parsers::{parse_bool_env, parse_duration_arg, parse_positive_usize};
use super::types::{OutputFormat, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Fire one HTTP request N times with bounded concurrency, trace every attempt with OpenTelemetry, and report latency/success statistics."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Trace and time HTTP requests
    Trace(TraceArgs),
}

#[derive(Debug, Args, Clone)]
pub struct TraceArgs {
    /// OTLP/HTTP exporter endpoint
    #[arg(
        long,
        short = 'e',
        default_value = DEFAULT_ENDPOINT,
        env = "TRACEFIRE_ENDPOINT"
    )]
    pub endpoint: String,

    /// URL to send the HTTP request to
    #[arg(long, short = 'u')]
    pub url: Option<String>,

    /// HTTP method to use
    #[arg(long, short = 'm', default_value = "GET")]
    pub method: String,

    /// HTTP headers in 'Name: Value' format (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// HTTP request body
    #[arg(long, short = 'b', default_value = "")]
    pub body: String,

    /// Number of times to send the request
    #[arg(long, short = 'c', default_value_t = 1)]
    pub count: usize,

    /// Max number of requests in flight at once
    #[arg(long, short = 'n', default_value = "1", value_parser = parse_positive_usize)]
    pub concurrency: PositiveUsize,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long, value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Only count responses with this status code as successful
    #[arg(long = "status")]
    pub expected_status: Option<u16>,

    /// service.name reported to the trace backend
    #[arg(
        long = "service-name",
        default_value = DEFAULT_SERVICE_NAME,
        env = "TRACEFIRE_SERVICE_NAME"
    )]
    pub service_name: String,

    /// Create spans without exporting them
    #[arg(long = "no-export")]
    pub no_export: bool,

    /// Summary format printed to stdout
    #[arg(long = "output-format", value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    /// Path to config file (TOML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable color output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env)]
    pub no_color: bool,
}
