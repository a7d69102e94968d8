use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::{debug, error};

use crate::args::{Cli, Command, TraceArgs};
use crate::config::{RunConfig, apply_config, load_config};
use crate::dispatch::{DispatchSettings, trace_and_time};
use crate::error::AppResult;
use crate::http::{ReqwestExecutor, RequestTemplate};
use crate::metrics::RunSummary;
use crate::shutdown_handlers::{setup_signal_shutdown_handler, shutdown_channel};
use crate::system::logger::init_logging;
use crate::system::summary_output::print_summary;
use crate::telemetry::{OtelTracer, init_tracer};

/// Runs the `tracefire` CLI to completion.
///
/// # Errors
///
/// Returns an error when configuration is invalid, the tracer cannot be set
/// up or shut down, or the summary cannot be printed.
pub fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args()?;
    init_logging(args.verbose, args.no_color);

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }
    let config = RunConfig::try_from(&args)?;
    let template = RequestTemplate::from_config(&config)?;

    let tracer_handle = match init_tracer(&config) {
        Ok(handle) => handle,
        Err(err) => {
            error!("Error setting up tracer: {}", err);
            return Err(err.into());
        }
    };

    // The exporter uses a blocking client, so the provider lives outside the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = runtime.block_on(run_traced(&config, template, tracer_handle.tracer()))?;
    drop(runtime);

    print_summary(&summary, config.output_format)?;

    if let Err(err) = tracer_handle.shutdown() {
        error!("Error shutting down tracer: {}", err);
        return Err(err.into());
    }
    Ok(())
}

fn parse_args() -> AppResult<(TraceArgs, ArgMatches)> {
    let matches = Cli::command().get_matches();
    let Command::Trace(args) = Cli::from_arg_matches(&matches)?.command;
    let trace_matches = matches
        .subcommand_matches("trace")
        .cloned()
        .unwrap_or_default();
    Ok((args, trace_matches))
}

async fn run_traced(
    config: &RunConfig,
    template: RequestTemplate,
    tracer: OtelTracer,
) -> AppResult<RunSummary> {
    let executor = Arc::new(ReqwestExecutor::new()?);
    let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let summary = trace_and_time(
        DispatchSettings::from(config),
        &Arc::new(template),
        Arc::new(tracer),
        &executor,
        &mut shutdown_rx,
    )
    .await;

    drop(shutdown_tx.send(()));
    if let Err(err) = signal_handle.await {
        debug!("Signal handler task ended abnormally: {}", err);
    }
    Ok(summary)
}
