//! CLI entry point for the animal ETL pipeline.

use std::io::{self, IsTerminal};
use std::process::ExitCode;
use std::sync::Arc;

use animal_etl::client::{AnimalApi, ApiClient};
use animal_etl::pipeline::{Pipeline, PipelineError, PipelineSummary};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

mod cli;
mod config;
mod progress;
mod terminal;

use progress::FetchProgressBar;

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    Success,
    Failure,
    Interrupted,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Interrupted => 130,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(exit) => ExitCode::from(exit.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}

async fn run() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let (args, sources) = cli::parse_with_sources();

    let loaded = config::load_config(args.config.as_deref())?;
    let args = config::apply_config_defaults(args, &sources, loaded.config.as_ref());

    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(config::resolve_default_log_level(&args), no_color);

    debug!(
        ?args,
        config_path = ?loaded.path,
        config_loaded = loaded.config.is_some(),
        "configuration resolved"
    );

    let client = ApiClient::with_settings(&args.base_url, config::resolve_client_settings(&args))
        .context("Failed to create API client")?;
    info!(
        base_url = %client.base_url(),
        max_attempts = client.retry_policy().max_attempts(),
        "animal-etl starting"
    );
    let api: Arc<dyn AnimalApi> = Arc::new(client);

    let mut pipeline = Pipeline::new(api, config::resolve_pipeline_config(&args))
        .context("Invalid pipeline configuration")?;

    let progress = FetchProgressBar::new(terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    ));
    if let Some(observer) = progress.observer() {
        pipeline = pipeline.with_fetch_observer(observer);
    }

    // Dropping the run future on interrupt aborts in-flight fetch workers.
    let outcome = tokio::select! {
        result = pipeline.run() => Some(result),
        () = wait_for_interrupt() => None,
    };
    progress.finish();

    Ok(match outcome {
        Some(Ok(summary)) => report_success(&summary),
        Some(Err(error)) => report_failure(&error),
        None => {
            warn!(stage = %pipeline.stage(), "interrupt received, stopping pipeline");
            eprintln!("Pipeline interrupted by user");
            ProcessExit::Interrupted
        }
    })
}

async fn wait_for_interrupt() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn report_success(summary: &PipelineSummary) -> ProcessExit {
    info!(
        discovered = summary.discovered,
        fetched = summary.fetched,
        transformed = summary.transformed,
        loaded = summary.loaded,
        elapsed_secs = summary.elapsed.as_secs_f64(),
        "Loaded {} animals",
        summary.loaded
    );
    ProcessExit::Success
}

fn report_failure(error: &PipelineError) -> ProcessExit {
    eprintln!(
        "Pipeline failed during {}: {}",
        error.stage(),
        error.stage_error()
    );
    if error.loaded() > 0 {
        eprintln!(
            "  {} animals were loaded before the failure",
            error.loaded()
        );
    }
    ProcessExit::Failure
}
