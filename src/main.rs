//! insights-pipeline CLI
//!
//! Command-line interface and HTTP trigger for the insights pipeline

use anyhow::Context;
use clap::Parser;
use insights_pipeline::cli::{Cli, Runner};
use insights_pipeline::Error;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let kind = e.downcast_ref::<Error>().map_or("internal", Error::kind);
            tracing::error!(kind, error = %format!("{e:#}"), "Command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.name();
    Runner::new(cli)
        .run()
        .await
        .with_context(|| format!("{command} failed"))
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
