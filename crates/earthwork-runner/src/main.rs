//! `earthwork` command-line entry point.

use clap::Parser;
use earthwork_runner::{run_estimate, tile_info, Cli, Command, RunnerError};
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    #[cfg(feature = "prometheus")]
    {
        if let Some(addr) = cli.metrics_addr {
            if let Err(e) = earthwork_metrics::install_prometheus_exporter(addr) {
                eprintln!("Error: failed to start metrics exporter on {}: {}", addr, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let outcome = match &cli.command {
        Command::Estimate(args) => run_estimate(args).and_then(|report| print_json(&report)),
        Command::TileInfo(args) => tile_info(args).and_then(|info| print_json(&info)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("earthwork=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RunnerError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
