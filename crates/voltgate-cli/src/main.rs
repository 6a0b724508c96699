mod cli;
mod commands;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            if let CliError::Gateway(gateway_error) = &error {
                if gateway_error.retryable() {
                    eprintln!("the failure is transient; retrying may succeed");
                }
            }
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    // Foreground commands such as `monitor` render nothing; they report
    // through the log instead.
    let Some(value) = commands::run(&cli).await? else {
        return Ok(());
    };
    output::render(&value, cli.format, cli.pretty)
}
