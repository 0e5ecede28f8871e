//! macaroni - reports horenso results to Slack and Mackerel
//!
//! Reads one horenso report from stdin and sends it to every backend enabled
//! by the `SLACK_*` and `MACKEREL_*` environment variables.

use clap::Parser;
use macaroni::{
    app,
    cli::Cli,
    config::{ProcessEnv, Settings},
    internal_metrics::LoggingRecorder,
};
use std::io::IsTerminal;
use std::process::ExitCode;
use tokio::io::AsyncRead;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load settings by layering sources: defaults, environment, and CLI args.
    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load settings: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr; RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
    debug!(?settings, "Settings loaded");

    let recorder = if settings.log_metrics {
        let recorder = LoggingRecorder::new();
        if let Err(e) = metrics::set_global_recorder(recorder.clone()) {
            warn!(error = %e, "Failed to install metrics recorder");
        }
        Some(recorder)
    } else {
        None
    };

    let input: Box<dyn AsyncRead + Unpin + Send> = match &settings.input {
        Some(path) => match tokio::fs::File::open(path).await {
            Ok(file) => Box::new(file),
            Err(err) => {
                eprintln!("couldn't open report {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(tokio::io::stdin()),
    };

    let result = app::run(&settings, &ProcessEnv, input).await;

    if let Some(recorder) = recorder {
        recorder.log_snapshot();
    }

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
