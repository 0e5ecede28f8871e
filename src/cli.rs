//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the defaults and `MACARONI_*` environment variables into [`Settings`].
//!
//! [`Settings`]: crate::config::Settings

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays a horenso report read from stdin to Slack and Mackerel.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read the report from FILE instead of stdin.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Log level or filter directive (e.g. "debug", "macaroni=trace").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log a snapshot of the internal metrics before exiting.
    #[arg(long)]
    pub log_metrics: bool,

    /// Build every notification but only log it.
    #[arg(long)]
    pub dry_run: bool,

    /// Timeout for each HTTP request in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub http_timeout_secs: Option<u64>,

    /// Timeout for the pastebin command in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub filter_timeout_secs: Option<u64>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(input) = &self.input {
            dict.insert(
                "input".into(),
                Value::from(input.to_string_lossy().into_owned()),
            );
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        // Flags only override when present, so `MACARONI_DRY_RUN=true` still works
        // without the flag.
        if self.log_metrics {
            dict.insert("log_metrics".into(), Value::from(true));
        }
        if self.dry_run {
            dict.insert("dry_run".into(), Value::from(true));
        }

        if let Some(secs) = self.http_timeout_secs {
            dict.insert("http_timeout_secs".into(), Value::from(secs));
        }
        if let Some(secs) = self.filter_timeout_secs {
            dict.insert("filter_timeout_secs".into(), Value::from(secs));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
