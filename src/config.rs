//! Configuration management for macaroni
//!
//! Two kinds of configuration live here:
//!
//! * [`Settings`] controls the process itself (logging, timeouts, input). It
//!   is layered with `figment` from defaults, `MACARONI_*` environment
//!   variables and the command line.
//! * [`NotifierConfig`] holds the per-backend settings. It is built from the
//!   horenso-compatible `SLACK_*` / `MACKEREL_*` keys read through an
//!   [`EnvSource`], so tests can supply their own environment.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cli::Cli;

/// Metric name prefix used when `MACKEREL_METRIC_NAME_PREFIX` is unset.
pub const DEFAULT_METRIC_NAME_PREFIX: &str = "horenso.report";
/// Mackerel API endpoint used when no other base is configured.
pub const DEFAULT_MACKEREL_API_BASE: &str = "https://api.mackerelio.com";
/// Location of the mackerel-agent configuration file.
pub const DEFAULT_AGENT_CONFIG: &str = "/etc/mackerel-agent/mackerel-agent.conf";
/// Directory where mackerel-agent keeps its host id.
pub const DEFAULT_AGENT_ROOT: &str = "/var/lib/mackerel-agent";

/// Process-level settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// The logging level or filter directive.
    pub log_level: String,
    /// Log a metrics snapshot before exiting.
    pub log_metrics: bool,
    /// Build notifications without sending them.
    pub dry_run: bool,
    /// Timeout applied to every HTTP request.
    pub http_timeout_secs: u64,
    /// Timeout applied to the pastebin command.
    pub filter_timeout_secs: u64,
    /// Read the report from this file instead of stdin.
    #[serde(default)]
    pub input: Option<PathBuf>,
}

impl Settings {
    /// Loads settings by layering defaults, environment variables and CLI args.
    pub fn load(cli: &Cli) -> Result<Self> {
        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            // e.g. MACARONI_HTTP_TIMEOUT_SECS=10
            .merge(Env::prefixed("MACARONI_"))
            .merge(cli.clone())
            .extract()?;
        Ok(settings)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn filter_timeout(&self) -> Duration {
        Duration::from_secs(self.filter_timeout_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_metrics: false,
            dry_run: false,
            http_timeout_secs: 30,
            filter_timeout_secs: 30,
            input: None,
        }
    }
}

/// A source of environment-style key/value configuration.
pub trait EnvSource {
    /// Returns the raw value of `key`, if set.
    fn var(&self, key: &str) -> Option<String>;

    /// Returns the value of `key` unless it is unset or empty.
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.is_empty())
    }
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// A notifier configuration that cannot be used.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid MACKEREL_TARGET={target} {reason}")]
    InvalidTarget { target: String, reason: &'static str },

    #[error("unable to read Mackerel host id from {path}: {source}")]
    HostIdLookup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Mackerel host id file {path} is empty")]
    EmptyHostId { path: PathBuf },

    #[error("unable to get Mackerel API key")]
    MissingApiKey,
}

/// Configuration for Slack notifications.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlackConfig {
    /// The incoming webhook URL.
    pub endpoint: String,
    pub channel: String,
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
    /// Appended to the message text when the command failed.
    pub mention: Option<String>,
    /// A command that rewrites the output before it is posted.
    pub pastebin_cmd: Option<String>,
    /// Skip the notification when the command succeeded.
    pub mute_on_normal: bool,
}

/// Where Mackerel metrics are posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MackerelTarget {
    /// Service metrics for the named service.
    Service(String),
    /// Host metrics for the given host id.
    Host(String),
}

/// Configuration for Mackerel metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MackerelConfig {
    pub api_key: String,
    pub api_base: String,
    pub metric_name_prefix: String,
    /// Replaces the normalized command in metric names.
    pub metric_name: Option<String>,
    pub target: MackerelTarget,
}

/// The settings mackerel-agent stores in its TOML configuration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub apikey: Option<String>,
    pub apibase: Option<String>,
    pub root: Option<PathBuf>,
}

impl AgentConfig {
    /// Reads the agent configuration. A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Toml::file(path)).extract()
    }

    /// Path of the file holding this host's Mackerel id.
    pub fn host_id_file(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_ROOT))
            .join("id")
    }

    /// Looks up the id mackerel-agent registered for this host.
    pub fn host_id(&self) -> Result<String, ConfigError> {
        let path = self.host_id_file();
        let id = std::fs::read_to_string(&path).map_err(|source| ConfigError::HostIdLookup {
            path: path.clone(),
            source,
        })?;
        let id = id.trim();
        if id.is_empty() {
            return Err(ConfigError::EmptyHostId { path });
        }
        Ok(id.to_string())
    }
}

/// The backends that are enabled for this run.
#[derive(Debug, Clone, Default)]
pub struct NotifierConfig {
    pub slack: Option<SlackConfig>,
    pub mackerel: Option<MackerelConfig>,
    /// Task metadata endpoint when running as an ECS container.
    pub ecs_metadata_uri: Option<String>,
}

impl NotifierConfig {
    /// Builds every notifier configuration.
    ///
    /// A notifier whose configuration is invalid is disabled with a warning;
    /// this never fails the run.
    pub fn from_env(env: &impl EnvSource) -> Self {
        let mackerel = match build_mackerel_config(env) {
            Ok(conf) => conf,
            Err(e) => {
                warn!(error = %e, "Mackerel reporter disabled");
                None
            }
        };
        Self {
            slack: build_slack_config(env),
            mackerel,
            ecs_metadata_uri: env.non_empty("ECS_CONTAINER_METADATA_URI"),
        }
    }
}

/// Parses booleans the way horenso's wrappers write them.
///
/// Anything unrecognised is `false`.
pub fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "t" | "T" | "TRUE" | "true" | "True")
}

/// Builds the Slack configuration; `None` when Slack is not configured.
pub fn build_slack_config(env: &impl EnvSource) -> Option<SlackConfig> {
    let endpoint = env.non_empty("SLACK_ENDPOINT");
    let channel = env.non_empty("SLACK_CHANNEL");

    let (endpoint, channel) = match (endpoint, channel) {
        (Some(endpoint), Some(channel)) => (endpoint, channel),
        (None, None) => return None,
        _ => {
            warn!("Slack reporter requires both SLACK_ENDPOINT and SLACK_CHANNEL. Slack reporter disabled.");
            return None;
        }
    };

    Some(SlackConfig {
        endpoint,
        channel,
        username: env.non_empty("SLACK_USERNAME"),
        icon_emoji: env.non_empty("SLACK_ICON_EMOJI"),
        mention: env.non_empty("SLACK_MENTION"),
        pastebin_cmd: env.non_empty("SLACK_PASTEBIN_CMD"),
        mute_on_normal: env
            .var("SLACK_MUTE_ON_NORMAL")
            .map(|v| parse_bool(&v))
            .unwrap_or(false),
    })
}

/// Builds the Mackerel configuration; `Ok(None)` when no target is set.
pub fn build_mackerel_config(env: &impl EnvSource) -> Result<Option<MackerelConfig>, ConfigError> {
    let target = match env.non_empty("MACKEREL_TARGET") {
        Some(target) => target,
        None => return Ok(None),
    };

    let agent_path = env
        .non_empty("MACKEREL_AGENT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_CONFIG));
    let agent = AgentConfig::load(&agent_path).unwrap_or_else(|e| {
        warn!(path = %agent_path.display(), error = %e, "Ignoring unreadable mackerel-agent config");
        AgentConfig::default()
    });

    let target = if let Some(id) = target.strip_prefix("host:") {
        if id.is_empty() {
            let id = agent.host_id()?;
            debug!(host_id = %id, "Using host id of the local mackerel-agent");
            MackerelTarget::Host(id)
        } else {
            MackerelTarget::Host(id.to_string())
        }
    } else if let Some(service) = target.strip_prefix("service:") {
        if service.is_empty() {
            return Err(ConfigError::InvalidTarget {
                target,
                reason: "service name required",
            });
        }
        MackerelTarget::Service(service.to_string())
    } else {
        return Err(ConfigError::InvalidTarget {
            target,
            reason: "service: or host: is required",
        });
    };

    let api_key = env
        .non_empty("MACKEREL_APIKEY")
        .or_else(|| agent.apikey.clone().filter(|k| !k.is_empty()))
        .ok_or(ConfigError::MissingApiKey)?;

    let api_base = env
        .non_empty("MACKEREL_APIBASE")
        .or_else(|| agent.apibase.clone().filter(|b| !b.is_empty()))
        .unwrap_or_else(|| DEFAULT_MACKEREL_API_BASE.to_string());

    Ok(Some(MackerelConfig {
        api_key,
        api_base,
        metric_name_prefix: env
            .non_empty("MACKEREL_METRIC_NAME_PREFIX")
            .unwrap_or_else(|| DEFAULT_METRIC_NAME_PREFIX.to_string()),
        metric_name: env.non_empty("MACKEREL_METRIC_NAME"),
        target,
    }))
}
