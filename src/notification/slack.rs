//! A notifier that posts reports to a Slack incoming webhook.

use crate::config::SlackConfig;
use crate::core::{Delivery, Notifier, NotifyError, Report};
use crate::ecs::EcsMetadata;
use crate::filter::CommandFilter;
use crate::formatting::{escape_markup, truncate_tail};
use crate::notification::post_json;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Output longer than this many characters is cut from the front.
pub const MAX_OUTPUT_LENGTH: usize = 1000;

const COLOR_SUCCESS: &str = "#33cc33";
const COLOR_FAILURE: &str = "#d22a3c";

/// The JSON body posted to the webhook.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlackPayload {
    pub text: String,
    pub channel: String,
    pub link_names: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attachment {
    pub fallback: String,
    pub color: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Field {
    pub title: String,
    pub value: String,
}

impl Field {
    fn new(title: &str, value: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            value: value.into(),
        }
    }
}

fn color(exit_code: i32) -> &'static str {
    if exit_code == 0 {
        COLOR_SUCCESS
    } else {
        COLOR_FAILURE
    }
}

/// The headline of the message.
pub fn message_text(report: &Report, conf: &SlackConfig) -> String {
    if report.succeeded() {
        return format!(":ok: [{}] horenso reports success", report.hostname);
    }
    let mut message = format!(
        ":anger: [{}] horenso reports error! exit with {}",
        report.hostname, report.exit_code
    );
    if let Some(mention) = &conf.mention {
        message.push(' ');
        message.push_str(mention);
    }
    message
}

/// Builds the webhook payload.
///
/// `output` is the report output after the optional pastebin filter ran.
/// The result depends only on its arguments.
pub fn build_payload(
    report: &Report,
    conf: &SlackConfig,
    output: &str,
    ecs: Option<&EcsMetadata>,
) -> SlackPayload {
    let mut fields = vec![
        Field::new("Hostname", report.hostname.as_str()),
        Field::new("Command", report.command.as_str()),
        Field::new("ExitCode", report.exit_code.to_string()),
        Field::new(
            "Output",
            format!("```\n{}```", truncate_tail(output, MAX_OUTPUT_LENGTH)),
        ),
        Field::new(
            "Started",
            report.start_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        Field::new(
            "Ended",
            report.end_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
    ];
    if let Some(meta) = ecs {
        fields.push(Field::new("ECS Cluster", meta.cluster.as_str()));
        fields.push(Field::new("ECS Task", meta.task_arn.as_str()));
        fields.push(Field::new("ECS Container", meta.container_name.as_str()));
    }

    SlackPayload {
        text: message_text(report, conf),
        channel: conf.channel.clone(),
        link_names: 1,
        username: conf.username.clone(),
        icon_emoji: conf.icon_emoji.clone(),
        attachments: vec![Attachment {
            fallback: format!("{} {}", output, report.command),
            color: color(report.exit_code).to_string(),
            fields,
        }],
    }
}

/// Serializes a payload and escapes it for Slack's markup.
pub fn encode_payload(payload: &SlackPayload) -> Result<String, serde_json::Error> {
    Ok(escape_markup(&serde_json::to_string(payload)?))
}

/// Posts reports to a Slack webhook.
pub struct SlackNotifier {
    config: SlackConfig,
    client: reqwest::Client,
    filter: Arc<dyn CommandFilter>,
    ecs: Option<EcsMetadata>,
    dry_run: bool,
}

impl SlackNotifier {
    /// Creates a new `SlackNotifier`.
    pub fn new(
        config: SlackConfig,
        client: reqwest::Client,
        filter: Arc<dyn CommandFilter>,
    ) -> Self {
        Self {
            config,
            client,
            filter,
            ecs: None,
            dry_run: false,
        }
    }

    /// Adds ECS container fields to every message.
    pub fn with_ecs_metadata(mut self, ecs: Option<EcsMetadata>) -> Self {
        self.ecs = ecs;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Runs the output through the pastebin command, falling back to the raw
    /// output when the command fails.
    async fn resolve_output(&self, report: &Report) -> String {
        let Some(cmd) = &self.config.pastebin_cmd else {
            return report.output.clone();
        };
        match self.filter.run(cmd, &report.output).await {
            Ok(output) => output,
            Err(e) => {
                warn!(command = %cmd, error = %e, "Failed to execute pastebin command, posting raw output");
                report.output.clone()
            }
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    #[instrument(skip(self, report), fields(channel = %self.config.channel, exit_code = report.exit_code))]
    async fn notify(&self, report: &Report) -> Result<Delivery, NotifyError> {
        if report.succeeded() && self.config.mute_on_normal {
            info!("Mute on normal exit, Slack notification suppressed");
            return Ok(Delivery::Suppressed);
        }

        let output = self.resolve_output(report).await;
        let payload = build_payload(report, &self.config, &output, self.ecs.as_ref());
        let body = encode_payload(&payload)?;
        debug!(payload = %body, "Slack payload");

        if self.dry_run {
            info!(endpoint = %self.config.endpoint, payload = %body, "Dry run, not posting to Slack");
            return Ok(Delivery::DryRun);
        }

        info!("Reporting to Slack");
        post_json(&self.client, &self.config.endpoint, HeaderMap::new(), body).await?;
        info!("Posted to Slack");
        Ok(Delivery::Sent)
    }
}
