//! A notifier that posts report metrics to Mackerel.
//!
//! Two values are derived per report, `{prefix}.error.{name}` and
//! `{prefix}.elapsed.{name}`, and posted in a single request as service or
//! host metrics.

use crate::config::{MackerelConfig, MackerelTarget};
use crate::core::{Delivery, Notifier, NotifyError, Report};
use crate::formatting::normalize_metric_name;
use crate::notification::post_json;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// One timestamped metric value.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricValue {
    pub name: String,
    pub time: i64,
    pub value: f64,
}

/// A metric value addressed to a host, as the host tsdb endpoint expects.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct HostMetricValue<'a> {
    host_id: &'a str,
    #[serde(flatten)]
    value: &'a MetricValue,
}

/// Derives the error flag and elapsed time metrics from a report.
///
/// Both values are stamped with the report's end time.
pub fn build_metric_values(report: &Report, conf: &MackerelConfig) -> Vec<MetricValue> {
    let name = match &conf.metric_name {
        Some(name) => name.clone(),
        None => normalize_metric_name(&report.command),
    };
    let time = report.end_at.timestamp();

    vec![
        MetricValue {
            name: format!("{}.error.{}", conf.metric_name_prefix, name),
            time,
            value: if report.succeeded() { 0.0 } else { 1.0 },
        },
        MetricValue {
            name: format!("{}.elapsed.{}", conf.metric_name_prefix, name),
            time,
            value: report.elapsed_seconds(),
        },
    ]
}

/// Posts report metrics to the Mackerel API.
pub struct MackerelNotifier {
    config: MackerelConfig,
    client: reqwest::Client,
    dry_run: bool,
}

impl MackerelNotifier {
    /// Creates a new `MackerelNotifier`.
    pub fn new(config: MackerelConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The endpoint and JSON body for this notifier's target.
    fn request(&self, values: &[MetricValue]) -> Result<(String, String), serde_json::Error> {
        let base = self.config.api_base.trim_end_matches('/');
        match &self.config.target {
            MackerelTarget::Service(service) => Ok((
                format!("{}/api/v0/services/{}/tsdb", base, service),
                serde_json::to_string(values)?,
            )),
            MackerelTarget::Host(host_id) => {
                let values: Vec<HostMetricValue<'_>> = values
                    .iter()
                    .map(|value| HostMetricValue { host_id, value })
                    .collect();
                Ok((format!("{}/api/v0/tsdb", base), serde_json::to_string(&values)?))
            }
        }
    }
}

#[async_trait]
impl Notifier for MackerelNotifier {
    fn name(&self) -> &str {
        "mackerel"
    }

    #[instrument(skip(self, report), fields(target = ?self.config.target))]
    async fn notify(&self, report: &Report) -> Result<Delivery, NotifyError> {
        let values = build_metric_values(report, &self.config);
        let (url, body) = self.request(&values)?;
        debug!(url = %url, values = %body, "Mackerel metric values");

        if self.dry_run {
            info!(url = %url, values = %body, "Dry run, not posting to Mackerel");
            return Ok(Delivery::DryRun);
        }

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|_| NotifyError::InvalidHeader("X-Api-Key"))?;
        headers.insert("X-Api-Key", api_key);

        info!(url = %url, "Posting metrics to Mackerel");
        post_json(&self.client, &url, headers, body).await?;
        info!("Posted to Mackerel");
        Ok(Delivery::Sent)
    }
}
