//! Wires configuration, report decoding and the notifiers together.

use crate::config::{EnvSource, NotifierConfig, Settings};
use crate::core::{Notifier, Report};
use crate::dispatcher::{DispatchError, DispatchSummary, Dispatcher};
use crate::ecs;
use crate::filter::ShellFilter;
use crate::notification::{http_client, mackerel::MackerelNotifier, slack::SlackNotifier};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::info;

/// Creates the notifiers enabled by `config`.
pub fn build_notifiers(
    config: NotifierConfig,
    settings: &Settings,
    client: &reqwest::Client,
    ecs_metadata: Option<ecs::EcsMetadata>,
) -> Vec<Arc<dyn Notifier>> {
    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();

    if let Some(slack) = config.slack {
        let filter = Arc::new(ShellFilter::new(settings.filter_timeout()));
        notifiers.push(Arc::new(
            SlackNotifier::new(slack, client.clone(), filter)
                .with_ecs_metadata(ecs_metadata)
                .with_dry_run(settings.dry_run),
        ));
    }
    if let Some(mackerel) = config.mackerel {
        notifiers.push(Arc::new(
            MackerelNotifier::new(mackerel, client.clone()).with_dry_run(settings.dry_run),
        ));
    }

    notifiers
}

/// Runs one report through every enabled notifier.
///
/// The report is decoded before anything else happens; a malformed report
/// aborts the run without contacting any backend.
pub async fn run<R>(
    settings: &Settings,
    env: &impl EnvSource,
    input: R,
) -> Result<DispatchSummary, DispatchError>
where
    R: AsyncRead + Unpin,
{
    let config = NotifierConfig::from_env(env);
    info!(
        slack = config.slack.is_some(),
        mackerel = config.mackerel.is_some(),
        dry_run = settings.dry_run,
        "Configuration loaded"
    );

    let report = Report::from_reader(input).await?;
    info!(
        hostname = %report.hostname,
        exit_code = report.exit_code,
        "Report decoded"
    );

    let client = http_client(settings.http_timeout()).map_err(DispatchError::HttpClient)?;
    let ecs_metadata = if config.slack.is_some() {
        ecs::lookup(&client, config.ecs_metadata_uri.as_deref()).await
    } else {
        None
    };

    let mut dispatcher = Dispatcher::new();
    for notifier in build_notifiers(config, settings, &client, ecs_metadata) {
        dispatcher.register(notifier);
    }
    dispatcher.dispatch(Arc::new(report)).await
}
