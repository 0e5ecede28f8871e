//! Fans a report out to every enabled notifier.
use crate::core::{Delivery, Notifier, NotifyError, Report};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

/// One notifier that failed to deliver the report.
#[derive(Debug)]
pub struct NotifierFailure {
    pub notifier: String,
    pub error: NotifyError,
}

impl fmt::Display for NotifierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.notifier, self.error)
    }
}

fn join_failures(failures: &[NotifierFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a run did not complete successfully.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    MalformedReport(#[from] crate::core::ReportError),

    #[error("couldn't initialize HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("{} notifier(s) failed: {}", .0.len(), join_failures(.0))]
    NotifiersFailed(Vec<NotifierFailure>),
}

impl DispatchError {
    /// The per-notifier failures, empty unless notifiers failed.
    pub fn failures(&self) -> &[NotifierFailure] {
        match self {
            DispatchError::NotifiersFailed(failures) => failures,
            _ => &[],
        }
    }
}

/// What every notifier did in a successful run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchSummary {
    pub deliveries: Vec<(String, Delivery)>,
}

impl DispatchSummary {
    pub fn delivery(&self, notifier: &str) -> Option<Delivery> {
        self.deliveries
            .iter()
            .find(|(name, _)| name == notifier)
            .map(|(_, delivery)| *delivery)
    }
}

/// Runs a set of notifiers concurrently against the same report.
///
/// Every notifier runs to completion even when others fail, and every
/// failure is reported.
#[derive(Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        info!(notifier = notifier.name(), "Notifier enabled");
        self.notifiers.push(notifier);
    }

    /// Sends the report to every registered notifier and waits for all of them.
    pub async fn dispatch(&self, report: Arc<Report>) -> Result<DispatchSummary, DispatchError> {
        if self.notifiers.is_empty() {
            info!("No notifier enabled, nothing to report");
            return Ok(DispatchSummary::default());
        }

        let handles: Vec<_> = self
            .notifiers
            .iter()
            .map(|notifier| {
                let name = notifier.name().to_string();
                let notifier = notifier.clone();
                let report = report.clone();
                debug!(notifier = %name, "Spawning notifier task");
                let handle = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = notifier.notify(&report).await;
                    metrics::histogram!("notification_duration_seconds", "notifier" => notifier.name().to_string())
                        .record(start.elapsed().as_secs_f64());
                    result
                });
                (name, handle)
            })
            .collect();

        let names: Vec<String> = handles.iter().map(|(name, _)| name.clone()).collect();
        let results = join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        let mut summary = DispatchSummary::default();
        let mut failures = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            let result = match result {
                Ok(result) => result,
                Err(e) => Err(NotifyError::TaskAborted(e.to_string())),
            };
            match result {
                Ok(delivery) => {
                    let counter = match delivery {
                        Delivery::Sent => "notifications_sent_total",
                        Delivery::Suppressed => "notifications_suppressed_total",
                        Delivery::DryRun => "notifications_dry_run_total",
                    };
                    metrics::counter!(counter, "notifier" => name.clone()).increment(1);
                    info!(notifier = %name, ?delivery, "Notifier finished");
                    summary.deliveries.push((name, delivery));
                }
                Err(e) => {
                    metrics::counter!("notifications_failed_total", "notifier" => name.clone())
                        .increment(1);
                    error!(notifier = %name, error = %e, "Notifier failed");
                    failures.push(NotifierFailure {
                        notifier: name,
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(DispatchError::NotifiersFailed(failures))
        }
    }
}
