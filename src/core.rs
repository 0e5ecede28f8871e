//! Core domain types and service traits for macaroni
//!
//! This module defines the execution report handed over by horenso and the
//! trait contract every notification backend implements.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The record of one supervised command execution, as written by horenso.
///
/// A report is decoded once per run and shared read-only between notifiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// The executed command line
    pub command: String,
    /// The individual arguments, when horenso recorded them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_args: Vec<String>,
    /// Combined stdout and stderr
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Exit status of the command
    pub exit_code: i32,
    /// Human-readable result summary, e.g. "command exited with code: 1"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub start_at: DateTime<FixedOffset>,
    pub end_at: DateTime<FixedOffset>,
    /// Host the command ran on
    pub hostname: String,
}

/// The report could not be read or did not have the expected shape.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("couldn't read report: {0}")]
    Read(#[from] std::io::Error),

    #[error("couldn't parse report: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("couldn't parse report: endAt {end_at} precedes startAt {start_at}")]
    EndBeforeStart {
        start_at: DateTime<FixedOffset>,
        end_at: DateTime<FixedOffset>,
    },
}

impl Report {
    /// Decodes a report from a complete JSON document.
    pub fn from_json(document: &str) -> Result<Self, ReportError> {
        let report: Report = serde_json::from_str(document)?;
        if report.end_at < report.start_at {
            return Err(ReportError::EndBeforeStart {
                start_at: report.start_at,
                end_at: report.end_at,
            });
        }
        Ok(report)
    }

    /// Reads the whole stream, then decodes it as a single report.
    pub async fn from_reader<R>(mut reader: R) -> Result<Self, ReportError>
    where
        R: AsyncRead + Unpin,
    {
        let mut document = String::new();
        reader.read_to_string(&mut document).await?;
        Self::from_json(&document)
    }

    /// Whether the command exited successfully.
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    /// Wall time of the command in fractional seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        let delta = self.end_at - self.start_at;
        match delta.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }
}

/// How a notifier dealt with a report that it did not fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The backend accepted the notification.
    Sent,
    /// The notifier deliberately skipped the call.
    Suppressed,
    /// The payload was built and logged but not sent.
    DryRun,
}

/// A failure of one notifier to deliver the report.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {url}: {body}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),

    #[error("couldn't serialize payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("notifier task aborted: {0}")]
    TaskAborted(String),
}

/// Turns a report into one outbound call to a specific backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A short, stable name for the backend (e.g., "slack", "mackerel").
    /// Used for logging, metrics and error reports.
    fn name(&self) -> &str;

    /// Delivers the report to the backend.
    ///
    /// # Returns
    /// * `Ok(Delivery)` describing what happened when nothing failed
    /// * `Err` if the backend could not be reached or rejected the call
    async fn notify(&self, report: &Report) -> Result<Delivery, NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "command": "perl -E 'say 1;warn \"$$\\n\";'",
        "commandArgs": ["perl", "-E", "say 1;warn \"$$\\n\";"],
        "output": "1\n95030\n",
        "stdout": "1\n",
        "stderr": "95030\n",
        "exitCode": 0,
        "result": "command exited with code: 0",
        "pid": 95030,
        "startAt": "2015-12-28T00:37:10.494282399+09:00",
        "endAt": "2015-12-28T00:37:10.546466379+09:00",
        "hostname": "webserver.example.com",
        "systemTime": 0.034,
        "userTime": 0.026
    }"#;

    #[test]
    fn test_decode_full_report() {
        let report = Report::from_json(REPORT).unwrap();
        assert_eq!(report.hostname, "webserver.example.com");
        assert_eq!(report.exit_code, 0);
        assert_eq!(report.pid, Some(95030));
        assert_eq!(report.command_args.len(), 3);
        assert_eq!(report.end_at.timestamp(), 1451230630);
        assert!(report.succeeded());
        assert!((report.elapsed_seconds() - 0.05218398).abs() < 1e-12);
    }

    #[test]
    fn test_decode_minimal_report() {
        let doc = r#"{"command":"true","output":"","exitCode":3,
            "startAt":"2024-01-01T00:00:00Z","endAt":"2024-01-01T00:00:01.5Z",
            "hostname":"h"}"#;
        let report = Report::from_json(doc).unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.stdout, None);
        assert!((report.elapsed_seconds() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let doc = r#"{"command":"true","output":"","hostname":"h",
            "startAt":"2024-01-01T00:00:00Z","endAt":"2024-01-01T00:00:01Z"}"#;
        assert!(matches!(Report::from_json(doc), Err(ReportError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let doc = r#"{"command":"true","output":"","exitCode":0,"hostname":"h",
            "startAt":"yesterday","endAt":"2024-01-01T00:00:01Z"}"#;
        assert!(matches!(Report::from_json(doc), Err(ReportError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_and_empty_input() {
        assert!(Report::from_json(&REPORT[..REPORT.len() / 2]).is_err());
        assert!(Report::from_json("").is_err());
    }

    #[test]
    fn test_decode_rejects_end_before_start() {
        let doc = r#"{"command":"true","output":"","exitCode":0,"hostname":"h",
            "startAt":"2024-01-01T00:00:05Z","endAt":"2024-01-01T00:00:01Z"}"#;
        assert!(matches!(
            Report::from_json(doc),
            Err(ReportError::EndBeforeStart { .. })
        ));
    }

    #[tokio::test]
    async fn test_from_reader_reads_whole_stream() {
        let report = Report::from_reader(REPORT.as_bytes()).await.unwrap();
        assert_eq!(report.output, "1\n95030\n");
    }
}
