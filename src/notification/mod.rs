//! Notification backends.
//!
//! Each backend implements [`Notifier`](crate::core::Notifier) and performs a
//! single outbound HTTP call per report. Nothing is retried.
pub mod mackerel;
pub mod slack;

use crate::core::NotifyError;
use crate::formatting::single_line;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::time::Duration;

/// Error response bodies are folded onto one line and cut to this many
/// characters before they are kept in an error.
pub const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Builds the HTTP client shared by all notifiers.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("macaroni/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// POSTs an already serialized JSON body; any 2xx status is a success.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    body: String,
) -> Result<(), NotifyError> {
    let response = client
        .post(url)
        .headers(headers)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|source| NotifyError::Transport {
            url: url.to_string(),
            source,
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::UnexpectedStatus {
        url: url.to_string(),
        status: status.as_u16(),
        body: single_line(&body, MAX_ERROR_BODY_LENGTH),
    })
}
