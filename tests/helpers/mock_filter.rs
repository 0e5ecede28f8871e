//! A fake pastebin command for testing output filtering.

use async_trait::async_trait;
use macaroni::filter::{CommandFilter, FilterError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every invocation and answers with a fixed result.
#[derive(Clone, Debug)]
pub struct MockFilter {
    response: Option<String>,
    pub calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockFilter {
    /// A filter that prints `output`.
    pub fn returning(output: &str) -> Self {
        Self {
            response: Some(output.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A filter that always times out.
    pub fn timing_out() -> Self {
        Self {
            response: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandFilter for MockFilter {
    async fn run(&self, command: &str, input: &str) -> Result<String, FilterError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), input.to_string()));
        match &self.response {
            Some(output) => Ok(output.clone()),
            None => Err(FilterError::Timeout(Duration::from_secs(30))),
        }
    }
}
