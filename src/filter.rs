//! External filters that rewrite report output before it is posted.
//!
//! The Slack notifier pipes the command output through a user-supplied
//! "pastebin" command, which typically uploads the output somewhere and
//! prints a URL.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// The pastebin command could not produce usable output.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("failed to start command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error talking to command: {0}")]
    Io(#[source] std::io::Error),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command exited with {status}: {output}")]
    Failed { status: String, output: String },
}

/// Runs `command` with `input` on its stdin and returns what it printed.
#[async_trait]
pub trait CommandFilter: Send + Sync {
    async fn run(&self, command: &str, input: &str) -> Result<String, FilterError>;
}

/// Runs filters as child processes.
///
/// Commands containing a space go through `sh -c`; anything else is executed
/// directly. When the timeout expires the child and every process in its
/// group are killed.
#[derive(Debug, Clone)]
pub struct ShellFilter {
    timeout: Duration,
}

impl ShellFilter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(command: &str) -> Command {
        let mut cmd = if command.contains(' ') {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        } else {
            Command::new(command)
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The child leads its own process group so a timeout can take down
        // everything a shell pipeline started.
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    fn collect(output: Output) -> Result<String, FilterError> {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(FilterError::Failed {
                status: output.status.to_string(),
                output: combined,
            })
        }
    }
}

/// Sends SIGKILL to every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "Failed to kill filter process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[async_trait]
impl CommandFilter for ShellFilter {
    async fn run(&self, command: &str, input: &str) -> Result<String, FilterError> {
        debug!(command, "Executing filter command");
        let mut child = Self::command(command).spawn().map_err(FilterError::Spawn)?;
        let pid = child.id();

        // Feed stdin concurrently so a chatty filter can't fill its stdout pipe
        // while we are still writing.
        if let Some(mut stdin) = child.stdin.take() {
            let input = input.to_owned();
            tokio::spawn(async move {
                // A filter may exit without reading all of its input.
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    debug!(error = %e, "Filter command stopped reading input");
                }
            });
        }

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => Self::collect(output.map_err(FilterError::Io)?),
            Err(_) => {
                // Dropping the wait future already killed the direct child.
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                Err(FilterError::Timeout(self.timeout))
            }
        }
    }
}
