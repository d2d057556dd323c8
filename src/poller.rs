//! Long-Running-Operation Poller
//!
//! Remote mutating calls often return before their effect completes. The
//! poller wraps one such call: the call itself runs exactly once (its
//! failure is the caller's to handle - the framework never retries a
//! mutating call), then a status probe runs at a configured interval
//! until the operation reaches a terminal state or the deadline elapses.
//!
//! [`PollHandle::finish`] is an ordinary future: dropping it cancels the
//! loop at the next await point, so an upstream phase timeout aborts the
//! pending probe rather than waiting it out.

use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Poll interval and deadline. Configuration, not constants - fast and
/// slow provisioning paths tune these independently (see
/// [`crate::config::FrameworkConfig::poller`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Observed state of a remote operation.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    /// Still running; `detail` is the last-reported remote status.
    InProgress { detail: Option<String> },
    /// Terminal success.
    Succeeded(T),
    /// Terminal failure, with the remote error detail.
    Failed { detail: String },
}

/// Status probe issued between waits.
pub type ProbeFn<T> = Box<dyn FnMut() -> BoxFuture<'static, anyhow::Result<PollState<T>>> + Send>;

/// Poll loop failure. `Timeout` means the remote side effect may still be
/// in progress - nothing has been rolled back.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("operation still pending after {waited:?} (last status: {})", .last_seen.as_deref().unwrap_or("unknown"))]
    Timeout {
        waited: Duration,
        last_seen: Option<String>,
    },

    #[error("remote operation failed: {detail}")]
    RemoteFailed { detail: String },

    #[error("status probe failed")]
    Probe {
        #[source]
        source: anyhow::Error,
    },
}

/// Drives submitted operations to a terminal state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Poller {
    config: PollerConfig,
}

impl Poller {
    pub fn new(config: PollerConfig) -> Self {
        Self { config }
    }

    /// Issue the mutating call once and hand its initial state to a poll
    /// handle. An error from the call propagates untouched - it is never
    /// retried here.
    pub async fn submit<T, Fut>(
        &self,
        call: Fut,
        probe: ProbeFn<T>,
    ) -> anyhow::Result<PollHandle<T>>
    where
        Fut: Future<Output = anyhow::Result<PollState<T>>>,
    {
        let initial = call.await?;
        Ok(self.attach(initial, probe))
    }

    /// Build a handle from an already-observed state, e.g. to resume
    /// watching an operation submitted earlier.
    pub fn attach<T>(&self, initial: PollState<T>, probe: ProbeFn<T>) -> PollHandle<T> {
        PollHandle {
            config: self.config,
            probe,
            state: initial,
        }
    }
}

/// An operation being driven to completion.
pub struct PollHandle<T> {
    config: PollerConfig,
    probe: ProbeFn<T>,
    state: PollState<T>,
}

impl<T> PollHandle<T> {
    /// Last-reported remote status, if any.
    pub fn last_seen(&self) -> Option<&str> {
        match &self.state {
            PollState::InProgress { detail } => detail.as_deref(),
            _ => None,
        }
    }

    /// Probe until the operation reaches a terminal state or the
    /// configured deadline elapses. Sleeps are clamped to the deadline;
    /// a timeout reports the last-observed status so diagnosis does not
    /// require re-querying the remote system.
    pub async fn finish(mut self) -> Result<T, PollError> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let detail = match std::mem::replace(
                &mut self.state,
                PollState::InProgress { detail: None },
            ) {
                PollState::Succeeded(value) => return Ok(value),
                PollState::Failed { detail } => {
                    return Err(PollError::RemoteFailed { detail })
                }
                PollState::InProgress { detail } => detail,
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    waited: self.config.timeout,
                    last_seen: detail,
                });
            }

            let wake = std::cmp::min(now + self.config.interval, deadline);
            tokio::time::sleep_until(wake).await;
            if Instant::now() >= deadline {
                return Err(PollError::Timeout {
                    waited: self.config.timeout,
                    last_seen: detail,
                });
            }

            tracing::debug!(last_seen = detail.as_deref(), "polling operation status");
            self.state = (self.probe)()
                .await
                .map_err(|source| PollError::Probe { source })?;
        }
    }
}

/// Decode an operation status document (`{"status": "PENDING" | "RUNNING"
/// | "DONE", "error": {...}}`) into a poll state.
pub fn operation_state(operation: &Value) -> anyhow::Result<PollState<Value>> {
    let status = operation
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("operation document has no status field"))?;

    match status {
        "DONE" => match operation.get("error") {
            Some(error) => Ok(PollState::Failed {
                detail: operation_error_detail(error),
            }),
            None => Ok(PollState::Succeeded(operation.clone())),
        },
        other => Ok(PollState::InProgress {
            detail: Some(other.to_string()),
        }),
    }
}

fn operation_error_detail(error: &Value) -> String {
    error
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|first| first.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
