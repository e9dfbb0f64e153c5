//! Poller - Bounded wait for asynchronously converging remote state
//!
//! A sampling function reports the current value and a status label. The
//! poller samples immediately, then at a fixed interval, until the status
//! reaches the target label, the sampler fails, a label outside the pending
//! set shows up, or the deadline passes. Errors from the sampler abort the
//! wait at once; only pending statuses are retried.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

/// Interval and deadline of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Pause between two samples
    pub interval: Duration,
    /// Total time allowed, measured from the first sample
    pub timeout: Duration,
}

impl WaitConfig {
    /// Default pause between samples (5 seconds)
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    /// Default deadline (10 minutes)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_TIMEOUT)
    }
}

/// One observation returned by a sampling function
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub status: String,
}

impl<T> Sample<T> {
    pub fn new(value: T, status: impl Into<String>) -> Self {
        Self {
            value,
            status: status.into(),
        }
    }
}

/// Successful outcome of a wait
#[derive(Debug, Clone, PartialEq)]
pub struct Converged<T> {
    /// Value of the sample that reported the target status
    pub value: T,
    /// Number of samples taken, including the final one
    pub samples: usize,
    pub elapsed: Duration,
}

/// Why a wait ended without reaching the target
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("timed out after {elapsed:?} with status '{last_status}' ({samples} samples)")]
    Timeout {
        elapsed: Duration,
        /// Empty when the deadline passed before the first sample completed
        last_status: String,
        samples: usize,
    },

    #[error("unexpected status '{status}'")]
    UnexpectedStatus { status: String },

    #[error("cancelled")]
    Cancelled,

    #[error("sample failed: {0}")]
    Sample(E),
}

/// Repeatedly samples until a target status is observed
#[derive(Debug, Clone)]
pub struct Poller {
    config: WaitConfig,
    pending: Vec<String>,
    target: String,
}

impl Poller {
    pub fn new(config: WaitConfig, pending: &[&str], target: &str) -> Self {
        Self {
            config,
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.to_string(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> WaitConfig {
        self.config
    }

    /// Wait until the target status, bounded only by the deadline
    pub async fn wait<T, E, F, Fut>(&self, sample: F) -> Result<Converged<T>, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Sample<T>, E>>,
    {
        self.wait_with_cancel(sample, std::future::pending::<()>())
            .await
    }

    /// Wait until the target status, aborting with `Cancelled` as soon as
    /// `cancel` completes
    pub async fn wait_with_cancel<T, E, F, Fut, C>(
        &self,
        mut sample: F,
        cancel: C,
    ) -> Result<Converged<T>, PollError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Sample<T>, E>>,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let mut samples = 0;
        let mut last_status = String::new();

        loop {
            let observed = tokio::select! {
                biased;
                _ = &mut cancel => return Err(PollError::Cancelled),
                result = sample() => result.map_err(PollError::Sample)?,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(PollError::Timeout {
                        elapsed: start.elapsed(),
                        last_status,
                        samples,
                    });
                }
            };
            samples += 1;

            debug!(
                "Sample {}: status '{}' (waiting for '{}')",
                samples, observed.status, self.target
            );

            if observed.status == self.target {
                return Ok(Converged {
                    value: observed.value,
                    samples,
                    elapsed: start.elapsed(),
                });
            }

            if !self.pending.contains(&observed.status) {
                return Err(PollError::UnexpectedStatus {
                    status: observed.status,
                });
            }
            last_status = observed.status;

            let now = Instant::now();
            if now >= deadline {
                return Err(PollError::Timeout {
                    elapsed: start.elapsed(),
                    last_status,
                    samples,
                });
            }

            let pause = self.config.interval.min(deadline - now);
            tokio::select! {
                biased;
                _ = &mut cancel => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

/// Aggregate per-element statuses: `target` only when every element reports
/// it, `pending` otherwise. An empty collection has converged.
pub fn conjunction<'a, I, S>(statuses: I, target: &'a str, pending: &'a str) -> &'a str
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if statuses.into_iter().all(|s| s.as_ref() == target) {
        target
    } else {
        pending
    }
}
