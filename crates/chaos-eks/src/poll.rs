//! Bounded polling: re-check a condition on a fixed interval until it holds
//! or a deadline passes.
//!
//! The time bound is checked at the top of every iteration. A sleep may
//! overrun the deadline; the next iteration then fails without evaluating
//! the condition again unless [`PollSettings::final_check`] is set.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The condition did not hold before the deadline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timed out {description}")]
pub struct TimedOut {
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between two unsuccessful checks.
    pub interval: Duration,
    /// Evaluate the condition once more after the deadline before failing.
    pub final_check: bool,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            final_check: false,
        }
    }
}

impl PollSettings {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }
}

/// Wait until `predicate` yields `true`, checking every `interval` until `deadline`.
///
/// Errors returned by the predicate end the wait immediately.
pub async fn wait_until<F, Fut, E>(
    deadline: Instant,
    interval: Duration,
    description: &str,
    predicate: F,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<TimedOut>,
{
    wait_with(deadline, &PollSettings::every(interval), description, predicate).await
}

/// Like [`wait_until`] with explicit [`PollSettings`].
pub async fn wait_with<F, Fut, E>(
    deadline: Instant,
    settings: &PollSettings,
    description: &str,
    mut predicate: F,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<TimedOut>,
{
    info!(
        remaining_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
        interval_ms = settings.interval.as_millis() as u64,
        "{description}"
    );

    let mut checks = 0u32;
    while Instant::now() < deadline {
        checks += 1;
        if predicate().await? {
            debug!(checks, "condition met");
            return Ok(());
        }
        debug!(checks, "condition not met yet");
        tokio::time::sleep(settings.interval).await;
    }

    if settings.final_check {
        checks += 1;
        if predicate().await? {
            debug!(checks, "condition met on final check");
            return Ok(());
        }
    }

    warn!(checks, "deadline reached: {description}");
    Err(TimedOut {
        description: description.to_string(),
    }
    .into())
}
