//! Convergence polling
//!
//! Repeats a readiness check until it passes or a deadline expires. A check that
//! fails with a transient error means "not ready yet"; any other error ends the poll.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause after each failed check.
    pub interval: Duration,
    /// Total time allowed before giving up.
    pub budget: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            budget: DEFAULT_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The budget ran out. Not an error; the caller decides what to skip.
    TimedOut,
}

/// Poll `check` until it succeeds or `settings.budget` elapses.
pub async fn wait_until_ready<F, Fut>(
    settings: &PollSettings,
    operation_name: &str,
    mut check: F,
) -> Result<Readiness>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let deadline = Instant::now() + settings.budget;
    let mut attempt = 0u32;

    while Instant::now() < deadline {
        attempt += 1;

        match check().await {
            Ok(()) => {
                debug!(operation = %operation_name, attempt, "Ready");
                return Ok(Readiness::Ready);
            }
            Err(e) if e.is_transient() => {
                warn!(
                    operation = %operation_name,
                    attempt,
                    error = %e,
                    retry_in_secs = settings.interval.as_secs(),
                    "Not ready yet"
                );
                sleep(settings.interval).await;
            }
            Err(e) => return Err(e),
        }
    }

    warn!(
        operation = %operation_name,
        attempts = attempt,
        "Gave up waiting after {}s",
        settings.budget.as_secs()
    );
    Ok(Readiness::TimedOut)
}
