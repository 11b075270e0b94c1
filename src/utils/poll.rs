//! Fixed-interval polling with a deadline.
//!
//! Both cluster waiters (CRD establishment and resource readiness) are built
//! on [`poll_until`]. The loop owns its deadline; there is no external
//! cancellation, it ends in success, timeout, or the check's own error.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;

/// How a poll loop ended without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The check reported nothing pending.
    Done,
    /// The deadline passed first. Carries what the last check still
    /// reported as pending.
    TimedOut { pending: Vec<String> },
}

/// Run `check` immediately and then every `interval` until it reports
/// nothing pending, returns an error, or `timeout` elapses.
///
/// `check` returns the names of whatever is not ready yet. A timed-out poll
/// never returns before `timeout` has elapsed; the last check runs at the
/// deadline.
///
/// ```
/// use std::time::Duration;
/// use meshctl::utils::poll::{poll_until, PollOutcome};
///
/// # tokio_test::block_on(async {
/// let mut left = vec!["Deployment/mesh-system/pilot".to_string()];
/// let outcome = poll_until(Duration::from_millis(1), Duration::from_secs(1), || {
///     let pending = std::mem::take(&mut left);
///     async move { Ok(pending) }
/// })
/// .await
/// .unwrap();
/// assert_eq!(outcome, PollOutcome::Done);
/// # });
/// ```
pub async fn poll_until<F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<String>>>,
{
    // A timeout past the end of the clock has no deadline at all.
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let pending = check().await?;
        if pending.is_empty() {
            return Ok(PollOutcome::Done);
        }
        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(PollOutcome::TimedOut { pending });
                }
                interval.min(deadline - now)
            }
            None => interval,
        };
        tokio::time::sleep(pause).await;
    }
}
