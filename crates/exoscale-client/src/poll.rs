//! Bounded polling of asynchronous work

use crate::config::PollConfig;
use crate::error::{ApiError, Result};
use std::future::Future;
use tokio::time::sleep;

/// Outcome of a single poll
pub enum Poll<T> {
    Ready(T),
    Pending,
}

/// Call `check` until it reports [`Poll::Ready`], sleeping `config.delay`
/// between attempts.
///
/// The first check happens immediately; after `config.retries` further
/// checks the wait gives up with [`ApiError::Timeout`]. Errors returned by
/// `check` abort the wait.
pub async fn poll_until<T, F, Fut>(config: &PollConfig, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>>>,
{
    for attempt in 0..=config.retries {
        if let Poll::Ready(value) = check().await? {
            return Ok(value);
        }

        if attempt < config.retries {
            tracing::debug!(
                "{} still pending (attempt {}/{}), retrying in {:?}",
                what,
                attempt + 1,
                config.retries,
                config.delay
            );
            sleep(config.delay).await;
        }
    }

    Err(ApiError::Timeout(format!(
        "{} did not complete after {} polls at {:?} intervals",
        what, config.retries, config.delay
    )))
}
