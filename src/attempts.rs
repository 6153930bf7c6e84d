//! Ordered attempt chains with degrading strictness.
//!
//! Used where a collaborator offers a strict path and one or more lenient
//! fallbacks: browser navigation wait states and the publishing API versions.

use crate::PromoError;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, warn};

/// Run `op` for each attempt in order and return the first success.
///
/// A failure moves on to the next attempt only when `should_continue`
/// accepts it; any other failure is returned immediately. When every attempt
/// fails, the error of the last one is returned.
pub async fn first_success<A, T, F, Fut, P>(
    attempts: impl IntoIterator<Item = A>,
    mut op: F,
    should_continue: P,
) -> Result<T, PromoError>
where
    A: Debug,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<T, PromoError>>,
    P: Fn(&PromoError) -> bool,
{
    let mut last_error = None;

    for (index, attempt) in attempts.into_iter().enumerate() {
        debug!(attempt = index + 1, plan = ?attempt, "Starting attempt");

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if should_continue(&e) => {
                warn!(attempt = index + 1, error = %e, "Attempt failed, trying next");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        PromoError::InvalidConfiguration("no attempts configured".to_string())
    }))
}

pub fn is_timeout(error: &PromoError) -> bool {
    matches!(error, PromoError::TimeoutError(_))
}

/// Anything but a missing authorization is worth another try.
pub fn is_retryable_publish_failure(error: &PromoError) -> bool {
    !matches!(
        error,
        PromoError::AuthError(_) | PromoError::InvalidConfiguration(_)
    )
}
