//! Bounded retry around Lake Formation's eventual consistency
//!
//! IAM principals and data lake admin grants take a while to propagate, so a call
//! that fails with one of a handful of known messages is retried at a fixed
//! interval until a timeout, then attempted once more before giving up.

use crate::error::{BackendError, ErrorKind};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// One entry of a retry allow-list: an error class, optionally narrowed by message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRule {
    pub kind: ErrorKind,
    pub message_contains: Option<&'static str>,
}

impl RetryRule {
    pub const fn kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            message_contains: None,
        }
    }

    pub const fn message(kind: ErrorKind, needle: &'static str) -> Self {
        Self {
            kind,
            message_contains: Some(needle),
        }
    }

    pub fn matches(&self, err: &BackendError) -> bool {
        match self.message_contains {
            Some(needle) => err.message_contains(self.kind, needle),
            None => err.is_a(self.kind),
        }
    }
}

/// GrantPermissions: principal and admin propagation, S3 registration, concurrent edits
pub const GRANT_RETRY_RULES: &[RetryRule] = &[
    RetryRule::message(ErrorKind::InvalidInput, "Invalid principal"),
    RetryRule::message(ErrorKind::InvalidInput, "Grantee has no permissions"),
    RetryRule::message(ErrorKind::InvalidInput, "register the S3 path"),
    RetryRule::kind(ErrorKind::ConcurrentModification),
    RetryRule::message(
        ErrorKind::AccessDenied,
        "is not authorized to access requested permissions",
    ),
];

pub const REVOKE_RETRY_RULES: &[RetryRule] = &[
    RetryRule::message(ErrorKind::InvalidInput, "register the S3 path"),
    RetryRule::kind(ErrorKind::ConcurrentModification),
    RetryRule::message(
        ErrorKind::AccessDenied,
        "is not authorized to access requested permissions",
    ),
];

pub const LIST_RETRY_RULES: &[RetryRule] = &[RetryRule::message(
    ErrorKind::InvalidInput,
    "Invalid principal",
)];

pub fn is_retryable(rules: &[RetryRule], err: &BackendError) -> bool {
    rules.iter().any(|rule| rule.matches(err))
}

/// Run `op` until `should_retry` rejects its result or `timeout` elapses.
///
/// When the timeout is hit the operation is attempted one final time and that
/// result is returned as is.
pub async fn poll<T, F, Fut, P>(
    timeout: Duration,
    interval: Duration,
    mut op: F,
    should_retry: P,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
    P: Fn(&Result<T, BackendError>) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 1u32;

    loop {
        let result = op().await;
        if !should_retry(&result) {
            return result;
        }

        if Instant::now() + interval > deadline {
            debug!(attempt, "retry timeout reached, making final attempt");
            return op().await;
        }

        if let Err(err) = &result {
            debug!(attempt, error = %err, "retrying Lake Formation call");
        }
        tokio::time::sleep(interval).await;
        attempt += 1;
    }
}

/// Retry `op` while it fails with an error on the `rules` allow-list
pub async fn retry_transient<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    rules: &[RetryRule],
    op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    poll(timeout, interval, op, |result| match result {
        Err(err) => is_retryable(rules, err),
        Ok(_) => false,
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SHORT: Duration = Duration::from_millis(200);
    const TICK: Duration = Duration::from_millis(5);

    #[test]
    fn test_grant_rules() {
        let retryable = [
            BackendError::InvalidInput("Invalid principal arn:aws:iam::1:role/r".into()),
            BackendError::InvalidInput("Grantee has no permissions on the resource".into()),
            BackendError::ConcurrentModification("conflict".into()),
            BackendError::AccessDenied(
                "User is not authorized to access requested permissions".into(),
            ),
        ];
        for err in &retryable {
            assert!(is_retryable(GRANT_RETRY_RULES, err), "{err}");
        }

        assert!(!is_retryable(
            GRANT_RETRY_RULES,
            &BackendError::AccessDenied("Resource does not exist".into())
        ));
        assert!(!is_retryable(
            REVOKE_RETRY_RULES,
            &BackendError::InvalidInput("Invalid principal".into())
        ));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = retry_transient(SHORT, TICK, GRANT_RETRY_RULES, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BackendError::ConcurrentModification("busy".into()))
            } else {
                Ok("granted")
            }
        })
        .await;

        assert_eq!(result, Ok("granted"));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry_transient(SHORT, TICK, GRANT_RETRY_RULES, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BackendError::EntityNotFound("gone".into()))
        })
        .await;

        assert_eq!(result, Err(BackendError::EntityNotFound("gone".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_makes_final_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry_transient(
            Duration::from_millis(30),
            Duration::from_millis(10),
            LIST_RETRY_RULES,
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(BackendError::InvalidInput("Invalid principal".into()))
            },
        )
        .await;

        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_poll_until_expected_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = poll(
            SHORT,
            TICK,
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Ok(())
                } else {
                    Err(BackendError::InvalidInput("No permissions revoked. Grantee has no".into()))
                }
            },
            |result| result.is_ok(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
