use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::AuthenticatorError;
use crate::config::{DEFAULT_TIMEOUT, MAX_TIMEOUT, MIN_TIMEOUT};

pub fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
}

/// Cancellation handle bound to a deadline, passed through every suspension
/// point of a protocol operation.
#[derive(Debug, Clone)]
pub struct AbortToken {
    cancel:   CancellationToken,
    deadline: Instant,
}

impl Default for AbortToken {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortToken {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// `timeout` is clamped to [`MIN_TIMEOUT`, `MAX_TIMEOUT`].
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel:   CancellationToken::new(),
            deadline: Instant::now() + clamp_timeout(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }

    pub fn check(&self) -> Result<(), AuthenticatorError> {
        if self.is_aborted() {
            return Err(AuthenticatorError::TimeoutAborted);
        }
        Ok(())
    }

    /// Resolves once the token is cancelled or the deadline passes.
    pub async fn aborted(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep_until(self.deadline) => {}
        }
    }

    /// Run `fut` until it completes or the token aborts, whichever is first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, AuthenticatorError> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.aborted() => {
                tracing::debug!("operation aborted at suspension point");
                Err(AuthenticatorError::TimeoutAborted)
            }
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_timeout() {
        assert_eq!(clamp_timeout(Duration::from_secs(1)), MIN_TIMEOUT);
        assert_eq!(clamp_timeout(Duration::from_secs(90)), Duration::from_secs(90));
        assert_eq!(clamp_timeout(Duration::from_secs(3600)), MAX_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_passes_through_ready_future() {
        let token = AbortToken::new();
        assert_eq!(token.guard(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out_pending_future() {
        let token = AbortToken::with_timeout(Duration::from_secs(30));
        let out = token.guard(std::future::pending::<()>()).await;
        assert_eq!(out, Err(AuthenticatorError::TimeoutAborted));
        assert!(token.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_observes_cancel() {
        let token = AbortToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let out = token.guard(std::future::pending::<()>()).await;
        assert_eq!(out, Err(AuthenticatorError::TimeoutAborted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_after_cancel() {
        let token = AbortToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert_eq!(token.check(), Err(AuthenticatorError::TimeoutAborted));
        assert_eq!(token.guard(async { 1 }).await, Err(AuthenticatorError::TimeoutAborted));
    }
}
