//! Cancellable execution scope shared by every pipeline stage.
//!
//! A scope ends either when it is cancelled explicitly or when its deadline
//! passes. Clones observe the same cancellation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error_handling::{FailureCause, FailureKind};

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    Cancelled,
    DeadlineExceeded,
}

impl ScopeEnd {
    /// Failure recorded for work the scope ended before it could finish.
    pub fn failure(self) -> FailureCause {
        match self {
            ScopeEnd::Cancelled => FailureCause::new(FailureKind::Cancelled, "pipeline cancelled"),
            ScopeEnd::DeadlineExceeded => {
                FailureCause::new(FailureKind::Timeout, "pipeline deadline exceeded")
            }
        }
    }
}

/// Cancellation token plus an optional deadline.
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// A scope without a deadline; it only ends through [`CancelScope::cancel`].
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the scope has ended, or `None` while it is still live.
    ///
    /// Explicit cancellation wins over an elapsed deadline.
    pub fn state(&self) -> Option<ScopeEnd> {
        if self.token.is_cancelled() {
            Some(ScopeEnd::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ScopeEnd::DeadlineExceeded)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.state().is_some()
    }

    /// Resolves once the scope has ended.
    pub async fn done(&self) -> ScopeEnd {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ScopeEnd::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => ScopeEnd::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                ScopeEnd::Cancelled
            }
        }
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_seen_by_clones() {
        let scope = CancelScope::new();
        let clone = scope.clone();
        assert!(!clone.is_done());

        scope.cancel();
        assert_eq!(clone.state(), Some(ScopeEnd::Cancelled));
        assert_eq!(clone.done().await, ScopeEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_scope() {
        let scope = CancelScope::with_timeout(Duration::from_secs(5));
        assert!(!scope.is_done());

        assert_eq!(scope.done().await, ScopeEnd::DeadlineExceeded);
        assert_eq!(scope.state(), Some(ScopeEnd::DeadlineExceeded));
    }

    #[test]
    fn test_scope_end_failure_kinds() {
        assert_eq!(ScopeEnd::Cancelled.failure().kind, FailureKind::Cancelled);
        assert_eq!(ScopeEnd::DeadlineExceeded.failure().kind, FailureKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_wins_over_later_deadline() {
        let scope = CancelScope::with_timeout(Duration::from_secs(60));
        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        assert_eq!(scope.done().await, ScopeEnd::Cancelled);
    }
}
