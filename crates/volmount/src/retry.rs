//! Retry policies and best-effort operations.
//!
//! Attempt ceilings and poll intervals are values handed to the controllers
//! so tests can run the same state machines with zero delay.

use std::future::Future;
use std::time::Duration;

use volmount_common::{VolmountError, VolmountResult};

/// How the pause between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same pause after every attempt.
    Fixed,
    /// Pause multiplied by `factor` after every attempt, capped at `max`.
    Exponential {
        /// Growth factor per attempt.
        factor: u32,
        /// Upper bound on a single pause.
        max: Duration,
    },
}

/// Bounded retry/poll policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (always at least one is made).
    pub max_attempts: u32,
    /// Base pause between attempts.
    pub interval: Duration,
    /// Growth of the pause.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A policy with a fixed pause between attempts.
    #[must_use]
    pub const fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// A policy that never sleeps.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Switch to exponential backoff.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Number of attempts to make, never zero.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause to take after the zero-based `attempt` failed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max } => self
                .interval
                .saturating_mul(factor.saturating_pow(attempt))
                .min(max),
        }
    }

    /// Sleep for the pause belonging to `attempt`.
    pub async fn pause(&self, attempt: u32) {
        let delay = self.delay_for(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Policy for the attach state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachPolicy {
    /// Attach requests to issue, each on a fresh device slot.
    pub max_attempts: u32,
    /// Describe polls after each accepted attach request.
    pub poll: RetryPolicy,
}

impl Default for AttachPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            poll: RetryPolicy::fixed(3, Duration::from_secs(5)),
        }
    }
}

impl AttachPolicy {
    /// Same attempt ceilings, no sleeping.
    #[must_use]
    pub const fn immediate(max_attempts: u32, polls: u32) -> Self {
        Self {
            max_attempts,
            poll: RetryPolicy::immediate(polls),
        }
    }
}

/// Outcome of an operation whose failure is logged but never propagated.
///
/// Callers inspect the outcome if they care; dropping it is the contract.
#[derive(Debug)]
pub enum BestEffort<T> {
    /// The operation succeeded.
    Done(T),
    /// The operation failed; the error has already been logged.
    Failed(VolmountError),
}

impl<T> BestEffort<T> {
    /// Run `operation`, logging a failure under `label`.
    pub async fn run<F>(label: &'static str, operation: F) -> Self
    where
        F: Future<Output = VolmountResult<T>>,
    {
        match operation.await {
            Ok(value) => Self::Done(value),
            Err(err) => {
                tracing::warn!(operation = label, error = %err, "Best-effort operation failed");
                Self::Failed(err)
            }
        }
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The value, if the operation succeeded.
    #[must_use]
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attach_policy() {
        let policy = AttachPolicy::default();
        assert_eq!(policy.max_attempts, 25);
        assert_eq!(policy.poll.max_attempts, 3);
        assert_eq!(policy.poll.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.poll.delay_for(2), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::fixed(10, Duration::from_secs(1)).with_backoff(
            Backoff::Exponential {
                factor: 2,
                max: Duration::from_secs(10),
            },
        );
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::immediate(0).attempts(), 1);
    }

    #[tokio::test]
    async fn best_effort_swallows_errors() {
        let outcome: BestEffort<()> = BestEffort::run("detach", async {
            Err(VolmountError::NotAttached {
                volume: "vol-1".to_string(),
            })
        })
        .await;
        assert!(!outcome.succeeded());
        assert!(outcome.ok().is_none());

        let outcome = BestEffort::run("noop", async { Ok(7) }).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.ok(), Some(7));
    }
}
