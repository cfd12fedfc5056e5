//! The declarative retry policy attached to a node or a FlowVersion's
//! settings (§4.7). The policy is pure data; the Scheduler (C6, in
//! `flowright-engine`) is what actually walks attempts and backoff.

use flowright_error::ErrorKind;
use serde::{Deserialize, Serialize};

/// Per-node retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (so `1` means no retry).
    pub max_attempts: u32,
    /// Backoff before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the backoff after each subsequent failure.
    pub backoff_multiplier: f64,
    /// Upper bound on backoff, regardless of how many attempts have elapsed.
    pub max_backoff_ms: u64,
    /// Which error kinds are eligible for retry (§7: `internalError` should
    /// not be listed here -- it is never retryable regardless).
    pub retry_on: Vec<ErrorKind>,
}

impl RetryPolicy {
    /// No retry: a single attempt, failing immediately.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
            max_backoff_ms: 0,
            retry_on: Vec::new(),
        }
    }

    /// Whether `attempt` (1-based, the attempt that just failed) is eligible
    /// for a retry given `kind`.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        kind.is_retryable_kind() && attempt < self.max_attempts && self.retry_on.contains(&kind)
    }

    /// Backoff duration before attempt `next_attempt` (2-based: the attempt
    /// about to be scheduled), in milliseconds, capped at `max_backoff_ms`.
    #[must_use]
    pub fn backoff_ms(&self, next_attempt: u32) -> u64 {
        let exponent = next_attempt.saturating_sub(2);
        #[allow(clippy::cast_precision_loss)]
        let backoff = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let backoff_ms = backoff.round() as u64;
        backoff_ms.min(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 10,
            backoff_multiplier: 2.0,
            max_backoff_ms: 1000,
            retry_on: vec![ErrorKind::RemoteError, ErrorKind::Timeout],
        }
    }

    #[test]
    fn retries_within_bound_for_listed_kind() {
        let p = policy();
        assert!(p.should_retry(1, ErrorKind::RemoteError));
        assert!(p.should_retry(2, ErrorKind::RemoteError));
        assert!(!p.should_retry(3, ErrorKind::RemoteError));
    }

    #[test]
    fn never_retries_unlisted_kind() {
        let p = policy();
        assert!(!p.should_retry(1, ErrorKind::InvalidInput));
    }

    #[test]
    fn never_retries_internal_error_even_if_listed() {
        let mut p = policy();
        p.retry_on.push(ErrorKind::InternalError);
        assert!(!p.should_retry(1, ErrorKind::InternalError));
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let p = policy();
        assert_eq!(p.backoff_ms(2), 10);
        assert_eq!(p.backoff_ms(3), 20);
        assert_eq!(p.backoff_ms(4), 40);
        let capped = RetryPolicy {
            max_backoff_ms: 15,
            ..policy()
        };
        assert_eq!(capped.backoff_ms(4), 15);
    }

    #[test]
    fn none_policy_never_retries() {
        assert!(!RetryPolicy::none().should_retry(1, ErrorKind::RemoteError));
    }
}
