//! Retry / Error Policy decisions (C8, §4.7). `RetryPolicy` itself is pure
//! data owned by `flowright-workflow`; this module is where the Scheduler
//! asks "what happens after this failure".

use flowright_error::ErrorKind;
use flowright_workflow::RetryPolicy;

/// What the Scheduler should do after a node's attempt fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDecision {
    /// Schedule attempt `next_attempt` after `backoff_ms`.
    Retry { next_attempt: u32, backoff_ms: u64 },
    /// Exhausted retries (or the kind isn't retryable); route through error
    /// edges if any exist, otherwise fail the Execution.
    GiveUp,
}

/// Decide what happens after `attempt` fails with `kind`, per `policy`
/// (§4.7 rule 1: "if attempt < maxAttempts and errorKind ∈ retryOn, schedule
/// a new NodeRun after backoff").
#[must_use]
pub fn decide(policy: &RetryPolicy, attempt: u32, kind: ErrorKind) -> FailureDecision {
    if policy.should_retry(attempt, kind) {
        let next_attempt = attempt + 1;
        FailureDecision::Retry {
            next_attempt,
            backoff_ms: policy.backoff_ms(next_attempt),
        }
    } else {
        FailureDecision::GiveUp
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
            retry_on: vec![ErrorKind::RemoteError],
        }
    }

    #[test]
    fn retries_while_attempts_remain() {
        let decision = decide(&policy(), 1, ErrorKind::RemoteError);
        assert_eq!(
            decision,
            FailureDecision::Retry {
                next_attempt: 2,
                backoff_ms: 10
            }
        );
    }

    #[test]
    fn gives_up_once_exhausted() {
        assert_eq!(decide(&policy(), 3, ErrorKind::RemoteError), FailureDecision::GiveUp);
    }

    #[test]
    fn gives_up_for_unlisted_kind() {
        assert_eq!(decide(&policy(), 1, ErrorKind::InvalidInput), FailureDecision::GiveUp);
    }
}
