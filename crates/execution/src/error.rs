//! Errors surfaced by the [`crate::ExecutionStore`].

use flowright_core::ExecutionId;
use thiserror::Error;

/// Failures the Execution Store can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No Execution exists with this id.
    #[error("execution `{0}` not found")]
    ExecutionNotFound(ExecutionId),

    /// A caller attempted to move an Execution out of a terminal status.
    ///
    /// §4.8: "after `transition` to a terminal state, subsequent crashes
    /// must not surface a non-terminal status on next read" -- this is the
    /// in-process half of that guarantee: terminal is terminal.
    #[error("execution `{0}` is already terminal and cannot transition further")]
    AlreadyTerminal(ExecutionId),
}
