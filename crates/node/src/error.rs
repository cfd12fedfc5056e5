//! Errors surfaced by the node type registry.

use thiserror::Error;

/// Failure registering or looking up a node type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeRegistryError {
    /// `register` was called twice for the same node type key.
    ///
    /// §4.2: "Duplicate registration is a fatal startup error" -- callers
    /// should treat this as unrecoverable and abort startup.
    #[error("node type `{0}` is already registered")]
    AlreadyRegistered(String),

    /// A graph referenced a node type with no registered handler.
    #[error("no handler registered for node type `{0}`")]
    NotFound(String),
}
