//! Shared error vocabulary for the flow execution engine.
//!
//! Every crate in the engine surfaces failures as one of the kinds defined
//! here (§7 of the engine design). Keeping the kind enum in one leaf crate
//! lets the retry policy, the error-edge router, and the HTTP API all match
//! on the same vocabulary without circular dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of error a node or the engine itself can surface.
///
/// This is the vocabulary the retry/error policy (§4.7) matches against:
/// `retryOn` lists a subset of these, and only `internalError` is
/// unconditionally non-retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Node config failed schema/validator checks; caught before execution starts.
    InvalidConfig,
    /// An expression referenced a path that must be present but was missing.
    InvalidInput,
    /// The node's wall-clock deadline elapsed.
    Timeout,
    /// Cooperative cancellation was observed.
    Cancelled,
    /// The declared credential type could not be resolved.
    CredentialMissing,
    /// The resolved credential was rejected by the integration.
    CredentialInvalid,
    /// The integration being called returned a non-success response.
    RemoteError,
    /// A bug in the handler itself; never retried automatically.
    InternalError,
}

impl ErrorKind {
    /// Whether this kind is ever eligible for retry.
    ///
    /// `internalError` is excluded unconditionally per §7; every other kind
    /// may still be retried if the node's policy lists it in `retryOn`.
    #[must_use]
    pub fn is_retryable_kind(self) -> bool {
        !matches!(self, Self::InternalError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidConfig => "invalidConfig",
            Self::InvalidInput => "invalidInput",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::CredentialMissing => "credentialMissing",
            Self::CredentialInvalid => "credentialInvalid",
            Self::RemoteError => "remoteError",
            Self::InternalError => "internalError",
        };
        f.write_str(s)
    }
}

/// A structured error carrying both a machine-readable [`ErrorKind`] and a
/// human-readable message.
///
/// Every `NodeRun` and every terminal `Execution` carries one of these
/// (§7: "every NodeRun carries `error.kind` and `error.message`").
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    /// The error's kind, used for retry matching and API surfacing.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl EngineError {
    /// Construct a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for [`ErrorKind::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    /// Shorthand for [`ErrorKind::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Shorthand for [`ErrorKind::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Shorthand for [`ErrorKind::Cancelled`].
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "execution cancelled")
    }

    /// Shorthand for [`ErrorKind::Timeout`].
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_camel_case_kind() {
        let err = EngineError::invalid_config("bad field");
        assert_eq!(err.to_string(), "invalidConfig: bad field");
    }

    #[test]
    fn internal_error_not_retryable() {
        assert!(!ErrorKind::InternalError.is_retryable_kind());
        assert!(ErrorKind::RemoteError.is_retryable_kind());
        assert!(ErrorKind::Timeout.is_retryable_kind());
    }

    #[test]
    fn serde_roundtrip_kind() {
        for kind in [
            ErrorKind::InvalidConfig,
            ErrorKind::InvalidInput,
            ErrorKind::Timeout,
            ErrorKind::Cancelled,
            ErrorKind::CredentialMissing,
            ErrorKind::CredentialInvalid,
            ErrorKind::RemoteError,
            ErrorKind::InternalError,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ErrorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn camel_case_serialization() {
        let json = serde_json::to_string(&ErrorKind::CredentialMissing).unwrap();
        assert_eq!(json, "\"credentialMissing\"");
    }
}
