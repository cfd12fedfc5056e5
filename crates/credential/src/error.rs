//! Errors surfaced while resolving a credential.

use thiserror::Error;

/// Failure resolving a `credentialRef` to usable secret material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No credential is stored under this reference for this user.
    ///
    /// The Scheduler surfaces this as `ErrorKind::CredentialMissing` (§7).
    #[error("no credential stored for ref `{0}`")]
    Missing(String),

    /// The stored credential exists but was rejected (e.g. malformed, expired).
    ///
    /// The Scheduler surfaces this as `ErrorKind::CredentialInvalid` (§7).
    #[error("credential `{0}` is invalid: {1}")]
    Invalid(String, String),
}
