//! The `CredentialResolver` port (§4.4) and an in-memory implementation.

use async_trait::async_trait;
use flowright_action::Credentials;
use flowright_core::UserId;

use crate::error::CredentialError;

/// Resolves a `credentialRef` to secret material scoped to a single node
/// invocation. The Scheduler calls this only when a handler's metadata
/// declares a `credentialType`, and drops the returned [`Credentials`] as
/// soon as the invocation returns.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve `credential_ref` for `user_id` into a field map of secret values.
    async fn resolve(
        &self,
        credential_ref: &str,
        user_id: UserId,
    ) -> Result<Credentials, CredentialError>;
}

use std::collections::HashMap;

use dashmap::DashMap;
use flowright_action::SecretValue;

/// An in-memory resolver backed by a flat map, keyed by `(credential_ref, user_id)`.
///
/// Intended for tests and single-node deployments; a production resolver
/// would back this with an encrypted store and per-user access checks, but
/// the interface stays the same either way.
#[derive(Default)]
pub struct InMemoryCredentialResolver {
    store: DashMap<(String, UserId), HashMap<String, String>>,
}

impl InMemoryCredentialResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a credential's field values under `(credential_ref, user_id)`.
    pub fn put(
        &self,
        credential_ref: impl Into<String>,
        user_id: UserId,
        fields: HashMap<String, String>,
    ) {
        self.store.insert((credential_ref.into(), user_id), fields);
    }
}

#[async_trait]
impl CredentialResolver for InMemoryCredentialResolver {
    async fn resolve(
        &self,
        credential_ref: &str,
        user_id: UserId,
    ) -> Result<Credentials, CredentialError> {
        let key = (credential_ref.to_owned(), user_id);
        let fields = self
            .store
            .get(&key)
            .ok_or_else(|| CredentialError::Missing(credential_ref.to_owned()))?;
        Ok(fields
            .iter()
            .map(|(k, v)| (k.clone(), SecretValue::new(v.clone())))
            .collect())
    }
}
