//! Runtime context passed to a handler's `execute` (§4.3, §4.4).

use std::collections::HashMap;
use std::fmt;

use flowright_core::{ExecutionId, JsonMap, NodeId};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

/// A single resolved credential value.
///
/// Redacts its contents in `Debug` to keep secrets out of logs. The engine
/// drops every `SecretValue` it holds once the node invocation returns
/// (§4.4: "the material is zeroized before the next node runs").
#[derive(Clone)]
pub struct SecretValue(Zeroizing<String>);

impl SecretValue {
    /// Wrap a resolved secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Access the underlying secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// Resolved credential material for one handler invocation, keyed by the
/// field names the credential resolver returned (§4.4: `map<string, secret-bytes>`).
pub type Credentials = HashMap<String, SecretValue>;

/// Everything a handler needs to execute one node invocation.
///
/// Constructed by the Scheduler immediately before calling `execute`: `input`
/// and `config` have already had `{{ }}` templates interpolated against the
/// execution's scoped object model, so handlers never see raw expressions.
#[non_exhaustive]
pub struct NodeContext {
    /// The Execution this invocation belongs to.
    pub execution_id: ExecutionId,
    /// The node being invoked.
    pub node_id: NodeId,
    /// Merged output of the node's upstream dependencies (empty map for triggers).
    pub input: JsonMap,
    /// The node's config, with every `{{ }}` template already interpolated.
    pub config: JsonMap,
    /// Resolved credentials, present only when the handler declared a `credentialType`.
    pub credentials: Credentials,
    /// Cancellation signal, checked cooperatively by long-running handlers.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    /// Construct a context with no credentials and a fresh cancellation token.
    pub fn new(execution_id: ExecutionId, node_id: NodeId, input: JsonMap, config: JsonMap) -> Self {
        Self {
            execution_id,
            node_id,
            input,
            config,
            credentials: Credentials::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach resolved credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Attach a pre-existing cancellation token (typically a child of the
    /// Execution's own token).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns an error-shaped `bool` indicating whether cancellation has
    /// been requested; handlers should check this in long-running loops.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("execution_id", &self.execution_id)
            .field("node_id", &self.node_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> NodeContext {
        NodeContext::new(
            ExecutionId::new(),
            NodeId::new("http1"),
            json!({}).as_object().unwrap().clone(),
            json!({"url": "https://example.com"}).as_object().unwrap().clone(),
        )
    }

    #[test]
    fn not_cancelled_by_default() {
        assert!(!ctx().is_cancelled());
    }

    #[test]
    fn cancellation_propagates() {
        let token = CancellationToken::new();
        let c = ctx().with_cancellation(token.clone());
        token.cancel();
        assert!(c.is_cancelled());
    }

    #[test]
    fn secret_value_redacts_debug() {
        let s = SecretValue::new("sk-test-123");
        assert_eq!(format!("{s:?}"), "SecretValue(***)");
        assert_eq!(s.expose(), "sk-test-123");
    }

    #[test]
    fn with_credentials_attaches_map() {
        let mut creds = Credentials::new();
        creds.insert("api_key".into(), SecretValue::new("shh"));
        let c = ctx().with_credentials(creds);
        assert_eq!(c.credentials.get("api_key").unwrap().expose(), "shh");
    }

    #[test]
    fn debug_format_does_not_panic() {
        let debug = format!("{:?}", ctx());
        assert!(debug.contains("NodeContext"));
    }
}
