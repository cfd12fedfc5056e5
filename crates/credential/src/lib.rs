//! # Flowright Credential
//!
//! The credential resolution port (§4.4). The Scheduler calls `resolve`
//! only when a handler's metadata declares a `credentialType`, and drops
//! the resulting [`flowright_action::Credentials`] as soon as the node
//! invocation returns -- no decrypted material outlives a single node run.

mod error;
mod resolver;

pub use error::CredentialError;
pub use resolver::{CredentialResolver, InMemoryCredentialResolver};
