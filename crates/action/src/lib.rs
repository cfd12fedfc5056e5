//! # Flowright Action
//!
//! The uniform contract every node type implements (§4.3). A `NodeHandler`
//! declares its type, category, config schema, and output handle set, then
//! executes to a [`NodeExecutionResult`] -- `Success`, `Waiting`, or
//! `Failure`. The Scheduler (in `flowright-engine`) is the only caller of
//! `execute`; handlers never invoke each other directly.

mod context;
mod handler;
mod metadata;
mod result;

pub use context::{Credentials, NodeContext, SecretValue};
pub use handler::NodeHandler;
pub use metadata::{HandlerCategory, HandlerMetadata, InterfaceDefinition};
pub use result::{NodeExecutionResult, WaitingOn};

/// Commonly imported items.
pub mod prelude {
    pub use crate::{
        Credentials, HandlerCategory, HandlerMetadata, InterfaceDefinition, NodeContext,
        NodeExecutionResult, NodeHandler, SecretValue, WaitingOn,
    };
}
