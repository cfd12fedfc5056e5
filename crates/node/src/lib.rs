//! # Flowright Node
//!
//! The process-wide registry mapping `node type -> NodeHandler` (§4.2).
//! Populated once at startup by the composition root and handed to the
//! Scheduler and Graph Validator as a read-only `Arc`.

mod error;
mod registry;

pub use error::NodeRegistryError;
pub use registry::{HandlerSummary, NodeRegistry};
