//! # Flowright Workflow
//!
//! The canonical Flow/FlowVersion graph model (§3) and its validator (C5,
//! §4.5). This crate has no knowledge of execution -- it only describes
//! what a valid graph looks like and lets the engine ask "is this
//! FlowVersion safe to run?" before any node executes.

mod error;
mod model;
mod retry;
mod store;
mod validator;

pub use error::{Diagnostic, ValidationError};
pub use model::{
    Definition, Edge, EdgeType, Flow, FlowSettings, FlowVersion, FlowVersionStatus, Node,
    PinnedData,
};
pub use retry::RetryPolicy;
pub use store::{FlowVersionStore, InMemoryFlowVersionStore};
pub use validator::{GraphValidator, ValidationReport, LOOP_END_NODE_TYPE};
