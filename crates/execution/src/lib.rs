//! # Flowright Execution
//!
//! Durable per-execution and per-node-run records (C7, §4.8): the `Execution`
//! and `NodeRun` data model, the `ExecutionStore` trait that is the single
//! writer for a given Execution, and an in-memory implementation honoring
//! the durability and ordering guarantees in §4.8 and §5.

mod error;
mod model;
mod store;

pub use error::StoreError;
pub use model::{Execution, ExecutionStatus, NodeRun, NodeRunStatus, Trigger};
pub use store::{ExecutionStore, InMemoryExecutionStore};
