//! # Flowright Engine
//!
//! The ready-queue DAG scheduler (C6, §4.6) and retry/error policy (C8,
//! §4.7) that together drive one `Execution` from `pending` to a terminal
//! status, dispatching nodes through whatever `NodeHandler`s a `NodeRegistry`
//! supplies.

mod error;
mod graph;
mod retry;
mod scheduler;
mod subflow;

pub use error::EngineError;
pub use graph::GraphIndex;
pub use retry::{decide, FailureDecision};
pub use scheduler::Scheduler;
pub use subflow::SubFlowStarter;
