//! # Flowright Core
//!
//! Shared identifiers and value helpers used by every other crate in the
//! flow execution engine. Kept deliberately tiny: this crate has no
//! dependency on the workflow model, the action contract, or the scheduler,
//! so it can sit underneath all of them without a dependency cycle.

pub mod id;
pub mod value;

pub use id::{ExecutionId, FlowId, FlowVersionId, NodeId, ResumeToken, UserId};
pub use value::{JsonMap, PathSegment, get_path, merge_objects};

/// Common prelude for downstream crates.
pub mod prelude {
    pub use crate::{ExecutionId, FlowId, FlowVersionId, JsonMap, NodeId, ResumeToken, UserId};
}
