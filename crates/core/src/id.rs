//! Strongly-typed identifiers for engine entities.
//!
//! Each identifier is a thin `Copy` wrapper around a [`uuid::Uuid`],
//! parameterized only by name (not by a phantom type) so that mixing up
//! a `FlowId` and a `NodeRunId` is a type error rather than a silent bug.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The nil (all-zero) identifier, useful as a sentinel in tests.
            #[must_use]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Borrow the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns `true` if this is the nil identifier.
            #[must_use]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(FlowId);
define_id!(FlowVersionId);
define_id!(UserId);
define_id!(ExecutionId);
define_id!(ResumeToken);

/// Identifier for a [`Node`](crate) within a single [`FlowVersion`] graph.
///
/// Node ids are author-assigned strings unique within their graph (not
/// UUIDs) -- they appear in flow JSON and must stay stable across edits,
/// so they are plain, newtype-wrapped `String`s rather than generated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap a raw node id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_but_same_shape() {
        let flow = FlowId::new();
        let version = FlowVersionId::new();
        assert_ne!(flow.as_uuid(), Uuid::nil());
        assert_ne!(version.as_uuid(), Uuid::nil());
    }

    #[test]
    fn nil_id_round_trips() {
        let id = FlowId::nil();
        assert!(id.is_nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn parse_from_str() {
        let id: ExecutionId = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn parse_invalid_fails() {
        assert!("not-a-uuid".parse::<ExecutionId>().is_err());
    }

    #[test]
    fn node_id_from_str() {
        let a: NodeId = "trigger1".into();
        let b = NodeId::new("trigger1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "trigger1");
    }

    #[test]
    fn serde_roundtrip() {
        let id = FlowVersionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: FlowVersionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
