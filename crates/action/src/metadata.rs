//! Static, handler-authored metadata (§4.3: "every handler declares...").

use std::collections::BTreeSet;

use flowright_schema::ConfigSchema;

/// Which polymorphic role a handler fills in the graph (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerCategory {
    /// No inbound edges; produces the Execution's initial input map.
    Trigger,
    /// Consumes upstream outputs, produces one output.
    Transform,
    /// Returns `branchesToFollow` to select a subset of its output handles.
    Branching,
    /// Iterates an array, re-entering the subgraph up to a matching `loopEnd`.
    Loop,
    /// Invokes another FlowVersion, optionally waiting for it to complete.
    SubWorkflow,
}

/// Declared input/output shape, including the handler's output handle set.
///
/// Defaults to a single `"main"` handle; branching handlers declare more
/// (`condition` declares `{"true", "false"}`, `switch` declares
/// `{"case_0".."case_n", "default"}`, `approval` declares
/// `{"approved", "rejected"}`).
#[derive(Debug, Clone)]
pub struct InterfaceDefinition {
    output_handles: BTreeSet<String>,
}

impl InterfaceDefinition {
    /// The default single-output interface every non-branching handler uses.
    #[must_use]
    pub fn single_output() -> Self {
        Self::with_handles(["main"])
    }

    /// An interface declaring an explicit set of output handles.
    pub fn with_handles<I, S>(handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output_handles: handles.into_iter().map(Into::into).collect(),
        }
    }

    /// The handler's declared output handle names.
    #[must_use]
    pub fn output_handles(&self) -> &BTreeSet<String> {
        &self.output_handles
    }

    /// Whether `handle` is one of this handler's declared output handles.
    #[must_use]
    pub fn declares_handle(&self, handle: &str) -> bool {
        self.output_handles.contains(handle)
    }
}

impl Default for InterfaceDefinition {
    fn default() -> Self {
        Self::single_output()
    }
}

/// Static metadata every [`crate::NodeHandler`] implementation declares.
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    /// Unique key identifying this node type in the registry (e.g. `"http.request"`).
    pub node_type: String,
    /// Human-readable display name shown in the editor.
    pub display_name: String,
    /// The polymorphic role this handler fills.
    pub category: HandlerCategory,
    /// Short description of what the handler does.
    pub description: String,
    /// Icon identifier for the editor UI.
    pub icon: String,
    /// The config shape the validator checks before execution.
    pub config_schema: ConfigSchema,
    /// Declared input/output shape and output handle set.
    pub interface: InterfaceDefinition,
    /// Whether this handler may return `Waiting` and resume later.
    pub supports_async: bool,
    /// Credential type this handler requires, if any (§4.4: the scheduler
    /// only calls the resolver when this is present).
    pub credential_type: Option<String>,
}

impl HandlerMetadata {
    /// Construct metadata for a simple synchronous, single-output handler.
    pub fn new(
        node_type: impl Into<String>,
        display_name: impl Into<String>,
        category: HandlerCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            display_name: display_name.into(),
            category,
            description: description.into(),
            icon: String::new(),
            config_schema: ConfigSchema::empty(),
            interface: InterfaceDefinition::single_output(),
            supports_async: false,
            credential_type: None,
        }
    }

    /// Set the icon identifier.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Set the config schema.
    #[must_use]
    pub fn with_config_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    /// Set the interface definition (output handle set).
    #[must_use]
    pub fn with_interface(mut self, interface: InterfaceDefinition) -> Self {
        self.interface = interface;
        self
    }

    /// Mark this handler as supporting the `Waiting` result.
    #[must_use]
    pub fn supports_async(mut self) -> Self {
        self.supports_async = true;
        self
    }

    /// Declare the credential type this handler requires.
    #[must_use]
    pub fn with_credential_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = Some(credential_type.into());
        self
    }
}
