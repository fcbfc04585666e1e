// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while generating shaders.

use thiserror::Error;

/// Result alias for shader generation
pub type Result<T, E = ShaderGenError> = std::result::Result<T, E>;

/// Top level shader generation error
#[derive(Debug, Error)]
pub enum ShaderGenError {
    /// The graph is malformed
    #[error(transparent)]
    GraphStructure(#[from] GraphStructureError),

    /// No implementation could be found for a definition
    #[error(transparent)]
    ImplementationResolution(#[from] ImplementationResolutionError),

    /// The target syntax can not express a type or value
    #[error(transparent)]
    SyntaxRegistry(#[from] SyntaxRegistryError),

    /// A library source file could not be read
    #[error("Failed to read source '{path}': {source}")]
    Io {
        /// Path as requested from the resolver
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Light binding failed
    #[error(transparent)]
    LightBinding(#[from] LightBindingError),
}

impl ShaderGenError {
    /// Whether a caller generating several elements may skip this one and continue
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ImplementationResolution(_))
    }
}

/// Structural problems in a shader graph
#[derive(Debug, Error)]
pub enum GraphStructureError {
    /// A node has no resolvable definition
    #[error("Could not find a nodedef for node '{node}' in graph '{graph}'")]
    MissingNodeDef {
        /// Node name
        node: String,
        /// Graph name
        graph: String,
    },

    /// A definition referenced by name does not exist
    #[error("Nodedef '{node_def}' not found for node '{node}'")]
    UnknownNodeDef {
        /// Definition name
        node_def: String,
        /// Node requesting it
        node: String,
    },

    /// Two nodes share a name in one graph
    #[error("Node name '{node}' is not unique in graph '{graph}'")]
    DuplicateNodeName {
        /// Node name
        node: String,
        /// Graph name
        graph: String,
    },

    /// Connected ports have different types
    #[error("Type mismatch connecting {from} ({from_type}) to {to} ({to_type}) in graph '{graph}'")]
    TypeMismatch {
        /// Upstream port
        from: String,
        /// Upstream type
        from_type: String,
        /// Downstream port
        to: String,
        /// Downstream type
        to_type: String,
        /// Graph name
        graph: String,
    },

    /// The graph contains a dependency cycle
    #[error("Graph '{graph}' contains a cycle through nodes: {nodes}")]
    Cycle {
        /// Graph name
        graph: String,
        /// Comma separated names of the unsorted nodes
        nodes: String,
    },

    /// A referenced element does not exist
    #[error("Element '{element}' not found in '{scope}'")]
    ElementNotFound {
        /// Element name
        element: String,
        /// Scope searched
        scope: String,
    },

    /// A port referenced by name does not exist
    #[error("Port '{port}' not found on '{node}'")]
    PortNotFound {
        /// Port name
        port: String,
        /// Node or graph name
        node: String,
    },

    /// Nested compounds exceed the recursion bound
    #[error("Maximum graph depth {depth} exceeded while building '{graph}'")]
    RecursionLimit {
        /// Graph being built
        graph: String,
        /// Depth limit
        depth: usize,
    },

    /// A variable name already exists in a block
    #[error("Variable '{name}' already exists in block '{block}'")]
    DuplicateVariable {
        /// Variable name
        name: String,
        /// Block name
        block: String,
    },

    /// A uniform shares its name with a stage input or output
    #[error("Uniform '{name}' in stage '{stage}' collides with a stage input or output")]
    VariableNameCollision {
        /// Variable name
        name: String,
        /// Stage name
        stage: String,
    },

    /// A node can not be emitted in its current configuration
    #[error("Node '{node}' is invalid: {reason}")]
    InvalidNode {
        /// Node name
        node: String,
        /// What is wrong
        reason: String,
    },
}

/// No implementation exists for a definition on a target
#[derive(Debug, Error)]
#[error("Could not find a matching implementation for nodedef '{node_def}' on target '{target}'{}", node_context(.node))]
pub struct ImplementationResolutionError {
    /// Definition name
    pub node_def: String,
    /// Target name
    pub target: String,
    /// Node that required the definition
    pub node: Option<String>,
}

fn node_context(node: &Option<String>) -> String {
    node.as_ref().map(|n| format!(" (node '{n}')")).unwrap_or_default()
}

/// The target syntax can not express a type or value
#[derive(Debug, Error)]
pub enum SyntaxRegistryError {
    /// The type is not registered for the target
    #[error("Type '{type_name}' has no syntax on target '{target}'")]
    UnmappedType {
        /// Type name
        type_name: String,
        /// Target name
        target: String,
    },

    /// A document type name is unknown
    #[error("Unknown type '{type_name}' on '{element}'")]
    UnknownType {
        /// Type name
        type_name: String,
        /// Element using the type
        element: String,
    },

    /// An enumeration value is not one of the declared names
    #[error("Given value '{value}' is not a valid enum value for input '{input}'.")]
    InvalidEnumValue {
        /// Offending value
        value: String,
        /// Input carrying the value
        input: String,
    },

    /// Swizzle channels can not be applied
    #[error("Invalid channels '{channels}' for swizzle from '{from}' to '{to}'")]
    InvalidChannels {
        /// Channel string
        channels: String,
        /// Source type
        from: String,
        /// Destination type
        to: String,
    },

    /// A value does not fit the declared port type
    #[error("Value of type '{value_type}' can not be written as '{type_name}'")]
    ValueMismatch {
        /// Port type
        type_name: String,
        /// Value type
        value_type: String,
    },

    /// An inline source references an input that does not exist
    #[error("Could not find an input named '{marker}' on node '{node}'")]
    UnknownMarker {
        /// Marker text
        marker: String,
        /// Node name
        node: String,
    },
}

/// Light shader binding failures
#[derive(Debug, Error)]
pub enum LightBindingError {
    /// The light type id is already bound
    #[error("Light type id {type_id} is already bound to '{bound}', unbind all light shaders first")]
    AlreadyBound {
        /// Light type id
        type_id: u32,
        /// Definition currently bound
        bound: String,
    },

    /// The definition does not produce a light shader
    #[error("Nodedef '{node_def}' is not a light shader")]
    NotALight {
        /// Definition name
        node_def: String,
    },

    /// The target has no light binding
    #[error("Target '{target}' does not support light binding")]
    Unsupported {
        /// Target name
        target: String,
    },
}
