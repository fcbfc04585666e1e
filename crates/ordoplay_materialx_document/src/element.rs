// SPDX-License-Identifier: MIT OR Apache-2.0
//! Document elements: node definitions, implementations, nodes and graphs.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the default output on single output nodes
pub const DEFAULT_OUTPUT: &str = "out";

/// Which half of the sphere a BSDF scatters into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BsdfScope {
    /// Reflection only
    R,
    /// Transmission only
    T,
}

/// A typed port on a node definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDef {
    /// Port name
    pub name: String,
    /// Document type name, e.g. `color3`
    pub type_name: String,
    /// Default value
    #[serde(default)]
    pub value: Option<Value>,
    /// Comma separated enumeration names for string inputs
    #[serde(default)]
    pub enum_names: Option<String>,
    /// Geometric property used when the input is left unconnected
    #[serde(default)]
    pub default_geom_prop: Option<String>,
    /// Value can not vary across a surface
    #[serde(default)]
    pub uniform: bool,
    /// Physical unit category, e.g. `distance`
    #[serde(default)]
    pub unit_type: Option<String>,
}

impl PortDef {
    /// Create a new port definition
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: None,
            enum_names: None,
            default_geom_prop: None,
            uniform: false,
            unit_type: None,
        }
    }

    /// Set the default value
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the enumeration names
    pub fn with_enum(mut self, names: impl Into<String>) -> Self {
        self.enum_names = Some(names.into());
        self
    }

    /// Bind a default geometric property
    pub fn with_default_geom_prop(mut self, geom_prop: impl Into<String>) -> Self {
        self.default_geom_prop = Some(geom_prop.into());
        self
    }

    /// Mark the port as uniform
    pub fn uniform(mut self) -> Self {
        self.uniform = true;
        self
    }

    /// Set the unit category
    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = Some(unit_type.into());
        self
    }
}

/// The typed interface that nodes instantiate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Definition name, e.g. `ND_image_color3`
    pub name: String,
    /// Node category, e.g. `image`
    pub node: String,
    /// Node group, e.g. `texture2d`
    #[serde(default)]
    pub node_group: Option<String>,
    /// Inputs in declaration order
    pub inputs: Vec<PortDef>,
    /// Outputs in declaration order
    pub outputs: Vec<PortDef>,
    /// Scattering scope for BSDF definitions
    #[serde(default)]
    pub bsdf: Option<BsdfScope>,
}

impl NodeDef {
    /// Create a definition with a single `out` output of the given type
    pub fn new(name: impl Into<String>, node: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node: node.into(),
            node_group: None,
            inputs: Vec::new(),
            outputs: vec![PortDef::new(DEFAULT_OUTPUT, output_type)],
            bsdf: None,
        }
    }

    /// Set the node group
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.node_group = Some(group.into());
        self
    }

    /// Append an input
    pub fn with_input(mut self, input: PortDef) -> Self {
        self.inputs.push(input);
        self
    }

    /// Replace the outputs
    pub fn with_outputs(mut self, outputs: Vec<PortDef>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the BSDF scope
    pub fn with_bsdf(mut self, scope: BsdfScope) -> Self {
        self.bsdf = Some(scope);
        self
    }

    /// Type of the first output
    pub fn output_type(&self) -> &str {
        self.outputs.first().map_or("", |o| o.type_name.as_str())
    }

    /// Get an input by name
    pub fn input(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

/// A concrete emission strategy for a definition on one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name, e.g. `IM_image_color3_genglsl`
    pub name: String,
    /// Definition this implements
    pub node_def: String,
    /// Target name, empty for target independent implementations
    #[serde(default)]
    pub target: String,
    /// Source file, relative to the library search path
    #[serde(default)]
    pub file: Option<String>,
    /// Function name inside `file`
    #[serde(default)]
    pub function: Option<String>,
    /// Inline source expression with `{{input}}` markers
    #[serde(default)]
    pub source_code: Option<String>,
    /// Node graph implementing the definition
    #[serde(default)]
    pub node_graph: Option<String>,
}

impl Implementation {
    /// Create an implementation with no source attached
    pub fn new(name: impl Into<String>, node_def: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_def: node_def.into(),
            target: target.into(),
            file: None,
            function: None,
            source_code: None,
            node_graph: None,
        }
    }

    /// Attach a source file and function
    pub fn with_file(mut self, file: impl Into<String>, function: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self.function = Some(function.into());
        self
    }

    /// Attach inline source code
    pub fn with_source_code(mut self, source: impl Into<String>) -> Self {
        self.source_code = Some(source.into());
        self
    }
}

/// An input on a document node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInput {
    /// Input name
    pub name: String,
    /// Document type name
    pub type_name: String,
    /// Literal value
    #[serde(default)]
    pub value: Option<Value>,
    /// Upstream node in the same scope
    #[serde(default)]
    pub node_name: Option<String>,
    /// Output on the upstream node, when it has several
    #[serde(default)]
    pub output: Option<String>,
    /// Input on the enclosing graph interface
    #[serde(default)]
    pub interface_name: Option<String>,
    /// Unit the literal value is expressed in
    #[serde(default)]
    pub unit: Option<String>,
}

impl NodeInput {
    /// Create an input holding a literal value
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            type_name: value.type_name().to_string(),
            value: Some(value),
            node_name: None,
            output: None,
            interface_name: None,
            unit: None,
        }
    }

    /// Create an input connected to an upstream node
    pub fn connected(name: impl Into<String>, type_name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: None,
            node_name: Some(node.into()),
            output: None,
            interface_name: None,
            unit: None,
        }
    }

    /// Create an input bound to the enclosing graph interface
    pub fn interface(name: impl Into<String>, type_name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value: None,
            node_name: None,
            output: None,
            interface_name: Some(interface.into()),
            unit: None,
        }
    }

    /// Select a named output on the upstream node
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Set the unit of the literal value
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A node instance in a document or node graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node name, unique within its scope
    pub name: String,
    /// Node category
    pub category: String,
    /// Output type
    pub type_name: String,
    /// Explicit definition name
    #[serde(default)]
    pub node_def: Option<String>,
    /// Inputs that differ from the definition defaults
    #[serde(default)]
    pub inputs: Vec<NodeInput>,
}

impl Node {
    /// Create a new node
    pub fn new(name: impl Into<String>, category: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            type_name: type_name.into(),
            node_def: None,
            inputs: Vec::new(),
        }
    }

    /// Pin the definition by name
    pub fn with_node_def(mut self, node_def: impl Into<String>) -> Self {
        self.node_def = Some(node_def.into());
        self
    }

    /// Append an input
    pub fn with_input(mut self, input: NodeInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Get an input by name
    pub fn input(&self, name: &str) -> Option<&NodeInput> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

/// A graph output, or a top level document output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Output name
    pub name: String,
    /// Document type name
    pub type_name: String,
    /// Node feeding the output
    #[serde(default)]
    pub node_name: Option<String>,
    /// Named output on the feeding node
    #[serde(default)]
    pub output: Option<String>,
    /// Literal value when unconnected
    #[serde(default)]
    pub value: Option<Value>,
}

impl Output {
    /// Create an output fed by a node
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            node_name: Some(node.into()),
            output: None,
            value: None,
        }
    }
}

/// A graph of nodes, optionally implementing a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeGraph {
    /// Graph name
    pub name: String,
    /// Definition implemented by this graph
    #[serde(default)]
    pub node_def: Option<String>,
    /// Interface inputs, for graphs without a definition
    #[serde(default)]
    pub inputs: Vec<PortDef>,
    /// Nodes by name
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
    /// Graph outputs
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl NodeGraph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_def: None,
            inputs: Vec::new(),
            nodes: IndexMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Bind the graph to a definition
    pub fn with_node_def(mut self, node_def: impl Into<String>) -> Self {
        self.node_def = Some(node_def.into());
        self
    }

    /// Add a node, replacing any node with the same name
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.name.clone(), node);
        self
    }

    /// Add an output
    pub fn with_output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Get an output by name
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// A named geometric property bound to a geometry node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeomPropDef {
    /// Property name, e.g. `Nworld`
    pub name: String,
    /// Geometry node category, e.g. `normal`
    pub geom_node: String,
    /// Coordinate space for position, normal and tangent nodes
    #[serde(default)]
    pub space: Option<String>,
    /// Set index for texture coordinate and color nodes
    #[serde(default)]
    pub index: Option<i32>,
}

impl GeomPropDef {
    /// Create a property definition
    pub fn new(name: impl Into<String>, geom_node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geom_node: geom_node.into(),
            space: None,
            index: None,
        }
    }

    /// Set the coordinate space
    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Set the set index
    pub fn with_index(mut self, index: i32) -> Self {
        self.index = Some(index);
        self
    }
}
