// SPDX-License-Identifier: MIT OR Apache-2.0
//! The document: a container of definitions, implementations and graphs.
//!
//! A document is what the shader generator reads. It is persisted as RON;
//! libraries (such as [`crate::stdlib`]) are merged into material documents
//! with [`Document::import_library`].

use crate::element::{GeomPropDef, Implementation, Node, NodeDef, NodeGraph, Output};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Reference to a renderable element inside a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementRef {
    /// An output, top level or inside a node graph
    Output {
        /// Enclosing node graph, `None` for the document root
        graph: Option<String>,
        /// Output name
        name: String,
    },
    /// A shader or material node, top level or inside a node graph
    Node {
        /// Enclosing node graph, `None` for the document root
        graph: Option<String>,
        /// Node name
        name: String,
    },
}

impl ElementRef {
    /// A top level output
    pub fn output(name: impl Into<String>) -> Self {
        Self::Output { graph: None, name: name.into() }
    }

    /// An output inside a node graph
    pub fn graph_output(graph: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Output { graph: Some(graph.into()), name: name.into() }
    }

    /// A top level node
    pub fn node(name: impl Into<String>) -> Self {
        Self::Node { graph: None, name: name.into() }
    }

    /// Enclosing node graph name
    pub fn graph(&self) -> Option<&str> {
        match self {
            Self::Output { graph, .. } | Self::Node { graph, .. } => graph.as_deref(),
        }
    }

    /// Element name
    pub fn name(&self) -> &str {
        match self {
            Self::Output { name, .. } | Self::Node { name, .. } => name,
        }
    }

    /// Slash separated document path
    pub fn path(&self) -> String {
        match self.graph() {
            Some(graph) => format!("{graph}/{}", self.name()),
            None => self.name().to_string(),
        }
    }
}

/// Implementation element found for a definition and target
#[derive(Debug, Clone, Copy)]
pub enum ImplementationRef<'a> {
    /// A source or structural implementation
    Implementation(&'a Implementation),
    /// A node graph implementation
    NodeGraph(&'a NodeGraph),
}

impl ImplementationRef<'_> {
    /// Name of the implementing element
    pub fn name(&self) -> &str {
        match self {
            Self::Implementation(i) => &i.name,
            Self::NodeGraph(g) => &g.name,
        }
    }
}

/// Node and output scope of the document root or of one node graph
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// Node graph owning the scope, `None` for the root
    pub graph: Option<&'a NodeGraph>,
    /// Nodes in the scope
    pub nodes: &'a IndexMap<String, Node>,
    /// Outputs in the scope
    pub outputs: &'a [Output],
}

impl<'a> Scope<'a> {
    /// Get a node by name
    pub fn node(&self, name: &str) -> Option<&'a Node> {
        self.nodes.get(name)
    }

    /// Get an output by name
    pub fn output(&self, name: &str) -> Option<&'a Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Path prefix for elements in this scope
    pub fn path(&self, name: &str) -> String {
        match self.graph {
            Some(graph) => format!("{}/{name}", graph.name),
            None => name.to_string(),
        }
    }
}

/// A material document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document name
    pub name: String,
    /// Working color space of the document values
    #[serde(default)]
    pub color_space: Option<String>,
    #[serde(default)]
    node_defs: IndexMap<String, NodeDef>,
    #[serde(default)]
    implementations: IndexMap<String, Implementation>,
    #[serde(default)]
    node_graphs: IndexMap<String, NodeGraph>,
    #[serde(default)]
    geom_prop_defs: IndexMap<String, GeomPropDef>,
    #[serde(default)]
    nodes: IndexMap<String, Node>,
    #[serde(default)]
    outputs: Vec<Output>,
}

impl Document {
    /// Create a new empty document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a node definition
    pub fn add_node_def(&mut self, node_def: NodeDef) -> Result<(), DocumentError> {
        insert_unique(&mut self.node_defs, "nodedef", node_def.name.clone(), node_def)
    }

    /// Add an implementation
    pub fn add_implementation(&mut self, implementation: Implementation) -> Result<(), DocumentError> {
        insert_unique(
            &mut self.implementations,
            "implementation",
            implementation.name.clone(),
            implementation,
        )
    }

    /// Add a node graph
    pub fn add_node_graph(&mut self, graph: NodeGraph) -> Result<(), DocumentError> {
        insert_unique(&mut self.node_graphs, "nodegraph", graph.name.clone(), graph)
    }

    /// Add a geometric property definition
    pub fn add_geom_prop_def(&mut self, def: GeomPropDef) -> Result<(), DocumentError> {
        insert_unique(&mut self.geom_prop_defs, "geompropdef", def.name.clone(), def)
    }

    /// Add a top level node
    pub fn add_node(&mut self, node: Node) -> Result<(), DocumentError> {
        insert_unique(&mut self.nodes, "node", node.name.clone(), node)
    }

    /// Add a top level output
    pub fn add_output(&mut self, output: Output) -> Result<(), DocumentError> {
        if self.outputs.iter().any(|o| o.name == output.name) {
            return Err(DocumentError::DuplicateElement {
                kind: "output",
                name: output.name,
            });
        }
        self.outputs.push(output);
        Ok(())
    }

    /// Get a node definition by name
    pub fn node_def(&self, name: &str) -> Option<&NodeDef> {
        self.node_defs.get(name)
    }

    /// Get all node definitions
    pub fn node_defs(&self) -> impl Iterator<Item = &NodeDef> {
        self.node_defs.values()
    }

    /// Get an implementation by name
    pub fn implementation(&self, name: &str) -> Option<&Implementation> {
        self.implementations.get(name)
    }

    /// Get all implementations
    pub fn implementations(&self) -> impl Iterator<Item = &Implementation> {
        self.implementations.values()
    }

    /// Get a node graph by name
    pub fn node_graph(&self, name: &str) -> Option<&NodeGraph> {
        self.node_graphs.get(name)
    }

    /// Get a mutable node graph by name
    pub fn node_graph_mut(&mut self, name: &str) -> Option<&mut NodeGraph> {
        self.node_graphs.get_mut(name)
    }

    /// Get a geometric property definition by name
    pub fn geom_prop_def(&self, name: &str) -> Option<&GeomPropDef> {
        self.geom_prop_defs.get(name)
    }

    /// Get a top level node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Get a mutable top level node by name
    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.get_mut(name)
    }

    /// Top level outputs
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Node scope of the root (`None`) or of a node graph
    pub fn scope(&self, graph: Option<&str>) -> Option<Scope<'_>> {
        match graph {
            None => Some(Scope {
                graph: None,
                nodes: &self.nodes,
                outputs: &self.outputs,
            }),
            Some(name) => self.node_graphs.get(name).map(|g| Scope {
                graph: Some(g),
                nodes: &g.nodes,
                outputs: &g.outputs,
            }),
        }
    }

    /// Find the definition a node instantiates
    ///
    /// An explicit `node_def` wins; otherwise the first definition with the
    /// node's category and output type whose inputs cover the node's inputs.
    pub fn resolve_node_def(&self, node: &Node) -> Option<&NodeDef> {
        if let Some(name) = &node.node_def {
            return self.node_defs.get(name);
        }
        self.node_defs.values().find(|def| {
            def.node == node.category
                && def.output_type() == node.type_name
                && node.inputs.iter().all(|input| {
                    def.input(&input.name)
                        .is_some_and(|port| port.type_name == input.type_name)
                })
        })
    }

    /// Find the implementation of a definition for a target
    ///
    /// Exact target matches are preferred over target independent ones;
    /// a node graph bound to the definition is the last resort.
    pub fn implementation_for(&self, node_def: &str, target: &str) -> Option<ImplementationRef<'_>> {
        let candidates = || self.implementations.values().filter(|i| i.node_def == node_def);
        let found = candidates()
            .find(|i| i.target == target)
            .or_else(|| candidates().find(|i| i.target.is_empty()));
        if let Some(implementation) = found {
            if let Some(graph) = implementation
                .node_graph
                .as_deref()
                .and_then(|name| self.node_graphs.get(name))
            {
                return Some(ImplementationRef::NodeGraph(graph));
            }
            return Some(ImplementationRef::Implementation(implementation));
        }
        self.node_graphs
            .values()
            .find(|g| g.node_def.as_deref() == Some(node_def))
            .map(ImplementationRef::NodeGraph)
    }

    /// Elements a caller can generate shaders for
    ///
    /// Top level outputs, plus top level nodes producing a surface shader or
    /// material that no other node consumes.
    pub fn renderable_elements(&self) -> Vec<ElementRef> {
        let consumed: Vec<&str> = self
            .nodes
            .values()
            .flat_map(|n| n.inputs.iter().filter_map(|i| i.node_name.as_deref()))
            .collect();
        let mut elements: Vec<ElementRef> = self
            .nodes
            .values()
            .filter(|n| matches!(n.type_name.as_str(), "surfaceshader" | "material"))
            .filter(|n| !consumed.contains(&n.name.as_str()))
            .map(|n| ElementRef::node(&n.name))
            .collect();
        elements.extend(self.outputs.iter().map(|o| ElementRef::output(&o.name)));
        elements
    }

    /// Merge the definitions of a library document into this one
    ///
    /// Elements already present by name are kept.
    pub fn import_library(&mut self, library: &Document) {
        for def in library.node_defs.values() {
            self.node_defs.entry(def.name.clone()).or_insert_with(|| def.clone());
        }
        for implementation in library.implementations.values() {
            self.implementations
                .entry(implementation.name.clone())
                .or_insert_with(|| implementation.clone());
        }
        for graph in library.node_graphs.values() {
            self.node_graphs.entry(graph.name.clone()).or_insert_with(|| graph.clone());
        }
        for def in library.geom_prop_defs.values() {
            self.geom_prop_defs.entry(def.name.clone()).or_insert_with(|| def.clone());
        }
        tracing::debug!(
            "Imported library '{}' into '{}' ({} definitions)",
            library.name,
            self.name,
            self.node_defs.len()
        );
    }

    /// Parse a document from RON text
    pub fn from_ron_str(text: &str) -> Result<Self, DocumentError> {
        Ok(ron::from_str(text)?)
    }

    /// Serialize the document to pretty RON text
    pub fn to_ron_string(&self) -> Result<String, DocumentError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load a document from a RON file
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let contents = std::fs::read_to_string(path)?;
        let document = Self::from_ron_str(&contents)?;
        tracing::info!("Loaded document '{}' from {:?}", document.name, path);
        Ok(document)
    }

    /// Save the document to a RON file
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        std::fs::write(path, self.to_ron_string()?)?;
        tracing::info!("Saved document '{}' to {:?}", self.name, path);
        Ok(())
    }
}

fn insert_unique<T>(
    map: &mut IndexMap<String, T>,
    kind: &'static str,
    name: String,
    element: T,
) -> Result<(), DocumentError> {
    if map.contains_key(&name) {
        return Err(DocumentError::DuplicateElement { kind, name });
    }
    map.insert(name, element);
    Ok(())
}

/// Errors raised by document operations
#[derive(Debug, Error)]
pub enum DocumentError {
    /// An element with the same name already exists
    #[error("Duplicate {kind} '{name}'")]
    DuplicateElement {
        /// Element kind
        kind: &'static str,
        /// Element name
        name: String,
    },

    /// Reading or writing the document file failed
    #[error("Document I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The RON text is malformed
    #[error("Failed to parse document: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// The document could not be serialized
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{NodeInput, PortDef};
    use crate::value::Value;

    fn sample() -> Document {
        let mut doc = Document::new("sample");
        doc.add_node_def(
            NodeDef::new("ND_add_float", "add", "float")
                .with_input(PortDef::new("in1", "float"))
                .with_input(PortDef::new("in2", "float")),
        )
        .unwrap();
        doc.add_node_def(
            NodeDef::new("ND_add_color3", "add", "color3")
                .with_input(PortDef::new("in1", "color3"))
                .with_input(PortDef::new("in2", "color3")),
        )
        .unwrap();
        doc.add_implementation(
            Implementation::new("IM_add_float", "ND_add_float", "")
                .with_source_code("{{in1}} + {{in2}}"),
        )
        .unwrap();
        doc.add_implementation(
            Implementation::new("IM_add_float_genglsl", "ND_add_float", "genglsl")
                .with_source_code("{{in1}} + {{in2}}"),
        )
        .unwrap();
        doc
    }

    #[test]
    fn test_duplicate_elements_rejected() {
        let mut doc = sample();
        let result = doc.add_node_def(NodeDef::new("ND_add_float", "add", "float"));
        assert!(matches!(result, Err(DocumentError::DuplicateElement { kind: "nodedef", .. })));
    }

    #[test]
    fn test_resolve_node_def_by_signature() {
        let doc = sample();
        let node = Node::new("a", "add", "color3")
            .with_input(NodeInput::value("in1", Value::Color3([1.0, 0.0, 0.0])));
        assert_eq!(doc.resolve_node_def(&node).unwrap().name, "ND_add_color3");

        let pinned = Node::new("b", "add", "color3").with_node_def("ND_add_float");
        assert_eq!(doc.resolve_node_def(&pinned).unwrap().name, "ND_add_float");
    }

    #[test]
    fn test_implementation_prefers_exact_target() {
        let doc = sample();
        let found = doc.implementation_for("ND_add_float", "genglsl").unwrap();
        assert_eq!(found.name(), "IM_add_float_genglsl");
        let fallback = doc.implementation_for("ND_add_float", "genosl").unwrap();
        assert_eq!(fallback.name(), "IM_add_float");
        assert!(doc.implementation_for("ND_add_color3", "genosl").is_none());
    }

    #[test]
    fn test_renderable_elements() {
        let mut doc = Document::new("materials");
        doc.add_node(Node::new("shader", "surface", "surfaceshader")).unwrap();
        doc.add_node(
            Node::new("material", "surfacematerial", "material")
                .with_input(NodeInput::connected("surfaceshader", "surfaceshader", "shader")),
        )
        .unwrap();
        doc.add_output(Output::new("out", "surfaceshader", "shader")).unwrap();
        assert_eq!(
            doc.renderable_elements(),
            vec![ElementRef::node("material"), ElementRef::output("out")]
        );
    }

    #[test]
    fn test_ron_round_trip() {
        let doc = sample();
        let text = doc.to_ron_string().unwrap();
        let loaded = Document::from_ron_str(&text).unwrap();
        assert_eq!(loaded, doc);
    }
}
