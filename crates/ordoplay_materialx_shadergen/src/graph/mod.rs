// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader graph model.
//!
//! A [`ShaderGraph`] owns its nodes in an arena addressed by [`NodeHandle`].
//! Connections are stored on both ends as handle and port index pairs:
//! inputs know their [`Upstream`], outputs know every [`Downstream`].
//!
//! The graph interface is expressed with sockets. Input sockets behave like
//! node outputs feeding the graph, output sockets behave like node inputs
//! collecting its results.

mod build;
mod node;
mod optimize;

pub use build::MAX_GRAPH_DEPTH;
pub use node::{
    Classification, Downstream, PortFlags, ShaderInput, ShaderNode, ShaderOutput, ShaderPort, Upstream,
};

use crate::error::{GraphStructureError, Result};
use crate::syntax::Syntax;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// Index of a node in its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(usize);

impl NodeHandle {
    /// Wrap an arena index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena index
    pub fn index(self) -> usize {
        self.0
    }
}

/// An acyclic graph of shader nodes with an input and output interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderGraph {
    name: String,
    node_def: Option<String>,
    classification: Option<Classification>,
    input_sockets: Vec<ShaderOutput>,
    output_sockets: Vec<ShaderInput>,
    nodes: Vec<ShaderNode>,
    node_index: IndexMap<String, NodeHandle>,
    order: Vec<NodeHandle>,
}

impl ShaderGraph {
    /// Create an empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Graph name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition implemented by this graph, for compounds
    pub fn node_def(&self) -> Option<&str> {
        self.node_def.as_deref()
    }

    pub(crate) fn set_node_def(&mut self, node_def: impl Into<String>) {
        self.node_def = Some(node_def.into());
    }

    /// Classification of the node feeding the first output socket
    pub fn classification(&self) -> Classification {
        if let Some(class) = self.classification {
            return class;
        }
        match self.output_sockets.first().and_then(|s| s.connection) {
            Some(Upstream::Node { node, .. }) => self.node(node).classification,
            _ => Classification::TEXTURE,
        }
    }

    /// Whether the graph classification has every bit of `class`
    pub fn has_classification(&self, class: Classification) -> bool {
        self.classification().contains(class)
    }

    // ========================================================================
    // Sockets
    // ========================================================================

    /// Add an input socket, returning its index
    pub fn add_input_socket(&mut self, port: ShaderPort) -> usize {
        self.input_sockets.push(ShaderOutput::new(port));
        self.input_sockets.len() - 1
    }

    /// Add an output socket, returning its index
    pub fn add_output_socket(&mut self, port: ShaderPort) -> usize {
        self.output_sockets.push(ShaderInput::new(port));
        self.output_sockets.len() - 1
    }

    /// Input sockets in creation order
    pub fn input_sockets(&self) -> &[ShaderOutput] {
        &self.input_sockets
    }

    /// Output sockets in creation order
    pub fn output_sockets(&self) -> &[ShaderInput] {
        &self.output_sockets
    }

    /// Input socket by index
    pub fn input_socket_mut(&mut self, index: usize) -> Option<&mut ShaderOutput> {
        self.input_sockets.get_mut(index)
    }

    /// Output socket by index
    pub fn output_socket_mut(&mut self, index: usize) -> Option<&mut ShaderInput> {
        self.output_sockets.get_mut(index)
    }

    /// Index of an input socket by name
    pub fn input_socket(&self, name: &str) -> Option<usize> {
        self.input_sockets.iter().position(|s| s.port.name == name)
    }

    /// Index of an output socket by name
    pub fn output_socket(&self, name: &str) -> Option<usize> {
        self.output_sockets.iter().position(|s| s.port.name == name)
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Add a node, failing if its name is taken
    pub fn add_node(&mut self, node: ShaderNode) -> Result<NodeHandle> {
        if self.node_index.contains_key(&node.name) {
            return Err(GraphStructureError::DuplicateNodeName {
                node: node.name,
                graph: self.name.clone(),
            }
            .into());
        }
        let handle = NodeHandle(self.nodes.len());
        self.node_index.insert(node.name.clone(), handle);
        self.order.push(handle);
        self.nodes.push(node);
        Ok(handle)
    }

    /// Node by handle
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this graph.
    pub fn node(&self, handle: NodeHandle) -> &ShaderNode {
        &self.nodes[handle.0]
    }

    /// Node by handle
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this graph.
    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut ShaderNode {
        &mut self.nodes[handle.0]
    }

    /// Node handle by name
    pub fn node_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.node_index.get(name).copied()
    }

    /// Live node handles, in topological order once the graph is finalized
    pub fn handles(&self) -> &[NodeHandle] {
        &self.order
    }

    /// Live nodes, in topological order once the graph is finalized
    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &ShaderNode)> {
        self.order.iter().map(move |h| (*h, &self.nodes[h.0]))
    }

    /// Number of live nodes
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Disconnect a node and drop it from the graph
    pub fn remove_node(&mut self, handle: NodeHandle) {
        self.disconnect_node(handle);
        let name = self.nodes[handle.0].name.clone();
        self.node_index.shift_remove(&name);
        self.order.retain(|h| *h != handle);
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Output or input socket feeding downstream
    pub fn upstream(&self, from: Upstream) -> &ShaderOutput {
        match from {
            Upstream::Node { node, output } => &self.nodes[node.0].outputs[output],
            Upstream::Socket(index) => &self.input_sockets[index],
        }
    }

    fn upstream_mut(&mut self, from: Upstream) -> &mut ShaderOutput {
        match from {
            Upstream::Node { node, output } => &mut self.nodes[node.0].outputs[output],
            Upstream::Socket(index) => &mut self.input_sockets[index],
        }
    }

    /// Input or output socket receiving a value
    pub fn downstream(&self, to: Downstream) -> &ShaderInput {
        match to {
            Downstream::Node { node, input } => &self.nodes[node.0].inputs[input],
            Downstream::Socket(index) => &self.output_sockets[index],
        }
    }

    /// Input or output socket receiving a value
    pub fn downstream_mut(&mut self, to: Downstream) -> &mut ShaderInput {
        match to {
            Downstream::Node { node, input } => &mut self.nodes[node.0].inputs[input],
            Downstream::Socket(index) => &mut self.output_sockets[index],
        }
    }

    /// Connect an upstream output to a downstream input
    ///
    /// An existing connection on `to` is replaced. Both ends must have the
    /// same type.
    pub fn connect(&mut self, from: Upstream, to: Downstream) -> Result<()> {
        let from_port = &self.upstream(from).port;
        let to_port = &self.downstream(to).port;
        if from_port.ty != to_port.ty {
            return Err(GraphStructureError::TypeMismatch {
                from: self.describe_upstream(from),
                from_type: from_port.ty.name().to_string(),
                to: self.describe_downstream(to),
                to_type: to_port.ty.name().to_string(),
                graph: self.name.clone(),
            }
            .into());
        }
        self.disconnect(to);
        self.downstream_mut(to).connection = Some(from);
        self.upstream_mut(from).connections.push(to);
        Ok(())
    }

    /// Break the connection feeding `to`, if any
    pub fn disconnect(&mut self, to: Downstream) {
        if let Some(from) = self.downstream_mut(to).connection.take() {
            self.upstream_mut(from).connections.retain(|d| *d != to);
        }
    }

    /// Break every connection of a node
    pub fn disconnect_node(&mut self, handle: NodeHandle) {
        for input in 0..self.nodes[handle.0].inputs.len() {
            self.disconnect(Downstream::Node { node: handle, input });
        }
        for output in 0..self.nodes[handle.0].outputs.len() {
            let connections = std::mem::take(&mut self.nodes[handle.0].outputs[output].connections);
            for to in connections {
                self.downstream_mut(to).connection = None;
            }
        }
    }

    fn describe_upstream(&self, from: Upstream) -> String {
        match from {
            Upstream::Node { node, output } => {
                let node = &self.nodes[node.0];
                format!("{}.{}", node.name, node.outputs[output].port.name)
            }
            Upstream::Socket(index) => format!("{}.{}", self.name, self.input_sockets[index].port.name),
        }
    }

    fn describe_downstream(&self, to: Downstream) -> String {
        match to {
            Downstream::Node { node, input } => {
                let node = &self.nodes[node.0];
                format!("{}.{}", node.name, node.inputs[input].port.name)
            }
            Downstream::Socket(index) => format!("{}.{}", self.name, self.output_sockets[index].port.name),
        }
    }

    /// Nodes reachable upstream from the output sockets, in node order
    pub fn reachable_nodes(&self) -> Vec<NodeHandle> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeHandle> = self
            .output_sockets
            .iter()
            .filter_map(|s| match s.connection {
                Some(Upstream::Node { node, .. }) => Some(node),
                _ => None,
            })
            .collect();
        while let Some(handle) = stack.pop() {
            if !visited.insert(handle) {
                continue;
            }
            stack.extend(self.upstream_nodes(handle));
        }
        self.order.iter().copied().filter(|h| visited.contains(h)).collect()
    }

    /// Nodes directly connected to the inputs of `handle`
    pub fn upstream_nodes(&self, handle: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        self.nodes[handle.0].inputs.iter().filter_map(|i| match i.connection {
            Some(Upstream::Node { node, .. }) => Some(node),
            _ => None,
        })
    }

    // ========================================================================
    // Finalization
    // ========================================================================

    /// Sort the nodes so every node follows its upstream dependencies
    ///
    /// Nodes that can not be sorted form a cycle, which is an error.
    pub fn topological_sort(&mut self) -> Result<()> {
        let mut in_degree: IndexMap<NodeHandle, usize> = self
            .order
            .iter()
            .map(|h| (*h, self.upstream_nodes(*h).count()))
            .collect();
        let mut queue: VecDeque<NodeHandle> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(h, _)| *h)
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(handle) = queue.pop_front() {
            sorted.push(handle);
            for output in &self.nodes[handle.0].outputs {
                for to in &output.connections {
                    if let Downstream::Node { node, .. } = to {
                        if let Some(degree) = in_degree.get_mut(node) {
                            *degree -= 1;
                            if *degree == 0 {
                                queue.push_back(*node);
                            }
                        }
                    }
                }
            }
        }

        if sorted.len() != self.order.len() {
            let nodes = self
                .order
                .iter()
                .filter(|h| !sorted.contains(h))
                .map(|h| self.nodes[h.0].name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(GraphStructureError::Cycle {
                graph: self.name.clone(),
                nodes,
            }
            .into());
        }
        self.order = sorted;
        Ok(())
    }

    /// Assign unique variable names to sockets and node outputs
    pub fn set_variable_names(&mut self, syntax: &Syntax) {
        let mut identifiers = syntax.identifier_map();
        for socket in &mut self.input_sockets {
            socket.port.variable = syntax.make_identifier(&socket.port.name, &mut identifiers);
        }
        for socket in &mut self.output_sockets {
            socket.port.variable = syntax.make_identifier(&socket.port.name, &mut identifiers);
        }
        for handle in &self.order {
            let node = &mut self.nodes[handle.0];
            for output in &mut node.outputs {
                let name = format!("{}_{}", node.name, output.port.name);
                output.port.variable = syntax.make_identifier(&name, &mut identifiers);
            }
            for input in &mut node.inputs {
                input.port.variable = syntax.make_valid_name(&format!("{}_{}", node.name, input.port.name));
            }
        }
    }

    /// Freeze the classification once the output connection is final
    pub(crate) fn freeze_classification(&mut self) {
        self.classification = None;
        self.classification = Some(self.classification());
    }

    /// Closure nodes upstream of each shader node
    pub fn used_closures(&self) -> IndexMap<NodeHandle, Vec<NodeHandle>> {
        let mut used = IndexMap::new();
        for (handle, node) in self.nodes() {
            if !node.has_classification(Classification::SHADER) {
                continue;
            }
            let mut closures = Vec::new();
            let mut visited = HashSet::new();
            let mut stack: Vec<NodeHandle> = self.upstream_nodes(handle).collect();
            while let Some(up) = stack.pop() {
                if !visited.insert(up) {
                    continue;
                }
                if self.node(up).has_classification(Classification::CLOSURE) {
                    closures.push(up);
                }
                stack.extend(self.upstream_nodes(up));
            }
            closures.sort();
            used.insert(handle, closures);
        }
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TargetKind;
    use crate::types::TypeDesc;

    fn float_node(name: &str) -> ShaderNode {
        let mut node = ShaderNode::new(name, "ND_add_float");
        node.add_input("in1", TypeDesc::Float);
        node.add_input("in2", TypeDesc::Float);
        node.add_output("out", TypeDesc::Float);
        node
    }

    fn link(graph: &mut ShaderGraph, from: NodeHandle, to: NodeHandle, input: usize) {
        graph
            .connect(Upstream::Node { node: from, output: 0 }, Downstream::Node { node: to, input })
            .unwrap();
    }

    #[test]
    fn test_duplicate_node_name() {
        let mut graph = ShaderGraph::new("g");
        graph.add_node(float_node("a")).unwrap();
        let err = graph.add_node(float_node("a")).unwrap_err();
        assert!(matches!(
            err,
            crate::ShaderGenError::GraphStructure(GraphStructureError::DuplicateNodeName { .. })
        ));
    }

    #[test]
    fn test_topological_order() {
        let mut graph = ShaderGraph::new("g");
        let c = graph.add_node(float_node("c")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let a = graph.add_node(float_node("a")).unwrap();
        link(&mut graph, a, b, 0);
        link(&mut graph, b, c, 0);
        link(&mut graph, a, c, 1);
        graph.topological_sort().unwrap();

        let position = |h: NodeHandle| graph.handles().iter().position(|x| *x == h).unwrap();
        for (handle, _) in graph.nodes() {
            for up in graph.upstream_nodes(handle) {
                assert!(position(up) < position(handle));
            }
        }
        assert_eq!(graph.handles(), &[a, b, c]);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut graph = ShaderGraph::new("g");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let c = graph.add_node(float_node("c")).unwrap();
        link(&mut graph, a, b, 0);
        link(&mut graph, b, a, 0);
        link(&mut graph, b, c, 0);
        let err = graph.topological_sort().unwrap_err();
        match err {
            crate::ShaderGenError::GraphStructure(GraphStructureError::Cycle { nodes, .. }) => {
                assert_eq!(nodes, "a, b, c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_type_mismatch() {
        let mut graph = ShaderGraph::new("g");
        let a = graph.add_node(float_node("a")).unwrap();
        let mut color = ShaderNode::new("col", "ND_constant_color3");
        color.add_input("value", TypeDesc::Color3);
        color.add_output("out", TypeDesc::Color3);
        let col = graph.add_node(color).unwrap();
        let result = graph.connect(Upstream::Node { node: col, output: 0 }, Downstream::Node { node: a, input: 0 });
        assert!(result.is_err());
    }

    #[test]
    fn test_reconnect_and_remove() {
        let mut graph = ShaderGraph::new("g");
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let c = graph.add_node(float_node("c")).unwrap();
        link(&mut graph, a, c, 0);
        link(&mut graph, b, c, 0);
        assert!(graph.node(a).outputs[0].connections.is_empty());
        assert_eq!(graph.node(b).outputs[0].connections.len(), 1);

        graph.remove_node(b);
        assert_eq!(graph.node(c).inputs[0].connection, None);
        assert_eq!(graph.node_by_name("b"), None);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_variable_names() {
        let syntax = Syntax::for_target(TargetKind::Glsl);
        let mut graph = ShaderGraph::new("g");
        graph.add_input_socket(ShaderPort::new("base color", TypeDesc::Color3));
        graph.add_output_socket(ShaderPort::new("out", TypeDesc::Color3));
        let a = graph.add_node(float_node("a")).unwrap();
        graph.set_variable_names(&syntax);
        assert_eq!(graph.input_sockets()[0].port.variable, "base_color");
        assert_eq!(graph.output_sockets()[0].port.variable, "out1");
        assert_eq!(graph.node(a).outputs[0].port.variable, "a_out");
    }

    #[test]
    fn test_reachable_nodes() {
        let mut graph = ShaderGraph::new("g");
        graph.add_output_socket(ShaderPort::new("out", TypeDesc::Float));
        let a = graph.add_node(float_node("a")).unwrap();
        let b = graph.add_node(float_node("b")).unwrap();
        let dangling = graph.add_node(float_node("dangling")).unwrap();
        link(&mut graph, a, b, 0);
        link(&mut graph, a, dangling, 0);
        graph
            .connect(Upstream::Node { node: b, output: 0 }, Downstream::Socket(0))
            .unwrap();
        assert_eq!(graph.reachable_nodes(), vec![a, b]);
    }
}
