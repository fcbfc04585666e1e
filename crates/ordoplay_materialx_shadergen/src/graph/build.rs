// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph construction from document elements.
//!
//! Only nodes upstream of the requested element are instantiated. Inputs
//! left unconnected that name a default geometric property are fed by one
//! shared `geomprop_<name>` node per graph.

use super::optimize::GraphKind;
use super::{Downstream, NodeHandle, ShaderGraph, ShaderPort, Upstream};
use crate::context::GenContext;
use crate::error::{GraphStructureError, Result, ShaderGenError, SyntaxRegistryError};
use crate::generator::{port_not_found, ShaderGenerator};
use crate::impls::instantiate;
use crate::options::{DistanceUnit, GenOptions};
use crate::types::TypeDesc;
use ordoplay_materialx_document::{Document, ElementRef, Node, NodeDef, NodeGraph, NodeInput, Output, PortDef, Scope, Value};

/// Maximum nesting of compound graphs
pub const MAX_GRAPH_DEPTH: usize = 64;

const DISTANCE: &str = "distance";

fn element_not_found(element: &str, scope: &str) -> ShaderGenError {
    GraphStructureError::ElementNotFound {
        element: element.to_string(),
        scope: scope.to_string(),
    }
    .into()
}

fn type_of(type_name: &str, element: &str) -> Result<TypeDesc> {
    TypeDesc::from_name(type_name).ok_or_else(|| {
        SyntaxRegistryError::UnknownType {
            type_name: type_name.to_string(),
            element: element.to_string(),
        }
        .into()
    })
}

/// Scale a literal into the target distance unit
fn convert_units(options: &GenOptions, port: &ShaderPort, input: &NodeInput, value: &Value) -> Value {
    let (Some(target), Some(unit)) = (options.target_distance_unit, input.unit.as_deref()) else {
        return value.clone();
    };
    if port.unit_type.as_deref() != Some(DISTANCE) {
        return value.clone();
    }
    match DistanceUnit::from_name(unit) {
        Some(from) => {
            let factor = from.conversion_to(target);
            tracing::debug!("Scaling '{}' from {} by {}", port.name, unit, factor);
            value.scaled(factor)
        }
        None => {
            tracing::warn!("Unknown distance unit '{}' on '{}', value passed through", unit, port.name);
            value.clone()
        }
    }
}

/// Builds the nodes of one document scope into a graph
struct Builder<'d> {
    generator: &'d ShaderGenerator,
    doc: &'d Document,
    scope: Scope<'d>,
}

impl<'d> Builder<'d> {
    fn scope_name(&self) -> &str {
        self.scope.graph.map_or(self.doc.name.as_str(), |g| g.name.as_str())
    }

    fn scope_node(&self, name: &str) -> Result<&'d Node> {
        self.scope
            .node(name)
            .ok_or_else(|| element_not_found(name, self.scope_name()))
    }

    fn resolve_node_def(&self, graph: &ShaderGraph, node: &Node) -> Result<&'d NodeDef> {
        self.doc.resolve_node_def(node).ok_or_else(|| {
            match &node.node_def {
                Some(node_def) => GraphStructureError::UnknownNodeDef {
                    node_def: node_def.clone(),
                    node: node.name.clone(),
                },
                None => GraphStructureError::MissingNodeDef {
                    node: node.name.clone(),
                    graph: graph.name().to_string(),
                },
            }
            .into()
        })
    }

    /// Input socket for a definition or graph interface port
    fn add_input_socket(&self, graph: &mut ShaderGraph, def: &PortDef) -> Result<usize> {
        let mut port = ShaderPort::from_port_def(def, self.generator.syntax())?;
        port.path = self.scope.path(&def.name);
        Ok(graph.add_input_socket(port))
    }

    fn output_index(graph: &ShaderGraph, node: NodeHandle, output: Option<&str>) -> Result<usize> {
        match output {
            None => Ok(0),
            Some(name) => {
                let shader_node = graph.node(node);
                shader_node
                    .output_index(name)
                    .ok_or_else(|| port_not_found(name, &shader_node.name))
            }
        }
    }

    /// Output socket fed by a document output
    fn add_output(&self, context: &mut GenContext, graph: &mut ShaderGraph, output: &Output) -> Result<()> {
        let mut port = ShaderPort::new(&output.name, type_of(&output.type_name, &output.name)?);
        port.path = self.scope.path(&output.name);
        let index = graph.add_output_socket(port);
        match (&output.node_name, &output.value) {
            (Some(node_name), _) => {
                let up = self.build_node(context, graph, node_name)?;
                let from = Upstream::Node {
                    node: up,
                    output: Self::output_index(graph, up, output.output.as_deref())?,
                };
                graph.connect(from, Downstream::Socket(index))
            }
            (None, Some(value)) => {
                if let Some(socket) = graph.output_socket_mut(index) {
                    socket.port.set_value(value.clone(), self.generator.syntax())?;
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    /// Instantiate a document node and everything upstream of it
    ///
    /// Nodes are created depth first from an explicit work list, then wired
    /// upstream first, so long chains never recurse.
    fn build_node(&self, context: &mut GenContext, graph: &mut ShaderGraph, name: &str) -> Result<NodeHandle> {
        if let Some(handle) = graph.node_by_name(name) {
            return Ok(handle);
        }
        let mut created: Vec<(NodeHandle, &'d Node)> = Vec::new();
        let mut pending = vec![name];
        while let Some(next) = pending.pop() {
            if graph.node_by_name(next).is_some() {
                continue;
            }
            let node = self.scope_node(next)?;
            let handle = self.add_document_node(context, graph, node)?;
            created.push((handle, node));
            pending.extend(node.inputs.iter().rev().filter_map(|i| i.node_name.as_deref()));
        }
        for (handle, node) in created.iter().rev() {
            self.connect_inputs(context, graph, *handle, node)?;
        }
        graph
            .node_by_name(name)
            .ok_or_else(|| element_not_found(name, self.scope_name()))
    }

    /// Shader node of a document node, with its literal values set
    fn add_document_node(&self, context: &mut GenContext, graph: &mut ShaderGraph, node: &Node) -> Result<NodeHandle> {
        let def = self.resolve_node_def(graph, node)?;
        let syntax = self.generator.syntax();

        let mut shader_node = instantiate(self.generator, context, self.doc, &node.name, def)?;
        for input in &mut shader_node.inputs {
            input.port.path = self.scope.path(&format!("{}/{}", node.name, input.port.name));
        }
        for input in &node.inputs {
            let Some(value) = &input.value else { continue };
            let port = &mut shader_node
                .input_mut(&input.name)
                .ok_or_else(|| port_not_found(&input.name, &node.name))?
                .port;
            let value = convert_units(context.options(), port, input, value);
            port.set_value(value, syntax)?;
        }
        graph.add_node(shader_node)
    }

    /// Wire the inputs of an instantiated node to its upstream nodes and sockets
    fn connect_inputs(
        &self,
        context: &mut GenContext,
        graph: &mut ShaderGraph,
        handle: NodeHandle,
        node: &Node,
    ) -> Result<()> {
        for input in &node.inputs {
            let index = graph
                .node(handle)
                .input_index(&input.name)
                .ok_or_else(|| port_not_found(&input.name, &node.name))?;
            let to = Downstream::Node { node: handle, input: index };
            if let Some(up_name) = &input.node_name {
                let up = graph
                    .node_by_name(up_name)
                    .ok_or_else(|| element_not_found(up_name, self.scope_name()))?;
                let output = Self::output_index(graph, up, input.output.as_deref())?;
                graph.connect(Upstream::Node { node: up, output }, to)?;
            } else if let Some(interface) = &input.interface_name {
                let socket = graph
                    .input_socket(interface)
                    .ok_or_else(|| element_not_found(interface, graph.name()))?;
                graph.connect(Upstream::Socket(socket), to)?;
            }
        }
        self.add_geom_props(context, graph, handle, node)
    }

    /// Feed unconnected inputs from their default geometric property
    fn add_geom_props(
        &self,
        context: &mut GenContext,
        graph: &mut ShaderGraph,
        handle: NodeHandle,
        node: &Node,
    ) -> Result<()> {
        let pending: Vec<(usize, String, TypeDesc)> = graph
            .node(handle)
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, i)| i.connection.is_none() && node.input(&i.port.name).is_none())
            .filter_map(|(index, i)| i.port.geom_prop.clone().map(|g| (index, g, i.port.ty)))
            .collect();
        for (input, geom_prop, ty) in pending {
            let geom = self.geom_prop_node(context, graph, &geom_prop, ty)?;
            graph.connect(Upstream::Node { node: geom, output: 0 }, Downstream::Node { node: handle, input })?;
        }
        Ok(())
    }

    fn geom_prop_node(
        &self,
        context: &mut GenContext,
        graph: &mut ShaderGraph,
        geom_prop: &str,
        ty: TypeDesc,
    ) -> Result<NodeHandle> {
        let name = format!("geomprop_{geom_prop}");
        if let Some(handle) = graph.node_by_name(&name) {
            return Ok(handle);
        }
        let prop = self
            .doc
            .geom_prop_def(geom_prop)
            .ok_or_else(|| element_not_found(geom_prop, &self.doc.name))?;
        let def_name = format!("ND_{}_{}", prop.geom_node, ty.name());
        let def = self.doc.node_def(&def_name).ok_or_else(|| GraphStructureError::UnknownNodeDef {
            node_def: def_name.clone(),
            node: name.clone(),
        })?;
        let mut node = instantiate(self.generator, context, self.doc, &name, def)?;
        if let (Some(space), Some(input)) = (&prop.space, node.input_mut("space")) {
            input.port.set_value(Value::String(space.clone()), self.generator.syntax())?;
        }
        if let (Some(index), Some(input)) = (prop.index, node.input_mut("index")) {
            input.port.value = Some(Value::Integer(index));
        }
        tracing::debug!("Inserted {} for default geometric property {}", name, geom_prop);
        graph.add_node(node)
    }
}

impl ShaderGraph {
    /// Build and finalize the graph of a renderable element
    pub fn from_element(
        generator: &ShaderGenerator,
        context: &mut GenContext,
        doc: &Document,
        element: &ElementRef,
    ) -> Result<Self> {
        let scope = doc
            .scope(element.graph())
            .ok_or_else(|| element_not_found(element.graph().unwrap_or_default(), &doc.name))?;
        let builder = Builder { generator, doc, scope };
        let syntax = generator.syntax();
        let mut graph = ShaderGraph::new(syntax.make_valid_name(element.name()));

        match element {
            ElementRef::Output { name, .. } => {
                let output = scope
                    .output(name)
                    .ok_or_else(|| element_not_found(name, builder.scope_name()))?;
                if let Some(node_graph) = scope.graph {
                    let interface = match node_graph.node_def.as_deref() {
                        Some(def_name) => {
                            let def = doc.node_def(def_name).ok_or_else(|| GraphStructureError::UnknownNodeDef {
                                node_def: def_name.to_string(),
                                node: node_graph.name.clone(),
                            })?;
                            &def.inputs
                        }
                        None => &node_graph.inputs,
                    };
                    for port in interface {
                        builder.add_input_socket(&mut graph, port)?;
                    }
                }
                builder.add_output(context, &mut graph, output)?;
            }
            ElementRef::Node { name, .. } => {
                let mut node = builder.scope_node(name)?;
                if node.type_name == "material" {
                    let shader = node
                        .input("surfaceshader")
                        .and_then(|i| i.node_name.as_deref())
                        .ok_or_else(|| port_not_found("surfaceshader", name))?;
                    node = builder.scope_node(shader)?;
                }
                builder.add_node_interface(context, &mut graph, node)?;
            }
        }

        graph.finalize(syntax, GraphKind::Shader(context.options().shader_interface))?;
        Ok(graph)
    }

    /// Build and finalize the nested graph of a compound implementation
    pub(crate) fn from_node_graph(
        generator: &ShaderGenerator,
        context: &mut GenContext,
        doc: &Document,
        node_graph: &NodeGraph,
        def: &NodeDef,
    ) -> Result<Self> {
        let depth = context.enter_graph();
        let result = if depth > MAX_GRAPH_DEPTH {
            Err(GraphStructureError::RecursionLimit {
                graph: node_graph.name.clone(),
                depth: MAX_GRAPH_DEPTH,
            }
            .into())
        } else {
            Self::build_compound(generator, context, doc, node_graph, def)
        };
        context.leave_graph();
        result
    }

    fn build_compound(
        generator: &ShaderGenerator,
        context: &mut GenContext,
        doc: &Document,
        node_graph: &NodeGraph,
        def: &NodeDef,
    ) -> Result<Self> {
        let builder = Builder {
            generator,
            doc,
            scope: Scope {
                graph: Some(node_graph),
                nodes: &node_graph.nodes,
                outputs: &node_graph.outputs,
            },
        };
        let mut graph = ShaderGraph::new(&node_graph.name);
        graph.set_node_def(&def.name);
        for port in &def.inputs {
            builder.add_input_socket(&mut graph, port)?;
        }
        for (index, port) in def.outputs.iter().enumerate() {
            let output = node_graph
                .output(&port.name)
                .or_else(|| node_graph.outputs.get(index))
                .ok_or_else(|| element_not_found(&port.name, &node_graph.name))?;
            builder.add_output(context, &mut graph, output)?;
        }
        graph.finalize(generator.syntax(), GraphKind::Compound)?;
        Ok(graph)
    }
}

impl Builder<'_> {
    /// Interface of a node element: definition inputs and outputs as sockets
    fn add_node_interface(&self, context: &mut GenContext, graph: &mut ShaderGraph, node: &Node) -> Result<()> {
        let def = self.resolve_node_def(graph, node)?;
        let syntax = self.generator.syntax();
        for port in &def.inputs {
            let socket = self.add_input_socket(graph, port)?;
            if let Some(value) = node.input(&port.name).and_then(|i| i.value.as_ref()) {
                if let Some(socket) = graph.input_socket_mut(socket) {
                    socket.port.set_value(value.clone(), syntax)?;
                    socket.port.path = self.scope.path(&format!("{}/{}", node.name, port.name));
                }
            }
        }

        let handle = self.build_node(context, graph, &node.name)?;
        let unconnected: Vec<(usize, usize)> = graph
            .node(handle)
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, i)| i.connection.is_none())
            .filter_map(|(index, i)| graph.input_socket(&i.port.name).map(|s| (s, index)))
            .collect();
        for (socket, input) in unconnected {
            graph.connect(Upstream::Socket(socket), Downstream::Node { node: handle, input })?;
        }

        for (index, output) in def.outputs.iter().enumerate() {
            let port = ShaderPort::new(&output.name, type_of(&output.type_name, &output.name)?);
            let socket = graph.add_output_socket(port);
            graph.connect(Upstream::Node { node: handle, output: index }, Downstream::Socket(socket))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Classification;
    use crate::test_util;

    fn material_doc() -> Document {
        let mut doc = Document::new("materials");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("tex", "image", "color3")
                .with_input(NodeInput::value("file", Value::Filename("wood.png".into()))),
        )
        .unwrap();
        doc.add_node(Node::new("diffuse", "diffuse_bsdf", "BSDF").with_input(NodeInput::connected("color", "color3", "tex")))
            .unwrap();
        doc.add_node(Node::new("shader", "surface", "surfaceshader").with_input(NodeInput::connected("bsdf", "BSDF", "diffuse")))
            .unwrap();
        doc.add_node(
            Node::new("material", "surfacematerial", "material")
                .with_input(NodeInput::connected("surfaceshader", "surfaceshader", "shader")),
        )
        .unwrap();
        doc
    }

    #[test]
    fn test_material_resolves_to_shader() {
        let generator = ShaderGenerator::glsl();
        let mut context = test_util::context();
        let doc = material_doc();
        let graph = ShaderGraph::from_element(&generator, &mut context, &doc, &ElementRef::node("material")).unwrap();
        assert!(graph.has_classification(Classification::SHADER | Classification::SURFACE));
        assert!(graph.node_by_name("shader").is_some());
        assert!(graph.output_socket("out").is_some());
    }

    #[test]
    fn test_geom_prop_nodes_are_shared() {
        let generator = ShaderGenerator::glsl();
        let mut context = test_util::context();
        let mut doc = material_doc();
        doc.add_node(Node::new("tex2", "image", "float")).unwrap();
        doc.add_output(Output::new("out1", "color3", "tex")).unwrap();
        doc.add_output(Output::new("out2", "float", "tex2")).unwrap();
        let graph = ShaderGraph::from_element(&generator, &mut context, &doc, &ElementRef::node("shader")).unwrap();
        let uv = graph.node_by_name("geomprop_UV0").unwrap();
        let normal = graph.node_by_name("geomprop_Nworld").unwrap();
        assert_eq!(graph.node(normal).input("space").unwrap().port.value, Some(Value::Integer(2)));
        assert_eq!(graph.nodes().filter(|(_, n)| n.name.starts_with("geomprop_")).count(), 2);
        let tex = graph.node_by_name("tex").unwrap();
        let texcoord = graph.node(tex).input("texcoord").unwrap();
        assert_eq!(texcoord.connection, Some(Upstream::Node { node: uv, output: 0 }));
    }

    #[test]
    fn test_missing_node_def() {
        let mut doc = Document::new("broken");
        doc.import_library(&test_util::library());
        doc.add_node(Node::new("n", "frobnicate", "float")).unwrap();
        doc.add_output(Output::new("out", "float", "n")).unwrap();
        let err = ShaderGraph::from_element(
            &ShaderGenerator::osl(),
            &mut test_util::context(),
            &doc,
            &ElementRef::output("out"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ShaderGenError::GraphStructure(GraphStructureError::MissingNodeDef { .. })
        ));
        assert!(err.to_string().contains("'n'"));
    }

    #[test]
    fn test_document_cycle_is_an_error() {
        let mut doc = Document::new("cycle");
        doc.import_library(&test_util::library());
        doc.add_node(Node::new("a", "add", "float").with_input(NodeInput::connected("in1", "float", "b")))
            .unwrap();
        doc.add_node(Node::new("b", "add", "float").with_input(NodeInput::connected("in1", "float", "a")))
            .unwrap();
        doc.add_output(Output::new("out", "float", "a")).unwrap();
        let err = ShaderGraph::from_element(
            &ShaderGenerator::glsl(),
            &mut test_util::context(),
            &doc,
            &ElementRef::output("out"),
        )
        .unwrap_err();
        assert!(matches!(err, ShaderGenError::GraphStructure(GraphStructureError::Cycle { .. })));
    }

    #[test]
    fn test_long_chain_builds_without_recursion() {
        const LENGTH: usize = 3000;
        let mut doc = Document::new("chain");
        doc.import_library(&test_util::library());
        doc.add_node(Node::new("n0", "add", "float")).unwrap();
        for index in 1..LENGTH {
            doc.add_node(
                Node::new(format!("n{index}"), "add", "float")
                    .with_input(NodeInput::connected("in1", "float", format!("n{}", index - 1)))
                    .with_input(NodeInput::value("in2", Value::Float(1.0))),
            )
            .unwrap();
        }
        doc.add_output(Output::new("result", "float", format!("n{}", LENGTH - 1))).unwrap();

        let generator = ShaderGenerator::glsl();
        let mut context = test_util::context();
        context.options_mut().shader_interface = crate::options::ShaderInterfaceType::Reduced;
        let graph = ShaderGraph::from_element(&generator, &mut context, &doc, &ElementRef::output("result")).unwrap();
        assert_eq!(graph.node_count(), LENGTH);
        let first = graph.node_by_name("n0").unwrap();
        let second = graph.node_by_name("n1").unwrap();
        assert_eq!(
            graph.node(second).input("in1").unwrap().connection,
            Some(Upstream::Node { node: first, output: 0 })
        );

        let shader = generator.generate(&mut context, &doc, &ElementRef::output("result")).unwrap();
        let code = shader.stage(crate::stage::PIXEL_STAGE).unwrap().code();
        assert!(code.contains("float n2999_out = n2998_out + 1.0;"));
    }

    #[test]
    fn test_distance_units_are_scaled() {
        let mut doc = Document::new("units");
        doc.import_library(&test_util::library());
        doc.add_node_def(
            NodeDef::new("ND_offset_float", "offset", "float")
                .with_input(PortDef::new("amount", "float").with_value(Value::Float(0.0)).with_unit_type("distance")),
        )
        .unwrap();
        doc.add_implementation(
            ordoplay_materialx_document::Implementation::new("IM_offset_float", "ND_offset_float", "")
                .with_source_code("{{amount}}"),
        )
        .unwrap();
        doc.add_node(
            Node::new("offset", "offset", "float")
                .with_input(NodeInput::value("amount", Value::Float(250.0)).with_unit("centimeter")),
        )
        .unwrap();
        doc.add_output(Output::new("out", "float", "offset")).unwrap();

        let mut context = test_util::context();
        context.options_mut().target_distance_unit = Some(DistanceUnit::Meter);
        context.options_mut().shader_interface = crate::options::ShaderInterfaceType::Reduced;
        let graph = ShaderGraph::from_element(&ShaderGenerator::glsl(), &mut context, &doc, &ElementRef::output("out")).unwrap();
        let node = graph.node(graph.node_by_name("offset").unwrap());
        let value = node.input("amount").unwrap().port.value.as_ref().and_then(Value::as_float).unwrap();
        assert!((value - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_recursive_compound_hits_depth_limit() {
        let mut doc = Document::new("recursive");
        doc.add_node_def(NodeDef::new("ND_loop_float", "loop", "float")).unwrap();
        doc.add_node_graph(
            NodeGraph::new("NG_loop_float")
                .with_node_def("ND_loop_float")
                .with_node(Node::new("inner", "loop", "float"))
                .with_output(Output::new("out", "float", "inner")),
        )
        .unwrap();
        doc.add_node(Node::new("outer", "loop", "float")).unwrap();
        doc.add_output(Output::new("out", "float", "outer")).unwrap();
        let mut context = test_util::context();
        let err = ShaderGraph::from_element(&ShaderGenerator::osl(), &mut context, &doc, &ElementRef::output("out"))
            .unwrap_err();
        assert!(matches!(
            err,
            ShaderGenError::GraphStructure(GraphStructureError::RecursionLimit { depth: MAX_GRAPH_DEPTH, .. })
        ));
        assert_eq!(context.enter_graph(), 1);
    }
}
