// SPDX-License-Identifier: MIT OR Apache-2.0
//! Emission context for one graph.
//!
//! An [`Emitter`] borrows the generator, the context and the graph being
//! emitted. Node implementations receive it at every call site and use it to
//! look up upstream expressions and declare their outputs. Compounds open a
//! child emitter over their nested graph, binding its input sockets to the
//! arguments of the call.

use crate::context::GenContext;
use crate::error::{GraphStructureError, Result};
use crate::generator::{ShaderGenerator, TargetKind};
use crate::graph::{Classification, NodeHandle, PortFlags, ShaderGraph, ShaderNode, ShaderPort, Upstream};
use crate::impls::ShaderNodeImpl;
use crate::options::GenOptions;
use crate::stage::ShaderStage;
use crate::syntax::Syntax;

/// Closure context a GLSL BSDF or EDF is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClosureContext {
    /// Direct lighting from one light source
    Reflection,
    /// Light passing through the surface
    Transmission,
    /// Environment lighting
    Indirect,
    /// Emitted light
    Emission,
}

impl ClosureContext {
    /// Suffix appended to BSDF function names
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Reflection => "_reflection",
            Self::Transmission => "_transmission",
            Self::Indirect => "_indirect",
            Self::Emission => "",
        }
    }

    /// Leading arguments passed to closure functions
    pub fn arguments(self) -> &'static [&'static str] {
        match self {
            Self::Reflection => &["L", "V", "P", "occlusion"],
            Self::Transmission | Self::Indirect => &["V"],
            Self::Emission => &["N", "V"],
        }
    }
}

/// Replacement expressions for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOverrides {
    /// Input expressions by port name
    pub inputs: Vec<(String, String)>,
    /// Variable receiving the first output
    pub output: Option<String>,
}

impl CallOverrides {
    /// Override for an input
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, e)| e.as_str())
    }
}

/// How the input sockets of the emitted graph are read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sockets {
    /// Top level shader: published sockets are uniforms or parameters
    TopLevel,
    /// Function body: sockets are parameters named after their variable
    Parameters,
    /// Inline expansion: sockets take the given expressions
    Bound(Vec<String>),
}

/// Emission state over one graph
pub struct Emitter<'a> {
    pub(crate) generator: &'a ShaderGenerator,
    pub(crate) context: &'a GenContext,
    pub(crate) graph: &'a ShaderGraph,
    pub(crate) closure: Option<ClosureContext>,
    pub(crate) sockets: Sockets,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(generator: &'a ShaderGenerator, context: &'a GenContext, graph: &'a ShaderGraph) -> Self {
        Self {
            generator,
            context,
            graph,
            closure: None,
            sockets: Sockets::TopLevel,
        }
    }

    /// Emitter over a nested graph, inheriting the closure context
    pub fn child<'b>(&'b self, graph: &'b ShaderGraph, sockets: Sockets) -> Emitter<'b> {
        Emitter {
            generator: self.generator,
            context: self.context,
            graph,
            closure: self.closure,
            sockets,
        }
    }

    /// Type syntax of the target
    pub fn syntax(&self) -> &'a Syntax {
        self.generator.syntax()
    }

    /// Target being emitted
    pub fn target(&self) -> TargetKind {
        self.generator.target()
    }

    /// Generation options
    pub fn options(&self) -> &'a GenOptions {
        self.context.options()
    }

    /// Graph being emitted
    pub fn graph(&self) -> &'a ShaderGraph {
        self.graph
    }

    /// Generation context
    pub fn context(&self) -> &'a GenContext {
        self.context
    }

    /// Current closure context
    pub fn closure(&self) -> Option<ClosureContext> {
        self.closure
    }

    /// Node by handle
    pub fn node(&self, node: NodeHandle) -> &'a ShaderNode {
        self.graph.node(node)
    }

    /// Implementation bound to a node
    pub fn implementation(&self, node: NodeHandle) -> Result<&'a ShaderNodeImpl> {
        let context = self.context;
        let shader_node = self.node(node);
        match shader_node.implementation {
            Some(id) => Ok(context.implementation(id)),
            None => Err(GraphStructureError::InvalidNode {
                node: shader_node.name.clone(),
                reason: "node has no implementation".into(),
            }
            .into()),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Literal for a port value, or the type default
    pub fn literal(&self, port: &ShaderPort) -> Result<String> {
        let syntax = self.syntax();
        match &port.value {
            Some(value) => syntax.value(port.ty, value, false),
            None => Ok(syntax.default_value(port.ty, false)?.to_string()),
        }
    }

    /// Expression reading an input socket of the graph
    fn socket_expression(&self, index: usize) -> Result<String> {
        let socket = &self.graph.input_sockets()[index];
        match &self.sockets {
            Sockets::TopLevel if socket.port.has_flag(PortFlags::PUBLISHED) => Ok(socket.port.variable.clone()),
            Sockets::TopLevel => self.literal(&socket.port),
            Sockets::Parameters => Ok(socket.port.variable.clone()),
            Sockets::Bound(args) => match args.get(index) {
                Some(arg) => Ok(arg.clone()),
                None => self.literal(&socket.port),
            },
        }
    }

    /// Expression for an input of a node
    ///
    /// Overrides win, then the upstream connection, then the literal value.
    pub fn input_expression(&self, node: NodeHandle, input: usize, overrides: &CallOverrides) -> Result<String> {
        let shader_input = &self.node(node).inputs[input];
        if let Some(expression) = overrides.input(&shader_input.port.name) {
            return Ok(expression.to_string());
        }
        match shader_input.connection {
            Some(Upstream::Node { node: up, output }) => Ok(self.node(up).outputs[output].port.variable.clone()),
            Some(Upstream::Socket(index)) => self.socket_expression(index),
            None => self.literal(&shader_input.port),
        }
    }

    /// Expression feeding an output socket of the graph
    pub fn output_socket_expression(&self, index: usize) -> Result<String> {
        let socket = &self.graph.output_sockets()[index];
        match socket.connection {
            Some(Upstream::Node { node, output }) => Ok(self.node(node).outputs[output].port.variable.clone()),
            Some(Upstream::Socket(input)) => self.socket_expression(input),
            None => self.literal(&socket.port),
        }
    }

    /// Variable holding an output of a node
    pub fn output_variable(&self, node: NodeHandle, output: usize, overrides: &CallOverrides) -> String {
        match (&overrides.output, output) {
            (Some(variable), 0) => variable.clone(),
            _ => self.node(node).outputs[output].port.variable.clone(),
        }
    }

    /// Declare every output of a node with its default value
    pub fn declare_outputs(&self, stage: &mut ShaderStage, node: NodeHandle, overrides: &CallOverrides) -> Result<()> {
        let syntax = self.syntax();
        for (index, output) in self.node(node).outputs.iter().enumerate() {
            let ty = syntax.type_name(output.port.ty)?;
            let default = syntax.default_value(output.port.ty, false)?;
            let variable = self.output_variable(node, index, overrides);
            stage.add_line(&format!("{ty} {variable} = {default}"), true);
        }
        Ok(())
    }

    /// Declare the first output of a node assigned to `expression`
    pub fn declare_output(
        &self,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
        expression: &str,
    ) -> Result<()> {
        let shader_node = self.node(node);
        let Some(output) = shader_node.outputs.first() else {
            return Err(GraphStructureError::InvalidNode {
                node: shader_node.name.clone(),
                reason: "node has no outputs".into(),
            }
            .into());
        };
        let ty = self.syntax().type_name(output.port.ty)?;
        let variable = self.output_variable(node, 0, overrides);
        stage.add_line(&format!("{ty} {variable} = {expression}"), true);
        Ok(())
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Declare the stage variables of every node
    pub fn create_variables(&self, stages: &mut [ShaderStage]) -> Result<()> {
        for handle in self.graph.handles() {
            self.implementation(*handle)?.create_variables(self, *handle, stages)?;
        }
        Ok(())
    }

    /// Emit the function definitions of every node, once per stage
    pub fn emit_function_definitions(&self, stage: &mut ShaderStage) -> Result<()> {
        for handle in self.graph.handles() {
            self.implementation(*handle)?.emit_function_definition(self, stage)?;
        }
        Ok(())
    }

    /// Emit the calls of the nodes feeding `node`
    pub fn emit_dependencies(&mut self, stage: &mut ShaderStage, node: NodeHandle) -> Result<()> {
        let graph = self.graph;
        for up in graph.upstream_nodes(node) {
            self.emit_call(stage, up)?;
        }
        Ok(())
    }

    /// Emit the call of a node unless it is visible in the current scope
    pub fn emit_call(&mut self, stage: &mut ShaderStage, node: NodeHandle) -> Result<()> {
        if stage.is_emitted(node) {
            return Ok(());
        }
        stage.mark_emitted(node);
        self.emit_call_with(stage, node, &CallOverrides::default())
    }

    /// Emit the call of a node with replacement expressions
    ///
    /// The call is not recorded, so the node can be emitted again.
    pub fn emit_call_with(&mut self, stage: &mut ShaderStage, node: NodeHandle, overrides: &CallOverrides) -> Result<()> {
        let implementation = self.implementation(node)?;
        implementation.emit_function_call(self, stage, node, overrides)
    }

    /// Emit the body of the graph
    ///
    /// Data nodes come first in topological order, then shader nodes, then
    /// whatever feeds the output sockets. Closure nodes are only emitted
    /// when a shader or an output needs them.
    pub fn emit_graph_body(&mut self, stage: &mut ShaderStage) -> Result<()> {
        let graph = self.graph;
        for (handle, node) in graph.nodes() {
            if !node.classification.intersects(Classification::CLOSURE | Classification::SHADER) {
                self.emit_call(stage, handle)?;
            }
        }
        for (handle, node) in graph.nodes() {
            if node.has_classification(Classification::SHADER) {
                self.emit_call(stage, handle)?;
            }
        }
        for socket in graph.output_sockets() {
            if let Some(Upstream::Node { node, .. }) = socket.connection {
                self.emit_call(stage, node)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Emitter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("target", &self.generator.target())
            .field("graph", &self.graph.name())
            .field("closure", &self.closure)
            .field("sockets", &self.sockets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Downstream, ShaderInput};
    use crate::test_util;
    use crate::types::TypeDesc;
    use ordoplay_materialx_document::Value;

    fn graph() -> ShaderGraph {
        let mut graph = ShaderGraph::new("g");
        let mut weight = ShaderPort::new("weight", TypeDesc::Float);
        weight.value = Some(Value::Float(0.5));
        weight.variable = "weight".into();
        graph.add_input_socket(weight);
        let mut node = ShaderNode::new("scale", "ND_multiply_float");
        node.add_input("in1", TypeDesc::Float);
        node.inputs.push(ShaderInput::new({
            let mut port = ShaderPort::new("in2", TypeDesc::Float);
            port.value = Some(Value::Float(2.0));
            port
        }));
        node.add_output("out", TypeDesc::Float).port.variable = "scale_out".into();
        let scale = graph.add_node(node).unwrap();
        graph
            .connect(Upstream::Socket(0), Downstream::Node { node: scale, input: 0 })
            .unwrap();
        graph
    }

    #[test]
    fn test_socket_modes() {
        let generator = ShaderGenerator::glsl();
        let context = test_util::context();
        let mut graph = graph();
        let scale = graph.node_by_name("scale").unwrap();
        let none = CallOverrides::default();

        let emitter = Emitter::new(&generator, &context, &graph);
        assert_eq!(emitter.input_expression(scale, 0, &none).unwrap(), "0.5");
        assert_eq!(emitter.input_expression(scale, 1, &none).unwrap(), "2.0");

        let child = emitter.child(&graph, Sockets::Bound(vec!["u_gain".into()]));
        assert_eq!(child.input_expression(scale, 0, &none).unwrap(), "u_gain");
        let child = emitter.child(&graph, Sockets::Parameters);
        assert_eq!(child.input_expression(scale, 0, &none).unwrap(), "weight");

        graph.input_socket_mut(0).unwrap().port.flags |= PortFlags::PUBLISHED;
        let emitter = Emitter::new(&generator, &context, &graph);
        assert_eq!(emitter.input_expression(scale, 0, &none).unwrap(), "weight");
    }

    #[test]
    fn test_overrides() {
        let generator = ShaderGenerator::glsl();
        let context = test_util::context();
        let graph = graph();
        let scale = graph.node_by_name("scale").unwrap();
        let emitter = Emitter::new(&generator, &context, &graph);
        let overrides = CallOverrides {
            inputs: vec![("in2".into(), "tint.r".into())],
            output: Some("scaled".into()),
        };
        assert_eq!(emitter.input_expression(scale, 1, &overrides).unwrap(), "tint.r");
        assert_eq!(emitter.output_variable(scale, 0, &overrides), "scaled");

        let mut stage = ShaderStage::new(crate::stage::PIXEL_STAGE);
        emitter.declare_output(&mut stage, scale, &overrides, "1.0").unwrap();
        emitter.declare_outputs(&mut stage, scale, &CallOverrides::default()).unwrap();
        assert_eq!(stage.code(), "float scaled = 1.0;\nfloat scale_out = 0.0;\n");
    }

    #[test]
    fn test_missing_implementation_is_invalid_node() {
        let generator = ShaderGenerator::glsl();
        let context = test_util::context();
        let graph = graph();
        let scale = graph.node_by_name("scale").unwrap();
        let mut emitter = Emitter::new(&generator, &context, &graph);
        let mut stage = ShaderStage::new(crate::stage::PIXEL_STAGE);
        let err = emitter.emit_call(&mut stage, scale).unwrap_err();
        assert!(err.to_string().contains("scale"));
    }

    #[test]
    fn test_closure_context_arguments() {
        assert_eq!(ClosureContext::Reflection.suffix(), "_reflection");
        assert_eq!(ClosureContext::Emission.arguments(), &["N", "V"]);
        assert!(ClosureContext::Indirect.arguments().contains(&"V"));
    }
}
