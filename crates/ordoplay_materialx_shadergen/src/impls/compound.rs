// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compound implementations backed by a nested shader graph.

use crate::error::{GraphStructureError, Result};
use crate::generator::{CallOverrides, Emitter, Sockets, TargetKind};
use crate::graph::{NodeHandle, PortFlags, ShaderGraph, ShaderPort};
use crate::stage::{Brackets, ShaderStage};
use crate::syntax::Syntax;

/// A node graph emitted as a function, or inline for GLSL closures
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundImpl {
    /// Node graph name
    pub name: String,
    /// Function name
    pub function: String,
    /// Nested graph
    pub graph: ShaderGraph,
    /// Hidden inputs lifted from the nested graph, added to every instance
    pub hidden_inputs: Vec<ShaderPort>,
}

impl CompoundImpl {
    /// Wrap a finalized graph
    pub fn new(name: &str, syntax: &Syntax, graph: ShaderGraph) -> Self {
        let hidden_inputs = graph
            .input_sockets()
            .iter()
            .filter(|s| s.port.has_flag(PortFlags::HIDDEN))
            .map(|s| s.port.clone())
            .collect();
        Self {
            name: name.to_string(),
            function: syntax.make_valid_name(name),
            graph,
            hidden_inputs,
        }
    }

    /// Whether calls are expanded in place instead of calling a function
    ///
    /// GLSL closures depend on the closure context of the caller, so
    /// compounds producing closures or shaders are expanded inline.
    pub fn is_inlined(&self, target: TargetKind) -> bool {
        target == TargetKind::Glsl && self.graph.output_sockets().iter().any(|s| !s.port.ty.is_editable())
    }

    pub(super) fn create_variables(&self, emitter: &Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        emitter.child(&self.graph, Sockets::Parameters).create_variables(stages)
    }

    pub(super) fn emit_function_definition(&self, emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let mut child = emitter.child(&self.graph, Sockets::Parameters);
        child.closure = None;
        child.emit_function_definitions(stage)?;
        if self.is_inlined(emitter.target()) || !stage.add_function_definition(&self.function) {
            return Ok(());
        }
        match emitter.target() {
            TargetKind::Mdl => self.emit_mdl_function(&mut child, stage),
            _ => self.emit_function(&mut child, stage),
        }
    }

    fn emit_function(&self, child: &mut Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = child.syntax();
        let mut params = Vec::new();
        for socket in self.graph.input_sockets() {
            let ty = syntax.type_name(socket.port.ty)?;
            params.push(format!("{ty} {}", socket.port.variable));
        }
        for socket in self.graph.output_sockets() {
            let ty = syntax.type_name(socket.port.ty)?;
            params.push(format!("{} {ty} {}", syntax.qualifiers().output, socket.port.variable));
        }
        stage.add_line(&format!("void {}({})", self.function, params.join(", ")), false);
        stage.begin_scope(Brackets::Curly);
        stage.push_call_scope(true);
        child.emit_graph_body(stage)?;
        for (index, socket) in self.graph.output_sockets().iter().enumerate() {
            let value = child.output_socket_expression(index)?;
            stage.add_line(&format!("{} = {value}", socket.port.variable), true);
        }
        stage.pop_call_scope();
        stage.end_scope(false);
        stage.new_line();
        Ok(())
    }

    fn emit_mdl_function(&self, child: &mut Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = child.syntax();
        let [output] = self.graph.output_sockets() else {
            return Err(GraphStructureError::InvalidNode {
                node: self.name.clone(),
                reason: "MDL compounds must have exactly one output".into(),
            }
            .into());
        };
        let mut params = Vec::new();
        for socket in self.graph.input_sockets() {
            let ty = syntax.type_name(socket.port.ty)?;
            let uniform = socket.port.has_flag(PortFlags::UNIFORM) || socket.port.ty == crate::types::TypeDesc::Filename;
            let qualifier = if uniform { "uniform " } else { "" };
            params.push(format!("{qualifier}{ty} {}", socket.port.variable));
        }
        let return_type = syntax.type_name(output.port.ty)?;

        let mut body = ShaderStage::new(stage.name());
        child.emit_graph_body(&mut body)?;
        let result = child.output_socket_expression(0)?;

        stage.add_line(&format!("{return_type} {}({})", self.function, params.join(", ")), false);
        if body.code().is_empty() {
            stage.add_line(&format!("= {result}"), true);
        } else {
            stage.add_line("= let", false);
            stage.begin_scope(Brackets::Curly);
            stage.add_block(body.code());
            stage.end_scope(false);
            stage.add_line(&format!("in {result}"), true);
        }
        stage.new_line();
        Ok(())
    }

    /// Light function reading its interface from a `LightData` struct
    pub(super) fn emit_light_function_definition(&self, emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        if !stage.add_function_definition(&self.function) {
            return Ok(());
        }
        let bound = self
            .graph
            .input_sockets()
            .iter()
            .map(|s| format!("light.{}", s.port.variable))
            .collect();
        let mut child = emitter.child(&self.graph, Sockets::Bound(bound));
        child.closure = None;
        child.emit_function_definitions(stage)?;
        stage.add_line(
            &format!("void {}(LightData light, vec3 position, out lightshader result)", self.function),
            false,
        );
        stage.begin_scope(Brackets::Curly);
        stage.push_call_scope(true);
        child.emit_graph_body(stage)?;
        let value = child.output_socket_expression(0)?;
        stage.add_line(&format!("result = {value}"), true);
        stage.pop_call_scope();
        stage.end_scope(false);
        stage.new_line();
        Ok(())
    }

    fn arguments(&self, emitter: &Emitter<'_>, node: NodeHandle, overrides: &CallOverrides) -> Result<Vec<String>> {
        let shader_node = emitter.node(node);
        self.graph
            .input_sockets()
            .iter()
            .map(|socket| match shader_node.input_index(&socket.port.name) {
                Some(index) => emitter.input_expression(node, index, overrides),
                None => emitter.literal(&socket.port),
            })
            .collect()
    }

    pub(super) fn emit_function_call(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
    ) -> Result<()> {
        let mut args = self.arguments(emitter, node, overrides)?;
        if self.is_inlined(emitter.target()) {
            return self.emit_inline(emitter, stage, node, overrides, args);
        }
        if emitter.target() == TargetKind::Mdl {
            let expression = format!("{}({})", self.function, args.join(", "));
            return emitter.declare_output(stage, node, overrides, &expression);
        }
        emitter.declare_outputs(stage, node, overrides)?;
        for index in 0..emitter.node(node).outputs.len() {
            args.push(emitter.output_variable(node, index, overrides));
        }
        stage.add_line(&format!("{}({})", self.function, args.join(", ")), true);
        Ok(())
    }

    fn emit_inline(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
        args: Vec<String>,
    ) -> Result<()> {
        emitter.declare_outputs(stage, node, overrides)?;
        let mut child = emitter.child(&self.graph, Sockets::Bound(args));
        stage.begin_scope(Brackets::Curly);
        stage.push_call_scope(true);
        child.emit_graph_body(stage)?;
        for index in 0..self.graph.output_sockets().len() {
            let value = child.output_socket_expression(index)?;
            let variable = emitter.output_variable(node, index, overrides);
            stage.add_line(&format!("{variable} = {value}"), true);
        }
        stage.pop_call_scope();
        stage.end_scope(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShaderGenerator;
    use crate::impls::{resolve_implementation, ShaderNodeImpl};
    use crate::test_util;

    fn compound(generator: &ShaderGenerator, node_def: &str) -> (crate::GenContext, CompoundImpl) {
        let mut context = test_util::context();
        let doc = test_util::library();
        let def = doc.node_def(node_def).unwrap();
        let id = resolve_implementation(generator, &mut context, &doc, def, None).unwrap();
        let ShaderNodeImpl::Compound(compound) = context.implementation(id).clone() else {
            panic!("expected a compound implementation");
        };
        (context, compound)
    }

    #[test]
    fn test_tiled_image_compound() {
        let (_, tiled) = compound(&ShaderGenerator::glsl(), "ND_tiledimage_color3");
        assert_eq!(tiled.function, "NG_tiledimage_color3");
        assert!(tiled.graph.input_socket("file").is_some());
        assert!(tiled.graph.node_by_name("sampler").is_some());
        assert!(!tiled.is_inlined(TargetKind::Glsl));
    }

    #[test]
    fn test_closure_compounds_inline_on_glsl_only() {
        let (_, glass) = compound(&ShaderGenerator::glsl(), "ND_glass_surface");
        assert!(glass.is_inlined(TargetKind::Glsl));
        let (_, glass) = compound(&ShaderGenerator::osl(), "ND_glass_surface");
        assert!(!glass.is_inlined(TargetKind::Osl));
    }
}
