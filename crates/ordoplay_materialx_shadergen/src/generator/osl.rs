// SPDX-License-Identifier: MIT OR Apache-2.0
//! OSL backend: a single shader whose parameters are the published inputs.

use super::{CallOverrides, EmitsStages, Emitter, HasClosureComposition};
use crate::error::Result;
use crate::generator::port_not_found;
use crate::graph::{Classification, NodeHandle, PortFlags};
use crate::options::GenOptions;
use crate::stage::{block, Brackets, ShaderStage, ShaderVariable, PIXEL_STAGE};
use crate::types::TypeDesc;

const HEADERS: &[&str] = &["vector2.h", "vector4.h", "color2.h", "color4.h", "mx_funcs.h"];

/// OSL code generation
#[derive(Debug, Clone, Copy, Default)]
pub struct OslBackend;

/// Channels an output of this type is reduced to, if it is remapped to `color`
fn output_remap(ty: TypeDesc) -> Option<&'static str> {
    match ty {
        TypeDesc::Color4 => Some("rgb"),
        TypeDesc::Vector4 => Some("xyz"),
        TypeDesc::Vector2 => Some("xy0"),
        _ => None,
    }
}

fn shader_kind(class: Classification) -> &'static str {
    if class.contains(Classification::SURFACE) {
        "surface"
    } else if class.contains(Classification::VOLUME) {
        "volume"
    } else {
        "shader"
    }
}

impl OslBackend {
    fn emit_transform_uv(options: &GenOptions, stage: &mut ShaderStage) {
        if !stage.add_function_definition("mx_transform_uv") {
            return;
        }
        stage.add_line("vector2 mx_transform_uv(vector2 texcoord)", false);
        stage.begin_scope(Brackets::Curly);
        if options.file_texture_vertical_flip {
            stage.add_line("return vector2(texcoord.x, 1.0 - texcoord.y)", true);
        } else {
            stage.add_line("return texcoord", true);
        }
        stage.end_scope(false);
        stage.new_line();
    }

    fn emit_parameters(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = emitter.syntax();
        let mut params = Vec::new();
        if let Some(inputs) = stage.input_block(block::INPUTS) {
            for input in inputs.variables() {
                let ty = syntax.type_name(input.ty)?;
                let value = match &input.value {
                    Some(value) => syntax.value(input.ty, value, true)?,
                    None => syntax.default_value(input.ty, true)?.to_string(),
                };
                params.push(format!("{ty} {}{} = {value}", input.name, syntax.array_suffix(input.ty, input.value.as_ref())));
            }
        }
        if let Some(outputs) = stage.output_block(block::OUTPUTS) {
            for output in outputs.variables() {
                let ty = syntax.type_name(output.ty)?;
                let value = syntax.default_value(output.ty, true)?;
                params.push(format!("{} {ty} {} = {value}", syntax.qualifiers().output, output.name));
            }
        }
        let last = params.len().saturating_sub(1);
        for (index, param) in params.iter().enumerate() {
            let separator = if index == last { "" } else { "," };
            stage.add_line(&format!("{param}{separator}"), false);
        }
        Ok(())
    }

    fn emit_final_output(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let graph = emitter.graph();
        let syntax = emitter.syntax();
        let Some(socket) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };
        let result = emitter.output_socket_expression(0)?;
        let value = match output_remap(socket.port.ty) {
            Some(channels) => syntax.swizzled_variable(&result, socket.port.ty, channels, TypeDesc::Color3)?,
            None => result,
        };
        stage.add_line(&format!("{} = {value}", socket.port.variable), true);
        Ok(())
    }
}

impl EmitsStages for OslBackend {
    fn create_stages(&self, _options: &GenOptions) -> Vec<ShaderStage> {
        let mut pixel = ShaderStage::new(PIXEL_STAGE);
        pixel.create_input_block(block::INPUTS, "");
        pixel.create_output_block(block::OUTPUTS, "");
        vec![pixel]
    }

    fn create_variables(&self, emitter: &Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        let graph = emitter.graph();
        let Some(stage) = stages.iter_mut().find(|s| s.name() == PIXEL_STAGE) else {
            return Ok(());
        };
        let inputs = stage.create_input_block(block::INPUTS, "");
        for socket in graph.input_sockets() {
            if socket.port.has_flag(PortFlags::PUBLISHED) {
                inputs.add(
                    ShaderVariable::new(socket.port.ty, socket.port.variable.clone())
                        .with_value(socket.port.value.clone())
                        .with_path(socket.port.path.clone()),
                )?;
            }
        }
        let Some(output) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };
        let ty = if output_remap(output.port.ty).is_some() {
            TypeDesc::Color3
        } else {
            output.port.ty
        };
        stage
            .create_output_block(block::OUTPUTS, "")
            .add(ShaderVariable::new(ty, output.port.variable.clone()))?;
        Ok(())
    }

    fn emit_stages(&self, name: &str, emitter: &mut Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        tracing::debug!("Emitting OSL shader '{}'", name);
        let Some(stage) = stages.iter_mut().find(|s| s.name() == PIXEL_STAGE) else {
            return Ok(());
        };
        let syntax = emitter.syntax();
        let options = emitter.options();
        let graph = emitter.graph();

        for header in HEADERS {
            stage.add_line(&format!("#include \"{header}\""), false);
        }
        stage.new_line();
        stage.add_line("#define M_FLOAT_EPS 0.000001", false);
        stage.new_line();
        for definition in syntax.type_definitions() {
            stage.add_line(definition, false);
        }
        if graph.nodes().any(|(_, n)| n.has_classification(Classification::FILETEXTURE)) {
            Self::emit_transform_uv(options, stage);
        }
        emitter.emit_function_definitions(stage)?;

        stage.add_line(&format!("{} {name}", shader_kind(graph.classification())), false);
        stage.begin_scope(Brackets::Paren);
        Self::emit_parameters(emitter, stage)?;
        stage.end_scope(false);
        stage.begin_scope(Brackets::Curly);
        if !graph.has_classification(Classification::TEXTURE) {
            stage.add_line("closure color null_closure = 0", true);
        }
        emitter.emit_graph_body(stage)?;
        Self::emit_final_output(emitter, stage)?;
        stage.end_scope(false);
        Ok(())
    }
}

impl HasClosureComposition for OslBackend {
    fn emit_layer(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
        top: Option<NodeHandle>,
        base: &str,
    ) -> Result<()> {
        let Some(top) = top else {
            return emitter.declare_output(stage, node, overrides, base);
        };
        emitter.emit_call(stage, top)?;
        let top = emitter.node(top).outputs[0].port.variable.clone();
        emitter.declare_output(stage, node, overrides, &format!("layer({top}, {base})"))
    }

    fn mix(&self, fg: &str, bg: &str, weight: &str) -> String {
        format!("{fg} * {weight} + {bg} * (1.0 - {weight})")
    }

    fn add(&self, a: &str, b: &str) -> String {
        format!("{a} + {b}")
    }

    fn multiply(&self, closure: &str, weight: &str, _weight_type: TypeDesc) -> String {
        format!("{closure} * {weight}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShaderGenerator;
    use crate::test_util;
    use ordoplay_materialx_document::{Document, ElementRef, Node, NodeInput, Output, Value};

    fn generate(doc: &Document, element: &ElementRef) -> String {
        let shader = ShaderGenerator::osl()
            .generate(&mut test_util::context(), doc, element)
            .unwrap();
        shader.stage(PIXEL_STAGE).unwrap().code().to_string()
    }

    #[test]
    fn test_constant_color_shader() {
        let mut doc = Document::new("constant");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("red", "constant", "color3").with_input(NodeInput::value("value", Value::Color3([1.0, 0.0, 0.0]))),
        )
        .unwrap();
        doc.add_output(Output::new("out", "color3", "red")).unwrap();
        let code = generate(&doc, &ElementRef::output("out"));

        assert!(code.starts_with("#include \"vector2.h\""));
        assert!(code.contains("#define M_FLOAT_EPS 0.000001"));
        assert!(code.contains("shader out\n(\n"));
        assert!(code.contains("color(1.0, 0.0, 0.0)"));
        assert!(!code.contains("null_closure"));
    }

    #[test]
    fn test_color4_output_is_reduced_to_color() {
        let mut doc = Document::new("color4");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("rgba", "constant", "color4")
                .with_input(NodeInput::value("value", Value::Color4([0.5, 0.5, 0.5, 1.0]))),
        )
        .unwrap();
        doc.add_output(Output::new("out", "color4", "rgba")).unwrap();
        let code = generate(&doc, &ElementRef::output("out"));
        assert!(code.contains("output color out"));
        assert!(code.contains(".rgb[0]"));
    }

    #[test]
    fn test_surface_parameters() {
        let mut doc = Document::new("surface");
        doc.import_library(&test_util::library());
        doc.add_node(Node::new("glass_bsdf", "dielectric_bsdf", "BSDF")).unwrap();
        doc.add_node(
            Node::new("glass", "surface", "surfaceshader").with_input(NodeInput::connected("bsdf", "BSDF", "glass_bsdf")),
        )
        .unwrap();
        let code = generate(&doc, &ElementRef::node("glass"));

        assert!(code.contains("surface glass\n"));
        assert!(code.contains("    float glass_bsdf_ior = 1.5,\n"));
        assert!(code.contains("    output closure color "));
        assert!(code.contains("closure color null_closure = 0;"));
        assert!(code.contains("void mx_dielectric_bsdf("));
        assert!(code.contains("transparent()"));
    }

    #[test]
    fn test_closure_operators_in_surface() {
        let shader = ShaderGenerator::osl()
            .generate(&mut test_util::reduced_context(), &test_util::closure_doc(), &ElementRef::node("shader"))
            .unwrap();
        let code = shader.stage(PIXEL_STAGE).unwrap().code();

        assert!(code.contains("closure color m_out = diff_out * 0.25 + glass_out * (1.0 - 0.25);"));
        assert!(code.contains("closure color tinted_out = m_out * 0.5;"));
        assert!(code.contains("closure color sum_out = tinted_out + diff_out;"));
        assert!(code.contains("closure color layered_out = layer(coat_out, sum_out);"));
        assert!(code.contains("oren_nayar("));
        assert!(code.contains("void mx_dielectric_bsdf("));
        assert!(!code.contains("unused"));
        assert!(!code.contains("emission()"));
    }

    #[test]
    fn test_closure_operators() {
        let osl = OslBackend;
        assert_eq!(osl.mix("a", "b", "w"), "a * w + b * (1.0 - w)");
        assert_eq!(osl.multiply("c", "0.5", TypeDesc::Float), "c * 0.5");
    }

    #[test]
    fn test_vertical_flip() {
        let mut options = GenOptions::default();
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        OslBackend::emit_transform_uv(&options, &mut stage);
        assert!(stage.code().contains("return texcoord;"));

        options.file_texture_vertical_flip = true;
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        OslBackend::emit_transform_uv(&options, &mut stage);
        assert!(stage.code().contains("1.0 - texcoord.y"));
    }
}
