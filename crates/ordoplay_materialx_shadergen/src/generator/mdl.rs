// SPDX-License-Identifier: MIT OR Apache-2.0
//! MDL backend.
//!
//! A shader becomes one exported material. Published inputs are material
//! parameters annotated with their document path, the graph body is a `let`
//! block and texture graphs are wrapped in an emissive material.

use super::{CallOverrides, EmitsStages, Emitter, HasClosureComposition};
use crate::error::Result;
use crate::generator::port_not_found;
use crate::graph::{Classification, NodeHandle, PortFlags};
use crate::impls::layer_by_override;
use crate::options::GenOptions;
use crate::stage::{block, Brackets, ShaderStage, ShaderVariable, PIXEL_STAGE};
use crate::types::TypeDesc;

const IMPORTS: &[&str] = &["::df::*", "::base::*", "::math::*", "::state::*", "::anno::*", "::tex::*"];

/// Variable holding the result of the graph
const FINAL_OUTPUT: &str = "finalOutput__";

/// MDL code generation
#[derive(Debug, Clone, Copy, Default)]
pub struct MdlBackend;

/// Expression converting a texture result to `color`
fn to_color(ty: TypeDesc, expression: &str) -> String {
    match ty {
        TypeDesc::Color3 => expression.to_string(),
        TypeDesc::Float | TypeDesc::Vector3 => format!("color({expression})"),
        TypeDesc::Integer => format!("color(float({expression}))"),
        TypeDesc::Boolean => format!("color({expression} ? 1.0 : 0.0)"),
        TypeDesc::Vector2 => format!("color({expression}.x, {expression}.y, 0.0)"),
        TypeDesc::Vector4 => format!("color({expression}.x, {expression}.y, {expression}.z)"),
        TypeDesc::Color4 => format!("mk_color3({expression})"),
        _ => "color(0.0)".to_string(),
    }
}

impl MdlBackend {
    fn emit_header(emitter: &Emitter<'_>, stage: &mut ShaderStage) {
        let version = emitter.options().mdl_version;
        stage.add_line(&format!("mdl {}", version.number()), true);
        stage.new_line();
        for import in IMPORTS {
            stage.add_line(&format!("import {import}"), true);
        }
        let suffix = version.module_suffix();
        for module in [
            "materialx::core".to_string(),
            "materialx::sampling".to_string(),
            format!("materialx::stdlib_{suffix}"),
            format!("materialx::pbrlib_{suffix}"),
        ] {
            stage.add_line(&format!("using ::{module} import *"), true);
        }
        stage.new_line();
    }

    fn emit_parameters(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = emitter.syntax();
        let mut params: Vec<Vec<String>> = Vec::new();
        if let Some(inputs) = stage.input_block(block::INPUTS) {
            for input in inputs.variables() {
                let ty = syntax.type_name(input.ty)?;
                let qualifier = if input.uniform { "uniform " } else { "" };
                let value = match &input.value {
                    Some(value) => syntax.value(input.ty, value, true)?,
                    None => syntax.default_value(input.ty, true)?.to_string(),
                };
                let mut lines = vec![format!("{qualifier}{ty} {} = {value}", input.name)];
                if !input.path.is_empty() {
                    lines.push("[[".to_string());
                    lines.push(format!("    materialx::core::origin(\"{}\")", input.path));
                    lines.push("]]".to_string());
                }
                params.push(lines);
            }
        }
        let last = params.len().saturating_sub(1);
        for (index, lines) in params.iter_mut().enumerate() {
            if index != last {
                if let Some(line) = lines.last_mut() {
                    line.push(',');
                }
            }
            for line in lines.iter() {
                stage.add_line(line, false);
            }
        }
        Ok(())
    }

    fn emit_texture_result(stage: &mut ShaderStage, ty: TypeDesc, result: &str) {
        stage.add_line("float3 displacement__ = float3(0.0)", true);
        stage.add_line(&format!("color {FINAL_OUTPUT} = {}", to_color(ty, result)), true);
        stage.end_scope(false);
        stage.add_line("in material", false);
        stage.begin_scope(Brackets::Paren);
        stage.add_block(&format!(
            "surface: material_surface(\n    emission: material_emission(\n        emission: df::diffuse_edf(),\n        intensity: {FINAL_OUTPUT} * math::PI,\n        mode: intensity_radiant_exitance\n    )\n),\ngeometry: material_geometry(\n    displacement: displacement__\n)"
        ));
        stage.end_scope(true);
    }

    fn emit_material_result(stage: &mut ShaderStage, result: &str) {
        stage.add_line(&format!("material {FINAL_OUTPUT} = {result}"), true);
        stage.end_scope(false);
        stage.add_line("in material", false);
        stage.begin_scope(Brackets::Paren);
        let fields = ["thin_walled", "surface", "backface", "ior", "volume", "geometry", "hair"];
        let last = fields.len() - 1;
        for (index, field) in fields.iter().enumerate() {
            let separator = if index == last { "" } else { "," };
            stage.add_line(&format!("{field}: {FINAL_OUTPUT}.{field}{separator}"), false);
        }
        stage.end_scope(true);
    }
}

impl EmitsStages for MdlBackend {
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
            let port = &socket.port;
            if !port.has_flag(PortFlags::PUBLISHED) || !port.ty.is_editable() {
                continue;
            }
            let mut variable = ShaderVariable::new(port.ty, port.variable.clone())
                .with_value(port.value.clone())
                .with_path(port.path.clone());
            if port.has_flag(PortFlags::UNIFORM) || port.ty == TypeDesc::Filename {
                variable = variable.uniform();
            }
            inputs.add(variable)?;
        }
        let Some(output) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };
        stage
            .create_output_block(block::OUTPUTS, "")
            .add(ShaderVariable::new(TypeDesc::Material, output.port.variable.clone()))?;
        Ok(())
    }

    fn emit_stages(&self, name: &str, emitter: &mut Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        tracing::debug!("Emitting MDL material '{}'", name);
        let Some(stage) = stages.iter_mut().find(|s| s.name() == PIXEL_STAGE) else {
            return Ok(());
        };
        let graph = emitter.graph();
        let Some(socket) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };

        Self::emit_header(emitter, stage);
        emitter.emit_function_definitions(stage)?;

        stage.add_line(&format!("export material {name}"), false);
        stage.begin_scope(Brackets::Paren);
        Self::emit_parameters(emitter, stage)?;
        stage.end_scope(false);
        stage.add_line("= let", false);
        stage.begin_scope(Brackets::Curly);
        emitter.emit_graph_body(stage)?;
        let result = emitter.output_socket_expression(0)?;
        if graph.has_classification(Classification::TEXTURE) {
            Self::emit_texture_result(stage, socket.port.ty, &result);
        } else {
            Self::emit_material_result(stage, &result);
        }
        Ok(())
    }
}

impl HasClosureComposition for MdlBackend {
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
            return emitter.declare_output(stage, node, overrides, "material()");
        };
        let base_type = emitter.node(node).input("base").map(|i| i.port.ty);
        if base_type == Some(TypeDesc::Vdf) {
            emitter.emit_call(stage, top)?;
            let top = emitter.node(top).outputs[0].port.variable.clone();
            let expression = format!("material(surface: {top}.surface, volume: {base}.volume)");
            return emitter.declare_output(stage, node, overrides, &expression);
        }
        if layer_by_override(emitter, stage, node, overrides, top, base)? {
            return Ok(());
        }
        let name = emitter.node(top).name.clone();
        stage.add_comment(&format!("'{name}' has no base input, the layer keeps its top only"));
        emitter.emit_call(stage, top)?;
        let top = emitter.node(top).outputs[0].port.variable.clone();
        emitter.declare_output(stage, node, overrides, &top)
    }

    fn mix(&self, fg: &str, bg: &str, weight: &str) -> String {
        format!("mx_mix_bsdf(mxp_fg: {fg}, mxp_bg: {bg}, mxp_mix: {weight})")
    }

    fn add(&self, a: &str, b: &str) -> String {
        format!("mx_add_bsdf(mxp_in1: {a}, mxp_in2: {b})")
    }

    fn multiply(&self, closure: &str, weight: &str, weight_type: TypeDesc) -> String {
        let suffix = if weight_type == TypeDesc::Color3 { "color3" } else { "float" };
        format!("mx_multiply_bsdf_{suffix}(mxp_in1: {closure}, mxp_in2: {weight})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShaderGenerator;
    use crate::options::MdlVersion;
    use crate::test_util;
    use ordoplay_materialx_document::{Document, ElementRef, Node, NodeInput, Output, Value};

    fn texture_doc() -> Document {
        let mut doc = Document::new("texture");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("tex", "image", "color3").with_input(NodeInput::value("file", Value::Filename("wood.png".into()))),
        )
        .unwrap();
        doc.add_output(Output::new("result", "color3", "tex")).unwrap();
        doc
    }

    #[test]
    fn test_texture_material() {
        let mut context = test_util::context();
        context.options_mut().mdl_version = MdlVersion::V1_8;
        let shader = ShaderGenerator::mdl()
            .generate(&mut context, &texture_doc(), &ElementRef::output("result"))
            .unwrap();
        let code = shader.stage(PIXEL_STAGE).unwrap().code();

        assert!(code.starts_with("mdl 1.8;\n"));
        assert!(code.contains("using ::materialx::stdlib_1_8 import *;"));
        assert!(code.contains("export material result\n(\n"));
        assert!(code.contains("    uniform texture_2d tex_file = texture_2d(\"wood.png\", tex::gamma_linear)"));
        assert!(code.contains("= let\n{\n"));
        assert!(code.contains("mx_image_color3("));
        assert!(code.contains("color finalOutput__ = tex_out;"));
        assert!(code.contains("intensity: finalOutput__ * math::PI,"));
    }

    #[test]
    fn test_surface_material() {
        let mut doc = Document::new("surface");
        doc.import_library(&test_util::library());
        doc.add_node(Node::new("glass_bsdf", "dielectric_bsdf", "BSDF")).unwrap();
        doc.add_node(
            Node::new("glass", "surface", "surfaceshader").with_input(NodeInput::connected("bsdf", "BSDF", "glass_bsdf")),
        )
        .unwrap();
        let shader = ShaderGenerator::mdl()
            .generate(&mut test_util::context(), &doc, &ElementRef::node("glass"))
            .unwrap();
        let code = shader.stage(PIXEL_STAGE).unwrap().code();

        assert!(code.contains("mdl 1.10;"));
        assert!(code.contains("material finalOutput__ = glass_out;"));
        assert!(code.contains("    surface: finalOutput__.surface,\n"));
        assert!(code.contains("mx_dielectric_bsdf("));
        assert!(code.contains("mx_surface("));
    }

    #[test]
    fn test_closure_operators_in_material() {
        let shader = ShaderGenerator::mdl()
            .generate(&mut test_util::reduced_context(), &test_util::closure_doc(), &ElementRef::node("shader"))
            .unwrap();
        let code = shader.stage(PIXEL_STAGE).unwrap().code();

        assert!(code.contains("material m_out = mx_mix_bsdf(mxp_fg: diff_out, mxp_bg: glass_out, mxp_mix: 0.25);"));
        assert!(code.contains("material tinted_out = mx_multiply_bsdf_float(mxp_in1: m_out, mxp_in2: 0.5);"));
        assert!(code.contains("material sum_out = mx_add_bsdf(mxp_in1: tinted_out, mxp_in2: diff_out);"));
        assert!(code.contains("material layered_out = mx_dielectric_bsdf("));
        assert!(code.contains(", sum_out);"));
        assert!(code.contains("material finalOutput__ = shader_out;"));
        assert!(!code.contains("coat_out"));
        assert!(!code.contains("unused"));
        assert!(!code.contains("mx_uniform_edf"));
    }

    #[test]
    fn test_closure_operators() {
        let mdl = MdlBackend;
        assert_eq!(mdl.mix("a", "b", "0.5"), "mx_mix_bsdf(mxp_fg: a, mxp_bg: b, mxp_mix: 0.5)");
        assert_eq!(mdl.add("a", "b"), "mx_add_bsdf(mxp_in1: a, mxp_in2: b)");
        assert_eq!(
            mdl.multiply("a", "tint", TypeDesc::Color3),
            "mx_multiply_bsdf_color3(mxp_in1: a, mxp_in2: tint)"
        );
        assert_eq!(
            mdl.multiply("a", "0.5", TypeDesc::Float),
            "mx_multiply_bsdf_float(mxp_in1: a, mxp_in2: 0.5)"
        );
    }

    #[test]
    fn test_texture_result_conversion() {
        assert_eq!(to_color(TypeDesc::Float, "f"), "color(f)");
        assert_eq!(to_color(TypeDesc::Vector2, "uv"), "color(uv.x, uv.y, 0.0)");
        assert_eq!(to_color(TypeDesc::Color3, "c"), "c");
    }
}
