// SPDX-License-Identifier: MIT OR Apache-2.0
//! GLSL 4.0 backend.
//!
//! Emits a vertex stage that transforms positions and fills the
//! interpolated vertex data requested by geometric nodes, and a pixel stage
//! that runs the node graph and promotes its result to a `vec4`. Surface
//! shaders additionally get the light data array and one light function per
//! bound light type.

use super::{CallOverrides, EmitsStages, Emitter, HasClosureComposition, HasLightBinding, ShaderGenerator};
use crate::context::GenContext;
use crate::error::{GraphStructureError, LightBindingError, Result, SyntaxRegistryError};
use crate::generator::port_not_found;
use crate::graph::{Classification, NodeHandle, PortFlags, ShaderGraph};
use crate::impls::{
    layer_by_override, resolve_implementation, LightShaderImpl, ShaderNodeImpl, LIGHT_DATA_INSTANCE,
    VERTEX_DATA_INSTANCE,
};
use crate::options::GenOptions;
use crate::stage::{block, Brackets, ShaderStage, ShaderVariable, PIXEL_STAGE, VERTEX_STAGE};
use crate::syntax::Syntax;
use crate::types::TypeDesc;
use ordoplay_materialx_document::{Document, Value};

const VERSION: &str = "400";

/// Identifier substitutions applied to every stage once emitted
const TOKENS: &[(&str, &str)] = &[
    ("inPosition", "i_position"),
    ("inNormal", "i_normal"),
    ("inTexcoord", "i_texcoord"),
    ("worldMatrix", "u_worldMatrix"),
    ("worldInverseTransposeMatrix", "u_worldInverseTransposeMatrix"),
    ("viewProjectionMatrix", "u_viewProjectionMatrix"),
    ("viewPosition", "u_viewPosition"),
    ("numActiveLightSources", "u_numActiveLightSources"),
    ("lightData", "u_lightData"),
    ("envMatrix", "u_envMatrix"),
    ("envIrradiance", "u_envIrradiance"),
    ("envRadiance", "u_envRadiance"),
    ("envRadianceMips", "u_envRadianceMips"),
    ("envRadianceSamples", "u_envRadianceSamples"),
    ("shadowMap", "u_shadowMap"),
    ("shadowMatrix", "u_shadowMatrix"),
    ("ambOccMap", "u_ambOccMap"),
    ("ambOccGain", "u_ambOccGain"),
    ("albedoTable", "u_albedoTable"),
    ("udimOffset", "u_udimOffset"),
    ("udimScaleFactor", "u_udimScaleFactor"),
];

const MICROFACET_LIBRARY: &str = "pbrlib/genglsl/lib/mx_microfacet.glsl";
const SHADOW_LIBRARY: &str = "pbrlib/genglsl/lib/mx_shadow.glsl";

/// GLSL code generation
#[derive(Debug, Clone, Copy, Default)]
pub struct GlslBackend;

fn is_lit(graph: &ShaderGraph) -> bool {
    graph
        .nodes()
        .any(|(_, n)| n.has_classification(Classification::SHADER | Classification::SURFACE))
}

fn has_file_textures(graph: &ShaderGraph) -> bool {
    graph
        .nodes()
        .any(|(_, n)| n.has_classification(Classification::FILETEXTURE))
}

/// Name of the function a bound light implementation emits
fn light_function(implementation: &ShaderNodeImpl) -> Option<&str> {
    match implementation {
        ShaderNodeImpl::LightShader(light) => Some(light.source.function.as_str()),
        ShaderNodeImpl::LightCompound(compound) => Some(compound.function.as_str()),
        _ => None,
    }
}

/// Promote an expression to the `vec4` pixel output
fn to_vec4(ty: TypeDesc, expression: &str) -> String {
    if ty.is_float4() {
        expression.to_string()
    } else if ty.is_float3() {
        format!("vec4({expression}, 1.0)")
    } else if ty.is_float2() {
        format!("vec4({expression}, 0.0, 1.0)")
    } else if matches!(ty, TypeDesc::Float | TypeDesc::Integer) {
        format!("vec4({expression}, {expression}, {expression}, 1.0)")
    } else {
        "vec4(0.0, 0.0, 0.0, 1.0)".to_string()
    }
}

fn uniform_declaration(syntax: &Syntax, variable: &ShaderVariable) -> Result<String> {
    if variable.ty == TypeDesc::Filename {
        return Ok(format!("uniform sampler2D {}", variable.name));
    }
    let ty = syntax.type_name(variable.ty)?;
    let suffix = syntax.array_suffix(variable.ty, variable.value.as_ref());
    let value = match &variable.value {
        Some(value) => syntax.value(variable.ty, value, true)?,
        None => syntax.default_value(variable.ty, true)?.to_string(),
    };
    if value.is_empty() {
        Ok(format!("uniform {ty} {}{suffix}", variable.name))
    } else {
        Ok(format!("uniform {ty} {}{suffix} = {value}", variable.name))
    }
}

fn emit_uniform_block(syntax: &Syntax, stage: &mut ShaderStage, name: &str) -> Result<()> {
    let Some(uniforms) = stage.uniform_block(name).filter(|b| !b.is_empty()) else {
        return Ok(());
    };
    let lines = uniforms
        .variables()
        .map(|v| uniform_declaration(syntax, v))
        .collect::<Result<Vec<_>>>()?;
    stage.add_comment(&format!("Uniform block: {name}"));
    for line in lines {
        stage.add_line(&line, true);
    }
    stage.new_line();
    Ok(())
}

fn emit_constants(syntax: &Syntax, stage: &mut ShaderStage) -> Result<()> {
    if stage.constants().is_empty() {
        return Ok(());
    }
    let mut lines = Vec::new();
    for constant in stage.constants().variables() {
        let ty = syntax.type_name(constant.ty)?;
        let value = match &constant.value {
            Some(value) => syntax.value(constant.ty, value, true)?,
            None => syntax.default_value(constant.ty, true)?.to_string(),
        };
        lines.push(format!("const {ty} {} = {value}", constant.name));
    }
    stage.add_comment("Constant block");
    for line in lines {
        stage.add_line(&line, true);
    }
    stage.new_line();
    Ok(())
}

impl GlslBackend {
    fn create_vertex_variables(stage: &mut ShaderStage) {
        let members: Vec<String> = stage
            .output_block(block::VERTEX_DATA)
            .map(|b| b.variables().map(|v| v.name.clone()).collect())
            .unwrap_or_default();
        let inputs = stage.create_input_block(block::VERTEX_INPUTS, "");
        inputs.add_if_absent(ShaderVariable::new(TypeDesc::Vector3, "$inPosition"));
        for member in &members {
            if member.starts_with("normal") {
                inputs.add_if_absent(ShaderVariable::new(TypeDesc::Vector3, "$inNormal"));
            } else if let Some(index) = member.strip_prefix("texcoord_") {
                inputs.add_if_absent(ShaderVariable::new(TypeDesc::Vector2, format!("$inTexcoord_{index}")));
            }
        }
        let private = stage.create_uniform_block(block::PRIVATE_UNIFORMS, "");
        private.add_if_absent(ShaderVariable::new(TypeDesc::Matrix44, "$worldMatrix").uniform());
        private.add_if_absent(ShaderVariable::new(TypeDesc::Matrix44, "$viewProjectionMatrix").uniform());
        if members.iter().any(|m| m == "normalWorld") {
            private.add_if_absent(ShaderVariable::new(TypeDesc::Matrix44, "$worldInverseTransposeMatrix").uniform());
        }
    }

    fn create_pixel_variables(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let graph = emitter.graph();
        let context = emitter.context();
        let options = emitter.options();

        let public = stage.create_uniform_block(block::PUBLIC_UNIFORMS, "");
        for socket in graph.input_sockets() {
            if socket.port.has_flag(PortFlags::PUBLISHED) {
                public.add(
                    ShaderVariable::new(socket.port.ty, socket.port.variable.clone())
                        .with_value(socket.port.value.clone())
                        .with_path(socket.port.path.clone())
                        .uniform(),
                )?;
            }
        }

        if options.hw_normalize_udim_tex_coords && has_file_textures(graph) {
            let private = stage.create_uniform_block(block::PRIVATE_UNIFORMS, "");
            private.add_if_absent(ShaderVariable::new(TypeDesc::Vector2, "$udimOffset").uniform());
            private.add_if_absent(
                ShaderVariable::new(TypeDesc::Vector2, "$udimScaleFactor")
                    .with_value(Some(Value::Vector2([1.0, 1.0])))
                    .uniform(),
            );
        }

        if is_lit(graph) {
            let light_data = stage.create_uniform_block(block::LIGHT_DATA, LIGHT_DATA_INSTANCE);
            light_data.add_if_absent(ShaderVariable::new(TypeDesc::Integer, "type"));
            for (_, bound) in context.bound_lights() {
                match context.implementation(bound.implementation) {
                    ShaderNodeImpl::LightShader(light) => {
                        for (name, ty) in &light.inputs {
                            light_data.add_if_absent(ShaderVariable::new(*ty, name.clone()));
                        }
                    }
                    ShaderNodeImpl::LightCompound(compound) => {
                        for socket in compound.graph.input_sockets() {
                            light_data.add_if_absent(ShaderVariable::new(socket.port.ty, socket.port.variable.clone()));
                        }
                    }
                    _ => {}
                }
            }
        }

        let Some(output) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };
        stage
            .create_output_block(block::PIXEL_OUTPUTS, "")
            .add(ShaderVariable::new(TypeDesc::Color4, output.port.variable.clone()))?;
        Ok(())
    }

    fn emit_vertex_stage(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = emitter.syntax();
        stage.add_line(&format!("#version {VERSION}"), false);
        stage.new_line();
        emit_constants(syntax, stage)?;
        emit_uniform_block(syntax, stage, block::PRIVATE_UNIFORMS)?;
        emit_uniform_block(syntax, stage, block::PUBLIC_UNIFORMS)?;

        let mut inputs = Vec::new();
        if let Some(block) = stage.input_block(block::VERTEX_INPUTS) {
            for input in block.variables() {
                inputs.push(format!("in {} {}", syntax.type_name(input.ty)?, input.name));
            }
        }
        if !inputs.is_empty() {
            stage.add_comment(&format!("Inputs block: {}", block::VERTEX_INPUTS));
            for input in inputs {
                stage.add_line(&input, true);
            }
            stage.new_line();
        }

        let members: Vec<String> = stage
            .output_block(block::VERTEX_DATA)
            .map(|b| b.variables().map(|v| v.name.clone()).collect())
            .unwrap_or_default();
        emit_vertex_data(syntax, stage, "out", block::VERTEX_DATA, VERTEX_STAGE)?;

        stage.add_line("void main()", false);
        stage.begin_scope(Brackets::Curly);
        stage.add_line("vec4 hPositionWorld = $worldMatrix * vec4($inPosition, 1.0)", true);
        stage.add_line("gl_Position = $viewProjectionMatrix * hPositionWorld", true);
        let vd = VERTEX_DATA_INSTANCE;
        for member in members {
            let value = match member.as_str() {
                "positionWorld" => "hPositionWorld.xyz".to_string(),
                "positionObject" => "$inPosition".to_string(),
                "normalWorld" => "normalize(mat3($worldInverseTransposeMatrix) * $inNormal)".to_string(),
                "normalObject" => "$inNormal".to_string(),
                other => match other.strip_prefix("texcoord_") {
                    Some(index) => format!("$inTexcoord_{index}"),
                    None => continue,
                },
            };
            stage.add_line(&format!("{vd}.{member} = {value}"), true);
        }
        stage.end_scope(false);
        stage.new_line();
        Ok(())
    }

    fn emit_transform_uv(options: &GenOptions, stage: &mut ShaderStage) {
        if !stage.add_function_definition("mx_transform_uv") {
            return;
        }
        stage.add_line("vec2 mx_transform_uv(vec2 texcoord)", false);
        stage.begin_scope(Brackets::Curly);
        if options.hw_normalize_udim_tex_coords {
            stage.add_line("texcoord = (texcoord - $udimOffset) * $udimScaleFactor", true);
        }
        if options.file_texture_vertical_flip {
            stage.add_line("return vec2(texcoord.x, 1.0 - texcoord.y)", true);
        } else {
            stage.add_line("return texcoord", true);
        }
        stage.end_scope(false);
        stage.new_line();
    }

    fn emit_light_functions(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let context = emitter.context();
        for (_, bound) in context.bound_lights() {
            context
                .implementation(bound.implementation)
                .emit_function_definition(emitter, stage)?;
        }

        stage.add_line("int numActiveLightSources()", false);
        stage.begin_scope(Brackets::Curly);
        stage.add_line("return min($numActiveLightSources, MAX_LIGHT_SOURCES)", true);
        stage.end_scope(false);
        stage.new_line();

        stage.add_line(
            "void sampleLightSource(LightData light, vec3 position, out lightshader result)",
            false,
        );
        stage.begin_scope(Brackets::Curly);
        stage.add_line("result.intensity = vec3(0.0)", true);
        stage.add_line("result.direction = vec3(0.0)", true);
        let mut keyword = "if";
        for (type_id, bound) in context.bound_lights() {
            let Some(function) = light_function(context.implementation(bound.implementation)) else {
                continue;
            };
            stage.add_line(&format!("{keyword} (light.type == {type_id})"), false);
            stage.begin_scope(Brackets::Curly);
            stage.add_line(&format!("{function}(light, position, result)"), true);
            stage.end_scope(false);
            keyword = "else if";
        }
        stage.end_scope(false);
        stage.new_line();
        Ok(())
    }

    fn emit_pixel_stage(emitter: &mut Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let syntax = emitter.syntax();
        let options = emitter.options();
        let context = emitter.context();
        let graph = emitter.graph();
        let lit = is_lit(graph);

        stage.add_line(&format!("#version {VERSION}"), false);
        stage.new_line();
        stage.add_line(
            &format!("#define MAX_LIGHT_SOURCES {}", options.hw_max_active_light_sources),
            false,
        );
        stage.add_line(
            &format!(
                "#define DIRECTIONAL_ALBEDO_METHOD {}",
                options.hw_directional_albedo_method.define_value()
            ),
            false,
        );
        stage.add_line("#define M_FLOAT_EPS 1e-8", false);
        stage.new_line();
        for definition in syntax.type_definitions() {
            stage.add_line(definition, false);
        }
        stage.new_line();

        emit_constants(syntax, stage)?;
        emit_uniform_block(syntax, stage, block::PRIVATE_UNIFORMS)?;
        emit_uniform_block(syntax, stage, block::PUBLIC_UNIFORMS)?;

        if lit {
            let mut members = Vec::new();
            if let Some(light_data) = stage.uniform_block(block::LIGHT_DATA) {
                for member in light_data.variables() {
                    members.push(format!("{} {}", syntax.type_name(member.ty)?, member.name));
                }
            }
            stage.add_line(&format!("struct {}", block::LIGHT_DATA), false);
            stage.begin_scope(Brackets::Curly);
            for member in members {
                stage.add_line(&member, true);
            }
            stage.end_scope(true);
            stage.new_line();
            stage.add_line(
                &format!("uniform {} {LIGHT_DATA_INSTANCE}[MAX_LIGHT_SOURCES]", block::LIGHT_DATA),
                true,
            );
            stage.new_line();
        }

        emit_vertex_data(syntax, stage, "in", block::VERTEX_DATA, PIXEL_STAGE)?;

        let mut outputs = Vec::new();
        if let Some(block) = stage.output_block(block::PIXEL_OUTPUTS) {
            for output in block.variables() {
                outputs.push(format!("out {} {}", syntax.type_name(output.ty)?, output.name));
            }
        }
        stage.add_comment("Data output by the pixel shader");
        for output in outputs {
            stage.add_line(&output, true);
        }
        stage.new_line();

        if lit {
            stage.add_include(MICROFACET_LIBRARY, context)?;
            stage.add_include(options.hw_specular_environment_method.library_file(), context)?;
            if options.hw_shadow_map {
                stage.add_include(SHADOW_LIBRARY, context)?;
            }
        }
        if has_file_textures(graph) {
            Self::emit_transform_uv(options, stage);
        }
        if lit {
            Self::emit_light_functions(emitter, stage)?;
        }
        emitter.emit_function_definitions(stage)?;

        stage.add_line("void main()", false);
        stage.begin_scope(Brackets::Curly);
        emitter.emit_graph_body(stage)?;
        Self::emit_final_output(emitter, stage)?;
        stage.end_scope(false);
        stage.new_line();
        Ok(())
    }

    fn emit_final_output(emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        let graph = emitter.graph();
        let Some(socket) = graph.output_sockets().first() else {
            return Err(port_not_found("output", graph.name()));
        };
        let variable = &socket.port.variable;
        let result = emitter.output_socket_expression(0)?;
        let surface = socket.connection.is_some() && socket.port.ty == TypeDesc::SurfaceShader;
        if !surface {
            stage.add_line(&format!("{variable} = {}", to_vec4(socket.port.ty, &result)), true);
        } else if emitter.options().hw_transparency {
            stage.add_line(
                &format!("float outAlpha = clamp(1.0 - dot({result}.transparency, vec3(0.3333)), 0.0, 1.0)"),
                true,
            );
            stage.add_line(&format!("{variable} = vec4({result}.color, outAlpha)"), true);
        } else {
            stage.add_line(&format!("{variable} = vec4({result}.color, 1.0)"), true);
        }
        Ok(())
    }
}

/// Vertex data interface block, `out` in the vertex stage and `in` in the pixel stage
fn emit_vertex_data(syntax: &Syntax, stage: &mut ShaderStage, qualifier: &str, name: &str, stage_name: &str) -> Result<()> {
    let data = match stage_name {
        VERTEX_STAGE => stage.output_block(name),
        _ => stage.input_block(name),
    };
    let Some(data) = data.filter(|b| !b.is_empty()) else {
        return Ok(());
    };
    let mut members = Vec::new();
    for variable in data.variables() {
        members.push(format!("{} {}", syntax.type_name(variable.ty)?, variable.name));
    }
    let instance = data.instance().to_string();
    stage.add_line(&format!("{qualifier} {name}"), false);
    stage.add_line("{", false);
    for member in members {
        stage.add_line(&format!("    {member}"), true);
    }
    stage.add_line(&format!("}} {instance}"), true);
    stage.new_line();
    Ok(())
}

impl EmitsStages for GlslBackend {
    fn create_stages(&self, _options: &GenOptions) -> Vec<ShaderStage> {
        let mut vertex = ShaderStage::new(VERTEX_STAGE);
        vertex.create_input_block(block::VERTEX_INPUTS, "");
        vertex.create_uniform_block(block::PRIVATE_UNIFORMS, "");
        vertex.create_uniform_block(block::PUBLIC_UNIFORMS, "");
        vertex.create_output_block(block::VERTEX_DATA, VERTEX_DATA_INSTANCE);

        let mut pixel = ShaderStage::new(PIXEL_STAGE);
        pixel.create_uniform_block(block::PRIVATE_UNIFORMS, "");
        pixel.create_uniform_block(block::PUBLIC_UNIFORMS, "");
        pixel.create_input_block(block::VERTEX_DATA, VERTEX_DATA_INSTANCE);
        pixel.create_output_block(block::PIXEL_OUTPUTS, "");
        vec![vertex, pixel]
    }

    fn create_variables(&self, emitter: &Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        for stage in stages.iter_mut() {
            let stage_name = stage.name().to_string();
            match stage_name.as_str() {
                VERTEX_STAGE => Self::create_vertex_variables(stage),
                PIXEL_STAGE => Self::create_pixel_variables(emitter, stage)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn emit_stages(&self, name: &str, emitter: &mut Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
        tracing::debug!("Emitting GLSL stages for '{}'", name);
        for stage in stages.iter_mut() {
            let stage_name = stage.name().to_string();
            match stage_name.as_str() {
                VERTEX_STAGE => Self::emit_vertex_stage(emitter, stage)?,
                PIXEL_STAGE => Self::emit_pixel_stage(emitter, stage)?,
                _ => {}
            }
            stage.substitute_tokens(TOKENS);
        }
        Ok(())
    }
}

impl HasClosureComposition for GlslBackend {
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
        if layer_by_override(emitter, stage, node, overrides, top, base)? {
            return Ok(());
        }
        tracing::debug!(
            "Closure '{}' has no base input, layering keeps the top only",
            emitter.node(top).name
        );
        emitter.emit_call(stage, top)?;
        let top = emitter.node(top).outputs[0].port.variable.clone();
        emitter.declare_output(stage, node, overrides, &top)
    }

    fn mix(&self, fg: &str, bg: &str, weight: &str) -> String {
        format!("mix({bg}, {fg}, {weight})")
    }

    fn add(&self, a: &str, b: &str) -> String {
        format!("{a} + {b}")
    }

    fn multiply(&self, closure: &str, weight: &str, _weight_type: TypeDesc) -> String {
        format!("{closure} * {weight}")
    }
}

impl HasLightBinding for GlslBackend {
    fn bind_light_shader(
        &self,
        generator: &ShaderGenerator,
        context: &mut GenContext,
        doc: &Document,
        node_def: &str,
        type_id: u32,
    ) -> Result<()> {
        let def = doc.node_def(node_def).ok_or_else(|| GraphStructureError::UnknownNodeDef {
            node_def: node_def.to_string(),
            node: format!("light type {type_id}"),
        })?;
        if def.output_type() != TypeDesc::LightShader.name() {
            return Err(LightBindingError::NotALight {
                node_def: node_def.to_string(),
            }
            .into());
        }
        let id = resolve_implementation(generator, context, doc, def, None)?;
        let implementation = match context.implementation(id).clone() {
            ShaderNodeImpl::SourceCode(source) => {
                let inputs = def
                    .inputs
                    .iter()
                    .map(|input| {
                        TypeDesc::from_name(&input.type_name)
                            .map(|ty| (input.name.clone(), ty))
                            .ok_or_else(|| SyntaxRegistryError::UnknownType {
                                type_name: input.type_name.clone(),
                                element: def.name.clone(),
                            })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ShaderNodeImpl::LightShader(LightShaderImpl { source, inputs })
            }
            light @ ShaderNodeImpl::LightCompound(_) => light,
            _ => {
                return Err(GraphStructureError::InvalidNode {
                    node: node_def.to_string(),
                    reason: "light shaders need a source or node graph implementation".into(),
                }
                .into())
            }
        };
        context.bind_light(type_id, node_def, implementation)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use ordoplay_materialx_document::{ElementRef, Node, NodeInput, Output};

    fn surface_doc() -> Document {
        let mut doc = Document::new("lit");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("tex", "image", "color3").with_input(NodeInput::value("file", Value::Filename("wood.png".into()))),
        )
        .unwrap();
        doc.add_node(Node::new("diffuse", "diffuse_bsdf", "BSDF").with_input(NodeInput::connected("color", "color3", "tex")))
            .unwrap();
        doc.add_node(Node::new("shader", "surface", "surfaceshader").with_input(NodeInput::connected("bsdf", "BSDF", "diffuse")))
            .unwrap();
        doc
    }

    fn pixel(shader: &crate::Shader) -> &str {
        shader.stage(PIXEL_STAGE).unwrap().code()
    }

    #[test]
    fn test_constant_color_output() {
        let mut doc = Document::new("constant");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("red", "constant", "color3").with_input(NodeInput::value("value", Value::Color3([1.0, 0.0, 0.0]))),
        )
        .unwrap();
        doc.add_output(Output::new("out", "color3", "red")).unwrap();
        let shader = ShaderGenerator::glsl()
            .generate(&mut test_util::context(), &doc, &ElementRef::output("out"))
            .unwrap();
        let code = pixel(&shader);
        assert!(code.starts_with("#version 400"));
        assert!(code.contains("= vec4(vec3(1.0, 0.0, 0.0), 1.0);"));
        assert!(!code.contains("LightData"));

        let vertex = shader.stage(VERTEX_STAGE).unwrap().code();
        assert!(vertex.contains("uniform mat4 u_worldMatrix = mat4(1.0);"));
        assert!(vertex.contains("gl_Position = u_viewProjectionMatrix * hPositionWorld;"));
        assert!(!vertex.contains('$'));
    }

    #[test]
    fn test_constant_emission_on_opaque_surface() {
        let mut doc = Document::new("emissive");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("red", "constant", "color3").with_input(NodeInput::value("value", Value::Color3([1.0, 0.0, 0.0]))),
        )
        .unwrap();
        doc.add_node(Node::new("emit", "uniform_edf", "EDF").with_input(NodeInput::connected("color", "color3", "red")))
            .unwrap();
        doc.add_node(Node::new("shader", "surface", "surfaceshader").with_input(NodeInput::connected("edf", "EDF", "emit")))
            .unwrap();
        let mut context = test_util::reduced_context();
        context.options_mut().hw_transparency = false;
        let shader = ShaderGenerator::glsl()
            .generate(&mut context, &doc, &ElementRef::node("shader"))
            .unwrap();
        assert!(shader.graph().has_classification(Classification::SURFACE));

        let code = pixel(&shader);
        assert!(code.contains("mx_uniform_edf(N, V, vec3(1.0, 0.0, 0.0), emit_out);"));
        assert!(code.contains("shader_out.color += emit_out;"));
        assert!(code.contains("float surfaceOpacity = 1.0;"));
        assert!(code.contains("vec4(shader_out.color, 1.0);"));
        assert!(!code.contains("outAlpha"));
        assert!(!code.contains("red_out"));
    }

    #[test]
    fn test_closure_operators_in_lit_surface() {
        let shader = ShaderGenerator::glsl()
            .generate(&mut test_util::reduced_context(), &test_util::closure_doc(), &ElementRef::node("shader"))
            .unwrap();
        let code = pixel(&shader);

        assert!(code.contains("BSDF m_out = mix(glass_out, diff_out, 0.25);"));
        assert!(code.contains("BSDF tinted_out = m_out * 0.5;"));
        assert!(code.contains("BSDF sum_out = tinted_out + diff_out;"));
        assert!(code.contains("BSDF layered_out = BSDF(0.0);"));
        assert!(code.contains("sum_out, layered_out);"));
        assert!(code.contains("mx_dielectric_bsdf_reflection(L, V, P, occlusion, "));
        assert!(code.contains("mx_diffuse_bsdf_indirect(V, "));
        assert!(!code.contains("coat_out"));
        assert!(!code.contains("unused"));
        assert!(!code.contains("mx_uniform_edf"));
    }

    #[test]
    fn test_promotion() {
        assert_eq!(to_vec4(TypeDesc::Float, "x"), "vec4(x, x, x, 1.0)");
        assert_eq!(to_vec4(TypeDesc::Vector2, "uv"), "vec4(uv, 0.0, 1.0)");
        assert_eq!(to_vec4(TypeDesc::Vector3, "n"), "vec4(n, 1.0)");
        assert_eq!(to_vec4(TypeDesc::Color4, "c"), "c");
        assert_eq!(to_vec4(TypeDesc::Bsdf, "b"), "vec4(0.0, 0.0, 0.0, 1.0)");
    }

    #[test]
    fn test_surface_shader_with_bound_light() {
        let generator = ShaderGenerator::glsl();
        let mut context = test_util::context();
        let doc = surface_doc();
        generator.bind_light_shader(&mut context, &doc, "ND_point_light", 1).unwrap();
        let shader = generator.generate(&mut context, &doc, &ElementRef::node("shader")).unwrap();
        let code = pixel(&shader);

        assert!(code.contains("uniform LightData u_lightData[MAX_LIGHT_SOURCES];"));
        assert!(code.contains("    float decay_rate;"));
        assert!(code.contains("if (light.type == 1)"));
        assert!(code.contains("mx_point_light(light, position, result);"));
        assert!(code.contains("mx_diffuse_bsdf_reflection("));
        assert!(code.contains("mx_diffuse_bsdf_indirect("));
        assert!(code.contains("uniform sampler2D tex_file;"));
        assert!(code.contains("vec2 mx_transform_uv(vec2 texcoord)"));
        assert!(code.contains("vec4(shader_out.color, 1.0)"));
        assert_eq!(code.matches("float mx_fresnel_dielectric(").count(), 1);
        assert!(!code.contains('$'));

        let vertex = shader.stage(VERTEX_STAGE).unwrap().code();
        assert!(vertex.contains("vd.normalWorld = normalize(mat3(u_worldInverseTransposeMatrix) * i_normal);"));
        assert!(vertex.contains("vd.texcoord_0 = i_texcoord_0;"));
    }

    #[test]
    fn test_transparency_alpha() {
        let mut context = test_util::context();
        context.options_mut().hw_transparency = true;
        let shader = ShaderGenerator::glsl()
            .generate(&mut context, &surface_doc(), &ElementRef::node("shader"))
            .unwrap();
        let code = pixel(&shader);
        assert!(code.contains("float outAlpha = clamp(1.0 - dot(shader_out.transparency, vec3(0.3333)), 0.0, 1.0);"));
        assert!(code.contains("shader_out.transparency += "));
    }

    #[test]
    fn test_bind_non_light_fails() {
        let generator = ShaderGenerator::glsl();
        let mut context = test_util::context();
        let err = generator
            .bind_light_shader(&mut context, &test_util::library(), "ND_diffuse_bsdf", 1)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::ShaderGenError::LightBinding(LightBindingError::NotALight { .. })
        ));
    }
}
