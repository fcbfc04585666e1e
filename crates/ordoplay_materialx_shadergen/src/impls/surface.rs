// SPDX-License-Identifier: MIT OR Apache-2.0
//! Lit surface shader (GLSL).
//!
//! The surface node owns the lighting loop. Its BSDF and EDF inputs are
//! evaluated once per closure context, each in its own block, so closure
//! nodes are emitted lazily and only where they contribute.

use super::geometry::{request_vertex_data, VERTEX_DATA_INSTANCE};
use crate::error::Result;
use crate::generator::{CallOverrides, ClosureContext, Emitter};
use crate::graph::{Classification, NodeHandle, Upstream};
use crate::options::DirectionalAlbedoMethod;
use crate::stage::{block, Brackets, ShaderStage, ShaderVariable, PIXEL_STAGE};
use crate::types::TypeDesc;
use ordoplay_materialx_document::Value;

/// Instance name of the light data uniform array
pub(crate) const LIGHT_DATA_INSTANCE: &str = "$lightData";

pub(super) fn create_variables(emitter: &Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()> {
    let options = emitter.options();
    request_vertex_data(stages, "positionWorld", TypeDesc::Vector3);
    request_vertex_data(stages, "normalWorld", TypeDesc::Vector3);
    if options.hw_ambient_occlusion {
        request_vertex_data(stages, "texcoord_0", TypeDesc::Vector2);
    }

    let Some(pixel) = stages.iter_mut().find(|s| s.name() == PIXEL_STAGE) else {
        return Ok(());
    };
    let mut uniforms = vec![
        ShaderVariable::new(TypeDesc::Vector3, "$viewPosition"),
        ShaderVariable::new(TypeDesc::Integer, "$numActiveLightSources"),
        ShaderVariable::new(TypeDesc::Matrix44, "$envMatrix"),
        ShaderVariable::new(TypeDesc::Filename, "$envIrradiance"),
        ShaderVariable::new(TypeDesc::Filename, "$envRadiance"),
        ShaderVariable::new(TypeDesc::Integer, "$envRadianceMips"),
        ShaderVariable::new(TypeDesc::Integer, "$envRadianceSamples"),
    ];
    if options.hw_shadow_map {
        uniforms.push(ShaderVariable::new(TypeDesc::Filename, "$shadowMap"));
        uniforms.push(ShaderVariable::new(TypeDesc::Matrix44, "$shadowMatrix"));
    }
    if options.hw_ambient_occlusion {
        uniforms.push(ShaderVariable::new(TypeDesc::Filename, "$ambOccMap"));
        uniforms.push(ShaderVariable::new(TypeDesc::Float, "$ambOccGain").with_value(Some(Value::Float(1.0))));
    }
    if options.hw_directional_albedo_method == DirectionalAlbedoMethod::Table {
        uniforms.push(ShaderVariable::new(TypeDesc::Filename, "$albedoTable"));
    }
    let private = pixel.create_uniform_block(block::PRIVATE_UNIFORMS, "");
    for uniform in uniforms {
        private.add_if_absent(uniform.uniform());
    }
    pixel.create_uniform_block(block::LIGHT_DATA, LIGHT_DATA_INSTANCE);
    Ok(())
}

fn upstream_node(emitter: &Emitter<'_>, node: NodeHandle, input: &str) -> Option<(usize, NodeHandle)> {
    let shader_node = emitter.node(node);
    let index = shader_node.input_index(input)?;
    match shader_node.inputs[index].connection {
        Some(Upstream::Node { node: up, .. }) => Some((index, up)),
        _ => None,
    }
}

/// Evaluate a closure input in `context` and accumulate it into the result
fn closure_block(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    context: ClosureContext,
    (node, input, closure): (NodeHandle, usize, NodeHandle),
    accumulate: impl FnOnce(&str) -> String,
) -> Result<()> {
    stage.begin_scope(Brackets::Curly);
    stage.push_call_scope(false);
    let previous = emitter.closure.replace(context);
    let emitted = emitter.emit_call(stage, closure);
    emitter.closure = previous;
    emitted?;
    let value = emitter.input_expression(node, input, &CallOverrides::default())?;
    stage.add_line(&accumulate(&value), true);
    stage.pop_call_scope();
    stage.end_scope(false);
    Ok(())
}

pub(super) fn emit_call(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let shader_node = emitter.node(node);
    let graph = emitter.graph();
    for up in graph.upstream_nodes(node) {
        if !emitter.node(up).has_classification(Classification::CLOSURE) {
            emitter.emit_call(stage, up)?;
        }
    }
    let options = emitter.options();
    let opacity = match shader_node.input_index("opacity") {
        Some(index) => emitter.input_expression(node, index, overrides)?,
        None => "1.0".to_string(),
    };
    let bsdf = upstream_node(emitter, node, "bsdf");
    let edf = upstream_node(emitter, node, "edf");

    emitter.declare_outputs(stage, node, overrides)?;
    let out = emitter.output_variable(node, 0, overrides);
    let vd = VERTEX_DATA_INSTANCE;

    stage.begin_scope(Brackets::Curly);
    stage.add_line(&format!("vec3 N = normalize({vd}.normalWorld)"), true);
    stage.add_line(&format!("vec3 V = normalize($viewPosition - {vd}.positionWorld)"), true);
    stage.add_line(&format!("vec3 P = {vd}.positionWorld"), true);
    stage.add_line(&format!("float surfaceOpacity = {opacity}"), true);
    stage.add_line("float occlusion = 1.0", true);

    if let Some((input, closure)) = bsdf {
        stage.new_line();
        stage.add_line("int numLights = numActiveLightSources()", true);
        stage.add_line("lightshader lightShader", true);
        stage.add_line(
            "for (int activeLightIndex = 0; activeLightIndex < numLights; ++activeLightIndex)",
            false,
        );
        stage.begin_scope(Brackets::Curly);
        stage.add_line(
            &format!("sampleLightSource({LIGHT_DATA_INSTANCE}[activeLightIndex], {vd}.positionWorld, lightShader)"),
            true,
        );
        stage.add_line("vec3 L = lightShader.direction", true);
        if options.hw_shadow_map {
            stage.add_line("if (activeLightIndex == 0)", false);
            stage.begin_scope(Brackets::Curly);
            stage.add_line(
                &format!("vec3 shadowCoord = ($shadowMatrix * vec4({vd}.positionWorld, 1.0)).xyz"),
                true,
            );
            stage.add_line("shadowCoord = shadowCoord * 0.5 + 0.5", true);
            stage.add_line("vec2 shadowMoments = texture($shadowMap, shadowCoord.xy).xy", true);
            stage.add_line("occlusion = mx_variance_shadow_occlusion(shadowMoments, shadowCoord.z)", true);
            stage.end_scope(false);
        }
        closure_block(emitter, stage, ClosureContext::Reflection, (node, input, closure), |bsdf| {
            format!("{out}.color += lightShader.intensity * {bsdf}")
        })?;
        stage.end_scope(false);
        stage.new_line();

        if options.hw_ambient_occlusion {
            stage.add_line(
                &format!("occlusion = mix(1.0, texture($ambOccMap, {vd}.texcoord_0).x, $ambOccGain)"),
                true,
            );
        }
        closure_block(emitter, stage, ClosureContext::Indirect, (node, input, closure), |bsdf| {
            format!("{out}.color += occlusion * {bsdf}")
        })?;
    }

    if let Some((input, closure)) = edf {
        closure_block(emitter, stage, ClosureContext::Emission, (node, input, closure), |edf| {
            format!("{out}.color += {edf}")
        })?;
    }

    if let Some((input, closure)) = bsdf.filter(|_| options.hw_transparency) {
        closure_block(emitter, stage, ClosureContext::Transmission, (node, input, closure), |bsdf| {
            format!("{out}.transparency += {bsdf}")
        })?;
    }

    stage.new_line();
    stage.add_line(&format!("{out}.color *= surfaceOpacity"), true);
    stage.add_line(
        &format!("{out}.transparency = mix(vec3(1.0), {out}.transparency, surfaceOpacity)"),
        true,
    );
    stage.end_scope(false);
    Ok(())
}
