// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structural implementations emitted directly by the generator.
//!
//! These nodes have no library source: their code depends on input values
//! or types known only at generation time.

use crate::error::{GraphStructureError, Result};
use crate::generator::{CallOverrides, Emitter, TargetKind};
use crate::graph::{Classification, NodeHandle, Upstream};
use crate::stage::{Brackets, ShaderStage};
use crate::types::TypeDesc;
use ordoplay_materialx_document::{format_float, Value};

fn input_index(emitter: &Emitter<'_>, node: NodeHandle, name: &str) -> Result<usize> {
    let shader_node = emitter.node(node);
    shader_node.input_index(name).ok_or_else(|| {
        GraphStructureError::PortNotFound {
            port: name.to_string(),
            node: shader_node.name.clone(),
        }
        .into()
    })
}

fn output_type(emitter: &Emitter<'_>, node: NodeHandle) -> Result<TypeDesc> {
    let shader_node = emitter.node(node);
    shader_node.output_type().ok_or_else(|| {
        GraphStructureError::InvalidNode {
            node: shader_node.name.clone(),
            reason: "node has no output".into(),
        }
        .into()
    })
}

fn member(emitter: &Emitter<'_>, ty: TypeDesc, index: usize, variable: &str) -> Result<String> {
    let syntax = emitter.syntax().type_syntax(ty)?;
    Ok(syntax.member(index, variable).unwrap_or_else(|| variable.to_string()))
}

// ============================================================================
// Channels
// ============================================================================

pub(super) fn emit_swizzle(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let input = input_index(emitter, node, "in")?;
    let channels_index = input_index(emitter, node, "channels")?;
    let shader_node = emitter.node(node);
    let from = shader_node.inputs[input].port.ty;
    let to = output_type(emitter, node)?;
    let channels = shader_node.inputs[channels_index]
        .port
        .value
        .as_ref()
        .and_then(Value::as_str)
        .unwrap_or_default();

    let variable = emitter.input_expression(node, input, overrides)?;
    let expression = if channels.is_empty() && from == to {
        variable
    } else {
        emitter.syntax().swizzled_variable(&variable, from, channels, to)?
    };
    emitter.declare_output(stage, node, overrides, &expression)
}

pub(super) fn emit_convert(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let input = input_index(emitter, node, "in")?;
    let from = emitter.node(node).inputs[input].port.ty;
    let to = output_type(emitter, node)?;
    let variable = emitter.input_expression(node, input, overrides)?;

    let expression = if from.is_scalar() && to.is_scalar() {
        format!("{}({variable})", emitter.syntax().type_name(to)?)
    } else if from.is_scalar() {
        let parts = vec![variable; to.size()];
        emitter.syntax().aggregate(to, &parts)?
    } else {
        let parts = (0..to.size())
            .map(|i| match i {
                i if i < from.size() => member(emitter, from, i, &variable),
                3 => Ok("1.0".to_string()),
                _ => Ok("0.0".to_string()),
            })
            .collect::<Result<Vec<_>>>()?;
        emitter.syntax().aggregate(to, &parts)?
    };
    emitter.declare_output(stage, node, overrides, &expression)
}

pub(super) fn emit_combine(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let to = output_type(emitter, node)?;
    let mut parts = Vec::new();
    for (index, input) in emitter.node(node).inputs.iter().enumerate() {
        let variable = emitter.input_expression(node, index, overrides)?;
        let ty = input.port.ty;
        if ty.is_scalar() {
            parts.push(variable);
        } else {
            for i in 0..ty.size() {
                parts.push(member(emitter, ty, i, &variable)?);
            }
        }
    }
    let expression = emitter.syntax().aggregate(to, &parts)?;
    emitter.declare_output(stage, node, overrides, &expression)
}

// ============================================================================
// Conditionals
// ============================================================================

pub(super) fn emit_switch(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let which = input_index(emitter, node, "which")?;
    let which = emitter.input_expression(node, which, overrides)?;
    let shader_node = emitter.node(node);
    let branches = shader_node
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| input.port.name.starts_with("in"))
        .map(|(index, _)| emitter.input_expression(node, index, overrides))
        .collect::<Result<Vec<_>>>()?;

    if emitter.target() == TargetKind::Mdl {
        let mut expression = branches.last().cloned().unwrap_or_default();
        for (k, branch) in branches.iter().enumerate().rev().skip(1) {
            expression = format!("{which} < {} ? {branch} : ({expression})", format_float((k + 1) as f32));
        }
        return emitter.declare_output(stage, node, overrides, &expression);
    }

    emitter.declare_outputs(stage, node, overrides)?;
    let output = emitter.output_variable(node, 0, overrides);
    let last = branches.len().saturating_sub(1);
    for (k, branch) in branches.iter().enumerate() {
        let condition = format!("{which} < {}", format_float((k + 1) as f32));
        match k {
            0 => stage.add_line(&format!("if ({condition})"), false),
            k if k == last => stage.add_line("else", false),
            _ => stage.add_line(&format!("else if ({condition})"), false),
        }
        stage.begin_scope(Brackets::Curly);
        stage.add_line(&format!("{output} = {branch}"), true);
        stage.end_scope(false);
    }
    Ok(())
}

pub(super) fn emit_compare(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let reader: &Emitter<'_> = emitter;
    let operand = |name: &str| -> Result<String> {
        let index = input_index(reader, node, name)?;
        reader.input_expression(node, index, overrides)
    };
    let intest = operand("intest")?;
    let cutoff = operand("cutoff")?;
    let in1 = operand("in1")?;
    let in2 = operand("in2")?;

    if emitter.target() == TargetKind::Mdl {
        let expression = format!("{intest} <= {cutoff} ? {in1} : {in2}");
        return emitter.declare_output(stage, node, overrides, &expression);
    }

    emitter.declare_outputs(stage, node, overrides)?;
    let output = emitter.output_variable(node, 0, overrides);
    stage.add_line(&format!("if ({intest} <= {cutoff})"), false);
    stage.begin_scope(Brackets::Curly);
    stage.add_line(&format!("{output} = {in1}"), true);
    stage.end_scope(false);
    stage.add_line("else", false);
    stage.begin_scope(Brackets::Curly);
    stage.add_line(&format!("{output} = {in2}"), true);
    stage.end_scope(false);
    Ok(())
}

// ============================================================================
// Convolution
// ============================================================================

/// Kernel width for a blur size
pub(crate) fn kernel_width(size: f32) -> usize {
    match size {
        s if s <= 0.0 => 1,
        s if s < 0.333 => 3,
        s if s < 0.666 => 5,
        _ => 7,
    }
}

/// Row major kernel weights
pub(crate) fn kernel_weights(width: usize, gaussian: bool) -> Vec<f32> {
    if !gaussian {
        return vec![1.0 / (width * width) as f32; width * width];
    }
    let row: &[f32] = match width {
        3 => &[1.0, 2.0, 1.0],
        5 => &[1.0, 4.0, 6.0, 4.0, 1.0],
        7 => &[1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0],
        _ => &[1.0],
    };
    let sum: f32 = row.iter().sum();
    row.iter()
        .flat_map(|y| row.iter().map(move |x| x * y / (sum * sum)))
        .collect()
}

pub(super) fn emit_blur(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let input = input_index(emitter, node, "in")?;
    let size = input_index(emitter, node, "size")?;
    let filter = input_index(emitter, node, "filtertype")?;
    let shader_node = emitter.node(node);

    let size_port = &shader_node.inputs[size];
    let width = if size_port.connection.is_some() {
        3
    } else {
        kernel_width(size_port.port.value.as_ref().and_then(Value::as_float).unwrap_or(0.0))
    };
    let gaussian = matches!(
        shader_node.inputs[filter].port.value,
        Some(Value::Integer(1))
    ) || shader_node.inputs[filter].port.value.as_ref().and_then(Value::as_str) == Some("gaussian");

    let sampler = match shader_node.inputs[input].connection {
        Some(Upstream::Node { node: up, .. }) if emitter.node(up).has_classification(Classification::SAMPLE2D) => {
            emitter.node(up).input_index("texcoord").map(|tc| (up, tc))
        }
        _ => None,
    };
    let Some((sampler, texcoord)) = sampler.filter(|_| width > 1) else {
        let value = emitter.input_expression(node, input, overrides)?;
        return emitter.declare_output(stage, node, overrides, &value);
    };

    let output = emitter.output_variable(node, 0, overrides);
    let texcoord = emitter.input_expression(sampler, texcoord, &CallOverrides::default())?;
    let size_expression = emitter.input_expression(node, size, overrides)?;
    let step = format!("{output}_step");
    let float = emitter.syntax().type_name(TypeDesc::Float)?;
    stage.add_line(
        &format!("{float} {step} = {size_expression} / {}", format_float(width as f32)),
        true,
    );

    let radius = (width / 2) as i32;
    let weights = kernel_weights(width, gaussian);
    let mut terms = Vec::with_capacity(weights.len());
    let mut k = 0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let offset = emitter.syntax().aggregate(
                TypeDesc::Vector2,
                &[
                    format!("{} * {step}", format_float(dx as f32)),
                    format!("{} * {step}", format_float(dy as f32)),
                ],
            )?;
            let sample = format!("{output}_sample{k}");
            let sample_overrides = CallOverrides {
                inputs: vec![("texcoord".to_string(), format!("{texcoord} + {offset}"))],
                output: Some(sample.clone()),
            };
            emitter.emit_call_with(stage, sampler, &sample_overrides)?;
            terms.push(format!("{} * {sample}", format_float(weights[k])));
            k += 1;
        }
    }
    emitter.declare_output(stage, node, overrides, &terms.join(" + "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShaderGenerator;
    use crate::stage::PIXEL_STAGE;
    use crate::test_util;
    use ordoplay_materialx_document::{Document, ElementRef, Node, NodeInput, Output};

    /// Channel and conditional nodes driven by a texture coordinate
    ///
    /// `fixed` and `pick` have literal selectors and fold away: `fixed`
    /// leaves 0.3 in `cmp.cutoff`, `pick` forwards `sw` into `mixed.mix`.
    fn structural_doc() -> Document {
        let mut doc = Document::new("structural");
        doc.import_library(&test_util::library());
        let nodes = [
            Node::new("uv", "texcoord", "vector2"),
            Node::new("u", "swizzle", "float")
                .with_input(NodeInput::connected("in", "vector2", "uv"))
                .with_input(NodeInput::value("channels", Value::String("x".into()))),
            Node::new("uvw", "convert", "vector3").with_input(NodeInput::connected("in", "vector2", "uv")),
            Node::new("uvc", "convert", "color3").with_input(NodeInput::connected("in", "vector3", "uvw")),
            Node::new("col", "combine", "color3")
                .with_input(NodeInput::connected("in1", "float", "u"))
                .with_input(NodeInput::value("in2", Value::Float(0.5)))
                .with_input(NodeInput::value("in3", Value::Float(1.0))),
            Node::new("sw", "switch", "float")
                .with_input(NodeInput::value("in1", Value::Float(0.1)))
                .with_input(NodeInput::value("in2", Value::Float(0.2)))
                .with_input(NodeInput::value("in3", Value::Float(0.3)))
                .with_input(NodeInput::connected("which", "float", "u")),
            Node::new("fixed", "switch", "float")
                .with_input(NodeInput::value("in1", Value::Float(0.1)))
                .with_input(NodeInput::value("in2", Value::Float(0.2)))
                .with_input(NodeInput::value("in3", Value::Float(0.3)))
                .with_input(NodeInput::value("which", Value::Float(2.0))),
            Node::new("cmp", "compare", "color3")
                .with_input(NodeInput::connected("intest", "float", "u"))
                .with_input(NodeInput::connected("cutoff", "float", "fixed"))
                .with_input(NodeInput::connected("in1", "color3", "col"))
                .with_input(NodeInput::value("in2", Value::Color3([0.0, 0.0, 1.0]))),
            Node::new("pick", "compare", "float")
                .with_input(NodeInput::value("intest", Value::Float(0.8)))
                .with_input(NodeInput::value("cutoff", Value::Float(0.5)))
                .with_input(NodeInput::value("in1", Value::Float(0.25)))
                .with_input(NodeInput::connected("in2", "float", "sw")),
            Node::new("mixed", "mix", "color3")
                .with_input(NodeInput::connected("fg", "color3", "cmp"))
                .with_input(NodeInput::connected("bg", "color3", "uvc"))
                .with_input(NodeInput::connected("mix", "float", "pick")),
        ];
        for node in nodes {
            doc.add_node(node).unwrap();
        }
        doc.add_output(Output::new("result", "color3", "mixed")).unwrap();
        doc
    }

    fn blur_doc(size: f32) -> Document {
        let mut doc = Document::new("blur");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("tex", "image", "color3").with_input(NodeInput::value("file", Value::Filename("wood.png".into()))),
        )
        .unwrap();
        doc.add_node(
            Node::new("blurred", "blur", "color3")
                .with_input(NodeInput::connected("in", "color3", "tex"))
                .with_input(NodeInput::value("size", Value::Float(size))),
        )
        .unwrap();
        doc.add_output(Output::new("result", "color3", "blurred")).unwrap();
        doc
    }

    fn generate(generator: &ShaderGenerator, doc: &Document) -> String {
        let shader = generator
            .generate(&mut test_util::reduced_context(), doc, &ElementRef::output("result"))
            .unwrap();
        shader.stage(PIXEL_STAGE).unwrap().code().to_string()
    }

    #[test]
    fn test_channel_nodes_in_glsl() {
        let code = generate(&ShaderGenerator::glsl(), &structural_doc());
        assert!(code.contains("float u_out = uv_out.x;"));
        assert!(code.contains("vec3 uvw_out = vec3(uv_out.x, uv_out.y, 0.0);"));
        assert!(code.contains("vec3 uvc_out = vec3(uvw_out.x, uvw_out.y, uvw_out.z);"));
        assert!(code.contains("vec3 col_out = vec3(u_out, 0.5, 1.0);"));
    }

    #[test]
    fn test_conditionals_in_glsl() {
        let code = generate(&ShaderGenerator::glsl(), &structural_doc());
        assert!(code.contains("float sw_out = 0.0;"));
        assert!(code.contains("if (u_out < 1.0)"));
        assert!(code.contains("sw_out = 0.1;"));
        assert!(code.contains("else if (u_out < 2.0)"));
        assert!(code.contains("sw_out = 0.2;"));
        assert!(code.contains("if (u_out <= 0.3)"));
        assert!(code.contains("cmp_out = col_out;"));
        assert!(code.contains("cmp_out = vec3(0.0, 0.0, 1.0);"));
        assert!(code.contains("vec3 mixed_out = mix(uvc_out, cmp_out, sw_out);"));
        assert!(!code.contains("fixed_out"));
        assert!(!code.contains("pick_out"));
    }

    #[test]
    fn test_structural_nodes_in_mdl() {
        let code = generate(&ShaderGenerator::mdl(), &structural_doc());
        assert!(code.contains("float u_out = uv_out.x;"));
        assert!(code.contains("float3 uvw_out = float3(uv_out.x, uv_out.y, 0.0);"));
        assert!(code.contains("color col_out = color(u_out, 0.5, 1.0);"));
        assert!(code.contains("float sw_out = u_out < 1.0 ? 0.1 : (u_out < 2.0 ? 0.2 : (u_out < 3.0 ? 0.3 : ("));
        assert!(code.contains("color cmp_out = u_out <= 0.3 ? col_out : color(0.0, 0.0, 1.0);"));
        assert!(code.contains("math::lerp(uvc_out, cmp_out, sw_out)"));
        assert!(!code.contains("fixed_out"));
        assert!(!code.contains("pick_out"));
    }

    #[test]
    fn test_blur_resamples_texture() {
        for generator in [ShaderGenerator::glsl(), ShaderGenerator::mdl()] {
            let code = generate(&generator, &blur_doc(0.2));
            assert!(code.contains("float blurred_out_step = 0.2 / 3.0;"));
            assert!(code.contains("-1.0 * blurred_out_step, -1.0 * blurred_out_step)"));
            assert!(code.contains("* blurred_out_sample0 + "));
            assert!(code.contains("* blurred_out_sample8;"));
            assert!(!code.contains("blurred_out_sample9"));
        }
    }

    #[test]
    fn test_zero_size_blur_passes_through() {
        let code = generate(&ShaderGenerator::glsl(), &blur_doc(0.0));
        assert!(code.contains("vec3 blurred_out = tex_out;"));
        assert!(!code.contains("blurred_out_step"));
    }

    #[test]
    fn test_kernel_width() {
        assert_eq!(kernel_width(0.0), 1);
        assert_eq!(kernel_width(0.2), 3);
        assert_eq!(kernel_width(0.5), 5);
        assert_eq!(kernel_width(1.0), 7);
    }

    #[test]
    fn test_kernel_weights_sum_to_one() {
        for width in [3, 5, 7] {
            for gaussian in [false, true] {
                let weights = kernel_weights(width, gaussian);
                assert_eq!(weights.len(), width * width);
                let sum: f32 = weights.iter().sum();
                assert!((sum - 1.0).abs() < 1e-5, "width {width} gaussian {gaussian}: {sum}");
            }
        }
        let gaussian = kernel_weights(3, true);
        assert!((gaussian[4] - 0.25).abs() < 1e-6);
        assert!((gaussian[0] - 0.0625).abs() < 1e-6);
    }
}
