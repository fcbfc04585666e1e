// SPDX-License-Identifier: MIT OR Apache-2.0
//! Closure operators: layer, mix, add and multiply.
//!
//! Operand handling is shared; the expressions themselves come from the
//! target backend through [`HasClosureComposition`].

use crate::error::{GraphStructureError, Result};
use crate::generator::{CallOverrides, Emitter, HasClosureComposition};
use crate::graph::{NodeHandle, Upstream};
use crate::stage::ShaderStage;

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

fn operand(emitter: &Emitter<'_>, node: NodeHandle, name: &str, overrides: &CallOverrides) -> Result<String> {
    let index = input_index(emitter, node, name)?;
    emitter.input_expression(node, index, overrides)
}

fn backend<'g>(emitter: &Emitter<'g>) -> &'g dyn HasClosureComposition {
    emitter.generator.closure_composition()
}

pub(super) fn emit_layer(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let top = input_index(emitter, node, "top")?;
    let base = input_index(emitter, node, "base")?;
    let shader_node = emitter.node(node);
    if let Some(Upstream::Node { node: up, .. }) = shader_node.inputs[base].connection {
        emitter.emit_call(stage, up)?;
    }
    let base = emitter.input_expression(node, base, overrides)?;
    let top = match shader_node.inputs[top].connection {
        Some(Upstream::Node { node: up, .. }) => Some(up),
        _ => None,
    };
    backend(emitter).emit_layer(emitter, stage, node, overrides, top, &base)
}

/// Re-emit `top` with its hidden `base` input bound to `base`
///
/// The call writes straight into the output variable of the layer node.
/// Returns false when `top` has no `base` input and can not be layered.
pub(crate) fn layer_by_override(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
    top: NodeHandle,
    base: &str,
) -> Result<bool> {
    if emitter.node(top).input_index("base").is_none() {
        return Ok(false);
    }
    let layered = CallOverrides {
        inputs: vec![("base".to_string(), base.to_string())],
        output: Some(emitter.output_variable(node, 0, overrides)),
    };
    emitter.emit_call_with(stage, top, &layered)?;
    Ok(true)
}

pub(super) fn emit_mix(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let fg = operand(emitter, node, "fg", overrides)?;
    let bg = operand(emitter, node, "bg", overrides)?;
    let weight = operand(emitter, node, "mix", overrides)?;
    let expression = backend(emitter).mix(&fg, &bg, &weight);
    emitter.declare_output(stage, node, overrides, &expression)
}

pub(super) fn emit_add(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let in1 = operand(emitter, node, "in1", overrides)?;
    let in2 = operand(emitter, node, "in2", overrides)?;
    let expression = backend(emitter).add(&in1, &in2);
    emitter.declare_output(stage, node, overrides, &expression)
}

pub(super) fn emit_multiply(
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let in1 = operand(emitter, node, "in1", overrides)?;
    let index = input_index(emitter, node, "in2")?;
    let weight_type = emitter.node(node).inputs[index].port.ty;
    let in2 = emitter.input_expression(node, index, overrides)?;
    let expression = backend(emitter).multiply(&in1, &in2, weight_type);
    emitter.declare_output(stage, node, overrides, &expression)
}
