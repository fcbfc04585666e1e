// SPDX-License-Identifier: MIT OR Apache-2.0
//! Geometric data read from interpolated vertex data (GLSL).

use super::ShaderNodeImpl;
use crate::error::Result;
use crate::generator::{CallOverrides, Emitter};
use crate::graph::NodeHandle;
use crate::stage::{block, ShaderStage, ShaderVariable, PIXEL_STAGE, VERTEX_STAGE};
use crate::types::TypeDesc;
use ordoplay_materialx_document::Value;

/// Instance name of the vertex data block
pub(crate) const VERTEX_DATA_INSTANCE: &str = "vd";

const WORLD_SPACE: i32 = 2;

fn integer_input(emitter: &Emitter<'_>, node: NodeHandle, name: &str) -> i32 {
    match emitter.node(node).input(name).and_then(|i| i.port.value.as_ref()) {
        Some(Value::Integer(i)) => *i,
        _ => 0,
    }
}

/// Vertex data member a geometric node reads
fn member(implementation: &ShaderNodeImpl, emitter: &Emitter<'_>, node: NodeHandle) -> (String, TypeDesc) {
    let world = integer_input(emitter, node, "space") == WORLD_SPACE;
    match implementation {
        ShaderNodeImpl::Position if world => ("positionWorld".into(), TypeDesc::Vector3),
        ShaderNodeImpl::Position => ("positionObject".into(), TypeDesc::Vector3),
        ShaderNodeImpl::Normal if world => ("normalWorld".into(), TypeDesc::Vector3),
        ShaderNodeImpl::Normal => ("normalObject".into(), TypeDesc::Vector3),
        _ => (
            format!("texcoord_{}", integer_input(emitter, node, "index")),
            TypeDesc::Vector2,
        ),
    }
}

/// Request a vertex data member in both stages
pub(crate) fn request_vertex_data(stages: &mut [ShaderStage], name: &str, ty: TypeDesc) {
    for stage in stages.iter_mut() {
        let stage_name = stage.name().to_string();
        let vertex_data = match stage_name.as_str() {
            VERTEX_STAGE => stage.create_output_block(block::VERTEX_DATA, VERTEX_DATA_INSTANCE),
            PIXEL_STAGE => stage.create_input_block(block::VERTEX_DATA, VERTEX_DATA_INSTANCE),
            _ => continue,
        };
        vertex_data.add_if_absent(ShaderVariable::new(ty, name));
    }
}

pub(super) fn create_variables(
    implementation: &ShaderNodeImpl,
    emitter: &Emitter<'_>,
    node: NodeHandle,
    stages: &mut [ShaderStage],
) -> Result<()> {
    let (name, ty) = member(implementation, emitter, node);
    request_vertex_data(stages, &name, ty);
    Ok(())
}

pub(super) fn emit_call(
    implementation: &ShaderNodeImpl,
    emitter: &mut Emitter<'_>,
    stage: &mut ShaderStage,
    node: NodeHandle,
    overrides: &CallOverrides,
) -> Result<()> {
    let (name, _) = member(implementation, emitter, node);
    let variable = format!("{VERTEX_DATA_INSTANCE}.{name}");
    let expression = match implementation {
        ShaderNodeImpl::Normal => format!("normalize({variable})"),
        _ => variable,
    };
    emitter.declare_output(stage, node, overrides, &expression)
}
