// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph finalization: elision of trivial nodes, interface publishing,
//! ordering and naming.

use super::{Classification, Downstream, NodeHandle, PortFlags, ShaderGraph, ShaderPort, Upstream};
use crate::error::Result;
use crate::options::ShaderInterfaceType;
use crate::syntax::Syntax;
use crate::types::TypeDesc;
use ordoplay_materialx_document::Value;

/// What a graph is finalized as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GraphKind {
    /// Top level shader with the given interface
    Shader(ShaderInterfaceType),
    /// Nested graph of a compound implementation
    Compound,
}

fn is_unconnected_value(graph: &ShaderGraph, node: NodeHandle, input: &str) -> Option<usize> {
    let shader_node = graph.node(node);
    let index = shader_node.input_index(input)?;
    shader_node.inputs[index].connection.is_none().then_some(index)
}

fn float_input(graph: &ShaderGraph, node: NodeHandle, index: usize) -> f32 {
    match &graph.node(node).inputs[index].port.value {
        Some(Value::Integer(i)) => *i as f32,
        Some(value) => value.as_float().unwrap_or(0.0),
        None => 0.0,
    }
}

impl ShaderGraph {
    pub(crate) fn finalize(&mut self, syntax: &Syntax, kind: GraphKind) -> Result<()> {
        self.optimize()?;
        self.publish_inputs(kind);
        for socket in &mut self.input_sockets {
            if !socket.connections.is_empty() && socket.port.ty.is_editable() {
                socket.port.flags |= PortFlags::PUBLISHED;
            }
        }
        self.topological_sort()?;
        self.set_variable_names(syntax);
        for (shader, closures) in self.used_closures() {
            tracing::debug!(
                "Shader node '{}' uses {} closure nodes",
                self.node(shader).name,
                closures.len()
            );
        }
        self.freeze_classification();
        Ok(())
    }

    /// Bypass constants and branches with a fixed selector until nothing changes
    fn optimize(&mut self) -> Result<()> {
        let mut changed = false;
        loop {
            let candidate = self.handles().iter().find_map(|&h| self.bypass_input(h).map(|input| (h, input)));
            let Some((node, input)) = candidate else { break };
            tracing::debug!("Bypassing '{}' through '{}'", self.node(node).name, self.node(node).inputs[input].port.name);
            self.bypass(node, input)?;
            self.remove_node(node);
            changed = true;
        }
        if changed {
            let reachable = self.reachable_nodes();
            let unreachable: Vec<NodeHandle> = self.handles().iter().copied().filter(|h| !reachable.contains(h)).collect();
            for handle in unreachable {
                tracing::debug!("Removing unreachable node '{}'", self.node(handle).name);
                self.remove_node(handle);
            }
        }
        Ok(())
    }

    /// Input a node can be replaced with, if any
    fn bypass_input(&self, node: NodeHandle) -> Option<usize> {
        let shader_node = self.node(node);
        if shader_node.outputs.len() != 1 {
            return None;
        }
        if shader_node.has_classification(Classification::CONSTANT) {
            return shader_node.input_index("value");
        }
        if shader_node.has_classification(Classification::IFELSE) {
            let intest = is_unconnected_value(self, node, "intest")?;
            let cutoff = is_unconnected_value(self, node, "cutoff")?;
            let branch = if float_input(self, node, intest) <= float_input(self, node, cutoff) {
                "in1"
            } else {
                "in2"
            };
            return shader_node.input_index(branch);
        }
        if shader_node.has_classification(Classification::SWITCH) {
            let which = is_unconnected_value(self, node, "which")?;
            let branches: Vec<usize> = shader_node
                .inputs
                .iter()
                .enumerate()
                .filter(|(_, i)| i.port.name.starts_with("in"))
                .map(|(index, _)| index)
                .collect();
            let last = branches.len().checked_sub(1)?;
            let selected = float_input(self, node, which).floor().max(0.0) as usize;
            return branches.get(selected.min(last)).copied();
        }
        None
    }

    /// Rewire the downstream of a node to one of its inputs
    fn bypass(&mut self, node: NodeHandle, input: usize) -> Result<()> {
        let source = self.node(node).inputs[input].clone();
        let downstream: Vec<Downstream> = self.node(node).outputs[0].connections.clone();
        self.disconnect_node(node);
        for to in downstream {
            match source.connection {
                Some(from) => self.connect(from, to)?,
                None => self.downstream_mut(to).port.value = source.port.value.clone(),
            }
        }
        Ok(())
    }

    /// Turn unconnected node inputs into input sockets
    fn publish_inputs(&mut self, kind: GraphKind) {
        let mut published = Vec::new();
        for (handle, node) in self.nodes() {
            if node.has_classification(Classification::GEOMETRIC) {
                continue;
            }
            for (index, input) in node.inputs.iter().enumerate() {
                let port = &input.port;
                if input.connection.is_some() || port.has_flag(PortFlags::HIDDEN) || !port.ty.is_editable() {
                    continue;
                }
                let filename = port.ty == TypeDesc::Filename;
                let publish = match kind {
                    GraphKind::Shader(ShaderInterfaceType::Complete) => filename || port.ty != TypeDesc::String,
                    GraphKind::Shader(ShaderInterfaceType::Reduced) | GraphKind::Compound => filename,
                };
                if publish {
                    published.push((handle, index, format!("{}_{}", node.name, port.name)));
                }
            }
        }

        for (node, input, name) in published {
            let source = &self.node(node).inputs[input].port;
            let mut port = ShaderPort::new(&name, source.ty);
            port.value = source.value.clone();
            port.path = source.path.clone();
            port.enum_names = source.enum_names.clone();
            port.unit_type = source.unit_type.clone();
            port.flags = source.flags & PortFlags::UNIFORM;
            if kind == GraphKind::Compound {
                port.flags |= PortFlags::HIDDEN;
            }
            let socket = self.add_input_socket(port);
            self.downstream_mut(Downstream::Node { node, input }).connection = Some(Upstream::Socket(socket));
            self.input_sockets[socket].connections.push(Downstream::Node { node, input });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TargetKind;
    use crate::graph::ShaderNode;

    fn node(name: &str, class: Classification, inputs: &[(&str, TypeDesc, Option<Value>)]) -> ShaderNode {
        let mut node = ShaderNode::new(name, "ND_test");
        node.classification = class;
        for (input, ty, value) in inputs {
            node.add_input(*input, *ty).port.value = value.clone();
        }
        node.add_output("out", TypeDesc::Float);
        node
    }

    fn syntax() -> Syntax {
        Syntax::for_target(TargetKind::Glsl)
    }

    fn output_graph() -> ShaderGraph {
        let mut graph = ShaderGraph::new("g");
        graph.add_output_socket(ShaderPort::new("out", TypeDesc::Float));
        graph
    }

    #[test]
    fn test_constant_value_is_copied_downstream() {
        let mut graph = output_graph();
        let constant = graph
            .add_node(node("c", Classification::TEXTURE | Classification::CONSTANT, &[("value", TypeDesc::Float, Some(Value::Float(0.5)))]))
            .unwrap();
        graph
            .connect(Upstream::Node { node: constant, output: 0 }, Downstream::Socket(0))
            .unwrap();
        graph.finalize(&syntax(), GraphKind::Shader(ShaderInterfaceType::Complete)).unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.output_sockets()[0].port.value, Some(Value::Float(0.5)));
        assert_eq!(graph.output_sockets()[0].connection, None);
    }

    #[test]
    fn test_compare_with_literal_selector_is_bypassed() {
        let mut graph = output_graph();
        let a = graph.add_node(node("a", Classification::TEXTURE, &[("in1", TypeDesc::Float, None)])).unwrap();
        let b = graph.add_node(node("b", Classification::TEXTURE, &[("in1", TypeDesc::Float, None)])).unwrap();
        let compare = graph
            .add_node(node(
                "cmp",
                Classification::TEXTURE | Classification::CONDITIONAL | Classification::IFELSE,
                &[
                    ("intest", TypeDesc::Float, Some(Value::Float(0.75))),
                    ("cutoff", TypeDesc::Float, Some(Value::Float(0.5))),
                    ("in1", TypeDesc::Float, None),
                    ("in2", TypeDesc::Float, None),
                ],
            ))
            .unwrap();
        graph.connect(Upstream::Node { node: a, output: 0 }, Downstream::Node { node: compare, input: 2 }).unwrap();
        graph.connect(Upstream::Node { node: b, output: 0 }, Downstream::Node { node: compare, input: 3 }).unwrap();
        graph.connect(Upstream::Node { node: compare, output: 0 }, Downstream::Socket(0)).unwrap();
        graph.finalize(&syntax(), GraphKind::Shader(ShaderInterfaceType::Reduced)).unwrap();

        assert_eq!(graph.handles(), &[b]);
        assert_eq!(graph.output_sockets()[0].connection, Some(Upstream::Node { node: b, output: 0 }));
    }

    #[test]
    fn test_switch_selector_is_clamped() {
        let mut graph = output_graph();
        let switch = graph
            .add_node(node(
                "sw",
                Classification::TEXTURE | Classification::CONDITIONAL | Classification::SWITCH,
                &[
                    ("in1", TypeDesc::Float, Some(Value::Float(1.0))),
                    ("in2", TypeDesc::Float, Some(Value::Float(2.0))),
                    ("which", TypeDesc::Float, Some(Value::Float(7.0))),
                ],
            ))
            .unwrap();
        graph.connect(Upstream::Node { node: switch, output: 0 }, Downstream::Socket(0)).unwrap();
        graph.finalize(&syntax(), GraphKind::Shader(ShaderInterfaceType::Reduced)).unwrap();
        assert_eq!(graph.output_sockets()[0].port.value, Some(Value::Float(2.0)));
    }

    #[test]
    fn test_publishing_per_interface() {
        let build = |kind| {
            let mut graph = output_graph();
            let tex = graph
                .add_node(node(
                    "tex",
                    Classification::TEXTURE | Classification::FILETEXTURE,
                    &[
                        ("file", TypeDesc::Filename, Some(Value::Filename("a.png".into()))),
                        ("gain", TypeDesc::Float, Some(Value::Float(2.0))),
                    ],
                ))
                .unwrap();
            graph.connect(Upstream::Node { node: tex, output: 0 }, Downstream::Socket(0)).unwrap();
            graph.finalize(&syntax(), kind).unwrap();
            graph
        };

        let complete = build(GraphKind::Shader(ShaderInterfaceType::Complete));
        let names: Vec<&str> = complete.input_sockets().iter().map(|s| s.port.name.as_str()).collect();
        assert_eq!(names, ["tex_file", "tex_gain"]);
        assert!(complete.input_sockets().iter().all(|s| s.port.has_flag(PortFlags::PUBLISHED)));
        assert_eq!(complete.input_sockets()[1].port.value, Some(Value::Float(2.0)));

        let reduced = build(GraphKind::Shader(ShaderInterfaceType::Reduced));
        assert_eq!(reduced.input_sockets().len(), 1);

        let compound = build(GraphKind::Compound);
        assert_eq!(compound.input_sockets().len(), 1);
        assert!(compound.input_sockets()[0].port.has_flag(PortFlags::HIDDEN));
    }
}
