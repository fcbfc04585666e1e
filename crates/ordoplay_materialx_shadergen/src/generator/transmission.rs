// SPDX-License-Identifier: MIT OR Apache-2.0
//! Uniform transmission IOR rewrite for MDL versions before 1.9.
//!
//! Those versions reject varying data on the IOR of transmissive BSDFs.
//! Socket fed IORs keep their connection and the socket becomes uniform,
//! constants are inlined and any other connection is broken so the input
//! falls back to its literal value. Running the pass twice changes nothing.

use crate::context::{GenContext, ImplId};
use crate::graph::{Classification, Downstream, NodeHandle, PortFlags, ShaderGraph, ShaderNode, Upstream};
use crate::impls::ShaderNodeImpl;
use ordoplay_materialx_document::Value;

const IOR: &str = "ior";

/// Where an IOR input gets its value from
enum IorSource {
    Unconnected,
    Socket(usize),
    Constant(Option<Value>),
    Varying,
}

pub(crate) fn fix_transmission_ior(graph: &mut ShaderGraph, context: &mut GenContext) {
    if !graph.has_classification(Classification::SHADER) && !graph.has_classification(Classification::CLOSURE) {
        return;
    }
    if check_dependencies(graph, context) {
        mark_uniform(graph);
    }
}

/// Closure nodes that may transmit light
fn transmits(node: &ShaderNode) -> bool {
    node.has_classification(Classification::BSDF_T)
        || (node.has_classification(Classification::BSDF) && !node.has_classification(Classification::BSDF_R))
}

fn take_subgraph(context: &mut GenContext, id: ImplId) -> Option<ShaderGraph> {
    match context.implementation_mut(id) {
        ShaderNodeImpl::Compound(compound) => Some(std::mem::take(&mut compound.graph)),
        _ => None,
    }
}

fn restore_subgraph(context: &mut GenContext, id: ImplId, graph: ShaderGraph) {
    if let ShaderNodeImpl::Compound(compound) = context.implementation_mut(id) {
        compound.graph = graph;
    }
}

fn ior_source(graph: &ShaderGraph, node: NodeHandle, input: usize) -> IorSource {
    match graph.node(node).inputs[input].connection {
        None => IorSource::Unconnected,
        Some(Upstream::Socket(socket)) => IorSource::Socket(socket),
        Some(Upstream::Node { node: up, .. }) => {
            let upstream = graph.node(up);
            if upstream.has_classification(Classification::CONSTANT) {
                IorSource::Constant(upstream.input("value").and_then(|i| i.port.value.clone()))
            } else {
                IorSource::Varying
            }
        }
    }
}

fn flag_socket(graph: &mut ShaderGraph, socket: usize) {
    if let Some(socket) = graph.input_socket_mut(socket) {
        socket.port.flags |= PortFlags::TRANSMISSION_IOR_DEPENDENCY;
    }
}

fn inline_constant(graph: &mut ShaderGraph, node: NodeHandle, input: usize, value: Option<Value>) {
    if let Some(value) = value {
        graph.node_mut(node).inputs[input].port.value = Some(value);
    }
    graph.disconnect(Downstream::Node { node, input });
}

/// Flag sockets feeding transmission IOR, returning whether any was found
fn check_dependencies(graph: &mut ShaderGraph, context: &mut GenContext) -> bool {
    let mut dependent = false;
    for handle in graph.handles().to_vec() {
        let compound = graph
            .node(handle)
            .implementation
            .and_then(|id| take_subgraph(context, id).map(|sub| (id, sub)));
        if let Some((id, mut sub)) = compound {
            if check_dependencies(&mut sub, context) {
                dependent |= resolve_compound(graph, handle, &mut sub, context);
            }
            restore_subgraph(context, id, sub);
            continue;
        }

        if !transmits(graph.node(handle)) {
            continue;
        }
        let Some(input) = graph.node(handle).input_index(IOR) else {
            continue;
        };
        match ior_source(graph, handle, input) {
            IorSource::Unconnected => {}
            IorSource::Socket(socket) => {
                flag_socket(graph, socket);
                dependent = true;
            }
            IorSource::Constant(value) => {
                tracing::debug!("Inlining constant transmission IOR of '{}'", graph.node(handle).name);
                inline_constant(graph, handle, input, value);
            }
            IorSource::Varying => {
                tracing::debug!("Breaking varying transmission IOR of '{}'", graph.node(handle).name);
                graph.disconnect(Downstream::Node { node: handle, input });
            }
        }
    }
    dependent
}

/// Resolve the outer inputs of a compound whose sockets feed transmission IOR
fn resolve_compound(graph: &mut ShaderGraph, node: NodeHandle, sub: &mut ShaderGraph, context: &mut GenContext) -> bool {
    let flagged: Vec<(usize, String)> = sub
        .input_sockets()
        .iter()
        .enumerate()
        .filter(|(_, s)| s.port.has_flag(PortFlags::TRANSMISSION_IOR_DEPENDENCY))
        .map(|(index, s)| (index, s.port.name.clone()))
        .collect();

    let mut dependent = false;
    let mut varying = false;
    for (_, name) in &flagged {
        let Some(input) = graph.node(node).input_index(name) else {
            continue;
        };
        match ior_source(graph, node, input) {
            IorSource::Unconnected => {}
            IorSource::Socket(socket) => {
                flag_socket(graph, socket);
                dependent = true;
            }
            IorSource::Constant(value) => inline_constant(graph, node, input, value),
            IorSource::Varying => varying = true,
        }
    }

    if varying {
        tracing::debug!(
            "Varying IOR reaches compound '{}', disconnecting its transmission IORs",
            graph.node(node).name
        );
        disconnect_transmission_ior(sub, context);
        for (socket, _) in flagged {
            if let Some(socket) = sub.input_socket_mut(socket) {
                socket.port.flags.remove(PortFlags::TRANSMISSION_IOR_DEPENDENCY);
            }
        }
    } else {
        mark_uniform(sub);
    }
    dependent
}

/// Break every connection into a transmission IOR of a graph and its compounds
fn disconnect_transmission_ior(graph: &mut ShaderGraph, context: &mut GenContext) {
    for handle in graph.handles().to_vec() {
        let compound = graph
            .node(handle)
            .implementation
            .and_then(|id| take_subgraph(context, id).map(|sub| (id, sub)));
        if let Some((id, mut sub)) = compound {
            if sub.has_classification(Classification::SHADER) || sub.has_classification(Classification::CLOSURE) {
                disconnect_transmission_ior(&mut sub, context);
            }
            restore_subgraph(context, id, sub);
        } else if transmits(graph.node(handle)) {
            if let Some(input) = graph.node(handle).input_index(IOR) {
                graph.disconnect(Downstream::Node { node: handle, input });
            }
        }
    }
}

fn mark_uniform(graph: &mut ShaderGraph) {
    for index in 0..graph.input_sockets().len() {
        if let Some(socket) = graph.input_socket_mut(index) {
            if socket.port.has_flag(PortFlags::TRANSMISSION_IOR_DEPENDENCY) {
                socket.port.flags |= PortFlags::UNIFORM;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TargetKind;
    use crate::graph::ShaderPort;
    use crate::impls::CompoundImpl;
    use crate::syntax::Syntax;
    use crate::test_util;
    use crate::types::TypeDesc;

    fn bsdf(name: &str) -> ShaderNode {
        let mut node = ShaderNode::new(name, "ND_dielectric_bsdf");
        node.classification = Classification::CLOSURE | Classification::BSDF;
        node.add_input("ior", TypeDesc::Float).port.value = Some(Value::Float(1.5));
        node.add_output("out", TypeDesc::Bsdf);
        node
    }

    fn noise(name: &str) -> ShaderNode {
        let mut node = ShaderNode::new(name, "ND_noise2d_float");
        node.classification = Classification::TEXTURE;
        node.add_output("out", TypeDesc::Float);
        node
    }

    fn constant(name: &str, value: f32) -> ShaderNode {
        let mut node = ShaderNode::new(name, "ND_constant_float");
        node.classification = Classification::TEXTURE | Classification::CONSTANT;
        node.add_input("value", TypeDesc::Float).port.value = Some(Value::Float(value));
        node.add_output("out", TypeDesc::Float);
        node
    }

    fn ior_input(graph: &ShaderGraph, node: &str) -> Downstream {
        Downstream::Node {
            node: graph.node_by_name(node).unwrap(),
            input: 0,
        }
    }

    fn out(graph: &ShaderGraph, node: &str) -> Upstream {
        Upstream::Node {
            node: graph.node_by_name(node).unwrap(),
            output: 0,
        }
    }

    /// Root graph with a socket fed, a constant fed and a varying fed BSDF
    fn root_graph() -> ShaderGraph {
        let mut graph = ShaderGraph::new("root");
        graph.add_input_socket(ShaderPort::new("ior", TypeDesc::Float));
        graph.add_output_socket(ShaderPort::new("out", TypeDesc::Bsdf));
        for node in [bsdf("from_socket"), bsdf("from_constant"), bsdf("from_noise")] {
            graph.add_node(node).unwrap();
        }
        graph.add_node(constant("c", 1.33)).unwrap();
        graph.add_node(noise("n")).unwrap();
        let to = ior_input(&graph, "from_socket");
        graph.connect(Upstream::Socket(0), to).unwrap();
        let (from, to) = (out(&graph, "c"), ior_input(&graph, "from_constant"));
        graph.connect(from, to).unwrap();
        let (from, to) = (out(&graph, "n"), ior_input(&graph, "from_noise"));
        graph.connect(from, to).unwrap();
        let from = out(&graph, "from_socket");
        graph.connect(from, Downstream::Socket(0)).unwrap();
        graph
    }

    #[test]
    fn test_root_graph_rewrite() {
        let mut context = test_util::context();
        let mut graph = root_graph();
        fix_transmission_ior(&mut graph, &mut context);

        let socket = &graph.input_sockets()[0].port;
        assert!(socket.has_flag(PortFlags::UNIFORM));
        assert!(socket.has_flag(PortFlags::TRANSMISSION_IOR_DEPENDENCY));
        assert_eq!(graph.downstream(ior_input(&graph, "from_socket")).connection, Some(Upstream::Socket(0)));

        let constant = graph.downstream(ior_input(&graph, "from_constant"));
        assert_eq!(constant.connection, None);
        assert_eq!(constant.port.value, Some(Value::Float(1.33)));

        let varying = graph.downstream(ior_input(&graph, "from_noise"));
        assert_eq!(varying.connection, None);
        assert_eq!(varying.port.value, Some(Value::Float(1.5)));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut context = test_util::context();
        let mut graph = root_graph();
        fix_transmission_ior(&mut graph, &mut context);
        let once = graph.clone();
        fix_transmission_ior(&mut graph, &mut context);
        assert_eq!(graph, once);
    }

    #[test]
    fn test_reflection_only_bsdf_is_untouched() {
        let mut context = test_util::context();
        let mut graph = root_graph();
        let node = graph.node_by_name("from_noise").unwrap();
        graph.node_mut(node).classification |= Classification::BSDF_R;
        fix_transmission_ior(&mut graph, &mut context);
        assert!(graph.downstream(ior_input(&graph, "from_noise")).connection.is_some());
    }

    /// Compound whose `ior` socket feeds a transmissive BSDF, instanced in a root graph
    fn compound_setup(context: &mut GenContext) -> (ShaderGraph, ImplId) {
        let mut sub = ShaderGraph::new("NG_glass");
        sub.add_input_socket(ShaderPort::new("ior", TypeDesc::Float));
        sub.add_output_socket(ShaderPort::new("out", TypeDesc::Bsdf));
        sub.add_node(bsdf("inner")).unwrap();
        let to = ior_input(&sub, "inner");
        sub.connect(Upstream::Socket(0), to).unwrap();
        let from = out(&sub, "inner");
        sub.connect(from, Downstream::Socket(0)).unwrap();
        let syntax = Syntax::for_target(TargetKind::Mdl);
        let id = context.add_implementation("NG_glass", ShaderNodeImpl::Compound(CompoundImpl::new("NG_glass", &syntax, sub)));

        let mut graph = ShaderGraph::new("root");
        graph.add_input_socket(ShaderPort::new("ior", TypeDesc::Float));
        graph.add_output_socket(ShaderPort::new("out", TypeDesc::Bsdf));
        let mut glass = ShaderNode::new("glass", "ND_glass_bsdf").with_implementation(id);
        glass.classification = Classification::CLOSURE | Classification::BSDF;
        glass.add_input("ior", TypeDesc::Float);
        glass.add_output("out", TypeDesc::Bsdf);
        graph.add_node(glass).unwrap();
        graph.add_node(noise("n")).unwrap();
        let from = out(&graph, "glass");
        graph.connect(from, Downstream::Socket(0)).unwrap();
        (graph, id)
    }

    fn nested(context: &GenContext, id: ImplId) -> &ShaderGraph {
        context.implementation(id).graph().unwrap()
    }

    #[test]
    fn test_compound_fed_by_socket_becomes_uniform() {
        let mut context = test_util::context();
        let (mut graph, id) = compound_setup(&mut context);
        let to = ior_input(&graph, "glass");
        graph.connect(Upstream::Socket(0), to).unwrap();
        fix_transmission_ior(&mut graph, &mut context);

        assert!(graph.input_sockets()[0].port.has_flag(PortFlags::UNIFORM));
        let sub = nested(&context, id);
        assert!(sub.input_sockets()[0].port.has_flag(PortFlags::UNIFORM));
        assert_eq!(sub.downstream(ior_input(sub, "inner")).connection, Some(Upstream::Socket(0)));
    }

    #[test]
    fn test_compound_fed_by_varying_is_disconnected_inside() {
        let mut context = test_util::context();
        let (mut graph, id) = compound_setup(&mut context);
        let (from, to) = (out(&graph, "n"), ior_input(&graph, "glass"));
        graph.connect(from, to).unwrap();
        fix_transmission_ior(&mut graph, &mut context);

        assert!(graph.downstream(ior_input(&graph, "glass")).connection.is_some());
        assert!(!graph.input_sockets()[0].port.has_flag(PortFlags::UNIFORM));
        let sub = nested(&context, id);
        assert_eq!(sub.downstream(ior_input(sub, "inner")).connection, None);
        assert!(!sub.input_sockets()[0].port.has_flag(PortFlags::TRANSMISSION_IOR_DEPENDENCY));

        let once = (graph.clone(), nested(&context, id).clone());
        fix_transmission_ior(&mut graph, &mut context);
        assert_eq!(graph, once.0);
        assert_eq!(nested(&context, id), &once.1);
    }
}
