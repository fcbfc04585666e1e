// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader generation for `OrdoPlay` `MaterialX`.
//!
//! This crate compiles material documents into shading language source:
//! - GLSL 4.0 vertex and pixel stages, with light binding
//! - OSL shaders with a published parameter interface
//! - MDL materials
//!
//! ## Architecture
//!
//! Generation runs in three phases:
//! - A [`ShaderGraph`] is built from the element, optimized and ordered
//! - Every node declares its stage variables through its implementation
//! - An [`Emitter`](generator::Emitter) walks the graph and writes each stage
//!
//! A [`ShaderGenerator`] holds the read-only tables of one target. All
//! mutable state lives in a [`GenContext`], which is owned by the caller and
//! caches implementations between calls.

pub mod context;
pub mod error;
pub mod generator;
pub mod graph;
pub mod impls;
pub mod options;
pub mod resolver;
pub mod shader;
pub mod stage;
pub mod syntax;
pub mod types;

pub use context::{BoundLight, GenContext, ImplId};
pub use error::{
    GraphStructureError, ImplementationResolutionError, LightBindingError, Result, ShaderGenError,
    SyntaxRegistryError,
};
pub use generator::{ShaderGenerator, TargetKind};
pub use graph::{Classification, NodeHandle, PortFlags, ShaderGraph, ShaderNode, ShaderPort};
pub use impls::ShaderNodeImpl;
pub use options::{
    DirectionalAlbedoMethod, DistanceUnit, GenOptions, MdlVersion, ShaderInterfaceType, SpecularEnvironmentMethod,
};
pub use resolver::{FileSearchPath, MemorySources, SourceResolver};
pub use shader::{Shader, UniformDescriptor};
pub use stage::{ShaderStage, ShaderVariable, VariableBlock, PIXEL_STAGE, VERTEX_STAGE};
pub use syntax::Syntax;
pub use types::TypeDesc;

#[cfg(test)]
pub(crate) mod test_util {
    use crate::context::GenContext;
    use crate::resolver::MemorySources;
    use ordoplay_materialx_document::stdlib::sources::library_sources;
    use ordoplay_materialx_document::{create_standard_library, Document, Node, NodeInput, Value};

    /// Standard library document
    pub fn library() -> Document {
        create_standard_library()
    }

    /// Context resolving the embedded library sources, with test logging
    pub fn context() -> GenContext {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let sources: MemorySources = library_sources().iter().map(|(path, text)| (*path, *text)).collect();
        GenContext::new(sources)
    }

    /// Surface fed by every closure operator, plus an EDF nothing consumes
    ///
    /// `layered` puts `coat` over `sum = (mix(diff, glass, 0.25) * 0.5) + diff`.
    pub fn closure_doc() -> Document {
        let mut doc = Document::new("closures");
        doc.import_library(&library());
        let nodes = [
            Node::new("diff", "diffuse_bsdf", "BSDF"),
            Node::new("glass", "dielectric_bsdf", "BSDF"),
            Node::new("m", "mix", "BSDF")
                .with_input(NodeInput::connected("fg", "BSDF", "diff"))
                .with_input(NodeInput::connected("bg", "BSDF", "glass"))
                .with_input(NodeInput::value("mix", Value::Float(0.25))),
            Node::new("tinted", "multiply", "BSDF")
                .with_input(NodeInput::connected("in1", "BSDF", "m"))
                .with_input(NodeInput::value("in2", Value::Float(0.5))),
            Node::new("sum", "add", "BSDF")
                .with_input(NodeInput::connected("in1", "BSDF", "tinted"))
                .with_input(NodeInput::connected("in2", "BSDF", "diff")),
            Node::new("coat", "dielectric_bsdf", "BSDF").with_input(NodeInput::value("ior", Value::Float(1.3))),
            Node::new("layered", "layer", "BSDF")
                .with_input(NodeInput::connected("top", "BSDF", "coat"))
                .with_input(NodeInput::connected("base", "BSDF", "sum")),
            Node::new("unused", "uniform_edf", "EDF"),
            Node::new("shader", "surface", "surfaceshader").with_input(NodeInput::connected("bsdf", "BSDF", "layered")),
        ];
        for node in nodes {
            doc.add_node(node).unwrap();
        }
        doc
    }

    /// Context publishing only interface inputs, so literals stay inline
    pub fn reduced_context() -> GenContext {
        let mut context = context();
        context.options_mut().shader_interface = crate::options::ShaderInterfaceType::Reduced;
        context
    }
}
