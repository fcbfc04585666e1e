// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader generators.
//!
//! A [`ShaderGenerator`] owns the read-only registries of one target and
//! drives the pipeline:
//!
//! 1. Build and finalize the [`ShaderGraph`] of a document element
//! 2. Run target specific graph rewrites
//! 3. Create stages and declare their variables
//! 4. Emit function definitions and calls through an [`Emitter`]
//!
//! Targets differ through three capability traits: [`EmitsStages`],
//! [`HasClosureComposition`] and [`HasLightBinding`]. The generator selects
//! the implementing backend from its [`TargetKind`].

mod emitter;
mod glsl;
mod mdl;
mod osl;
mod transmission;

pub use emitter::{CallOverrides, ClosureContext, Emitter, Sockets};
pub use glsl::GlslBackend;
pub use mdl::MdlBackend;
pub use osl::OslBackend;

use crate::context::GenContext;
use crate::error::{GraphStructureError, LightBindingError, Result};
use crate::graph::{NodeHandle, ShaderGraph};
use crate::impls::ImplementationRegistry;
use crate::options::GenOptions;
use crate::shader::Shader;
use crate::stage::ShaderStage;
use crate::syntax::Syntax;
use crate::types::TypeDesc;
use ordoplay_materialx_document::{Document, ElementRef};
use serde::{Deserialize, Serialize};

/// Shading language family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// GLSL 4.0, vertex and pixel stages
    Glsl,
    /// Open Shading Language
    Osl,
    /// Material Definition Language
    Mdl,
}

impl TargetKind {
    /// Target name as used by implementation elements
    pub fn name(self) -> &'static str {
        match self {
            Self::Glsl => "genglsl",
            Self::Osl => "genosl",
            Self::Mdl => "genmdl",
        }
    }

    /// Parse a target name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "genglsl" => Some(Self::Glsl),
            "genosl" => Some(Self::Osl),
            "genmdl" => Some(Self::Mdl),
            _ => None,
        }
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Stage layout and text emission of a target
pub trait EmitsStages {
    /// Create the empty stages of a shader
    fn create_stages(&self, options: &GenOptions) -> Vec<ShaderStage>;

    /// Declare the target variables, after the nodes declared theirs
    fn create_variables(&self, emitter: &Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()>;

    /// Emit the text of every stage
    fn emit_stages(&self, name: &str, emitter: &mut Emitter<'_>, stages: &mut [ShaderStage]) -> Result<()>;
}

/// Closure operators of a target
pub trait HasClosureComposition {
    /// Emit a layer node given its evaluated base and its top node
    fn emit_layer(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
        top: Option<NodeHandle>,
        base: &str,
    ) -> Result<()>;

    /// Weighted blend of two closures
    fn mix(&self, fg: &str, bg: &str, weight: &str) -> String;

    /// Sum of two closures
    fn add(&self, a: &str, b: &str) -> String;

    /// Closure scaled by a float or color
    fn multiply(&self, closure: &str, weight: &str, weight_type: TypeDesc) -> String;
}

/// Binding of light shaders to light type ids
pub trait HasLightBinding {
    /// Resolve a light shader definition and bind it to `type_id`
    fn bind_light_shader(
        &self,
        generator: &ShaderGenerator,
        context: &mut GenContext,
        doc: &Document,
        node_def: &str,
        type_id: u32,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
enum Backend {
    Glsl(GlslBackend),
    Osl(OslBackend),
    Mdl(MdlBackend),
}

impl Backend {
    fn for_target(target: TargetKind) -> Self {
        match target {
            TargetKind::Glsl => Self::Glsl(GlslBackend),
            TargetKind::Osl => Self::Osl(OslBackend),
            TargetKind::Mdl => Self::Mdl(MdlBackend),
        }
    }

    fn stages(&self) -> &dyn EmitsStages {
        match self {
            Self::Glsl(b) => b,
            Self::Osl(b) => b,
            Self::Mdl(b) => b,
        }
    }

    fn closures(&self) -> &dyn HasClosureComposition {
        match self {
            Self::Glsl(b) => b,
            Self::Osl(b) => b,
            Self::Mdl(b) => b,
        }
    }

    fn lights(&self) -> Option<&dyn HasLightBinding> {
        match self {
            Self::Glsl(b) => Some(b),
            Self::Osl(_) | Self::Mdl(_) => None,
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Code generator for one target
///
/// Registries are filled on construction and never mutated, so a generator
/// can be shared between threads as long as every thread owns its
/// [`GenContext`].
#[derive(Debug, Clone)]
pub struct ShaderGenerator {
    target: TargetKind,
    syntax: Syntax,
    registry: ImplementationRegistry,
    backend: Backend,
}

impl ShaderGenerator {
    /// Create a generator for a target
    pub fn new(target: TargetKind) -> Self {
        Self {
            target,
            syntax: Syntax::for_target(target),
            registry: ImplementationRegistry::for_target(target),
            backend: Backend::for_target(target),
        }
    }

    /// GLSL generator
    pub fn glsl() -> Self {
        Self::new(TargetKind::Glsl)
    }

    /// OSL generator
    pub fn osl() -> Self {
        Self::new(TargetKind::Osl)
    }

    /// MDL generator
    pub fn mdl() -> Self {
        Self::new(TargetKind::Mdl)
    }

    /// Target of this generator
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Type syntax of the target
    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    /// Structural implementations of the target
    pub fn registry(&self) -> &ImplementationRegistry {
        &self.registry
    }

    /// Closure operators of the target
    pub fn closure_composition(&self) -> &dyn HasClosureComposition {
        self.backend.closures()
    }

    /// Generate the shader of one renderable element
    pub fn generate(&self, context: &mut GenContext, doc: &Document, element: &ElementRef) -> Result<Shader> {
        if self.target == TargetKind::Mdl {
            // Compounds are specialized by the transmission pass
            context.clear_implementations();
        }
        if let Some(space) = &context.options().target_color_space_override {
            tracing::warn!(
                "Color space conversion to '{}' needs a color management system, values are passed through",
                space
            );
        }
        let name = self
            .syntax
            .make_identifier(element.name(), &mut self.syntax.identifier_map());
        let graph = ShaderGraph::from_element(self, context, doc, element)?;
        self.generate_from_graph(context, &name, graph)
    }

    /// Generate a shader from a finalized graph
    pub fn generate_from_graph(&self, context: &mut GenContext, name: &str, mut graph: ShaderGraph) -> Result<Shader> {
        if self.target == TargetKind::Mdl && context.options().mdl_version.requires_uniform_ior() {
            transmission::fix_transmission_ior(&mut graph, context);
        }
        let context: &GenContext = context;
        let backend = self.backend.stages();
        let mut stages = backend.create_stages(context.options());
        {
            let mut emitter = Emitter::new(self, context, &graph);
            emitter.create_variables(&mut stages)?;
            backend.create_variables(&emitter, &mut stages)?;
            for stage in &stages {
                stage.check_name_collisions()?;
            }
            backend.emit_stages(name, &mut emitter, &mut stages)?;
        }
        tracing::info!(
            "Generated {} shader '{}' with {} nodes",
            self.target.name(),
            name,
            graph.node_count()
        );
        Ok(Shader::new(name, self.target, stages, graph))
    }

    /// Generate every renderable element of a document
    ///
    /// Elements whose implementation can not be resolved are skipped with a
    /// warning; every other error aborts.
    pub fn generate_all(&self, context: &mut GenContext, doc: &Document) -> Result<Vec<Shader>> {
        let mut shaders = Vec::new();
        for element in doc.renderable_elements() {
            match self.generate(context, doc, &element) {
                Ok(shader) => shaders.push(shader),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping '{}': {}", element.path(), e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(shaders)
    }

    /// Bind a light shader definition to a light type id
    pub fn bind_light_shader(
        &self,
        context: &mut GenContext,
        doc: &Document,
        node_def: &str,
        type_id: u32,
    ) -> Result<()> {
        let lights = self.backend.lights().ok_or_else(|| LightBindingError::Unsupported {
            target: self.target.name().to_string(),
        })?;
        lights.bind_light_shader(self, context, doc, node_def, type_id)
    }

    /// Unbind every light shader
    pub fn unbind_light_shaders(&self, context: &mut GenContext) {
        context.unbind_lights();
    }
}

/// Port lookup failure
pub(crate) fn port_not_found(port: &str, node: &str) -> crate::error::ShaderGenError {
    GraphStructureError::PortNotFound {
        port: port.to_string(),
        node: node.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use ordoplay_materialx_document::{Node, NodeInput, Output, Value};

    fn constant_color_doc() -> Document {
        let mut doc = Document::new("constant");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("red", "constant", "color3").with_input(NodeInput::value("value", Value::Color3([1.0, 0.0, 0.0]))),
        )
        .unwrap();
        doc.add_output(Output::new("out", "color3", "red")).unwrap();
        doc
    }

    #[test]
    fn test_target_names() {
        for target in [TargetKind::Glsl, TargetKind::Osl, TargetKind::Mdl] {
            assert_eq!(TargetKind::from_name(target.name()), Some(target));
        }
        assert_eq!(TargetKind::from_name("genmsl"), None);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let doc = constant_color_doc();
        for generator in [ShaderGenerator::glsl(), ShaderGenerator::osl(), ShaderGenerator::mdl()] {
            let first = generator
                .generate(&mut test_util::context(), &doc, &ElementRef::output("out"))
                .unwrap();
            let second = generator
                .generate(&mut test_util::context(), &doc, &ElementRef::output("out"))
                .unwrap();
            for (a, b) in first.stages().iter().zip(second.stages()) {
                assert_eq!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_light_binding_is_glsl_only() {
        let doc = test_util::library();
        let mut context = test_util::context();
        let osl = ShaderGenerator::osl();
        let err = osl.bind_light_shader(&mut context, &doc, "ND_point_light", 1).unwrap_err();
        assert!(matches!(err, crate::ShaderGenError::LightBinding(LightBindingError::Unsupported { .. })));

        let glsl = ShaderGenerator::glsl();
        glsl.bind_light_shader(&mut context, &doc, "ND_point_light", 1).unwrap();
        let err = glsl
            .bind_light_shader(&mut context, &doc, "ND_directional_light", 1)
            .unwrap_err();
        assert!(err.to_string().contains("already bound"));
        glsl.unbind_light_shaders(&mut context);
        glsl.bind_light_shader(&mut context, &doc, "ND_directional_light", 1).unwrap();
    }

    #[test]
    fn test_generate_all_skips_unresolved_elements() {
        let mut doc = constant_color_doc();
        doc.add_node(Node::new("sun", "point_light", "lightshader")).unwrap();
        doc.add_output(Output::new("light_out", "lightshader", "sun")).unwrap();
        let shaders = ShaderGenerator::osl()
            .generate_all(&mut test_util::context(), &doc)
            .unwrap();
        assert_eq!(shaders.len(), 1);
        assert_eq!(shaders[0].name(), "out");
    }
}
