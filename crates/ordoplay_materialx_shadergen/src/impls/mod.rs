// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node implementations.
//!
//! Every node in a shader graph is bound to one [`ShaderNodeImpl`], a closed
//! set of emission strategies. Implementations are resolved once per
//! context and cached by implementation name; function definitions are
//! emitted once per implementation and stage, calls once per node.
//!
//! ## Resolution order
//!
//! 1. A structural implementation registered under the exact
//!    implementation name.
//! 2. Source code, inline or from a library file.
//! 3. A compound implementation owning a nested [`ShaderGraph`].

mod closure;
mod compound;
mod geometry;
mod source;
mod structural;
mod surface;

pub use compound::CompoundImpl;
pub use source::{LightShaderImpl, SourceCodeImpl, SourceKind};

pub(crate) use closure::layer_by_override;
pub(crate) use geometry::VERTEX_DATA_INSTANCE;
pub(crate) use surface::LIGHT_DATA_INSTANCE;

use crate::context::{GenContext, ImplId};
use crate::error::{ImplementationResolutionError, Result};
use crate::generator::{CallOverrides, Emitter, ShaderGenerator, TargetKind};
use crate::graph::{NodeHandle, ShaderGraph, ShaderNode, ShaderPort};
use crate::stage::ShaderStage;
use indexmap::IndexMap;
use ordoplay_materialx_document::stdlib::{create_standard_library, implementation_name};
use ordoplay_materialx_document::{Document, ImplementationRef, NodeDef};

/// Emission strategy of a node
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderNodeImpl {
    /// Inline expression or library function
    SourceCode(SourceCodeImpl),
    /// Nested graph
    Compound(CompoundImpl),
    /// Nested graph computing a light shader
    LightCompound(CompoundImpl),
    /// Library function computing a light shader
    LightShader(LightShaderImpl),
    /// Channel selection
    Swizzle,
    /// Type conversion
    Convert,
    /// Aggregate from components
    Combine,
    /// Multi way branch
    Switch,
    /// Two way branch on a threshold
    Compare,
    /// Convolution of a sampled texture
    Blur,
    /// Closure layering
    ClosureLayer,
    /// Weighted closure blend
    ClosureMix,
    /// Closure sum
    ClosureAdd,
    /// Closure scaling
    ClosureMultiply,
    /// Interpolated position
    Position,
    /// Interpolated normal
    Normal,
    /// Interpolated texture coordinates
    TexCoord,
    /// Lit surface shader
    Surface,
}

impl ShaderNodeImpl {
    /// Inputs the implementation adds to every node using it
    pub fn extra_inputs(&self) -> Vec<ShaderPort> {
        match self {
            Self::SourceCode(source) => source.extra_inputs(),
            Self::Compound(compound) => compound.hidden_inputs.clone(),
            _ => Vec::new(),
        }
    }

    /// Nested graph, for compounds
    pub fn graph(&self) -> Option<&ShaderGraph> {
        match self {
            Self::Compound(compound) | Self::LightCompound(compound) => Some(&compound.graph),
            _ => None,
        }
    }

    /// Whether the call emits its own upstream dependencies
    fn manages_dependencies(&self, target: TargetKind) -> bool {
        match self {
            Self::ClosureLayer => true,
            Self::Surface => target == TargetKind::Glsl,
            _ => false,
        }
    }

    /// Declare the stage variables the node needs
    pub(crate) fn create_variables(
        &self,
        emitter: &Emitter<'_>,
        node: NodeHandle,
        stages: &mut [ShaderStage],
    ) -> Result<()> {
        match self {
            Self::Position | Self::Normal | Self::TexCoord => geometry::create_variables(self, emitter, node, stages),
            Self::Surface => surface::create_variables(emitter, stages),
            Self::Compound(compound) => compound.create_variables(emitter, stages),
            _ => Ok(()),
        }
    }

    /// Emit the function definition, once per stage
    pub(crate) fn emit_function_definition(&self, emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        match self {
            Self::SourceCode(source) => source.emit_function_definition(emitter, stage),
            Self::LightShader(light) => light.source.emit_function_definition(emitter, stage),
            Self::Compound(compound) => compound.emit_function_definition(emitter, stage),
            Self::LightCompound(compound) => compound.emit_light_function_definition(emitter, stage),
            _ => Ok(()),
        }
    }

    /// Emit the call for one node
    pub(crate) fn emit_function_call(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
    ) -> Result<()> {
        if !self.manages_dependencies(emitter.target()) {
            emitter.emit_dependencies(stage, node)?;
        }
        match self {
            Self::SourceCode(source) => source.emit_function_call(emitter, stage, node, overrides),
            Self::Compound(compound) => compound.emit_function_call(emitter, stage, node, overrides),
            Self::LightCompound(_) | Self::LightShader(_) => {
                let name = &emitter.node(node).name;
                tracing::warn!("Light shader node '{}' is only emitted through light binding", name);
                emitter.declare_outputs(stage, node, overrides)
            }
            Self::Swizzle => structural::emit_swizzle(emitter, stage, node, overrides),
            Self::Convert => structural::emit_convert(emitter, stage, node, overrides),
            Self::Combine => structural::emit_combine(emitter, stage, node, overrides),
            Self::Switch => structural::emit_switch(emitter, stage, node, overrides),
            Self::Compare => structural::emit_compare(emitter, stage, node, overrides),
            Self::Blur => structural::emit_blur(emitter, stage, node, overrides),
            Self::ClosureLayer => closure::emit_layer(emitter, stage, node, overrides),
            Self::ClosureMix => closure::emit_mix(emitter, stage, node, overrides),
            Self::ClosureAdd => closure::emit_add(emitter, stage, node, overrides),
            Self::ClosureMultiply => closure::emit_multiply(emitter, stage, node, overrides),
            Self::Position | Self::Normal | Self::TexCoord => geometry::emit_call(self, emitter, stage, node, overrides),
            Self::Surface => surface::emit_call(emitter, stage, node, overrides),
        }
    }
}

type Factory = fn() -> ShaderNodeImpl;

/// Structural implementations by implementation name
///
/// Filled once per target when a generator is created and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct ImplementationRegistry {
    factories: IndexMap<String, Factory>,
}

impl ImplementationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an implementation name
    pub fn register(&mut self, name: impl Into<String>, factory: Factory) {
        self.factories.insert(name.into(), factory);
    }

    /// Factory registered under a name
    pub fn factory(&self, name: &str) -> Option<Factory> {
        self.factories.get(name).copied()
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registry with the structural implementations of a target
    pub fn for_target(target: TargetKind) -> Self {
        let mut registry = Self::new();
        let library = create_standard_library();
        for def in library.node_defs() {
            let closure = def.output_type() == "BSDF";
            let factory: Factory = match (def.node.as_str(), target) {
                ("swizzle", _) => || ShaderNodeImpl::Swizzle,
                ("convert", _) => || ShaderNodeImpl::Convert,
                ("combine", _) => || ShaderNodeImpl::Combine,
                ("switch", _) => || ShaderNodeImpl::Switch,
                ("compare", _) => || ShaderNodeImpl::Compare,
                ("blur", _) => || ShaderNodeImpl::Blur,
                ("layer", _) if closure => || ShaderNodeImpl::ClosureLayer,
                ("mix", _) if closure => || ShaderNodeImpl::ClosureMix,
                ("add", _) if closure => || ShaderNodeImpl::ClosureAdd,
                ("multiply", _) if closure => || ShaderNodeImpl::ClosureMultiply,
                ("position", TargetKind::Glsl) => || ShaderNodeImpl::Position,
                ("normal", TargetKind::Glsl) => || ShaderNodeImpl::Normal,
                ("texcoord", TargetKind::Glsl) => || ShaderNodeImpl::TexCoord,
                ("surface", TargetKind::Glsl) => || ShaderNodeImpl::Surface,
                _ => continue,
            };
            registry.register(implementation_name(&def.name, Some(target.name())), factory);
        }
        tracing::debug!(
            "Registered {} structural implementations for {}",
            registry.len(),
            target.name()
        );
        registry
    }
}

/// Resolve and cache the implementation of a definition
pub(crate) fn resolve_implementation(
    generator: &ShaderGenerator,
    context: &mut GenContext,
    doc: &Document,
    def: &NodeDef,
    node: Option<&str>,
) -> Result<ImplId> {
    let target = generator.target();
    let not_found = || ImplementationResolutionError {
        node_def: def.name.clone(),
        target: target.name().to_string(),
        node: node.map(str::to_string),
    };
    let found = doc.implementation_for(&def.name, target.name()).ok_or_else(not_found)?;
    let key = format!("{}:{}", target.name(), found.name());
    if let Some(id) = context.cached(&key) {
        return Ok(id);
    }

    let implementation = match found {
        ImplementationRef::Implementation(element) => {
            if let Some(factory) = generator.registry().factory(&element.name) {
                factory()
            } else if element.file.is_some() || element.source_code.is_some() {
                ShaderNodeImpl::SourceCode(SourceCodeImpl::load(element, def, target, context)?)
            } else {
                return Err(not_found().into());
            }
        }
        ImplementationRef::NodeGraph(node_graph) => {
            let graph = ShaderGraph::from_node_graph(generator, context, doc, node_graph, def)?;
            let compound = CompoundImpl::new(&node_graph.name, generator.syntax(), graph);
            if target == TargetKind::Glsl && def.output_type() == "lightshader" {
                ShaderNodeImpl::LightCompound(compound)
            } else {
                ShaderNodeImpl::Compound(compound)
            }
        }
    };
    tracing::debug!("Resolved implementation {} for {}", key, def.name);
    Ok(context.add_implementation(key, implementation))
}

/// Instantiate a definition as a node bound to its implementation
pub(crate) fn instantiate(
    generator: &ShaderGenerator,
    context: &mut GenContext,
    doc: &Document,
    name: &str,
    def: &NodeDef,
) -> Result<ShaderNode> {
    let id = resolve_implementation(generator, context, doc, def, Some(name))?;
    let mut node = ShaderNode::from_node_def(name, def, generator.syntax())?.with_implementation(id);
    for port in context.implementation(id).extra_inputs() {
        node.inputs.push(crate::graph::ShaderInput::new(port));
    }
    Ok(node)
}
