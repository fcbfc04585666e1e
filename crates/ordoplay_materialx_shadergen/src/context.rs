// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generation context.
//!
//! A [`GenContext`] carries everything that outlives a single `generate`
//! call: the options, the source resolver, the cache of resolved node
//! implementations and the bound light shaders. Contexts are not shared
//! between threads; create one per thread instead.

use crate::error::{LightBindingError, Result, ShaderGenError};
use crate::impls::ShaderNodeImpl;
use crate::options::GenOptions;
use crate::resolver::SourceResolver;
use indexmap::IndexMap;

/// Index of a cached implementation
pub type ImplId = usize;

/// A light shader bound to a light type id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundLight {
    /// Definition of the light shader
    pub node_def: String,
    /// Implementation emitting it
    pub implementation: ImplId,
}

/// Options, source access and caches for shader generation
pub struct GenContext {
    options: GenOptions,
    resolver: Box<dyn SourceResolver>,
    implementations: Vec<ShaderNodeImpl>,
    cache: IndexMap<String, ImplId>,
    lights: IndexMap<u32, BoundLight>,
    depth: usize,
}

impl GenContext {
    /// Create a context with default options
    pub fn new(resolver: impl SourceResolver + 'static) -> Self {
        Self {
            options: GenOptions::default(),
            resolver: Box::new(resolver),
            implementations: Vec::new(),
            cache: IndexMap::new(),
            lights: IndexMap::new(),
            depth: 0,
        }
    }

    /// Replace the options
    pub fn with_options(mut self, options: GenOptions) -> Self {
        self.options = options;
        self
    }

    /// Generation options
    pub fn options(&self) -> &GenOptions {
        &self.options
    }

    /// Generation options
    pub fn options_mut(&mut self) -> &mut GenOptions {
        &mut self.options
    }

    /// Read a library source file
    pub fn resolve_source(&self, path: &str) -> Result<String> {
        self.resolver.resolve(path).map_err(|source| ShaderGenError::Io {
            path: path.to_string(),
            source,
        })
    }

    // ========================================================================
    // Implementation cache
    // ========================================================================

    /// Implementation by id
    ///
    /// # Panics
    ///
    /// Panics if the id was not handed out by this context.
    pub fn implementation(&self, id: ImplId) -> &ShaderNodeImpl {
        &self.implementations[id]
    }

    pub(crate) fn implementation_mut(&mut self, id: ImplId) -> &mut ShaderNodeImpl {
        &mut self.implementations[id]
    }

    /// Store an implementation under a cache key
    pub fn add_implementation(&mut self, key: impl Into<String>, implementation: ShaderNodeImpl) -> ImplId {
        let id = self.implementations.len();
        self.implementations.push(implementation);
        self.cache.insert(key.into(), id);
        id
    }

    /// Cached implementation id for a key
    pub fn cached(&self, key: &str) -> Option<ImplId> {
        self.cache.get(key).copied()
    }

    /// Number of cached implementations
    pub fn implementation_count(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached implementation
    ///
    /// Bound lights keep their own implementations and are re-cached.
    pub fn clear_implementations(&mut self) {
        let lights: Vec<(u32, String, ShaderNodeImpl)> = self
            .lights
            .iter()
            .map(|(id, l)| (*id, l.node_def.clone(), self.implementations[l.implementation].clone()))
            .collect();
        self.implementations.clear();
        self.cache.clear();
        self.lights.clear();
        for (type_id, node_def, implementation) in lights {
            let key = format!("light:{type_id}");
            let id = self.add_implementation(key, implementation);
            self.lights.insert(
                type_id,
                BoundLight {
                    node_def,
                    implementation: id,
                },
            );
        }
    }

    // ========================================================================
    // Lights
    // ========================================================================

    /// Bind a light implementation to a type id
    pub fn bind_light(&mut self, type_id: u32, node_def: &str, implementation: ShaderNodeImpl) -> Result<ImplId> {
        if let Some(bound) = self.lights.get(&type_id) {
            return Err(LightBindingError::AlreadyBound {
                type_id,
                bound: bound.node_def.clone(),
            }
            .into());
        }
        let id = self.add_implementation(format!("light:{type_id}"), implementation);
        self.lights.insert(
            type_id,
            BoundLight {
                node_def: node_def.to_string(),
                implementation: id,
            },
        );
        tracing::debug!("Bound light shader {} to type id {}", node_def, type_id);
        Ok(id)
    }

    /// Forget every bound light shader
    pub fn unbind_lights(&mut self) {
        self.lights.clear();
    }

    /// Bound lights in binding order
    pub fn bound_lights(&self) -> impl Iterator<Item = (u32, &BoundLight)> {
        self.lights.iter().map(|(id, l)| (*id, l))
    }

    // ========================================================================
    // Compound depth
    // ========================================================================

    pub(crate) fn enter_graph(&mut self) -> usize {
        self.depth += 1;
        self.depth
    }

    pub(crate) fn leave_graph(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl std::fmt::Debug for GenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenContext")
            .field("options", &self.options)
            .field("implementations", &self.cache.len())
            .field("lights", &self.lights)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemorySources;

    #[test]
    fn test_duplicate_light_binding() {
        let mut context = GenContext::new(MemorySources::new());
        context
            .bind_light(1, "ND_point_light", ShaderNodeImpl::Position)
            .unwrap();
        let err = context
            .bind_light(1, "ND_directional_light", ShaderNodeImpl::Position)
            .unwrap_err();
        assert!(err.to_string().contains("ND_point_light"));

        context.unbind_lights();
        assert!(context.bind_light(1, "ND_directional_light", ShaderNodeImpl::Position).is_ok());
    }

    #[test]
    fn test_clear_keeps_lights() {
        let mut context = GenContext::new(MemorySources::new());
        context.add_implementation("genglsl:IM_add_float", ShaderNodeImpl::Position);
        context.bind_light(2, "ND_point_light", ShaderNodeImpl::Normal).unwrap();
        context.clear_implementations();
        assert_eq!(context.cached("genglsl:IM_add_float"), None);
        let (_, light) = context.bound_lights().next().unwrap();
        assert_eq!(context.implementation(light.implementation), &ShaderNodeImpl::Normal);
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let context = GenContext::new(MemorySources::new());
        let err = context.resolve_source("stdlib/genglsl/missing.glsl").unwrap_err();
        assert!(matches!(err, ShaderGenError::Io { .. }));
        assert!(!err.is_recoverable());
    }
}
