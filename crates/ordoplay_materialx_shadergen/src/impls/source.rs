// SPDX-License-Identifier: MIT OR Apache-2.0
//! Source code implementations: inline expressions and library functions.

use crate::context::GenContext;
use crate::error::{Result, SyntaxRegistryError};
use crate::generator::{CallOverrides, ClosureContext, Emitter, TargetKind};
use crate::graph::{Classification, NodeHandle, PortFlags, ShaderPort};
use crate::stage::ShaderStage;
use crate::types::TypeDesc;
use ordoplay_materialx_document::{Implementation, NodeDef};

/// Where the code of an implementation lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Expression with `{{input}}` markers
    Inline(String),
    /// Function definition text, emitted once per stage
    Function(String),
    /// Function provided by an imported module
    Module,
}

/// Implementation backed by source code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCodeImpl {
    /// Implementation element name
    pub name: String,
    /// Function name
    pub function: String,
    /// Code location
    pub kind: SourceKind,
    /// Takes a hidden `base` BSDF input so it can be layered
    pub layerable: bool,
}

impl SourceCodeImpl {
    /// Load the implementation, reading library files through the context
    pub fn load(element: &Implementation, def: &NodeDef, target: TargetKind, context: &GenContext) -> Result<Self> {
        let file = element.file.as_deref().unwrap_or_default();
        let function = element.function.clone().unwrap_or_else(|| {
            let stem = file.rsplit('/').next().unwrap_or(file);
            stem.split('.').next().unwrap_or(stem).to_string()
        });
        let kind = match &element.source_code {
            Some(code) => SourceKind::Inline(code.clone()),
            None if file.ends_with(".inline") => SourceKind::Inline(context.resolve_source(file)?.trim().to_string()),
            None if target == TargetKind::Mdl => SourceKind::Module,
            None => SourceKind::Function(context.resolve_source(file)?),
        };
        let layerable = target != TargetKind::Osl
            && def.output_type() == TypeDesc::Bsdf.name()
            && def.bsdf.is_none()
            && !matches!(kind, SourceKind::Inline(_));
        Ok(Self {
            name: element.name.clone(),
            function,
            kind,
            layerable,
        })
    }

    pub(super) fn extra_inputs(&self) -> Vec<ShaderPort> {
        if !self.layerable {
            return Vec::new();
        }
        let mut base = ShaderPort::new("base", TypeDesc::Bsdf);
        base.flags |= PortFlags::HIDDEN;
        vec![base]
    }

    pub(crate) fn emit_function_definition(&self, emitter: &Emitter<'_>, stage: &mut ShaderStage) -> Result<()> {
        if let SourceKind::Function(text) = &self.kind {
            if stage.add_function_definition(&self.function) {
                stage.add_source(text, emitter.context, true)?;
                stage.new_line();
            }
        }
        Ok(())
    }

    pub(crate) fn emit_function_call(
        &self,
        emitter: &mut Emitter<'_>,
        stage: &mut ShaderStage,
        node: NodeHandle,
        overrides: &CallOverrides,
    ) -> Result<()> {
        let shader_node = emitter.node(node);
        match &self.kind {
            SourceKind::Inline(code) => {
                let expression = substitute_markers(code, |marker| {
                    let index = shader_node.input_index(marker).ok_or_else(|| SyntaxRegistryError::UnknownMarker {
                        marker: marker.to_string(),
                        node: shader_node.name.clone(),
                    })?;
                    emitter.input_expression(node, index, overrides)
                })?;
                emitter.declare_output(stage, node, overrides, &expression)
            }
            SourceKind::Module => {
                let args = (0..shader_node.inputs.len())
                    .map(|i| emitter.input_expression(node, i, overrides))
                    .collect::<Result<Vec<_>>>()?;
                let expression = format!("{}({})", self.function, args.join(", "));
                emitter.declare_output(stage, node, overrides, &expression)
            }
            SourceKind::Function(_) => {
                let mut function = self.function.clone();
                let mut args: Vec<String> = Vec::new();
                if let Some(context) = closure_context(emitter, shader_node.classification) {
                    match context {
                        Some(context) => {
                            if shader_node.has_classification(Classification::BSDF) {
                                function.push_str(context.suffix());
                            }
                            args.extend(context.arguments().iter().map(|a| (*a).to_string()));
                        }
                        // A layered closure passes its base through when inactive
                        None => match overrides.input("base") {
                            Some(base) => return emitter.declare_output(stage, node, overrides, base),
                            None => return emitter.declare_outputs(stage, node, overrides),
                        },
                    }
                }
                for i in 0..shader_node.inputs.len() {
                    args.push(emitter.input_expression(node, i, overrides)?);
                }
                emitter.declare_outputs(stage, node, overrides)?;
                for i in 0..shader_node.outputs.len() {
                    args.push(emitter.output_variable(node, i, overrides));
                }
                stage.add_line(&format!("{function}({})", args.join(", ")), true);
                Ok(())
            }
        }
    }
}

/// Closure context a GLSL closure function is evaluated in
///
/// `None` when the node is not context dependent, `Some(None)` when the
/// node contributes nothing in the current context.
fn closure_context(emitter: &Emitter<'_>, class: Classification) -> Option<Option<ClosureContext>> {
    let dependent = emitter.target() == TargetKind::Glsl
        && class.intersects(Classification::BSDF | Classification::EDF)
        && !class.contains(Classification::SHADER);
    if !dependent {
        return None;
    }
    let applies = |context: ClosureContext| match context {
        ClosureContext::Emission => class.contains(Classification::EDF),
        _ if class.contains(Classification::EDF) => false,
        ClosureContext::Transmission => !class.contains(Classification::BSDF_R),
        ClosureContext::Reflection | ClosureContext::Indirect => !class.contains(Classification::BSDF_T),
    };
    Some(emitter.closure.filter(|c| applies(*c)))
}

/// Replace `{{name}}` markers through `lookup`
pub(crate) fn substitute_markers(code: &str, mut lookup: impl FnMut(&str) -> Result<String>) -> Result<String> {
    let mut result = String::with_capacity(code.len());
    let mut rest = code;
    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            result.push_str(&rest[start..]);
            return Ok(result);
        };
        result.push_str(&lookup(after[..end].trim())?);
        rest = &after[end + 2..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Light shader backed by a library function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightShaderImpl {
    /// Function source
    pub source: SourceCodeImpl,
    /// Light parameters read from the `LightData` struct
    pub inputs: Vec<(String, TypeDesc)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShaderGenError;

    #[test]
    fn test_substitute_markers() {
        let result = substitute_markers("mix({{bg}}, {{fg}}, {{ mix }})", |m| Ok(format!("v_{m}"))).unwrap();
        assert_eq!(result, "mix(v_bg, v_fg, v_mix)");
        assert_eq!(substitute_markers("a {{ b", |_| Ok(String::new())).unwrap(), "a {{ b");
    }

    #[test]
    fn test_unknown_marker_fails() {
        let err = substitute_markers("{{missing}} * 2.0", |m| {
            Err(SyntaxRegistryError::UnknownMarker {
                marker: m.to_string(),
                node: "n1".into(),
            }
            .into())
        })
        .unwrap_err();
        assert!(matches!(err, ShaderGenError::SyntaxRegistry(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_load_kinds() {
        let context = crate::test_util::context();
        let library = crate::test_util::library();
        let def = library.node_def("ND_dielectric_bsdf").unwrap();
        let element = library.implementation("IM_dielectric_bsdf_genglsl").unwrap();
        let glsl = SourceCodeImpl::load(element, def, TargetKind::Glsl, &context).unwrap();
        assert!(matches!(glsl.kind, SourceKind::Function(_)));
        assert!(glsl.layerable);
        assert_eq!(glsl.function, "mx_dielectric_bsdf");

        let element = library.implementation("IM_dielectric_bsdf_genmdl").unwrap();
        let mdl = SourceCodeImpl::load(element, def, TargetKind::Mdl, &context).unwrap();
        assert_eq!(mdl.kind, SourceKind::Module);

        let def = library.node_def("ND_diffuse_bsdf").unwrap();
        let element = library.implementation("IM_diffuse_bsdf_genglsl").unwrap();
        assert!(!SourceCodeImpl::load(element, def, TargetKind::Glsl, &context).unwrap().layerable);
    }
}
