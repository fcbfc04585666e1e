// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generated shaders.

use crate::generator::TargetKind;
use crate::graph::{PortFlags, ShaderGraph};
use crate::stage::ShaderStage;
use crate::syntax::Syntax;
use serde::Serialize;

/// Result of one generation: the stages and the graph they came from
#[derive(Debug)]
pub struct Shader {
    name: String,
    target: TargetKind,
    stages: Vec<ShaderStage>,
    graph: ShaderGraph,
}

/// Public uniform of a shader, as reported to renderers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniformDescriptor {
    /// Variable name in the generated code
    pub name: String,
    /// Document type name
    #[serde(rename = "type")]
    pub type_name: String,
    /// Default value as a target literal, if any
    pub value: Option<String>,
    /// Document path of the input the uniform was published from
    pub path: String,
}

impl Shader {
    pub(crate) fn new(name: impl Into<String>, target: TargetKind, stages: Vec<ShaderStage>, graph: ShaderGraph) -> Self {
        Self {
            name: name.into(),
            target,
            stages,
            graph,
        }
    }

    /// Shader name, a valid identifier of the target
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target the shader was generated for
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// All stages in pipeline order
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    /// Stage by name
    pub fn stage(&self, name: &str) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.name() == name)
    }

    /// Finalized graph
    pub fn graph(&self) -> &ShaderGraph {
        &self.graph
    }

    /// Published inputs of the graph
    pub fn uniform_descriptors(&self) -> Vec<UniformDescriptor> {
        let syntax = Syntax::for_target(self.target);
        self.graph
            .input_sockets()
            .iter()
            .filter(|s| s.port.has_flag(PortFlags::PUBLISHED))
            .map(|s| UniformDescriptor {
                name: s.port.variable.clone(),
                type_name: s.port.ty.name().to_string(),
                value: s.port.value.as_ref().and_then(|v| syntax.value(s.port.ty, v, true).ok()),
                path: s.port.path.clone(),
            })
            .collect()
    }

    /// Published inputs as pretty printed JSON
    pub fn uniforms_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.uniform_descriptors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ShaderGenerator;
    use crate::stage::PIXEL_STAGE;
    use crate::test_util;
    use ordoplay_materialx_document::{Document, ElementRef, Node, NodeInput, Output, Value};

    fn mix_doc() -> Document {
        let mut doc = Document::new("mix");
        doc.import_library(&test_util::library());
        doc.add_node(
            Node::new("blend", "mix", "float")
                .with_input(NodeInput::value("fg", Value::Float(1.0)))
                .with_input(NodeInput::value("mix", Value::Float(0.25))),
        )
        .unwrap();
        doc.add_output(Output::new("result", "float", "blend")).unwrap();
        doc
    }

    #[test]
    fn test_uniform_descriptors() {
        let shader = ShaderGenerator::glsl()
            .generate(&mut test_util::context(), &mix_doc(), &ElementRef::output("result"))
            .unwrap();
        assert_eq!(shader.name(), "result");
        assert_eq!(shader.target(), TargetKind::Glsl);
        assert!(shader.stage(PIXEL_STAGE).is_some());
        assert!(shader.stage("geometry").is_none());

        let uniforms = shader.uniform_descriptors();
        let names: Vec<&str> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["blend_fg", "blend_bg", "blend_mix"]);
        assert_eq!(uniforms[2].type_name, "float");
        assert_eq!(uniforms[2].value.as_deref(), Some("0.25"));

        let json = shader.uniforms_json().unwrap();
        assert!(json.contains("\"type\": \"float\""));
        assert!(json.contains("\"name\": \"blend_mix\""));
    }
}
