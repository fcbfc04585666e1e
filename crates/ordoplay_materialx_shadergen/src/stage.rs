// SPDX-License-Identifier: MIT OR Apache-2.0
//! Variable blocks and shader stages.
//!
//! A [`ShaderStage`] is one compilation phase of a target language. It owns
//! named [`VariableBlock`]s for its uniforms, inputs and outputs, a block of
//! constants, and the text buffer the generators write into.

use crate::context::GenContext;
use crate::error::{GraphStructureError, Result};
use crate::graph::NodeHandle;
use crate::types::TypeDesc;
use indexmap::{IndexMap, IndexSet};
use ordoplay_materialx_document::Value;
use std::collections::HashSet;

/// Vertex stage name
pub const VERTEX_STAGE: &str = "vertex";
/// Pixel stage name, also the single stage of non hardware targets
pub const PIXEL_STAGE: &str = "pixel";

/// Block names
pub mod block {
    /// Vertex attributes
    pub const VERTEX_INPUTS: &str = "VertexInputs";
    /// Interpolated vertex data
    pub const VERTEX_DATA: &str = "VertexData";
    /// Uniforms set by the renderer
    pub const PRIVATE_UNIFORMS: &str = "PrivateUniforms";
    /// Uniforms exposed for material editing
    pub const PUBLIC_UNIFORMS: &str = "PublicUniforms";
    /// Light source parameters
    pub const LIGHT_DATA: &str = "LightData";
    /// Pixel shader outputs
    pub const PIXEL_OUTPUTS: &str = "PixelOutputs";
    /// Shader parameters of single stage targets
    pub const INPUTS: &str = "Inputs";
    /// Shader outputs of single stage targets
    pub const OUTPUTS: &str = "Outputs";
    /// Constants
    pub const CONSTANTS: &str = "Constants";
}

/// A variable in a block
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderVariable {
    /// Type
    pub ty: TypeDesc,
    /// Variable name as emitted
    pub name: String,
    /// Initial or default value
    pub value: Option<Value>,
    /// Document path of the element the variable came from
    pub path: String,
    /// Declared with the uniform qualifier
    pub uniform: bool,
}

impl ShaderVariable {
    /// Create a variable without value
    pub fn new(ty: TypeDesc, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            value: None,
            path: String::new(),
            uniform: false,
        }
    }

    /// Set the value
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// Set the document path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Mark as uniform
    pub fn uniform(mut self) -> Self {
        self.uniform = true;
        self
    }
}

/// Ordered, name unique set of variables
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBlock {
    name: String,
    instance: String,
    variables: IndexMap<String, ShaderVariable>,
}

impl VariableBlock {
    /// Create an empty block
    pub fn new(name: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: instance.into(),
            variables: IndexMap::new(),
        }
    }

    /// Block name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance name, empty when variables are declared loose
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Add a variable, failing if the name is taken
    pub fn add(&mut self, variable: ShaderVariable) -> Result<()> {
        if self.variables.contains_key(&variable.name) {
            return Err(GraphStructureError::DuplicateVariable {
                name: variable.name,
                block: self.name.clone(),
            }
            .into());
        }
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    /// Add a variable unless one with the same name exists
    ///
    /// Returns whether the variable was added.
    pub fn add_if_absent(&mut self, variable: ShaderVariable) -> bool {
        if self.variables.contains_key(&variable.name) {
            return false;
        }
        self.variables.insert(variable.name.clone(), variable);
        true
    }

    /// Find a variable
    pub fn get(&self, name: &str) -> Option<&ShaderVariable> {
        self.variables.get(name)
    }

    /// Whether a variable exists
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Variables in insertion order
    pub fn variables(&self) -> impl Iterator<Item = &ShaderVariable> {
        self.variables.values()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the block is empty
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn rename(&mut self, map: impl Fn(&str) -> String) {
        self.variables = std::mem::take(&mut self.variables)
            .into_values()
            .map(|mut v| {
                v.name = map(&v.name);
                (v.name.clone(), v)
            })
            .collect();
    }
}

/// Scope delimiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brackets {
    /// `{ }`
    Curly,
    /// `( )`
    Paren,
    /// `[ ]`
    Square,
}

impl Brackets {
    fn open(self) -> char {
        match self {
            Self::Curly => '{',
            Self::Paren => '(',
            Self::Square => '[',
        }
    }

    fn close(self) -> char {
        match self {
            Self::Curly => '}',
            Self::Paren => ')',
            Self::Square => ']',
        }
    }
}

#[derive(Debug, Default)]
struct CallScope {
    emitted: HashSet<NodeHandle>,
    barrier: bool,
}

const INDENT: &str = "    ";

/// One compilation stage with its blocks and text
#[derive(Debug)]
pub struct ShaderStage {
    name: String,
    uniforms: IndexMap<String, VariableBlock>,
    inputs: IndexMap<String, VariableBlock>,
    outputs: IndexMap<String, VariableBlock>,
    constants: VariableBlock,
    code: String,
    indent: usize,
    scopes: Vec<Brackets>,
    functions: IndexSet<String>,
    includes: IndexSet<String>,
    call_scopes: Vec<CallScope>,
}

impl ShaderStage {
    /// Create an empty stage
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uniforms: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            constants: VariableBlock::new(block::CONSTANTS, ""),
            code: String::new(),
            indent: 0,
            scopes: Vec::new(),
            functions: IndexSet::new(),
            includes: IndexSet::new(),
            call_scopes: vec![CallScope::default()],
        }
    }

    /// Stage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emitted source text
    pub fn code(&self) -> &str {
        &self.code
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Create a uniform block, or return the existing one
    pub fn create_uniform_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        self.uniforms
            .entry(name.to_string())
            .or_insert_with(|| VariableBlock::new(name, instance))
    }

    /// Create an input block, or return the existing one
    pub fn create_input_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        self.inputs
            .entry(name.to_string())
            .or_insert_with(|| VariableBlock::new(name, instance))
    }

    /// Create an output block, or return the existing one
    pub fn create_output_block(&mut self, name: &str, instance: &str) -> &mut VariableBlock {
        self.outputs
            .entry(name.to_string())
            .or_insert_with(|| VariableBlock::new(name, instance))
    }

    /// Uniform block by name
    pub fn uniform_block(&self, name: &str) -> Option<&VariableBlock> {
        self.uniforms.get(name)
    }

    /// Uniform block by name
    pub fn uniform_block_mut(&mut self, name: &str) -> Option<&mut VariableBlock> {
        self.uniforms.get_mut(name)
    }

    /// Input block by name
    pub fn input_block(&self, name: &str) -> Option<&VariableBlock> {
        self.inputs.get(name)
    }

    /// Input block by name
    pub fn input_block_mut(&mut self, name: &str) -> Option<&mut VariableBlock> {
        self.inputs.get_mut(name)
    }

    /// Output block by name
    pub fn output_block(&self, name: &str) -> Option<&VariableBlock> {
        self.outputs.get(name)
    }

    /// Output block by name
    pub fn output_block_mut(&mut self, name: &str) -> Option<&mut VariableBlock> {
        self.outputs.get_mut(name)
    }

    /// All uniform blocks
    pub fn uniform_blocks(&self) -> impl Iterator<Item = &VariableBlock> {
        self.uniforms.values()
    }

    /// All input blocks
    pub fn input_blocks(&self) -> impl Iterator<Item = &VariableBlock> {
        self.inputs.values()
    }

    /// All output blocks
    pub fn output_blocks(&self) -> impl Iterator<Item = &VariableBlock> {
        self.outputs.values()
    }

    /// Constants block
    pub fn constants(&self) -> &VariableBlock {
        &self.constants
    }

    /// Constants block
    pub fn constants_mut(&mut self) -> &mut VariableBlock {
        &mut self.constants
    }

    /// Fail if a uniform shares its name with a stage input or output
    pub fn check_name_collisions(&self) -> Result<()> {
        let io: HashSet<&str> = self
            .inputs
            .values()
            .chain(self.outputs.values())
            .filter(|b| b.instance.is_empty())
            .flat_map(|b| b.variables().map(|v| v.name.as_str()))
            .collect();
        for uniform in self.uniforms.values().flat_map(VariableBlock::variables) {
            if io.contains(uniform.name.as_str()) {
                return Err(GraphStructureError::VariableNameCollision {
                    name: uniform.name.clone(),
                    stage: self.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Text
    // ========================================================================

    /// Start an indented line
    pub fn begin_line(&mut self) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
    }

    /// Finish a line
    pub fn end_line(&mut self, semicolon: bool) {
        if semicolon {
            self.code.push(';');
        }
        self.code.push('\n');
    }

    /// Append an empty line
    pub fn new_line(&mut self) {
        self.code.push('\n');
    }

    /// Append raw text
    pub fn add_string(&mut self, text: &str) {
        self.code.push_str(text);
    }

    /// Append a full indented line
    pub fn add_line(&mut self, text: &str, semicolon: bool) {
        self.begin_line();
        self.code.push_str(text);
        self.end_line(semicolon);
    }

    /// Append a line comment
    pub fn add_comment(&mut self, text: &str) {
        self.add_line(&format!("// {text}"), false);
    }

    /// Open a scope on its own line
    pub fn begin_scope(&mut self, brackets: Brackets) {
        self.begin_line();
        self.code.push(brackets.open());
        self.code.push('\n');
        self.indent += 1;
        self.scopes.push(brackets);
    }

    /// Close the innermost scope
    pub fn end_scope(&mut self, semicolon: bool) {
        let brackets = self.scopes.pop().unwrap_or(Brackets::Curly);
        self.indent = self.indent.saturating_sub(1);
        self.begin_line();
        self.code.push(brackets.close());
        self.end_line(semicolon);
    }

    /// Append multi line text, indenting every line
    pub fn add_block(&mut self, text: &str) {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.new_line();
            } else {
                self.add_line(line, false);
            }
        }
    }

    /// Record a function definition, returning false if it was already emitted
    pub fn add_function_definition(&mut self, name: &str) -> bool {
        self.functions.insert(name.to_string())
    }

    /// Whether a function definition was already emitted
    pub fn has_function_definition(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    /// Append library source text
    ///
    /// With `inline_includes`, `#include "file"` lines are resolved through
    /// the context and inlined once per stage; otherwise they are kept.
    pub fn add_source(&mut self, text: &str, context: &GenContext, inline_includes: bool) -> Result<()> {
        for line in text.lines() {
            match include_target(line) {
                Some(path) if inline_includes => self.add_include(path, context)?,
                _ if line.trim().is_empty() => self.new_line(),
                _ => self.add_line(line, false),
            }
        }
        Ok(())
    }

    /// Inline a library file unless it was already included
    pub fn add_include(&mut self, path: &str, context: &GenContext) -> Result<()> {
        if !self.includes.insert(path.to_string()) {
            return Ok(());
        }
        let text = context.resolve_source(path)?;
        self.add_source(&text, context, true)?;
        self.new_line();
        Ok(())
    }

    /// Replace `$token` identifiers in the stage text and block names
    pub fn substitute_tokens(&mut self, tokens: &[(&str, &str)]) {
        self.code = substitute_tokens(&self.code, tokens);
        let map = |name: &str| substitute_tokens(name, tokens);
        for block in self
            .uniforms
            .values_mut()
            .chain(self.inputs.values_mut())
            .chain(self.outputs.values_mut())
        {
            block.rename(map);
            block.instance = map(&block.instance);
        }
    }

    // ========================================================================
    // Call deduplication
    // ========================================================================

    /// Open a call scope; a barrier hides calls emitted in outer scopes
    pub(crate) fn push_call_scope(&mut self, barrier: bool) {
        self.call_scopes.push(CallScope {
            emitted: HashSet::new(),
            barrier,
        });
    }

    /// Close the innermost call scope
    pub(crate) fn pop_call_scope(&mut self) {
        if self.call_scopes.len() > 1 {
            self.call_scopes.pop();
        }
    }

    /// Whether a call for `node` is visible from the current scope
    pub(crate) fn is_emitted(&self, node: NodeHandle) -> bool {
        for scope in self.call_scopes.iter().rev() {
            if scope.emitted.contains(&node) {
                return true;
            }
            if scope.barrier {
                break;
            }
        }
        false
    }

    /// Record a call for `node` in the current scope
    pub(crate) fn mark_emitted(&mut self, node: NodeHandle) {
        if let Some(scope) = self.call_scopes.last_mut() {
            scope.emitted.insert(node);
        }
    }
}

fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("#include")?;
    let rest = rest.trim();
    rest.strip_prefix('"')?.strip_suffix('"')
}

/// Replace every `$token` in `text` whose name is in `tokens`
///
/// Token names are the letters following `$`; unknown tokens are kept.
pub fn substitute_tokens(text: &str, tokens: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        let token = &after[..len];
        match tokens.iter().find(|(name, _)| *name == token) {
            Some((_, replacement)) => result.push_str(replacement),
            None => {
                result.push('$');
                result.push_str(token);
            }
        }
        rest = &after[len..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MemorySources;

    #[test]
    fn test_block_rejects_duplicates() {
        let mut block = VariableBlock::new(block::PUBLIC_UNIFORMS, "");
        block.add(ShaderVariable::new(TypeDesc::Float, "roughness")).unwrap();
        let err = block.add(ShaderVariable::new(TypeDesc::Color3, "roughness")).unwrap_err();
        assert!(err.to_string().contains("roughness"));
        assert!(!block.add_if_absent(ShaderVariable::new(TypeDesc::Float, "roughness")));
        assert!(block.add_if_absent(ShaderVariable::new(TypeDesc::Float, "metalness")));
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_name_collision() {
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        stage
            .create_input_block(block::INPUTS, "")
            .add(ShaderVariable::new(TypeDesc::Float, "weight"))
            .unwrap();
        stage
            .create_uniform_block(block::PUBLIC_UNIFORMS, "")
            .add(ShaderVariable::new(TypeDesc::Float, "weight"))
            .unwrap();
        assert!(stage.check_name_collisions().is_err());
    }

    #[test]
    fn test_scopes_and_indentation() {
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        stage.add_line("void main()", false);
        stage.begin_scope(Brackets::Curly);
        stage.add_line("float x = 1.0", true);
        stage.end_scope(false);
        assert_eq!(stage.code(), "void main()\n{\n    float x = 1.0;\n}\n");
    }

    #[test]
    fn test_includes_are_inlined_once() {
        let context = GenContext::new(
            MemorySources::new()
                .with_file("lib/a.glsl", "float a() { return 1.0; }")
                .with_file("lib/b.glsl", "#include \"lib/a.glsl\"\nfloat b() { return a(); }"),
        );
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        stage.add_include("lib/b.glsl", &context).unwrap();
        stage.add_include("lib/a.glsl", &context).unwrap();
        assert_eq!(stage.code().matches("float a()").count(), 1);
        assert!(stage.code().find("float a()") < stage.code().find("float b()"));
    }

    #[test]
    fn test_call_scope_barrier() {
        let mut stage = ShaderStage::new(PIXEL_STAGE);
        let node = NodeHandle::new(3);
        stage.mark_emitted(node);
        stage.push_call_scope(false);
        assert!(stage.is_emitted(node));
        stage.push_call_scope(true);
        assert!(!stage.is_emitted(node));
        stage.pop_call_scope();
        stage.pop_call_scope();
        assert!(stage.is_emitted(node));
    }

    #[test]
    fn test_substitute_tokens() {
        let tokens = [("inPosition", "i_position"), ("inTexcoord", "i_texcoord")];
        assert_eq!(
            substitute_tokens("vec4($inPosition, 1.0) + $inTexcoord_0 + $unknown", &tokens),
            "vec4(i_position, 1.0) + i_texcoord_0 + $unknown"
        );
    }
}
