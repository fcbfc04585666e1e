// SPDX-License-Identifier: MIT OR Apache-2.0
//! Type and syntax registry.
//!
//! A [`Syntax`] maps abstract [`TypeDesc`]s to a target language: type
//! names, default literals, value literals, member accessors and array
//! suffixes. It also owns the identifier rules of the language (reserved
//! words, invalid tokens) and the enumeration remapping rules.
//!
//! One registry is built per generator and is read-only afterwards.

mod glsl;
mod mdl;
mod osl;

use crate::error::{Result, SyntaxRegistryError};
use crate::generator::TargetKind;
use crate::types::{EnumType, TypeDesc};
use indexmap::{IndexMap, IndexSet};
use ordoplay_materialx_document::{format_float, Value};
use std::collections::HashMap;

/// Identifier usage counts for unique naming
pub type IdentifierMap = HashMap<String, usize>;

/// Array literal styles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStyle {
    /// `float[3](a, b, c)`
    Sized,
    /// `float[](a, b, c)`
    Unsized,
    /// `{a, b, c}`
    Braced,
}

/// How values of a type are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Plain number or boolean
    Scalar,
    /// Booleans written as `0`/`1`
    BoolAsInt,
    /// Constructor call over the components
    Constructor {
        /// Constructor name
        ctor: String,
        /// Uniform declarations use `{a, b}` instead
        uniform_braces: bool,
    },
    /// `color4(color(r, g, b), a)`
    NestedColor4 {
        /// Outer constructor
        ctor: String,
        /// Constructor of the rgb part
        inner: String,
    },
    /// 3x3 matrix promoted to a 4x4 constructor
    Matrix33Promoted {
        /// Constructor name
        ctor: String,
    },
    /// String literal, optionally quoted
    Text {
        /// Wrap in double quotes
        quoted: bool,
    },
    /// Always the same text regardless of value
    Fixed(String),
    /// MDL `texture_2d` resource
    Texture,
    /// Typed enumeration literal
    Enum(EnumType),
    /// Array literal
    Array {
        /// Element type name
        element: String,
        /// Literal style
        style: ArrayStyle,
    },
    /// No literal form, only the default is usable
    Opaque,
}

/// Syntax of one type on one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSyntax {
    /// Type name in the target language
    pub name: String,
    /// Default value literal
    pub default_value: String,
    /// Default value literal in uniform declarations
    pub uniform_default_value: String,
    /// Definition emitted once per stage, e.g. a struct
    pub type_definition: Option<String>,
    /// Member access templates, `{}` stands for the variable
    pub members: Vec<String>,
    /// Literal style
    pub literal: Literal,
}

impl TypeSyntax {
    fn new(name: &str, default_value: &str, literal: Literal) -> Self {
        Self {
            name: name.to_string(),
            default_value: default_value.to_string(),
            uniform_default_value: default_value.to_string(),
            type_definition: None,
            members: Vec::new(),
            literal,
        }
    }

    fn scalar(name: &str, default_value: &str) -> Self {
        Self::new(name, default_value, Literal::Scalar).with_members(&["{}"])
    }

    fn constructor(name: &str, default_value: &str, members: &[&str]) -> Self {
        Self::new(
            name,
            default_value,
            Literal::Constructor {
                ctor: name.to_string(),
                uniform_braces: false,
            },
        )
        .with_members(members)
    }

    fn with_uniform_default(mut self, value: &str) -> Self {
        self.uniform_default_value = value.to_string();
        self
    }

    fn with_definition(mut self, definition: &str) -> Self {
        self.type_definition = Some(definition.to_string());
        self
    }

    fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| (*m).to_string()).collect();
        self
    }

    /// Member accessor applied to a variable
    pub fn member(&self, index: usize, variable: &str) -> Option<String> {
        self.members.get(index).map(|m| m.replace("{}", variable))
    }
}

/// How string enumerations are rewritten on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumRemap {
    /// Keep the string
    Keep,
    /// Replace with the member index
    Integer,
    /// Replace with a typed enumeration when one matches
    Typed,
}

/// Storage qualifiers of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifiers {
    /// Function input parameter
    pub input: &'static str,
    /// Function output parameter
    pub output: &'static str,
    /// Uniform variable
    pub uniform: &'static str,
    /// Constant variable
    pub constant: &'static str,
}

/// Type and identifier rules of one target language
#[derive(Debug, Clone)]
pub struct Syntax {
    target: TargetKind,
    types: IndexMap<TypeDesc, TypeSyntax>,
    reserved_words: IndexSet<String>,
    invalid_tokens: Vec<(&'static str, &'static str)>,
    leading_underscore: Option<&'static str>,
    qualifiers: Qualifiers,
    enum_remap: EnumRemap,
    source_extension: &'static str,
}

impl Syntax {
    /// Build the registry for a target
    pub fn for_target(target: TargetKind) -> Self {
        match target {
            TargetKind::Glsl => glsl::create(),
            TargetKind::Osl => osl::create(),
            TargetKind::Mdl => mdl::create(),
        }
    }

    fn empty(target: TargetKind, qualifiers: Qualifiers, enum_remap: EnumRemap, source_extension: &'static str) -> Self {
        Self {
            target,
            types: IndexMap::new(),
            reserved_words: IndexSet::new(),
            invalid_tokens: Vec::new(),
            leading_underscore: None,
            qualifiers,
            enum_remap,
            source_extension,
        }
    }

    fn register(&mut self, ty: TypeDesc, syntax: TypeSyntax) {
        self.reserved_words.insert(syntax.name.clone());
        self.types.insert(ty, syntax);
    }

    fn reserve(&mut self, words: &[&str]) {
        self.reserved_words.extend(words.iter().map(|w| (*w).to_string()));
    }

    /// Target this syntax belongs to
    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Storage qualifiers
    pub fn qualifiers(&self) -> &Qualifiers {
        &self.qualifiers
    }

    /// Extension of library source files
    pub fn source_extension(&self) -> &'static str {
        self.source_extension
    }

    /// Full syntax entry of a type
    pub fn type_syntax(&self, ty: TypeDesc) -> Result<&TypeSyntax> {
        self.types.get(&ty).ok_or_else(|| {
            SyntaxRegistryError::UnmappedType {
                type_name: ty.name().to_string(),
                target: self.target.name().to_string(),
            }
            .into()
        })
    }

    /// Type name in the target language
    pub fn type_name(&self, ty: TypeDesc) -> Result<&str> {
        Ok(&self.type_syntax(ty)?.name)
    }

    /// Default value literal
    pub fn default_value(&self, ty: TypeDesc, uniform: bool) -> Result<&str> {
        let syntax = self.type_syntax(ty)?;
        Ok(if uniform {
            &syntax.uniform_default_value
        } else {
            &syntax.default_value
        })
    }

    /// Member accessor templates of a type
    pub fn members(&self, ty: TypeDesc) -> Result<&[String]> {
        Ok(&self.type_syntax(ty)?.members)
    }

    /// Array suffix for declarations, e.g. `[3]`
    pub fn array_suffix(&self, ty: TypeDesc, value: Option<&Value>) -> String {
        match value {
            Some(v) if ty.is_array() => format!("[{}]", v.components().len()),
            _ => String::new(),
        }
    }

    /// Type definitions in registration order
    pub fn type_definitions(&self) -> impl Iterator<Item = &str> {
        self.types.values().filter_map(|t| t.type_definition.as_deref())
    }

    /// Value literal of `value` written as type `ty`
    pub fn value(&self, ty: TypeDesc, value: &Value, uniform: bool) -> Result<String> {
        let syntax = self.type_syntax(ty)?;
        let mismatch = || -> crate::error::ShaderGenError {
            SyntaxRegistryError::ValueMismatch {
                type_name: ty.name().to_string(),
                value_type: value.type_name().to_string(),
            }
            .into()
        };
        let literal = match &syntax.literal {
            Literal::Scalar => match value {
                Value::Boolean(b) => b.to_string(),
                Value::Integer(i) if ty == TypeDesc::Integer => i.to_string(),
                _ => value.as_float().map(format_float).ok_or_else(mismatch)?,
            },
            Literal::BoolAsInt => match value {
                Value::Boolean(b) => u8::from(*b).to_string(),
                _ => return Err(mismatch()),
            },
            Literal::Text { quoted } => {
                let text = value.as_str().ok_or_else(mismatch)?;
                if *quoted {
                    format!("\"{}\"", text.replace('"', "\\\""))
                } else {
                    text.to_string()
                }
            }
            Literal::Fixed(text) => text.clone(),
            Literal::Texture => match value.as_str() {
                Some("") | None => syntax.default_value.clone(),
                Some(path) => format!("texture_2d(\"{path}\", tex::gamma_linear)"),
            },
            Literal::Enum(enum_type) => {
                let text = value.as_str().ok_or_else(mismatch)?;
                if !enum_type.members().contains(&text) {
                    return Err(SyntaxRegistryError::InvalidEnumValue {
                        value: text.to_string(),
                        input: ty.name().to_string(),
                    }
                    .into());
                }
                format!("{}_{text}", syntax.name)
            }
            Literal::Array { element, style } => {
                let items: Vec<String> = match value {
                    Value::IntegerArray(v) => v.iter().map(ToString::to_string).collect(),
                    Value::FloatArray(v) => v.iter().copied().map(format_float).collect(),
                    _ => return Err(mismatch()),
                };
                let items = items.join(", ");
                match style {
                    ArrayStyle::Sized => format!("{element}[{}]({items})", value.components().len()),
                    ArrayStyle::Unsized => format!("{element}[]({items})"),
                    ArrayStyle::Braced => format!("{{{items}}}"),
                }
            }
            Literal::Opaque => syntax.default_value.clone(),
            Literal::Constructor { .. } | Literal::NestedColor4 { .. } | Literal::Matrix33Promoted { .. } => {
                let components = value.components();
                if components.len() != ty.size() || value.as_str().is_some() {
                    return Err(mismatch());
                }
                let parts: Vec<String> = components.into_iter().map(format_float).collect();
                self.aggregate_with(syntax, &parts, uniform)
            }
        };
        Ok(literal)
    }

    /// Construct an aggregate of type `ty` from component expressions
    pub fn aggregate(&self, ty: TypeDesc, parts: &[String]) -> Result<String> {
        let syntax = self.type_syntax(ty)?;
        if parts.len() == 1 && ty.is_scalar() {
            return Ok(parts[0].clone());
        }
        Ok(self.aggregate_with(syntax, parts, false))
    }

    fn aggregate_with(&self, syntax: &TypeSyntax, parts: &[String], uniform: bool) -> String {
        match &syntax.literal {
            Literal::Constructor { uniform_braces: true, .. } if uniform => {
                format!("{{{}}}", parts.join(", "))
            }
            Literal::Constructor { ctor, .. } => format!("{ctor}({})", parts.join(", ")),
            Literal::NestedColor4 { ctor, inner } if parts.len() == 4 => {
                let rgb = format!("{inner}({})", parts[..3].join(", "));
                if uniform {
                    format!("{{{rgb}, {}}}", parts[3])
                } else {
                    format!("{ctor}({rgb}, {})", parts[3])
                }
            }
            Literal::Matrix33Promoted { ctor } if parts.len() == 9 => {
                let last_row = ["0.0", "0.0", "0.0", "1.0"].map(String::from);
                let rows: Vec<String> = parts
                    .chunks(3)
                    .flat_map(|row| row.iter().cloned().chain(std::iter::once("0.0".to_string())))
                    .chain(last_row)
                    .collect();
                format!("{ctor}({})", rows.join(", "))
            }
            _ => format!("{}({})", syntax.name, parts.join(", ")),
        }
    }

    /// Expression selecting `channels` of `variable` as type `to`
    ///
    /// Channel letters address members of `from`; `0` and `1` are constants.
    pub fn swizzled_variable(&self, variable: &str, from: TypeDesc, channels: &str, to: TypeDesc) -> Result<String> {
        let invalid = || -> crate::error::ShaderGenError {
            SyntaxRegistryError::InvalidChannels {
                channels: channels.to_string(),
                from: from.name().to_string(),
                to: to.name().to_string(),
            }
            .into()
        };
        if channels.chars().count() != to.size().max(1) {
            return Err(invalid());
        }
        let source = self.type_syntax(from)?;
        let parts = channels
            .chars()
            .map(|c| match c {
                '0' => Ok("0.0".to_string()),
                '1' => Ok("1.0".to_string()),
                _ => from
                    .channel_index(c)
                    .and_then(|i| source.member(i, variable))
                    .ok_or_else(invalid),
            })
            .collect::<Result<Vec<_>>>()?;
        self.aggregate(to, &parts)
    }

    /// Rewrite a string enumeration input for this target
    ///
    /// Returns the replacement type and value, or `None` when the input
    /// keeps its string type. A value outside `enum_names` is an error on
    /// every target.
    pub fn remap_enumeration(
        &self,
        input: &str,
        ty: TypeDesc,
        value: Option<&Value>,
        enum_names: Option<&str>,
    ) -> Result<Option<(TypeDesc, Option<Value>)>> {
        let Some(enum_names) = enum_names.filter(|_| ty == TypeDesc::String) else {
            return Ok(None);
        };
        let names: Vec<&str> = enum_names.split(',').map(str::trim).collect();
        let index = match value.and_then(Value::as_str) {
            Some(text) if !text.is_empty() => Some(names.iter().position(|n| *n == text).ok_or_else(|| {
                SyntaxRegistryError::InvalidEnumValue {
                    value: text.to_string(),
                    input: input.to_string(),
                }
            })?),
            _ => None,
        };
        let remapped = match self.enum_remap {
            EnumRemap::Keep => None,
            EnumRemap::Integer => Some((
                TypeDesc::Integer,
                Some(Value::Integer(index.unwrap_or(0) as i32)),
            )),
            EnumRemap::Typed => EnumType::from_members(&names).map(|e| {
                let member = names[index.unwrap_or(0)];
                (TypeDesc::Enum(e), Some(Value::String(member.to_string())))
            }),
        };
        Ok(remapped)
    }

    /// Turn an arbitrary name into a valid identifier of the language
    pub fn make_valid_name(&self, name: &str) -> String {
        let mut valid: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if valid.is_empty() || valid.starts_with(|c: char| c.is_ascii_digit()) {
            valid.insert(0, 'v');
        }
        for (token, replacement) in &self.invalid_tokens {
            while valid.contains(token) {
                valid = valid.replace(token, replacement);
            }
        }
        if let Some(replacement) = self.leading_underscore {
            if let Some(rest) = valid.strip_prefix('_') {
                valid = format!("{replacement}{rest}");
            }
        }
        valid
    }

    /// Identifier map seeded with the reserved words
    pub fn identifier_map(&self) -> IdentifierMap {
        self.reserved_words.iter().map(|w| (w.clone(), 1)).collect()
    }

    /// Whether `word` is reserved
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_words.contains(word)
    }

    /// Make `name` a valid identifier not yet present in `identifiers`
    ///
    /// Taken names get an increasing numeric suffix, so a reserved word
    /// `out` becomes `out1` and a second `foo` becomes `foo1`.
    pub fn make_identifier(&self, name: &str, identifiers: &mut IdentifierMap) -> String {
        let base = self.make_valid_name(name);
        let mut unique = base.clone();
        if let Some(counter) = identifiers.get(&base).copied() {
            let mut counter = counter;
            loop {
                unique = format!("{base}{counter}");
                counter += 1;
                if !identifiers.contains_key(&unique) {
                    break;
                }
            }
            identifiers.insert(base, counter);
        }
        identifiers.insert(unique.clone(), 1);
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_identifier() {
        let syntax = Syntax::for_target(TargetKind::Glsl);
        let mut ids = syntax.identifier_map();
        assert_eq!(syntax.make_identifier("out", &mut ids), "out1");
        assert_eq!(syntax.make_identifier("foo", &mut ids), "foo");
        assert_eq!(syntax.make_identifier("foo", &mut ids), "foo1");
        assert_eq!(syntax.make_identifier("foo", &mut ids), "foo2");
        assert_eq!(syntax.make_identifier("out", &mut ids), "out2");
    }

    #[test]
    fn test_suffix_skips_taken_names() {
        let syntax = Syntax::for_target(TargetKind::Osl);
        let mut ids = syntax.identifier_map();
        assert_eq!(syntax.make_identifier("node1", &mut ids), "node1");
        assert_eq!(syntax.make_identifier("node", &mut ids), "node");
        assert_eq!(syntax.make_identifier("node", &mut ids), "node2");
    }

    #[test]
    fn test_make_valid_name() {
        let glsl = Syntax::for_target(TargetKind::Glsl);
        assert_eq!(glsl.make_valid_name("my node.color"), "my_node_color");
        assert_eq!(glsl.make_valid_name("2d"), "v2d");
        assert_eq!(glsl.make_valid_name("a__b"), "a_b");
        assert_eq!(glsl.make_valid_name("gl_Position"), "gllPosition");

        let mdl = Syntax::for_target(TargetKind::Mdl);
        assert_eq!(mdl.make_valid_name("_hidden"), "uhidden");
    }

    #[test]
    fn test_swizzle() {
        let glsl = Syntax::for_target(TargetKind::Glsl);
        assert_eq!(
            glsl.swizzled_variable("c", TypeDesc::Color3, "bgr", TypeDesc::Color3).unwrap(),
            "vec3(c.z, c.y, c.x)"
        );
        assert_eq!(
            glsl.swizzled_variable("c", TypeDesc::Color3, "rgb1", TypeDesc::Color4).unwrap(),
            "vec4(c.x, c.y, c.z, 1.0)"
        );
        assert_eq!(
            glsl.swizzled_variable("f", TypeDesc::Float, "rrr", TypeDesc::Color3).unwrap(),
            "vec3(f, f, f)"
        );
        assert_eq!(
            glsl.swizzled_variable("c", TypeDesc::Color3, "g", TypeDesc::Float).unwrap(),
            "c.y"
        );
        assert!(glsl
            .swizzled_variable("c", TypeDesc::Color3, "rgq", TypeDesc::Color3)
            .is_err());
        assert!(glsl
            .swizzled_variable("c", TypeDesc::Color3, "rg", TypeDesc::Color3)
            .is_err());
    }

    #[test]
    fn test_matrix33_promotes_to_matrix44() {
        let osl = Syntax::for_target(TargetKind::Osl);
        let value = Value::Matrix33([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let expected = "matrix(1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0, 0.0, 0.0, 0.0, 1.0)";
        assert_eq!(osl.value(TypeDesc::Matrix33, &value, false).unwrap(), expected);
        assert_eq!(osl.value(TypeDesc::Matrix33, &value, true).unwrap(), expected);
    }

    #[test]
    fn test_remap_enumeration() {
        let names = Some("constant,clamp,periodic,mirror");
        let value = Value::String("periodic".into());

        let glsl = Syntax::for_target(TargetKind::Glsl);
        let (ty, v) = glsl
            .remap_enumeration("uaddressmode", TypeDesc::String, Some(&value), names)
            .unwrap()
            .unwrap();
        assert_eq!(ty, TypeDesc::Integer);
        assert_eq!(v, Some(Value::Integer(2)));

        let mdl = Syntax::for_target(TargetKind::Mdl);
        let (ty, v) = mdl
            .remap_enumeration("uaddressmode", TypeDesc::String, Some(&value), names)
            .unwrap()
            .unwrap();
        assert_eq!(ty, TypeDesc::Enum(EnumType::AddressMode));
        assert_eq!(mdl.value(ty, &v.unwrap(), false).unwrap(), "mx_addressmode_type_periodic");

        let osl = Syntax::for_target(TargetKind::Osl);
        assert!(osl
            .remap_enumeration("uaddressmode", TypeDesc::String, Some(&value), names)
            .unwrap()
            .is_none());

        let bad = Value::String("spiral".into());
        for syntax in [glsl, mdl, osl] {
            assert!(syntax
                .remap_enumeration("uaddressmode", TypeDesc::String, Some(&bad), names)
                .is_err());
        }
    }
}
