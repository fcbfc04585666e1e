// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed literal values carried by inputs and node definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value attached to an input, output or definition port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i32),
    /// Floating point value
    Float(f32),
    /// RGB color
    Color3([f32; 3]),
    /// RGBA color
    Color4([f32; 4]),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// 3x3 matrix, row major
    Matrix33([f32; 9]),
    /// 4x4 matrix, row major
    Matrix44([f32; 16]),
    /// String value
    String(String),
    /// File path
    Filename(String),
    /// Array of floats
    FloatArray(Vec<f32>),
    /// Array of integers
    IntegerArray(Vec<i32>),
}

impl Value {
    /// Name of the document type this value belongs to
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Color3(_) => "color3",
            Self::Color4(_) => "color4",
            Self::Vector2(_) => "vector2",
            Self::Vector3(_) => "vector3",
            Self::Vector4(_) => "vector4",
            Self::Matrix33(_) => "matrix33",
            Self::Matrix44(_) => "matrix44",
            Self::String(_) => "string",
            Self::Filename(_) => "filename",
            Self::FloatArray(_) => "floatarray",
            Self::IntegerArray(_) => "integerarray",
        }
    }

    /// Parse a value from its type name and comma separated value string
    pub fn parse(type_name: &str, text: &str) -> Result<Self, ValueError> {
        let floats = || parse_list::<f32>(type_name, text);
        let value = match type_name {
            "boolean" => match text.trim() {
                "true" => Self::Boolean(true),
                "false" => Self::Boolean(false),
                _ => return Err(ValueError::parse(type_name, text)),
            },
            "integer" => Self::Integer(
                text.trim()
                    .parse()
                    .map_err(|_| ValueError::parse(type_name, text))?,
            ),
            "float" => Self::Float(
                text.trim()
                    .parse()
                    .map_err(|_| ValueError::parse(type_name, text))?,
            ),
            "color3" => Self::Color3(fixed(type_name, text, floats()?)?),
            "color4" => Self::Color4(fixed(type_name, text, floats()?)?),
            "vector2" => Self::Vector2(fixed(type_name, text, floats()?)?),
            "vector3" => Self::Vector3(fixed(type_name, text, floats()?)?),
            "vector4" => Self::Vector4(fixed(type_name, text, floats()?)?),
            "matrix33" => Self::Matrix33(fixed(type_name, text, floats()?)?),
            "matrix44" => Self::Matrix44(fixed(type_name, text, floats()?)?),
            "string" => Self::String(text.to_string()),
            "filename" => Self::Filename(text.to_string()),
            "floatarray" => Self::FloatArray(floats()?),
            "integerarray" => Self::IntegerArray(parse_list(type_name, text)?),
            _ => return Err(ValueError::UnknownType(type_name.to_string())),
        };
        Ok(value)
    }

    /// Comma separated string form, e.g. `1.0, 0.5, 0.0`
    pub fn value_string(&self) -> String {
        match self {
            Self::Boolean(v) => v.to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::String(s) | Self::Filename(s) => s.clone(),
            Self::IntegerArray(v) => join(v.iter().map(ToString::to_string)),
            _ => join(self.components().into_iter().map(format_float)),
        }
    }

    /// Numeric components in declaration order
    ///
    /// Scalars yield a single component, strings yield none.
    pub fn components(&self) -> Vec<f32> {
        match self {
            Self::Boolean(v) => vec![if *v { 1.0 } else { 0.0 }],
            Self::Integer(v) => vec![*v as f32],
            Self::Float(v) => vec![*v],
            Self::Color3(v) | Self::Vector3(v) => v.to_vec(),
            Self::Color4(v) | Self::Vector4(v) => v.to_vec(),
            Self::Vector2(v) => v.to_vec(),
            Self::Matrix33(v) => v.to_vec(),
            Self::Matrix44(v) => v.to_vec(),
            Self::FloatArray(v) => v.clone(),
            Self::IntegerArray(v) => v.iter().map(|i| *i as f32).collect(),
            Self::String(_) | Self::Filename(_) => Vec::new(),
        }
    }

    /// Scalar view of the value, if it has exactly one component
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Boolean(_) | Self::Integer(_) | Self::Float(_) => {
                self.components().first().copied()
            }
            _ => None,
        }
    }

    /// String payload of string and filename values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Filename(s) => Some(s),
            _ => None,
        }
    }

    /// Multiply every numeric component by `factor`
    ///
    /// Booleans, integers and strings are returned unchanged.
    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |v: &mut [f32]| v.iter_mut().for_each(|c| *c *= factor);
        let mut value = self.clone();
        match &mut value {
            Self::Float(v) => *v *= factor,
            Self::Color3(v) | Self::Vector3(v) => scale(v),
            Self::Color4(v) | Self::Vector4(v) => scale(v),
            Self::Vector2(v) => scale(v),
            Self::FloatArray(v) => scale(v),
            _ => {}
        }
        value
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value_string())
    }
}

/// Format a float so that it always carries a decimal point
pub fn format_float(value: f32) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

fn parse_list<T: std::str::FromStr>(type_name: &str, text: &str) -> Result<Vec<T>, ValueError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .map_err(|_| ValueError::parse(type_name, text))
        })
        .collect()
}

fn fixed<const N: usize>(type_name: &str, text: &str, values: Vec<f32>) -> Result<[f32; N], ValueError> {
    values
        .try_into()
        .map_err(|_| ValueError::parse(type_name, text))
}

/// Error when parsing a value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The type name is not a value type
    #[error("Unknown value type: {0}")]
    UnknownType(String),

    /// The text does not describe a value of the type
    #[error("Cannot parse '{text}' as {type_name}")]
    Parse {
        /// Requested type
        type_name: String,
        /// Offending text
        text: String,
    },
}

impl ValueError {
    fn parse(type_name: &str, text: &str) -> Self {
        Self::Parse {
            type_name: type_name.to_string(),
            text: text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.5), "0.5");
        assert_eq!(format_float(-2.0), "-2.0");
        assert_eq!(Value::Color3([1.0, 0.0, 0.25]).value_string(), "1.0, 0.0, 0.25");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            Value::parse("color3", "1, 0.5, 0").unwrap(),
            Value::Color3([1.0, 0.5, 0.0])
        );
        assert_eq!(Value::parse("integer", " 3 ").unwrap(), Value::Integer(3));
        assert_eq!(Value::parse("boolean", "true").unwrap(), Value::Boolean(true));
        assert!(Value::parse("vector2", "1, 2, 3").is_err());
        assert!(matches!(
            Value::parse("quaternion", "0"),
            Err(ValueError::UnknownType(_))
        ));
    }

    #[test]
    fn test_scaled() {
        let value = Value::Vector3([1.0, 2.0, 3.0]).scaled(0.01);
        assert_eq!(value.components().len(), 3);
        assert!((value.components()[2] - 0.03).abs() < 1e-6);
        assert_eq!(Value::Integer(4).scaled(2.0), Value::Integer(4));
    }
}
