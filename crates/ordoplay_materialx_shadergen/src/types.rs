// SPDX-License-Identifier: MIT OR Apache-2.0
//! Abstract port types shared by every target.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a type is used by the generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    /// Plain data
    None,
    /// Color value
    Color,
    /// Vector value
    Vector,
    /// Matrix value
    Matrix,
    /// File path
    Filename,
    /// BSDF, EDF or VDF
    Closure,
    /// Surface, volume, displacement or light shader
    Shader,
    /// Material
    Material,
    /// Enumeration
    Enum,
}

/// Enumerations with a dedicated type on some targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnumType {
    /// Texture address mode
    AddressMode,
    /// Coordinate space
    CoordinateSpace,
    /// Texture filter lookup
    FilterLookupMode,
    /// Convolution filter
    FilterType,
    /// Microfacet distribution
    DistributionType,
    /// BSDF scattering mode
    ScatterMode,
}

impl EnumType {
    /// All enumerations
    pub const ALL: [EnumType; 6] = [
        Self::AddressMode,
        Self::CoordinateSpace,
        Self::FilterLookupMode,
        Self::FilterType,
        Self::DistributionType,
        Self::ScatterMode,
    ];

    /// Member names in declaration order
    pub fn members(self) -> &'static [&'static str] {
        match self {
            Self::AddressMode => &["constant", "clamp", "periodic", "mirror"],
            Self::CoordinateSpace => &["model", "object", "world"],
            Self::FilterLookupMode => &["closest", "linear", "cubic"],
            Self::FilterType => &["box", "gaussian"],
            Self::DistributionType => &["ggx"],
            Self::ScatterMode => &["R", "T", "RT"],
        }
    }

    /// Find the enumeration whose members are exactly `names`
    pub fn from_members(names: &[&str]) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.members() == names)
    }
}

/// A port type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    /// Boolean
    Boolean,
    /// Integer
    Integer,
    /// Integer array
    IntegerArray,
    /// Float
    Float,
    /// Float array
    FloatArray,
    /// RGB color
    Color3,
    /// RGBA color
    Color4,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// 3x3 matrix
    Matrix33,
    /// 4x4 matrix
    Matrix44,
    /// String
    String,
    /// File path
    Filename,
    /// Bidirectional scattering distribution
    Bsdf,
    /// Emission distribution
    Edf,
    /// Volume distribution
    Vdf,
    /// Surface shader
    SurfaceShader,
    /// Volume shader
    VolumeShader,
    /// Displacement shader
    DisplacementShader,
    /// Light shader
    LightShader,
    /// Material
    Material,
    /// Target specific enumeration
    Enum(EnumType),
}

impl TypeDesc {
    /// Resolve a document type name
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "integerarray" => Self::IntegerArray,
            "float" => Self::Float,
            "floatarray" => Self::FloatArray,
            "color3" => Self::Color3,
            "color4" => Self::Color4,
            "vector2" => Self::Vector2,
            "vector3" => Self::Vector3,
            "vector4" => Self::Vector4,
            "matrix33" => Self::Matrix33,
            "matrix44" => Self::Matrix44,
            "string" => Self::String,
            "filename" => Self::Filename,
            "BSDF" => Self::Bsdf,
            "EDF" => Self::Edf,
            "VDF" => Self::Vdf,
            "surfaceshader" => Self::SurfaceShader,
            "volumeshader" => Self::VolumeShader,
            "displacementshader" => Self::DisplacementShader,
            "lightshader" => Self::LightShader,
            "material" => Self::Material,
            _ => return None,
        };
        Some(ty)
    }

    /// Document type name
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::IntegerArray => "integerarray",
            Self::Float => "float",
            Self::FloatArray => "floatarray",
            Self::Color3 => "color3",
            Self::Color4 => "color4",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Matrix33 => "matrix33",
            Self::Matrix44 => "matrix44",
            Self::String => "string",
            Self::Filename => "filename",
            Self::Bsdf => "BSDF",
            Self::Edf => "EDF",
            Self::Vdf => "VDF",
            Self::SurfaceShader => "surfaceshader",
            Self::VolumeShader => "volumeshader",
            Self::DisplacementShader => "displacementshader",
            Self::LightShader => "lightshader",
            Self::Material => "material",
            Self::Enum(EnumType::AddressMode) => "addressmode",
            Self::Enum(EnumType::CoordinateSpace) => "coordinatespace",
            Self::Enum(EnumType::FilterLookupMode) => "filterlookupmode",
            Self::Enum(EnumType::FilterType) => "filtertype",
            Self::Enum(EnumType::DistributionType) => "distributiontype",
            Self::Enum(EnumType::ScatterMode) => "scattermode",
        }
    }

    /// Semantic category
    pub fn semantic(self) -> Semantic {
        match self {
            Self::Color3 | Self::Color4 => Semantic::Color,
            Self::Vector2 | Self::Vector3 | Self::Vector4 => Semantic::Vector,
            Self::Matrix33 | Self::Matrix44 => Semantic::Matrix,
            Self::Filename => Semantic::Filename,
            Self::Bsdf | Self::Edf | Self::Vdf => Semantic::Closure,
            Self::SurfaceShader | Self::VolumeShader | Self::DisplacementShader | Self::LightShader => {
                Semantic::Shader
            }
            Self::Material => Semantic::Material,
            Self::Enum(_) => Semantic::Enum,
            _ => Semantic::None,
        }
    }

    /// Number of float components, 0 for non numeric types
    pub fn size(self) -> usize {
        match self {
            Self::Boolean | Self::Integer | Self::Float => 1,
            Self::Vector2 => 2,
            Self::Color3 | Self::Vector3 => 3,
            Self::Color4 | Self::Vector4 => 4,
            Self::Matrix33 => 9,
            Self::Matrix44 => 16,
            _ => 0,
        }
    }

    /// Single component type
    pub fn is_scalar(self) -> bool {
        matches!(self, Self::Boolean | Self::Integer | Self::Float)
    }

    /// Two float components
    pub fn is_float2(self) -> bool {
        self == Self::Vector2
    }

    /// Three float components
    pub fn is_float3(self) -> bool {
        matches!(self, Self::Color3 | Self::Vector3)
    }

    /// Four float components
    pub fn is_float4(self) -> bool {
        matches!(self, Self::Color4 | Self::Vector4)
    }

    /// BSDF, EDF or VDF
    pub fn is_closure(self) -> bool {
        self.semantic() == Semantic::Closure
    }

    /// Array types
    pub fn is_array(self) -> bool {
        matches!(self, Self::FloatArray | Self::IntegerArray)
    }

    /// Values of this type can be exposed for external editing
    pub fn is_editable(self) -> bool {
        !matches!(
            self.semantic(),
            Semantic::Closure | Semantic::Shader | Semantic::Material
        )
    }

    /// Component index of a swizzle channel letter
    ///
    /// Color types accept `rgba`, vector types accept `xyzw`.
    pub fn channel_index(self, channel: char) -> Option<usize> {
        let index = match (self.semantic(), channel) {
            (Semantic::Color, 'r') | (Semantic::Vector, 'x') => 0,
            (Semantic::Color, 'g') | (Semantic::Vector, 'y') => 1,
            (Semantic::Color, 'b') | (Semantic::Vector, 'z') => 2,
            (Semantic::Color, 'a') | (Semantic::Vector, 'w') => 3,
            (Semantic::None, 'r' | 'x') if self.is_scalar() => 0,
            _ => return None,
        };
        (index < self.size()).then_some(index)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trip() {
        for name in ["float", "color3", "vector4", "BSDF", "surfaceshader", "filename"] {
            assert_eq!(TypeDesc::from_name(name).map(TypeDesc::name), Some(name));
        }
        assert_eq!(TypeDesc::from_name("quaternion"), None);
    }

    #[test]
    fn test_channel_index() {
        assert_eq!(TypeDesc::Color3.channel_index('b'), Some(2));
        assert_eq!(TypeDesc::Color3.channel_index('a'), None);
        assert_eq!(TypeDesc::Vector4.channel_index('w'), Some(3));
        assert_eq!(TypeDesc::Vector2.channel_index('r'), None);
        assert_eq!(TypeDesc::Float.channel_index('r'), Some(0));
    }

    #[test]
    fn test_editable() {
        assert!(TypeDesc::Color3.is_editable());
        assert!(TypeDesc::Filename.is_editable());
        assert!(!TypeDesc::Bsdf.is_editable());
        assert!(!TypeDesc::SurfaceShader.is_editable());
    }

    #[test]
    fn test_enum_from_members() {
        assert_eq!(
            EnumType::from_members(&["constant", "clamp", "periodic", "mirror"]),
            Some(EnumType::AddressMode)
        );
        assert_eq!(EnumType::from_members(&["a", "b"]), None);
    }
}
