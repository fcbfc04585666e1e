// SPDX-License-Identifier: MIT OR Apache-2.0
//! MDL type table.

use super::{ArrayStyle, EnumRemap, Literal, Qualifiers, Syntax, TypeSyntax};
use crate::generator::TargetKind;
use crate::types::{EnumType, TypeDesc};

const RESERVED: &[&str] = &[
    "annotation", "bool", "bool2", "bool3", "bool4", "break", "bsdf", "bsdf_measurement", "case",
    "color", "const", "continue", "default", "do", "double", "edf", "else", "enum", "export", "false",
    "float", "float2", "float3", "float4", "float2x2", "float3x3", "float4x4", "for", "hair_bsdf",
    "if", "import", "in", "int", "int2", "int3", "int4", "intensity_mode", "intensity_power",
    "intensity_radiant_exitance", "let", "light_profile", "material", "material_emission",
    "material_geometry", "material_surface", "material_volume", "mdl", "module", "package", "return",
    "string", "struct", "switch", "texture_2d", "texture_3d", "texture_cube", "texture_ptex", "true",
    "typedef", "uniform", "using", "varying", "vdf", "while", "auto", "catch", "char", "class",
    "const_cast", "delete", "dynamic_cast", "explicit", "extern", "external", "foreach", "friend",
    "goto", "graph", "half", "inline", "inout", "lambda", "long", "mutable", "namespace", "native",
    "new", "operator", "out", "phenomenon", "private", "protected", "public", "reinterpret_cast",
    "sampler", "shader", "short", "signed", "sizeof", "static", "static_cast", "technique",
    "template", "this", "throw", "try", "typeid", "typename", "union", "unsigned", "virtual", "void",
    "volatile", "wchar_t",
];

fn enumeration(name: &str, enum_type: EnumType) -> TypeSyntax {
    let first = enum_type.members()[0];
    TypeSyntax::new(name, &format!("{name}_{first}"), Literal::Enum(enum_type))
}

fn shader(name: &str) -> TypeSyntax {
    TypeSyntax::new(name, "material()", Literal::Opaque)
}

pub(super) fn create() -> Syntax {
    let mut syntax = Syntax::empty(
        TargetKind::Mdl,
        Qualifiers {
            input: "",
            output: "",
            uniform: "uniform",
            constant: "",
        },
        EnumRemap::Typed,
        "mdl",
    );

    syntax.register(TypeDesc::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register(
        TypeDesc::FloatArray,
        TypeSyntax::new(
            "float",
            "",
            Literal::Array {
                element: "float".into(),
                style: ArrayStyle::Unsized,
            },
        ),
    );
    syntax.register(TypeDesc::Integer, TypeSyntax::scalar("int", "0"));
    syntax.register(
        TypeDesc::IntegerArray,
        TypeSyntax::new(
            "int",
            "",
            Literal::Array {
                element: "int".into(),
                style: ArrayStyle::Unsized,
            },
        ),
    );
    syntax.register(TypeDesc::Boolean, TypeSyntax::scalar("bool", "false"));
    syntax.register(
        TypeDesc::Color3,
        TypeSyntax::constructor(
            "color",
            "color(0.0)",
            &["float3({}).x", "float3({}).y", "float3({}).z"],
        ),
    );
    syntax.register(
        TypeDesc::Color4,
        TypeSyntax::new(
            "mx_color4",
            "mk_color4(0.0)",
            Literal::Constructor {
                ctor: "mk_color4".into(),
                uniform_braces: false,
            },
        )
        .with_members(&["float3({}.rgb).x", "float3({}.rgb).y", "float3({}.rgb).z", "{}.a"]),
    );
    syntax.register(TypeDesc::Vector2, TypeSyntax::constructor("float2", "float2(0.0)", &["{}.x", "{}.y"]));
    syntax.register(
        TypeDesc::Vector3,
        TypeSyntax::constructor("float3", "float3(0.0)", &["{}.x", "{}.y", "{}.z"]),
    );
    syntax.register(
        TypeDesc::Vector4,
        TypeSyntax::constructor("float4", "float4(0.0)", &["{}.x", "{}.y", "{}.z", "{}.w"]),
    );
    syntax.register(TypeDesc::Matrix33, TypeSyntax::constructor("float3x3", "float3x3(1.0)", &[]));
    syntax.register(TypeDesc::Matrix44, TypeSyntax::constructor("float4x4", "float4x4(1.0)", &[]));
    syntax.register(TypeDesc::String, TypeSyntax::new("string", "\"\"", Literal::Text { quoted: true }));
    syntax.register(TypeDesc::Filename, TypeSyntax::new("texture_2d", "texture_2d()", Literal::Texture));
    syntax.register(TypeDesc::Bsdf, shader("material"));
    syntax.register(TypeDesc::Edf, shader("material"));
    syntax.register(TypeDesc::Vdf, shader("material"));
    syntax.register(TypeDesc::SurfaceShader, shader("material"));
    syntax.register(TypeDesc::VolumeShader, shader("material"));
    syntax.register(TypeDesc::DisplacementShader, shader("material"));
    syntax.register(TypeDesc::LightShader, shader("material"));
    syntax.register(TypeDesc::Material, shader("material"));

    syntax.register(
        TypeDesc::Enum(EnumType::AddressMode),
        enumeration("mx_addressmode_type", EnumType::AddressMode),
    );
    syntax.register(
        TypeDesc::Enum(EnumType::CoordinateSpace),
        enumeration("mx_coordinatespace_type", EnumType::CoordinateSpace),
    );
    syntax.register(
        TypeDesc::Enum(EnumType::FilterLookupMode),
        enumeration("mx_filterlookup_type", EnumType::FilterLookupMode),
    );
    syntax.register(
        TypeDesc::Enum(EnumType::FilterType),
        enumeration("mx_filter_type", EnumType::FilterType),
    );
    syntax.register(
        TypeDesc::Enum(EnumType::DistributionType),
        enumeration("mx_distribution_type", EnumType::DistributionType),
    );
    syntax.register(
        TypeDesc::Enum(EnumType::ScatterMode),
        enumeration("mx_scatter_mode", EnumType::ScatterMode),
    );

    syntax.reserve(RESERVED);
    syntax.invalid_tokens = vec![("__", "_")];
    syntax.leading_underscore = Some("u");
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_materialx_document::Value;

    #[test]
    fn test_texture_literal() {
        let syntax = create();
        assert_eq!(
            syntax
                .value(TypeDesc::Filename, &Value::Filename("wood.png".into()), false)
                .unwrap(),
            "texture_2d(\"wood.png\", tex::gamma_linear)"
        );
        assert_eq!(
            syntax.value(TypeDesc::Filename, &Value::Filename(String::new()), false).unwrap(),
            "texture_2d()"
        );
    }

    #[test]
    fn test_enum_defaults() {
        let syntax = create();
        assert_eq!(
            syntax
                .default_value(TypeDesc::Enum(EnumType::ScatterMode), false)
                .unwrap(),
            "mx_scatter_mode_R"
        );
        assert_eq!(syntax.type_name(TypeDesc::Bsdf).unwrap(), "material");
    }

    #[test]
    fn test_color_members() {
        let syntax = create();
        assert_eq!(
            syntax.swizzled_variable("c", TypeDesc::Color3, "r", TypeDesc::Float).unwrap(),
            "float3(c).x"
        );
        assert_eq!(
            syntax
                .value(TypeDesc::Color4, &Value::Color4([0.0, 0.0, 0.0, 1.0]), false)
                .unwrap(),
            "mk_color4(0.0, 0.0, 0.0, 1.0)"
        );
    }
}
