// SPDX-License-Identifier: MIT OR Apache-2.0
//! OSL type table.

use super::{ArrayStyle, EnumRemap, Literal, Qualifiers, Syntax, TypeSyntax};
use crate::generator::TargetKind;
use crate::types::TypeDesc;

const RESERVED: &[&str] = &[
    "and", "break", "closure", "color", "continue", "do", "else", "emit", "float", "for", "if",
    "illuminance", "illuminate", "int", "matrix", "normal", "not", "or", "output", "point", "public",
    "return", "string", "struct", "vector", "void", "while", "bool", "case", "catch", "char", "class",
    "const", "delete", "default", "double", "enum", "extern", "false", "friend", "goto", "inline",
    "long", "new", "operator", "private", "protected", "short", "signed", "sizeof", "static",
    "switch", "template", "this", "throw", "true", "try", "typedef", "uniform", "union", "unsigned",
    "varying", "virtual", "volatile", "emission", "background", "diffuse", "oren_nayar",
    "translucent", "phong", "ward", "microfacet", "reflection", "transparent", "debug", "holdout",
    "subsurface", "surface", "volume", "displacement", "shader", "texture", "transform", "mix",
];

fn closure() -> TypeSyntax {
    TypeSyntax::new("closure color", "null_closure", Literal::Opaque).with_uniform_default("0")
}

pub(super) fn create() -> Syntax {
    let mut syntax = Syntax::empty(
        TargetKind::Osl,
        Qualifiers {
            input: "",
            output: "output",
            uniform: "",
            constant: "",
        },
        EnumRemap::Keep,
        "osl",
    );

    syntax.register(TypeDesc::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register(
        TypeDesc::FloatArray,
        TypeSyntax::new(
            "float",
            "",
            Literal::Array {
                element: "float".into(),
                style: ArrayStyle::Braced,
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
                style: ArrayStyle::Braced,
            },
        ),
    );
    syntax.register(
        TypeDesc::Boolean,
        TypeSyntax::new("int", "0", Literal::BoolAsInt).with_members(&["{}"]),
    );
    syntax.register(
        TypeDesc::Color3,
        TypeSyntax::constructor("color", "color(0.0)", &["{}[0]", "{}[1]", "{}[2]"]),
    );
    syntax.register(
        TypeDesc::Color4,
        TypeSyntax::new(
            "color4",
            "color4(color(0.0), 0.0)",
            Literal::NestedColor4 {
                ctor: "color4".into(),
                inner: "color".into(),
            },
        )
        .with_uniform_default("{color(0.0), 0.0}")
        .with_members(&["{}.rgb[0]", "{}.rgb[1]", "{}.rgb[2]", "{}.a"]),
    );
    syntax.register(
        TypeDesc::Vector2,
        TypeSyntax::new(
            "vector2",
            "vector2(0.0, 0.0)",
            Literal::Constructor {
                ctor: "vector2".into(),
                uniform_braces: true,
            },
        )
        .with_uniform_default("{0.0, 0.0}")
        .with_members(&["{}.x", "{}.y"]),
    );
    syntax.register(
        TypeDesc::Vector3,
        TypeSyntax::constructor("vector", "vector(0.0)", &["{}[0]", "{}[1]", "{}[2]"]),
    );
    syntax.register(
        TypeDesc::Vector4,
        TypeSyntax::new(
            "vector4",
            "vector4(0.0, 0.0, 0.0, 0.0)",
            Literal::Constructor {
                ctor: "vector4".into(),
                uniform_braces: true,
            },
        )
        .with_uniform_default("{0.0, 0.0, 0.0, 0.0}")
        .with_members(&["{}.x", "{}.y", "{}.z", "{}.w"]),
    );
    syntax.register(
        TypeDesc::Matrix33,
        TypeSyntax::new(
            "matrix",
            "matrix(1.0)",
            Literal::Matrix33Promoted {
                ctor: "matrix".into(),
            },
        ),
    );
    syntax.register(TypeDesc::Matrix44, TypeSyntax::constructor("matrix", "matrix(1.0)", &[]));
    syntax.register(TypeDesc::String, TypeSyntax::new("string", "\"\"", Literal::Text { quoted: true }));
    syntax.register(TypeDesc::Filename, TypeSyntax::new("string", "\"\"", Literal::Text { quoted: true }));
    syntax.register(TypeDesc::Bsdf, closure());
    syntax.register(TypeDesc::Edf, closure());
    syntax.register(TypeDesc::Vdf, closure());
    syntax.register(TypeDesc::SurfaceShader, closure());
    syntax.register(TypeDesc::VolumeShader, closure());
    syntax.register(TypeDesc::DisplacementShader, closure());
    syntax.register(TypeDesc::LightShader, closure());
    syntax.register(TypeDesc::Material, closure());

    syntax.reserve(RESERVED);
    syntax.invalid_tokens = vec![("__", "_")];
    syntax
}
