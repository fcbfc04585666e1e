// SPDX-License-Identifier: MIT OR Apache-2.0
//! GLSL 4.0 type table.

use super::{ArrayStyle, EnumRemap, Literal, Qualifiers, Syntax, TypeSyntax};
use crate::generator::TargetKind;
use crate::types::TypeDesc;

const RESERVED: &[&str] = &[
    "centroid", "flat", "smooth", "noperspective", "patch", "sample", "break", "continue", "do", "for",
    "while", "switch", "case", "default", "if", "else", "subroutine", "in", "out", "inout", "float",
    "double", "int", "void", "bool", "true", "false", "invariant", "discard", "return", "mat2", "mat3",
    "mat4", "dmat2", "dmat3", "dmat4", "mat2x2", "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4",
    "mat4x2", "mat4x3", "mat4x4", "vec2", "vec3", "vec4", "ivec2", "ivec3", "ivec4", "bvec2", "bvec3",
    "bvec4", "dvec2", "dvec3", "dvec4", "uint", "uvec2", "uvec3", "uvec4", "lowp", "mediump", "highp",
    "precision", "sampler1D", "sampler2D", "sampler3D", "samplerCube", "sampler2DShadow", "struct",
    "common", "partition", "active", "asm", "class", "union", "enum", "typedef", "template", "this",
    "packed", "resource", "goto", "inline", "noinline", "volatile", "public", "static", "extern",
    "external", "interface", "long", "short", "half", "fixed", "unsigned", "superp", "input", "output",
    "filter", "sizeof", "cast", "namespace", "using", "main", "uniform", "const", "attribute",
    "varying", "buffer", "shared", "coherent", "restrict", "readonly", "writeonly", "layout",
    "texture", "mix", "clamp", "min", "max", "sign", "abs", "floor", "ceil", "fract", "mod", "pow",
    "sqrt", "exp", "log", "normalize", "length", "dot", "cross", "reflect", "refract",
];

pub(super) fn create() -> Syntax {
    let mut syntax = Syntax::empty(
        TargetKind::Glsl,
        Qualifiers {
            input: "in",
            output: "out",
            uniform: "uniform",
            constant: "const",
        },
        EnumRemap::Integer,
        "glsl",
    );

    syntax.register(TypeDesc::Float, TypeSyntax::scalar("float", "0.0"));
    syntax.register(
        TypeDesc::FloatArray,
        TypeSyntax::new(
            "float",
            "",
            Literal::Array {
                element: "float".into(),
                style: ArrayStyle::Sized,
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
                style: ArrayStyle::Sized,
            },
        ),
    );
    syntax.register(TypeDesc::Boolean, TypeSyntax::scalar("bool", "false"));
    syntax.register(
        TypeDesc::Color3,
        TypeSyntax::constructor("vec3", "vec3(0.0)", &["{}.x", "{}.y", "{}.z"]),
    );
    syntax.register(
        TypeDesc::Color4,
        TypeSyntax::constructor("vec4", "vec4(0.0)", &["{}.x", "{}.y", "{}.z", "{}.w"]),
    );
    syntax.register(TypeDesc::Vector2, TypeSyntax::constructor("vec2", "vec2(0.0)", &["{}.x", "{}.y"]));
    syntax.register(
        TypeDesc::Vector3,
        TypeSyntax::constructor("vec3", "vec3(0.0)", &["{}.x", "{}.y", "{}.z"]),
    );
    syntax.register(
        TypeDesc::Vector4,
        TypeSyntax::constructor("vec4", "vec4(0.0)", &["{}.x", "{}.y", "{}.z", "{}.w"]),
    );
    syntax.register(TypeDesc::Matrix33, TypeSyntax::constructor("mat3", "mat3(1.0)", &[]));
    syntax.register(TypeDesc::Matrix44, TypeSyntax::constructor("mat4", "mat4(1.0)", &[]));
    syntax.register(TypeDesc::String, TypeSyntax::new("int", "0", Literal::Fixed("0".into())));
    syntax.register(TypeDesc::Filename, TypeSyntax::new("sampler2D", "", Literal::Opaque));
    syntax.register(
        TypeDesc::Bsdf,
        TypeSyntax::new("BSDF", "BSDF(0.0)", Literal::Opaque).with_definition("#define BSDF vec3"),
    );
    syntax.register(
        TypeDesc::Edf,
        TypeSyntax::new("EDF", "EDF(0.0)", Literal::Opaque).with_definition("#define EDF vec3"),
    );
    syntax.register(
        TypeDesc::Vdf,
        TypeSyntax::new("VDF", "VDF(vec3(0.0), vec3(0.0))", Literal::Opaque)
            .with_definition("struct VDF { vec3 absorption; vec3 scattering; };"),
    );
    syntax.register(
        TypeDesc::SurfaceShader,
        TypeSyntax::new("surfaceshader", "surfaceshader(vec3(0.0), vec3(0.0))", Literal::Opaque)
            .with_definition("struct surfaceshader { vec3 color; vec3 transparency; };"),
    );
    syntax.register(
        TypeDesc::VolumeShader,
        TypeSyntax::new("volumeshader", "volumeshader(vec3(0.0), vec3(0.0))", Literal::Opaque)
            .with_definition("struct volumeshader { vec3 color; vec3 transparency; };"),
    );
    syntax.register(
        TypeDesc::DisplacementShader,
        TypeSyntax::new("displacementshader", "displacementshader(vec3(0.0), 1.0)", Literal::Opaque)
            .with_definition("struct displacementshader { vec3 offset; float scale; };"),
    );
    syntax.register(
        TypeDesc::LightShader,
        TypeSyntax::new("lightshader", "lightshader(vec3(0.0), vec3(0.0))", Literal::Opaque)
            .with_definition("struct lightshader { vec3 intensity; vec3 direction; };"),
    );
    syntax.register(
        TypeDesc::Material,
        TypeSyntax::new("material", "material(vec3(0.0), vec3(0.0))", Literal::Opaque)
            .with_definition("#define material surfaceshader"),
    );

    syntax.reserve(RESERVED);
    syntax.invalid_tokens = vec![("__", "_"), ("gl_", "gll")];
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;
    use ordoplay_materialx_document::Value;

    #[test]
    fn test_vector_literals() {
        let syntax = create();
        assert_eq!(
            syntax.value(TypeDesc::Color3, &Value::Color3([1.0, 0.0, 0.0]), false).unwrap(),
            "vec3(1.0, 0.0, 0.0)"
        );
        assert_eq!(syntax.value(TypeDesc::Float, &Value::Float(0.5), false).unwrap(), "0.5");
        assert_eq!(syntax.value(TypeDesc::Integer, &Value::Integer(2), false).unwrap(), "2");
        assert_eq!(syntax.value(TypeDesc::Boolean, &Value::Boolean(true), false).unwrap(), "true");
    }

    #[test]
    fn test_closure_types_have_definitions() {
        let syntax = create();
        let definitions: Vec<&str> = syntax.type_definitions().collect();
        assert!(definitions.contains(&"#define BSDF vec3"));
        assert!(definitions
            .iter()
            .any(|d| d.starts_with("struct surfaceshader")));
        assert_eq!(syntax.default_value(TypeDesc::Matrix33, false).unwrap(), "mat3(1.0)");
    }

    #[test]
    fn test_float_array() {
        let syntax = create();
        let value = Value::FloatArray(vec![1.0, 2.0, 3.0]);
        assert_eq!(syntax.value(TypeDesc::FloatArray, &value, false).unwrap(), "float[3](1.0, 2.0, 3.0)");
        assert_eq!(syntax.array_suffix(TypeDesc::FloatArray, Some(&value)), "[3]");
    }
}
