// SPDX-License-Identifier: MIT OR Apache-2.0
//! Standard node library.
//!
//! Definitions, implementations and geometric properties for the nodes the
//! shader generators know how to emit, for the `genglsl`, `genosl` and
//! `genmdl` targets. File based implementations reference the library
//! sources in [`sources`].

pub mod sources;

use crate::document::{Document, DocumentError};
use crate::element::{
    BsdfScope, GeomPropDef, Implementation, Node, NodeDef, NodeGraph, NodeInput, Output, PortDef,
};
use crate::value::Value;

/// GLSL target name
pub const GENGLSL: &str = "genglsl";
/// OSL target name
pub const GENOSL: &str = "genosl";
/// MDL target name
pub const GENMDL: &str = "genmdl";

/// All targets the library provides implementations for
pub const TARGETS: [&str; 3] = [GENGLSL, GENOSL, GENMDL];

/// MDL module holding the standard library functions
const MDL_STDLIB: &str = "materialx/stdlib.mdl";
/// MDL module holding the physically based library functions
const MDL_PBRLIB: &str = "materialx/pbrlib.mdl";

const ADDRESS_MODES: &str = "constant,clamp,periodic,mirror";
const FILTER_LOOKUP: &str = "closest,linear,cubic";
const SPACES: &str = "model,object,world";

/// Create the standard library document
pub fn create_standard_library() -> Document {
    let mut lib = Library::new();

    // ========================================================================
    // Geometric properties
    // ========================================================================

    lib.geom_prop(GeomPropDef::new("UV0", "texcoord").with_index(0));
    lib.geom_prop(GeomPropDef::new("Pobject", "position").with_space("object"));
    lib.geom_prop(GeomPropDef::new("Pworld", "position").with_space("world"));
    lib.geom_prop(GeomPropDef::new("Nobject", "normal").with_space("object"));
    lib.geom_prop(GeomPropDef::new("Nworld", "normal").with_space("world"));

    // ========================================================================
    // Constants
    // ========================================================================

    let constants = [
        ("float", Value::Float(0.0)),
        ("integer", Value::Integer(0)),
        ("boolean", Value::Boolean(false)),
        ("color3", Value::Color3([0.0; 3])),
        ("color4", Value::Color4([0.0; 4])),
        ("vector2", Value::Vector2([0.0; 2])),
        ("vector3", Value::Vector3([0.0; 3])),
    ];
    for (type_name, default) in constants {
        let name = format!("ND_constant_{type_name}");
        lib.def(NodeDef::new(&name, "constant", type_name).with_input(PortDef::new("value", type_name).with_value(default)));
        lib.shared_inline(&name, "{{value}}");
    }

    // ========================================================================
    // Math
    // ========================================================================

    for type_name in ["float", "color3", "vector2", "vector3"] {
        let add = format!("ND_add_{type_name}");
        lib.def(binary(&add, "add", type_name, type_name));
        lib.shared_inline(&add, "{{in1}} + {{in2}}");

        let multiply = format!("ND_multiply_{type_name}");
        lib.def(binary(&multiply, "multiply", type_name, type_name));
        lib.shared_inline(&multiply, "{{in1}} * {{in2}}");
    }
    lib.def(binary("ND_multiply_color3FA", "multiply", "color3", "float"));
    lib.shared_inline("ND_multiply_color3FA", "{{in1}} * {{in2}}");

    for type_name in ["float", "color3"] {
        let name = format!("ND_mix_{type_name}");
        lib.def(
            NodeDef::new(&name, "mix", type_name)
                .with_input(PortDef::new("fg", type_name).with_value(zero(type_name)))
                .with_input(PortDef::new("bg", type_name).with_value(zero(type_name)))
                .with_input(PortDef::new("mix", "float").with_value(Value::Float(0.0))),
        );
        lib.inline(&name, GENGLSL, "mix({{bg}}, {{fg}}, {{mix}})");
        lib.inline(&name, GENOSL, "mix({{bg}}, {{fg}}, {{mix}})");
        lib.inline(&name, GENMDL, "math::lerp({{bg}}, {{fg}}, {{mix}})");
    }

    // ========================================================================
    // Textures
    // ========================================================================

    for (type_name, default) in [("float", Value::Float(0.0)), ("color3", Value::Color3([0.0; 3]))] {
        let name = format!("ND_image_{type_name}");
        let function = format!("mx_image_{type_name}");
        lib.def(
            NodeDef::new(&name, "image", type_name)
                .with_group("texture2d")
                .with_input(PortDef::new("file", "filename").with_value(Value::Filename(String::new())).uniform())
                .with_input(PortDef::new("default", type_name).with_value(default))
                .with_input(PortDef::new("texcoord", "vector2").with_default_geom_prop("UV0"))
                .with_input(address_mode("uaddressmode"))
                .with_input(address_mode("vaddressmode"))
                .with_input(
                    PortDef::new("filtertype", "string")
                        .with_enum(FILTER_LOOKUP)
                        .with_value(Value::String("linear".into()))
                        .uniform(),
                ),
        );
        lib.file(&name, GENGLSL, &format!("stdlib/genglsl/{function}.glsl"), &function);
        lib.file(&name, GENOSL, &format!("stdlib/genosl/{function}.osl"), &function);
        lib.file(&name, GENMDL, MDL_STDLIB, &function);
    }

    lib.def(
        NodeDef::new("ND_blur_color3", "blur", "color3")
            .with_group("convolution2d")
            .with_input(PortDef::new("in", "color3").with_value(Value::Color3([0.0; 3])))
            .with_input(PortDef::new("size", "float").with_value(Value::Float(0.0)))
            .with_input(
                PortDef::new("filtertype", "string")
                    .with_enum("box,gaussian")
                    .with_value(Value::String("box".into()))
                    .uniform(),
            ),
    );
    lib.structural("ND_blur_color3");

    // ========================================================================
    // Geometry
    // ========================================================================

    lib.def(
        NodeDef::new("ND_texcoord_vector2", "texcoord", "vector2")
            .with_group("geometric")
            .with_input(PortDef::new("index", "integer").with_value(Value::Integer(0)).uniform()),
    );
    lib.implementation(Implementation::new("IM_texcoord_vector2_genglsl", "ND_texcoord_vector2", GENGLSL));
    lib.inline("ND_texcoord_vector2", GENOSL, "vector2(u, v)");
    lib.inline(
        "ND_texcoord_vector2",
        GENMDL,
        "float2(state::texture_coordinate({{index}}).x, state::texture_coordinate({{index}}).y)",
    );

    for (node, osl) in [("position", "transform({{space}}, P)"), ("normal", "transform({{space}}, N)")] {
        let name = format!("ND_{node}_vector3");
        lib.def(
            NodeDef::new(&name, node, "vector3")
                .with_group("geometric")
                .with_input(
                    PortDef::new("space", "string")
                        .with_enum(SPACES)
                        .with_value(Value::String("object".into()))
                        .uniform(),
                ),
        );
        lib.implementation(Implementation::new(format!("IM_{node}_vector3_genglsl"), &name, GENGLSL));
        lib.inline(&name, GENOSL, osl);
        lib.file(&name, GENMDL, MDL_STDLIB, &format!("mx_{node}_vector3"));
    }

    // ========================================================================
    // Channel operations
    // ========================================================================

    let swizzles = [
        ("color3", "float"),
        ("color3", "color3"),
        ("color3", "vector3"),
        ("vector3", "color3"),
        ("color4", "color3"),
        ("vector2", "float"),
        ("vector3", "vector2"),
    ];
    for (from, to) in swizzles {
        let name = format!("ND_swizzle_{from}_{to}");
        lib.def(
            NodeDef::new(&name, "swizzle", to)
                .with_input(PortDef::new("in", from).with_value(zero(from)))
                .with_input(PortDef::new("channels", "string").with_value(Value::String(String::new())).uniform()),
        );
        lib.structural(&name);
    }

    let conversions = [
        ("float", "color3"),
        ("integer", "float"),
        ("color3", "vector3"),
        ("vector3", "color3"),
        ("color3", "color4"),
        ("vector2", "vector3"),
    ];
    for (from, to) in conversions {
        let name = format!("ND_convert_{from}_{to}");
        lib.def(NodeDef::new(&name, "convert", to).with_input(PortDef::new("in", from).with_value(zero(from))));
        lib.structural(&name);
    }

    lib.def(combine("ND_combine2_vector2", "vector2", &["float", "float"]));
    lib.def(combine("ND_combine3_color3", "color3", &["float", "float", "float"]));
    lib.def(combine("ND_combine2_color4CF", "color4", &["color3", "float"]));
    for name in ["ND_combine2_vector2", "ND_combine3_color3", "ND_combine2_color4CF"] {
        lib.structural(name);
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    for type_name in ["float", "color3"] {
        let name = format!("ND_switch_{type_name}");
        let mut def = NodeDef::new(&name, "switch", type_name);
        for i in 1..=5 {
            def = def.with_input(PortDef::new(format!("in{i}"), type_name).with_value(zero(type_name)));
        }
        lib.def(def.with_input(PortDef::new("which", "float").with_value(Value::Float(0.0))));
        lib.structural(&name);

        let name = format!("ND_compare_{type_name}");
        lib.def(
            NodeDef::new(&name, "compare", type_name)
                .with_input(PortDef::new("intest", "float").with_value(Value::Float(0.0)))
                .with_input(PortDef::new("cutoff", "float").with_value(Value::Float(0.0)))
                .with_input(PortDef::new("in1", type_name).with_value(zero(type_name)))
                .with_input(PortDef::new("in2", type_name).with_value(zero(type_name))),
        );
        lib.structural(&name);
    }

    // ========================================================================
    // BSDF / EDF / VDF
    // ========================================================================

    lib.def(
        NodeDef::new("ND_diffuse_bsdf", "diffuse_bsdf", "BSDF")
            .with_bsdf(BsdfScope::R)
            .with_input(PortDef::new("weight", "float").with_value(Value::Float(1.0)))
            .with_input(PortDef::new("color", "color3").with_value(Value::Color3([0.18; 3])))
            .with_input(PortDef::new("roughness", "float").with_value(Value::Float(0.0)))
            .with_input(PortDef::new("normal", "vector3").with_default_geom_prop("Nworld")),
    );
    lib.file("ND_diffuse_bsdf", GENGLSL, "pbrlib/genglsl/mx_diffuse_bsdf.glsl", "mx_diffuse_bsdf");
    lib.inline(
        "ND_diffuse_bsdf",
        GENOSL,
        "{{weight}} * {{color}} * oren_nayar({{normal}}, {{roughness}})",
    );
    lib.file("ND_diffuse_bsdf", GENMDL, MDL_PBRLIB, "mx_diffuse_bsdf");

    lib.def(
        NodeDef::new("ND_dielectric_bsdf", "dielectric_bsdf", "BSDF")
            .with_input(PortDef::new("weight", "float").with_value(Value::Float(1.0)))
            .with_input(PortDef::new("tint", "color3").with_value(Value::Color3([1.0; 3])))
            .with_input(PortDef::new("ior", "float").with_value(Value::Float(1.5)))
            .with_input(PortDef::new("roughness", "vector2").with_value(Value::Vector2([0.05, 0.05])))
            .with_input(PortDef::new("normal", "vector3").with_default_geom_prop("Nworld"))
            .with_input(
                PortDef::new("distribution", "string")
                    .with_enum("ggx")
                    .with_value(Value::String("ggx".into()))
                    .uniform(),
            )
            .with_input(
                PortDef::new("scatter_mode", "string")
                    .with_enum("R,T,RT")
                    .with_value(Value::String("R".into()))
                    .uniform(),
            ),
    );
    lib.file("ND_dielectric_bsdf", GENGLSL, "pbrlib/genglsl/mx_dielectric_bsdf.glsl", "mx_dielectric_bsdf");
    lib.file("ND_dielectric_bsdf", GENOSL, "pbrlib/genosl/mx_dielectric_bsdf.osl", "mx_dielectric_bsdf");
    lib.file("ND_dielectric_bsdf", GENMDL, MDL_PBRLIB, "mx_dielectric_bsdf");

    lib.def(
        NodeDef::new("ND_uniform_edf", "uniform_edf", "EDF")
            .with_input(PortDef::new("color", "color3").with_value(Value::Color3([1.0; 3]))),
    );
    lib.file("ND_uniform_edf", GENGLSL, "pbrlib/genglsl/mx_uniform_edf.glsl", "mx_uniform_edf");
    lib.inline("ND_uniform_edf", GENOSL, "{{color}} * emission()");
    lib.file("ND_uniform_edf", GENMDL, MDL_PBRLIB, "mx_uniform_edf");

    lib.def(
        NodeDef::new("ND_anisotropic_vdf", "anisotropic_vdf", "VDF")
            .with_input(PortDef::new("absorption", "color3").with_value(Value::Color3([0.0; 3])))
            .with_input(PortDef::new("scattering", "color3").with_value(Value::Color3([0.0; 3])))
            .with_input(PortDef::new("anisotropy", "float").with_value(Value::Float(0.0))),
    );
    lib.file("ND_anisotropic_vdf", GENGLSL, "pbrlib/genglsl/mx_anisotropic_vdf.glsl", "mx_anisotropic_vdf");
    lib.inline(
        "ND_anisotropic_vdf",
        GENOSL,
        "anisotropic_vdf({{absorption}}, {{scattering}}, {{anisotropy}})",
    );
    lib.file("ND_anisotropic_vdf", GENMDL, MDL_PBRLIB, "mx_anisotropic_vdf");

    // ========================================================================
    // Closure operators
    // ========================================================================

    lib.def(closure_pair("ND_layer_bsdf", "layer", "top", "base", "BSDF"));
    lib.def(closure_pair("ND_layer_vdf", "layer", "top", "base", "VDF"));
    lib.def(
        closure_pair("ND_mix_bsdf", "mix", "fg", "bg", "BSDF")
            .with_input(PortDef::new("mix", "float").with_value(Value::Float(0.0))),
    );
    lib.def(closure_pair("ND_add_bsdf", "add", "in1", "in2", "BSDF"));
    lib.def(
        NodeDef::new("ND_multiply_bsdfC", "multiply", "BSDF")
            .with_input(PortDef::new("in1", "BSDF"))
            .with_input(PortDef::new("in2", "color3").with_value(Value::Color3([1.0; 3]))),
    );
    lib.def(
        NodeDef::new("ND_multiply_bsdfF", "multiply", "BSDF")
            .with_input(PortDef::new("in1", "BSDF"))
            .with_input(PortDef::new("in2", "float").with_value(Value::Float(1.0))),
    );
    for name in [
        "ND_layer_bsdf",
        "ND_layer_vdf",
        "ND_mix_bsdf",
        "ND_add_bsdf",
        "ND_multiply_bsdfC",
        "ND_multiply_bsdfF",
    ] {
        lib.structural(name);
    }

    // ========================================================================
    // Shaders and materials
    // ========================================================================

    lib.def(
        NodeDef::new("ND_surface", "surface", "surfaceshader")
            .with_input(PortDef::new("bsdf", "BSDF"))
            .with_input(PortDef::new("edf", "EDF"))
            .with_input(PortDef::new("opacity", "float").with_value(Value::Float(1.0))),
    );
    lib.implementation(Implementation::new("IM_surface_genglsl", "ND_surface", GENGLSL));
    lib.inline(
        "ND_surface",
        GENOSL,
        "({{bsdf}} + {{edf}}) * {{opacity}} + transparent() * (1.0 - {{opacity}})",
    );
    lib.file("ND_surface", GENMDL, MDL_PBRLIB, "mx_surface");

    lib.def(
        NodeDef::new("ND_surfacematerial", "surfacematerial", "material")
            .with_input(PortDef::new("surfaceshader", "surfaceshader")),
    );

    lib.def(
        NodeDef::new("ND_point_light", "point_light", "lightshader")
            .with_input(PortDef::new("position", "vector3").with_value(Value::Vector3([0.0; 3])))
            .with_input(PortDef::new("color", "color3").with_value(Value::Color3([1.0; 3])))
            .with_input(PortDef::new("intensity", "float").with_value(Value::Float(1.0)))
            .with_input(PortDef::new("decay_rate", "float").with_value(Value::Float(2.0))),
    );
    lib.implementation(
        Implementation::new("IM_point_light_genglsl", "ND_point_light", GENGLSL)
            .with_file("lights/genglsl/mx_point_light.glsl", "mx_point_light"),
    );

    lib.def(
        NodeDef::new("ND_directional_light", "directional_light", "lightshader")
            .with_input(PortDef::new("direction", "vector3").with_value(Value::Vector3([0.0, -1.0, 0.0])))
            .with_input(PortDef::new("color", "color3").with_value(Value::Color3([1.0; 3])))
            .with_input(PortDef::new("intensity", "float").with_value(Value::Float(1.0))),
    );
    lib.implementation(
        Implementation::new("IM_directional_light_genglsl", "ND_directional_light", GENGLSL)
            .with_file("lights/genglsl/mx_directional_light.glsl", "mx_directional_light"),
    );

    // ========================================================================
    // Compounds
    // ========================================================================

    lib.def(
        NodeDef::new("ND_tiledimage_color3", "tiledimage", "color3")
            .with_group("texture2d")
            .with_input(PortDef::new("file", "filename").with_value(Value::Filename(String::new())).uniform())
            .with_input(PortDef::new("uvtiling", "vector2").with_value(Value::Vector2([1.0, 1.0]))),
    );
    lib.graph(
        NodeGraph::new("NG_tiledimage_color3")
            .with_node_def("ND_tiledimage_color3")
            .with_node(Node::new("texcoord1", "texcoord", "vector2"))
            .with_node(
                Node::new("tiling", "multiply", "vector2")
                    .with_input(NodeInput::connected("in1", "vector2", "texcoord1"))
                    .with_input(NodeInput::interface("in2", "vector2", "uvtiling")),
            )
            .with_node(
                Node::new("sampler", "image", "color3")
                    .with_input(NodeInput::interface("file", "filename", "file"))
                    .with_input(NodeInput::connected("texcoord", "vector2", "tiling")),
            )
            .with_output(Output::new("out", "color3", "sampler")),
    );

    lib.def(
        NodeDef::new("ND_glass_surface", "glass_surface", "surfaceshader")
            .with_input(PortDef::new("color", "color3").with_value(Value::Color3([1.0; 3])))
            .with_input(PortDef::new("ior", "float").with_value(Value::Float(1.5))),
    );
    lib.graph(
        NodeGraph::new("NG_glass_surface")
            .with_node_def("ND_glass_surface")
            .with_node(
                Node::new("glass_bsdf", "dielectric_bsdf", "BSDF")
                    .with_input(NodeInput::interface("tint", "color3", "color"))
                    .with_input(NodeInput::interface("ior", "float", "ior"))
                    .with_input(NodeInput::value("scatter_mode", Value::String("RT".into()))),
            )
            .with_node(
                Node::new("glass_shader", "surface", "surfaceshader")
                    .with_input(NodeInput::connected("bsdf", "BSDF", "glass_bsdf")),
            )
            .with_output(Output::new("out", "surfaceshader", "glass_shader")),
    );

    lib.finish()
}

fn zero(type_name: &str) -> Value {
    match type_name {
        "integer" => Value::Integer(0),
        "color3" => Value::Color3([0.0; 3]),
        "color4" => Value::Color4([0.0; 4]),
        "vector2" => Value::Vector2([0.0; 2]),
        "vector3" => Value::Vector3([0.0; 3]),
        _ => Value::Float(0.0),
    }
}

fn binary(name: &str, node: &str, type_name: &str, in2_type: &str) -> NodeDef {
    NodeDef::new(name, node, type_name)
        .with_input(PortDef::new("in1", type_name).with_value(zero(type_name)))
        .with_input(PortDef::new("in2", in2_type).with_value(zero(in2_type)))
}

fn combine(name: &str, type_name: &str, inputs: &[&str]) -> NodeDef {
    inputs
        .iter()
        .enumerate()
        .fold(NodeDef::new(name, "combine", type_name), |def, (i, input_type)| {
            def.with_input(PortDef::new(format!("in{}", i + 1), *input_type).with_value(zero(input_type)))
        })
}

fn closure_pair(name: &str, node: &str, first: &str, second: &str, second_type: &str) -> NodeDef {
    NodeDef::new(name, node, "BSDF")
        .with_input(PortDef::new(first, "BSDF"))
        .with_input(PortDef::new(second, second_type))
}

fn address_mode(name: &str) -> PortDef {
    PortDef::new(name, "string")
        .with_enum(ADDRESS_MODES)
        .with_value(Value::String("periodic".into()))
        .uniform()
}

/// Accumulates library elements, naming implementations consistently
struct Library {
    doc: Document,
}

impl Library {
    fn new() -> Self {
        Self {
            doc: Document::new("stdlib"),
        }
    }

    fn def(&mut self, def: NodeDef) {
        let result = self.doc.add_node_def(def);
        self.check(result);
    }

    fn geom_prop(&mut self, def: GeomPropDef) {
        let result = self.doc.add_geom_prop_def(def);
        self.check(result);
    }

    fn graph(&mut self, graph: NodeGraph) {
        let result = self.doc.add_node_graph(graph);
        self.check(result);
    }

    fn implementation(&mut self, implementation: Implementation) {
        let result = self.doc.add_implementation(implementation);
        self.check(result);
    }

    fn check(&self, result: Result<(), DocumentError>) {
        if let Err(err) = result {
            tracing::warn!("Standard library: {err}");
        }
    }

    /// Target independent inline implementation
    fn shared_inline(&mut self, node_def: &str, source: &str) {
        let name = implementation_name(node_def, None);
        self.implementation(Implementation::new(name, node_def, "").with_source_code(source));
    }

    fn inline(&mut self, node_def: &str, target: &str, source: &str) {
        let name = implementation_name(node_def, Some(target));
        self.implementation(Implementation::new(name, node_def, target).with_source_code(source));
    }

    fn file(&mut self, node_def: &str, target: &str, file: &str, function: &str) {
        let name = implementation_name(node_def, Some(target));
        self.implementation(Implementation::new(name, node_def, target).with_file(file, function));
    }

    /// Source-less implementation on every target, emitted by the generator itself
    fn structural(&mut self, node_def: &str) {
        for target in TARGETS {
            let name = implementation_name(node_def, Some(target));
            self.implementation(Implementation::new(name, node_def, target));
        }
    }

    fn finish(self) -> Document {
        tracing::debug!(
            "Standard library created with {} node definitions",
            self.doc.node_defs().count()
        );
        self.doc
    }
}

/// `ND_image_color3` on `genglsl` becomes `IM_image_color3_genglsl`
pub fn implementation_name(node_def: &str, target: Option<&str>) -> String {
    let base = node_def.strip_prefix("ND_").unwrap_or(node_def);
    match target {
        Some(target) => format!("IM_{base}_{target}"),
        None => format!("IM_{base}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_definition_has_an_implementation() {
        let lib = create_standard_library();
        for def in lib.node_defs() {
            if def.node == "surfacematerial" {
                continue;
            }
            let lights = def.output_type() == "lightshader";
            for target in TARGETS {
                if lights && target != GENGLSL {
                    continue;
                }
                assert!(
                    lib.implementation_for(&def.name, target).is_some(),
                    "{} has no implementation for {}",
                    def.name,
                    target
                );
            }
        }
    }

    #[test]
    fn test_file_sources_are_embedded() {
        let lib = create_standard_library();
        let embedded: Vec<&str> = sources::library_sources().iter().map(|(path, _)| *path).collect();
        for implementation in lib.implementations() {
            let Some(file) = &implementation.file else { continue };
            if implementation.target == GENMDL {
                continue;
            }
            assert!(embedded.contains(&file.as_str()), "missing source {file}");
        }
    }

    #[test]
    fn test_implementation_name() {
        assert_eq!(implementation_name("ND_image_color3", Some(GENGLSL)), "IM_image_color3_genglsl");
        assert_eq!(implementation_name("ND_add_float", None), "IM_add_float");
    }
}
