// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shader nodes and their ports.

use super::NodeHandle;
use crate::context::ImplId;
use crate::error::{Result, SyntaxRegistryError};
use crate::syntax::Syntax;
use crate::types::TypeDesc;
use bitflags::bitflags;
use ordoplay_materialx_document::{BsdfScope, NodeDef, PortDef, Value};

bitflags! {
    /// What a node computes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Classification: u32 {
        /// Plain data
        const TEXTURE = 1 << 0;
        /// BSDF, EDF, VDF or shader
        const CLOSURE = 1 << 1;
        /// Shader root
        const SHADER = 1 << 2;
        /// Material root
        const MATERIAL = 1 << 3;
        /// Reads a file texture
        const FILETEXTURE = 1 << 4;
        /// Branching node
        const CONDITIONAL = 1 << 5;
        /// Constant value node
        const CONSTANT = 1 << 6;
        /// BSDF closure
        const BSDF = 1 << 7;
        /// BSDF scattering into the reflection hemisphere only
        const BSDF_R = 1 << 8;
        /// BSDF scattering into the transmission hemisphere only
        const BSDF_T = 1 << 9;
        /// Emission closure
        const EDF = 1 << 10;
        /// Volume closure
        const VDF = 1 << 11;
        /// Closure layering operator
        const LAYER = 1 << 12;
        /// Surface shader
        const SURFACE = 1 << 13;
        /// Volume shader
        const VOLUME = 1 << 14;
        /// Light shader
        const LIGHT = 1 << 15;
        /// Samples a 2D texture
        const SAMPLE2D = 1 << 16;
        /// Samples a 3D texture
        const SAMPLE3D = 1 << 17;
        /// 2D convolution
        const CONVOLUTION2D = 1 << 18;
        /// Compare style two way branch
        const IFELSE = 1 << 19;
        /// Multi way branch
        const SWITCH = 1 << 20;
        /// Geometric data lookup
        const GEOMETRIC = 1 << 21;
    }
}

impl Classification {
    /// Classify a node instance of a definition
    pub fn from_node_def(def: &NodeDef) -> Self {
        let mut class = match TypeDesc::from_name(def.output_type()) {
            Some(TypeDesc::Bsdf) => Self::CLOSURE | Self::BSDF,
            Some(TypeDesc::Edf) => Self::CLOSURE | Self::EDF,
            Some(TypeDesc::Vdf) => Self::CLOSURE | Self::VDF,
            Some(TypeDesc::SurfaceShader) => Self::SHADER | Self::SURFACE | Self::CLOSURE,
            Some(TypeDesc::VolumeShader) => Self::SHADER | Self::VOLUME | Self::CLOSURE,
            Some(TypeDesc::LightShader) => Self::SHADER | Self::LIGHT,
            Some(TypeDesc::Material) => Self::MATERIAL,
            _ => Self::TEXTURE,
        };
        match def.bsdf {
            Some(BsdfScope::R) => class |= Self::BSDF_R,
            Some(BsdfScope::T) => class |= Self::BSDF_T,
            None => {}
        }
        match def.node.as_str() {
            "constant" => class |= Self::CONSTANT,
            "compare" | "ifgreater" => class |= Self::CONDITIONAL | Self::IFELSE,
            "switch" => class |= Self::CONDITIONAL | Self::SWITCH,
            "layer" if class.contains(Self::CLOSURE) => class |= Self::LAYER,
            _ => {}
        }
        match def.node_group.as_deref() {
            Some("texture2d") => class |= Self::SAMPLE2D,
            Some("texture3d") => class |= Self::SAMPLE3D,
            Some("convolution2d") => class |= Self::CONVOLUTION2D,
            Some("geometric") => class |= Self::GEOMETRIC,
            _ => {}
        }
        if def.inputs.iter().any(|i| i.type_name == "filename") {
            class |= Self::FILETEXTURE;
        }
        class
    }
}

bitflags! {
    /// Per port state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PortFlags: u32 {
        /// Value can not vary across a surface
        const UNIFORM = 1 << 0;
        /// Exposed as a public uniform
        const PUBLISHED = 1 << 1;
        /// Added by the implementation, not by the definition
        const HIDDEN = 1 << 2;
        /// Feeds the IOR of a transmissive BSDF
        const TRANSMISSION_IOR_DEPENDENCY = 1 << 3;
    }
}

/// Data shared by every port
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPort {
    /// Type, after enumeration remapping
    pub ty: TypeDesc,
    /// Port name
    pub name: String,
    /// Variable name, assigned when the graph is finalized
    pub variable: String,
    /// Literal value
    pub value: Option<Value>,
    /// Document path of the element the value came from
    pub path: String,
    /// Enumeration names of string ports
    pub enum_names: Option<String>,
    /// Geometric property used when left unconnected
    pub geom_prop: Option<String>,
    /// Physical unit category of the value
    pub unit_type: Option<String>,
    /// State flags
    pub flags: PortFlags,
}

impl ShaderPort {
    /// Create a port
    pub fn new(name: impl Into<String>, ty: TypeDesc) -> Self {
        Self {
            ty,
            name: name.into(),
            variable: String::new(),
            value: None,
            path: String::new(),
            enum_names: None,
            geom_prop: None,
            unit_type: None,
            flags: PortFlags::empty(),
        }
    }

    /// Create a port from a definition port, remapping enumerations for `syntax`
    pub fn from_port_def(def: &PortDef, syntax: &Syntax) -> Result<Self> {
        let declared = TypeDesc::from_name(&def.type_name).ok_or_else(|| SyntaxRegistryError::UnknownType {
            type_name: def.type_name.clone(),
            element: def.name.clone(),
        })?;
        let (ty, value) = match syntax.remap_enumeration(&def.name, declared, def.value.as_ref(), def.enum_names.as_deref())? {
            Some(remapped) => remapped,
            None => (declared, def.value.clone()),
        };
        let mut port = Self::new(&def.name, ty);
        port.value = value;
        port.enum_names = def.enum_names.clone();
        port.geom_prop = def.default_geom_prop.clone();
        port.unit_type = def.unit_type.clone();
        if def.uniform {
            port.flags |= PortFlags::UNIFORM;
        }
        Ok(port)
    }

    /// Assign a document value, remapping enumerations for `syntax`
    pub fn set_value(&mut self, value: Value, syntax: &Syntax) -> Result<()> {
        let remapped = match (&value, self.enum_names.as_deref()) {
            (Value::String(_), Some(names)) => {
                syntax.remap_enumeration(&self.name, TypeDesc::String, Some(&value), Some(names))?
            }
            _ => None,
        };
        self.value = Some(match remapped {
            Some((_, Some(v))) => v,
            _ => value,
        });
        Ok(())
    }

    /// Whether the port has a flag
    pub fn has_flag(&self, flag: PortFlags) -> bool {
        self.flags.contains(flag)
    }
}

/// Where an input gets its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Upstream {
    /// Output of a node in the same graph
    Node {
        /// Upstream node
        node: NodeHandle,
        /// Output index
        output: usize,
    },
    /// Graph input socket
    Socket(usize),
}

/// Where an output delivers its value to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Downstream {
    /// Input of a node in the same graph
    Node {
        /// Downstream node
        node: NodeHandle,
        /// Input index
        input: usize,
    },
    /// Graph output socket
    Socket(usize),
}

/// A node input, or a graph output socket
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderInput {
    /// Port data
    pub port: ShaderPort,
    /// Connected upstream output
    pub connection: Option<Upstream>,
}

impl ShaderInput {
    /// Create an unconnected input
    pub fn new(port: ShaderPort) -> Self {
        Self { port, connection: None }
    }
}

/// A node output, or a graph input socket
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderOutput {
    /// Port data
    pub port: ShaderPort,
    /// Connected downstream inputs
    pub connections: Vec<Downstream>,
}

impl ShaderOutput {
    /// Create an unconnected output
    pub fn new(port: ShaderPort) -> Self {
        Self {
            port,
            connections: Vec::new(),
        }
    }
}

/// An instantiated operation in a shader graph
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderNode {
    /// Node name, unique in its graph
    pub name: String,
    /// Definition name
    pub node_def: String,
    /// Classification
    pub classification: Classification,
    /// Resolved implementation
    pub implementation: Option<ImplId>,
    /// Inputs, definition order followed by hidden inputs
    pub inputs: Vec<ShaderInput>,
    /// Outputs
    pub outputs: Vec<ShaderOutput>,
}

impl ShaderNode {
    /// Create a node without ports
    pub fn new(name: impl Into<String>, node_def: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_def: node_def.into(),
            classification: Classification::TEXTURE,
            implementation: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Create a node instance of a definition
    pub fn from_node_def(name: impl Into<String>, def: &NodeDef, syntax: &Syntax) -> Result<Self> {
        let mut node = Self::new(name, &def.name);
        node.classification = Classification::from_node_def(def);
        for input in &def.inputs {
            node.inputs.push(ShaderInput::new(ShaderPort::from_port_def(input, syntax)?));
        }
        for output in &def.outputs {
            let ty = TypeDesc::from_name(&output.type_name).ok_or_else(|| SyntaxRegistryError::UnknownType {
                type_name: output.type_name.clone(),
                element: output.name.clone(),
            })?;
            node.outputs.push(ShaderOutput::new(ShaderPort::new(&output.name, ty)));
        }
        Ok(node)
    }

    /// Set the implementation
    pub fn with_implementation(mut self, implementation: ImplId) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Append an input
    pub fn add_input(&mut self, name: impl Into<String>, ty: TypeDesc) -> &mut ShaderInput {
        self.inputs.push(ShaderInput::new(ShaderPort::new(name, ty)));
        let last = self.inputs.len() - 1;
        &mut self.inputs[last]
    }

    /// Append an output
    pub fn add_output(&mut self, name: impl Into<String>, ty: TypeDesc) -> &mut ShaderOutput {
        self.outputs.push(ShaderOutput::new(ShaderPort::new(name, ty)));
        let last = self.outputs.len() - 1;
        &mut self.outputs[last]
    }

    /// Index of an input by name
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.port.name == name)
    }

    /// Input by name
    pub fn input(&self, name: &str) -> Option<&ShaderInput> {
        self.inputs.iter().find(|i| i.port.name == name)
    }

    /// Input by name
    pub fn input_mut(&mut self, name: &str) -> Option<&mut ShaderInput> {
        self.inputs.iter_mut().find(|i| i.port.name == name)
    }

    /// Index of an output by name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.port.name == name)
    }

    /// Whether the node has every bit of `class`
    pub fn has_classification(&self, class: Classification) -> bool {
        self.classification.contains(class)
    }

    /// Type of the first output
    pub fn output_type(&self) -> Option<TypeDesc> {
        self.outputs.first().map(|o| o.port.ty)
    }
}
