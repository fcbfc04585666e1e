// SPDX-License-Identifier: MIT OR Apache-2.0
//! Material document model for `OrdoPlay` `MaterialX`.
//!
//! This crate describes the input side of shader generation:
//! - Node definitions with typed ports
//! - Implementations binding a definition to a target
//! - Node graphs, nodes and outputs
//! - A standard library of definitions for the GLSL, OSL and MDL targets
//!
//! ## Architecture
//!
//! The document is a plain data container:
//! - Elements are stored in insertion order and looked up by name
//! - Persistence uses RON through `serde`
//! - Libraries are merged into material documents before generation

pub mod value;
pub mod element;
pub mod document;
pub mod stdlib;

pub use value::{format_float, Value, ValueError};
pub use element::{
    BsdfScope, GeomPropDef, Implementation, Node, NodeDef, NodeGraph, NodeInput, Output, PortDef,
    DEFAULT_OUTPUT,
};
pub use document::{Document, DocumentError, ElementRef, ImplementationRef, Scope};
pub use stdlib::create_standard_library;
