// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generation options.
//!
//! Options are plain data owned by a [`crate::GenContext`]. They can be
//! stored next to a project as a RON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which inputs become public uniforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShaderInterfaceType {
    /// Every unconnected editable node input is published
    #[default]
    Complete,
    /// Only the graph interface is published, other values are inlined
    Reduced,
}

/// Indirect specular lighting method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpecularEnvironmentMethod {
    /// No indirect specular lighting
    None,
    /// Filtered importance sampling
    #[default]
    Fis,
    /// Prefiltered environment maps
    Prefilter,
}

impl SpecularEnvironmentMethod {
    /// Library file providing the environment functions
    pub fn library_file(self) -> &'static str {
        match self {
            Self::None => "pbrlib/genglsl/lib/mx_environment_none.glsl",
            Self::Fis => "pbrlib/genglsl/lib/mx_environment_fis.glsl",
            Self::Prefilter => "pbrlib/genglsl/lib/mx_environment_prefilter.glsl",
        }
    }
}

/// Directional albedo evaluation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DirectionalAlbedoMethod {
    /// Analytic approximation
    #[default]
    Analytic,
    /// Precomputed lookup table
    Table,
    /// Monte Carlo integration
    MonteCarlo,
}

impl DirectionalAlbedoMethod {
    /// Value of the `DIRECTIONAL_ALBEDO_METHOD` define
    pub fn define_value(self) -> u32 {
        match self {
            Self::Analytic => 0,
            Self::Table => 1,
            Self::MonteCarlo => 2,
        }
    }
}

/// MDL language version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum MdlVersion {
    /// MDL 1.6
    V1_6,
    /// MDL 1.7
    V1_7,
    /// MDL 1.8
    V1_8,
    /// MDL 1.9
    V1_9,
    /// MDL 1.10
    #[default]
    V1_10,
}

impl MdlVersion {
    /// Version number as written in the `mdl` header
    pub fn number(self) -> &'static str {
        match self {
            Self::V1_6 => "1.6",
            Self::V1_7 => "1.7",
            Self::V1_8 => "1.8",
            Self::V1_9 => "1.9",
            Self::V1_10 => "1.10",
        }
    }

    /// Suffix of versioned library modules
    pub fn module_suffix(self) -> &'static str {
        match self {
            Self::V1_6 => "1_6",
            Self::V1_7 => "1_7",
            Self::V1_8 => "1_8",
            Self::V1_9 => "1_9",
            Self::V1_10 => "1_10",
        }
    }

    /// Transmission IOR must be uniform before MDL 1.9
    pub fn requires_uniform_ior(self) -> bool {
        self < Self::V1_9
    }
}

/// Linear distance units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    /// Millimeter
    Millimeter,
    /// Centimeter
    Centimeter,
    /// Meter
    Meter,
    /// Kilometer
    Kilometer,
    /// Inch
    Inch,
    /// Foot
    Foot,
    /// Yard
    Yard,
    /// Mile
    Mile,
}

impl DistanceUnit {
    /// Parse a unit name such as `centimeter`
    pub fn from_name(name: &str) -> Option<Self> {
        let unit = match name {
            "millimeter" => Self::Millimeter,
            "centimeter" => Self::Centimeter,
            "meter" => Self::Meter,
            "kilometer" => Self::Kilometer,
            "inch" => Self::Inch,
            "foot" => Self::Foot,
            "yard" => Self::Yard,
            "mile" => Self::Mile,
            _ => return None,
        };
        Some(unit)
    }

    /// Length of one unit in meters
    pub fn meters(self) -> f32 {
        match self {
            Self::Millimeter => 0.001,
            Self::Centimeter => 0.01,
            Self::Meter => 1.0,
            Self::Kilometer => 1000.0,
            Self::Inch => 0.0254,
            Self::Foot => 0.3048,
            Self::Yard => 0.9144,
            Self::Mile => 1609.344,
        }
    }

    /// Factor converting a value in `self` into `target`
    pub fn conversion_to(self, target: DistanceUnit) -> f32 {
        self.meters() / target.meters()
    }
}

/// Options steering shader generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenOptions {
    /// Which inputs become public uniforms
    pub shader_interface: ShaderInterfaceType,
    /// Compute alpha from surface transparency
    pub hw_transparency: bool,
    /// Sample a shadow map for the first light
    pub hw_shadow_map: bool,
    /// Sample an ambient occlusion map
    pub hw_ambient_occlusion: bool,
    /// Size of the light data array
    pub hw_max_active_light_sources: u32,
    /// Indirect specular method
    pub hw_specular_environment_method: SpecularEnvironmentMethod,
    /// Directional albedo method
    pub hw_directional_albedo_method: DirectionalAlbedoMethod,
    /// Color space that color values should be converted to
    pub target_color_space_override: Option<String>,
    /// Unit that distance values should be converted to
    pub target_distance_unit: Option<DistanceUnit>,
    /// Flip the v coordinate of file texture lookups
    pub file_texture_vertical_flip: bool,
    /// Normalize UDIM texture coordinates into the unit square
    pub hw_normalize_udim_tex_coords: bool,
    /// MDL language version
    pub mdl_version: MdlVersion,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            shader_interface: ShaderInterfaceType::Complete,
            hw_transparency: false,
            hw_shadow_map: false,
            hw_ambient_occlusion: false,
            hw_max_active_light_sources: 3,
            hw_specular_environment_method: SpecularEnvironmentMethod::Fis,
            hw_directional_albedo_method: DirectionalAlbedoMethod::Analytic,
            target_color_space_override: None,
            target_distance_unit: None,
            file_texture_vertical_flip: false,
            hw_normalize_udim_tex_coords: false,
            mdl_version: MdlVersion::V1_10,
        }
    }
}

impl GenOptions {
    /// Load options from a RON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        ron::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save options to a RON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let contents = ron::ser::to_string_pretty(self, config)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved generation options to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = GenOptions::default();
        assert_eq!(options.hw_max_active_light_sources, 3);
        assert_eq!(options.shader_interface, ShaderInterfaceType::Complete);
        assert!(!options.hw_transparency);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let options: GenOptions = ron::from_str("(hw_transparency: true, mdl_version: V1_7)").unwrap();
        assert!(options.hw_transparency);
        assert_eq!(options.mdl_version, MdlVersion::V1_7);
        assert_eq!(options.hw_max_active_light_sources, 3);
    }

    #[test]
    fn test_mdl_versions() {
        assert!(MdlVersion::V1_8.requires_uniform_ior());
        assert!(!MdlVersion::V1_9.requires_uniform_ior());
        assert_eq!(MdlVersion::V1_10.module_suffix(), "1_10");
    }

    #[test]
    fn test_distance_conversion() {
        let factor = DistanceUnit::Centimeter.conversion_to(DistanceUnit::Meter);
        assert!((factor - 0.01).abs() < 1e-6);
        assert_eq!(DistanceUnit::from_name("inch"), Some(DistanceUnit::Inch));
    }
}
