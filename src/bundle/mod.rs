//! Effect Bundle
//!
//! The pre-parsed, versioned artifact an [`Effect`](crate::Effect) is built
//! from: an ordered list of techniques, each with ordered passes, plus a
//! global parameter list. Passes carry their stage sources together with the
//! register maps the shader compiler resolved for every uniform name.
//!
//! Bundles are plain serde data. Decoding never touches the device; checks
//! against device limits happen in [`EffectBundle::validate`].

pub mod annotation;
pub mod preshader;
pub mod render_state;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::device::{DeviceFeatures, SamplerDesc};
use crate::errors::{EffectError, Result};
use crate::settings::EffectSettings;

pub use annotation::{AnnotationValue, Annotations};
pub use preshader::Preshader;
pub use render_state::RenderStateTable;

/// Highest bundle format version this runtime reads.
pub const CURRENT_VERSION: u32 = 2;

/// Which shading language the stage sources are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderDialect {
    /// Native WGSL.
    #[default]
    Wgsl,
    /// DirectX 9 bytecode transcoded for the OpenGL compatibility path.
    Dx9Transcoded,
}

// ─── Parameter Types ─────────────────────────────────────────────────────────

/// Declared type of an effect parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterType {
    #[default]
    Unknown,
    Void,
    String,
    Texture,
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    Sampler,
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Bool,
    Bool2,
    Bool3,
    Bool4,
    Int,
    Int2,
    Int3,
    Int4,
    Float,
    Float2,
    Float3,
    Float4,
    Float2x2,
    Float3x3,
    Float4x4,
}

impl ParameterType {
    /// Name used in diagnostics.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Void => "Void",
            Self::String => "String",
            Self::Texture => "Texture",
            Self::Texture1D => "Texture1D",
            Self::Texture2D => "Texture2D",
            Self::Texture3D => "Texture3D",
            Self::TextureCube => "TextureCube",
            Self::Sampler => "Sampler",
            Self::Sampler1D => "Sampler1D",
            Self::Sampler2D => "Sampler2D",
            Self::Sampler3D => "Sampler3D",
            Self::SamplerCube => "SamplerCube",
            Self::Bool => "Bool",
            Self::Bool2 => "Bool2",
            Self::Bool3 => "Bool3",
            Self::Bool4 => "Bool4",
            Self::Int => "Int",
            Self::Int2 => "Int2",
            Self::Int3 => "Int3",
            Self::Int4 => "Int4",
            Self::Float => "Float",
            Self::Float2 => "Float2",
            Self::Float3 => "Float3",
            Self::Float4 => "Float4",
            Self::Float2x2 => "Float2x2",
            Self::Float3x3 => "Float3x3",
            Self::Float4x4 => "Float4x4",
        }
    }

    #[must_use]
    pub fn is_texture(self) -> bool {
        matches!(
            self,
            Self::Texture | Self::Texture1D | Self::Texture2D | Self::Texture3D | Self::TextureCube
        )
    }

    #[must_use]
    pub fn is_sampler(self) -> bool {
        matches!(
            self,
            Self::Sampler | Self::Sampler1D | Self::Sampler2D | Self::Sampler3D | Self::SamplerCube
        )
    }

    #[must_use]
    pub fn is_bool(self) -> bool {
        matches!(self, Self::Bool | Self::Bool2 | Self::Bool3 | Self::Bool4)
    }

    #[must_use]
    pub fn is_int(self) -> bool {
        matches!(self, Self::Int | Self::Int2 | Self::Int3 | Self::Int4)
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float
                | Self::Float2
                | Self::Float3
                | Self::Float4
                | Self::Float2x2
                | Self::Float3x3
                | Self::Float4x4
        )
    }

    /// Number of float4 registers one element of this type occupies.
    #[must_use]
    pub fn register_count(self) -> usize {
        match self {
            Self::Float2x2 => 2,
            Self::Float3x3 => 3,
            Self::Float4x4 => 4,
            _ => 1,
        }
    }
}

/// One global effect parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSource {
    pub name: String,
    /// Semantic tag, empty for free-standing uniforms.
    pub semantic: String,
    #[serde(rename = "type")]
    pub ty: ParameterType,
    /// Default value, flattened scalars.
    pub values: Vec<f32>,
    /// Array element count, zero for non-array parameters.
    pub elements: u32,
    pub annotations: Annotations,
    pub shared: bool,
}

impl ParameterSource {
    #[must_use]
    pub fn has_semantic(&self) -> bool {
        !self.semantic.is_empty()
    }

    /// Registers covered by this parameter, counting array elements.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.ty.register_count() * (self.elements.max(1) as usize)
    }
}

// ─── Techniques & Passes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechniqueSource {
    pub name: String,
    pub annotations: Annotations,
    pub passes: Vec<PassSource>,
}

/// Float4 register window of one uniform inside a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterRange {
    pub index: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    #[default]
    Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AddressMode {
    Wrap,
    Mirror,
    #[default]
    Clamp,
    Border,
}

impl AddressMode {
    fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            Self::Wrap => wgpu::AddressMode::Repeat,
            Self::Mirror => wgpu::AddressMode::MirrorRepeat,
            Self::Clamp => wgpu::AddressMode::ClampToEdge,
            Self::Border => wgpu::AddressMode::ClampToBorder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureFilter {
    None,
    Point,
    #[default]
    Linear,
}

/// Sampler register of a pass, naming the texture parameter it reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSource {
    /// Sampler parameter name.
    pub name: String,
    /// Texture parameter bound to the sampler.
    pub texture: String,
    pub stage: ShaderStage,
    pub slot: u32,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub mip_filter: TextureFilter,
}

impl SamplerSource {
    #[must_use]
    pub fn sampler_desc(&self) -> SamplerDesc {
        let filter = |filter: TextureFilter| match filter {
            TextureFilter::Linear => wgpu::FilterMode::Linear,
            TextureFilter::None | TextureFilter::Point => wgpu::FilterMode::Nearest,
        };
        SamplerDesc {
            address_u: self.address_u.to_wgpu(),
            address_v: self.address_v.to_wgpu(),
            address_w: self.address_w.to_wgpu(),
            mag_filter: filter(self.mag_filter),
            min_filter: filter(self.min_filter),
            mipmap_filter: match self.mip_filter {
                TextureFilter::Linear => wgpu::MipmapFilterMode::Linear,
                TextureFilter::None | TextureFilter::Point => wgpu::MipmapFilterMode::Nearest,
            },
        }
    }
}

/// Register map of one stage, keyed by uniform name.
pub type RegisterMap = FxHashMap<String, RegisterRange>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSource {
    pub name: String,
    pub annotations: Annotations,
    pub render_state: RenderStateTable,

    pub vertex_source: String,
    pub vertex_entry: String,
    pub pixel_source: String,
    pub pixel_entry: String,
    pub vertex_attributes: Vec<wgpu::VertexFormat>,

    pub vertex_registers: RegisterMap,
    pub pixel_registers: RegisterMap,
    pub vertex_preshader_registers: RegisterMap,
    pub pixel_preshader_registers: RegisterMap,
    /// Float4 registers in the vertex uniform block.
    pub vertex_uniform_count: u32,
    /// Float4 registers in the pixel uniform block.
    pub pixel_uniform_count: u32,

    pub samplers: Vec<SamplerSource>,
    pub vertex_preshader: Option<Preshader>,
    pub pixel_preshader: Option<Preshader>,
}

impl PassSource {
    /// Sampled image slots used by `stage`.
    #[must_use]
    pub fn image_count(&self, stage: ShaderStage) -> u32 {
        self.samplers
            .iter()
            .filter(|sampler| sampler.stage == stage)
            .map(|sampler| sampler.slot + 1)
            .max()
            .unwrap_or(0)
    }

    /// Float4 count of a preshader input file.
    #[must_use]
    pub fn preshader_register_count(map: &RegisterMap) -> u32 {
        map.values()
            .map(|range| range.index + range.count)
            .max()
            .unwrap_or(0)
    }
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectBundle {
    pub version: u32,
    pub dialect: ShaderDialect,
    /// Matrices were authored with the older register convention, which
    /// flips the default transpose of every matrix semantic.
    pub legacy_matrix_convention: bool,
    pub parameters: Vec<ParameterSource>,
    pub techniques: Vec<TechniqueSource>,
}

impl EffectBundle {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn find_parameter(&self, name: &str) -> Option<&ParameterSource> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    /// Checks the bundle against the runtime and the active device before
    /// any device object is created.
    pub fn validate(&self, settings: &EffectSettings, features: &DeviceFeatures) -> Result<()> {
        if self.version > CURRENT_VERSION {
            return Err(EffectError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_VERSION,
            });
        }
        if self.dialect == ShaderDialect::Dx9Transcoded && !features.gl_compatibility {
            return Err(EffectError::BackendIncompatible {
                expected: "OpenGL compatibility".to_string(),
                actual: features.backend_name.clone(),
            });
        }

        let sampler_limit = settings
            .max_samplers_per_stage
            .min(features.max_samplers_per_stage);
        for technique in &self.techniques {
            for pass in &technique.passes {
                for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
                    let count = pass.image_count(stage);
                    if count > sampler_limit {
                        return Err(EffectError::ExceedsLimits {
                            what: format!(
                                "Samplers of {:?} stage in \"{}/{}\"",
                                stage, technique.name, pass.name
                            ),
                            actual: count,
                            limit: sampler_limit,
                            hint: "Reduce the number of textures sampled by the pass.".to_string(),
                        });
                    }
                }
                self.validate_pass(technique, pass)?;
            }
        }

        let dimension_limit = settings
            .max_image_dimension
            .min(features.max_image_dimension);
        for parameter in &self.parameters {
            let annotations = &parameter.annotations;
            let mut requested = [
                annotations.int("width").unwrap_or(0),
                annotations.int("height").unwrap_or(0),
            ];
            if let Some(dimensions) = annotations.vec4("dimensions") {
                requested[0] = requested[0].max(dimensions.x as i32);
                requested[1] = requested[1].max(dimensions.y as i32);
            }
            let largest = requested.into_iter().max().unwrap_or(0).max(0) as u32;
            if largest > dimension_limit {
                return Err(EffectError::ExceedsLimits {
                    what: format!("Image size of \"{}\"", parameter.name),
                    actual: largest,
                    limit: dimension_limit,
                    hint: "Use a smaller Width/Height annotation or ViewportRatio instead."
                        .to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_pass(&self, technique: &TechniqueSource, pass: &PassSource) -> Result<()> {
        let check = |map: &RegisterMap, capacity: u32, stage: &str| -> Result<()> {
            for (name, range) in map {
                if range.index + range.count > capacity {
                    return Err(EffectError::InvalidBundle(format!(
                        "{stage} register of \"{name}\" in \"{}/{}\" is out of range ({} + {} > {capacity})",
                        technique.name, pass.name, range.index, range.count
                    )));
                }
            }
            Ok(())
        };
        check(&pass.vertex_registers, pass.vertex_uniform_count, "Vertex")?;
        check(&pass.pixel_registers, pass.pixel_uniform_count, "Pixel")?;

        for sampler in &pass.samplers {
            let texture = self.find_parameter(&sampler.texture);
            if !texture.is_some_and(|parameter| parameter.ty.is_texture()) {
                return Err(EffectError::InvalidBundle(format!(
                    "Sampler \"{}\" in \"{}/{}\" refers to unknown texture \"{}\"",
                    sampler.name, technique.name, pass.name, sampler.texture
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_with_parameter(json: &str) -> EffectBundle {
        EffectBundle::from_json(&format!(
            r#"{{ "version": 2, "parameters": [{json}], "techniques": [] }}"#
        ))
        .unwrap()
    }

    #[test]
    fn oversized_image_is_rejected_with_hint() {
        let bundle = bundle_with_parameter(
            r#"{ "name": "Big", "semantic": "RENDERCOLORTARGET", "type": "Texture2D",
                 "annotations": { "Width": 32768, "Height": 16 } }"#,
        );
        let error = bundle
            .validate(&EffectSettings::default(), &DeviceFeatures::default())
            .unwrap_err();
        match error {
            EffectError::ExceedsLimits {
                actual, limit, hint, ..
            } => {
                assert_eq!(actual, 32768);
                assert_eq!(limit, 16384);
                assert!(hint.contains("ViewportRatio"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn transcoded_bundle_requires_gl_compatibility() {
        let bundle = EffectBundle {
            version: CURRENT_VERSION,
            dialect: ShaderDialect::Dx9Transcoded,
            ..Default::default()
        };
        let features = DeviceFeatures {
            backend_name: "Vulkan".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            bundle.validate(&EffectSettings::default(), &features),
            Err(EffectError::BackendIncompatible { .. })
        ));
        let features = DeviceFeatures {
            gl_compatibility: true,
            ..features
        };
        assert!(bundle.validate(&EffectSettings::default(), &features).is_ok());
    }

    #[test]
    fn newer_version_is_unsupported() {
        let bundle = EffectBundle {
            version: CURRENT_VERSION + 1,
            ..Default::default()
        };
        assert!(matches!(
            bundle.validate(&EffectSettings::default(), &DeviceFeatures::default()),
            Err(EffectError::UnsupportedVersion { .. })
        ));
    }
}
