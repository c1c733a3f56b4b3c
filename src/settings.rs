//! Effect Runtime Settings
//!
//! [`EffectSettings`] collects the knobs that the host passes when an effect
//! is created. They are fixed for the lifetime of the effect, with the single
//! exception of pass uniform inspection which tooling toggles at runtime.
//!
//! ```rust,ignore
//! use myth_fx::EffectSettings;
//!
//! let settings = EffectSettings {
//!     pass_uniform_inspection: true,
//!     ..Default::default()
//! };
//! ```

/// Configuration shared by every effect created by a host.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSettings {
    /// Upper bound for mip chains of render target containers.
    pub max_mipmaps: u32,
    /// Largest width/height accepted for any image declared by a bundle.
    pub max_image_dimension: u32,
    /// Largest number of sampled images per shader stage.
    pub max_samplers_per_stage: u32,
    /// Attach `Effects/...` labels to created device objects.
    pub debug_labels: bool,
    /// Keep a copy of every uniform written per pass for inspection.
    pub pass_uniform_inspection: bool,
    /// Color format used when a render target declares none.
    pub default_color_format: wgpu::TextureFormat,
    /// Depth format used when a depth-stencil target declares none.
    pub default_depth_format: wgpu::TextureFormat,
    /// Frames per second used to turn frame indices into seconds.
    pub base_fps: f32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            max_mipmaps: 16,
            max_image_dimension: 16384,
            max_samplers_per_stage: 16,
            debug_labels: true,
            pass_uniform_inspection: false,
            default_color_format: wgpu::TextureFormat::Rgba8Unorm,
            default_depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            base_fps: 30.0,
        }
    }
}

impl EffectSettings {
    /// Builds an `Effects/<effect>/<rest>` label when labels are enabled.
    #[must_use]
    pub fn label(&self, effect: &str, rest: &str) -> String {
        if self.debug_labels {
            format!("Effects/{effect}/{rest}")
        } else {
            String::new()
        }
    }
}
