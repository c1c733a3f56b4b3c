//! Scene Interfaces
//!
//! Everything the effect runtime reads from the host application: camera,
//! light and shadow camera state, drawables with their materials, per-frame
//! project state, and the image resource callback used at upload time.
//! The runtime never owns or mutates any of these.

mod camera;
mod drawable;
mod frame;
mod material;

pub use camera::{Camera, Light, ShadowCamera};
pub use drawable::{DrawType, Drawable, DrawableId, DrawableKind, DrawableState};
pub use frame::{FrameContext, MouseButtonState, OffscreenPass, TargetImages};
pub use material::{Material, MaterialFlags, SphereMapMode};

/// Scene wide lookups.
pub trait SceneLookup {
    fn camera(&self) -> &Camera;
    fn light(&self) -> &Light;
    fn shadow_camera(&self) -> &ShadowCamera;
    fn drawable(&self, id: DrawableId) -> Option<&dyn Drawable>;
    /// Finds a drawable by file name, preferring `kind` when both a model
    /// and an accessory match.
    fn find_drawable(&self, file_name: &str, kind: DrawableKind) -> Option<&dyn Drawable>;
}

/// Owned scene snapshot implementing [`SceneLookup`].
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub camera: Camera,
    pub light: Light,
    pub shadow_camera: ShadowCamera,
    pub drawables: Vec<DrawableState>,
}

impl SceneLookup for SceneSnapshot {
    fn camera(&self) -> &Camera {
        &self.camera
    }

    fn light(&self) -> &Light {
        &self.light
    }

    fn shadow_camera(&self) -> &ShadowCamera {
        &self.shadow_camera
    }

    fn drawable(&self, id: DrawableId) -> Option<&dyn Drawable> {
        self.drawables
            .iter()
            .find(|drawable| drawable.id == id)
            .map(|drawable| drawable as &dyn Drawable)
    }

    fn find_drawable(&self, file_name: &str, kind: DrawableKind) -> Option<&dyn Drawable> {
        let matches = |drawable: &&DrawableState| drawable.file_name.eq_ignore_ascii_case(file_name);
        self.drawables
            .iter()
            .filter(matches)
            .find(|drawable| drawable.kind == kind)
            .or_else(|| self.drawables.iter().find(matches))
            .map(|drawable| drawable as &dyn Drawable)
    }
}

// ─── Image Resources ─────────────────────────────────────────────────────────

/// Decoded texels handed over by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub data: Vec<u8>,
}

impl DecodedImage {
    /// Texel values as normalized float4, for 8-bit RGBA and float RGBA data.
    #[must_use]
    pub fn texels(&self) -> Vec<glam::Vec4> {
        match self.format {
            wgpu::TextureFormat::Rgba32Float => self
                .data
                .chunks_exact(16)
                .map(|texel| {
                    let component = |i: usize| {
                        f32::from_le_bytes([texel[i], texel[i + 1], texel[i + 2], texel[i + 3]])
                    };
                    glam::Vec4::new(component(0), component(4), component(8), component(12))
                })
                .collect(),
            _ => self
                .data
                .chunks_exact(4)
                .map(|texel| {
                    glam::Vec4::new(
                        f32::from(texel[0]),
                        f32::from(texel[1]),
                        f32::from(texel[2]),
                        f32::from(texel[3]),
                    ) / 255.0
                })
                .collect(),
        }
    }
}

/// Resolves image files referenced by effect parameters.
///
/// Called synchronously during upload. `is_cancelled` is polled between
/// fetches; returning `true` aborts the remaining loads.
pub trait ImageResourceProvider {
    fn load_image(&mut self, resource_name: &str) -> Option<DecodedImage>;

    /// Frame of an animated image at `seconds`.
    fn seek_animated_image(&mut self, _resource_name: &str, _seconds: f32) -> Option<DecodedImage> {
        None
    }

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Provider that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageResources;

impl ImageResourceProvider for NoImageResources {
    fn load_image(&mut self, _resource_name: &str) -> Option<DecodedImage> {
        None
    }
}
