use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::device::ImageHandle;

/// How the sphere map image is combined with the diffuse color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SphereMapMode {
    #[default]
    None,
    Multiply,
    Add,
    /// The sphere map slot holds an additional UV texture.
    SubTexture,
}

bitflags! {
    /// Per-material draw flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        const CULLING_DISABLED = 1 << 0;
        const EDGE_ENABLED     = 1 << 1;
        const POINT_DRAW       = 1 << 2;
        const LINE_DRAW        = 1 << 3;
        const CASTING_SHADOW   = 1 << 4;
        const SELF_SHADOW      = 1 << 5;
    }
}

/// Material parameter block supplied by the owning drawable.
///
/// Colors are final values: accessory hosts pre-scale their diffuse and
/// emissive colors before handing the block over.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub visible: bool,
    pub diffuse: Vec3,
    pub opacity: f32,
    pub ambient: Vec3,
    pub specular: Vec3,
    pub specular_power: f32,
    pub emissive: Vec4,
    pub edge_color: Vec3,
    pub edge_opacity: f32,
    pub toon_color: Vec4,
    pub diffuse_image: Option<ImageHandle>,
    pub sphere_map_image: Option<ImageHandle>,
    pub toon_image: Option<ImageHandle>,
    pub sphere_map_mode: SphereMapMode,
    pub flags: MaterialFlags,
    pub texture_add: Vec4,
    pub texture_mul: Vec4,
    pub sphere_add: Vec4,
    pub sphere_mul: Vec4,
    pub index_count: u32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            visible: true,
            diffuse: Vec3::ONE,
            opacity: 1.0,
            ambient: Vec3::splat(0.5),
            specular: Vec3::ZERO,
            specular_power: 5.0,
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            edge_color: Vec3::ZERO,
            edge_opacity: 1.0,
            toon_color: Vec4::ONE,
            diffuse_image: None,
            sphere_map_image: None,
            toon_image: None,
            sphere_map_mode: SphereMapMode::None,
            flags: MaterialFlags::empty(),
            texture_add: Vec4::ZERO,
            texture_mul: Vec4::ONE,
            sphere_add: Vec4::ZERO,
            sphere_mul: Vec4::ONE,
            index_count: 0,
        }
    }
}

impl Material {
    #[inline]
    #[must_use]
    pub fn has_diffuse_image(&self) -> bool {
        self.diffuse_image.is_some()
    }

    /// A sphere map image that is blended as a sphere map.
    #[must_use]
    pub fn has_sphere_map(&self) -> bool {
        self.sphere_map_image.is_some()
            && matches!(self.sphere_map_mode, SphereMapMode::Multiply | SphereMapMode::Add)
    }

    #[must_use]
    pub fn has_sub_texture(&self) -> bool {
        self.sphere_map_image.is_some() && self.sphere_map_mode == SphereMapMode::SubTexture
    }
}
