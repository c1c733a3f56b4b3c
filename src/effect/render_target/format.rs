//! Format names, image sizing and mip level rules for declared images.

use glam::{UVec2, UVec3, Vec2};

use crate::bundle::Annotations;

/// Largest width/height any declared image resolves to.
pub const MAX_EXTENT: u32 = 65535;
/// Largest depth of a volume image.
pub const MAX_DEPTH: u32 = 255;

/// Maps a declared format name (`A8R8G8B8`, `FMT_R32F`, `D3DFMT_D24S8`...)
/// to a device format.
#[must_use]
pub fn parse_format(name: &str) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat as F;
    let upper = name.trim().to_ascii_uppercase();
    let key = upper
        .strip_prefix("D3DFMT_")
        .or_else(|| upper.strip_prefix("FMT_"))
        .unwrap_or(&upper);
    Some(match key {
        "DXT1" => F::Bc1RgbaUnorm,
        "DXT3" => F::Bc2RgbaUnorm,
        "DXT5" => F::Bc3RgbaUnorm,
        "A1" | "A8" | "L8" => F::R8Unorm,
        "L16" | "R16F" => F::R16Float,
        "R32F" => F::R32Float,
        "A8L8" => F::Rg8Unorm,
        "G16R16" | "G16R16F" => F::Rg16Float,
        "G32R32F" => F::Rg32Float,
        "X8R8G8B8" | "A8R8G8B8" | "X8B8G8R8" | "A8B8G8R8" | "R5G6B5" | "A4R4G4B4"
        | "A1R5G5B5" => F::Rgba8Unorm,
        "A16R16G16B16" | "A16B16G16R16" | "A16R16G16B16F" | "A16B16G16R16F" => F::Rgba16Float,
        "A32R32G32B32F" | "A32B32G32R32F" => F::Rgba32Float,
        "A2B10G10R10" | "A2R10G10B10" => F::Rgb10a2Unorm,
        "D16" | "D24X8" | "D32" | "DF16" | "DF24" | "D32F_LOCKABLE" => F::Depth32Float,
        "D24S8" | "S8_LOCKABLE" => F::Depth24PlusStencil8,
        _ => return None,
    })
}

/// Format of a color image from its `Format` annotation.
#[must_use]
pub fn color_format(annotations: &Annotations, default: wgpu::TextureFormat) -> wgpu::TextureFormat {
    annotations
        .string("format")
        .and_then(parse_format)
        .filter(|format| !format.is_depth_stencil_format())
        .unwrap_or(default)
}

/// Format of a depth-stencil image from its `Format` annotation.
#[must_use]
pub fn depth_format(annotations: &Annotations, default: wgpu::TextureFormat) -> wgpu::TextureFormat {
    annotations
        .string("format")
        .and_then(parse_format)
        .filter(wgpu::TextureFormat::is_depth_stencil_format)
        .unwrap_or(default)
}

/// Orders color formats by precision, used to pick a common format for
/// mismatched attachments.
#[must_use]
pub fn format_rank(format: wgpu::TextureFormat) -> u32 {
    use wgpu::TextureFormat as F;
    match format {
        F::R8Unorm => 1,
        F::Rg8Unorm => 2,
        F::Rgba8Unorm | F::Rgba8UnormSrgb | F::Bgra8Unorm | F::Bgra8UnormSrgb => 3,
        F::Rgb10a2Unorm => 4,
        F::R16Float => 5,
        F::Rg16Float => 6,
        F::Rgba16Float => 7,
        F::R32Float => 8,
        F::Rg32Float => 9,
        F::Rgba32Float => 10,
        _ => 0,
    }
}

/// Resolved size of a declared image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageExtent {
    pub size: UVec3,
    /// Present when the size follows the viewport.
    pub scale: Option<Vec2>,
}

impl ImageExtent {
    #[must_use]
    pub fn scaled(viewport: UVec2, scale: Vec2) -> Self {
        let size = (viewport.as_vec2() * scale)
            .round()
            .clamp(Vec2::ONE, Vec2::splat(MAX_EXTENT as f32))
            .as_uvec2();
        Self {
            size: size.extend(1),
            scale: Some(scale),
        }
    }

    #[inline]
    #[must_use]
    pub fn size_2d(&self) -> UVec2 {
        self.size.truncate()
    }
}

/// What a declaration resolves to when it carries no size annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultExtent {
    /// Viewport sized (render targets).
    Viewport,
    Fixed(UVec3),
}

/// Resolves `ViewportRatio`, `Dimensions`, `Width`/`Height`/`Depth`.
#[must_use]
pub fn determine_image_size(
    annotations: &Annotations,
    viewport: UVec2,
    default: DefaultExtent,
) -> ImageExtent {
    let clamp_extent = |value: i32| (value.max(1) as u32).min(MAX_EXTENT);

    if let Some(ratio) = annotations.vec4("viewportratio") {
        return ImageExtent::scaled(viewport, ratio.truncate().truncate());
    }
    if let Some(dimensions) = annotations.vec4("dimensions") {
        let size = dimensions
            .truncate()
            .as_uvec3()
            .clamp(UVec3::new(1, 1, 0), UVec3::new(MAX_EXTENT, MAX_EXTENT, MAX_DEPTH));
        return ImageExtent {
            size: UVec3::new(size.x, size.y, size.z.max(1)),
            scale: None,
        };
    }
    match (
        annotations.int("width"),
        annotations.int("height"),
        annotations.int("depth"),
    ) {
        (Some(width), Some(height), depth) => ImageExtent {
            size: UVec3::new(
                clamp_extent(width),
                clamp_extent(height),
                depth.map_or(1, |depth| (depth.max(1) as u32).min(MAX_DEPTH)),
            ),
            scale: None,
        },
        (Some(width), None, _) => {
            let extent = clamp_extent(width);
            ImageExtent {
                size: UVec3::new(extent, extent, 1),
                scale: None,
            }
        }
        _ => match default {
            DefaultExtent::Viewport => ImageExtent::scaled(viewport, Vec2::ONE),
            DefaultExtent::Fixed(size) => ImageExtent { size, scale: None },
        },
    }
}

/// Number of levels in a complete mip chain for `size`, capped at
/// `max_mipmaps`.
#[inline]
#[must_use]
pub fn full_mip_chain(size: UVec2, max_mipmaps: u32) -> u32 {
    let largest = size.max_element().max(1);
    (u32::BITS - largest.leading_zeros()).min(max_mipmaps.max(1))
}

/// Resolves `MipLevels` (or `Levels`). Zero requests the full chain.
#[must_use]
pub fn determine_mip_levels(
    annotations: &Annotations,
    size: UVec2,
    default: u32,
    max_mipmaps: u32,
) -> u32 {
    let full_chain = full_mip_chain(size, max_mipmaps);
    let requested = annotations
        .int("miplevels")
        .or_else(|| annotations.int("levels"))
        .map_or(default, |levels| {
            if levels > 0 {
                levels as u32
            } else {
                full_chain
            }
        });
    requested.clamp(1, full_chain)
}
