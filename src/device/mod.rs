//! Render Device Abstraction
//!
//! The effect runtime never talks to a GPU API directly. Every image, shader,
//! pipeline, clear and draw goes through the [`RenderDevice`] trait, which
//! hands back opaque `slotmap` handles with create/destroy semantics only.
//! A changed description always produces a new handle; nothing is mutated in
//! place.
//!
//! ```text
//! Effect ──► RenderDevice ─┬─► WgpuDevice       (real GPU, WGSL)
//!                          └─► RecordingDevice  (in-memory command log)
//! ```
//!
//! Descriptor types reuse `wgpu` enums for formats, faces, topology, blend
//! factors and compare functions so both implementations share one vocabulary.

pub mod recording;
pub mod wgpu_device;

mod blit;

use std::ops::Range;

use bitflags::bitflags;
use glam::Vec4;
use smallvec::SmallVec;

use crate::errors::Result;

pub use recording::{DeviceCommand, RecordingDevice};
pub use wgpu_device::WgpuDevice;

/// Number of simultaneous color outputs a pass may declare.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

slotmap::new_key_type! {
    /// Handle to a device image (texture + default view).
    pub struct ImageHandle;
    /// Handle to a compiled vertex/pixel shader pair.
    pub struct ShaderHandle;
    /// Handle to a render pipeline object.
    pub struct PipelineHandle;
    /// Handle to a vertex or index buffer.
    pub struct BufferHandle;
}

// ─── Capabilities ────────────────────────────────────────────────────────────

/// What the active backend can express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFeatures {
    /// Per-attachment blend state is supported.
    pub independent_blend: bool,
    /// Largest 2D image extent.
    pub max_image_dimension: u32,
    /// Largest number of sampled images per shader stage.
    pub max_samplers_per_stage: u32,
    /// The device runs the OpenGL compatibility path that transcoded
    /// DirectX 9 bundles target.
    pub gl_compatibility: bool,
    /// Human readable backend name used in diagnostics.
    pub backend_name: String,
}

impl Default for DeviceFeatures {
    fn default() -> Self {
        Self {
            independent_blend: true,
            max_image_dimension: 16384,
            max_samplers_per_stage: 16,
            gl_compatibility: false,
            backend_name: "Recording".to_string(),
        }
    }
}

// ─── Images ──────────────────────────────────────────────────────────────────

bitflags! {
    /// How an image will be used by the runtime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED           = 1 << 0;
        const RENDER_ATTACHMENT = 1 << 1;
        const COPY_SRC          = 1 << 2;
        const COPY_DST          = 1 << 3;
    }
}

/// Full description of a device image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub format: wgpu::TextureFormat,
    pub usage: ImageUsage,
}

impl ImageDesc {
    /// A single-level render target image that can also be sampled.
    #[must_use]
    pub fn render_target(
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            depth: 1,
            mip_level_count: 1,
            sample_count: sample_count.max(1),
            format,
            usage: ImageUsage::SAMPLED
                | ImageUsage::RENDER_ATTACHMENT
                | ImageUsage::COPY_SRC
                | ImageUsage::COPY_DST,
        }
    }

    /// A sampled image filled from host memory.
    #[must_use]
    pub fn texture(width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            depth: 1,
            mip_level_count: 1,
            sample_count: 1,
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::COPY_DST,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Sampler state attached to an image binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub address_u: wgpu::AddressMode,
    pub address_v: wgpu::AddressMode,
    pub address_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::MipmapFilterMode,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            address_u: wgpu::AddressMode::ClampToEdge,
            address_v: wgpu::AddressMode::ClampToEdge,
            address_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        }
    }
}

/// One sampled image slot of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageBinding {
    pub image: ImageHandle,
    pub sampler: SamplerDesc,
}

// ─── Shaders & Pipelines ─────────────────────────────────────────────────────

/// Source and interface of one pass's vertex/pixel stage pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDesc {
    pub label: String,
    pub vertex_source: String,
    pub vertex_entry: String,
    pub pixel_source: String,
    pub pixel_entry: String,
    /// Interleaved vertex attributes consumed by the vertex stage.
    pub vertex_attributes: Vec<wgpu::VertexFormat>,
    /// Number of float4 registers in the vertex stage uniform block.
    pub vertex_uniform_count: u32,
    /// Number of float4 registers in the pixel stage uniform block.
    pub pixel_uniform_count: u32,
    pub vertex_image_count: u32,
    pub pixel_image_count: u32,
}

/// Output state of one color attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetDesc {
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
    pub write_mask: wgpu::ColorWrites,
}

/// Depth/stencil state of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStencilDesc {
    pub format: wgpu::TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub stencil: wgpu::StencilState,
    pub bias: wgpu::DepthBiasState,
}

/// Everything a device needs to build a render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDesc {
    pub shader: ShaderHandle,
    pub topology: wgpu::PrimitiveTopology,
    pub front_face: wgpu::FrontFace,
    pub cull_mode: Option<wgpu::Face>,
    pub color_targets: SmallVec<[ColorTargetDesc; MAX_COLOR_ATTACHMENTS]>,
    pub depth_stencil: Option<DepthStencilDesc>,
    pub sample_count: u32,
    pub alpha_to_coverage: bool,
}

// ─── Passes & Draws ──────────────────────────────────────────────────────────

/// The set of attachments a clear or draw writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderPassDesc {
    pub color_attachments: [Option<ImageHandle>; MAX_COLOR_ATTACHMENTS],
    pub depth_stencil_attachment: Option<ImageHandle>,
}

impl RenderPassDesc {
    /// A pass writing only `color` (and optionally `depth`).
    #[must_use]
    pub fn single(color: ImageHandle, depth: Option<ImageHandle>) -> Self {
        let mut desc = Self::default();
        desc.color_attachments[0] = Some(color);
        desc.depth_stencil_attachment = depth;
        desc
    }

    /// Number of leading color attachments that are bound.
    #[must_use]
    pub fn color_attachment_count(&self) -> usize {
        self.color_attachments
            .iter()
            .take_while(|image| image.is_some())
            .count()
    }

    /// Whether `image` is one of this pass's outputs.
    #[must_use]
    pub fn writes_to(&self, image: ImageHandle) -> bool {
        self.color_attachments.contains(&Some(image))
            || self.depth_stencil_attachment == Some(image)
    }
}

/// Which components a clear touches, and the values written.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearAction {
    pub color: Option<Vec4>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
}

/// Geometry issued by a draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawGeometry {
    /// Indexed triangles from host-owned buffers.
    Indexed {
        vertex_buffer: BufferHandle,
        index_buffer: BufferHandle,
        index_format: wgpu::IndexFormat,
        indices: Range<u32>,
    },
    /// Non-indexed vertices from a host-owned buffer.
    Vertices {
        vertex_buffer: BufferHandle,
        vertices: Range<u32>,
    },
    /// Four-vertex screen covering strip supplied by the device.
    FullscreenQuad,
}

/// One draw call with every resource resolved.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub label: &'a str,
    pub pipeline: PipelineHandle,
    pub pass: RenderPassDesc,
    pub vertex_uniforms: &'a [Vec4],
    pub pixel_uniforms: &'a [Vec4],
    pub vertex_images: &'a [ImageBinding],
    pub pixel_images: &'a [ImageBinding],
    pub geometry: DrawGeometry,
}

// ─── Device Trait ────────────────────────────────────────────────────────────

/// GPU command surface consumed by the effect runtime.
pub trait RenderDevice {
    fn features(&self) -> &DeviceFeatures;

    fn create_image(&mut self, desc: &ImageDesc, label: &str) -> Result<ImageHandle>;
    fn destroy_image(&mut self, image: ImageHandle);
    fn image_desc(&self, image: ImageHandle) -> Option<ImageDesc>;
    /// Uploads the base level of `image` from tightly packed texels.
    fn write_image(&mut self, image: ImageHandle, data: &[u8]);

    fn create_buffer(
        &mut self,
        contents: &[u8],
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Result<BufferHandle>;
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderHandle>;
    fn destroy_shader(&mut self, shader: ShaderHandle);

    fn create_pipeline(&mut self, desc: &PipelineDesc, label: &str) -> Result<PipelineHandle>;
    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    fn clear(&mut self, pass: &RenderPassDesc, action: &ClearAction);
    fn draw(&mut self, call: &DrawCall<'_>);
    /// Copies `source` into `destination`, rescaling and converting format.
    fn blit(&mut self, source: ImageHandle, destination: ImageHandle);
    /// Copies the base level of `source` into `mip_level` of `destination`.
    fn copy_to_mip_level(&mut self, source: ImageHandle, destination: ImageHandle, mip_level: u32);
}
