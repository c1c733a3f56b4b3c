//! `wgpu` backed [`RenderDevice`].
//!
//! Pass shaders are WGSL with a fixed resource interface:
//!
//! ```text
//! @group(0) @binding(0)  vertex registers   array<vec4<f32>, N>
//! @group(0) @binding(1)  pixel registers    array<vec4<f32>, M>
//! @group(1) @binding(2i) / (2i+1)           vertex image i + sampler
//! @group(1) @binding(2(V+j)) / (2(V+j)+1)   pixel image j + sampler
//! ```
//!
//! Vertex attributes are interleaved in one buffer at locations `0..n`.
//! Work is recorded into a single command encoder and submitted by
//! [`WgpuDevice::submit`].

use std::borrow::Cow;

use glam::Vec4;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use super::blit::ImageBlitter;
use super::{
    BufferHandle, ClearAction, DeviceFeatures, DrawCall, DrawGeometry, ImageBinding, ImageDesc,
    ImageHandle, ImageUsage, PipelineDesc, PipelineHandle, RenderDevice, RenderPassDesc,
    SamplerDesc, ShaderDesc, ShaderHandle,
};
use crate::errors::{EffectError, Result};

/// Screen covering strip: position (xyzw) + texcoord (uv).
const QUAD_VERTICES: [[f32; 6]; 4] = [
    [-1.0, 1.0, 0.0, 1.0, 0.0, 0.0],
    [-1.0, -1.0, 0.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, 1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0, 1.0, 1.0, 1.0],
];

struct GpuImage {
    texture: wgpu::Texture,
    /// Base level view used as a render attachment.
    attachment_view: wgpu::TextureView,
    /// Single-sampled copy resolved from a multisampled attachment.
    resolve: Option<(wgpu::Texture, wgpu::TextureView)>,
    /// Full mip chain view used when sampling.
    sampled_view: wgpu::TextureView,
    desc: ImageDesc,
}

impl GpuImage {
    fn sampling_view(&self) -> &wgpu::TextureView {
        self.resolve
            .as_ref()
            .map_or(&self.sampled_view, |(_, view)| view)
    }
}

struct GpuShader {
    vertex: wgpu::ShaderModule,
    pixel: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    image_layout: wgpu::BindGroupLayout,
    desc: ShaderDesc,
}

struct GpuPipeline {
    pipeline: wgpu::RenderPipeline,
    shader: ShaderHandle,
}

/// Real GPU device.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    features: DeviceFeatures,
    images: SlotMap<ImageHandle, GpuImage>,
    buffers: SlotMap<BufferHandle, wgpu::Buffer>,
    shaders: SlotMap<ShaderHandle, GpuShader>,
    pipelines: SlotMap<PipelineHandle, GpuPipeline>,
    samplers: FxHashMap<SamplerDesc, wgpu::Sampler>,
    blitter: ImageBlitter,
    quad_buffer: wgpu::Buffer,
    white_view: wgpu::TextureView,
    encoder: Option<wgpu::CommandEncoder>,
}

fn ensure_encoder<'a>(
    slot: &'a mut Option<wgpu::CommandEncoder>,
    device: &wgpu::Device,
) -> &'a mut wgpu::CommandEncoder {
    slot.get_or_insert_with(|| {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Effect Encoder"),
        })
    })
}

impl WgpuDevice {
    /// Wraps an existing device/queue pair created from `adapter`.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, adapter: &wgpu::Adapter) -> Self {
        let limits = device.limits();
        let backend = adapter.get_info().backend;
        let features = DeviceFeatures {
            independent_blend: adapter
                .get_downlevel_capabilities()
                .flags
                .contains(wgpu::DownlevelFlags::INDEPENDENT_BLEND),
            max_image_dimension: limits.max_texture_dimension_2d,
            max_samplers_per_stage: limits.max_sampled_textures_per_shader_stage,
            gl_compatibility: backend == wgpu::Backend::Gl,
            backend_name: format!("{backend:?}"),
        };

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Effect Fullscreen Quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let white = device.create_texture_with_data(
            &queue,
            &wgpu::TextureDescriptor {
                label: Some("Effect Unbound Image"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let white_view = white.create_view(&wgpu::TextureViewDescriptor::default());

        let blitter = ImageBlitter::new(&device);

        Self {
            device,
            queue,
            features,
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            samplers: FxHashMap::default(),
            blitter,
            quad_buffer,
            white_view,
            encoder: None,
        }
    }

    /// Creates a device without a surface, blocking on adapter selection.
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| EffectError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Effect Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))?;

        Ok(Self::new(device, queue, &adapter))
    }

    #[inline]
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Texture view of `image` suitable for presenting or sampling.
    #[must_use]
    pub fn image_view(&self, image: ImageHandle) -> Option<&wgpu::TextureView> {
        self.images.get(image).map(GpuImage::sampling_view)
    }

    /// Submits all recorded work.
    pub fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn sampler(&mut self, desc: SamplerDesc) -> wgpu::Sampler {
        self.samplers
            .entry(desc)
            .or_insert_with(|| {
                self.device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("Effect Sampler"),
                    address_mode_u: desc.address_u,
                    address_mode_v: desc.address_v,
                    address_mode_w: desc.address_w,
                    mag_filter: desc.mag_filter,
                    min_filter: desc.min_filter,
                    mipmap_filter: desc.mipmap_filter,
                    ..Default::default()
                })
            })
            .clone()
    }

    fn image_layout_entries(desc: &ShaderDesc) -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = Vec::new();
        let stages = std::iter::repeat_n(wgpu::ShaderStages::VERTEX, desc.vertex_image_count as usize)
            .chain(std::iter::repeat_n(
                wgpu::ShaderStages::FRAGMENT,
                desc.pixel_image_count as usize,
            ));
        for (slot, visibility) in stages.enumerate() {
            let binding = slot as u32 * 2;
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: binding + 1,
                visibility,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        entries
    }

    fn color_attachments<'a>(
        images: &'a SlotMap<ImageHandle, GpuImage>,
        pass: &RenderPassDesc,
        clear: Option<Vec4>,
    ) -> Vec<Option<wgpu::RenderPassColorAttachment<'a>>> {
        pass.color_attachments
            .iter()
            .map(|handle| {
                let image = images.get((*handle)?)?;
                let load = clear.map_or(wgpu::LoadOp::Load, |c| {
                    wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(c.x),
                        g: f64::from(c.y),
                        b: f64::from(c.z),
                        a: f64::from(c.w),
                    })
                });
                Some(wgpu::RenderPassColorAttachment {
                    view: &image.attachment_view,
                    resolve_target: image.resolve.as_ref().map(|(_, view)| view),
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect()
    }

    fn depth_attachment<'a>(
        images: &'a SlotMap<ImageHandle, GpuImage>,
        pass: &RenderPassDesc,
        depth: Option<f32>,
        stencil: Option<u32>,
    ) -> Option<wgpu::RenderPassDepthStencilAttachment<'a>> {
        let image = images.get(pass.depth_stencil_attachment?)?;
        let format = image.desc.format;
        Some(wgpu::RenderPassDepthStencilAttachment {
            view: &image.attachment_view,
            depth_ops: format.has_depth_aspect().then(|| wgpu::Operations {
                load: depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: format.has_stencil_aspect().then(|| wgpu::Operations {
                load: stencil.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            }),
        })
    }
}

impl RenderDevice for WgpuDevice {
    fn features(&self) -> &DeviceFeatures {
        &self.features
    }

    fn create_image(&mut self, desc: &ImageDesc, label: &str) -> Result<ImageHandle> {
        let limit = self.features.max_image_dimension;
        if desc.width > limit || desc.height > limit {
            return Err(EffectError::ImageCreateFailed {
                label: label.to_string(),
                reason: format!("{}x{} exceeds {limit}", desc.width, desc.height),
            });
        }

        let multisampled = desc.sample_count > 1;
        let mut usage = wgpu::TextureUsages::empty();
        if desc.usage.contains(ImageUsage::RENDER_ATTACHMENT) {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        if desc.usage.contains(ImageUsage::SAMPLED) && !multisampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if desc.usage.contains(ImageUsage::COPY_SRC) && !multisampled {
            usage |= wgpu::TextureUsages::COPY_SRC;
        }
        if desc.usage.contains(ImageUsage::COPY_DST) && !multisampled {
            usage |= wgpu::TextureUsages::COPY_DST;
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: desc.depth.max(1),
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: if multisampled { 1 } else { desc.mip_level_count.max(1) },
            sample_count: desc.sample_count.max(1),
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage,
            view_formats: &[],
        });

        let resolve = (multisampled && !desc.is_depth()).then(|| {
            let resolved = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("{label}/Resolve")),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: desc.format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = resolved.create_view(&wgpu::TextureViewDescriptor::default());
            (resolved, view)
        });

        let attachment_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        let sampled_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(self.images.insert(GpuImage {
            texture,
            attachment_view,
            resolve,
            sampled_view,
            desc: *desc,
        }))
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        if let Some(image) = self.images.remove(image) {
            image.texture.destroy();
            if let Some((resolved, _)) = image.resolve {
                resolved.destroy();
            }
        }
    }

    fn image_desc(&self, image: ImageHandle) -> Option<ImageDesc> {
        self.images.get(image).map(|image| image.desc)
    }

    fn write_image(&mut self, image: ImageHandle, data: &[u8]) {
        let Some(image) = self.images.get(image) else {
            log::warn!("write_image: unknown image {image:?}");
            return;
        };
        let format = image.desc.format;
        let (block_width, block_height) = format.block_dimensions();
        let Some(block_size) = format.block_copy_size(None) else {
            log::warn!("write_image: {format:?} cannot be written from host memory");
            return;
        };
        let width = image.desc.width;
        let height = image.desc.height;
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width.div_ceil(block_width) * block_size),
                rows_per_image: Some(height.div_ceil(block_height)),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_buffer(
        &mut self,
        contents: &[u8],
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Result<BufferHandle> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        Ok(self.buffers.insert(buffer))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(buffer) {
            buffer.destroy();
        }
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderHandle> {
        if desc.vertex_entry.is_empty() || desc.pixel_entry.is_empty() {
            return Err(EffectError::ShaderCreateFailed {
                label: desc.label.clone(),
                reason: "missing entry point".to_string(),
            });
        }
        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}/VertexShader", desc.label)),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.vertex_source.as_str())),
            });
        let pixel = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}/PixelShader", desc.label)),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(desc.pixel_source.as_str())),
            });

        let uniform_entry = |binding: u32, visibility: wgpu::ShaderStages| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Effect Register Layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX),
                    uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let image_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Effect Image Layout"),
                entries: &Self::image_layout_entries(desc),
            });

        Ok(self.shaders.insert(GpuShader {
            vertex,
            pixel,
            uniform_layout,
            image_layout,
            desc: desc.clone(),
        }))
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(shader);
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc, label: &str) -> Result<PipelineHandle> {
        let Some(shader) = self.shaders.get(desc.shader) else {
            return Err(EffectError::PipelineCreateFailed {
                label: label.to_string(),
                reason: "unknown shader".to_string(),
            });
        };

        let mut offset = 0;
        let attributes: Vec<wgpu::VertexAttribute> = shader
            .desc
            .vertex_attributes
            .iter()
            .enumerate()
            .map(|(location, format)| {
                let attribute = wgpu::VertexAttribute {
                    format: *format,
                    offset,
                    shader_location: location as u32,
                };
                offset += format.size();
                attribute
            })
            .collect();
        let vertex_buffers = if attributes.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::VertexBufferLayout {
                array_stride: offset,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }]
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: target.format,
                    blend: target.blend,
                    write_mask: target.write_mask,
                })
            })
            .collect();

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[Some(&shader.uniform_layout), Some(&shader.image_layout)],
                immediate_size: 0,
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader.vertex,
                    entry_point: Some(shader.desc.vertex_entry.as_str()),
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader.pixel,
                    entry_point: Some(shader.desc.pixel_entry.as_str()),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: desc.topology,
                    front_face: desc.front_face,
                    cull_mode: desc.cull_mode,
                    ..Default::default()
                },
                depth_stencil: desc.depth_stencil.as_ref().map(|depth| wgpu::DepthStencilState {
                    format: depth.format,
                    depth_write_enabled: Some(depth.depth_write_enabled),
                    depth_compare: Some(depth.depth_compare),
                    stencil: depth.stencil.clone(),
                    bias: depth.bias,
                }),
                multisample: wgpu::MultisampleState {
                    count: desc.sample_count.max(1),
                    mask: !0,
                    alpha_to_coverage_enabled: desc.alpha_to_coverage,
                },
                multiview_mask: None,
                cache: None,
            });

        Ok(self.pipelines.insert(GpuPipeline {
            pipeline,
            shader: desc.shader,
        }))
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        self.pipelines.remove(pipeline);
    }

    fn clear(&mut self, pass: &RenderPassDesc, action: &ClearAction) {
        let encoder = ensure_encoder(&mut self.encoder, &self.device);
        let color_attachments = Self::color_attachments(&self.images, pass, action.color);
        let depth_stencil_attachment =
            Self::depth_attachment(&self.images, pass, action.depth, action.stencil);
        let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Effect Clear"),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let Some(pipeline) = self.pipelines.get(call.pipeline) else {
            log::warn!("draw \"{}\": unknown pipeline", call.label);
            return;
        };
        let shader_handle = pipeline.shader;
        let Some(shader) = self.shaders.get(shader_handle) else {
            return;
        };

        let register_buffer = |registers: &[Vec4], label: &str| {
            let padded: &[Vec4] = if registers.is_empty() {
                &[Vec4::ZERO]
            } else {
                registers
            };
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: bytemuck::cast_slice(padded),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
        };
        let vertex_registers = register_buffer(call.vertex_uniforms, "Effect Vertex Registers");
        let pixel_registers = register_buffer(call.pixel_uniforms, "Effect Pixel Registers");
        let uniform_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Register BG"),
            layout: &shader.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: vertex_registers.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pixel_registers.as_entire_binding(),
                },
            ],
        });

        let vertex_count = shader.desc.vertex_image_count as usize;
        let pixel_count = shader.desc.pixel_image_count as usize;
        let slots: Vec<Option<ImageBinding>> = (0..vertex_count)
            .map(|i| call.vertex_images.get(i).copied())
            .chain((0..pixel_count).map(|i| call.pixel_images.get(i).copied()))
            .collect();
        let samplers: Vec<wgpu::Sampler> = slots
            .iter()
            .map(|slot| self.sampler(slot.map(|binding| binding.sampler).unwrap_or_default()))
            .collect();

        let Some(pipeline) = self.pipelines.get(call.pipeline) else {
            return;
        };
        let Some(shader) = self.shaders.get(shader_handle) else {
            return;
        };
        let mut image_entries = Vec::with_capacity(slots.len() * 2);
        for (index, (slot, sampler)) in slots.iter().zip(samplers.iter()).enumerate() {
            let view = slot
                .and_then(|binding| self.images.get(binding.image))
                .filter(|image| !image.desc.is_depth())
                .map_or(&self.white_view, GpuImage::sampling_view);
            let binding = index as u32 * 2;
            image_entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            image_entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let image_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Effect Image BG"),
            layout: &shader.image_layout,
            entries: &image_entries,
        });

        let encoder = ensure_encoder(&mut self.encoder, &self.device);
        {
            let color_attachments = Self::color_attachments(&self.images, &call.pass, None);
            let depth_stencil_attachment =
                Self::depth_attachment(&self.images, &call.pass, None, None);
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(call.label),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&pipeline.pipeline);
            rpass.set_bind_group(0, &uniform_group, &[]);
            rpass.set_bind_group(1, &image_group, &[]);
            match &call.geometry {
                DrawGeometry::Indexed {
                    vertex_buffer,
                    index_buffer,
                    index_format,
                    indices,
                } => {
                    if let (Some(vertices), Some(index)) =
                        (self.buffers.get(*vertex_buffer), self.buffers.get(*index_buffer))
                    {
                        rpass.set_vertex_buffer(0, vertices.slice(..));
                        rpass.set_index_buffer(index.slice(..), *index_format);
                        rpass.draw_indexed(indices.clone(), 0, 0..1);
                    }
                }
                DrawGeometry::Vertices {
                    vertex_buffer,
                    vertices,
                } => {
                    if let Some(buffer) = self.buffers.get(*vertex_buffer) {
                        rpass.set_vertex_buffer(0, buffer.slice(..));
                        rpass.draw(vertices.clone(), 0..1);
                    }
                }
                DrawGeometry::FullscreenQuad => {
                    rpass.set_vertex_buffer(0, self.quad_buffer.slice(..));
                    rpass.draw(0..4, 0..1);
                }
            }
        }
    }

    fn blit(&mut self, source: ImageHandle, destination: ImageHandle) {
        let (Some(src), Some(dst)) = (self.images.get(source), self.images.get(destination))
        else {
            log::warn!("blit: unknown image {source:?} -> {destination:?}");
            return;
        };
        let format = dst.desc.format;
        if format.is_depth_stencil_format() {
            log::warn!("blit: depth image {destination:?} cannot be a blit destination");
            return;
        }
        let encoder = ensure_encoder(&mut self.encoder, &self.device);
        let destination_view = dst
            .resolve
            .as_ref()
            .map_or(&dst.attachment_view, |(_, view)| view);
        self.blitter.blit(
            &self.device,
            encoder,
            src.sampling_view(),
            destination_view,
            format,
        );
    }

    fn copy_to_mip_level(&mut self, source: ImageHandle, destination: ImageHandle, mip_level: u32) {
        let (Some(src), Some(dst)) = (self.images.get(source), self.images.get(destination))
        else {
            return;
        };
        if mip_level >= dst.texture.mip_level_count() {
            log::warn!("copy_to_mip_level: level {mip_level} out of range");
            return;
        }
        let size = wgpu::Extent3d {
            width: (dst.desc.width >> mip_level).max(1),
            height: (dst.desc.height >> mip_level).max(1),
            depth_or_array_layers: 1,
        };
        let encoder = ensure_encoder(&mut self.encoder, &self.device);
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            size,
        );
    }
}
