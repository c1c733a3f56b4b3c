//! Pipeline identity and caches.
//!
//! A pipeline is identified by the state a draw derives from its pass,
//! technique, drawable and bound targets, hashed into a `u64`. Each technique
//! owns a [`PipelineCache`]; entries are never invalidated during the life
//! of the effect because any change of that state produces a new key.
//!
//! Shader pairs are deduplicated per effect by an xxh3-128 hash of their
//! sources in [`ShaderCache`].

use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_128;

use super::technique::{PassType, PipelineOverrides};
use crate::bundle::RenderStateTable;
use crate::bundle::render_state::CompareFunc;
use crate::device::{
    ColorTargetDesc, DepthStencilDesc, MAX_COLOR_ATTACHMENTS, PipelineDesc, PipelineHandle,
    RenderDevice, ShaderDesc, ShaderHandle,
};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Everything that selects a distinct pipeline object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub pass: u32,
    pub pass_type: PassType,
    pub overrides: PipelineOverrides,
    /// Full screen `Draw=Buffer` rather than drawable geometry.
    pub buffer_draw: bool,
    pub add_blend: bool,
    pub offscreen: bool,
    pub color_formats: [Option<wgpu::TextureFormat>; MAX_COLOR_ATTACHMENTS],
    pub depth_format: Option<wgpu::TextureFormat>,
    pub sample_count: u32,
}

/// Hashes a key with `FxHasher`.
#[must_use]
pub fn fx_hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

// ─── State Derivation ────────────────────────────────────────────────────────

fn blend_component(
    src: wgpu::BlendFactor,
    dst: wgpu::BlendFactor,
    operation: wgpu::BlendOperation,
) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation,
    }
}

fn blend_state(state: &RenderStateTable, add_blend: bool) -> Option<wgpu::BlendState> {
    if !state.alpha_blend_enable.unwrap_or(true) {
        return None;
    }
    let default_dst = if add_blend {
        wgpu::BlendFactor::One
    } else {
        wgpu::BlendFactor::OneMinusSrcAlpha
    };
    let src = state
        .src_blend
        .map_or(wgpu::BlendFactor::SrcAlpha, |factor| factor.to_wgpu());
    let dst = state.dest_blend.map_or(default_dst, |factor| factor.to_wgpu());
    let operation = state
        .blend_op
        .map_or(wgpu::BlendOperation::Add, |op| op.to_wgpu());
    let color = blend_component(src, dst, operation);
    let alpha = if state.separate_alpha_blend_enable.unwrap_or(false) {
        blend_component(
            state
                .src_blend_alpha
                .map_or(wgpu::BlendFactor::One, |factor| factor.to_wgpu()),
            state
                .dest_blend_alpha
                .map_or(wgpu::BlendFactor::OneMinusSrcAlpha, |factor| factor.to_wgpu()),
            state
                .blend_op_alpha
                .map_or(wgpu::BlendOperation::Add, |op| op.to_wgpu()),
        )
    } else {
        color
    };
    Some(wgpu::BlendState { color, alpha })
}

fn stencil_state(state: &RenderStateTable, shadow: bool) -> wgpu::StencilState {
    if shadow && state.stencil_enable.is_none() {
        // Ground shadows are drawn once per pixel.
        let face = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Equal,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::IncrementClamp,
        };
        return wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask: 0xff,
        };
    }
    if !state.stencil_enable.unwrap_or(false) {
        return wgpu::StencilState::default();
    }
    let face = wgpu::StencilFaceState {
        compare: state
            .stencil_func
            .map_or(wgpu::CompareFunction::Always, CompareFunc::to_wgpu),
        fail_op: state
            .stencil_fail
            .map_or(wgpu::StencilOperation::Keep, |op| op.to_wgpu()),
        depth_fail_op: state
            .stencil_z_fail
            .map_or(wgpu::StencilOperation::Keep, |op| op.to_wgpu()),
        pass_op: state
            .stencil_pass
            .map_or(wgpu::StencilOperation::Keep, |op| op.to_wgpu()),
    };
    wgpu::StencilState {
        front: face,
        back: face,
        read_mask: state.stencil_mask.unwrap_or(0xff),
        write_mask: state.stencil_write_mask.unwrap_or(0xff),
    }
}

/// Builds the device pipeline description for `key`.
///
/// Explicit pass render states win over technique overrides, which win over
/// the defaults: alpha blending, less-equal depth test with writes, and
/// back-face culling for geometry.
#[must_use]
pub fn build_pipeline_desc(
    shader: ShaderHandle,
    state: &RenderStateTable,
    key: &PipelineKey,
) -> PipelineDesc {
    let overrides = &key.overrides;
    let (topology, front_face, cull_mode) = if key.buffer_draw {
        (
            wgpu::PrimitiveTopology::TriangleStrip,
            wgpu::FrontFace::Cw,
            None,
        )
    } else {
        (
            state
                .topology()
                .or(overrides.topology)
                .unwrap_or(wgpu::PrimitiveTopology::TriangleList),
            overrides.front_face.unwrap_or(wgpu::FrontFace::Cw),
            state
                .cull_mode
                .map(|mode| mode.to_wgpu())
                .or(overrides.cull_mode)
                .unwrap_or(Some(wgpu::Face::Back)),
        )
    };

    let blend = blend_state(state, key.add_blend);
    let write_mask = state.color_writes().unwrap_or(wgpu::ColorWrites::ALL);
    let color_targets: SmallVec<[ColorTargetDesc; MAX_COLOR_ATTACHMENTS]> = key
        .color_formats
        .iter()
        .map_while(|format| *format)
        .map(|format| ColorTargetDesc {
            format,
            blend,
            write_mask,
        })
        .collect();

    let depth_stencil = key.depth_format.map(|format| {
        let depth_enabled = state.z_enable.unwrap_or(!key.buffer_draw);
        let shadow = overrides.shadow_depth;
        DepthStencilDesc {
            format,
            depth_write_enabled: depth_enabled && state.z_write_enable.unwrap_or(!shadow),
            depth_compare: if depth_enabled {
                state
                    .z_func
                    .map_or(wgpu::CompareFunction::LessEqual, CompareFunc::to_wgpu)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: if format.has_stencil_aspect() {
                stencil_state(state, shadow)
            } else {
                wgpu::StencilState::default()
            },
            bias: wgpu::DepthBiasState::default(),
        }
    });

    PipelineDesc {
        shader,
        topology,
        front_face,
        cull_mode,
        color_targets,
        depth_stencil,
        sample_count: key.sample_count.max(1),
        alpha_to_coverage: state.alpha_to_coverage_enable.unwrap_or(false) && key.sample_count > 1,
    }
}

// ─── Caches ──────────────────────────────────────────────────────────────────

/// Per technique pipeline objects, keyed by the hash of a [`PipelineKey`].
#[derive(Debug, Default)]
pub struct PipelineCache {
    lookup: FxHashMap<u64, PipelineHandle>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    #[must_use]
    pub fn get(&self, key: &PipelineKey) -> Option<PipelineHandle> {
        self.lookup.get(&fx_hash_key(key)).copied()
    }

    /// Returns the cached pipeline for `key`, creating it on a miss. A
    /// creation failure is logged and yields `None`.
    pub fn get_or_create(
        &mut self,
        device: &mut dyn RenderDevice,
        key: &PipelineKey,
        build: impl FnOnce() -> PipelineDesc,
        label: &str,
    ) -> Option<PipelineHandle> {
        let hash = fx_hash_key(key);
        if let Some(&pipeline) = self.lookup.get(&hash) {
            return Some(pipeline);
        }
        match device.create_pipeline(&build(), label) {
            Ok(pipeline) => {
                log::debug!("Created pipeline {label} ({hash:016x})");
                self.lookup.insert(hash, pipeline);
                Some(pipeline)
            }
            Err(error) => {
                log::warn!("Creating the pipeline {label} failed: {error}");
                None
            }
        }
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for (_, pipeline) in self.lookup.drain() {
            device.destroy_pipeline(pipeline);
        }
    }
}

/// Shader pairs of one effect, deduplicated by source hash.
#[derive(Debug, Default)]
pub struct ShaderCache {
    shaders: FxHashMap<u128, ShaderHandle>,
}

impl ShaderCache {
    #[must_use]
    pub fn source_hash(desc: &ShaderDesc) -> u128 {
        let mut source = String::with_capacity(
            desc.vertex_source.len() + desc.pixel_source.len() + desc.vertex_entry.len() + 8,
        );
        for part in [
            &desc.vertex_source,
            &desc.vertex_entry,
            &desc.pixel_source,
            &desc.pixel_entry,
        ] {
            source.push_str(part);
            source.push('\0');
        }
        xxh3_128(source.as_bytes())
    }

    pub fn get_or_create(
        &mut self,
        device: &mut dyn RenderDevice,
        desc: &ShaderDesc,
    ) -> crate::errors::Result<ShaderHandle> {
        let hash = Self::source_hash(desc);
        if let Some(&shader) = self.shaders.get(&hash) {
            return Ok(shader);
        }
        let shader = device.create_shader(desc)?;
        self.shaders.insert(hash, shader);
        Ok(shader)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for (_, shader) in self.shaders.drain() {
            device.destroy_shader(shader);
        }
    }
}
