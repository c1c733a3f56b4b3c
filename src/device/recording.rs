//! In-memory [`RenderDevice`] that records every call.
//!
//! Used by tests and tooling to observe exactly which images, pipelines,
//! clears and draws the effect runtime produces, without a GPU.

use glam::Vec4;
use slotmap::SlotMap;

use super::{
    BufferHandle, ClearAction, DeviceFeatures, DrawCall, DrawGeometry, ImageBinding, ImageDesc,
    ImageHandle, PipelineDesc, PipelineHandle, RenderDevice, RenderPassDesc, ShaderDesc,
    ShaderHandle,
};
use crate::errors::{EffectError, Result};

/// A recorded device call. Draws keep owned copies of their uniform payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateImage {
        image: ImageHandle,
        desc: ImageDesc,
        label: String,
    },
    DestroyImage(ImageHandle),
    WriteImage {
        image: ImageHandle,
        len: usize,
    },
    CreateShader {
        shader: ShaderHandle,
        label: String,
    },
    DestroyShader(ShaderHandle),
    CreatePipeline {
        pipeline: PipelineHandle,
        label: String,
    },
    DestroyPipeline(PipelineHandle),
    Clear {
        pass: RenderPassDesc,
        action: ClearAction,
    },
    Draw {
        label: String,
        pipeline: PipelineHandle,
        pass: RenderPassDesc,
        vertex_uniforms: Vec<Vec4>,
        pixel_uniforms: Vec<Vec4>,
        vertex_images: Vec<ImageBinding>,
        pixel_images: Vec<ImageBinding>,
        geometry: DrawGeometry,
    },
    Blit {
        source: ImageHandle,
        destination: ImageHandle,
    },
    CopyToMipLevel {
        source: ImageHandle,
        destination: ImageHandle,
        mip_level: u32,
    },
}

/// Records device calls and hands out valid handles.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    features: DeviceFeatures,
    images: SlotMap<ImageHandle, ImageDesc>,
    buffers: SlotMap<BufferHandle, usize>,
    shaders: SlotMap<ShaderHandle, ShaderDesc>,
    pipelines: SlotMap<PipelineHandle, PipelineDesc>,
    commands: Vec<DeviceCommand>,
    /// When set, `create_pipeline` fails for every request.
    pub fail_pipelines: bool,
}

impl RecordingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_features(features: DeviceFeatures) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drops the command log, keeping live objects.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    #[must_use]
    pub fn is_image_alive(&self, image: ImageHandle) -> bool {
        self.images.contains_key(image)
    }

    #[must_use]
    pub fn live_image_count(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn live_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    #[must_use]
    pub fn pipeline_desc(&self, pipeline: PipelineHandle) -> Option<&PipelineDesc> {
        self.pipelines.get(pipeline)
    }

    /// All recorded clears in submission order.
    pub fn clears(&self) -> impl Iterator<Item = (&RenderPassDesc, &ClearAction)> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::Clear { pass, action } => Some((pass, action)),
            _ => None,
        })
    }

    /// All recorded draws in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &DeviceCommand> {
        self.commands
            .iter()
            .filter(|command| matches!(command, DeviceCommand::Draw { .. }))
    }

    /// Label of the image created as `image`, if it was created here.
    #[must_use]
    pub fn image_label(&self, image: ImageHandle) -> Option<&str> {
        self.commands.iter().find_map(|command| match command {
            DeviceCommand::CreateImage {
                image: created,
                label,
                ..
            } if *created == image => Some(label.as_str()),
            _ => None,
        })
    }
}

impl RenderDevice for RecordingDevice {
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
        let image = self.images.insert(*desc);
        self.commands.push(DeviceCommand::CreateImage {
            image,
            desc: *desc,
            label: label.to_string(),
        });
        Ok(image)
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        if self.images.remove(image).is_some() {
            self.commands.push(DeviceCommand::DestroyImage(image));
        }
    }

    fn image_desc(&self, image: ImageHandle) -> Option<ImageDesc> {
        self.images.get(image).copied()
    }

    fn write_image(&mut self, image: ImageHandle, data: &[u8]) {
        self.commands.push(DeviceCommand::WriteImage {
            image,
            len: data.len(),
        });
    }

    fn create_buffer(
        &mut self,
        contents: &[u8],
        _usage: wgpu::BufferUsages,
        _label: &str,
    ) -> Result<BufferHandle> {
        Ok(self.buffers.insert(contents.len()))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderHandle> {
        let shader = self.shaders.insert(desc.clone());
        self.commands.push(DeviceCommand::CreateShader {
            shader,
            label: desc.label.clone(),
        });
        Ok(shader)
    }

    fn destroy_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(shader).is_some() {
            self.commands.push(DeviceCommand::DestroyShader(shader));
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc, label: &str) -> Result<PipelineHandle> {
        if self.fail_pipelines || !self.shaders.contains_key(desc.shader) {
            return Err(EffectError::PipelineCreateFailed {
                label: label.to_string(),
                reason: "rejected by recording device".to_string(),
            });
        }
        let pipeline = self.pipelines.insert(desc.clone());
        self.commands.push(DeviceCommand::CreatePipeline {
            pipeline,
            label: label.to_string(),
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        if self.pipelines.remove(pipeline).is_some() {
            self.commands.push(DeviceCommand::DestroyPipeline(pipeline));
        }
    }

    fn clear(&mut self, pass: &RenderPassDesc, action: &ClearAction) {
        self.commands.push(DeviceCommand::Clear {
            pass: *pass,
            action: *action,
        });
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        self.commands.push(DeviceCommand::Draw {
            label: call.label.to_string(),
            pipeline: call.pipeline,
            pass: call.pass,
            vertex_uniforms: call.vertex_uniforms.to_vec(),
            pixel_uniforms: call.pixel_uniforms.to_vec(),
            vertex_images: call.vertex_images.to_vec(),
            pixel_images: call.pixel_images.to_vec(),
            geometry: call.geometry.clone(),
        });
    }

    fn blit(&mut self, source: ImageHandle, destination: ImageHandle) {
        self.commands.push(DeviceCommand::Blit {
            source,
            destination,
        });
    }

    fn copy_to_mip_level(&mut self, source: ImageHandle, destination: ImageHandle, mip_level: u32) {
        self.commands.push(DeviceCommand::CopyToMipLevel {
            source,
            destination,
            mip_level,
        });
    }
}
