use glam::UVec2;

use crate::device::{ImageHandle, MAX_COLOR_ATTACHMENTS, RenderPassDesc};
use crate::scene::TargetImages;

/// One bound attachment with the properties pipelines depend on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub image: ImageHandle,
    pub format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub size: UVec2,
    /// Declared container name, `None` for viewport images.
    pub name: Option<String>,
    pub mip_level_count: u32,
}

/// Attachments selected by the script so far in one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTargetState {
    pub colors: [Option<Attachment>; MAX_COLOR_ATTACHMENTS],
    pub depth: Option<Attachment>,
    /// Name set by `RenderDepthStencilTarget`.
    pub depth_name: Option<String>,
}

impl RenderTargetState {
    /// State writing into `target`.
    #[must_use]
    pub fn from_target(target: &TargetImages) -> Self {
        let mut state = Self::default();
        state.reset_color(target);
        state.reset_depth(target);
        state
    }

    pub fn reset_color(&mut self, target: &TargetImages) {
        self.colors[0] = Some(Attachment {
            image: target.color,
            format: target.color_format,
            sample_count: target.sample_count,
            size: target.size,
            name: None,
            mip_level_count: 1,
        });
    }

    pub fn reset_depth(&mut self, target: &TargetImages) {
        self.depth_name = None;
        self.depth = target.depth.map(|image| Attachment {
            image,
            format: target.depth_format,
            sample_count: target.sample_count,
            size: target.size,
            name: None,
            mip_level_count: 1,
        });
    }

    #[inline]
    #[must_use]
    pub fn primary(&self) -> Option<&Attachment> {
        self.colors[0].as_ref()
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.primary().map_or(1, |attachment| attachment.sample_count)
    }

    #[must_use]
    pub fn pass_desc(&self) -> RenderPassDesc {
        RenderPassDesc {
            color_attachments: std::array::from_fn(|i| {
                self.colors[i].as_ref().map(|attachment| attachment.image)
            }),
            depth_stencil_attachment: self.depth.as_ref().map(|attachment| attachment.image),
        }
    }

    #[must_use]
    pub fn color_formats(&self) -> [Option<wgpu::TextureFormat>; MAX_COLOR_ATTACHMENTS] {
        std::array::from_fn(|i| self.colors[i].as_ref().map(|attachment| attachment.format))
    }
}
