//! Render Target Normalizer
//!
//! Backends without per-attachment blend state cannot draw into color
//! attachments of different formats in one pass, and no backend can sample
//! an image while writing it. In both cases the pass is redirected into
//! intermediate images of one common format:
//!
//! ```text
//! read():  origin[i] ──blit──► normalized[i]
//! draw:    pipeline with normalized format ──► normalized[0..n]
//! write(): normalized[i] ──blit──► origin[i]
//! ```

use smallvec::SmallVec;

use super::render_target::RenderTargetState;
use super::render_target::format::format_rank;
use crate::device::{
    DeviceFeatures, ImageDesc, ImageHandle, MAX_COLOR_ATTACHMENTS, RenderDevice, RenderPassDesc,
};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NormalizedAttachment {
    slot: usize,
    origin: ImageHandle,
    normalized: ImageHandle,
}

#[derive(Debug)]
pub struct RenderTargetNormalizer {
    format: wgpu::TextureFormat,
    attachments: SmallVec<[NormalizedAttachment; MAX_COLOR_ATTACHMENTS]>,
    depth: Option<ImageHandle>,
}

impl RenderTargetNormalizer {
    /// Common format the attachments must be drawn in, or `None` when the
    /// pass can draw into them directly.
    #[must_use]
    pub fn required_format(
        features: &DeviceFeatures,
        state: &RenderTargetState,
        samples_own_output: bool,
    ) -> Option<wgpu::TextureFormat> {
        if features.independent_blend {
            return None;
        }
        let primary = state.primary()?;
        let mut format = primary.format;
        let mut mismatch = false;
        for attachment in state.colors.iter().skip(1).flatten() {
            if attachment.format != primary.format || attachment.sample_count != primary.sample_count {
                mismatch = true;
            }
            if format_rank(attachment.format) > format_rank(format) {
                format = attachment.format;
            }
        }
        (mismatch || samples_own_output).then_some(format)
    }

    pub fn new(
        device: &mut dyn RenderDevice,
        state: &RenderTargetState,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Result<Self> {
        let sample_count = state.sample_count();
        let mut normalizer = Self {
            format,
            attachments: SmallVec::new(),
            depth: state.depth.as_ref().map(|attachment| attachment.image),
        };
        for (index, attachment) in state.colors.iter().enumerate() {
            let Some(attachment) = attachment else {
                continue;
            };
            let desc = ImageDesc::render_target(
                attachment.size.x,
                attachment.size.y,
                format,
                sample_count,
            );
            match device.create_image(&desc, &format!("{label}/Normalized/{index}")) {
                Ok(normalized) => normalizer.attachments.push(NormalizedAttachment {
                    slot: index,
                    origin: attachment.image,
                    normalized,
                }),
                Err(error) => {
                    normalizer.destroy(device);
                    return Err(error);
                }
            }
        }
        log::debug!(
            "Created render target normalizer {label} with {} attachments as {format:?}",
            normalizer.attachments.len()
        );
        Ok(normalizer)
    }

    #[inline]
    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Pass writing into the normalized images. Unset slots stay unset.
    #[must_use]
    pub fn pass_desc(&self) -> RenderPassDesc {
        let mut desc = RenderPassDesc {
            depth_stencil_attachment: self.depth,
            ..Default::default()
        };
        for attachment in &self.attachments {
            desc.color_attachments[attachment.slot] = Some(attachment.normalized);
        }
        desc
    }

    /// Copies the current contents into the normalized images.
    pub fn read(&self, device: &mut dyn RenderDevice) {
        for attachment in &self.attachments {
            device.blit(attachment.origin, attachment.normalized);
        }
    }

    /// Copies the drawn result back to the original attachments.
    pub fn write(&self, device: &mut dyn RenderDevice) {
        for attachment in &self.attachments {
            device.blit(attachment.normalized, attachment.origin);
        }
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for attachment in self.attachments.drain(..) {
            device.destroy_image(attachment.normalized);
        }
    }
}
