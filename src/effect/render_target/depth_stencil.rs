use glam::{UVec2, Vec2};
use rustc_hash::FxHashMap;

use super::format::ImageExtent;
use super::state::Attachment;
use crate::device::{ImageDesc, ImageHandle, RenderDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DepthImageKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    sample_count: u32,
    mip_level_count: u32,
}

impl From<&ImageDesc> for DepthImageKey {
    fn from(desc: &ImageDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            sample_count: desc.sample_count,
            mip_level_count: desc.mip_level_count,
        }
    }
}

/// A declared depth-stencil target.
///
/// Depth images must match the size and sample count of the color target
/// they are paired with, so one image is kept per combination in use.
#[derive(Debug)]
pub struct DepthStencilContainer {
    name: String,
    desc: ImageDesc,
    scale: Option<Vec2>,
    images: FxHashMap<DepthImageKey, ImageHandle>,
}

impl DepthStencilContainer {
    #[must_use]
    pub fn new(name: &str, desc: ImageDesc, scale: Option<Vec2>) -> Self {
        Self {
            name: name.to_string(),
            desc,
            scale,
            images: FxHashMap::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn desc(&self) -> &ImageDesc {
        &self.desc
    }

    /// Depth image for a color target of `size` and `sample_count`. Zero
    /// values keep the declared ones.
    pub fn find_image(
        &mut self,
        device: &mut dyn RenderDevice,
        size: UVec2,
        sample_count: u32,
        label: &str,
    ) -> Option<Attachment> {
        let mut desc = self.desc;
        if size.x > 0 && size.y > 0 {
            desc.width = size.x;
            desc.height = size.y;
        }
        if sample_count > 0 {
            desc.sample_count = sample_count;
        }
        let key = DepthImageKey::from(&desc);
        let image = match self.images.get(&key) {
            Some(&image) => image,
            None => match device.create_image(&desc, label) {
                Ok(image) => {
                    self.images.insert(key, image);
                    image
                }
                Err(error) => {
                    log::warn!("Depth target \"{}\" cannot be created: {error}", self.name);
                    return None;
                }
            },
        };
        Some(Attachment {
            image,
            format: desc.format,
            sample_count: desc.sample_count,
            size: UVec2::new(desc.width, desc.height),
            name: Some(self.name.clone()),
            mip_level_count: desc.mip_level_count,
        })
    }

    /// Follows the viewport when declared relative to it. Cached images are
    /// dropped so they are recreated at the new size.
    pub fn resize(&mut self, device: &mut dyn RenderDevice, viewport: UVec2) {
        let Some(scale) = self.scale else {
            return;
        };
        let size = ImageExtent::scaled(viewport, scale).size_2d();
        if size == UVec2::new(self.desc.width, self.desc.height) {
            return;
        }
        self.desc.width = size.x;
        self.desc.height = size.y;
        self.destroy(device);
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for (_, image) in self.images.drain() {
            device.destroy_image(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    #[test]
    fn images_are_cached_per_size_and_sample_count() {
        let mut device = RecordingDevice::new();
        let desc = ImageDesc::render_target(256, 256, wgpu::TextureFormat::Depth24PlusStencil8, 1);
        let mut container = DepthStencilContainer::new("Depth", desc, None);
        let a = container.find_image(&mut device, UVec2::ZERO, 0, "d").unwrap();
        let b = container.find_image(&mut device, UVec2::ZERO, 0, "d").unwrap();
        let msaa = container.find_image(&mut device, UVec2::new(256, 256), 4, "d").unwrap();
        assert_eq!(a.image, b.image);
        assert_ne!(a.image, msaa.image);
        assert_eq!(msaa.sample_count, 4);
        assert_eq!(device.live_image_count(), 2);
        container.destroy(&mut device);
        assert_eq!(device.live_image_count(), 0);
    }
}
