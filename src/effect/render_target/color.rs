use glam::{UVec2, Vec2};

use super::format::{ImageExtent, full_mip_chain};
use super::mipmap::MipmapGenerator;
use super::registry::RenderTargetRegistry;
use super::state::Attachment;
use crate::device::{ImageDesc, ImageHandle, RenderDevice};
use crate::errors::Result;

/// A declared color render target.
///
/// Owned containers hold their image directly. Shared containers hold only
/// their name; the image lives in the [`RenderTargetRegistry`].
#[derive(Debug)]
pub struct ColorContainer {
    name: String,
    desc: ImageDesc,
    scale: Option<Vec2>,
    anti_alias: bool,
    shared: bool,
    image: Option<ImageHandle>,
    mipmap: Option<MipmapGenerator>,
    label: String,
    dirty: bool,
}

impl ColorContainer {
    pub fn create(
        device: &mut dyn RenderDevice,
        registry: &mut RenderTargetRegistry,
        name: &str,
        desc: ImageDesc,
        scale: Option<Vec2>,
        anti_alias: bool,
        shared: bool,
        label: &str,
    ) -> Result<Self> {
        let (image, desc) = if shared {
            registry.acquire(device, name, &desc, scale, label)?;
            let desc = registry.get(name).map_or(desc, |target| target.desc);
            (None, desc)
        } else {
            (Some(device.create_image(&desc, label)?), desc)
        };
        let mut container = Self {
            name: name.to_string(),
            desc,
            scale,
            anti_alias,
            shared,
            image,
            mipmap: None,
            label: label.to_string(),
            dirty: false,
        };
        container.create_mipmap(device)?;
        Ok(container)
    }

    fn create_mipmap(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        if let Some(mut mipmap) = self.mipmap.take() {
            mipmap.destroy(device);
        }
        if self.desc.mip_level_count > 1 && self.desc.sample_count == 1 {
            self.mipmap = Some(MipmapGenerator::new(device, &self.desc, &self.label)?);
        }
        Ok(())
    }

    /// Adopts the registry's current description of a shared target,
    /// rebuilding the mip generator when it changed.
    fn sync_shared(&mut self, device: &mut dyn RenderDevice, registry: &RenderTargetRegistry) -> Result<bool> {
        let Some(target) = registry.get(&self.name) else {
            return Ok(false);
        };
        if target.desc == self.desc {
            return Ok(false);
        }
        self.desc = target.desc;
        self.create_mipmap(device)?;
        Ok(true)
    }

    /// Independent copy for one drawable. Shared containers are never
    /// cloned.
    pub fn clone_for_drawable(&self, device: &mut dyn RenderDevice, label: &str) -> Result<Option<Self>> {
        if self.shared {
            return Ok(None);
        }
        let mut container = Self {
            name: self.name.clone(),
            desc: self.desc,
            scale: self.scale,
            anti_alias: self.anti_alias,
            shared: false,
            image: Some(device.create_image(&self.desc, label)?),
            mipmap: None,
            label: label.to_string(),
            dirty: false,
        };
        container.create_mipmap(device)?;
        Ok(Some(container))
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Option<Vec2> {
        self.scale
    }

    /// Current description, following the registry for shared targets.
    #[must_use]
    pub fn desc(&self, registry: &RenderTargetRegistry) -> ImageDesc {
        if self.shared {
            registry.get(&self.name).map_or(self.desc, |target| target.desc)
        } else {
            self.desc
        }
    }

    #[must_use]
    pub fn image(&self, registry: &RenderTargetRegistry) -> Option<ImageHandle> {
        if self.shared {
            registry.get(&self.name).map(|target| target.image)
        } else {
            self.image
        }
    }

    #[must_use]
    pub fn attachment(&self, registry: &RenderTargetRegistry) -> Option<Attachment> {
        let desc = self.desc(registry);
        self.image(registry).map(|image| Attachment {
            image,
            format: desc.format,
            sample_count: desc.sample_count,
            size: UVec2::new(desc.width, desc.height),
            name: Some(self.name.clone()),
            mip_level_count: desc.mip_level_count,
        })
    }

    /// Follows the viewport for scaled owned containers. Shared targets are
    /// resized by the registry and only pick up its new description here.
    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &RenderTargetRegistry,
        viewport: UVec2,
        sample_count: u32,
        max_mipmaps: u32,
        label: &str,
    ) -> Result<bool> {
        if self.shared {
            return self.sync_shared(device, registry);
        }
        let mut desc = self.desc;
        if let Some(scale) = self.scale {
            let size = ImageExtent::scaled(viewport, scale).size_2d();
            desc.width = size.x;
            desc.height = size.y;
        }
        if self.anti_alias {
            desc.sample_count = sample_count.max(1);
        }
        if desc == self.desc {
            return Ok(false);
        }
        desc.mip_level_count = if desc.sample_count > 1 {
            1
        } else {
            let full_chain = full_mip_chain(UVec2::new(desc.width, desc.height), max_mipmaps);
            desc.mip_level_count.clamp(1, full_chain)
        };

        let image = device.create_image(&desc, label)?;
        if let Some(previous) = self.image.replace(image) {
            device.destroy_image(previous);
        }
        self.desc = desc;
        self.label = label.to_string();
        self.create_mipmap(device)?;
        Ok(true)
    }

    /// Marks the base level as written so mips are rebuilt.
    #[inline]
    pub fn mark_dirty(&mut self) {
        if self.mipmap.is_some() {
            self.dirty = true;
        }
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn generate_mipmaps(&mut self, device: &mut dyn RenderDevice, registry: &RenderTargetRegistry) {
        if !self.dirty {
            return;
        }
        // Another effect may have resized a shared target since the last
        // call.
        if self.shared
            && let Err(error) = self.sync_shared(device, registry)
        {
            log::warn!("Render target \"{}\": mip chain rebuild failed: {error}", self.name);
            self.dirty = false;
            return;
        }
        if let (Some(mipmap), Some(image)) = (&self.mipmap, self.image(registry)) {
            mipmap.generate(device, image);
        }
        self.dirty = false;
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice, registry: &mut RenderTargetRegistry) {
        if let Some(mut mipmap) = self.mipmap.take() {
            mipmap.destroy(device);
        }
        if self.shared {
            registry.release(device, &self.name);
            self.shared = false;
        } else if let Some(image) = self.image.take() {
            device.destroy_image(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn mipmapped(width: u32, height: u32, levels: u32) -> ImageDesc {
        let mut desc = ImageDesc::render_target(width, height, wgpu::TextureFormat::Rgba8Unorm, 1);
        desc.mip_level_count = levels;
        desc
    }

    #[test]
    fn multisampled_resize_drops_mip_chain() {
        let mut device = RecordingDevice::new();
        let mut registry = RenderTargetRegistry::new();
        let mut container = ColorContainer::create(
            &mut device,
            &mut registry,
            "Blurred",
            mipmapped(64, 64, 4),
            Some(Vec2::ONE),
            true,
            false,
            "blurred",
        )
        .unwrap();
        let baseline = device.live_image_count();

        let resized = container
            .resize(&mut device, &registry, UVec2::new(64, 64), 4, 16, "blurred")
            .unwrap();
        assert!(resized);
        let desc = container.desc(&registry);
        assert_eq!(desc.sample_count, 4);
        assert_eq!(desc.mip_level_count, 1);

        // The three intermediates of the old chain are gone.
        assert_eq!(device.live_image_count(), baseline - 3);
        container.mark_dirty();
        assert!(!container.is_dirty());
    }

    #[test]
    fn shared_container_follows_registry_resize() {
        let mut device = RecordingDevice::new();
        let mut registry = RenderTargetRegistry::new();
        let mut container = ColorContainer::create(
            &mut device,
            &mut registry,
            "Glow",
            mipmapped(128, 128, 8),
            Some(Vec2::splat(0.5)),
            false,
            true,
            "glow",
        )
        .unwrap();

        registry
            .resize(&mut device, UVec2::new(64, 64), |name| name.to_string())
            .unwrap();
        let resized = container
            .resize(&mut device, &registry, UVec2::new(64, 64), 1, 16, "glow")
            .unwrap();
        assert!(resized);
        assert_eq!(container.desc(&registry).mip_level_count, 6);
        assert_eq!(container.mipmap.as_ref().map(MipmapGenerator::level_count), Some(6));
    }
}
