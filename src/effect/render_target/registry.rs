//! Shared render target registry.
//!
//! Color targets declared with `shared` are owned by the registry and
//! reference counted by name. Every effect of a project receives the same
//! [`SharedRegistry`] at construction; containers only remember the name and
//! resolve the current image on use, so a resized shared target is observed
//! by every alias on its next lookup.

use std::sync::Arc;

use glam::{UVec2, Vec2};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::format::{ImageExtent, full_mip_chain};
use crate::device::{ImageDesc, ImageHandle, RenderDevice};
use crate::errors::Result;

/// Handle to the registry shared by all effects of one project.
pub type SharedRegistry = Arc<Mutex<RenderTargetRegistry>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SharedRenderTarget {
    pub image: ImageHandle,
    pub desc: ImageDesc,
    pub scale: Option<Vec2>,
    references: u32,
    /// Mip count of the first declaration, before clamping to a size.
    requested_mips: u32,
}

impl SharedRenderTarget {
    #[inline]
    #[must_use]
    pub fn references(&self) -> u32 {
        self.references
    }
}

#[derive(Debug, Default)]
pub struct RenderTargetRegistry {
    targets: FxHashMap<String, SharedRenderTarget>,
}

impl RenderTargetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh registry behind the shared handle.
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SharedRenderTarget> {
        self.targets.get(name)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    #[must_use]
    pub fn references(&self, name: &str) -> u32 {
        self.targets.get(name).map_or(0, SharedRenderTarget::references)
    }

    /// Adds a reference to `name`, creating its image from `desc` when this
    /// is the first declaration. Later declarations alias the existing image
    /// regardless of their own description.
    pub fn acquire(
        &mut self,
        device: &mut dyn RenderDevice,
        name: &str,
        desc: &ImageDesc,
        scale: Option<Vec2>,
        label: &str,
    ) -> Result<ImageHandle> {
        if let Some(target) = self.targets.get_mut(name) {
            target.references += 1;
            log::debug!(
                "Shared render target \"{name}\" aliased ({} references)",
                target.references
            );
            return Ok(target.image);
        }
        let image = device.create_image(desc, label)?;
        self.targets.insert(
            name.to_string(),
            SharedRenderTarget {
                image,
                desc: *desc,
                scale,
                references: 1,
                requested_mips: desc.mip_level_count,
            },
        );
        Ok(image)
    }

    /// Drops one reference. The image is destroyed with the last one.
    pub fn release(&mut self, device: &mut dyn RenderDevice, name: &str) {
        let Some(target) = self.targets.get_mut(name) else {
            return;
        };
        target.references = target.references.saturating_sub(1);
        if target.references == 0
            && let Some(target) = self.targets.remove(name)
        {
            device.destroy_image(target.image);
        }
    }

    /// Recreates viewport relative targets whose size no longer matches.
    /// The mip count is clamped to the new size. Returns the names that
    /// received a new image.
    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        viewport: UVec2,
        label: impl Fn(&str) -> String,
    ) -> Result<Vec<String>> {
        let mut resized = Vec::new();
        for (name, target) in &mut self.targets {
            let Some(scale) = target.scale else {
                continue;
            };
            let size = ImageExtent::scaled(viewport, scale).size_2d();
            if size == UVec2::new(target.desc.width, target.desc.height) {
                continue;
            }
            let mip_level_count = if target.desc.sample_count > 1 {
                1
            } else {
                target.requested_mips.clamp(1, full_mip_chain(size, u32::MAX))
            };
            let desc = ImageDesc {
                width: size.x,
                height: size.y,
                mip_level_count,
                ..target.desc
            };
            let image = device.create_image(&desc, &label(name))?;
            device.destroy_image(target.image);
            target.image = image;
            target.desc = desc;
            resized.push(name.clone());
        }
        Ok(resized)
    }
}
