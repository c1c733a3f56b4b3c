use crate::device::{ImageDesc, ImageHandle, RenderDevice};
use crate::errors::Result;

/// Fills the mip levels of a render target from its base level.
///
/// The base image is blitted into a chain of half sized intermediates, and
/// each intermediate is copied into the matching level of the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipmapGenerator {
    chain: Vec<ImageHandle>,
}

impl MipmapGenerator {
    pub fn new(device: &mut dyn RenderDevice, desc: &ImageDesc, label: &str) -> Result<Self> {
        let mut chain = Vec::with_capacity(desc.mip_level_count.saturating_sub(1) as usize);
        for level in 1..desc.mip_level_count {
            let level_desc = ImageDesc::render_target(
                (desc.width >> level).max(1),
                (desc.height >> level).max(1),
                desc.format,
                1,
            );
            match device.create_image(&level_desc, &format!("{label}/Mipmap/{level}")) {
                Ok(image) => chain.push(image),
                Err(error) => {
                    for image in chain {
                        device.destroy_image(image);
                    }
                    return Err(error);
                }
            }
        }
        Ok(Self { chain })
    }

    #[inline]
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.chain.len() + 1
    }

    pub fn generate(&self, device: &mut dyn RenderDevice, image: ImageHandle) {
        let mut source = image;
        for (level, &intermediate) in (1u32..).zip(&self.chain) {
            device.blit(source, intermediate);
            device.copy_to_mip_level(intermediate, image, level);
            source = intermediate;
        }
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        for image in self.chain.drain(..) {
            device.destroy_image(image);
        }
    }
}
