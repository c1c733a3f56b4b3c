//! Effect Resources
//!
//! Images an effect owns or aliases after upload:
//!
//! - render color targets, with per-drawable clones of the owned ones
//! - depth-stencil targets
//! - offscreen render targets and their `DefaultEffect` options
//! - image resources, animated textures and `TEXTUREVALUE` arrays
//! - multisampled depth images allocated when a script clears an
//!   anti-aliased target paired with a single-sampled depth
//!
//! Name lookups go through the drawable clones first, then the effect's own
//! containers, then offscreen targets.

use glam::{UVec2, Vec4};
use rustc_hash::FxHashMap;

use super::parameters::ParameterStore;
use super::render_target::format::{color_format, depth_format};
use super::render_target::{
    Attachment, ColorContainer, DefaultExtent, DepthStencilContainer, RenderTargetRegistry,
    determine_image_size, determine_mip_levels,
};
use super::semantic::{AnimatedTextureDecl, ImageResourceDecl};
use crate::bundle::{Annotations, ParameterSource};
use crate::device::{ImageDesc, ImageHandle, RenderDevice};
use crate::errors::{EffectError, Result};
use crate::scene::{DecodedImage, DrawableId, FrameContext, ImageResourceProvider, TargetImages};
use crate::settings::EffectSettings;

// ─── Offscreen Render Targets ────────────────────────────────────────────────

/// One `pattern=effect` entry of `DefaultEffect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffscreenCondition {
    pub pattern: String,
    pub effect: String,
}

impl OffscreenCondition {
    /// `self` matches the owner of the offscreen target; other patterns are
    /// case-insensitive wildcards over the drawable file name.
    #[must_use]
    pub fn matches(&self, file_name: &str, is_owner: bool) -> bool {
        if self.pattern.eq_ignore_ascii_case("self") {
            is_owner
        } else {
            wildcard_matches(&self.pattern, file_name)
        }
    }
}

/// `*` and `?` wildcard match, ignoring ASCII case.
#[must_use]
pub fn wildcard_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Host-facing description of an `OFFSCREENRENDERTARGET`.
#[derive(Debug, Clone, PartialEq)]
pub struct OffscreenRenderTargetOption {
    pub name: String,
    pub description: String,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub anti_alias: bool,
    /// `DefaultEffect` entries in declaration order.
    pub conditions: Vec<OffscreenCondition>,
}

impl OffscreenRenderTargetOption {
    #[must_use]
    pub fn from_annotations(name: &str, annotations: &Annotations) -> Self {
        Self {
            name: name.to_string(),
            description: annotations
                .string("description")
                .unwrap_or_default()
                .to_string(),
            clear_color: annotations
                .vec4("clearcolor")
                .map_or(Vec4::new(0.0, 0.0, 0.0, 1.0), |color| {
                    color.clamp(Vec4::ZERO, Vec4::ONE)
                }),
            clear_depth: annotations
                .float("cleardepth")
                .map_or(1.0, |depth| depth.clamp(0.0, 1.0)),
            anti_alias: annotations.bool("antialias").unwrap_or(false),
            conditions: annotations
                .string("defaulteffect")
                .map(parse_default_effect)
                .unwrap_or_default(),
        }
    }

    /// Effect the host should assign to `file_name` when drawing into this
    /// target. The first matching condition wins.
    #[must_use]
    pub fn effect_for(&self, file_name: &str, is_owner: bool) -> Option<&str> {
        self.conditions
            .iter()
            .find(|condition| condition.matches(file_name, is_owner))
            .map(|condition| condition.effect.as_str())
    }
}

/// Parses `"self = hide; *.pmx = outline.fx; * = none"`.
#[must_use]
pub fn parse_default_effect(source: &str) -> Vec<OffscreenCondition> {
    source
        .split(';')
        .filter_map(|entry| {
            let (pattern, effect) = entry.split_once('=')?;
            let pattern = pattern.trim();
            let effect = effect.trim();
            (!pattern.is_empty()).then(|| OffscreenCondition {
                pattern: pattern.to_string(),
                effect: effect.to_string(),
            })
        })
        .collect()
}

#[derive(Debug)]
pub struct OffscreenRenderTarget {
    pub option: OffscreenRenderTargetOption,
    pub(crate) color: ColorContainer,
    pub(crate) depth: DepthStencilContainer,
}

// ─── Image Resources ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoadedImage {
    resource_name: String,
    image: ImageHandle,
    size: UVec2,
}

#[derive(Debug, Clone, PartialEq)]
struct AnimatedTexture {
    decl: AnimatedTextureDecl,
    image: Option<LoadedImage>,
}

// ─── Resources ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct EffectResources {
    pub(crate) color_targets: FxHashMap<String, ColorContainer>,
    pub(crate) drawable_color_targets: FxHashMap<DrawableId, FxHashMap<String, ColorContainer>>,
    pub(crate) depth_targets: FxHashMap<String, DepthStencilContainer>,
    pub(crate) offscreen_targets: FxHashMap<String, OffscreenRenderTarget>,
    offscreen_order: Vec<String>,
    images: FxHashMap<String, LoadedImage>,
    animated: Vec<AnimatedTexture>,
    pub(crate) texture_values: FxHashMap<String, Vec<Vec4>>,
    /// Keyed by technique label.
    msaa_depth: FxHashMap<String, DepthStencilContainer>,
}

/// Description of a declared color image sized against `viewport`.
fn color_desc(
    annotations: &Annotations,
    viewport: &TargetImages,
    settings: &EffectSettings,
    anti_alias: bool,
) -> (ImageDesc, Option<glam::Vec2>) {
    let extent = determine_image_size(annotations, viewport.size, DefaultExtent::Viewport);
    let size = extent.size_2d();
    let format = color_format(annotations, settings.default_color_format);
    let sample_count = if anti_alias { viewport.sample_count.max(1) } else { 1 };
    let mut desc = ImageDesc::render_target(size.x, size.y, format, sample_count);
    if sample_count == 1 {
        desc.mip_level_count = determine_mip_levels(annotations, size, 1, settings.max_mipmaps);
    }
    (desc, extent.scale)
}

fn check_extent(what: &str, width: u32, height: u32, settings: &EffectSettings) -> Result<()> {
    let largest = width.max(height);
    if largest > settings.max_image_dimension {
        return Err(EffectError::ExceedsLimits {
            what: what.to_string(),
            actual: largest,
            limit: settings.max_image_dimension,
            hint: "Reduce the image size or use a viewport ratio.".to_string(),
        });
    }
    Ok(())
}

impl EffectResources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Creation ───

    pub fn create_color_target(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &mut RenderTargetRegistry,
        parameter: &ParameterSource,
        viewport: &TargetImages,
        settings: &EffectSettings,
        label: &str,
    ) -> Result<()> {
        let annotations = &parameter.annotations;
        let anti_alias = annotations.bool("antialias").unwrap_or(false);
        let (desc, scale) = color_desc(annotations, viewport, settings, anti_alias);
        check_extent(&parameter.name, desc.width, desc.height, settings)?;
        let container = ColorContainer::create(
            device,
            registry,
            &parameter.name,
            desc,
            scale,
            anti_alias,
            parameter.shared,
            label,
        )?;
        if let Some(mut previous) = self.color_targets.insert(parameter.name.clone(), container) {
            previous.destroy(device, registry);
        }
        Ok(())
    }

    pub fn create_depth_target(
        &mut self,
        device: &mut dyn RenderDevice,
        parameter: &ParameterSource,
        viewport: &TargetImages,
        settings: &EffectSettings,
    ) -> Result<()> {
        let annotations = &parameter.annotations;
        let extent = determine_image_size(annotations, viewport.size, DefaultExtent::Viewport);
        let size = extent.size_2d();
        check_extent(&parameter.name, size.x, size.y, settings)?;
        let format = depth_format(annotations, settings.default_depth_format);
        let desc = ImageDesc::render_target(size.x, size.y, format, 1);
        let container = DepthStencilContainer::new(&parameter.name, desc, extent.scale);
        if let Some(mut previous) = self.depth_targets.insert(parameter.name.clone(), container) {
            previous.destroy(device);
        }
        Ok(())
    }

    pub fn create_offscreen_target(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &mut RenderTargetRegistry,
        parameter: &ParameterSource,
        viewport: &TargetImages,
        settings: &EffectSettings,
        label: &str,
    ) -> Result<()> {
        let option = OffscreenRenderTargetOption::from_annotations(&parameter.name, &parameter.annotations);
        let (desc, scale) = color_desc(&parameter.annotations, viewport, settings, option.anti_alias);
        check_extent(&parameter.name, desc.width, desc.height, settings)?;
        let color = ColorContainer::create(
            device,
            registry,
            &parameter.name,
            desc,
            scale,
            option.anti_alias,
            parameter.shared,
            label,
        )?;
        let desc = color.desc(registry);
        let depth = DepthStencilContainer::new(
            &parameter.name,
            ImageDesc::render_target(desc.width, desc.height, settings.default_depth_format, 1),
            scale,
        );
        log::debug!(
            "Offscreen render target \"{}\" ({}x{}, {} conditions)",
            parameter.name,
            desc.width,
            desc.height,
            option.conditions.len()
        );
        if !self.offscreen_order.contains(&parameter.name) {
            self.offscreen_order.push(parameter.name.clone());
        }
        let target = OffscreenRenderTarget { option, color, depth };
        if let Some(mut previous) = self.offscreen_targets.insert(parameter.name.clone(), target) {
            previous.color.destroy(device, registry);
            previous.depth.destroy(device);
        }
        Ok(())
    }

    // ─── Lookup ───

    #[must_use]
    pub fn find_color(&self, drawable: Option<DrawableId>, name: &str) -> Option<&ColorContainer> {
        drawable
            .and_then(|id| self.drawable_color_targets.get(&id))
            .and_then(|targets| targets.get(name))
            .or_else(|| self.color_targets.get(name))
            .or_else(|| self.offscreen_targets.get(name).map(|target| &target.color))
    }

    pub fn find_color_mut(&mut self, drawable: Option<DrawableId>, name: &str) -> Option<&mut ColorContainer> {
        if let Some(id) = drawable
            && self
                .drawable_color_targets
                .get(&id)
                .is_some_and(|targets| targets.contains_key(name))
        {
            return self
                .drawable_color_targets
                .get_mut(&id)
                .and_then(|targets| targets.get_mut(name));
        }
        if self.color_targets.contains_key(name) {
            return self.color_targets.get_mut(name);
        }
        self.offscreen_targets
            .get_mut(name)
            .map(|target| &mut target.color)
    }

    pub fn find_depth_mut(&mut self, name: &str) -> Option<&mut DepthStencilContainer> {
        self.depth_targets.get_mut(name)
    }

    /// Image sampled through the texture uniform `uniform`.
    #[must_use]
    pub fn image_for_uniform(
        &self,
        registry: &RenderTargetRegistry,
        drawable: Option<DrawableId>,
        uniform: &str,
    ) -> Option<ImageHandle> {
        if let Some(loaded) = self.images.get(uniform) {
            return Some(loaded.image);
        }
        if let Some(loaded) = self
            .animated
            .iter()
            .find(|texture| texture.decl.uniform == uniform)
            .and_then(|texture| texture.image.as_ref())
        {
            return Some(loaded.image);
        }
        self.find_color(drawable, uniform)
            .and_then(|container| container.image(registry))
    }

    #[must_use]
    pub fn offscreen_options(&self) -> Vec<&OffscreenRenderTargetOption> {
        self.offscreen_order
            .iter()
            .filter_map(|name| self.offscreen_targets.get(name))
            .map(|target| &target.option)
            .collect()
    }

    /// Color and depth images the host renders an offscreen pass into.
    pub fn offscreen_target_images(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &RenderTargetRegistry,
        name: &str,
        label: &str,
    ) -> Option<TargetImages> {
        let target = self.offscreen_targets.get_mut(name)?;
        let color = target.color.attachment(registry)?;
        let depth = target
            .depth
            .find_image(device, color.size, color.sample_count, label);
        Some(TargetImages {
            color: color.image,
            depth: depth.as_ref().map(|attachment| attachment.image),
            color_format: color.format,
            depth_format: target.depth.desc().format,
            sample_count: color.sample_count,
            size: color.size,
        })
    }

    /// Depth image matching a multisampled color target, cached per
    /// technique.
    pub fn msaa_depth(
        &mut self,
        device: &mut dyn RenderDevice,
        label: &str,
        size: UVec2,
        sample_count: u32,
        format: wgpu::TextureFormat,
    ) -> Option<Attachment> {
        self.msaa_depth
            .entry(label.to_string())
            .or_insert_with(|| {
                DepthStencilContainer::new(
                    label,
                    ImageDesc::render_target(size.x, size.y, format, sample_count),
                    None,
                )
            })
            .find_image(device, size, sample_count, label)
    }

    // ─── Image Resources ───

    fn upload_image(
        device: &mut dyn RenderDevice,
        decoded: &DecodedImage,
        resource_name: &str,
        settings: &EffectSettings,
        label: &str,
    ) -> Result<LoadedImage> {
        check_extent(&format!("Image \"{resource_name}\""), decoded.width, decoded.height, settings)?;
        let desc = ImageDesc::texture(decoded.width, decoded.height, decoded.format);
        let image = device.create_image(&desc, label)?;
        device.write_image(image, &decoded.data);
        Ok(LoadedImage {
            resource_name: resource_name.to_string(),
            image,
            size: UVec2::new(decoded.width, decoded.height),
        })
    }

    /// Loads texture resources, animated textures and texel arrays through
    /// `provider`, polling its cancellation flag before every fetch.
    pub fn load_images(
        &mut self,
        device: &mut dyn RenderDevice,
        provider: &mut dyn ImageResourceProvider,
        image_resources: &[ImageResourceDecl],
        animated_textures: &[AnimatedTextureDecl],
        texture_values: &[(String, String)],
        settings: &EffectSettings,
        label: impl Fn(&str) -> String,
    ) -> Result<()> {
        for decl in image_resources {
            if provider.is_cancelled() {
                return Err(EffectError::Cancelled);
            }
            match provider.load_image(&decl.resource_name) {
                Some(decoded) => {
                    let loaded =
                        Self::upload_image(device, &decoded, &decl.resource_name, settings, &label(&decl.resource_name))?;
                    if let Some(previous) = self.images.insert(decl.uniform.clone(), loaded) {
                        device.destroy_image(previous.image);
                    }
                }
                None => log::warn!(
                    "Image \"{}\" of \"{}\" cannot be loaded",
                    decl.resource_name,
                    decl.uniform
                ),
            }
        }
        for texture in self.animated.drain(..) {
            if let Some(loaded) = texture.image {
                device.destroy_image(loaded.image);
            }
        }
        for decl in animated_textures {
            if provider.is_cancelled() {
                return Err(EffectError::Cancelled);
            }
            let image = match provider.seek_animated_image(&decl.resource_name, decl.offset) {
                Some(decoded) => Some(Self::upload_image(
                    device,
                    &decoded,
                    &decl.resource_name,
                    settings,
                    &label(&decl.resource_name),
                )?),
                None => {
                    log::warn!("Animated texture \"{}\" cannot be loaded", decl.resource_name);
                    None
                }
            };
            self.animated.push(AnimatedTexture {
                decl: decl.clone(),
                image,
            });
        }
        for (uniform, resource_name) in texture_values {
            if provider.is_cancelled() {
                return Err(EffectError::Cancelled);
            }
            match provider.load_image(resource_name) {
                Some(decoded) => {
                    self.texture_values.insert(uniform.clone(), decoded.texels());
                }
                None => log::warn!("Texture value source \"{resource_name}\" of \"{uniform}\" cannot be loaded"),
            }
        }
        Ok(())
    }

    /// Seeks every animated texture to the current time and uploads the
    /// frame. The seek variable, when declared, replaces the uptime.
    pub fn update_animated_textures(
        &mut self,
        device: &mut dyn RenderDevice,
        provider: &mut dyn ImageResourceProvider,
        parameters: &ParameterStore,
        frame: &FrameContext,
        label: impl Fn(&str) -> String,
    ) {
        for texture in &mut self.animated {
            let decl = &texture.decl;
            let base = decl
                .seek_variable
                .as_deref()
                .and_then(|name| parameters.get(name))
                .map_or(frame.uptime, |value| value.first().x);
            let seconds = base * decl.speed + decl.offset;
            let Some(decoded) = provider.seek_animated_image(&decl.resource_name, seconds) else {
                continue;
            };
            let size = UVec2::new(decoded.width, decoded.height);
            match &texture.image {
                Some(loaded) if loaded.size == size => device.write_image(loaded.image, &decoded.data),
                _ => {
                    let desc = ImageDesc::texture(decoded.width, decoded.height, decoded.format);
                    match device.create_image(&desc, &label(&decl.resource_name)) {
                        Ok(image) => {
                            device.write_image(image, &decoded.data);
                            let previous = texture.image.replace(LoadedImage {
                                resource_name: decl.resource_name.clone(),
                                image,
                                size,
                            });
                            if let Some(previous) = previous {
                                device.destroy_image(previous.image);
                            }
                        }
                        Err(error) => log::warn!(
                            "Animated texture \"{}\" cannot be recreated: {error}",
                            decl.resource_name
                        ),
                    }
                }
            }
        }
    }

    /// Resource names of every image the effect loaded or requested.
    #[must_use]
    pub fn image_resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .images
            .values()
            .map(|loaded| loaded.resource_name.clone())
            .chain(self.animated.iter().map(|texture| texture.decl.resource_name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    // ─── Maintenance ───

    /// Clones every owned color target for `drawable`. A drawable that
    /// already has clones keeps them.
    pub fn create_drawable_targets(
        &mut self,
        device: &mut dyn RenderDevice,
        drawable: DrawableId,
        label: impl Fn(&str) -> String,
    ) -> Result<()> {
        if self.drawable_color_targets.contains_key(&drawable) {
            return Ok(());
        }
        let mut clones = FxHashMap::default();
        for (name, container) in &self.color_targets {
            if let Some(clone) = container.clone_for_drawable(device, &label(name))? {
                clones.insert(name.clone(), clone);
            }
        }
        log::debug!("Cloned {} render targets for drawable {}", clones.len(), drawable.0);
        self.drawable_color_targets.insert(drawable, clones);
        Ok(())
    }

    pub fn destroy_drawable_targets(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &mut RenderTargetRegistry,
        drawable: DrawableId,
    ) {
        if let Some(targets) = self.drawable_color_targets.remove(&drawable) {
            for (_, mut container) in targets {
                container.destroy(device, registry);
            }
        }
    }

    /// Follows a new viewport size and sample count. Shared images are
    /// resized by the registry beforehand.
    pub fn resize(
        &mut self,
        device: &mut dyn RenderDevice,
        registry: &RenderTargetRegistry,
        viewport: UVec2,
        sample_count: u32,
        settings: &EffectSettings,
        label: impl Fn(&str) -> String,
    ) -> Result<()> {
        let containers = self
            .color_targets
            .values_mut()
            .chain(self.drawable_color_targets.values_mut().flat_map(|targets| targets.values_mut()))
            .chain(self.offscreen_targets.values_mut().map(|target| &mut target.color));
        for container in containers {
            let name = container.name().to_string();
            container.resize(device, registry, viewport, sample_count, settings.max_mipmaps, &label(&name))?;
        }
        for depth in self.depth_targets.values_mut() {
            depth.resize(device, viewport);
        }
        for target in self.offscreen_targets.values_mut() {
            target.depth.resize(device, viewport);
        }
        for (_, mut depth) in self.msaa_depth.drain() {
            depth.destroy(device);
        }
        Ok(())
    }

    /// Rebuilds the mip chain of every container written since the last
    /// call.
    pub fn generate_mipmaps(&mut self, device: &mut dyn RenderDevice, registry: &RenderTargetRegistry) {
        let containers = self
            .color_targets
            .values_mut()
            .chain(self.drawable_color_targets.values_mut().flat_map(|targets| targets.values_mut()))
            .chain(self.offscreen_targets.values_mut().map(|target| &mut target.color));
        for container in containers {
            container.generate_mipmaps(device, registry);
        }
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice, registry: &mut RenderTargetRegistry) {
        for (_, mut container) in self.color_targets.drain() {
            container.destroy(device, registry);
        }
        for (_, targets) in self.drawable_color_targets.drain() {
            for (_, mut container) in targets {
                container.destroy(device, registry);
            }
        }
        for (_, mut depth) in self.depth_targets.drain() {
            depth.destroy(device);
        }
        for (_, mut target) in self.offscreen_targets.drain() {
            target.color.destroy(device, registry);
            target.depth.destroy(device);
        }
        self.offscreen_order.clear();
        for (_, mut depth) in self.msaa_depth.drain() {
            depth.destroy(device);
        }
        for (_, loaded) in self.images.drain() {
            device.destroy_image(loaded.image);
        }
        for texture in self.animated.drain(..) {
            if let Some(loaded) = texture.image {
                device.destroy_image(loaded.image);
            }
        }
        self.texture_values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::AnnotationValue;

    fn annotations(entries: &[(&str, AnnotationValue)]) -> Annotations {
        entries.iter().cloned().collect()
    }

    #[test]
    fn offscreen_option_defaults_and_clamps() {
        let option = OffscreenRenderTargetOption::from_annotations("Mirror", &Annotations::new());
        assert_eq!(option.clear_color, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(option.clear_depth, 1.0);
        assert!(!option.anti_alias);
        assert!(option.conditions.is_empty());

        let option = OffscreenRenderTargetOption::from_annotations(
            "Mirror",
            &annotations(&[
                ("ClearColor", AnnotationValue::Vector(Vec4::new(2.0, 0.5, -1.0, 1.0))),
                ("ClearDepth", AnnotationValue::Float(3.0)),
                ("Description", AnnotationValue::String("mirror".into())),
            ]),
        );
        assert_eq!(option.clear_color, Vec4::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(option.clear_depth, 1.0);
        assert_eq!(option.description, "mirror");
    }

    #[test]
    fn default_effect_pairs_are_trimmed() {
        let conditions = parse_default_effect(" self = hide ; *.pmx=outline.fx;*=none");
        let pairs: Vec<(&str, &str)> = conditions
            .iter()
            .map(|condition| (condition.pattern.as_str(), condition.effect.as_str()))
            .collect();
        assert_eq!(pairs, [("self", "hide"), ("*.pmx", "outline.fx"), ("*", "none")]);
    }

    #[test]
    fn first_matching_condition_selects_the_effect() {
        let option = OffscreenRenderTargetOption {
            name: "Glow".into(),
            description: String::new(),
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            anti_alias: false,
            conditions: parse_default_effect("self=hide;Miku*.pmx=glow.fx;*=none;"),
        };
        assert_eq!(option.effect_for("stage.x", true), Some("hide"));
        assert_eq!(option.effect_for("miku_v2.PMX", false), Some("glow.fx"));
        assert_eq!(option.effect_for("stage.x", false), Some("none"));
    }

    #[test]
    fn wildcards_match_any_run() {
        assert!(wildcard_matches("*", ""));
        assert!(wildcard_matches("a*c", "abbbc"));
        assert!(wildcard_matches("a?c", "abc"));
        assert!(!wildcard_matches("a?c", "ac"));
        assert!(!wildcard_matches("*.pmd", "model.pmx"));
    }
}
