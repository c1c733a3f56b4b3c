//! Effect Runtime
//!
//! An [`Effect`] is one uploaded effect bundle: its techniques and passes,
//! the semantic buckets filled at upload, the non-semantic parameter values,
//! the render targets and images it declared, and a built-in fallback effect
//! that draws whatever the bundle itself does not claim.
//!
//! ```text
//!            new()                    upload()                    per frame
//! bundle ──► techniques ──► route semantics ─► containers ──► find_technique()
//!                           compile shaders ─► load images        │
//!                                                              execute()
//! ```
//!
//! Lifecycle is `new` → `upload` → any number of `find_technique`/`execute`
//! pairs → `destroy`. Only `new` and `upload` can fail; per-frame work
//! degrades to fallbacks and logs instead.

pub mod binder;
pub mod control_object;
pub mod executor;
pub mod fallback;
pub mod normalizer;
pub mod parameters;
pub mod pass;
pub mod pipeline;
pub mod render_target;
pub mod resources;
pub mod script;
pub mod semantic;
pub mod subset;
pub mod technique;
pub mod uniform_buffer;

use glam::{UVec2, Vec4};
use rustc_hash::FxHashMap;

use crate::bundle::{EffectBundle, ParameterSource};
use crate::device::{DeviceFeatures, ImageHandle, RenderDevice};
use crate::errors::{EffectError, Result};
use crate::scene::{
    Drawable, DrawableId, DrawableKind, FrameContext, ImageResourceProvider, Material, TargetImages,
};
use crate::settings::EffectSettings;

use executor::{Runner, RunnerParts};
use normalizer::RenderTargetNormalizer;
use parameters::{ParameterStore, ParameterValue};
use pass::Pass;
use pipeline::ShaderCache;
use render_target::SharedRegistry;
use resources::{EffectResources, OffscreenRenderTargetOption};
use semantic::{ImageResourceDecl, ScriptClass, SemanticBuckets, SemanticRouter, StandardsGlobal};
use technique::{PassType, PipelineOverrides, Technique, TechniqueMatch};

pub use executor::{DrawContext, ExecutionSummary};

pub struct Effect {
    name: String,
    settings: EffectSettings,
    registry: SharedRegistry,
    legacy_matrix_convention: bool,
    parameter_sources: Vec<ParameterSource>,
    techniques: Vec<Technique>,
    buckets: SemanticBuckets,
    parameters: ParameterStore,
    resources: EffectResources,
    shaders: ShaderCache,
    /// Intermediate passes, keyed by the hash of the pass they stand in for.
    normalizers: FxHashMap<u64, RenderTargetNormalizer>,
    fallback: Option<Box<Effect>>,
    semantic_errors: Vec<String>,
    uploaded: bool,
    enabled: bool,
    script_external_color: Option<ImageHandle>,
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name)
            .field("techniques", &self.techniques.len())
            .field("parameters", &self.parameters.len())
            .field("uploaded", &self.uploaded)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl Effect {
    /// Validates `bundle` against the settings and the device and builds
    /// its techniques. No device object is created until [`Effect::upload`].
    pub fn new(
        name: &str,
        bundle: &EffectBundle,
        settings: EffectSettings,
        features: &DeviceFeatures,
        registry: SharedRegistry,
    ) -> Result<Self> {
        bundle.validate(&settings, features)?;
        let fallback = Self::build(
            &format!("{name}/Fallback"),
            &fallback::fallback_bundle(),
            settings.clone(),
            registry.clone(),
            None,
        );
        Ok(Self::build(
            name,
            bundle,
            settings,
            registry,
            Some(Box::new(fallback)),
        ))
    }

    fn build(
        name: &str,
        bundle: &EffectBundle,
        settings: EffectSettings,
        registry: SharedRegistry,
        fallback: Option<Box<Effect>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            settings,
            registry,
            legacy_matrix_convention: bundle.legacy_matrix_convention,
            parameter_sources: bundle.parameters.clone(),
            techniques: bundle.techniques.iter().map(Technique::new).collect(),
            buckets: SemanticBuckets::default(),
            parameters: ParameterStore::new(),
            resources: EffectResources::new(),
            shaders: ShaderCache::default(),
            normalizers: FxHashMap::default(),
            fallback,
            semantic_errors: Vec::new(),
            uploaded: false,
            enabled: false,
            script_external_color: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    // ─── Upload ──────────────────────────────────────────────────────────

    /// Routes parameters, creates the declared render targets, compiles
    /// every pass and loads image resources through `provider`.
    ///
    /// Semantic errors do not stop the upload: resources are still created,
    /// the messages are returned joined as [`EffectError::Semantic`] and the
    /// effect cannot be enabled. Cancellation through the provider stops at
    /// the next fetch and returns [`EffectError::Cancelled`].
    pub fn upload(
        &mut self,
        device: &mut dyn RenderDevice,
        provider: &mut dyn ImageResourceProvider,
        viewport: &TargetImages,
    ) -> Result<()> {
        // A previous upload may have been cancelled half way.
        self.release(device);
        self.uploaded = false;
        self.enabled = false;
        if let Some(fallback) = self.fallback.as_deref_mut() {
            fallback.upload(device, provider, viewport)?;
        }

        let (buckets, parameters, errors) = self.route_parameters();
        self.buckets = buckets;
        self.parameters = parameters;
        self.semantic_errors = errors;
        log::debug!(
            "Effect \"{}\": {} parameters, {} color targets, {} offscreen targets, {} images",
            self.name,
            self.parameters.len(),
            self.buckets.color_targets.len(),
            self.buckets.offscreen_targets.len(),
            self.buckets.image_resources.len()
        );

        if let Err(error) = self.allocate(device, provider, viewport) {
            self.release(device);
            return Err(error);
        }

        self.uploaded = true;
        if !self.semantic_errors.is_empty() {
            return Err(EffectError::Semantic(self.semantic_errors.join("\n")));
        }
        self.enabled = true;
        Ok(())
    }

    fn allocate(
        &mut self,
        device: &mut dyn RenderDevice,
        provider: &mut dyn ImageResourceProvider,
        viewport: &TargetImages,
    ) -> Result<()> {
        self.create_render_targets(device, viewport)?;
        self.compile_shaders(device)?;

        let texture_values = self.texture_value_sources();
        let settings = &self.settings;
        let name = &self.name;
        self.resources.load_images(
            device,
            provider,
            &self.buckets.image_resources,
            &self.buckets.animated_textures,
            &texture_values,
            settings,
            |resource| settings.label(name, resource),
        )
    }

    fn route_parameters(&self) -> (SemanticBuckets, ParameterStore, Vec<String>) {
        let mut router = SemanticRouter::new(self.legacy_matrix_convention);
        let mut parameters = ParameterStore::new();
        for (index, parameter) in self.parameter_sources.iter().enumerate() {
            if parameter.has_semantic() {
                if router.route(index, parameter) {
                    continue;
                }
                log::debug!(
                    "Semantic \"{}\" of \"{}\" is not recognized",
                    parameter.semantic,
                    parameter.name
                );
            }
            parameters.insert(parameter);
            if parameter.ty.is_texture()
                && let Some(resource_name) = parameter.annotations.string("resourcename")
            {
                router.buckets.image_resources.push(ImageResourceDecl {
                    uniform: parameter.name.clone(),
                    resource_name: resource_name.to_string(),
                });
            }
        }
        let (buckets, errors) = router.finish();
        (buckets, parameters, errors)
    }

    fn create_render_targets(&mut self, device: &mut dyn RenderDevice, viewport: &TargetImages) -> Result<()> {
        let mut registry = self.registry.lock();
        let sources = &self.parameter_sources;
        let settings = &self.settings;
        for &index in &self.buckets.color_targets {
            let Some(parameter) = sources.get(index) else { continue };
            let label = settings.label(&self.name, &parameter.name);
            self.resources
                .create_color_target(device, &mut registry, parameter, viewport, settings, &label)?;
        }
        for &index in &self.buckets.depth_stencil_targets {
            let Some(parameter) = sources.get(index) else { continue };
            self.resources
                .create_depth_target(device, parameter, viewport, settings)?;
        }
        for &index in &self.buckets.offscreen_targets {
            let Some(parameter) = sources.get(index) else { continue };
            let label = settings.label(&self.name, &parameter.name);
            self.resources
                .create_offscreen_target(device, &mut registry, parameter, viewport, settings, &label)?;
        }
        Ok(())
    }

    fn compile_shaders(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        let inspection = self.settings.pass_uniform_inspection;
        for technique in &mut self.techniques {
            let technique_name = technique.name().to_string();
            for pass in &mut technique.passes {
                let label = self
                    .settings
                    .label(&self.name, &format!("{technique_name}/{}", pass.name()));
                let desc = pass.shader_desc(label);
                pass.shader = Some(self.shaders.get_or_create(device, &desc)?);
                pass.uniforms.set_inspection_enabled(inspection);
            }
        }
        log::debug!(
            "Effect \"{}\": {} shaders for {} techniques",
            self.name,
            self.shaders.len(),
            self.techniques.len()
        );
        Ok(())
    }

    /// `TEXTUREVALUE` sources resolved to image resource names. A target
    /// naming another texture parameter reads that parameter's resource.
    fn texture_value_sources(&self) -> Vec<(String, String)> {
        self.buckets
            .texture_values
            .iter()
            .map(|(uniform, target)| {
                let resource = self
                    .parameter_sources
                    .iter()
                    .find(|parameter| parameter.name == *target)
                    .and_then(|parameter| parameter.annotations.string("resourcename"))
                    .unwrap_or(target);
                (uniform.clone(), resource.to_string())
            })
            .collect()
    }

    // ─── Enable State ────────────────────────────────────────────────────

    /// Uploaded without semantic errors.
    #[must_use]
    pub fn can_enable(&self) -> bool {
        self.uploaded && self.semantic_errors.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, value: bool) {
        if value && !self.can_enable() {
            log::warn!("Effect \"{}\" cannot be enabled", self.name);
            return;
        }
        self.enabled = value;
    }

    /// Messages collected while routing semantics at the last upload.
    #[inline]
    #[must_use]
    pub fn semantic_errors(&self) -> &[String] {
        &self.semantic_errors
    }

    // ─── Technique Lookup ────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    #[must_use]
    pub fn technique(&self, technique: &TechniqueMatch) -> Option<&Technique> {
        if technique.fallback {
            return self
                .fallback
                .as_deref()
                .and_then(|fallback| fallback.techniques.get(technique.technique));
        }
        self.techniques.get(technique.technique)
    }

    #[must_use]
    pub fn find_technique_by_name(&self, name: &str) -> Option<usize> {
        self.techniques
            .iter()
            .position(|technique| technique.name() == name)
    }

    pub fn technique_named(&self, name: &str) -> Result<&Technique> {
        self.find_technique_by_name(name)
            .map(|index| &self.techniques[index])
            .ok_or_else(|| EffectError::TechniqueNotFound(name.to_string()))
    }

    pub fn pass_named(&self, technique: &str, pass: &str) -> Result<&Pass> {
        let found = self.technique_named(technique)?;
        found
            .find_pass(pass)
            .map(|index| &found.passes()[index])
            .ok_or_else(|| EffectError::PassNotFound {
                technique: technique.to_string(),
                pass: pass.to_string(),
            })
    }

    /// Any technique script splits at `ScriptExternal`.
    #[must_use]
    pub fn has_script_external(&self) -> bool {
        self.techniques
            .iter()
            .any(|technique| technique.script().has_script_external)
    }

    #[inline]
    #[must_use]
    pub fn standards_global(&self) -> &StandardsGlobal {
        &self.buckets.standards_global
    }

    /// Technique drawing `material` of `drawable` for `pass_type`.
    ///
    /// Tags are tried in [`PassType::candidate_tags`] order and the first
    /// technique in declaration order whose subset and criteria accept the
    /// material wins. Disabled effects and unclaimed materials resolve from
    /// the built-in fallback, except for models while an offscreen target is
    /// being filled.
    #[must_use]
    pub fn find_technique(
        &self,
        pass_type: PassType,
        material: &Material,
        material_index: usize,
        material_count: usize,
        drawable: &dyn Drawable,
        frame: &FrameContext,
    ) -> Option<TechniqueMatch> {
        let kind = drawable.kind();
        if !self.enabled {
            return self.find_fallback_technique(pass_type, material, material_index, material_count, drawable, frame);
        }
        if pass_type == PassType::Zplot && self.buckets.standards_global.script_class == ScriptClass::Scene {
            return None;
        }
        if kind == DrawableKind::Model && !material.visible {
            return None;
        }
        if material_index > 0 && self.has_script_external() {
            return None;
        }
        for tag in pass_type.candidate_tags().into_iter().flatten() {
            let found = self.techniques.iter().position(|technique| {
                technique.pass_tag() == tag
                    && technique.matches(material, material_index, material_count, kind)
            });
            if let Some(index) = found {
                log::trace!(
                    "Effect \"{}\": material {material_index} of \"{}\" uses \"{}\"",
                    self.name,
                    drawable.file_name(),
                    self.techniques[index].name()
                );
                return Some(TechniqueMatch {
                    technique: index,
                    fallback: false,
                    pass_type,
                    overrides: overrides_for(kind, pass_type, material),
                    kind,
                });
            }
        }
        if kind == DrawableKind::Model && frame.is_offscreen_active() {
            return None;
        }
        self.find_fallback_technique(pass_type, material, material_index, material_count, drawable, frame)
    }

    fn find_fallback_technique(
        &self,
        pass_type: PassType,
        material: &Material,
        material_index: usize,
        material_count: usize,
        drawable: &dyn Drawable,
        frame: &FrameContext,
    ) -> Option<TechniqueMatch> {
        let fallback = self.fallback.as_deref()?;
        fallback
            .find_technique(pass_type, material, material_index, material_count, drawable, frame)
            .map(|found| TechniqueMatch {
                fallback: true,
                ..found
            })
    }

    /// Technique of a scene level effect, selected by pass type alone.
    #[must_use]
    pub fn find_scene_technique(&self, pass_type: PassType) -> Option<TechniqueMatch> {
        if !self.enabled {
            return None;
        }
        pass_type
            .candidate_tags()
            .into_iter()
            .flatten()
            .find_map(|tag| {
                self.techniques
                    .iter()
                    .position(|technique| technique.pass_tag() == tag)
            })
            .map(|technique| TechniqueMatch {
                technique,
                fallback: false,
                pass_type,
                overrides: PipelineOverrides::default(),
                kind: DrawableKind::Model,
            })
    }

    // ─── Execution ───────────────────────────────────────────────────────

    /// Runs the matched technique. A split script only runs the part after
    /// `ScriptExternal` here; see [`Effect::execute_pre_external`].
    pub fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        technique: &TechniqueMatch,
        context: DrawContext<'_>,
    ) -> ExecutionSummary {
        if technique.fallback {
            let Some(fallback) = self.fallback.as_deref_mut() else {
                return ExecutionSummary::default();
            };
            let inner = TechniqueMatch {
                fallback: false,
                ..*technique
            };
            return fallback.execute(device, &inner, context);
        }
        let Some(start) = self.techniques.get(technique.technique).map(|found| {
            if found.script().has_script_external {
                found.post_external_start()
            } else {
                0
            }
        }) else {
            log::warn!(
                "Effect \"{}\" has no technique at {}",
                self.name,
                technique.technique
            );
            return ExecutionSummary::default();
        };
        self.runner_run(device, technique, context, |runner| runner.run(start))
    }

    /// Runs the matched technique up to `ScriptExternal` and remembers the
    /// color image selected there for [`Effect::script_external_color`].
    pub fn execute_pre_external(
        &mut self,
        device: &mut dyn RenderDevice,
        technique: &TechniqueMatch,
        context: DrawContext<'_>,
    ) -> ExecutionSummary {
        if technique.fallback || self.techniques.get(technique.technique).is_none() {
            return ExecutionSummary::default();
        }
        let mut color = None;
        let summary = self.runner_run(device, technique, context, |runner| {
            let (summary, image) = runner.run_pre_external();
            color = image;
            summary
        });
        self.script_external_color = color;
        summary
    }

    fn runner_run(
        &mut self,
        device: &mut dyn RenderDevice,
        technique: &TechniqueMatch,
        context: DrawContext<'_>,
        run: impl FnOnce(Runner<'_>) -> ExecutionSummary,
    ) -> ExecutionSummary {
        let registry = self.registry.lock();
        let Some(found) = self.techniques.get_mut(technique.technique) else {
            return ExecutionSummary::default();
        };
        let parts = RunnerParts {
            device,
            technique: found,
            buckets: &mut self.buckets,
            parameters: &mut self.parameters,
            resources: &mut self.resources,
            normalizers: &mut self.normalizers,
            registry: &registry,
            settings: &self.settings,
            effect_name: &self.name,
        };
        run(Runner::new(parts, context, *technique))
    }

    /// Color image selected when the last pre-external run stopped.
    #[inline]
    #[must_use]
    pub fn script_external_color(&self) -> Option<ImageHandle> {
        self.script_external_color
    }

    // ─── Parameters ──────────────────────────────────────────────────────

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name)
    }

    /// Overrides a non-semantic uniform. Returns `false` for unknown names.
    pub fn set_parameter_value(&mut self, name: &str, values: &[Vec4]) -> bool {
        let found = self.parameters.set(name, values);
        if !found {
            log::debug!("Effect \"{}\" has no parameter \"{name}\"", self.name);
        }
        found
    }

    #[inline]
    #[must_use]
    pub fn buckets(&self) -> &SemanticBuckets {
        &self.buckets
    }

    // ─── Image Resources ─────────────────────────────────────────────────

    /// Names of every image resource the effect requested.
    #[must_use]
    pub fn all_image_resources(&self) -> Vec<String> {
        self.resources.image_resource_names()
    }

    pub fn update_animated_textures(
        &mut self,
        device: &mut dyn RenderDevice,
        provider: &mut dyn ImageResourceProvider,
        frame: &FrameContext,
    ) {
        let settings = &self.settings;
        let name = &self.name;
        self.resources.update_animated_textures(
            device,
            provider,
            &self.parameters,
            frame,
            |resource| settings.label(name, resource),
        );
    }

    /// Image currently bound to the texture uniform `uniform`.
    #[must_use]
    pub fn image_for_uniform(&self, drawable: Option<DrawableId>, uniform: &str) -> Option<ImageHandle> {
        let registry = self.registry.lock();
        self.resources.image_for_uniform(&registry, drawable, uniform)
    }

    // ─── Uniform Inspection ──────────────────────────────────────────────

    /// Bytes last written per uniform name in one pass, when inspection is
    /// enabled.
    #[must_use]
    pub fn pass_uniform_buffer(&self, technique: &str, pass: &str) -> Option<&FxHashMap<String, Vec<u8>>> {
        self.pass_named(technique, pass).ok()?.uniforms.inspected()
    }

    pub fn set_pass_uniform_inspection_enabled(&mut self, enabled: bool) {
        self.settings.pass_uniform_inspection = enabled;
        for technique in &mut self.techniques {
            for pass in &mut technique.passes {
                pass.uniforms.set_inspection_enabled(enabled);
            }
        }
    }

    // ─── Offscreen Render Targets ────────────────────────────────────────

    #[must_use]
    pub fn offscreen_options(&self) -> Vec<&OffscreenRenderTargetOption> {
        self.resources.offscreen_options()
    }

    /// Images the host renders the offscreen pass `name` into.
    pub fn offscreen_target_images(&mut self, device: &mut dyn RenderDevice, name: &str) -> Option<TargetImages> {
        let registry = self.registry.lock();
        let label = self.settings.label(&self.name, &format!("{name}/Depth"));
        self.resources
            .offscreen_target_images(device, &registry, name, &label)
    }

    // ─── Maintenance ─────────────────────────────────────────────────────

    /// Follows a new viewport size and sample count. Intermediate passes are
    /// dropped and rebuilt on the next draw.
    pub fn resize_all_render_targets(
        &mut self,
        device: &mut dyn RenderDevice,
        viewport: UVec2,
        sample_count: u32,
    ) -> Result<()> {
        let settings = &self.settings;
        let name = &self.name;
        let label = |target: &str| settings.label(name, target);
        let mut registry = self.registry.lock();
        let resized = registry.resize(device, viewport, label)?;
        if !resized.is_empty() {
            log::debug!("Shared render targets resized: {}", resized.join(", "));
        }
        self.resources
            .resize(device, &registry, viewport, sample_count, settings, label)?;
        drop(registry);
        for (_, mut normalizer) in self.normalizers.drain() {
            normalizer.destroy(device);
        }
        Ok(())
    }

    /// Gives `drawable` its own copies of every non-shared color target.
    pub fn create_drawable_render_targets(&mut self, device: &mut dyn RenderDevice, drawable: DrawableId) -> Result<()> {
        let settings = &self.settings;
        let name = &self.name;
        self.resources.create_drawable_targets(device, drawable, |target| {
            settings.label(name, &format!("{target}/{}", drawable.0))
        })
    }

    pub fn destroy_drawable_render_targets(&mut self, device: &mut dyn RenderDevice, drawable: DrawableId) {
        let mut registry = self.registry.lock();
        self.resources
            .destroy_drawable_targets(device, &mut registry, drawable);
    }

    /// Rebuilds the mip chains of targets written since the last call.
    pub fn generate_render_target_mipmaps(&mut self, device: &mut dyn RenderDevice) {
        let registry = self.registry.lock();
        self.resources.generate_mipmaps(device, &registry);
    }

    fn release(&mut self, device: &mut dyn RenderDevice) {
        for technique in &mut self.techniques {
            technique.destroy(device);
            for pass in &mut technique.passes {
                pass.shader = None;
            }
        }
        self.shaders.destroy(device);
        for (_, mut normalizer) in self.normalizers.drain() {
            normalizer.destroy(device);
        }
        {
            let mut registry = self.registry.lock();
            self.resources.destroy(device, &mut registry);
        }
        self.resources = EffectResources::new();
        self.script_external_color = None;
    }

    /// Destroys every device object and drops this effect's references to
    /// shared render targets.
    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.release(device);
        if let Some(fallback) = self.fallback.as_deref_mut() {
            fallback.destroy(device);
        }
        self.uploaded = false;
        self.enabled = false;
        log::debug!("Effect \"{}\" destroyed", self.name);
    }
}

fn overrides_for(kind: DrawableKind, pass_type: PassType, material: &Material) -> PipelineOverrides {
    match kind {
        DrawableKind::Model => PipelineOverrides::for_model(pass_type, material),
        DrawableKind::Accessory => PipelineOverrides::for_accessory(pass_type, material),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{AnnotationValue, ParameterType, PassSource, TechniqueSource};
    use crate::device::{ImageHandle, RecordingDevice};
    use crate::scene::{DrawableState, NoImageResources};
    use render_target::RenderTargetRegistry;

    fn viewport() -> TargetImages {
        TargetImages {
            color: ImageHandle::default(),
            depth: None,
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            sample_count: 1,
            size: UVec2::new(64, 64),
        }
    }

    fn tagged(name: &str, tag: &str) -> TechniqueSource {
        TechniqueSource {
            name: name.into(),
            annotations: [("MMDPass", AnnotationValue::String(tag.into()))]
                .into_iter()
                .collect(),
            passes: vec![PassSource {
                name: "P0".into(),
                ..Default::default()
            }],
        }
    }

    fn uploaded(bundle: &EffectBundle) -> (Effect, RecordingDevice) {
        let mut device = RecordingDevice::new();
        let features = device.features().clone();
        let mut effect = Effect::new(
            "Test",
            bundle,
            EffectSettings::default(),
            &features,
            RenderTargetRegistry::shared(),
        )
        .unwrap();
        let _ = effect.upload(&mut device, &mut NoImageResources, &viewport());
        (effect, device)
    }

    #[test]
    fn disabled_effect_resolves_from_fallback() {
        let bundle = EffectBundle {
            techniques: vec![tagged("Main", "object")],
            ..Default::default()
        };
        let (mut effect, _device) = uploaded(&bundle);
        let drawable = DrawableState::new(1, DrawableKind::Model, "a.pmx");
        let frame = FrameContext::new(viewport(), ImageHandle::default());
        let material = Material::default();

        let found = effect
            .find_technique(PassType::Object, &material, 0, 1, &drawable, &frame)
            .unwrap();
        assert!(!found.fallback);

        effect.set_enabled(false);
        let found = effect
            .find_technique(PassType::Object, &material, 0, 1, &drawable, &frame)
            .unwrap();
        assert!(found.fallback);
        assert_eq!(effect.technique(&found).unwrap().pass_tag(), "object");
    }

    #[test]
    fn unknown_semantic_becomes_plain_parameter() {
        let bundle = EffectBundle {
            parameters: vec![ParameterSource {
                name: "Strength".into(),
                semantic: "CUSTOMSTRENGTH".into(),
                ty: ParameterType::Float,
                values: vec![0.25],
                ..Default::default()
            }],
            ..Default::default()
        };
        let (mut effect, _device) = uploaded(&bundle);
        assert!(effect.can_enable());
        assert_eq!(effect.parameter("Strength").unwrap().first().x, 0.25);
        assert!(effect.set_parameter_value("Strength", &[Vec4::splat(2.0)]));
        assert_eq!(effect.parameter("Strength").unwrap().first().x, 2.0);
        assert!(!effect.set_parameter_value("Missing", &[Vec4::ONE]));
    }

    #[test]
    fn named_lookups_report_what_is_missing() {
        let bundle = EffectBundle {
            techniques: vec![tagged("Main", "object")],
            ..Default::default()
        };
        let (effect, _device) = uploaded(&bundle);
        assert_eq!(effect.pass_named("Main", "P0").unwrap().name(), "P0");
        assert!(matches!(
            effect.technique_named("Other"),
            Err(EffectError::TechniqueNotFound(name)) if name == "Other"
        ));
        assert!(matches!(
            effect.pass_named("Main", "P1"),
            Err(EffectError::PassNotFound { pass, .. }) if pass == "P1"
        ));
    }
}
