//! Script Execution
//!
//! A [`Runner`] carries the state of one technique execution: the
//! attachments selected so far, the clear values, the auto-clear flags and
//! the counters of what it issued. It borrows the effect's parts for the
//! duration of the run and is dropped afterwards, so a technique can run any
//! number of times per frame.
//!
//! ```text
//! technique script ──► Runner::run_command ──► Pass=…  ──► pass script
//!                                                            │
//!                                              Draw=… ◄──────┘
//!                                                │
//!                  bind ─► preshaders ─► images ─► normalize ─► pipeline ─► draw
//! ```

use std::sync::Arc;

use glam::{Mat4, UVec2, Vec4};
use rustc_hash::FxHashMap;

use super::binder::Binder;
use super::normalizer::RenderTargetNormalizer;
use super::parameters::ParameterStore;
use super::pipeline::{PipelineKey, build_pipeline_desc, fx_hash_key};
use super::render_target::{RenderTargetRegistry, RenderTargetState};
use super::resources::EffectResources;
use super::script::{
    LoopCounter, ScriptCommand, ScriptCommandType, ScriptFlow, ScriptHost, run_script,
};
use super::semantic::{ScriptClass, ScriptOrder, SemanticBuckets};
use super::technique::{PassType, Technique, TechniqueMatch};
use crate::bundle::ShaderStage;
use crate::device::{
    ClearAction, DrawCall, DrawGeometry, ImageBinding, ImageHandle, RenderDevice, SamplerDesc,
};
use crate::scene::{Drawable, DrawableId, DrawableKind, FrameContext, Material, SceneLookup, TargetImages};
use crate::settings::EffectSettings;

/// What the host hands over for one technique execution.
#[derive(Clone, Copy)]
pub struct DrawContext<'a> {
    pub scene: &'a dyn SceneLookup,
    pub frame: &'a FrameContext,
    /// `None` for scene level post effects.
    pub drawable: Option<&'a dyn Drawable>,
    pub material: Option<&'a Material>,
    pub material_index: usize,
    pub material_count: usize,
    /// Index range of the material for `Draw=Geometry`.
    pub geometry: Option<&'a DrawGeometry>,
}

impl<'a> DrawContext<'a> {
    /// Context of a scene level draw without a drawable.
    #[must_use]
    pub fn scene(scene: &'a dyn SceneLookup, frame: &'a FrameContext) -> Self {
        Self {
            scene,
            frame,
            drawable: None,
            material: None,
            material_index: 0,
            material_count: 0,
            geometry: None,
        }
    }

    /// Context of one material of `drawable`.
    #[must_use]
    pub fn material(
        scene: &'a dyn SceneLookup,
        frame: &'a FrameContext,
        drawable: &'a dyn Drawable,
        material: &'a Material,
        material_index: usize,
        geometry: Option<&'a DrawGeometry>,
    ) -> Self {
        Self {
            scene,
            frame,
            drawable: Some(drawable),
            material: Some(material),
            material_index,
            material_count: drawable.material_count() as usize,
            geometry,
        }
    }

    #[inline]
    fn drawable_id(&self) -> Option<DrawableId> {
        self.drawable.map(|drawable| drawable.id())
    }
}

impl std::fmt::Debug for DrawContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawContext")
            .field("drawable", &self.drawable_id())
            .field("material_index", &self.material_index)
            .field("material_count", &self.material_count)
            .finish_non_exhaustive()
    }
}

/// Counters of one technique execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionSummary {
    pub passes: usize,
    pub draws: usize,
    pub clears: usize,
    /// The script ran to its end rather than stopping at `ScriptExternal`.
    pub completed: bool,
}

/// Effect parts a run borrows.
pub(crate) struct RunnerParts<'a> {
    pub device: &'a mut dyn RenderDevice,
    pub technique: &'a mut Technique,
    pub buckets: &'a mut SemanticBuckets,
    pub parameters: &'a mut ParameterStore,
    pub resources: &'a mut EffectResources,
    pub normalizers: &'a mut FxHashMap<u64, RenderTargetNormalizer>,
    pub registry: &'a RenderTargetRegistry,
    pub settings: &'a EffectSettings,
    pub effect_name: &'a str,
}

pub(crate) struct Runner<'a> {
    device: &'a mut dyn RenderDevice,
    technique: &'a mut Technique,
    buckets: &'a mut SemanticBuckets,
    parameters: &'a mut ParameterStore,
    resources: &'a mut EffectResources,
    normalizers: &'a mut FxHashMap<u64, RenderTargetNormalizer>,
    registry: &'a RenderTargetRegistry,
    settings: &'a EffectSettings,
    effect_name: &'a str,
    context: DrawContext<'a>,
    target: TechniqueMatch,

    primary: TargetImages,
    state: RenderTargetState,
    clear_color: Vec4,
    clear_depth: f32,
    auto_cleared_color: bool,
    auto_cleared_depth: bool,
    current_pass: Option<usize>,
    stop_at_external: bool,
    external_color: Option<ImageHandle>,
    summary: ExecutionSummary,
}

impl<'a> Runner<'a> {
    pub fn new(parts: RunnerParts<'a>, context: DrawContext<'a>, target: TechniqueMatch) -> Self {
        let frame = context.frame;
        let primary = if target.overrides.shadow_camera_pass {
            context
                .scene
                .shadow_camera()
                .target
                .unwrap_or_else(|| frame.primary_target())
        } else {
            frame.primary_target()
        };
        Self {
            device: parts.device,
            technique: parts.technique,
            buckets: parts.buckets,
            parameters: parts.parameters,
            resources: parts.resources,
            normalizers: parts.normalizers,
            registry: parts.registry,
            settings: parts.settings,
            effect_name: parts.effect_name,
            context,
            target,
            primary,
            state: RenderTargetState::from_target(&primary),
            clear_color: Vec4::ZERO,
            clear_depth: 1.0,
            auto_cleared_color: false,
            auto_cleared_depth: false,
            current_pass: None,
            stop_at_external: false,
            external_color: None,
            summary: ExecutionSummary::default(),
        }
    }

    /// Runs the technique script from `start` to its end.
    pub fn run(mut self, start: usize) -> ExecutionSummary {
        let script = Arc::clone(&self.technique.script);
        let mut counters = Vec::new();
        let run = run_script(&script, start, &mut counters, &mut self);
        self.check_counters(&counters);
        self.summary.completed = run.completed;
        self.summary
    }

    /// Runs the technique script up to `ScriptExternal` and returns the
    /// color image selected at that point.
    pub fn run_pre_external(mut self) -> (ExecutionSummary, Option<ImageHandle>) {
        self.stop_at_external = true;
        let script = Arc::clone(&self.technique.script);
        let mut counters = Vec::new();
        let run = run_script(&script, 0, &mut counters, &mut self);
        self.check_counters(&counters);
        self.summary.completed = run.completed;
        (self.summary, self.external_color)
    }

    fn check_counters(&self, counters: &[LoopCounter]) {
        if let Some(counter) = counters.last() {
            log::warn!(
                "Loop \"{}\" of \"{}\" has no LoopEnd ({} counters left open)",
                counter.name,
                self.technique.name(),
                counters.len()
            );
        }
    }

    fn label(&self, rest: &str) -> String {
        self.settings
            .label(self.effect_name, &format!("{}/{rest}", self.technique.name()))
    }

    // ─── Render Targets ───

    fn set_color_target(&mut self, slot: usize, name: &str) {
        if name.is_empty() {
            if slot == 0 {
                self.state.reset_color(&self.primary);
                if self.state.depth_name.is_none() {
                    self.state.reset_depth(&self.primary);
                }
            } else {
                self.state.colors[slot] = None;
            }
            return;
        }
        let drawable = self.context.drawable_id();
        let Some(attachment) = self
            .resources
            .find_color(drawable, name)
            .and_then(|container| container.attachment(self.registry))
        else {
            log::warn!(
                "RenderColorTarget{slot}=\"{name}\" of \"{}\" is not a declared render target",
                self.technique.name()
            );
            return;
        };
        let (size, sample_count) = (attachment.size, attachment.sample_count);
        self.state.colors[slot] = Some(attachment);
        if slot == 0 {
            self.match_depth(size, sample_count);
        }
    }

    /// Keeps the depth attachment compatible with a new color target 0.
    fn match_depth(&mut self, size: UVec2, sample_count: u32) {
        let Some(depth) = &self.state.depth else {
            return;
        };
        if depth.size == size && depth.sample_count == sample_count {
            return;
        }
        let label = self.label("DepthStencil");
        match self.state.depth_name.clone() {
            Some(name) => {
                self.state.depth = self
                    .resources
                    .find_depth_mut(&name)
                    .and_then(|container| container.find_image(self.device, size, sample_count, &label));
            }
            None => {
                log::trace!(
                    "Viewport depth detached from a {}x{} render target",
                    size.x,
                    size.y
                );
                self.state.depth = None;
            }
        }
    }

    fn set_depth_target(&mut self, name: &str) {
        if name.is_empty() {
            self.state.reset_depth(&self.primary);
            return;
        }
        let (size, sample_count) = self
            .state
            .primary()
            .map_or((self.primary.size, self.primary.sample_count), |attachment| {
                (attachment.size, attachment.sample_count)
            });
        let label = self.label(name);
        let Some(container) = self.resources.find_depth_mut(name) else {
            log::warn!(
                "RenderDepthStencilTarget=\"{name}\" of \"{}\" is not a declared depth target",
                self.technique.name()
            );
            return;
        };
        if let Some(attachment) = container.find_image(self.device, size, sample_count, &label) {
            self.state.depth = Some(attachment);
            self.state.depth_name = Some(name.to_string());
        }
    }

    // ─── Clears ───

    fn clear_value(&self, name: &str) -> Option<Vec4> {
        self.parameters
            .get(name)
            .map(|value| value.first())
            .or_else(|| self.buckets.control_object(name).map(|target| target.value))
    }

    fn clear(&mut self, component: &str) {
        let action = if component.eq_ignore_ascii_case("Color") {
            ClearAction {
                color: Some(self.clear_color),
                ..Default::default()
            }
        } else if component.eq_ignore_ascii_case("Depth") {
            ClearAction {
                depth: Some(self.clear_depth),
                stencil: Some(0),
                ..Default::default()
            }
        } else {
            log::warn!("Clear=\"{component}\" is not Color or Depth");
            return;
        };
        self.issue_clear(&action);
    }

    fn issue_clear(&mut self, action: &ClearAction) {
        if let Some(primary) = self.state.primary() {
            let depth_samples = self.state.depth.as_ref().map_or(1, |depth| depth.sample_count);
            if primary.sample_count > depth_samples {
                let (size, sample_count) = (primary.size, primary.sample_count);
                let format = self
                    .state
                    .depth
                    .as_ref()
                    .map_or(self.settings.default_depth_format, |depth| depth.format);
                let label = self.label("MultisampleDepth");
                self.state.depth =
                    self.resources
                        .msaa_depth(self.device, &label, size, sample_count, format);
            }
        }
        self.device.clear(&self.state.pass_desc(), action);
        self.mark_written();
        self.summary.clears += 1;
    }

    fn auto_clear(&mut self, index: usize) {
        if self.buckets.standards_global.script_order != ScriptOrder::Standard {
            return;
        }
        let script = &self.technique.script;
        let color = !self.auto_cleared_color && script.clear_color_index == Some(index);
        let depth = !self.auto_cleared_depth && script.clear_depth_index == Some(index);
        if color {
            self.auto_cleared_color = true;
            let action = ClearAction {
                color: Some(self.clear_color),
                ..Default::default()
            };
            self.issue_clear(&action);
        }
        if depth {
            self.auto_cleared_depth = true;
            let action = ClearAction {
                depth: Some(self.clear_depth),
                stencil: Some(0),
                ..Default::default()
            };
            self.issue_clear(&action);
        }
    }

    /// Flags written containers so their mips are regenerated.
    fn mark_written(&mut self) {
        let drawable = self.context.drawable_id();
        for attachment in self.state.colors.iter().flatten() {
            if let Some(name) = &attachment.name
                && let Some(container) = self.resources.find_color_mut(drawable, name)
            {
                container.mark_dirty();
            }
        }
    }

    // ─── Passes ───

    fn execute_pass(&mut self, index: usize, name: &str) {
        let Some(pass) = self.technique.find_pass(name) else {
            log::warn!("Pass \"{name}\" is not found in \"{}\"", self.technique.name());
            return;
        };
        self.auto_clear(index);
        let script = Arc::clone(&self.technique.passes[pass].script);
        self.current_pass = Some(pass);
        let mut counters = Vec::new();
        run_script(&script, 0, &mut counters, self);
        self.check_counters(&counters);
        self.current_pass = None;
        self.summary.passes += 1;
    }

    fn draw(&mut self, pass_index: usize, argument: &str) {
        let class = self.buckets.standards_global.script_class;
        let (geometry, buffer_draw) = if argument.eq_ignore_ascii_case("Buffer") {
            if class == ScriptClass::Object {
                log::warn!("Draw=Buffer is not allowed in an object effect");
                return;
            }
            (DrawGeometry::FullscreenQuad, true)
        } else if argument.eq_ignore_ascii_case("Geometry") {
            if class == ScriptClass::Scene {
                log::warn!("Draw=Geometry is not allowed in a scene effect");
                return;
            }
            let Some(geometry) = self.context.geometry else {
                log::debug!("Draw=Geometry without geometry is skipped");
                return;
            };
            (geometry.clone(), false)
        } else {
            log::warn!("Draw=\"{argument}\" is not Buffer or Geometry");
            return;
        };

        let context = self.context;
        let frame = context.frame;
        let drawable_id = context.drawable_id();
        let pass_type = self.target.pass_type;
        let output = self.state.primary().map(|attachment| attachment.image);
        let technique_name = self.technique.name().to_string();
        let technique = &mut *self.technique;
        let pass = &mut technique.passes[pass_index];

        // Registers.
        pass.uniforms.reset();
        let mut binder = Binder::new(&pass.source, &mut pass.uniforms, self.buckets);
        binder.set_parameters(self.parameters);
        binder.set_global(frame, self.settings.base_fps);
        binder.set_texture_values(&self.resources.texture_values);
        binder.set_control_objects(context.scene, frame, context.drawable);
        let scene = context.scene;
        let (camera, light, shadow_camera) = (scene.camera(), scene.light(), scene.shadow_camera());
        match context.drawable {
            Some(drawable) => {
                let world = drawable.world_transform();
                let accessory = drawable.kind() == DrawableKind::Accessory;
                binder.set_drawable_counts(drawable);
                if pass_type == PassType::Shadow {
                    binder.set_ground_shadow(camera, light, world);
                } else {
                    binder.set_camera(camera, world);
                }
                binder.set_light(light, accessory);
                if let Some(material) = context.material {
                    if accessory {
                        binder.set_accessory_material(material, drawable.opacity(), light);
                    } else {
                        binder.set_model_material(material, light, pass_type);
                    }
                    if pass_type == PassType::Edge {
                        binder.set_edge(material);
                    }
                }
                if matches!(pass_type, PassType::ObjectSelfShadow | PassType::Zplot) {
                    binder.set_shadow_map(shadow_camera, world, output);
                } else {
                    binder.set_light_matrices(world, shadow_camera.view, shadow_camera.projection);
                }
            }
            None => {
                binder.set_camera(camera, Mat4::IDENTITY);
                binder.set_light(light, false);
                binder.set_light_matrices(Mat4::IDENTITY, shadow_camera.view, shadow_camera.projection);
            }
        }
        let images = binder.images;
        pass.uniforms.run_preshaders(&pass.source);

        // Images.
        let fallback = ImageBinding {
            image: frame.fallback_image,
            sampler: SamplerDesc::default(),
        };
        let mut vertex_images = vec![fallback; pass.source.image_count(ShaderStage::Vertex) as usize];
        let mut pixel_images = vec![fallback; pass.source.image_count(ShaderStage::Pixel) as usize];
        if let (Some(slot), Some(first)) = (pixel_images.first_mut(), images.first) {
            slot.image = first;
        }
        for sampler in &pass.source.samplers {
            let slots = match sampler.stage {
                ShaderStage::Vertex => &mut vertex_images,
                ShaderStage::Pixel => &mut pixel_images,
            };
            let Some(slot) = slots.get_mut(sampler.slot as usize) else {
                continue;
            };
            slot.sampler = sampler.sampler_desc();
            let image = images.named.get(&sampler.texture).copied().or_else(|| {
                self.resources
                    .image_for_uniform(self.registry, drawable_id, &sampler.texture)
            });
            if let Some(image) = image {
                slot.image = image;
            }
        }

        // Attachments.
        let target_pass = self.state.pass_desc();
        let samples_own_output = vertex_images
            .iter()
            .chain(&pixel_images)
            .any(|binding| target_pass.writes_to(binding.image));
        let normalized_format =
            RenderTargetNormalizer::required_format(self.device.features(), &self.state, samples_own_output);
        if normalized_format.is_none() && samples_own_output {
            log::trace!("{technique_name}: an image written by the pass is unbound while drawing");
            for binding in vertex_images.iter_mut().chain(pixel_images.iter_mut()) {
                if target_pass.writes_to(binding.image) {
                    binding.image = frame.fallback_image;
                }
            }
        }
        let normalizer = match normalized_format {
            Some(format) => {
                let key = fx_hash_key(&(target_pass, format));
                match self.normalizers.entry(key) {
                    std::collections::hash_map::Entry::Occupied(entry) => Some(entry.into_mut()),
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let label = self.settings.label(
                            self.effect_name,
                            &format!("{technique_name}/{}", pass.source.name),
                        );
                        match RenderTargetNormalizer::new(self.device, &self.state, format, &label) {
                            Ok(normalizer) => Some(entry.insert(normalizer)),
                            Err(error) => {
                                log::warn!("Render target normalizer cannot be created: {error}");
                                None
                            }
                        }
                    }
                }
            }
            None => None,
        };
        let (draw_pass, color_formats) = match normalizer.as_deref() {
            Some(normalizer) => {
                let format = normalizer.format();
                let formats = std::array::from_fn(|i| self.state.colors[i].as_ref().map(|_| format));
                (normalizer.pass_desc(), formats)
            }
            None => (target_pass, self.state.color_formats()),
        };

        // Pipeline.
        let Some(shader) = pass.shader else {
            log::warn!("Pass \"{}\" of \"{technique_name}\" has no shader", pass.source.name);
            return;
        };
        let key = PipelineKey {
            pass: pass_index as u32,
            pass_type,
            overrides: self.target.overrides,
            buffer_draw,
            add_blend: context.drawable.is_some_and(|drawable| drawable.is_add_blend_enabled()),
            offscreen: frame.is_offscreen_active(),
            color_formats,
            depth_format: self.state.depth.as_ref().map(|depth| depth.format),
            sample_count: self.state.sample_count(),
        };
        let label = self
            .settings
            .label(self.effect_name, &format!("{technique_name}/{}", pass.source.name));
        let render_state = &pass.source.render_state;
        let Some(pipeline) = technique.pipelines.get_or_create(
            self.device,
            &key,
            || build_pipeline_desc(shader, render_state, &key),
            &label,
        ) else {
            return;
        };

        if let Some(normalizer) = normalizer.as_deref() {
            normalizer.read(self.device);
        }
        self.device.draw(&DrawCall {
            label: &label,
            pipeline,
            pass: draw_pass,
            vertex_uniforms: &pass.uniforms.vertex,
            pixel_uniforms: &pass.uniforms.pixel,
            vertex_images: &vertex_images,
            pixel_images: &pixel_images,
            geometry,
        });
        if let Some(normalizer) = normalizer.as_deref() {
            normalizer.write(self.device);
        }
        self.mark_written();
        self.summary.draws += 1;
    }
}

impl ScriptHost for Runner<'_> {
    fn run_command(&mut self, index: usize, command: &ScriptCommand) -> ScriptFlow {
        let argument = command.argument.as_str();
        log::trace!("{}: {index}: {command}", self.technique.name());
        match command.ty {
            ScriptCommandType::SetRenderColorTarget(slot) => self.set_color_target(usize::from(slot), argument),
            ScriptCommandType::SetRenderDepthStencilTarget => self.set_depth_target(argument),
            ScriptCommandType::ClearSetColor => match self.clear_value(argument) {
                Some(value) => self.clear_color = value,
                None => log::warn!("ClearSetColor=\"{argument}\" is not a parameter"),
            },
            ScriptCommandType::ClearSetDepth => match self.clear_value(argument) {
                Some(value) => self.clear_depth = value.x,
                None => log::warn!("ClearSetDepth=\"{argument}\" is not a parameter"),
            },
            ScriptCommandType::Clear => self.clear(argument),
            ScriptCommandType::ScriptExternal => {
                if self.stop_at_external {
                    self.external_color = self.state.primary().map(|attachment| attachment.image);
                    return ScriptFlow::Stop;
                }
            }
            ScriptCommandType::ExecutePass => match self.current_pass {
                Some(_) => log::warn!("Pass=\"{argument}\" inside a pass script is ignored"),
                None => self.execute_pass(index, argument),
            },
            ScriptCommandType::Draw => match self.current_pass {
                Some(pass) => self.draw(pass, argument),
                None => log::warn!("Draw=\"{argument}\" outside of a pass is ignored"),
            },
            ScriptCommandType::LoopByCount | ScriptCommandType::LoopGetIndex | ScriptCommandType::LoopEnd => {}
        }
        ScriptFlow::Continue
    }

    fn loop_count(&mut self, name: &str) -> Option<usize> {
        self.parameters.loop_count(name).or_else(|| {
            self.buckets
                .control_object(name)
                .map(|target| target.value.x.max(0.0) as usize)
        })
    }

    fn set_loop_index(&mut self, name: &str, index: usize) {
        if !self.parameters.set_loop_index(name, index) {
            log::warn!("LoopGetIndex=\"{name}\" is not a parameter");
        }
    }
}
