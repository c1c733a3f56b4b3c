//! Pipeline & Attachment Tests
//!
//! Tests for:
//! - Pipeline caching per technique and pipeline key
//! - Shader deduplication by source
//! - Render target normalization without independent blending
//! - Passes sampling the image they render into
//! - Pipeline creation failures

use glam::UVec2;

use myth_fx::bundle::{PassSource, SamplerSource, ShaderStage, TechniqueSource};
use myth_fx::device::{BufferHandle, DeviceCommand, DrawGeometry, ImageDesc};
use myth_fx::{
    AnnotationValue, Annotations, DeviceFeatures, DrawContext, DrawableKind, DrawableState, Effect,
    EffectBundle, EffectSettings, ExecutionSummary, FrameContext, Material, NoImageResources,
    ParameterSource, ParameterType, PassType, RecordingDevice, RenderDevice, RenderTargetRegistry,
    SceneSnapshot, TargetImages,
};

// ============================================================================
// Helpers
// ============================================================================

fn string(value: &str) -> AnnotationValue {
    AnnotationValue::String(value.to_string())
}

fn pass(name: &str, pixel_entry: &str) -> PassSource {
    PassSource {
        name: name.to_string(),
        vertex_source: "vs".to_string(),
        vertex_entry: "vs_main".to_string(),
        pixel_source: "fs".to_string(),
        pixel_entry: pixel_entry.to_string(),
        ..Default::default()
    }
}

fn technique(tag: &str, script: Option<&str>, passes: Vec<PassSource>) -> TechniqueSource {
    let mut annotations = Annotations::new();
    if !tag.is_empty() {
        annotations.insert("MMDPass", string(tag));
    }
    if let Some(script) = script {
        annotations.insert("Script", string(script));
    }
    TechniqueSource {
        name: format!("Tec_{tag}"),
        annotations,
        passes,
    }
}

fn color_target(name: &str, format: &str) -> ParameterSource {
    ParameterSource {
        name: name.to_string(),
        semantic: "RENDERCOLORTARGET".to_string(),
        ty: ParameterType::Texture2D,
        annotations: [("Format", string(format))].into_iter().collect(),
        ..Default::default()
    }
}

struct Harness {
    device: RecordingDevice,
    frame: FrameContext,
    viewport: TargetImages,
    scene: SceneSnapshot,
    model: DrawableState,
    material: Material,
    geometry: DrawGeometry,
}

impl Harness {
    fn new(features: DeviceFeatures) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut device = RecordingDevice::with_features(features);
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let depth_format = wgpu::TextureFormat::Depth24PlusStencil8;
        let color = device
            .create_image(&ImageDesc::render_target(128, 128, format, 1), "Viewport")
            .unwrap();
        let depth = device
            .create_image(&ImageDesc::render_target(128, 128, depth_format, 1), "ViewportDepth")
            .unwrap();
        let fallback = device
            .create_image(&ImageDesc::texture(1, 1, format), "Fallback")
            .unwrap();
        let viewport = TargetImages {
            color,
            depth: Some(depth),
            color_format: format,
            depth_format,
            sample_count: 1,
            size: UVec2::new(128, 128),
        };
        Self {
            device,
            frame: FrameContext::new(viewport, fallback),
            viewport,
            scene: SceneSnapshot::default(),
            model: DrawableState::new(1, DrawableKind::Model, "model.pmx"),
            material: Material::default(),
            geometry: DrawGeometry::Vertices {
                vertex_buffer: BufferHandle::default(),
                vertices: 0..6,
            },
        }
    }

    fn effect(&mut self, bundle: &EffectBundle) -> Effect {
        let features = self.device.features().clone();
        let mut effect = Effect::new(
            "Pipeline.fx",
            bundle,
            EffectSettings::default(),
            &features,
            RenderTargetRegistry::shared(),
        )
        .unwrap();
        effect
            .upload(&mut self.device, &mut NoImageResources, &self.viewport)
            .unwrap();
        self.device.clear_commands();
        effect
    }

    fn draw(&mut self, effect: &mut Effect, pass_type: PassType) -> ExecutionSummary {
        let found = effect
            .find_technique(pass_type, &self.material, 0, 1, &self.model, &self.frame)
            .unwrap();
        let context = DrawContext::material(
            &self.scene,
            &self.frame,
            &self.model,
            &self.material,
            0,
            Some(&self.geometry),
        );
        effect.execute(&mut self.device, &found, context)
    }

    fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.device
            .commands()
            .iter()
            .filter(|command| predicate(command))
            .count()
    }
}

// ============================================================================
// Caches
// ============================================================================

#[test]
fn repeated_draws_reuse_one_pipeline() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let bundle = EffectBundle {
        techniques: vec![technique("object", None, vec![pass("P0", "fs_main")])],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);

    assert_eq!(harness.draw(&mut effect, PassType::Object).draws, 1);
    assert_eq!(harness.draw(&mut effect, PassType::Object).draws, 1);

    assert_eq!(
        harness.count(|command| matches!(command, DeviceCommand::CreatePipeline { .. })),
        1
    );
    assert_eq!(effect.techniques()[0].pipeline_count(), 1);
    assert_eq!(harness.device.draws().count(), 2);
}

#[test]
fn pass_types_sharing_a_technique_get_distinct_pipelines() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let bundle = EffectBundle {
        techniques: vec![technique("", None, vec![pass("P0", "fs_main")])],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    harness.draw(&mut effect, PassType::Object);
    harness.draw(&mut effect, PassType::Shadow);
    harness.draw(&mut effect, PassType::Object);
    assert_eq!(effect.techniques()[0].pipeline_count(), 2);
}

#[test]
fn identical_sources_compile_once() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let bundle = EffectBundle {
        techniques: vec![
            technique("object", None, vec![pass("P0", "fs_main"), pass("P1", "fs_main")]),
            technique("edge", None, vec![pass("P0", "fs_edge")]),
        ],
        ..Default::default()
    };
    let features = harness.device.features().clone();
    let mut effect = Effect::new(
        "Shaders.fx",
        &bundle,
        EffectSettings::default(),
        &features,
        RenderTargetRegistry::shared(),
    )
    .unwrap();
    effect
        .upload(&mut harness.device, &mut NoImageResources, &harness.viewport)
        .unwrap();
    let labels: Vec<_> = harness
        .device
        .commands()
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::CreateShader { label, .. } => Some(label.as_str()),
            _ => None,
        })
        .filter(|label| label.starts_with("Effects/Shaders.fx/Tec_"))
        .collect();
    assert_eq!(labels, vec!["Effects/Shaders.fx/Tec_object/P0", "Effects/Shaders.fx/Tec_edge/P0"]);
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn mixed_formats_are_normalized_without_independent_blend() {
    let features = DeviceFeatures {
        independent_blend: false,
        ..Default::default()
    };
    let mut harness = Harness::new(features);
    let bundle = EffectBundle {
        parameters: vec![color_target("A", "A8R8G8B8"), color_target("B", "R32F")],
        techniques: vec![technique(
            "object",
            Some("RenderColorTarget0=A;RenderColorTarget1=B;Pass=P0;"),
            vec![pass("P0", "fs_main")],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let a = effect.image_for_uniform(None, "A").unwrap();
    let b = effect.image_for_uniform(None, "B").unwrap();

    assert_eq!(harness.draw(&mut effect, PassType::Object).draws, 1);
    assert_eq!(harness.draw(&mut effect, PassType::Object).draws, 1);

    let created = harness.count(|command| {
        matches!(command, DeviceCommand::CreateImage { label, .. } if label.contains("Normalized"))
    });
    assert_eq!(created, 2, "one intermediate per attachment, created once");

    // Read and write back each attachment around every draw.
    let blits = harness.count(|command| matches!(command, DeviceCommand::Blit { .. }));
    assert_eq!(blits, 8);

    let Some(DeviceCommand::Draw { pass, pipeline, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    assert_ne!(pass.color_attachments[0], Some(a));
    assert_ne!(pass.color_attachments[1], Some(b));
    let desc = harness.device.pipeline_desc(*pipeline).unwrap();
    assert!(
        desc.color_targets
            .iter()
            .all(|target| target.format == wgpu::TextureFormat::R32Float)
    );
}

#[test]
fn matching_formats_draw_directly() {
    let features = DeviceFeatures {
        independent_blend: false,
        ..Default::default()
    };
    let mut harness = Harness::new(features);
    let bundle = EffectBundle {
        parameters: vec![color_target("A", "A8R8G8B8"), color_target("B", "X8R8G8B8")],
        techniques: vec![technique(
            "object",
            Some("RenderColorTarget0=A;RenderColorTarget1=B;Pass=P0;"),
            vec![pass("P0", "fs_main")],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let a = effect.image_for_uniform(None, "A").unwrap();
    harness.draw(&mut effect, PassType::Object);
    assert_eq!(
        harness.count(|command| matches!(command, DeviceCommand::Blit { .. })),
        0
    );
    let Some(DeviceCommand::Draw { pass, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    assert_eq!(pass.color_attachments[0], Some(a));
}

fn feedback_bundle() -> EffectBundle {
    let mut sampling = pass("P0", "fs_main");
    sampling.samplers.push(SamplerSource {
        name: "ASampler".to_string(),
        texture: "A".to_string(),
        stage: ShaderStage::Pixel,
        slot: 0,
        ..Default::default()
    });
    EffectBundle {
        parameters: vec![color_target("A", "A8R8G8B8")],
        techniques: vec![technique(
            "object",
            Some("RenderColorTarget0=A;Pass=P0;"),
            vec![sampling],
        )],
        ..Default::default()
    }
}

#[test]
fn sampled_output_is_unbound_with_independent_blend() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let mut effect = harness.effect(&feedback_bundle());
    let a = effect.image_for_uniform(None, "A").unwrap();
    harness.draw(&mut effect, PassType::Object);

    let Some(DeviceCommand::Draw { pass, pixel_images, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    assert_eq!(pass.color_attachments[0], Some(a));
    assert_eq!(pixel_images[0].image, harness.frame.fallback_image);
}

#[test]
fn sampled_output_is_copied_without_independent_blend() {
    let features = DeviceFeatures {
        independent_blend: false,
        ..Default::default()
    };
    let mut harness = Harness::new(features);
    let mut effect = harness.effect(&feedback_bundle());
    let a = effect.image_for_uniform(None, "A").unwrap();
    harness.draw(&mut effect, PassType::Object);

    let Some(DeviceCommand::Draw { pass, pixel_images, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    assert_ne!(pass.color_attachments[0], Some(a));
    assert_eq!(pixel_images[0].image, a);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn failed_pipeline_skips_the_draw() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let bundle = EffectBundle {
        techniques: vec![technique("object", None, vec![pass("P0", "fs_main")])],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    harness.device.fail_pipelines = true;
    let summary = harness.draw(&mut effect, PassType::Object);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.draws, 0);

    harness.device.fail_pipelines = false;
    assert_eq!(harness.draw(&mut effect, PassType::Object).draws, 1);
}

#[test]
fn destroy_releases_every_device_object() {
    let mut harness = Harness::new(DeviceFeatures::default());
    let baseline = harness.device.live_image_count();
    let bundle = EffectBundle {
        parameters: vec![color_target("A", "A8R8G8B8")],
        techniques: vec![technique(
            "object",
            Some("RenderColorTarget0=A;Pass=P0;"),
            vec![pass("P0", "fs_main")],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    harness.draw(&mut effect, PassType::Object);
    assert!(harness.device.live_pipeline_count() > 0);
    assert!(harness.device.live_image_count() > baseline);

    effect.destroy(&mut harness.device);
    assert_eq!(harness.device.live_pipeline_count(), 0);
    assert_eq!(harness.device.live_image_count(), baseline);
    assert!(!effect.is_enabled());
}
