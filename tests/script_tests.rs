//! Script Execution Tests
//!
//! Tests for:
//! - Explicit clears with ClearSetColor and undeclared targets
//! - Implicit viewport clears, once per execution
//! - LoopByCount / LoopGetIndex feeding pixel registers
//! - Split scripts run around ScriptExternal
//! - Draw=Buffer and Draw=Geometry restrictions by script class

use glam::{UVec2, Vec4};

use myth_fx::bundle::{PassSource, RegisterMap, RegisterRange, TechniqueSource};
use myth_fx::device::{BufferHandle, DeviceCommand, DrawGeometry, ImageDesc};
use myth_fx::{
    AnnotationValue, Annotations, DrawContext, DrawableKind, DrawableState, Effect, EffectBundle,
    EffectSettings, FrameContext, Material, NoImageResources, ParameterSource, ParameterType,
    PassType, RecordingDevice, RenderDevice, RenderTargetRegistry, SceneSnapshot, TargetImages,
};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Helpers
// ============================================================================

fn string(value: &str) -> AnnotationValue {
    AnnotationValue::String(value.to_string())
}

fn registers(entries: &[(&str, u32)]) -> RegisterMap {
    entries
        .iter()
        .map(|(name, index)| ((*name).to_string(), RegisterRange { index: *index, count: 1 }))
        .collect()
}

fn pass(name: &str, script: Option<&str>, pixel: &[(&str, u32)]) -> PassSource {
    let mut annotations = Annotations::new();
    if let Some(script) = script {
        annotations.insert("Script", string(script));
    }
    PassSource {
        name: name.to_string(),
        annotations,
        vertex_source: "vs".to_string(),
        vertex_entry: "vs_main".to_string(),
        pixel_source: "fs".to_string(),
        pixel_entry: "fs_main".to_string(),
        pixel_registers: registers(pixel),
        vertex_uniform_count: 4,
        pixel_uniform_count: 2,
        ..Default::default()
    }
}

fn scripted(script: &str, passes: Vec<PassSource>) -> TechniqueSource {
    TechniqueSource {
        name: "MainTec".to_string(),
        annotations: [("MMDPass", string("object")), ("Script", string(script))]
            .into_iter()
            .collect(),
        passes,
    }
}

fn parameter(name: &str, semantic: &str, ty: ParameterType, values: &[f32]) -> ParameterSource {
    ParameterSource {
        name: name.to_string(),
        semantic: semantic.to_string(),
        ty,
        values: values.to_vec(),
        ..Default::default()
    }
}

fn post_process_globals() -> ParameterSource {
    ParameterSource {
        annotations: [
            ("ScriptClass", string("sceneorobject")),
            ("ScriptOrder", string("postprocess")),
        ]
        .into_iter()
        .collect(),
        ..parameter("Script", "STANDARDSGLOBAL", ParameterType::Float, &[0.8])
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
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut device = RecordingDevice::new();
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let depth_format = wgpu::TextureFormat::Depth24PlusStencil8;
        let color = device
            .create_image(&ImageDesc::render_target(256, 256, format, 1), "Viewport")
            .unwrap();
        let depth = device
            .create_image(&ImageDesc::render_target(256, 256, depth_format, 1), "ViewportDepth")
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
            size: UVec2::new(256, 256),
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
                vertices: 0..3,
            },
        }
    }

    fn effect(&mut self, bundle: &EffectBundle) -> Effect {
        let features = self.device.features().clone();
        let mut effect = Effect::new(
            "Script.fx",
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

    fn draw_object(&mut self, effect: &mut Effect) -> myth_fx::ExecutionSummary {
        let found = effect
            .find_technique(PassType::Object, &self.material, 0, 1, &self.model, &self.frame)
            .unwrap();
        assert!(!found.fallback);
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

    fn pixel_uniforms(&self) -> Vec<Vec4> {
        self.device
            .draws()
            .filter_map(|command| match command {
                DeviceCommand::Draw { pixel_uniforms, .. } => pixel_uniforms.first().copied(),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Clears
// ============================================================================

#[test]
fn explicit_clear_runs_once_and_undeclared_target_is_ignored() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![parameter("X", "", ParameterType::Float4, &[0.2, 0.4, 0.6, 1.0])],
        techniques: vec![scripted(
            "RenderColorTarget=Foo;ClearSetColor=X;Clear=Color;Pass=P0;Pass=P0;",
            vec![pass("P0", None, &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let summary = harness.draw_object(&mut effect);

    assert_eq!(summary.clears, 1);
    assert_eq!(summary.draws, 2);
    let clears: Vec<_> = harness.device.clears().collect();
    assert_eq!(clears.len(), 1);
    let (pass, action) = clears[0];
    assert_eq!(pass.color_attachments[0], Some(harness.viewport.color));
    assert_eq!(action.color, Some(Vec4::new(0.2, 0.4, 0.6, 1.0)));
    assert_eq!(action.depth, None);
}

#[test]
fn viewport_reset_clears_color_and_depth_once() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        techniques: vec![scripted(
            "RenderColorTarget=;Pass=P0;Pass=P0;",
            vec![pass("P0", None, &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    assert_eq!(effect.techniques()[0].script().clear_color_index, Some(1));
    assert_eq!(effect.techniques()[0].script().clear_depth_index, Some(1));

    let summary = harness.draw_object(&mut effect);
    assert_eq!(summary.clears, 2);
    assert_eq!(summary.draws, 2);
    let actions: Vec<_> = harness.device.clears().map(|(_, action)| *action).collect();
    assert_eq!(actions[0].color, Some(Vec4::ZERO));
    assert_eq!(actions[1].depth, Some(1.0));

    // The implicit clear happens again on the next execution.
    let summary = harness.draw_object(&mut effect);
    assert_eq!(summary.clears, 2);
    assert_eq!(harness.device.clears().count(), 4);
}

#[test]
fn explicit_color_clear_suppresses_implicit_one() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        techniques: vec![scripted(
            "RenderColorTarget=;Clear=Color;Pass=P0;",
            vec![pass("P0", None, &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let summary = harness.draw_object(&mut effect);
    // One explicit color clear, one implicit depth clear.
    assert_eq!(summary.clears, 2);
    let actions: Vec<_> = harness.device.clears().map(|(_, action)| *action).collect();
    assert!(actions[0].color.is_some());
    assert!(actions[1].color.is_none() && actions[1].depth.is_some());
}

#[test]
fn post_process_order_skips_implicit_clear() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![post_process_globals()],
        techniques: vec![scripted(
            "RenderColorTarget=;Pass=P0;",
            vec![pass("P0", Some("Draw=Buffer;"), &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let found = effect.find_scene_technique(PassType::Object).unwrap();
    let context = DrawContext::scene(&harness.scene, &harness.frame);
    let summary = effect.execute(&mut harness.device, &found, context);
    assert_eq!(summary.clears, 0);
    assert_eq!(summary.draws, 1);
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn loop_index_reaches_pixel_registers() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            parameter("Count", "", ParameterType::Int, &[3.0]),
            parameter("Index", "", ParameterType::Float, &[0.0]),
        ],
        techniques: vec![scripted(
            "LoopByCount=Count;LoopGetIndex=Index;Pass=P0;LoopEnd=;",
            vec![pass("P0", None, &[("Index", 0)])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let summary = harness.draw_object(&mut effect);
    assert_eq!(summary.passes, 3);
    assert_eq!(summary.draws, 3);

    let values = harness.pixel_uniforms();
    assert_eq!(values.len(), 3);
    for (expected, value) in values.iter().enumerate() {
        assert!(
            approx(value.x, expected as f32),
            "iteration {expected} wrote {}",
            value.x
        );
    }
}

#[test]
fn host_override_changes_loop_count() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![parameter("Count", "", ParameterType::Int, &[3.0])],
        techniques: vec![scripted(
            "LoopByCount=Count;Pass=P0;LoopEnd=;",
            vec![pass("P0", None, &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    assert!(effect.set_parameter_value("Count", &[Vec4::splat(5.0)]));
    assert_eq!(harness.draw_object(&mut effect).draws, 5);

    assert!(effect.set_parameter_value("Count", &[Vec4::ZERO]));
    assert_eq!(harness.draw_object(&mut effect).draws, 0);
}

// ============================================================================
// Split Scripts
// ============================================================================

#[test]
fn split_script_runs_around_script_external() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            post_process_globals(),
            parameter("ScnMap", "RENDERCOLORTARGET", ParameterType::Texture2D, &[]),
        ],
        techniques: vec![scripted(
            "RenderColorTarget0=ScnMap;Pass=P0;ScriptExternal=Color;RenderColorTarget0=;Pass=P0;",
            vec![pass("P0", Some("Draw=Buffer;"), &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let scene_map = effect.image_for_uniform(None, "ScnMap").unwrap();
    let found = effect.find_scene_technique(PassType::Object).unwrap();

    let context = DrawContext::scene(&harness.scene, &harness.frame);
    let before = effect.execute_pre_external(&mut harness.device, &found, context);
    assert!(!before.completed);
    assert_eq!(before.draws, 1);
    assert_eq!(effect.script_external_color(), Some(scene_map));

    let context = DrawContext::scene(&harness.scene, &harness.frame);
    let after = effect.execute(&mut harness.device, &found, context);
    assert!(after.completed);
    assert_eq!(after.draws, 1);

    let targets: Vec<_> = harness
        .device
        .draws()
        .filter_map(|command| match command {
            DeviceCommand::Draw { pass, .. } => pass.color_attachments[0],
            _ => None,
        })
        .collect();
    assert_eq!(targets, vec![scene_map, harness.viewport.color]);
}

// ============================================================================
// Draw Restrictions
// ============================================================================

#[test]
fn object_effect_rejects_buffer_draws() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        techniques: vec![scripted("Pass=P0;", vec![pass("P0", Some("Draw=Buffer;"), &[])])],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let summary = harness.draw_object(&mut effect);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.draws, 0);
    assert_eq!(harness.device.draws().count(), 0);
}

#[test]
fn unknown_pass_and_nested_pass_are_ignored() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        techniques: vec![scripted(
            "Pass=Missing;Pass=P0;",
            vec![pass("P0", Some("Pass=P0;Draw=Geometry;"), &[])],
        )],
        ..Default::default()
    };
    let mut effect = harness.effect(&bundle);
    let summary = harness.draw_object(&mut effect);
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.draws, 1);
    assert!(summary.completed);
}
