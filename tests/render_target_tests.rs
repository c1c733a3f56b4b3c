//! Render Target Tests
//!
//! Tests for:
//! - Format and ViewportRatio / Width / Height sizing of declared targets
//! - Shared targets aliased across effects through one registry
//! - Shared mip chains rebuilt after a resize by another effect
//! - Per-drawable copies of owned targets, created once per drawable
//! - Depth-stencil targets following the active color target
//! - Viewport resizes
//! - Offscreen render target options and images
//! - Image size limits

use glam::{UVec2, Vec4};

use myth_fx::bundle::{PassSource, TechniqueSource};
use myth_fx::device::{BufferHandle, DeviceCommand, DrawGeometry, ImageDesc};
use myth_fx::{
    AnnotationValue, Annotations, DrawContext, DrawableId, DrawableKind, DrawableState, Effect,
    EffectBundle, EffectError, EffectSettings, FrameContext, Material, NoImageResources,
    ParameterSource, ParameterType, PassType, RecordingDevice, RenderDevice, RenderTargetRegistry,
    SceneSnapshot, SharedRegistry, TargetImages,
};

// ============================================================================
// Helpers
// ============================================================================

fn string(value: &str) -> AnnotationValue {
    AnnotationValue::String(value.to_string())
}

fn target(name: &str, semantic: &str, annotations: Annotations) -> ParameterSource {
    ParameterSource {
        name: name.to_string(),
        semantic: semantic.to_string(),
        ty: ParameterType::Texture2D,
        annotations,
        ..Default::default()
    }
}

fn color_target(name: &str, annotations: Annotations) -> ParameterSource {
    target(name, "RENDERCOLORTARGET", annotations)
}

fn technique(script: &str) -> TechniqueSource {
    TechniqueSource {
        name: "MainTec".to_string(),
        annotations: [("MMDPass", string("object")), ("Script", string(script))]
            .into_iter()
            .collect(),
        passes: vec![PassSource {
            name: "P0".to_string(),
            vertex_source: "vs".to_string(),
            vertex_entry: "vs_main".to_string(),
            pixel_source: "fs".to_string(),
            pixel_entry: "fs_main".to_string(),
            ..Default::default()
        }],
    }
}

struct Harness {
    device: RecordingDevice,
    registry: SharedRegistry,
    frame: FrameContext,
    viewport: TargetImages,
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
            registry: RenderTargetRegistry::shared(),
            frame: FrameContext::new(viewport, fallback),
            viewport,
        }
    }

    fn effect(&mut self, name: &str, bundle: &EffectBundle) -> Effect {
        let features = self.device.features().clone();
        let mut effect = Effect::new(
            name,
            bundle,
            EffectSettings::default(),
            &features,
            self.registry.clone(),
        )
        .unwrap();
        effect
            .upload(&mut self.device, &mut NoImageResources, &self.viewport)
            .unwrap();
        effect
    }

    fn size_of(&self, image: myth_fx::ImageHandle) -> (u32, u32) {
        self.device.image_desc(image).unwrap().size()
    }
}

// ============================================================================
// Sizing & Formats
// ============================================================================

#[test]
fn viewport_ratio_and_format_annotations() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            color_target(
                "Half",
                [
                    ("ViewportRatio", AnnotationValue::Vector(Vec4::new(0.5, 0.5, 0.0, 0.0))),
                    ("Format", string("A16B16G16R16F")),
                    ("MipLevels", AnnotationValue::Int(0)),
                ]
                .into_iter()
                .collect(),
            ),
            color_target(
                "Fixed",
                [
                    ("Width", AnnotationValue::Int(64)),
                    ("Height", AnnotationValue::Int(32)),
                    ("Format", string("R32F")),
                ]
                .into_iter()
                .collect(),
            ),
            color_target("Full", Annotations::new()),
        ],
        ..Default::default()
    };
    let effect = harness.effect("Sizes.fx", &bundle);

    let half = effect.image_for_uniform(None, "Half").unwrap();
    let desc = harness.device.image_desc(half).unwrap();
    assert_eq!(desc.size(), (128, 128));
    assert_eq!(desc.format, wgpu::TextureFormat::Rgba16Float);
    assert_eq!(desc.mip_level_count, 8, "MipLevels = 0 requests the full chain");

    let fixed = effect.image_for_uniform(None, "Fixed").unwrap();
    let desc = harness.device.image_desc(fixed).unwrap();
    assert_eq!(desc.size(), (64, 32));
    assert_eq!(desc.format, wgpu::TextureFormat::R32Float);
    assert_eq!(desc.mip_level_count, 1);

    let full = effect.image_for_uniform(None, "Full").unwrap();
    let desc = harness.device.image_desc(full).unwrap();
    assert_eq!(desc.size(), (256, 256));
    assert_eq!(desc.format, EffectSettings::default().default_color_format);
}

#[test]
fn resize_follows_viewport_relative_targets_only() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            color_target(
                "Half",
                [("ViewportRatio", AnnotationValue::Vector(Vec4::new(0.5, 0.5, 0.0, 0.0)))]
                    .into_iter()
                    .collect(),
            ),
            color_target(
                "Fixed",
                [("Width", AnnotationValue::Int(64)), ("Height", AnnotationValue::Int(64))]
                    .into_iter()
                    .collect(),
            ),
        ],
        ..Default::default()
    };
    let mut effect = harness.effect("Resize.fx", &bundle);
    let half = effect.image_for_uniform(None, "Half").unwrap();
    let fixed = effect.image_for_uniform(None, "Fixed").unwrap();

    effect
        .resize_all_render_targets(&mut harness.device, UVec2::new(512, 300), 1)
        .unwrap();

    let resized = effect.image_for_uniform(None, "Half").unwrap();
    assert_ne!(resized, half);
    assert!(!harness.device.is_image_alive(half));
    assert_eq!(harness.size_of(resized), (256, 150));
    assert_eq!(effect.image_for_uniform(None, "Fixed"), Some(fixed));
    assert_eq!(harness.size_of(fixed), (64, 64));
}

#[test]
fn oversized_declaration_is_rejected() {
    let harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![color_target(
            "Huge",
            [("Width", AnnotationValue::Int(20000)), ("Height", AnnotationValue::Int(16))]
                .into_iter()
                .collect(),
        )],
        ..Default::default()
    };
    let result = Effect::new(
        "Huge.fx",
        &bundle,
        EffectSettings::default(),
        harness.device.features(),
        harness.registry.clone(),
    );
    match result {
        Err(EffectError::ExceedsLimits { actual, limit, .. }) => {
            assert_eq!(actual, 20000);
            assert_eq!(limit, 16384);
        }
        other => panic!("expected a limit error, got {other:?}"),
    }
}

// ============================================================================
// Shared Targets
// ============================================================================

#[test]
fn shared_targets_alias_across_effects() {
    let mut harness = Harness::new();
    let shared = |annotations: Annotations| ParameterSource {
        shared: true,
        ..color_target("SharedMap", annotations)
    };
    let first = EffectBundle {
        parameters: vec![shared(Annotations::new())],
        ..Default::default()
    };
    let second = EffectBundle {
        parameters: vec![shared(
            [("Width", AnnotationValue::Int(64)), ("Height", AnnotationValue::Int(64))]
                .into_iter()
                .collect(),
        )],
        ..Default::default()
    };
    let mut a = harness.effect("A.fx", &first);
    let mut b = harness.effect("B.fx", &second);

    let image = a.image_for_uniform(None, "SharedMap").unwrap();
    assert_eq!(b.image_for_uniform(None, "SharedMap"), Some(image));
    assert_eq!(harness.registry.lock().references("SharedMap"), 2);
    // The later declaration aliases the first image, whatever its size.
    assert_eq!(harness.size_of(image), (256, 256));

    a.destroy(&mut harness.device);
    assert!(harness.device.is_image_alive(image));
    assert_eq!(harness.registry.lock().references("SharedMap"), 1);
    assert_eq!(b.image_for_uniform(None, "SharedMap"), Some(image));

    b.destroy(&mut harness.device);
    assert!(!harness.device.is_image_alive(image));
    assert!(!harness.registry.lock().contains("SharedMap"));
}

#[test]
fn shared_target_resize_is_seen_by_every_alias() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![ParameterSource {
            shared: true,
            ..color_target("SharedMap", Annotations::new())
        }],
        ..Default::default()
    };
    let mut a = harness.effect("A.fx", &bundle);
    let b = harness.effect("B.fx", &bundle);
    let before = b.image_for_uniform(None, "SharedMap").unwrap();

    a.resize_all_render_targets(&mut harness.device, UVec2::new(128, 64), 1)
        .unwrap();

    let after = b.image_for_uniform(None, "SharedMap").unwrap();
    assert_ne!(before, after);
    assert_eq!(a.image_for_uniform(None, "SharedMap"), Some(after));
    assert_eq!(harness.size_of(after), (128, 64));
}

#[test]
fn shared_mip_chain_follows_resize_from_another_effect() {
    let mut harness = Harness::new();
    let glow = ParameterSource {
        shared: true,
        ..color_target(
            "Glow",
            [
                ("ViewportRatio", AnnotationValue::Vector(Vec4::new(0.5, 0.5, 0.0, 0.0))),
                ("MipLevels", AnnotationValue::Int(0)),
            ]
            .into_iter()
            .collect(),
        )
    };
    let bundle = EffectBundle {
        parameters: vec![glow],
        techniques: vec![technique("RenderColorTarget0=Glow;Pass=P0;")],
        ..Default::default()
    };
    let mut a = harness.effect("A.fx", &bundle);
    let mut b = harness.effect("B.fx", &bundle);
    let image = b.image_for_uniform(None, "Glow").unwrap();
    assert_eq!(harness.device.image_desc(image).unwrap().mip_level_count, 8);

    // Only the first effect follows the viewport.
    a.resize_all_render_targets(&mut harness.device, UVec2::new(64, 64), 1)
        .unwrap();
    let image = b.image_for_uniform(None, "Glow").unwrap();
    let desc = harness.device.image_desc(image).unwrap();
    assert_eq!(desc.size(), (32, 32));
    assert_eq!(desc.mip_level_count, 6);

    let scene = SceneSnapshot::default();
    let model = DrawableState::new(1, DrawableKind::Model, "model.pmx");
    let material = Material::default();
    let geometry = DrawGeometry::Vertices {
        vertex_buffer: BufferHandle::default(),
        vertices: 0..3,
    };
    let found = b
        .find_technique(PassType::Object, &material, 0, 1, &model, &harness.frame)
        .unwrap();
    let context = DrawContext::material(&scene, &harness.frame, &model, &material, 0, Some(&geometry));
    b.execute(&mut harness.device, &found, context);

    harness.device.clear_commands();
    b.generate_render_target_mipmaps(&mut harness.device);
    let copies: Vec<(myth_fx::ImageHandle, u32)> = harness
        .device
        .commands()
        .iter()
        .filter_map(|command| match command {
            DeviceCommand::CopyToMipLevel { source, destination, mip_level } => {
                assert_eq!(*destination, image);
                Some((*source, *mip_level))
            }
            _ => None,
        })
        .collect();
    assert_eq!(copies.iter().map(|(_, level)| *level).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    for (source, level) in copies {
        let side = 32 >> level;
        assert_eq!(harness.size_of(source), (side, side));
    }
}

// ============================================================================
// Per-Drawable Targets
// ============================================================================

#[test]
fn repeated_drawable_clone_keeps_one_copy() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![color_target("Local", Annotations::new())],
        ..Default::default()
    };
    let mut effect = harness.effect("Clone.fx", &bundle);
    let owner = DrawableId(3);
    let baseline = harness.device.live_image_count();

    effect
        .create_drawable_render_targets(&mut harness.device, owner)
        .unwrap();
    let copy = effect.image_for_uniform(Some(owner), "Local").unwrap();
    effect
        .create_drawable_render_targets(&mut harness.device, owner)
        .unwrap();
    assert_eq!(effect.image_for_uniform(Some(owner), "Local"), Some(copy));
    assert_eq!(harness.device.live_image_count(), baseline + 1);

    effect.destroy_drawable_render_targets(&mut harness.device, owner);
    assert_eq!(harness.device.live_image_count(), baseline);
}

#[test]
fn drawables_get_private_copies_of_owned_targets() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            color_target("Local", Annotations::new()),
            ParameterSource {
                shared: true,
                ..color_target("SharedMap", Annotations::new())
            },
        ],
        techniques: vec![technique("RenderColorTarget0=Local;Pass=P0;")],
        ..Default::default()
    };
    let mut effect = harness.effect("Clone.fx", &bundle);
    let owner = DrawableId(7);
    let base = effect.image_for_uniform(None, "Local").unwrap();
    effect
        .create_drawable_render_targets(&mut harness.device, owner)
        .unwrap();

    let copy = effect.image_for_uniform(Some(owner), "Local").unwrap();
    assert_ne!(copy, base);
    assert_eq!(
        effect.image_for_uniform(Some(owner), "SharedMap"),
        effect.image_for_uniform(None, "SharedMap")
    );

    // Draws of the owner render into its copy.
    let scene = SceneSnapshot::default();
    let model = DrawableState::new(owner.0, DrawableKind::Model, "owner.pmx");
    let material = Material::default();
    let geometry = DrawGeometry::Vertices {
        vertex_buffer: BufferHandle::default(),
        vertices: 0..3,
    };
    let found = effect
        .find_technique(PassType::Object, &material, 0, 1, &model, &harness.frame)
        .unwrap();
    let context = DrawContext::material(&scene, &harness.frame, &model, &material, 0, Some(&geometry));
    effect.execute(&mut harness.device, &found, context);
    let Some(DeviceCommand::Draw { pass, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    assert_eq!(pass.color_attachments[0], Some(copy));

    effect.destroy_drawable_render_targets(&mut harness.device, owner);
    assert!(!harness.device.is_image_alive(copy));
    assert_eq!(effect.image_for_uniform(Some(owner), "Local"), Some(base));
}

// ============================================================================
// Depth-Stencil Targets
// ============================================================================

#[test]
fn depth_target_matches_active_color_target() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![
            color_target(
                "Half",
                [("ViewportRatio", AnnotationValue::Vector(Vec4::new(0.5, 0.5, 0.0, 0.0)))]
                    .into_iter()
                    .collect(),
            ),
            target(
                "HalfDepth",
                "RENDERDEPTHSTENCILTARGET",
                [("Format", string("D24S8"))].into_iter().collect(),
            ),
        ],
        techniques: vec![technique(
            "RenderColorTarget0=Half;RenderDepthStencilTarget=HalfDepth;Pass=P0;",
        )],
        ..Default::default()
    };
    let mut effect = harness.effect("Depth.fx", &bundle);
    let scene = SceneSnapshot::default();
    let model = DrawableState::new(1, DrawableKind::Model, "model.pmx");
    let material = Material::default();
    let geometry = DrawGeometry::Vertices {
        vertex_buffer: BufferHandle::default(),
        vertices: 0..3,
    };
    let found = effect
        .find_technique(PassType::Object, &material, 0, 1, &model, &harness.frame)
        .unwrap();
    let context = DrawContext::material(&scene, &harness.frame, &model, &material, 0, Some(&geometry));
    assert_eq!(effect.execute(&mut harness.device, &found, context).draws, 1);

    let Some(DeviceCommand::Draw { pass, .. }) = harness.device.draws().last() else {
        panic!("no draw recorded");
    };
    let depth = pass.depth_stencil_attachment.unwrap();
    assert_ne!(Some(depth), harness.viewport.depth);
    let desc = harness.device.image_desc(depth).unwrap();
    assert_eq!(desc.size(), (128, 128));
    assert_eq!(desc.format, wgpu::TextureFormat::Depth24PlusStencil8);
}

// ============================================================================
// Offscreen Render Targets
// ============================================================================

#[test]
fn offscreen_options_describe_declared_targets() {
    let mut harness = Harness::new();
    let bundle = EffectBundle {
        parameters: vec![target(
            "MirrorRT",
            "OFFSCREENRENDERTARGET",
            [
                ("Description", string("Mirror reflection")),
                ("ClearColor", AnnotationValue::Vector(Vec4::new(0.0, 0.5, 2.0, 1.0))),
                ("ClearDepth", AnnotationValue::Float(1.0)),
                ("AntiAlias", AnnotationValue::Bool(true)),
                ("DefaultEffect", string("self = hide; *.pmx = Outline.fx; * = none")),
            ]
            .into_iter()
            .collect(),
        )],
        ..Default::default()
    };
    let mut effect = harness.effect("Mirror.fx", &bundle);

    let options = effect.offscreen_options();
    assert_eq!(options.len(), 1);
    let option = options[0];
    assert_eq!(option.name, "MirrorRT");
    assert_eq!(option.description, "Mirror reflection");
    assert_eq!(option.clear_color, Vec4::new(0.0, 0.5, 1.0, 1.0));
    assert!(option.anti_alias);
    assert_eq!(option.conditions.len(), 3);
    assert_eq!(option.effect_for("stage.x", true), Some("hide"));
    assert_eq!(option.effect_for("Miku.PMX", false), Some("Outline.fx"));
    assert_eq!(option.effect_for("stage.x", false), Some("none"));

    let images = effect
        .offscreen_target_images(&mut harness.device, "MirrorRT")
        .unwrap();
    assert_eq!(Some(images.color), effect.image_for_uniform(None, "MirrorRT"));
    assert_eq!(images.size, UVec2::new(256, 256));
    assert!(images.depth.is_some());
    assert!(
        effect
            .offscreen_target_images(&mut harness.device, "Missing")
            .is_none()
    );
}
