//! Semantic Routing
//!
//! Parameters with a recognized semantic are routed, once per upload, into
//! named buckets the binder reads at draw time. Routing goes through a
//! static `(SEMANTIC, handler)` table keyed by the upper-cased semantic.
//!
//! ```text
//! float4x4 WorldViewProjection : WORLDVIEWPROJECTION;      ──► camera_matrices
//! float4   LightDirection : DIRECTION < string Object="Light"; >  ──► light_direction
//! texture  ScnMap : RENDERCOLORTARGET < float2 ViewportRatio = {1,1}; > ──► color_targets
//! ```
//!
//! Handlers validate the declared type and required annotations. Failures
//! are collected as messages; routing never stops at the first error.

use glam::{Mat4, Vec4};

use crate::bundle::{ParameterSource, ParameterType};

// ─── Matrices ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKind {
    World,
    View,
    Projection,
    WorldView,
    ViewProjection,
    WorldViewProjection,
}

/// A matrix semantic with its resolved inverse/transpose flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixUniform {
    pub name: String,
    pub kind: MatrixKind,
    pub inverse: bool,
    pub transpose: bool,
}

impl MatrixUniform {
    #[must_use]
    pub fn compose(&self, world: Mat4, view: Mat4, projection: Mat4) -> Mat4 {
        let matrix = match self.kind {
            MatrixKind::World => world,
            MatrixKind::View => view,
            MatrixKind::Projection => projection,
            MatrixKind::WorldView => view * world,
            MatrixKind::ViewProjection => projection * view,
            MatrixKind::WorldViewProjection => projection * view * world,
        };
        let matrix = if self.inverse { matrix.inverse() } else { matrix };
        if self.transpose { matrix.transpose() } else { matrix }
    }
}

/// Parses `WORLD`, `VIEWPROJECTIONINVERSE`, `WORLDVIEWINVERSETRANSPOSE`...
fn parse_matrix_semantic(semantic: &str) -> Option<(MatrixKind, bool, bool)> {
    let (rest, transpose) = match semantic.strip_suffix("TRANSPOSE") {
        Some(rest) => (rest, true),
        None => (semantic, false),
    };
    let (rest, inverse) = match rest.strip_suffix("INVERSE") {
        Some(rest) => (rest, true),
        None => (rest, false),
    };
    let kind = match rest {
        "WORLD" => MatrixKind::World,
        "VIEW" => MatrixKind::View,
        "PROJECTION" => MatrixKind::Projection,
        "WORLDVIEW" => MatrixKind::WorldView,
        "VIEWPROJECTION" => MatrixKind::ViewProjection,
        "WORLDVIEWPROJECTION" => MatrixKind::WorldViewProjection,
        _ => return None,
    };
    Some((kind, inverse, transpose))
}

// ─── Script Globals ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptClass {
    #[default]
    Object,
    Scene,
    SceneOrObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptOrder {
    #[default]
    Standard,
    PreProcess,
    PostProcess,
}

/// Values declared by the `STANDARDSGLOBAL` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StandardsGlobal {
    pub script_class: ScriptClass,
    pub script_order: ScriptOrder,
    pub script_output: String,
    /// Technique selection script, kept verbatim.
    pub script: String,
}

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// A `CONTROLOBJECT` parameter and its last resolved value.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlObjectTarget {
    pub uniform: String,
    /// `(self)`, `(OffscreenOwner)` or a file name.
    pub name: String,
    /// Bone, morph or item code; empty for the object itself.
    pub item: String,
    pub ty: ParameterType,
    pub value: Vec4,
}

/// Image resource declared by a texture parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageResourceDecl {
    pub uniform: String,
    pub resource_name: String,
}

/// An `ANIMATEDTEXTURE` parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedTextureDecl {
    pub uniform: String,
    pub resource_name: String,
    /// Non-semantic parameter that overrides the playback time.
    pub seek_variable: Option<String>,
    pub offset: f32,
    pub speed: f32,
}

/// Uniform names grouped by the data source that fills them.
#[derive(Debug, Clone, Default)]
pub struct SemanticBuckets {
    pub camera_matrices: Vec<MatrixUniform>,
    pub light_matrices: Vec<MatrixUniform>,
    pub camera_position: Vec<String>,
    pub camera_direction: Vec<String>,
    pub light_position: Vec<String>,
    pub light_direction: Vec<String>,
    pub light_ambient: Vec<String>,
    pub light_diffuse: Vec<String>,
    pub light_specular: Vec<String>,

    pub material_diffuse: Vec<String>,
    pub material_ambient: Vec<String>,
    pub material_emissive: Vec<String>,
    pub material_specular: Vec<String>,
    pub material_specular_power: Vec<String>,
    pub material_toon_color: Vec<String>,
    pub material_edge_color: Vec<String>,
    pub ground_shadow_color: Vec<String>,
    pub material_texture: Vec<String>,
    pub material_sphere_map: Vec<String>,
    pub material_toon_texture: Vec<String>,
    pub adding_texture: Vec<String>,
    pub multiplying_texture: Vec<String>,
    pub adding_sphere_texture: Vec<String>,
    pub multiplying_sphere_texture: Vec<String>,

    pub viewport_pixel_size: Vec<String>,
    pub time: Vec<String>,
    pub elapsed_time: Vec<String>,
    pub system_time: Vec<String>,
    pub elapsed_system_time: Vec<String>,
    pub mouse_position: Vec<String>,
    /// Left, middle, right.
    pub mouse_down: [Vec<String>; 3],

    pub control_objects: Vec<ControlObjectTarget>,
    /// `(uniform, image resource name)`.
    pub texture_values: Vec<(String, String)>,

    /// Indices into the bundle parameter list of resources the effect
    /// creates after routing.
    pub color_targets: Vec<usize>,
    pub depth_stencil_targets: Vec<usize>,
    pub offscreen_targets: Vec<usize>,
    pub image_resources: Vec<ImageResourceDecl>,
    pub animated_textures: Vec<AnimatedTextureDecl>,

    pub standards_global: StandardsGlobal,
}

impl SemanticBuckets {
    #[must_use]
    pub fn control_object(&self, uniform: &str) -> Option<&ControlObjectTarget> {
        self.control_objects
            .iter()
            .find(|target| target.uniform == uniform)
    }
}

// ─── Routing ─────────────────────────────────────────────────────────────────

/// Routing state of one upload.
#[derive(Debug, Default)]
pub struct SemanticRouter {
    pub buckets: SemanticBuckets,
    pub errors: Vec<String>,
    legacy_matrix_convention: bool,
    index: usize,
}

type SemanticHandler = fn(&mut SemanticRouter, &ParameterSource);

const SEMANTIC_HANDLERS: &[(&str, SemanticHandler)] = &[
    ("DIFFUSE", handle_diffuse),
    ("AMBIENT", handle_ambient),
    ("EMISSIVE", handle_emissive),
    ("SPECULAR", handle_specular),
    ("SPECULARPOWER", handle_specular_power),
    ("TOONCOLOR", handle_toon_color),
    ("EDGECOLOR", handle_edge_color),
    ("GROUNDSHADOWCOLOR", handle_ground_shadow_color),
    ("POSITION", handle_position),
    ("DIRECTION", handle_direction),
    ("MATERIALTEXTURE", handle_material_texture),
    ("MATERIALSPHEREMAP", handle_material_sphere_map),
    ("MATERIALTOONTEXTURE", handle_material_toon_texture),
    ("ADDINGTEXTURE", handle_adding_texture),
    ("MULTIPLYINGTEXTURE", handle_multiplying_texture),
    ("ADDINGSPHERETEXTURE", handle_adding_sphere_texture),
    ("MULTIPLYINGSPHERETEXTURE", handle_multiplying_sphere_texture),
    ("VIEWPORTPIXELSIZE", handle_viewport_pixel_size),
    ("TIME", handle_time),
    ("ELAPSEDTIME", handle_elapsed_time),
    ("MOUSEPOSITION", handle_mouse_position),
    ("LEFTMOUSEDOWN", handle_left_mouse_down),
    ("MIDDLEMOUSEDOWN", handle_middle_mouse_down),
    ("RIGHTMOUSEDOWN", handle_right_mouse_down),
    ("CONTROLOBJECT", handle_control_object),
    ("RENDERCOLORTARGET", handle_render_color_target),
    ("RENDERDEPTHSTENCILTARGET", handle_render_depth_stencil_target),
    ("ANIMATEDTEXTURE", handle_animated_texture),
    ("OFFSCREENRENDERTARGET", handle_offscreen_render_target),
    ("TEXTUREVALUE", handle_texture_value),
    ("STANDARDSGLOBAL", handle_standards_global),
];

/// Whether `semantic` is recognized, matrices included.
#[must_use]
pub fn is_known_semantic(semantic: &str) -> bool {
    let upper = semantic.to_ascii_uppercase();
    parse_matrix_semantic(&upper).is_some()
        || SEMANTIC_HANDLERS.iter().any(|(name, _)| *name == upper)
}

impl SemanticRouter {
    #[must_use]
    pub fn new(legacy_matrix_convention: bool) -> Self {
        Self {
            legacy_matrix_convention,
            ..Default::default()
        }
    }

    /// Routes every semantic parameter. Returns `false` for parameters whose
    /// semantic is not recognized.
    pub fn route(&mut self, index: usize, parameter: &ParameterSource) -> bool {
        let semantic = parameter.semantic.to_ascii_uppercase();
        self.index = index;
        if let Some((kind, inverse, transpose)) = parse_matrix_semantic(&semantic) {
            self.route_matrix(parameter, kind, inverse, transpose);
            return true;
        }
        match SEMANTIC_HANDLERS
            .iter()
            .find(|(name, _)| *name == semantic)
        {
            Some((_, handler)) => {
                handler(self, parameter);
                true
            }
            None => false,
        }
    }

    /// Consumes the router, returning buckets and collected errors.
    #[must_use]
    pub fn finish(self) -> (SemanticBuckets, Vec<String>) {
        (self.buckets, self.errors)
    }

    // ─── Error Messages ───

    fn missing_key(&mut self, key: &str, parameter: &ParameterSource) {
        self.errors.push(format!(
            "Required key \"{key}\" of \"{} : {}\" is missing.",
            parameter.name, parameter.semantic
        ));
    }

    fn invalid_value(&mut self, value: &str, parameter: &ParameterSource) {
        self.errors.push(format!(
            "\"{value}\" is invalid at \"{}: {}\".",
            parameter.name, parameter.semantic
        ));
    }

    fn invalid_type(&mut self, expected: ParameterType, parameter: &ParameterSource) {
        self.errors.push(format!(
            "Expected type \"{}\" but actual \"{}\" at \"{}: {}\".",
            expected.name(),
            parameter.ty.name(),
            parameter.name,
            parameter.semantic
        ));
    }

    // ─── Type Checks ───

    /// Vector semantics accept any float vector width.
    fn expect_vector(&mut self, parameter: &ParameterSource) -> bool {
        let ok = matches!(
            parameter.ty,
            ParameterType::Float2 | ParameterType::Float3 | ParameterType::Float4
        );
        if !ok {
            self.invalid_type(ParameterType::Float4, parameter);
        }
        ok
    }

    fn expect_type(&mut self, expected: ParameterType, parameter: &ParameterSource) -> bool {
        let ok = parameter.ty == expected;
        if !ok {
            self.invalid_type(expected, parameter);
        }
        ok
    }

    fn expect_texture(&mut self, parameter: &ParameterSource) -> bool {
        let ok = matches!(parameter.ty, ParameterType::Texture | ParameterType::Texture2D);
        if !ok {
            self.invalid_type(ParameterType::Texture, parameter);
        }
        ok
    }

    fn route_matrix(
        &mut self,
        parameter: &ParameterSource,
        kind: MatrixKind,
        inverse: bool,
        transpose: bool,
    ) {
        if !self.expect_type(ParameterType::Float4x4, parameter) {
            return;
        }
        let uniform = MatrixUniform {
            name: parameter.name.clone(),
            kind,
            inverse,
            transpose: transpose != self.legacy_matrix_convention,
        };
        match parameter.annotations.string("object") {
            None => self.buckets.camera_matrices.push(uniform),
            Some(object) if object.eq_ignore_ascii_case("camera") => {
                self.buckets.camera_matrices.push(uniform);
            }
            Some(object) if object.eq_ignore_ascii_case("light") => {
                self.buckets.light_matrices.push(uniform);
            }
            Some(object) => {
                let object = object.to_string();
                self.invalid_value(&object, parameter);
            }
        }
    }

    /// Resolves the `Object` annotation against the allowed `choices`.
    /// `default` is used when the annotation is absent; `None` makes it
    /// required.
    fn object_target(
        &mut self,
        parameter: &ParameterSource,
        choices: &[ObjectTarget],
        default: Option<ObjectTarget>,
    ) -> Option<ObjectTarget> {
        let Some(object) = parameter.annotations.string("object") else {
            if default.is_none() {
                self.missing_key("Object", parameter);
            }
            return default;
        };
        let found = choices
            .iter()
            .copied()
            .find(|choice| object.eq_ignore_ascii_case(choice.literal()));
        if found.is_none() {
            let object = object.to_string();
            self.invalid_value(&object, parameter);
        }
        found
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectTarget {
    Camera,
    Light,
    Geometry,
}

impl ObjectTarget {
    fn literal(self) -> &'static str {
        match self {
            Self::Camera => "Camera",
            Self::Light => "Light",
            Self::Geometry => "Geometry",
        }
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

fn handle_geometry_or_light(
    router: &mut SemanticRouter,
    parameter: &ParameterSource,
    select: fn(&mut SemanticBuckets, ObjectTarget) -> Option<&mut Vec<String>>,
    choices: &[ObjectTarget],
    default: Option<ObjectTarget>,
) {
    if !router.expect_vector(parameter) {
        return;
    }
    if let Some(target) = router.object_target(parameter, choices, default)
        && let Some(bucket) = select(&mut router.buckets, target)
    {
        bucket.push(parameter.name.clone());
    }
}

fn handle_diffuse(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, target| match target {
            ObjectTarget::Geometry => Some(&mut buckets.material_diffuse),
            ObjectTarget::Light => Some(&mut buckets.light_diffuse),
            ObjectTarget::Camera => None,
        },
        &[ObjectTarget::Geometry, ObjectTarget::Light],
        None,
    );
}

fn handle_ambient(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, target| match target {
            ObjectTarget::Geometry => Some(&mut buckets.material_ambient),
            ObjectTarget::Light => Some(&mut buckets.light_ambient),
            ObjectTarget::Camera => None,
        },
        &[ObjectTarget::Geometry, ObjectTarget::Light],
        None,
    );
}

fn handle_emissive(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, _| Some(&mut buckets.material_emissive),
        &[ObjectTarget::Geometry],
        None,
    );
}

fn handle_specular(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, target| match target {
            ObjectTarget::Geometry => Some(&mut buckets.material_specular),
            ObjectTarget::Light => Some(&mut buckets.light_specular),
            ObjectTarget::Camera => None,
        },
        &[ObjectTarget::Geometry, ObjectTarget::Light],
        None,
    );
}

fn handle_specular_power(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_type(ParameterType::Float, parameter)
        && router
            .object_target(parameter, &[ObjectTarget::Geometry], Some(ObjectTarget::Geometry))
            .is_some()
    {
        router
            .buckets
            .material_specular_power
            .push(parameter.name.clone());
    }
}

fn handle_toon_color(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, _| Some(&mut buckets.material_toon_color),
        &[ObjectTarget::Geometry],
        Some(ObjectTarget::Geometry),
    );
}

fn handle_edge_color(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, _| Some(&mut buckets.material_edge_color),
        &[ObjectTarget::Geometry],
        Some(ObjectTarget::Geometry),
    );
}

fn handle_ground_shadow_color(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_vector(parameter) {
        router.buckets.ground_shadow_color.push(parameter.name.clone());
    }
}

fn handle_position(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, target| match target {
            ObjectTarget::Camera => Some(&mut buckets.camera_position),
            ObjectTarget::Light => Some(&mut buckets.light_position),
            ObjectTarget::Geometry => None,
        },
        &[ObjectTarget::Camera, ObjectTarget::Light],
        None,
    );
}

fn handle_direction(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_geometry_or_light(
        router,
        parameter,
        |buckets, target| match target {
            ObjectTarget::Camera => Some(&mut buckets.camera_direction),
            ObjectTarget::Light => Some(&mut buckets.light_direction),
            ObjectTarget::Geometry => None,
        },
        &[ObjectTarget::Camera, ObjectTarget::Light],
        None,
    );
}

fn handle_texture_bucket(
    router: &mut SemanticRouter,
    parameter: &ParameterSource,
    select: fn(&mut SemanticBuckets) -> &mut Vec<String>,
) {
    if router.expect_texture(parameter) {
        select(&mut router.buckets).push(parameter.name.clone());
    }
}

fn handle_material_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_texture_bucket(router, parameter, |buckets| &mut buckets.material_texture);
}

fn handle_material_sphere_map(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_texture_bucket(router, parameter, |buckets| &mut buckets.material_sphere_map);
}

fn handle_material_toon_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_texture_bucket(router, parameter, |buckets| &mut buckets.material_toon_texture);
}

fn handle_blend_factor(
    router: &mut SemanticRouter,
    parameter: &ParameterSource,
    select: fn(&mut SemanticBuckets) -> &mut Vec<String>,
) {
    if router.expect_vector(parameter) {
        select(&mut router.buckets).push(parameter.name.clone());
    }
}

fn handle_adding_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.adding_texture);
}

fn handle_multiplying_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.multiplying_texture);
}

fn handle_adding_sphere_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.adding_sphere_texture);
}

fn handle_multiplying_sphere_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| {
        &mut buckets.multiplying_sphere_texture
    });
}

fn handle_viewport_pixel_size(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.viewport_pixel_size);
}

fn handle_time(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_type(ParameterType::Float, parameter) {
        let synced = parameter.annotations.bool("syncineditmode").unwrap_or(false);
        let bucket = if synced {
            &mut router.buckets.time
        } else {
            &mut router.buckets.system_time
        };
        bucket.push(parameter.name.clone());
    }
}

fn handle_elapsed_time(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_type(ParameterType::Float, parameter) {
        let synced = parameter.annotations.bool("syncineditmode").unwrap_or(false);
        let bucket = if synced {
            &mut router.buckets.elapsed_time
        } else {
            &mut router.buckets.elapsed_system_time
        };
        bucket.push(parameter.name.clone());
    }
}

fn handle_mouse_position(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.mouse_position);
}

fn handle_left_mouse_down(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.mouse_down[0]);
}

fn handle_middle_mouse_down(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.mouse_down[1]);
}

fn handle_right_mouse_down(router: &mut SemanticRouter, parameter: &ParameterSource) {
    handle_blend_factor(router, parameter, |buckets| &mut buckets.mouse_down[2]);
}

fn handle_control_object(router: &mut SemanticRouter, parameter: &ParameterSource) {
    let Some(name) = parameter.annotations.string("name") else {
        router.missing_key("Name", parameter);
        return;
    };
    router.buckets.control_objects.push(ControlObjectTarget {
        uniform: parameter.name.clone(),
        name: name.to_string(),
        item: parameter
            .annotations
            .string("item")
            .unwrap_or_default()
            .to_string(),
        ty: parameter.ty,
        value: Vec4::ZERO,
    });
}

fn handle_render_color_target(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_texture(parameter) {
        router.buckets.color_targets.push(router.index);
    }
}

fn handle_render_depth_stencil_target(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_texture(parameter) {
        router.buckets.depth_stencil_targets.push(router.index);
    }
}

fn handle_offscreen_render_target(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if router.expect_texture(parameter) {
        router.buckets.offscreen_targets.push(router.index);
    }
}

fn handle_animated_texture(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if !router.expect_texture(parameter) {
        return;
    }
    let annotations = &parameter.annotations;
    let Some(resource_name) = annotations.string("resourcename") else {
        router.missing_key("ResourceName", parameter);
        return;
    };
    router.buckets.animated_textures.push(AnimatedTextureDecl {
        uniform: parameter.name.clone(),
        resource_name: resource_name.to_string(),
        seek_variable: annotations
            .string("seekvariable")
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        offset: annotations.float("offset").unwrap_or(0.0),
        speed: annotations.float("speed").unwrap_or(1.0),
    });
}

fn handle_texture_value(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if !router.expect_vector(parameter) {
        return;
    }
    let annotations = &parameter.annotations;
    match annotations
        .string("resourcename")
        .or_else(|| annotations.string("texturename"))
    {
        Some(target) => router
            .buckets
            .texture_values
            .push((parameter.name.clone(), target.to_string())),
        None => router.missing_key("TextureName", parameter),
    }
}

fn handle_standards_global(router: &mut SemanticRouter, parameter: &ParameterSource) {
    if !router.expect_type(ParameterType::Float, parameter) {
        return;
    }
    let annotations = &parameter.annotations;
    if let Some(output) = annotations.string("scriptoutput") {
        if output.eq_ignore_ascii_case("color") {
            router.buckets.standards_global.script_output = output.to_string();
        } else {
            let output = output.to_string();
            router.invalid_value(&output, parameter);
        }
    }
    if let Some(class) = annotations.string("scriptclass") {
        let class = class.to_string();
        match class.to_ascii_lowercase().as_str() {
            "object" => router.buckets.standards_global.script_class = ScriptClass::Object,
            "scene" => router.buckets.standards_global.script_class = ScriptClass::Scene,
            "sceneorobject" => {
                router.buckets.standards_global.script_class = ScriptClass::SceneOrObject;
            }
            _ => router.invalid_value(&class, parameter),
        }
    }
    if let Some(order) = annotations.string("scriptorder") {
        let order = order.to_string();
        match order.to_ascii_lowercase().as_str() {
            "standard" => router.buckets.standards_global.script_order = ScriptOrder::Standard,
            "preprocess" => router.buckets.standards_global.script_order = ScriptOrder::PreProcess,
            "postprocess" => {
                router.buckets.standards_global.script_order = ScriptOrder::PostProcess;
            }
            _ => router.invalid_value(&order, parameter),
        }
    }
    if let Some(script) = annotations.string("script") {
        router.buckets.standards_global.script = script.to_string();
    }
}
