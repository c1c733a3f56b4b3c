//! Parameter Binder
//!
//! Writes live scene state into the register files of the pass about to
//! draw. Every setter walks only the buckets the semantic router filled;
//! names the pass does not declare are dropped by the uniform buffer.
//!
//! Besides registers, binding decides which images the draw samples: the
//! material textures by uniform name, and the "first image" that pixel
//! slot 0 receives when no sampler claims it explicitly.

use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use super::control_object::{self, ControlValue};
use super::parameters::ParameterStore;
use super::semantic::{MatrixUniform, SemanticBuckets};
use super::technique::PassType;
use super::uniform_buffer::UniformBuffer;
use crate::bundle::PassSource;
use crate::device::ImageHandle;
use crate::scene::{
    Camera, Drawable, FrameContext, Light, Material, SceneLookup, ShadowCamera, SphereMapMode,
};

const EPSILON: f32 = 1.0e-6;

/// Images chosen while binding one draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawImages {
    /// Pixel slot 0 unless a sampler binds it by name.
    pub first: Option<ImageHandle>,
    /// Texture uniform name to image.
    pub named: FxHashMap<String, ImageHandle>,
}

impl DrawImages {
    pub fn bind(&mut self, uniform: &str, image: ImageHandle) {
        self.named.insert(uniform.to_string(), image);
    }
}

#[inline]
fn flag(value: bool) -> Vec4 {
    Vec4::splat(f32::from(u8::from(value)))
}

#[inline]
fn columns(matrix: Mat4) -> [Vec4; 4] {
    [matrix.x_axis, matrix.y_axis, matrix.z_axis, matrix.w_axis]
}

fn write_all(uniforms: &mut UniformBuffer, layout: &PassSource, names: &[String], value: Vec4) {
    for name in names {
        uniforms.write_one(layout, name, value);
    }
}

fn write_matrices(
    uniforms: &mut UniformBuffer,
    layout: &PassSource,
    matrices: &[MatrixUniform],
    world: Mat4,
    view: Mat4,
    projection: Mat4,
) {
    for matrix in matrices {
        let value = matrix.compose(world, view, projection);
        uniforms.write(layout, &matrix.name, &columns(value));
    }
}

/// Binding session for one draw of one pass.
pub struct Binder<'a> {
    layout: &'a PassSource,
    uniforms: &'a mut UniformBuffer,
    buckets: &'a mut SemanticBuckets,
    pub images: DrawImages,
}

impl<'a> Binder<'a> {
    pub fn new(
        layout: &'a PassSource,
        uniforms: &'a mut UniformBuffer,
        buckets: &'a mut SemanticBuckets,
    ) -> Self {
        Self {
            layout,
            uniforms,
            buckets,
            images: DrawImages::default(),
        }
    }

    #[inline]
    fn write(&mut self, name: &str, value: Vec4) {
        self.uniforms.write_one(self.layout, name, value);
    }

    #[inline]
    fn write_matrix(&mut self, name: &str, matrix: Mat4) {
        self.uniforms.write(self.layout, name, &columns(matrix));
    }

    // ─── Globals ───

    /// Non-semantic uniforms with their current values.
    pub fn set_parameters(&mut self, parameters: &ParameterStore) {
        for (name, value) in parameters.iter() {
            self.uniforms.write(self.layout, name, &value.values);
        }
    }

    /// Viewport, time and mouse state.
    pub fn set_global(&mut self, frame: &FrameContext, base_fps: f32) {
        let layout = self.layout;
        let buckets = &*self.buckets;
        let uniforms = &mut *self.uniforms;
        let fps = base_fps.max(1.0);

        let viewport = frame.primary_target().size.as_vec2();
        write_all(uniforms, layout, &buckets.viewport_pixel_size, Vec4::new(viewport.x, viewport.y, 0.0, 0.0));
        write_all(uniforms, layout, &buckets.time, Vec4::splat(frame.frame_index as f32 / fps));
        write_all(uniforms, layout, &buckets.elapsed_time, Vec4::splat(frame.elapsed_frames / fps));
        write_all(uniforms, layout, &buckets.system_time, Vec4::splat(frame.uptime));
        write_all(uniforms, layout, &buckets.elapsed_system_time, Vec4::splat(frame.elapsed_uptime));
        write_all(
            uniforms,
            layout,
            &buckets.mouse_position,
            Vec4::new(frame.cursor.x, frame.cursor.y, 0.0, 0.0),
        );
        for (names, button) in buckets.mouse_down.iter().zip(&frame.mouse_buttons) {
            let value = Vec4::new(
                frame.cursor.x,
                frame.cursor.y,
                f32::from(u8::from(button.pressed)),
                button.time,
            );
            write_all(uniforms, layout, names, value);
        }
    }

    /// `TEXTUREVALUE` arrays, keyed by uniform name.
    pub fn set_texture_values(&mut self, values: &FxHashMap<String, Vec<Vec4>>) {
        for (name, texels) in values {
            self.uniforms.write(self.layout, name, texels);
        }
    }

    // ─── Camera & Light ───

    pub fn set_camera(&mut self, camera: &Camera, world: Mat4) {
        self.set_camera_matrices(camera, world, world);
        if !self.buckets.camera_position.is_empty() {
            let position = camera.position.extend(1.0);
            write_all(self.uniforms, self.layout, &self.buckets.camera_position, position);
            self.write("Place", position);
        }
        write_all(
            self.uniforms,
            self.layout,
            &self.buckets.camera_direction,
            camera.direction.extend(0.0),
        );
    }

    /// Camera matrices over `world`; `matWorld` receives `legacy_world`.
    fn set_camera_matrices(&mut self, camera: &Camera, world: Mat4, legacy_world: Mat4) {
        if self.buckets.camera_matrices.is_empty() {
            return;
        }
        write_matrices(
            self.uniforms,
            self.layout,
            &self.buckets.camera_matrices,
            world,
            camera.view,
            camera.projection,
        );
        self.write_matrix("matWorld", legacy_world);
        self.write_matrix("matWorldViewProj", camera.projection * camera.view * world);
    }

    /// Light colors and direction. `adjustment` applies the accessory
    /// lighting model.
    pub fn set_light(&mut self, light: &Light, adjustment: bool) {
        if !self.buckets.light_direction.is_empty() {
            let direction = light.direction.normalize_or_zero().extend(0.0);
            write_all(self.uniforms, self.layout, &self.buckets.light_direction, direction);
            self.write("LightDir", direction);
        }
        write_all(
            self.uniforms,
            self.layout,
            &self.buckets.light_position,
            (-light.direction).extend(0.0),
        );
        let (ambient, diffuse) = if adjustment {
            ((light.color - Vec3::splat(0.3)).extend(1.0), Vec4::ONE)
        } else {
            (light.color.extend(1.0), Vec4::ZERO)
        };
        let buckets = &*self.buckets;
        write_all(self.uniforms, self.layout, &buckets.light_ambient, ambient);
        write_all(self.uniforms, self.layout, &buckets.light_diffuse, diffuse);
        write_all(self.uniforms, self.layout, &buckets.light_specular, light.color.extend(1.0));
    }

    pub fn set_light_matrices(&mut self, world: Mat4, view: Mat4, projection: Mat4) {
        write_matrices(
            self.uniforms,
            self.layout,
            &self.buckets.light_matrices,
            world,
            view,
            projection,
        );
    }

    // ─── Drawables ───

    /// Resolves every control object and caches its value.
    pub fn set_control_objects(
        &mut self,
        scene: &dyn SceneLookup,
        frame: &FrameContext,
        current: Option<&dyn Drawable>,
    ) {
        for target in &mut self.buckets.control_objects {
            let drawable = control_object::resolve_target(target, scene, frame, current);
            let Some(sample) = control_object::sample(target, drawable) else {
                continue;
            };
            match sample.value {
                ControlValue::Vector(value) => self.uniforms.write_one(self.layout, &target.uniform, value),
                ControlValue::Matrix(matrix) => {
                    self.uniforms.write(self.layout, &target.uniform, &columns(matrix));
                }
            }
            if let Some(value) = sample.cached {
                target.value = value;
            }
        }
    }

    pub fn set_drawable_counts(&mut self, drawable: &dyn Drawable) {
        self.write("VertexCount", Vec4::splat(drawable.vertex_count() as f32));
        self.write("SubsetCount", Vec4::splat(drawable.material_count() as f32));
        self.write("transp", flag(drawable.opacity() < 1.0));
        self.write("opadd", flag(drawable.is_add_blend_enabled()));
    }

    // ─── Materials ───

    pub fn set_model_material(&mut self, material: &Material, light: &Light, pass_type: PassType) {
        let layout = self.layout;
        let buckets = &*self.buckets;
        let uniforms = &mut *self.uniforms;

        write_all(uniforms, layout, &buckets.material_ambient, material.diffuse.extend(1.0));
        write_all(uniforms, layout, &buckets.material_diffuse, material.diffuse.extend(material.opacity));
        write_all(uniforms, layout, &buckets.material_emissive, material.ambient.extend(1.0));
        let power = if material.specular_power.abs() < EPSILON {
            1.0
        } else {
            material.specular_power
        };
        write_all(uniforms, layout, &buckets.material_specular_power, Vec4::splat(power));
        write_all(uniforms, layout, &buckets.material_specular, material.specular.extend(1.0));

        let factors = [
            (&buckets.adding_texture, "TexCAdd", material.texture_add),
            (&buckets.adding_sphere_texture, "SphCAdd", material.sphere_add),
            (&buckets.multiplying_texture, "TexCMul", material.texture_mul),
            (&buckets.multiplying_sphere_texture, "SphCMul", material.sphere_mul),
        ];
        for (names, alias, value) in factors {
            if !names.is_empty() {
                write_all(uniforms, layout, names, value);
                uniforms.write_one(layout, alias, value);
            }
        }
        write_all(uniforms, layout, &buckets.material_toon_color, material.toon_color);

        self.images.first = material.diffuse_image;
        if let Some(image) = material.diffuse_image {
            for name in &buckets.material_texture {
                self.images.bind(name, image);
            }
        }
        if let Some(image) = material.sphere_map_image {
            for name in &buckets.material_sphere_map {
                self.images.bind(name, image);
            }
        }
        if let Some(image) = material.toon_image {
            if !buckets.material_toon_texture.is_empty() || pass_type == PassType::ObjectSelfShadow {
                for name in &buckets.material_toon_texture {
                    self.images.bind(name, image);
                }
            } else if pass_type == PassType::Object {
                self.images.first = Some(image);
            }
        }

        let light_color = light.color;
        let sphere_mode = if material.sphere_map_image.is_some() {
            material.sphere_map_mode
        } else {
            SphereMapMode::None
        };
        let edge = (material.ambient + material.diffuse * light_color)
            .extend(material.opacity)
            .clamp(Vec4::ZERO, Vec4::ONE);
        self.write("EgColor", edge);
        self.write("SpcColor", (material.specular * light_color).extend(material.specular_power));
        self.write("spadd", flag(sphere_mode == SphereMapMode::Add));
        self.write("use_texture", flag(material.has_diffuse_image()));
        self.write("use_spheremap", flag(sphere_mode != SphereMapMode::None));
        self.write("use_subtexture", flag(sphere_mode == SphereMapMode::SubTexture));
        self.write("use_toon", flag(material.toon_image.is_some()));
    }

    pub fn set_accessory_material(&mut self, material: &Material, drawable_opacity: f32, light: &Light) {
        let layout = self.layout;
        let buckets = &*self.buckets;
        let uniforms = &mut *self.uniforms;

        let diffuse = material.diffuse.extend(material.opacity * drawable_opacity);
        let specular = (material.specular * 0.1).extend(1.0);
        let power = Vec4::splat(material.specular_power);
        write_all(uniforms, layout, &buckets.material_ambient, material.diffuse.extend(1.0));
        write_all(uniforms, layout, &buckets.material_diffuse, diffuse);
        write_all(uniforms, layout, &buckets.material_emissive, material.emissive.truncate().extend(1.0));
        write_all(uniforms, layout, &buckets.material_specular_power, power);
        write_all(uniforms, layout, &buckets.material_specular, specular);
        write_all(uniforms, layout, &buckets.adding_texture, Vec4::ZERO);
        write_all(uniforms, layout, &buckets.adding_sphere_texture, Vec4::ZERO);
        write_all(uniforms, layout, &buckets.multiplying_texture, Vec4::ONE);
        write_all(uniforms, layout, &buckets.multiplying_sphere_texture, Vec4::ONE);
        write_all(uniforms, layout, &buckets.material_toon_color, Vec4::ONE);

        // Accessories carry their sphere map in the diffuse slot.
        let sphere = material.sphere_map_mode != SphereMapMode::None;
        let targets = if sphere {
            &buckets.material_sphere_map
        } else {
            &buckets.material_texture
        };
        if let Some(image) = material.diffuse_image {
            for name in targets {
                self.images.bind(name, image);
            }
        }
        self.images.first = material.diffuse_image;

        let light_color = light.color;
        self.write("use_texture", flag(!sphere));
        self.write("use_spheremap", flag(sphere));
        self.write("spadd", flag(material.sphere_map_mode == SphereMapMode::Add));
        self.write("EgColor", diffuse * (light_color - Vec3::splat(0.3)).extend(1.0));
        self.write("SpcColor", (specular.truncate() * light_color).extend(power.x));
        self.write("use_toon", Vec4::ZERO);
        self.write("use_subtexture", Vec4::ZERO);
    }

    pub fn set_edge(&mut self, material: &Material) {
        write_all(
            self.uniforms,
            self.layout,
            &self.buckets.material_edge_color,
            material.edge_color.extend(material.edge_opacity),
        );
    }

    /// Ground shadow projection and color.
    pub fn set_ground_shadow(&mut self, camera: &Camera, light: &Light, world: Mat4) {
        let shadow = light.ground_shadow_matrix;
        if !self.buckets.camera_matrices.is_empty() {
            write_matrices(
                self.uniforms,
                self.layout,
                &self.buckets.camera_matrices,
                shadow * world,
                camera.view,
                camera.projection,
            );
            self.write_matrix("matWorld", shadow);
            self.write_matrix("matWorldViewProj", camera.projection * camera.view * world);
        }
        let alpha = if light.translucent_ground_shadow { 0.5 } else { 1.0 };
        write_all(
            self.uniforms,
            self.layout,
            &self.buckets.ground_shadow_color,
            light.ground_shadow_color.extend(alpha),
        );
    }

    /// Light matrices from the shadow camera. When self-shadowing is on,
    /// slot 0 samples the shadow map unless the draw writes into it.
    pub fn set_shadow_map(&mut self, shadow_camera: &ShadowCamera, world: Mat4, output: Option<ImageHandle>) {
        self.set_light_matrices(world, shadow_camera.view, shadow_camera.projection);
        if shadow_camera.enabled {
            self.images.first = shadow_camera.image.filter(|image| Some(*image) != output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{ParameterSource, ParameterType, RegisterRange};
    use crate::effect::semantic::SemanticRouter;
    use crate::scene::{DrawableKind, DrawableState, SceneSnapshot, TargetImages};
    use crate::bundle::AnnotationValue;

    fn layout(registers: &[(&str, u32, u32)]) -> PassSource {
        let mut pass = PassSource::default();
        for &(name, index, count) in registers {
            pass.vertex_registers
                .insert(name.to_string(), RegisterRange { index, count });
            pass.vertex_uniform_count = pass.vertex_uniform_count.max(index + count);
        }
        pass
    }

    fn parameter(name: &str, semantic: &str, ty: ParameterType, object: Option<&str>) -> ParameterSource {
        let mut source = ParameterSource {
            name: name.into(),
            semantic: semantic.into(),
            ty,
            ..Default::default()
        };
        if let Some(object) = object {
            source
                .annotations
                .insert("Object", AnnotationValue::String(object.into()));
        }
        source
    }

    fn buckets(parameters: &[ParameterSource]) -> SemanticBuckets {
        let mut router = SemanticRouter::new(false);
        for (index, parameter) in parameters.iter().enumerate() {
            assert!(router.route(index, parameter));
        }
        let (buckets, errors) = router.finish();
        assert!(errors.is_empty(), "{errors:?}");
        buckets
    }

    #[test]
    fn camera_position_and_legacy_alias() {
        let layout = layout(&[("CameraPosition", 0, 1), ("Place", 1, 1)]);
        let mut uniforms = UniformBuffer::for_pass(&layout);
        let mut buckets = buckets(&[parameter(
            "CameraPosition",
            "POSITION",
            ParameterType::Float4,
            Some("Camera"),
        )]);
        let camera = Camera::look_at(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, 45.0, 1.0);
        Binder::new(&layout, &mut uniforms, &mut buckets).set_camera(&camera, Mat4::IDENTITY);
        assert_eq!(uniforms.vertex[0], Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(uniforms.vertex[1], uniforms.vertex[0]);
    }

    #[test]
    fn accessory_lighting_is_adjusted() {
        let layout = layout(&[("LightAmbient", 0, 1), ("LightDiffuse", 1, 1)]);
        let mut uniforms = UniformBuffer::for_pass(&layout);
        let mut buckets = buckets(&[
            parameter("LightAmbient", "AMBIENT", ParameterType::Float3, Some("Light")),
            parameter("LightDiffuse", "DIFFUSE", ParameterType::Float3, Some("Light")),
        ]);
        let light = Light {
            color: Vec3::splat(0.8),
            ..Default::default()
        };
        Binder::new(&layout, &mut uniforms, &mut buckets).set_light(&light, true);
        assert!((uniforms.vertex[0].x - 0.5).abs() < EPSILON);
        assert_eq!(uniforms.vertex[1], Vec4::ONE);

        Binder::new(&layout, &mut uniforms, &mut buckets).set_light(&light, false);
        assert_eq!(uniforms.vertex[0], Vec4::new(0.8, 0.8, 0.8, 1.0));
        assert_eq!(uniforms.vertex[1], Vec4::ZERO);
    }

    #[test]
    fn toon_image_becomes_first_image_for_object_passes() {
        let layout = layout(&[]);
        let mut uniforms = UniformBuffer::for_pass(&layout);
        let mut buckets = SemanticBuckets::default();
        let mut images = slotmap::SlotMap::<ImageHandle, ()>::with_key();
        let toon = images.insert(());
        let material = Material {
            toon_image: Some(toon),
            ..Default::default()
        };
        let mut binder = Binder::new(&layout, &mut uniforms, &mut buckets);
        binder.set_model_material(&material, &Light::default(), PassType::Object);
        assert_eq!(binder.images.first, Some(toon));

        let mut binder = Binder::new(&layout, &mut uniforms, &mut buckets);
        binder.set_model_material(&material, &Light::default(), PassType::Edge);
        assert_eq!(binder.images.first, None);
    }

    #[test]
    fn shadow_map_is_not_sampled_while_written() {
        let layout = layout(&[]);
        let mut uniforms = UniformBuffer::for_pass(&layout);
        let mut buckets = SemanticBuckets::default();
        let mut images = slotmap::SlotMap::<ImageHandle, ()>::with_key();
        let shadow_map = images.insert(());
        let shadow_camera = ShadowCamera {
            enabled: true,
            image: Some(shadow_map),
            ..Default::default()
        };
        let mut binder = Binder::new(&layout, &mut uniforms, &mut buckets);
        binder.set_shadow_map(&shadow_camera, Mat4::IDENTITY, None);
        assert_eq!(binder.images.first, Some(shadow_map));
        binder.set_shadow_map(&shadow_camera, Mat4::IDENTITY, Some(shadow_map));
        assert_eq!(binder.images.first, None);
    }

    #[test]
    fn control_object_values_are_cached() {
        let layout = layout(&[("Scale", 0, 1)]);
        let mut uniforms = UniformBuffer::for_pass(&layout);
        let mut source = parameter("Scale", "CONTROLOBJECT", ParameterType::Float, None);
        source
            .annotations
            .insert("name", AnnotationValue::String("stage.x".into()));
        let mut buckets = buckets(&[source]);
        let mut stage = DrawableState::new(7, DrawableKind::Accessory, "stage.x");
        stage.scale = 2.0;
        let scene = SceneSnapshot {
            drawables: vec![stage],
            ..Default::default()
        };
        let viewport = TargetImages {
            color: ImageHandle::default(),
            depth: None,
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            depth_format: wgpu::TextureFormat::Depth24PlusStencil8,
            sample_count: 1,
            size: glam::UVec2::new(64, 64),
        };
        let frame = FrameContext::new(viewport, ImageHandle::default());
        Binder::new(&layout, &mut uniforms, &mut buckets).set_control_objects(&scene, &frame, None);
        assert_eq!(uniforms.vertex[0], Vec4::splat(20.0));
        assert_eq!(buckets.control_objects[0].value, Vec4::splat(20.0));
    }
}
