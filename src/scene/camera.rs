use glam::{Mat4, Vec3};

use crate::device::ImageHandle;

use super::TargetImages;

/// Viewing camera of the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub direction: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 10.0, -45.0), Vec3::new(0.0, 10.0, 0.0), 30.0, 16.0 / 9.0)
    }
}

impl Camera {
    /// Perspective camera at `eye` looking at `target`. `fov` is in degrees.
    #[must_use]
    pub fn look_at(eye: Vec3, target: Vec3, fov: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_lh(eye, target, Vec3::Y),
            projection: Mat4::perspective_lh(fov.to_radians(), aspect, 0.5, 10000.0),
            position: eye,
            direction: (target - eye).normalize_or_zero(),
        }
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// The single directional light.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub color: Vec3,
    pub direction: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    /// Projects geometry onto the ground plane.
    pub ground_shadow_matrix: Mat4,
    pub ground_shadow_color: Vec3,
    pub translucent_ground_shadow: bool,
}

impl Default for Light {
    fn default() -> Self {
        let direction = Vec3::new(-0.5, -1.0, 0.5);
        Self {
            color: Vec3::splat(154.0 / 255.0),
            direction,
            view: Mat4::look_at_lh(-direction * 50.0, Vec3::ZERO, Vec3::Y),
            projection: Mat4::orthographic_lh(-50.0, 50.0, -50.0, 50.0, 0.1, 200.0),
            ground_shadow_matrix: Mat4::IDENTITY,
            ground_shadow_color: Vec3::ZERO,
            translucent_ground_shadow: false,
        }
    }
}

/// Self-shadow depth camera.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowCamera {
    pub enabled: bool,
    pub view: Mat4,
    pub projection: Mat4,
    /// Shadow depth image sampled by object passes.
    pub image: Option<ImageHandle>,
    /// Target the zplot pass renders into.
    pub target: Option<TargetImages>,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            enabled: false,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            image: None,
            target: None,
        }
    }
}
