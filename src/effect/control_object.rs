//! Control Objects
//!
//! `CONTROLOBJECT` parameters read state from another drawable:
//!
//! ```text
//! float4x4 HeadMatrix : CONTROLOBJECT < string name = "miku.pmx"; string item = "頭"; >;
//! float    Scale      : CONTROLOBJECT < string name = "(self)"; >;
//! float3   Position   : CONTROLOBJECT < string name = "stage.x"; string item = "XYZ"; >;
//! ```
//!
//! Resolution order is `(self)`, `(OffscreenOwner)`, then a lookup by file
//! name. Targets that resolve to nothing receive fixed defaults.

use glam::{Mat4, Vec4};

use super::semantic::ControlObjectTarget;
use crate::bundle::ParameterType;
use crate::scene::{Drawable, DrawableKind, FrameContext, SceneLookup};

pub const SELF_NAME: &str = "(self)";
pub const OFFSCREEN_OWNER_NAME: &str = "(OffscreenOwner)";

/// Value written for one control object uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue {
    Vector(Vec4),
    Matrix(Mat4),
}

/// A resolved value and what is cached for later script reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSample {
    pub value: ControlValue,
    pub cached: Option<Vec4>,
}

impl ControlSample {
    fn vector(value: Vec4) -> Self {
        Self {
            value: ControlValue::Vector(value),
            cached: Some(value),
        }
    }

    fn splat(value: f32) -> Self {
        Self::vector(Vec4::splat(value))
    }
}

/// Whether `name` refers to a model file rather than an accessory.
#[must_use]
pub fn is_model_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".pmx") || lower.ends_with(".pmd")
}

/// Finds the drawable `target` refers to.
#[must_use]
pub fn resolve_target<'a>(
    target: &ControlObjectTarget,
    scene: &'a dyn SceneLookup,
    frame: &FrameContext,
    current: Option<&'a dyn Drawable>,
) -> Option<&'a dyn Drawable> {
    if target.name == SELF_NAME {
        current
    } else if target.name == OFFSCREEN_OWNER_NAME {
        frame
            .offscreen
            .and_then(|offscreen| offscreen.owner)
            .and_then(|owner| scene.drawable(owner))
    } else {
        let kind = if is_model_name(&target.name) {
            DrawableKind::Model
        } else {
            DrawableKind::Accessory
        };
        scene.find_drawable(&target.name, kind)
    }
}

/// Samples `target` from `drawable`, or from the defaults when the target
/// did not resolve. `None` means nothing is written.
#[must_use]
pub fn sample(target: &ControlObjectTarget, drawable: Option<&dyn Drawable>) -> Option<ControlSample> {
    match drawable {
        Some(drawable) if drawable.kind() == DrawableKind::Model => model_sample(target, drawable),
        Some(drawable) => accessory_sample(target, drawable),
        None => Some(default_sample(target)),
    }
}

fn model_sample(target: &ControlObjectTarget, model: &dyn Drawable) -> Option<ControlSample> {
    if target.item.is_empty() {
        return match target.ty {
            ParameterType::Bool => Some(ControlSample::splat(f32::from(u8::from(model.is_visible())))),
            ParameterType::Float => Some(ControlSample::splat(1.0)),
            ParameterType::Float3 | ParameterType::Float4 => {
                Some(ControlSample::vector(model.origin().extend(1.0)))
            }
            ParameterType::Float4x4 => Some(ControlSample {
                value: ControlValue::Matrix(model.world_transform()),
                cached: None,
            }),
            _ => None,
        };
    }
    if let Some(bone) = model.bone_transform(&target.item) {
        let origin = bone.w_axis.truncate().extend(1.0);
        return match target.ty {
            ParameterType::Float3 | ParameterType::Float4 => Some(ControlSample::vector(origin)),
            ParameterType::Float4x4 => Some(ControlSample {
                value: ControlValue::Matrix(bone),
                cached: Some(origin),
            }),
            _ => None,
        };
    }
    if target.ty == ParameterType::Float
        && let Some(weight) = model.morph_weight(&target.item)
    {
        return Some(ControlSample::splat(weight));
    }
    None
}

fn accessory_sample(target: &ControlObjectTarget, accessory: &dyn Drawable) -> Option<ControlSample> {
    let world = accessory.world_transform();
    let angle = accessory.orientation();
    let sample = match target.item.as_str() {
        "Rxyz" => ControlSample::vector(angle.extend(0.0)),
        "Rx" => ControlSample::splat(angle.x),
        "Ry" => ControlSample::splat(angle.y),
        "Rz" => ControlSample::splat(angle.z),
        "Si" => ControlSample::splat(accessory.scale_factor() * 10.0),
        "Tr" => ControlSample::splat(accessory.opacity()),
        "XYZ" => ControlSample::vector(world.w_axis),
        "X" => ControlSample::splat(world.w_axis.x),
        "Y" => ControlSample::splat(world.w_axis.y),
        "Z" => ControlSample::splat(world.w_axis.z),
        "" => match target.ty {
            ParameterType::Bool => ControlSample::splat(f32::from(u8::from(accessory.is_visible()))),
            ParameterType::Float => ControlSample::splat(accessory.scale_factor() * 10.0),
            ParameterType::Float3 | ParameterType::Float4 => ControlSample::vector(world.w_axis),
            ParameterType::Float4x4 => ControlSample {
                value: ControlValue::Matrix(world),
                cached: None,
            },
            _ => return None,
        },
        _ => return None,
    };
    Some(sample)
}

/// Values of a target whose drawable is not loaded.
#[must_use]
pub fn default_sample(target: &ControlObjectTarget) -> ControlSample {
    match target.ty {
        ParameterType::Bool => ControlSample::splat(0.0),
        ParameterType::Float => {
            let value = match (target.item.is_empty(), is_model_name(&target.name)) {
                (false, _) => 0.0,
                (true, true) => 1.0,
                (true, false) => 10.0,
            };
            ControlSample::splat(value)
        }
        ParameterType::Float4x4 => ControlSample {
            value: ControlValue::Matrix(Mat4::IDENTITY),
            cached: None,
        },
        _ => ControlSample::vector(Vec4::new(0.0, 0.0, 0.0, 1.0)),
    }
}
