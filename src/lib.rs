//! # Myth FX
//!
//! Runtime for pre-compiled MMD-style effect bundles. A bundle carries
//! tagged techniques made of passes, a semantic parameter list and the
//! scripts that sequence render target switches, clears, loops and draws.
//! The runtime selects a technique per material and draw type, binds scene
//! state into register files and drives a [`RenderDevice`].
//!
//! ```rust,ignore
//! use myth_fx::{Effect, EffectBundle, EffectSettings, RenderTargetRegistry};
//!
//! let bundle = EffectBundle::from_json(&source)?;
//! let mut effect = Effect::new(
//!     "Sample.fx",
//!     &bundle,
//!     EffectSettings::default(),
//!     device.features(),
//!     RenderTargetRegistry::shared(),
//! )?;
//! effect.upload(&mut device, &mut images, &viewport)?;
//!
//! if let Some(technique) = effect.find_technique(PassType::Object, &material, 0, count, &model, &frame) {
//!     effect.execute(&mut device, &technique, DrawContext::material(&scene, &frame, &model, &material, 0, None));
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod bundle;
pub mod device;
pub mod effect;
pub mod errors;
pub mod scene;
pub mod settings;

pub use bundle::{AnnotationValue, Annotations, EffectBundle, ParameterSource, ParameterType};
pub use device::{DeviceFeatures, ImageHandle, RecordingDevice, RenderDevice, WgpuDevice};
pub use effect::render_target::{RenderTargetRegistry, SharedRegistry};
pub use effect::resources::{OffscreenCondition, OffscreenRenderTargetOption};
pub use effect::technique::{PassType, TechniqueMatch};
pub use effect::{DrawContext, Effect, ExecutionSummary};
pub use errors::{EffectError, Result};
pub use scene::{
    Camera, DecodedImage, DrawType, Drawable, DrawableId, DrawableKind, DrawableState, FrameContext,
    ImageResourceProvider, Light, Material, NoImageResources, SceneLookup, SceneSnapshot, ShadowCamera,
    TargetImages,
};
pub use settings::EffectSettings;
