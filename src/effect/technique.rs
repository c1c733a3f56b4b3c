//! Techniques
//!
//! A technique is a tagged group of passes plus the script that sequences
//! them. Selection goes through the `MMDPass` tag, the material `Subset`
//! and the `UseTexture` / `UseSphereMap` / `UseToon` criteria.
//!
//! ```text
//! technique MainTec < string MMDPass = "object"; string Subset = "0-2"; bool UseTexture = true; >
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::pass::Pass;
use super::pipeline::PipelineCache;
use super::script::{Script, default_technique_script, parse_script};
use super::subset::subset_matches;
use crate::bundle::{Annotations, TechniqueSource};
use crate::device::RenderDevice;
use crate::scene::{DrawType, DrawableKind, Material, MaterialFlags, SphereMapMode};

// ─── Pass Types ──────────────────────────────────────────────────────────────

/// What a technique is drawn for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassType {
    Object,
    ObjectSelfShadow,
    /// Ground shadow.
    Shadow,
    Edge,
    /// Self-shadow depth map.
    Zplot,
}

impl PassType {
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::ObjectSelfShadow => "object_ss",
            Self::Shadow => "shadow",
            Self::Edge => "edge",
            Self::Zplot => "zplot",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag.to_ascii_lowercase().as_str() {
            "object" => Self::Object,
            "object_ss" => Self::ObjectSelfShadow,
            "shadow" => Self::Shadow,
            "edge" => Self::Edge,
            "zplot" => Self::Zplot,
            _ => return None,
        })
    }

    /// Pass type requested for a draw of `draw_type`.
    #[must_use]
    pub fn for_draw(draw_type: DrawType, self_shadow: bool) -> Self {
        match draw_type {
            DrawType::Color | DrawType::ScriptExternalColor if self_shadow => Self::ObjectSelfShadow,
            DrawType::Color | DrawType::ScriptExternalColor => Self::Object,
            DrawType::Edge => Self::Edge,
            DrawType::GroundShadow => Self::Shadow,
            DrawType::ShadowMap => Self::Zplot,
        }
    }

    /// Tags tried in order: the requested one, `object` for self-shadowed
    /// objects, then the untagged techniques.
    #[must_use]
    pub fn candidate_tags(self) -> [Option<&'static str>; 3] {
        let base = (self == Self::ObjectSelfShadow).then_some(Self::Object.tag());
        [Some(self.tag()), base, Some("")]
    }
}

/// Pipeline state a matched technique imposes on top of explicit pass
/// states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PipelineOverrides {
    /// `Some(None)` disables culling.
    pub cull_mode: Option<Option<wgpu::Face>>,
    pub front_face: Option<wgpu::FrontFace>,
    pub topology: Option<wgpu::PrimitiveTopology>,
    pub shadow_depth: bool,
    /// Draws into the shadow camera target.
    pub shadow_camera_pass: bool,
}

impl PipelineOverrides {
    /// Overrides for a matched model material.
    #[must_use]
    pub fn for_model(pass_type: PassType, material: &Material) -> Self {
        let mut overrides = Self::default();
        if pass_type == PassType::Edge {
            overrides.cull_mode = Some(Some(wgpu::Face::Front));
        } else if material.flags.contains(MaterialFlags::CULLING_DISABLED) {
            overrides.cull_mode = Some(None);
        } else {
            overrides.cull_mode = Some(Some(wgpu::Face::Back));
        }
        if material.flags.contains(MaterialFlags::POINT_DRAW) {
            overrides.topology = Some(wgpu::PrimitiveTopology::PointList);
        } else if material.flags.contains(MaterialFlags::LINE_DRAW) {
            overrides.topology = Some(wgpu::PrimitiveTopology::LineList);
        }
        overrides.apply_pass_type(pass_type);
        overrides
    }

    /// Overrides for a matched accessory material.
    #[must_use]
    pub fn for_accessory(pass_type: PassType, material: &Material) -> Self {
        let mut overrides = Self::default();
        overrides.apply_pass_type(pass_type);
        if !matches!(pass_type, PassType::Zplot | PassType::Shadow) && material.emissive.w >= 1.0 {
            overrides.front_face = Some(wgpu::FrontFace::Ccw);
            overrides.cull_mode = Some(Some(wgpu::Face::Back));
        }
        overrides
    }

    fn apply_pass_type(&mut self, pass_type: PassType) {
        match pass_type {
            PassType::Zplot => self.shadow_camera_pass = true,
            PassType::Shadow => self.shadow_depth = true,
            _ => {}
        }
    }
}

// ─── Criteria ────────────────────────────────────────────────────────────────

/// Tri-state material requirements; `-1` accepts either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TechniqueCriteria {
    pub use_texture: i32,
    pub use_sphere_map: i32,
    pub use_toon: i32,
}

impl Default for TechniqueCriteria {
    fn default() -> Self {
        Self {
            use_texture: -1,
            use_sphere_map: -1,
            use_toon: -1,
        }
    }
}

impl TechniqueCriteria {
    #[must_use]
    pub fn from_annotations(annotations: &Annotations) -> Self {
        Self {
            use_texture: annotations.tri_bool("usetexture"),
            use_sphere_map: annotations.tri_bool("usespheremap"),
            use_toon: annotations.tri_bool("usetoon"),
        }
    }

    #[must_use]
    pub fn matches(&self, material: &Material, kind: DrawableKind) -> bool {
        let has_texture = i32::from(material.has_diffuse_image());
        match kind {
            DrawableKind::Model => {
                let has_sphere_map = i32::from(
                    material.sphere_map_image.is_some()
                        && material.sphere_map_mode != SphereMapMode::None,
                );
                (self.use_texture < 0 || self.use_texture == has_texture)
                    && (self.use_sphere_map < 0 || self.use_sphere_map == has_sphere_map)
                    && (self.use_toon < 0 || self.use_toon == 1)
            }
            DrawableKind::Accessory => {
                // Accessories keep their sphere map in the diffuse slot.
                let is_sphere_map = matches!(
                    material.sphere_map_mode,
                    SphereMapMode::Multiply | SphereMapMode::Add
                );
                let texture = self.use_texture < 0 || is_sphere_map || self.use_texture == has_texture;
                let sphere = self.use_sphere_map < 0
                    || !is_sphere_map
                    || self.use_sphere_map == has_texture;
                texture && sphere && (self.use_toon < 0 || self.use_toon == 0)
            }
        }
    }
}

// ─── Technique ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Technique {
    name: String,
    annotations: Annotations,
    pass_tag: String,
    subset: String,
    criteria: TechniqueCriteria,
    pub(crate) script: Arc<Script>,
    pub(crate) passes: Vec<Pass>,
    pass_lookup: FxHashMap<String, usize>,
    pub(crate) pipelines: PipelineCache,
}

impl Technique {
    #[must_use]
    pub fn new(source: &TechniqueSource) -> Self {
        let annotations = source.annotations.clone();
        let script = annotations
            .string("script")
            .filter(|script| !script.trim().is_empty())
            .map_or_else(
                || {
                    parse_script(&default_technique_script(
                        source.passes.iter().map(|pass| pass.name.as_str()),
                    ))
                },
                parse_script,
            );
        let passes: Vec<Pass> = source.passes.iter().cloned().map(Pass::new).collect();
        let pass_lookup = passes
            .iter()
            .enumerate()
            .map(|(index, pass)| (pass.name().to_string(), index))
            .collect();
        Self {
            name: source.name.clone(),
            pass_tag: annotations
                .string("mmdpass")
                .unwrap_or_default()
                .to_ascii_lowercase(),
            subset: annotations.string("subset").unwrap_or_default().to_string(),
            criteria: TechniqueCriteria::from_annotations(&annotations),
            annotations,
            script: Arc::new(script),
            passes,
            pass_lookup,
            pipelines: PipelineCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Lower-cased `MMDPass` tag, empty when untagged.
    #[inline]
    #[must_use]
    pub fn pass_tag(&self) -> &str {
        &self.pass_tag
    }

    #[inline]
    #[must_use]
    pub fn subset(&self) -> &str {
        &self.subset
    }

    #[inline]
    #[must_use]
    pub fn script(&self) -> &Script {
        &self.script
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    #[must_use]
    pub fn find_pass(&self, name: &str) -> Option<usize> {
        self.pass_lookup.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Index of the command after `ScriptExternal`, where the main part of
    /// a split script starts.
    #[must_use]
    pub fn post_external_start(&self) -> usize {
        self.script
            .commands
            .iter()
            .position(|command| command.ty == super::script::ScriptCommandType::ScriptExternal)
            .map_or(0, |index| index + 1)
    }

    /// Subset and criteria test for one material.
    #[must_use]
    pub fn matches(
        &self,
        material: &Material,
        material_index: usize,
        material_count: usize,
        kind: DrawableKind,
    ) -> bool {
        subset_matches(&self.subset, material_count, material_index)
            && self.criteria.matches(material, kind)
    }

    pub fn destroy(&mut self, device: &mut dyn RenderDevice) {
        self.pipelines.destroy(device);
    }
}

/// A resolved technique with the state it imposes on its pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechniqueMatch {
    pub technique: usize,
    /// Resolved from the built-in fallback techniques.
    pub fallback: bool,
    pub pass_type: PassType,
    pub overrides: PipelineOverrides,
    pub kind: DrawableKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{AnnotationValue, PassSource};
    use crate::device::ImageHandle;

    fn technique(annotations: &[(&str, AnnotationValue)]) -> Technique {
        Technique::new(&TechniqueSource {
            name: "Main".into(),
            annotations: annotations.iter().cloned().collect(),
            passes: vec![
                PassSource {
                    name: "P0".into(),
                    ..Default::default()
                },
                PassSource {
                    name: "P1".into(),
                    ..Default::default()
                },
            ],
        })
    }

    #[test]
    fn missing_script_runs_every_pass() {
        let technique = technique(&[]);
        assert_eq!(technique.script().to_source(), "Pass=P0;Pass=P1;");
        assert_eq!(technique.find_pass("P1"), Some(1));
        assert_eq!(technique.passes()[0].script.to_source(), "Draw=Geometry;");
    }

    #[test]
    fn subset_and_texture_criteria_select_materials() {
        let technique = technique(&[
            ("MMDPass", AnnotationValue::String("Object".into())),
            ("Subset", AnnotationValue::String("0-2".into())),
            ("UseTexture", AnnotationValue::Bool(true)),
        ]);
        assert_eq!(technique.pass_tag(), "object");
        let plain = Material::default();
        let textured = Material {
            diffuse_image: Some(ImageHandle::default()),
            ..Default::default()
        };
        assert!(technique.matches(&textured, 2, 5, DrawableKind::Model));
        assert!(!technique.matches(&textured, 3, 5, DrawableKind::Model));
        assert!(!technique.matches(&plain, 0, 5, DrawableKind::Model));
    }

    #[test]
    fn self_shadow_falls_back_to_object_then_untagged() {
        assert_eq!(
            PassType::ObjectSelfShadow.candidate_tags(),
            [Some("object_ss"), Some("object"), Some("")]
        );
        assert_eq!(PassType::Edge.candidate_tags(), [Some("edge"), None, Some("")]);
    }

    #[test]
    fn edge_overrides_cull_front_faces() {
        let material = Material {
            flags: MaterialFlags::CULLING_DISABLED | MaterialFlags::LINE_DRAW,
            ..Default::default()
        };
        let edge = PipelineOverrides::for_model(PassType::Edge, &material);
        assert_eq!(edge.cull_mode, Some(Some(wgpu::Face::Front)));
        let object = PipelineOverrides::for_model(PassType::Object, &material);
        assert_eq!(object.cull_mode, Some(None));
        assert_eq!(object.topology, Some(wgpu::PrimitiveTopology::LineList));
    }
}
