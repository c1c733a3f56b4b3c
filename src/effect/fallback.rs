//! Built-in fallback bundle, drawn for materials that no technique of an
//! enabled effect claims and for effects that are switched off.

use crate::bundle::{
    AnnotationValue, Annotations, EffectBundle, ParameterSource, ParameterType, PassSource,
    RegisterMap, RegisterRange, TechniqueSource,
};

const SHADER: &str = include_str!("shaders/fallback.wgsl");

const WORLD_VIEW_PROJECTION: &str = "WorldViewProjection";
const LIGHT_WORLD_VIEW_PROJECTION: &str = "LightWorldViewProjection";

fn parameter(name: &str, semantic: &str, ty: ParameterType, object: Option<&str>) -> ParameterSource {
    let mut annotations = Annotations::new();
    if let Some(object) = object {
        annotations.insert("Object", AnnotationValue::String(object.to_string()));
    }
    ParameterSource {
        name: name.to_string(),
        semantic: semantic.to_string(),
        ty,
        elements: 0,
        annotations,
        ..Default::default()
    }
}

fn registers(name: &str, count: u32) -> RegisterMap {
    let mut map = RegisterMap::default();
    map.insert(name.to_string(), RegisterRange { index: 0, count });
    map
}

fn technique(tag: &str, matrix: &str, pixel_entry: &str, color: Option<&str>) -> TechniqueSource {
    let mut annotations = Annotations::new();
    annotations.insert("MMDPass", AnnotationValue::String(tag.to_string()));
    TechniqueSource {
        name: format!("Fallback_{tag}"),
        annotations,
        passes: vec![PassSource {
            name: "P0".to_string(),
            vertex_source: SHADER.to_string(),
            vertex_entry: "vs_main".to_string(),
            pixel_source: SHADER.to_string(),
            pixel_entry: pixel_entry.to_string(),
            vertex_attributes: vec![
                wgpu::VertexFormat::Float32x3,
                wgpu::VertexFormat::Float32x3,
                wgpu::VertexFormat::Float32x2,
            ],
            vertex_registers: registers(matrix, 4),
            pixel_registers: color.map(|name| registers(name, 1)).unwrap_or_default(),
            vertex_uniform_count: 4,
            pixel_uniform_count: 1,
            ..Default::default()
        }],
    }
}

/// Flat-shaded techniques for every pass type, with one `P0` pass each.
#[must_use]
pub fn fallback_bundle() -> EffectBundle {
    EffectBundle {
        parameters: vec![
            parameter(
                WORLD_VIEW_PROJECTION,
                "WORLDVIEWPROJECTION",
                ParameterType::Float4x4,
                None,
            ),
            parameter(
                LIGHT_WORLD_VIEW_PROJECTION,
                "WORLDVIEWPROJECTION",
                ParameterType::Float4x4,
                Some("Light"),
            ),
            parameter(
                "MaterialDiffuse",
                "DIFFUSE",
                ParameterType::Float4,
                Some("Geometry"),
            ),
            parameter("EdgeColor", "EDGECOLOR", ParameterType::Float4, None),
            parameter(
                "GroundShadowColor",
                "GROUNDSHADOWCOLOR",
                ParameterType::Float4,
                None,
            ),
        ],
        techniques: vec![
            technique("object", WORLD_VIEW_PROJECTION, "fs_color", Some("MaterialDiffuse")),
            technique("object_ss", WORLD_VIEW_PROJECTION, "fs_color", Some("MaterialDiffuse")),
            technique("edge", WORLD_VIEW_PROJECTION, "fs_color", Some("EdgeColor")),
            technique("shadow", WORLD_VIEW_PROJECTION, "fs_color", Some("GroundShadowColor")),
            technique("zplot", LIGHT_WORLD_VIEW_PROJECTION, "fs_zplot", None),
        ],
        ..Default::default()
    }
}
