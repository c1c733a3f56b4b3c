//! Render state tables as authored in effect passes.
//!
//! Every field is optional: an absent entry means "not set by the pass" and
//! the runtime falls back to the technique's resolved state or the default
//! blend/depth configuration.

use serde::{Deserialize, Serialize};

/// Face culling in the authoring convention (clockwise front faces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullMode {
    None,
    Cw,
    Ccw,
}

impl CullMode {
    #[must_use]
    pub fn to_wgpu(self) -> Option<wgpu::Face> {
        match self {
            Self::None => None,
            Self::Cw => Some(wgpu::Face::Front),
            Self::Ccw => Some(wgpu::Face::Back),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSat,
    BlendFactor,
    InvBlendFactor,
}

impl BlendFactor {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BlendFactor {
        match self {
            Self::Zero => wgpu::BlendFactor::Zero,
            Self::One => wgpu::BlendFactor::One,
            Self::SrcColor => wgpu::BlendFactor::Src,
            Self::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
            Self::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            Self::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            Self::DestAlpha => wgpu::BlendFactor::DstAlpha,
            Self::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            Self::DestColor => wgpu::BlendFactor::Dst,
            Self::InvDestColor => wgpu::BlendFactor::OneMinusDst,
            Self::SrcAlphaSat => wgpu::BlendFactor::SrcAlphaSaturated,
            Self::BlendFactor => wgpu::BlendFactor::Constant,
            Self::InvBlendFactor => wgpu::BlendFactor::OneMinusConstant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

impl BlendOp {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::BlendOperation {
        match self {
            Self::Add => wgpu::BlendOperation::Add,
            Self::Subtract => wgpu::BlendOperation::Subtract,
            Self::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
            Self::Min => wgpu::BlendOperation::Min,
            Self::Max => wgpu::BlendOperation::Max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::CompareFunction {
        match self {
            Self::Never => wgpu::CompareFunction::Never,
            Self::Less => wgpu::CompareFunction::Less,
            Self::Equal => wgpu::CompareFunction::Equal,
            Self::LessEqual => wgpu::CompareFunction::LessEqual,
            Self::Greater => wgpu::CompareFunction::Greater,
            Self::NotEqual => wgpu::CompareFunction::NotEqual,
            Self::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            Self::Always => wgpu::CompareFunction::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    Incr,
    Decr,
}

impl StencilOp {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::StencilOperation {
        match self {
            Self::Keep => wgpu::StencilOperation::Keep,
            Self::Zero => wgpu::StencilOperation::Zero,
            Self::Replace => wgpu::StencilOperation::Replace,
            Self::IncrSat => wgpu::StencilOperation::IncrementClamp,
            Self::DecrSat => wgpu::StencilOperation::DecrementClamp,
            Self::Invert => wgpu::StencilOperation::Invert,
            Self::Incr => wgpu::StencilOperation::IncrementWrap,
            Self::Decr => wgpu::StencilOperation::DecrementWrap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillMode {
    Point,
    Wireframe,
    Solid,
}

/// Render states a pass may set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RenderStateTable {
    pub cull_mode: Option<CullMode>,
    pub fill_mode: Option<FillMode>,
    pub alpha_blend_enable: Option<bool>,
    pub src_blend: Option<BlendFactor>,
    pub dest_blend: Option<BlendFactor>,
    pub blend_op: Option<BlendOp>,
    pub separate_alpha_blend_enable: Option<bool>,
    pub src_blend_alpha: Option<BlendFactor>,
    pub dest_blend_alpha: Option<BlendFactor>,
    pub blend_op_alpha: Option<BlendOp>,
    pub color_write_enable: Option<u32>,
    pub z_enable: Option<bool>,
    pub z_write_enable: Option<bool>,
    pub z_func: Option<CompareFunc>,
    pub stencil_enable: Option<bool>,
    pub stencil_func: Option<CompareFunc>,
    pub stencil_pass: Option<StencilOp>,
    pub stencil_fail: Option<StencilOp>,
    pub stencil_z_fail: Option<StencilOp>,
    pub stencil_mask: Option<u32>,
    pub stencil_write_mask: Option<u32>,
    pub alpha_to_coverage_enable: Option<bool>,
}

impl RenderStateTable {
    /// Color write mask in `wgpu` bits, if set.
    #[must_use]
    pub fn color_writes(&self) -> Option<wgpu::ColorWrites> {
        self.color_write_enable
            .map(|bits| wgpu::ColorWrites::from_bits_truncate(bits & 0xf))
    }

    /// Topology implied by the fill mode, if set.
    #[must_use]
    pub fn topology(&self) -> Option<wgpu::PrimitiveTopology> {
        self.fill_mode.and_then(|mode| match mode {
            FillMode::Point => Some(wgpu::PrimitiveTopology::PointList),
            FillMode::Wireframe => Some(wgpu::PrimitiveTopology::LineList),
            FillMode::Solid => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_decodes_pascal_case_keys() {
        let table: RenderStateTable = serde_json::from_str(
            r#"{"CullMode": "None", "AlphaBlendEnable": false, "ZFunc": "Greater", "ColorWriteEnable": 7}"#,
        )
        .unwrap();
        assert_eq!(table.cull_mode, Some(CullMode::None));
        assert_eq!(table.alpha_blend_enable, Some(false));
        assert_eq!(table.z_func, Some(CompareFunc::Greater));
        assert_eq!(
            table.color_writes(),
            Some(wgpu::ColorWrites::RED | wgpu::ColorWrites::GREEN | wgpu::ColorWrites::BLUE)
        );
        assert!(table.src_blend.is_none());
    }

    #[test]
    fn fill_mode_maps_to_topology() {
        let table = RenderStateTable {
            fill_mode: Some(FillMode::Wireframe),
            ..Default::default()
        };
        assert_eq!(table.topology(), Some(wgpu::PrimitiveTopology::LineList));
        assert_eq!(CullMode::Ccw.to_wgpu(), Some(wgpu::Face::Back));
    }
}
