use glam::{UVec2, Vec2};

use crate::device::ImageHandle;

use super::DrawableId;

/// A color image with its paired depth image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetImages {
    pub color: ImageHandle,
    pub depth: Option<ImageHandle>,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: wgpu::TextureFormat,
    pub sample_count: u32,
    pub size: UVec2,
}

/// An offscreen render target of another effect that is currently being
/// filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenPass {
    pub target: TargetImages,
    /// Drawable that owns the effect declaring the offscreen target.
    pub owner: Option<DrawableId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MouseButtonState {
    pub pressed: bool,
    /// Seconds since the button was last pressed.
    pub time: f32,
}

/// Per-frame project state the runtime reads while binding and drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
    pub viewport: TargetImages,
    pub offscreen: Option<OffscreenPass>,
    pub frame_index: u32,
    /// Frames advanced since the previous frame.
    pub elapsed_frames: f32,
    /// Seconds since the project started.
    pub uptime: f32,
    pub elapsed_uptime: f32,
    /// Cursor position in normalized device coordinates.
    pub cursor: Vec2,
    pub mouse_buttons: [MouseButtonState; 3],
    /// Bound to every texture slot no resource fills.
    pub fallback_image: ImageHandle,
}

impl FrameContext {
    #[must_use]
    pub fn new(viewport: TargetImages, fallback_image: ImageHandle) -> Self {
        Self {
            viewport,
            offscreen: None,
            frame_index: 0,
            elapsed_frames: 0.0,
            uptime: 0.0,
            elapsed_uptime: 0.0,
            cursor: Vec2::ZERO,
            mouse_buttons: [MouseButtonState::default(); 3],
            fallback_image,
        }
    }

    #[inline]
    #[must_use]
    pub fn viewport_size(&self) -> UVec2 {
        self.viewport.size
    }

    #[inline]
    #[must_use]
    pub fn is_offscreen_active(&self) -> bool {
        self.offscreen.is_some()
    }

    /// Target a reset color target 0 returns to.
    #[must_use]
    pub fn primary_target(&self) -> TargetImages {
        self.offscreen
            .map_or(self.viewport, |offscreen| offscreen.target)
    }
}
