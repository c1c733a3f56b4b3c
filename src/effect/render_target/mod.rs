//! Render Target Containers
//!
//! Declared color and depth-stencil targets, the shared registry that
//! aliases targets across effects, viewport relative sizing and mip chain
//! generation. The attachment state a script builds up while it runs lives
//! in [`RenderTargetState`].

pub mod color;
pub mod depth_stencil;
pub mod format;
pub mod mipmap;
pub mod registry;
pub mod state;

pub use color::ColorContainer;
pub use depth_stencil::DepthStencilContainer;
pub use format::{DefaultExtent, ImageExtent, determine_image_size, determine_mip_levels, full_mip_chain, parse_format};
pub use mipmap::MipmapGenerator;
pub use registry::{RenderTargetRegistry, SharedRegistry, SharedRenderTarget};
pub use state::{Attachment, RenderTargetState};
