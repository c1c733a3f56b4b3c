use std::sync::Arc;

use super::script::{DEFAULT_PASS_SCRIPT, Script, parse_script};
use super::uniform_buffer::UniformBuffer;
use crate::bundle::{PassSource, ShaderStage};
use crate::device::{ShaderDesc, ShaderHandle};

/// One executable pass: its layout, parsed script, compiled shader and
/// register files.
#[derive(Debug)]
pub struct Pass {
    pub source: PassSource,
    pub script: Arc<Script>,
    pub shader: Option<ShaderHandle>,
    pub uniforms: UniformBuffer,
}

impl Pass {
    #[must_use]
    pub fn new(source: PassSource) -> Self {
        let script = source
            .annotations
            .string("script")
            .filter(|script| !script.trim().is_empty())
            .map_or_else(|| parse_script(DEFAULT_PASS_SCRIPT), parse_script);
        let uniforms = UniformBuffer::for_pass(&source);
        Self {
            source,
            script: Arc::new(script),
            shader: None,
            uniforms,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.source.name
    }

    #[must_use]
    pub fn shader_desc(&self, label: String) -> ShaderDesc {
        let source = &self.source;
        ShaderDesc {
            label,
            vertex_source: source.vertex_source.clone(),
            vertex_entry: source.vertex_entry.clone(),
            pixel_source: source.pixel_source.clone(),
            pixel_entry: source.pixel_entry.clone(),
            vertex_attributes: source.vertex_attributes.clone(),
            vertex_uniform_count: source.vertex_uniform_count,
            pixel_uniform_count: source.pixel_uniform_count,
            vertex_image_count: source.image_count(ShaderStage::Vertex),
            pixel_image_count: source.image_count(ShaderStage::Pixel),
        }
    }
}
