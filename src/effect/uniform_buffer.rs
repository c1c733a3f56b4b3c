//! Uniform Register Buffer
//!
//! Flat float4 register files for the vertex and pixel stages of one pass,
//! plus the input files of their preshaders. Values are written by uniform
//! name through the pass's register maps and flushed once per draw.

use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::bundle::{PassSource, RegisterMap};

#[derive(Debug, Clone, Default)]
pub struct UniformBuffer {
    pub vertex: Vec<Vec4>,
    pub pixel: Vec<Vec4>,
    pub vertex_preshader: Vec<Vec4>,
    pub pixel_preshader: Vec<Vec4>,
    /// Bytes written per uniform name since the last reset, when enabled.
    inspection: Option<FxHashMap<String, Vec<u8>>>,
}

impl UniformBuffer {
    #[must_use]
    pub fn for_pass(pass: &PassSource) -> Self {
        Self {
            vertex: vec![Vec4::ZERO; pass.vertex_uniform_count as usize],
            pixel: vec![Vec4::ZERO; pass.pixel_uniform_count as usize],
            vertex_preshader: vec![
                Vec4::ZERO;
                PassSource::preshader_register_count(&pass.vertex_preshader_registers)
                    as usize
            ],
            pixel_preshader: vec![
                Vec4::ZERO;
                PassSource::preshader_register_count(&pass.pixel_preshader_registers)
                    as usize
            ],
            inspection: None,
        }
    }

    pub fn set_inspection_enabled(&mut self, enabled: bool) {
        if enabled {
            self.inspection.get_or_insert_with(FxHashMap::default);
        } else {
            self.inspection = None;
        }
    }

    /// Uniform bytes recorded since the last reset.
    #[must_use]
    pub fn inspected(&self) -> Option<&FxHashMap<String, Vec<u8>>> {
        self.inspection.as_ref()
    }

    pub fn reset(&mut self) {
        for registers in [
            &mut self.vertex,
            &mut self.pixel,
            &mut self.vertex_preshader,
            &mut self.pixel_preshader,
        ] {
            registers.fill(Vec4::ZERO);
        }
        if let Some(inspection) = &mut self.inspection {
            inspection.clear();
        }
    }

    /// Writes `values` to every stage that declares `name`. Names unknown to
    /// the pass are ignored.
    pub fn write(&mut self, layout: &PassSource, name: &str, values: &[Vec4]) {
        let targets = [
            (&layout.vertex_preshader_registers, &mut self.vertex_preshader),
            (&layout.pixel_preshader_registers, &mut self.pixel_preshader),
            (&layout.vertex_registers, &mut self.vertex),
            (&layout.pixel_registers, &mut self.pixel),
        ];
        let mut written = false;
        for (map, registers) in targets {
            written |= write_registers(map, registers, name, values);
        }
        if written && let Some(inspection) = &mut self.inspection {
            inspection.insert(name.to_string(), bytemuck::cast_slice(values).to_vec());
        }
    }

    #[inline]
    pub fn write_one(&mut self, layout: &PassSource, name: &str, value: Vec4) {
        self.write(layout, name, &[value]);
    }

    /// Runs both preshaders, filling their output registers.
    pub fn run_preshaders(&mut self, layout: &PassSource) {
        if let Some(preshader) = &layout.vertex_preshader {
            preshader.execute(&self.vertex_preshader, &mut self.vertex);
        }
        if let Some(preshader) = &layout.pixel_preshader {
            preshader.execute(&self.pixel_preshader, &mut self.pixel);
        }
    }
}

fn write_registers(map: &RegisterMap, registers: &mut [Vec4], name: &str, values: &[Vec4]) -> bool {
    let Some(range) = map.get(name) else {
        return false;
    };
    let start = range.index as usize;
    let count = range.count as usize;
    if start + count > registers.len() {
        log::warn!(
            "Uniform \"{name}\" overflows the register file ({start} + {count} > {})",
            registers.len()
        );
        return false;
    }
    let length = values.len().min(count);
    registers[start..start + length].copy_from_slice(&values[..length]);
    true
}
