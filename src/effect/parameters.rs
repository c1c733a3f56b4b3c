//! Non-semantic uniforms.
//!
//! Parameters without a recognized semantic keep their declared default in
//! register form. The host may override them, and scripts read loop counts
//! from and write loop indices into them.

use glam::Vec4;
use rustc_hash::FxHashMap;

use crate::bundle::{ParameterSource, ParameterType};

/// Register image of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    pub ty: ParameterType,
    pub values: Vec<Vec4>,
}

impl ParameterValue {
    /// Packs the declared defaults into float4 registers, one row per
    /// register.
    #[must_use]
    pub fn from_source(source: &ParameterSource) -> Self {
        let stride = component_count(source.ty);
        let registers = source.register_count().max(1);
        let values = (0..registers)
            .map(|register| {
                let mut value = [0.0f32; 4];
                for (component, slot) in value.iter_mut().enumerate().take(stride) {
                    if let Some(&scalar) = source.values.get(register * stride + component) {
                        *slot = scalar;
                    }
                }
                Vec4::from_array(value)
            })
            .collect();
        Self {
            ty: source.ty,
            values,
        }
    }

    #[inline]
    #[must_use]
    pub fn first(&self) -> Vec4 {
        self.values.first().copied().unwrap_or(Vec4::ZERO)
    }
}

/// Components stored per register for `ty`.
fn component_count(ty: ParameterType) -> usize {
    match ty {
        ParameterType::Bool2 | ParameterType::Int2 | ParameterType::Float2 | ParameterType::Float2x2 => 2,
        ParameterType::Bool3 | ParameterType::Int3 | ParameterType::Float3 | ParameterType::Float3x3 => 3,
        ParameterType::Bool4 | ParameterType::Int4 | ParameterType::Float4 | ParameterType::Float4x4 => 4,
        _ => 1,
    }
}

/// Whether a parameter is stored as a plain uniform.
#[must_use]
pub fn is_uniform_type(ty: ParameterType) -> bool {
    ty.is_bool() || ty.is_int() || ty.is_float()
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    values: FxHashMap<String, ParameterValue>,
    /// Declaration order, so uniforms are flushed deterministically.
    order: Vec<String>,
}

impl ParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &ParameterSource) {
        if !is_uniform_type(source.ty) {
            return;
        }
        if self
            .values
            .insert(source.name.clone(), ParameterValue::from_source(source))
            .is_none()
        {
            self.order.push(source.name.clone());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.order
            .iter()
            .filter_map(|name| self.values.get(name).map(|value| (name.as_str(), value)))
    }

    /// Overwrites the leading registers of `name`. Returns `false` when the
    /// parameter is unknown.
    pub fn set(&mut self, name: &str, values: &[Vec4]) -> bool {
        let Some(parameter) = self.values.get_mut(name) else {
            return false;
        };
        for (slot, value) in parameter.values.iter_mut().zip(values) {
            *slot = *value;
        }
        true
    }

    /// Iteration count stored in `name`; negative values count as zero.
    #[must_use]
    pub fn loop_count(&self, name: &str) -> Option<usize> {
        self.values
            .get(name)
            .map(|parameter| parameter.first().x.max(0.0) as usize)
    }

    pub fn set_loop_index(&mut self, name: &str, index: usize) -> bool {
        let Some(parameter) = self.values.get_mut(name) else {
            return false;
        };
        if let Some(first) = parameter.values.first_mut() {
            first.x = index as f32;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, ty: ParameterType, values: &[f32]) -> ParameterSource {
        ParameterSource {
            name: name.to_string(),
            ty,
            values: values.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_are_packed_per_register() {
        let value = ParameterValue::from_source(&source("C", ParameterType::Float3, &[1.0, 2.0, 3.0]));
        assert_eq!(value.values, vec![Vec4::new(1.0, 2.0, 3.0, 0.0)]);

        let matrix: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let value = ParameterValue::from_source(&source("M", ParameterType::Float4x4, &matrix));
        assert_eq!(value.values.len(), 4);
        assert_eq!(value.values[1], Vec4::new(4.0, 5.0, 6.0, 7.0));
    }

    #[test]
    fn textures_and_strings_are_not_stored() {
        let mut store = ParameterStore::new();
        store.insert(&source("Tex", ParameterType::Texture, &[]));
        store.insert(&source("Label", ParameterType::String, &[]));
        store.insert(&source("Count", ParameterType::Int, &[3.0]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.loop_count("Count"), Some(3));
    }

    #[test]
    fn loop_index_writes_the_first_component() {
        let mut store = ParameterStore::new();
        store.insert(&source("Index", ParameterType::Float, &[0.0]));
        assert!(store.set_loop_index("Index", 2));
        assert_eq!(store.get("Index").unwrap().first().x, 2.0);
        assert!(!store.set_loop_index("Missing", 1));
        assert_eq!(store.loop_count("Missing"), None);
    }
}
