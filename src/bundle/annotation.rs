//! Annotation maps attached to parameters, techniques and passes.
//!
//! Keys are compared case-insensitively, so they are stored lower-cased.

use glam::Vec4;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A single annotation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vector(Vec4),
    String(String),
}

impl AnnotationValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Bool(value) => Some(i32::from(*value)),
            Self::Int(value) => Some(*value),
            Self::Float(value) => Some(*value as i32),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Bool(value) => Some(f32::from(u8::from(*value))),
            Self::Int(value) => Some(*value as f32),
            Self::Float(value) => Some(*value),
            Self::Vector(value) => Some(value.x),
            Self::String(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(value) => Some(*value != 0),
            Self::Float(value) => Some(*value != 0.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vec4(&self) -> Option<Vec4> {
        match self {
            Self::Vector(value) => Some(*value),
            Self::Float(value) => Some(Vec4::splat(*value)),
            Self::Int(value) => Some(Vec4::splat(*value as f32)),
            _ => None,
        }
    }
}

/// Case-insensitive annotation lookup table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "FxHashMap<String, AnnotationValue>",
    into = "FxHashMap<String, AnnotationValue>"
)]
pub struct Annotations {
    values: FxHashMap<String, AnnotationValue>,
}

impl From<FxHashMap<String, AnnotationValue>> for Annotations {
    fn from(source: FxHashMap<String, AnnotationValue>) -> Self {
        let values = source
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();
        Self { values }
    }
}

impl From<Annotations> for FxHashMap<String, AnnotationValue> {
    fn from(annotations: Annotations) -> Self {
        annotations.values
    }
}

impl<K: AsRef<str>> FromIterator<(K, AnnotationValue)> for Annotations {
    fn from_iter<I: IntoIterator<Item = (K, AnnotationValue)>>(iter: I) -> Self {
        let values = iter
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_ascii_lowercase(), value))
            .collect();
        Self { values }
    }
}

impl Annotations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: AnnotationValue) {
        self.values.insert(key.to_ascii_lowercase(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.values.get(&key.to_ascii_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AnnotationValue::as_str)
    }

    #[must_use]
    pub fn int(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(AnnotationValue::as_int)
    }

    #[must_use]
    pub fn float(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(AnnotationValue::as_float)
    }

    #[must_use]
    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AnnotationValue::as_bool)
    }

    /// `-1` when absent, otherwise `0` or `1`.
    #[must_use]
    pub fn tri_bool(&self, key: &str) -> i32 {
        self.bool(key).map_or(-1, i32::from)
    }

    #[must_use]
    pub fn vec4(&self, key: &str) -> Option<Vec4> {
        self.get(key).and_then(AnnotationValue::as_vec4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_case_insensitive() {
        let annotations: Annotations = [
            ("ResourceName", AnnotationValue::String("a.png".into())),
            ("UseTexture", AnnotationValue::Bool(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(annotations.string("resourcename"), Some("a.png"));
        assert_eq!(annotations.string("RESOURCENAME"), Some("a.png"));
        assert_eq!(annotations.tri_bool("usetexture"), 1);
        assert_eq!(annotations.tri_bool("UseToon"), -1);
    }

    #[test]
    fn untagged_values_decode_by_shape() {
        let annotations: Annotations = serde_json::from_str(
            r#"{"Width": 256, "ViewportRatio": [0.5, 0.5, 1.0, 1.0], "Format": "A8R8G8B8", "Scale": 0.25}"#,
        )
        .unwrap();
        assert_eq!(annotations.int("width"), Some(256));
        assert_eq!(annotations.vec4("viewportratio"), Some(Vec4::new(0.5, 0.5, 1.0, 1.0)));
        assert_eq!(annotations.string("format"), Some("A8R8G8B8"));
        assert_eq!(annotations.float("scale"), Some(0.25));
    }
}
