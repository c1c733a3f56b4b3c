//! Error Types
//!
//! This module defines the error types used throughout the effect runtime.
//!
//! # Overview
//!
//! The main error type [`EffectError`] covers every way an effect bundle can
//! fail to become usable:
//! - Bundle decoding and structural validation
//! - Semantic errors collected while uploading parameters
//! - Device limits and backend incompatibility
//! - Cooperative cancellation of resource loading
//!
//! Per-frame script execution never returns these errors; lookups that miss at
//! draw time degrade to fallbacks and are reported through `log`.
//!
//! ```rust,ignore
//! use myth_fx::errors::{EffectError, Result};
//!
//! fn upload() -> Result<()> {
//!     Err(EffectError::Cancelled)
//! }
//! ```

use thiserror::Error;

/// The main error type for the effect runtime.
#[derive(Error, Debug)]
pub enum EffectError {
    // ========================================================================
    // Bundle Errors
    // ========================================================================
    /// The bundle could not be decoded.
    #[error("Effect bundle decode error: {0}")]
    BundleDecode(#[from] serde_json::Error),

    /// The bundle decoded but its tables are inconsistent.
    #[error("Invalid effect bundle: {0}")]
    InvalidBundle(String),

    /// Bundle format version is newer than this runtime understands.
    #[error("Unsupported effect bundle version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version stored in the bundle
        found: u32,
        /// Highest version this runtime reads
        supported: u32,
    },

    // ========================================================================
    // Upload Errors
    // ========================================================================
    /// One or more parameters failed semantic validation. Messages are joined
    /// with newlines in declaration order.
    #[error("{0}")]
    Semantic(String),

    /// Resource loading was aborted by the progress signal.
    #[error("Effect loading was cancelled")]
    Cancelled,

    /// A declared resource exceeds what the device can provide.
    #[error("{what} exceeds the device limit ({actual} > {limit}). {hint}")]
    ExceedsLimits {
        /// Which resource kind overflowed
        what: String,
        /// Requested amount
        actual: u32,
        /// Device limit
        limit: u32,
        /// Remediation hint shown to the user
        hint: String,
    },

    /// The bundle was transcoded for a different backend than the active one.
    #[error("Effect bundle targets {expected} but the active backend is {actual}")]
    BackendIncompatible {
        /// Backend the bundle was transcoded for
        expected: String,
        /// Backend reported by the device
        actual: String,
    },

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device refused to create an image.
    #[error("Failed to create image \"{label}\": {reason}")]
    ImageCreateFailed {
        /// Debug label of the image
        label: String,
        /// Device specific reason
        reason: String,
    },

    /// The device refused to compile a shader.
    #[error("Failed to create shader \"{label}\": {reason}")]
    ShaderCreateFailed {
        /// Debug label of the shader
        label: String,
        /// Device specific reason
        reason: String,
    },

    /// The device refused to create a pipeline.
    #[error("Failed to create pipeline \"{label}\": {reason}")]
    PipelineCreateFailed {
        /// Debug label of the pipeline
        label: String,
        /// Device specific reason
        reason: String,
    },

    /// No GPU adapter satisfied the request.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    // ========================================================================
    // Lookup Errors
    // ========================================================================
    /// A technique name could not be resolved.
    #[error("Technique not found: {0}")]
    TechniqueNotFound(String),

    /// A pass name could not be resolved inside its technique.
    #[error("Pass not found: {technique}/{pass}")]
    PassNotFound {
        /// Owning technique
        technique: String,
        /// Requested pass
        pass: String,
    },
}

impl EffectError {
    /// Cancellation is a distinct termination and not a failure.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EffectError::Cancelled)
    }
}

/// Alias for `Result<T, EffectError>`.
pub type Result<T> = std::result::Result<T, EffectError>;
