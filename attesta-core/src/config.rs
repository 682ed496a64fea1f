//! Capture field configuration and session tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::{FacingMode, StreamConstraints};

/// Default maximum number of captures per field.
pub const DEFAULT_MAX_CAPTURES: u32 = 5;

/// Hard ceiling for the capture count of any field.
pub const MAX_CAPTURES_CEILING: u32 = 20;

/// Interval between barcode scan samples.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(300);

/// Bound on the single geolocation request issued per session.
pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// JPEG quality used for snapshots.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Per-field options set by whoever configures the owning form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureFieldConfig {
    /// Disables the file-selection fallback.
    pub camera_only: bool,
    pub require_barcode: bool,
    pub max_captures: u32,
    pub enable_geolocation: bool,
}

impl Default for CaptureFieldConfig {
    fn default() -> Self {
        Self {
            camera_only: true,
            require_barcode: false,
            max_captures: DEFAULT_MAX_CAPTURES,
            enable_geolocation: true,
        }
    }
}

impl CaptureFieldConfig {
    /// Configured maximum clamped into `1..=20`.
    pub fn effective_max(&self) -> usize {
        clamp_max_captures(self.max_captures)
    }
}

/// Clamp a configured maximum into the supported range.
pub fn clamp_max_captures(max: u32) -> usize {
    max.clamp(1, MAX_CAPTURES_CEILING) as usize
}

/// Runtime knobs for a capture session that are not part of the field's
/// persisted configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub scan_interval: Duration,
    pub geolocation_timeout: Duration,
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub jpeg_quality: u8,
    /// Client identity recorded in every capture's `deviceInfo`.
    pub device_info: String,
    /// Read-only field: every mutating command is refused.
    pub disabled: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            geolocation_timeout: DEFAULT_GEOLOCATION_TIMEOUT,
            facing: FacingMode::Environment,
            ideal_width: 1920,
            ideal_height: 1080,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            device_info: default_device_info(),
            disabled: false,
        }
    }
}

impl SessionOptions {
    pub(crate) fn constraints(&self, facing: FacingMode) -> StreamConstraints {
        StreamConstraints {
            facing,
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
        }
    }
}

fn default_device_info() -> String {
    format!(
        "attesta-core/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
