use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors raised by calibration and mapping parameter validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("invalid camera image size (width={width}, height={height})")]
    InvalidImageSize { width: u32, height: u32 },
    #[error("marker size must be positive and finite (got {0})")]
    InvalidMarkerSize(f64),
    #[error("field of view must lie in (0, 90) degrees (got {0})")]
    InvalidFov(f64),
}

/// Static camera description handed to the native detector at start-up.
///
/// Loaded once, immutable for the lifetime of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// Printed marker side length in meters.
    pub marker_size_m: f64,
    /// Camera intrinsics file understood by the native detector.
    pub intrinsics_path: PathBuf,
}

impl CameraCalibration {
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.width == 0 || self.height == 0 {
            return Err(CalibrationError::InvalidImageSize {
                width: self.width,
                height: self.height,
            });
        }
        validate_size(self.marker_size_m)
    }

    /// Expected RGBA buffer length for one frame.
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * crate::RGBA_CHANNELS
    }
}

/// Parameters of the camera-space to viewer-space pose mapping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappingParams {
    /// Field of view of the physical camera, degrees.
    pub camera_fov_deg: f64,
    /// Marker side length in scene units.
    pub virtual_marker_size: f64,
    /// Marker side length in meters.
    pub physical_marker_size_m: f64,
}

impl MappingParams {
    pub const DEFAULT_CAMERA_FOV_DEG: f64 = 38.0;

    pub fn for_calibration(calibration: &CameraCalibration) -> Self {
        Self {
            camera_fov_deg: Self::DEFAULT_CAMERA_FOV_DEG,
            virtual_marker_size: 1.0,
            physical_marker_size_m: calibration.marker_size_m,
        }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        validate_fov(self.camera_fov_deg)?;
        validate_size(self.virtual_marker_size)?;
        validate_size(self.physical_marker_size_m)
    }

    /// Scene units per meter.
    #[inline]
    pub fn real_to_virtual_scale(&self) -> f64 {
        self.virtual_marker_size / self.physical_marker_size_m
    }
}

fn validate_size(size: f64) -> Result<(), CalibrationError> {
    if size.is_finite() && size > 0.0 {
        Ok(())
    } else {
        Err(CalibrationError::InvalidMarkerSize(size))
    }
}

/// Check a field of view in degrees. `tan()` of the full angle is used by
/// the mapper, so 90 degrees is a pole.
pub fn validate_fov(fov_deg: f64) -> Result<(), CalibrationError> {
    if fov_deg.is_finite() && fov_deg > 0.0 && fov_deg < 90.0 {
        Ok(())
    } else {
        Err(CalibrationError::InvalidFov(fov_deg))
    }
}
