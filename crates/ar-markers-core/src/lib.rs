//! Core types and utilities for marker-driven AR tracking.
//!
//! This crate is intentionally small and engine-agnostic. It does *not*
//! detect markers and does *not* talk to any renderer; it only describes
//! what a detector reports and how that report maps into a viewer's space.

mod calibration;
mod frame;
mod logger;
mod mapping;
mod marker;

pub use calibration::{validate_fov, CalibrationError, CameraCalibration, MappingParams};
pub use frame::{FrameError, RgbaFrame, RgbaFrameView, RGBA_CHANNELS};
pub use mapping::{
    fit_background_plane, fov_scale_factor, map_orientation, map_pose, map_position,
    PlaneTransform, WorldPose, DEFAULT_PLANE_DISTANCE, DEFAULT_PLANE_UNIT_SCALE,
};
pub use marker::{MarkerId, MarkerObservation, MarkerSnapshot};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
