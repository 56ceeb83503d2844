//! JSON configuration and report helpers for AR sessions.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ar_markers_core::{
    CalibrationError, CameraCalibration, MappingParams, MarkerId, PlaneTransform,
    DEFAULT_PLANE_DISTANCE, DEFAULT_PLANE_UNIT_SCALE,
};
use ar_markers_detect::WorkerConfig;
use ar_markers_tracker::{TrackState, TrackedObject};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ArIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_camera_fov_deg() -> f64 {
    MappingParams::DEFAULT_CAMERA_FOV_DEG
}

fn default_virtual_marker_size() -> f64 {
    1.0
}

fn default_drain_timeout_ms() -> u64 {
    100
}

fn default_plane_distance() -> f64 {
    DEFAULT_PLANE_DISTANCE
}

fn default_plane_unit_scale() -> f64 {
    DEFAULT_PLANE_UNIT_SCALE
}

/// Placement of the plane the camera feed is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundPlaneConfig {
    /// Distance along the viewer's forward axis.
    #[serde(default = "default_plane_distance")]
    pub distance: f64,
    /// Plane-mesh scale per scene unit.
    #[serde(default = "default_plane_unit_scale")]
    pub unit_scale: f64,
}

impl Default for BackgroundPlaneConfig {
    fn default() -> Self {
        Self {
            distance: default_plane_distance(),
            unit_scale: default_plane_unit_scale(),
        }
    }
}

/// Configuration of one tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub calibration: CameraCalibration,
    /// Field of view of the physical camera, degrees.
    #[serde(default = "default_camera_fov_deg")]
    pub camera_fov_deg: f64,
    /// Marker side length in scene units.
    #[serde(default = "default_virtual_marker_size")]
    pub virtual_marker_size: f64,
    /// How long one `update` waits for a fresh detection.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub background: BackgroundPlaneConfig,
}

impl SessionConfig {
    /// Session with default tuning for `calibration`.
    pub fn new(calibration: CameraCalibration) -> Self {
        Self {
            calibration,
            camera_fov_deg: default_camera_fov_deg(),
            virtual_marker_size: default_virtual_marker_size(),
            drain_timeout_ms: default_drain_timeout_ms(),
            worker: WorkerConfig::default(),
            background: BackgroundPlaneConfig::default(),
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ArIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ArIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn mapping_params(&self) -> MappingParams {
        MappingParams {
            camera_fov_deg: self.camera_fov_deg,
            virtual_marker_size: self.virtual_marker_size,
            physical_marker_size_m: self.calibration.marker_size_m,
        }
    }

    pub fn validate(&self) -> Result<(), CalibrationError> {
        self.calibration.validate()?;
        self.mapping_params().validate()
    }

    #[inline]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// A tracked object at the end of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObjectReport {
    pub id: MarkerId,
    pub position: [f64; 3],
    /// Quaternion as `(x, y, z, w)`.
    pub rotation: [f64; 4],
    pub visible: bool,
    pub last_seen_version: u64,
}

impl<H> From<&TrackedObject<H>> for TrackedObjectReport {
    fn from(object: &TrackedObject<H>) -> Self {
        let p = object.pose.position;
        let q = object.pose.rotation;
        Self {
            id: object.id,
            position: [p.x, p.y, p.z],
            rotation: [q.i, q.j, q.k, q.w],
            visible: object.state == TrackState::Visible,
            last_seen_version: object.last_seen_version,
        }
    }
}

/// What one display frame did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: usize,
    /// Snapshot version applied, `None` when no fresh detection arrived.
    pub version: Option<u64>,
    #[serde(default)]
    pub observed: Vec<MarkerId>,
    #[serde(default)]
    pub created: Vec<MarkerId>,
    #[serde(default)]
    pub shown: Vec<MarkerId>,
    #[serde(default)]
    pub hidden: Vec<MarkerId>,
}

/// Report of a replayed session.
///
/// `frames` holds one record per applied detection cycle; display frames
/// that found no new snapshot are only counted in `stale_frames`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub viewport_fov_deg: f64,
    pub background: PlaneTransform,
    pub frames: Vec<FrameRecord>,
    #[serde(default)]
    pub stale_frames: u64,
    pub objects: Vec<TrackedObjectReport>,
    pub worker_cycles: u64,
    #[serde(default)]
    pub worker_error: Option<String>,
}

impl ReplayReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ArIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ArIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
