//! Camera-space to viewer-space pose mapping.
//!
//! The detector reports poses in its own camera frame. The viewer parents
//! every tracked object under its camera, so the mapping only has to fix
//! axis conventions and units:
//!
//! - x and y are mirrored between the two frames;
//! - x and y are rescaled by `tan(viewer_fov) / tan(camera_fov)` so that
//!   off-axis markers move at the right apparent rate when the physical
//!   and virtual cameras disagree on field of view;
//! - the whole vector is rescaled from meters into scene units using the
//!   ratio of the virtual to the physical marker size.
//!
//! Orientation goes through a fixed axis permutation with sign flips to
//! switch handedness. Both transforms are empirical convention adapters;
//! keep them bit-exact.

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{MappingParams, MarkerObservation};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Default distance of the camera-feed background plane along the view axis.
pub const DEFAULT_PLANE_DISTANCE: f64 = 1000.0;
/// Plane-mesh scale per scene unit. The default plane mesh is ten units wide.
pub const DEFAULT_PLANE_UNIT_SCALE: f64 = 0.1;

/// Pose of a tracked object, local to the viewer's reference frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldPose {
    pub position: Vector3<f64>,
    pub rotation: Quaternion<f64>,
}

impl WorldPose {
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Quaternion::identity(),
        }
    }
}

/// Transform of the full-screen plane the camera feed is drawn on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneTransform {
    /// Offset along the viewer's forward (+z) axis.
    pub distance: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// `tan(viewport_fov) / tan(camera_fov)`, both given in degrees.
#[inline]
pub fn fov_scale_factor(viewport_fov_deg: f64, camera_fov_deg: f64) -> f64 {
    viewport_fov_deg.to_radians().tan() / camera_fov_deg.to_radians().tan()
}

/// Map a native camera-space position into viewer-local scene units.
pub fn map_position(
    position: &[f64; 3],
    viewport_fov_deg: f64,
    params: &MappingParams,
) -> Vector3<f64> {
    let xy_scale = fov_scale_factor(viewport_fov_deg, params.camera_fov_deg);
    let [x, y, z] = *position;
    Vector3::new(-x * xy_scale, -y * xy_scale, z) * params.real_to_virtual_scale()
}

/// Remap a raw `(x, y, z, w)` detector quaternion to `(-z, y, x, -w)`.
#[inline]
pub fn map_orientation(orientation: &[f64; 4]) -> Quaternion<f64> {
    let [x, y, z, w] = *orientation;
    Quaternion::new(-w, -z, y, x)
}

/// Map a full marker observation into a viewer-local pose.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "trace", skip(observation, params), fields(id = observation.id))
)]
pub fn map_pose(
    observation: &MarkerObservation,
    viewport_fov_deg: f64,
    params: &MappingParams,
) -> WorldPose {
    WorldPose {
        position: map_position(&observation.position, viewport_fov_deg, params),
        rotation: map_orientation(&observation.orientation),
    }
}

/// Fit the camera-feed plane so it fills the viewport at `distance`.
///
/// The plane height covers the vertical field of view at that distance;
/// its width follows the capture aspect ratio. `unit_scale` converts scene
/// units into plane-mesh scale (the mesh is `1 / unit_scale` units wide).
pub fn fit_background_plane(
    viewport_fov_deg: f64,
    width: u32,
    height: u32,
    distance: f64,
    unit_scale: f64,
) -> PlaneTransform {
    let half_fov = (viewport_fov_deg / 2.0).to_radians();
    let scale_y = distance * half_fov.tan() * 2.0 * unit_scale;
    let scale_x = scale_y * f64::from(width) / f64::from(height);
    PlaneTransform {
        distance,
        scale_x,
        scale_y,
    }
}
