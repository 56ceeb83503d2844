use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Marker identifier as reported by the detector dictionary.
pub type MarkerId = i32;

/// One detected marker for a single detection cycle, in native camera space.
///
/// `position` is in meters. `orientation` is the raw `(x, y, z, w)`
/// quaternion exactly as the detector reports it; it is not normalized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    pub id: MarkerId,
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl MarkerObservation {
    pub fn new(id: MarkerId, position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            id,
            position,
            orientation,
        }
    }

    #[inline]
    pub fn position_vector(&self) -> Vector3<f64> {
        Vector3::from(self.position)
    }

    /// Raw orientation as a `nalgebra` quaternion (no normalization).
    #[inline]
    pub fn orientation_quaternion(&self) -> Quaternion<f64> {
        let [x, y, z, w] = self.orientation;
        Quaternion::new(w, x, y, z)
    }
}

/// Full result of one detection cycle as handed to the consumer.
///
/// `version` increases by one for every published cycle, so a consumer can
/// tell how many cycles it skipped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerSnapshot {
    pub version: u64,
    pub markers: Vec<MarkerObservation>,
}

impl MarkerSnapshot {
    pub fn ids(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.markers.iter().map(|m| m.id)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_keeps_raw_components() {
        let obs = MarkerObservation::new(3, [0.0; 3], [0.1, 0.2, 0.3, 2.0]);
        let q = obs.orientation_quaternion();
        assert_eq!(q.coords.as_slice(), &[0.1, 0.2, 0.3, 2.0]);
    }

    #[test]
    fn observation_json_shape() {
        let obs = MarkerObservation::new(7, [0.1, -0.2, 0.5], [0.0, 0.0, 0.0, 1.0]);
        let json = serde_json::to_value(obs).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["orientation"][3], 1.0);
    }
}
