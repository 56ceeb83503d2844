//! In-memory viewer.
//!
//! Keeps every instantiated object in a flat list, parented (implicitly)
//! to a single virtual camera. Useful for headless runs and tests.

use ar_markers_core::{MarkerId, WorldPose};
use serde::{Deserialize, Serialize};

use crate::Viewer;

/// Index of an object inside a [`SceneViewer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle(usize);

/// An object as the scene currently holds it, camera-local.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub marker_id: MarkerId,
    pub pose: WorldPose,
    pub visible: bool,
}

#[derive(Clone, Debug)]
pub struct SceneViewer {
    fov_deg: f64,
    objects: Vec<SceneObject>,
}

impl SceneViewer {
    pub fn new(fov_deg: f64) -> Self {
        Self {
            fov_deg,
            objects: Vec::new(),
        }
    }

    pub fn set_field_of_view(&mut self, fov_deg: f64) {
        self.fov_deg = fov_deg;
    }

    pub fn object(&self, handle: &ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(handle.0)
    }

    /// Objects in instantiation order.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Total number of instantiations performed.
    pub fn instantiated(&self) -> usize {
        self.objects.len()
    }
}

impl Viewer for SceneViewer {
    type Handle = ObjectHandle;

    fn instantiate(&mut self, id: MarkerId, pose: &WorldPose) -> ObjectHandle {
        self.objects.push(SceneObject {
            marker_id: id,
            pose: *pose,
            visible: true,
        });
        ObjectHandle(self.objects.len() - 1)
    }

    fn set_pose(&mut self, handle: &mut ObjectHandle, pose: &WorldPose) {
        if let Some(object) = self.objects.get_mut(handle.0) {
            object.pose = *pose;
        }
    }

    fn set_visible(&mut self, handle: &mut ObjectHandle, visible: bool) {
        if let Some(object) = self.objects.get_mut(handle.0) {
            object.visible = visible;
        }
    }

    fn field_of_view_deg(&self) -> f64 {
        self.fov_deg
    }
}
