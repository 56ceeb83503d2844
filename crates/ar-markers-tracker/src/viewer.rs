use ar_markers_core::{MarkerId, WorldPose};

/// The renderer side of tracking.
///
/// A viewer instantiates visual objects from its prototype, parents them
/// under its own camera frame and lets the tracker move and show/hide them.
/// Handles are owned by the tracker for the lifetime of the session.
pub trait Viewer {
    type Handle;

    /// Instantiate the prototype for marker `id`, parented under the
    /// viewer's reference frame, shown, at `pose`.
    fn instantiate(&mut self, id: MarkerId, pose: &WorldPose) -> Self::Handle;

    /// Set the local pose of an existing object.
    fn set_pose(&mut self, handle: &mut Self::Handle, pose: &WorldPose);

    fn set_visible(&mut self, handle: &mut Self::Handle, visible: bool);

    /// Current field of view of the virtual camera, degrees.
    fn field_of_view_deg(&self) -> f64;
}
