use std::collections::{BTreeMap, HashSet};

use ar_markers_core::{MarkerId, WorldPose};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::Viewer;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Visibility of a registered marker object.
///
/// Ids that were never observed are simply absent from the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    Visible,
    Hidden,
}

/// A visual object bound to a marker id.
#[derive(Debug)]
pub struct TrackedObject<H> {
    pub id: MarkerId,
    pub handle: H,
    /// Last pose applied to the object, viewer-local.
    pub pose: WorldPose,
    /// Snapshot version of the last detection cycle that reported this id.
    pub last_seen_version: u64,
    pub state: TrackState,
}

/// What `update` did with a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    Updated,
}

/// Visibility transitions produced by one `prune_visibility` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChanges {
    /// Ids that went from hidden to visible.
    pub shown: Vec<MarkerId>,
    /// Ids that went from visible to hidden.
    pub hidden: Vec<MarkerId>,
}

impl VisibilityChanges {
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty() && self.hidden.is_empty()
    }
}

/// Registry of marker objects.
///
/// Entries are created on first sight and never removed: a marker that
/// disappears is treated as occluded and its object is hidden, not
/// destroyed. Objects are released together with the tracker.
pub struct ObjectTracker<V: Viewer> {
    viewer: V,
    objects: BTreeMap<MarkerId, TrackedObject<V::Handle>>,
}

impl<V: Viewer> ObjectTracker<V> {
    pub fn new(viewer: V) -> Self {
        Self {
            viewer,
            objects: BTreeMap::new(),
        }
    }

    /// Move the object for `id` to `pose`, creating it on first sight.
    pub fn update(&mut self, id: MarkerId, pose: &WorldPose, version: u64) -> UpdateOutcome {
        if let Some(object) = self.objects.get_mut(&id) {
            self.viewer.set_pose(&mut object.handle, pose);
            object.pose = *pose;
            object.last_seen_version = version;
            return UpdateOutcome::Updated;
        }

        let handle = self.viewer.instantiate(id, pose);
        debug!("created object for marker {id} (cycle {version})");
        self.objects.insert(
            id,
            TrackedObject {
                id,
                handle,
                pose: *pose,
                last_seen_version: version,
                state: TrackState::Visible,
            },
        );
        UpdateOutcome::Created
    }

    /// Show every registered object whose id is in `observed`, hide the rest.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, observed), fields(observed = observed.len()))
    )]
    pub fn prune_visibility(&mut self, observed: &HashSet<MarkerId>) -> VisibilityChanges {
        let mut changes = VisibilityChanges::default();
        for (id, object) in self.objects.iter_mut() {
            let visible = observed.contains(id);
            self.viewer.set_visible(&mut object.handle, visible);
            let state = if visible {
                TrackState::Visible
            } else {
                TrackState::Hidden
            };
            if state != object.state {
                match state {
                    TrackState::Visible => changes.shown.push(*id),
                    TrackState::Hidden => changes.hidden.push(*id),
                }
                object.state = state;
            }
        }
        if !changes.is_empty() {
            debug!(
                "visibility: shown {:?}, hidden {:?}",
                changes.shown, changes.hidden
            );
        }
        changes
    }

    pub fn get(&self, id: MarkerId) -> Option<&TrackedObject<V::Handle>> {
        self.objects.get(&id)
    }

    pub fn state(&self, id: MarkerId) -> Option<TrackState> {
        self.objects.get(&id).map(|o| o.state)
    }

    pub fn contains(&self, id: MarkerId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.objects.keys().copied()
    }

    pub fn objects(&self) -> impl Iterator<Item = &TrackedObject<V::Handle>> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut V {
        &mut self.viewer
    }

    /// End the session, dropping every tracked handle, and return the viewer.
    pub fn into_viewer(self) -> V {
        self.viewer
    }
}
