//! Marker id to visual object registry.
//!
//! Design idea:
//! - a [`Viewer`] owns rendering: instantiation, local pose, show/hide;
//! - the [`ObjectTracker`] owns the id -> object mapping and decides when
//!   to create, move, show or hide;
//! - objects are never destroyed while the tracker lives; a marker that
//!   drops out of a detection cycle is only hidden.

mod scene;
mod tracker;
mod viewer;

pub use scene::{ObjectHandle, SceneObject, SceneViewer};
pub use tracker::{ObjectTracker, TrackState, TrackedObject, UpdateOutcome, VisibilityChanges};
pub use viewer::Viewer;
