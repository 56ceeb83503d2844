//! High-level facade crate for the `ar-markers-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the underlying crates
//! - [`ArSession`], which runs a marker detector on a worker thread and
//!   applies its detections to a [`Viewer`] once per display frame
//! - JSON config/report helpers and a replay driver used by the CLI.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ar_markers::{ArSession, FrameUpdate, SessionConfig};
//! use ar_markers::core::RgbaFrame;
//! use ar_markers::detect::ReplayDetector;
//! use ar_markers::tracker::SceneViewer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::load_json("session.json")?;
//! let (w, h) = (config.calibration.width as usize, config.calibration.height as usize);
//! let detector = ReplayDetector::load_json("cycles.json")?;
//! let mut session = ArSession::start(config, detector, SceneViewer::new(60.0))?;
//!
//! session.submit_frame(RgbaFrame::blank(w, h)?)?;
//! if let FrameUpdate::Applied(cycle) = session.update() {
//!     println!("cycle {}: {:?}", cycle.version, cycle.observed);
//! }
//! let (_viewer, cycles) = session.stop();
//! println!("worker ran {} cycles", cycles?);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ar_markers::core`: observations, frames, calibration, pose mapping.
//! - `ar_markers::detect`: detector trait, store, mailbox, worker, replay.
//! - `ar_markers::tracker`: viewer trait, object registry, in-memory scene.
//! - `ar_markers::ffi`: native `opencv_sample` bindings (feature `native`).

pub use ar_markers_core as core;
pub use ar_markers_detect as detect;
pub use ar_markers_ffi as ffi;
pub use ar_markers_tracker as tracker;

pub use ar_markers_core::{CameraCalibration, MarkerObservation, WorldPose};
pub use ar_markers_tracker::Viewer;

mod io;
mod replay;
mod session;

pub use io::{
    ArIoError, BackgroundPlaneConfig, FrameRecord, ReplayReport, SessionConfig,
    TrackedObjectReport,
};
pub use replay::replay_session;
pub use session::{ArSession, CycleReport, FrameUpdate, SessionError};
