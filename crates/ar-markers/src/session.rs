//! Per-frame orchestration of the detection worker and the object tracker.
//!
//! An [`ArSession`] owns the whole pipeline for one tracking session:
//! the consumer submits camera frames and calls [`ArSession::update`] once
//! per display frame; the worker thread detects markers in the background.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ar_markers_core::{
    fit_background_plane, map_pose, CalibrationError, FrameError, MappingParams, MarkerId,
    PlaneTransform, RgbaFrame, RgbaFrameView,
};
use ar_markers_detect::{
    DetectionWorker, ImageMailbox, MarkerDetector, MarkerStore, WorkerError, WorkerStatus,
};
use ar_markers_ffi::NativeInitError;
use ar_markers_tracker::{ObjectTracker, UpdateOutcome, Viewer, VisibilityChanges};
use log::{debug, info, warn};

use crate::io::{FrameRecord, SessionConfig, TrackedObjectReport};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced while starting or feeding a session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("frame is {width}x{height}, camera is calibrated for {expected_width}x{expected_height}")]
    FrameSize {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    NativeInit(#[from] NativeInitError),
}

/// Markers applied by one successful [`ArSession::update`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Snapshot version the update consumed.
    pub version: u64,
    /// Ids in the snapshot, in detection order.
    pub observed: Vec<MarkerId>,
    /// Ids that got a new object this frame.
    pub created: Vec<MarkerId>,
    pub visibility: VisibilityChanges,
}

/// Outcome of one display-frame update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameUpdate {
    /// A fresh detection cycle was applied.
    Applied(CycleReport),
    /// No fresh detection; the scene was left as is.
    Stale,
}

impl FrameUpdate {
    pub fn is_stale(&self) -> bool {
        matches!(self, FrameUpdate::Stale)
    }

    /// Flatten into a report row for display frame `frame`.
    pub fn to_record(&self, frame: usize) -> FrameRecord {
        match self {
            FrameUpdate::Applied(report) => FrameRecord {
                frame,
                version: Some(report.version),
                observed: report.observed.clone(),
                created: report.created.clone(),
                shown: report.visibility.shown.clone(),
                hidden: report.visibility.hidden.clone(),
            },
            FrameUpdate::Stale => FrameRecord {
                frame,
                ..FrameRecord::default()
            },
        }
    }
}

/// One running tracking session.
pub struct ArSession<V: Viewer> {
    // Declared before `tracker`: the worker is joined before any tracked
    // object is released.
    worker: DetectionWorker,
    store: Arc<MarkerStore>,
    frames: Arc<ImageMailbox>,
    tracker: ObjectTracker<V>,
    mapping: MappingParams,
    config: SessionConfig,
}

impl<V: Viewer> ArSession<V> {
    /// Validate `config` and start detecting with `detector` on a worker thread.
    pub fn start<D>(config: SessionConfig, detector: D, viewer: V) -> Result<Self, SessionError>
    where
        D: MarkerDetector + Send + 'static,
    {
        config.validate()?;
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let worker = DetectionWorker::spawn(
            detector,
            Arc::clone(&store),
            Arc::clone(&frames),
            &config.worker,
        )?;
        info!(
            "AR session started ({}x{}, marker {} m, camera fov {} deg)",
            config.calibration.width,
            config.calibration.height,
            config.calibration.marker_size_m,
            config.camera_fov_deg
        );
        Ok(Self {
            worker,
            store,
            frames,
            tracker: ObjectTracker::new(viewer),
            mapping: config.mapping_params(),
            config,
        })
    }

    /// Start a session on the native ArUco detector.
    ///
    /// A failed initialization is fatal: no session and no worker exist.
    #[cfg(feature = "native")]
    pub fn start_native(config: SessionConfig, viewer: V) -> Result<Self, SessionError> {
        config.validate()?;
        let detector = ar_markers_ffi::NativeArucoDetector::initialize(&config.calibration)?;
        Self::start(config, detector, viewer)
    }

    /// Hand the latest camera frame to the worker, replacing any frame it
    /// has not picked up yet. Returns `true` if a pending frame was dropped.
    pub fn submit_frame(&self, frame: RgbaFrame) -> Result<bool, SessionError> {
        let expected_width = self.config.calibration.width as usize;
        let expected_height = self.config.calibration.height as usize;
        if frame.width() != expected_width || frame.height() != expected_height {
            return Err(SessionError::FrameSize {
                expected_width,
                expected_height,
                width: frame.width(),
                height: frame.height(),
            });
        }
        Ok(self.frames.submit(frame))
    }

    /// [`submit_frame`](Self::submit_frame) for a raw RGBA buffer of the
    /// calibrated size.
    pub fn submit_rgba(&self, data: Vec<u8>) -> Result<bool, SessionError> {
        let frame = RgbaFrame::from_raw(
            self.config.calibration.width as usize,
            self.config.calibration.height as usize,
            data,
        )?;
        self.submit_frame(frame)
    }

    /// [`submit_frame`](Self::submit_frame) for a borrowed camera buffer.
    ///
    /// The pixels are copied so the caller may reuse its buffer right away.
    pub fn submit_view(&self, view: RgbaFrameView<'_>) -> Result<bool, SessionError> {
        let expected_width = self.config.calibration.width as usize;
        let expected_height = self.config.calibration.height as usize;
        if view.width != expected_width || view.height != expected_height {
            return Err(SessionError::FrameSize {
                expected_width,
                expected_height,
                width: view.width,
                height: view.height,
            });
        }
        self.submit_frame(view.to_owned_frame())
    }

    /// Apply the latest detection cycle to the scene.
    ///
    /// Waits at most `drain_timeout` for a fresh snapshot. Every marker in
    /// it is mapped into the viewer's space and created or moved; every
    /// other registered object is hidden. Without a fresh snapshot nothing
    /// changes and [`FrameUpdate::Stale`] is returned.
    pub fn update(&mut self) -> FrameUpdate {
        self.update_within(self.config.drain_timeout())
    }

    /// [`update`](Self::update) with an explicit wait for a fresh snapshot.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn update_within(&mut self, timeout: Duration) -> FrameUpdate {
        let Some(snapshot) = self.store.drain(timeout) else {
            if self.store.is_closed() {
                if let WorkerStatus::Failed(reason) = self.worker.status() {
                    debug!("no detections: worker failed: {reason}");
                }
            }
            return FrameUpdate::Stale;
        };

        let viewport_fov = self.tracker.viewer().field_of_view_deg();
        let mut report = CycleReport {
            version: snapshot.version,
            ..CycleReport::default()
        };
        let mut observed = HashSet::with_capacity(snapshot.markers.len());
        for marker in &snapshot.markers {
            let pose = map_pose(marker, viewport_fov, &self.mapping);
            if self.tracker.update(marker.id, &pose, snapshot.version) == UpdateOutcome::Created {
                report.created.push(marker.id);
            }
            report.observed.push(marker.id);
            observed.insert(marker.id);
        }
        report.visibility = self.tracker.prune_visibility(&observed);
        debug!(
            "applied cycle {} ({} markers, {} tracked)",
            report.version,
            report.observed.len(),
            self.tracker.len()
        );
        FrameUpdate::Applied(report)
    }

    /// Change the physical camera field of view used by the mapper.
    pub fn set_camera_fov(&mut self, fov_deg: f64) -> Result<(), SessionError> {
        let mapping = MappingParams {
            camera_fov_deg: fov_deg,
            ..self.mapping
        };
        mapping.validate()?;
        self.mapping = mapping;
        self.config.camera_fov_deg = fov_deg;
        Ok(())
    }

    /// Transform that makes the camera-feed plane fill the viewport.
    pub fn background_plane(&self) -> PlaneTransform {
        fit_background_plane(
            self.tracker.viewer().field_of_view_deg(),
            self.config.calibration.width,
            self.config.calibration.height,
            self.config.background.distance,
            self.config.background.unit_scale,
        )
    }

    pub fn worker_status(&self) -> WorkerStatus {
        self.worker.status()
    }

    pub fn is_worker_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Latest annotated frame, if `capture_output` is enabled and one is
    /// pending.
    pub fn take_annotated_frame(&self) -> Option<RgbaFrame> {
        self.worker.annotated_frames().and_then(|frames| frames.take())
    }

    /// Tracked objects, ascending by id.
    pub fn object_reports(&self) -> Vec<TrackedObjectReport> {
        self.tracker
            .objects()
            .map(TrackedObjectReport::from)
            .collect()
    }

    pub fn tracker(&self) -> &ObjectTracker<V> {
        &self.tracker
    }

    pub fn viewer_mut(&mut self) -> &mut V {
        self.tracker.viewer_mut()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mapping(&self) -> &MappingParams {
        &self.mapping
    }

    /// End the session: stop and join the worker, which releases the
    /// detector, then release every tracked object.
    ///
    /// Returns the viewer and the number of completed detection cycles, or
    /// the error that terminated the worker.
    pub fn stop(self) -> (V, Result<u64, WorkerError>) {
        let Self {
            worker, tracker, ..
        } = self;
        let cycles = worker.stop();
        match &cycles {
            Ok(n) => info!("AR session stopped after {n} detection cycles"),
            Err(err) => warn!("AR session stopped, worker error: {err}"),
        }
        (tracker.into_viewer(), cycles)
    }
}
