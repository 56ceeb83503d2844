use std::path::PathBuf;

use ar_markers::core::{MarkerObservation, RgbaFrame, WorldPose};
use ar_markers::detect::{DetectError, MarkerDetector, ReplayDetector, WorkerError, WorkerStatus};
use ar_markers::tracker::{SceneViewer, TrackState, Viewer};
use ar_markers::{replay_session, ArSession, CameraCalibration, FrameUpdate, SessionConfig};
use approx::assert_relative_eq;

const WIDTH: u32 = 8;
const HEIGHT: u32 = 6;

fn config() -> SessionConfig {
    let mut config = SessionConfig::new(CameraCalibration {
        width: WIDTH,
        height: HEIGHT,
        marker_size_m: 0.05,
        intrinsics_path: PathBuf::from("camera.yml"),
    });
    // Generous so slow CI machines never see a stale frame.
    config.drain_timeout_ms = 2000;
    config
}

fn frame() -> RgbaFrame {
    RgbaFrame::blank(WIDTH as usize, HEIGHT as usize).expect("blank frame")
}

fn marker(id: i32) -> MarkerObservation {
    MarkerObservation::new(id, [0.01, -0.02, 0.3], [0.0, 0.0, 0.0, 1.0])
}

fn applied(update: FrameUpdate) -> ar_markers::CycleReport {
    match update {
        FrameUpdate::Applied(report) => report,
        FrameUpdate::Stale => panic!("expected a fresh detection cycle"),
    }
}

#[test]
fn marker_that_disappears_is_hidden_but_kept() {
    let detector = ReplayDetector::new(vec![vec![marker(1)], vec![]]);
    let mut session =
        ArSession::start(config(), detector, SceneViewer::new(38.0)).expect("start session");

    session.submit_frame(frame()).expect("submit");
    let first = applied(session.update());
    assert_eq!(first.observed, vec![1]);
    assert_eq!(first.created, vec![1]);
    assert_eq!(session.tracker().state(1), Some(TrackState::Visible));

    session.submit_frame(frame()).expect("submit");
    let second = applied(session.update());
    assert!(second.observed.is_empty());
    assert_eq!(second.visibility.hidden, vec![1]);
    assert_eq!(session.tracker().state(1), Some(TrackState::Hidden));
    assert!(session.tracker().contains(1));

    let (viewer, cycles) = session.stop();
    assert_eq!(cycles.expect("clean stop"), 2);
    assert_eq!(viewer.instantiated(), 1);
    assert!(!viewer.objects()[0].visible);
}

#[test]
fn hidden_marker_reappears_without_recreation() {
    let detector = ReplayDetector::new(vec![vec![marker(4)], vec![], vec![marker(4)]]);
    let mut session =
        ArSession::start(config(), detector, SceneViewer::new(38.0)).expect("start session");

    for _ in 0..3 {
        session.submit_frame(frame()).expect("submit");
        applied(session.update());
    }
    assert_eq!(session.tracker().state(4), Some(TrackState::Visible));
    assert_eq!(session.tracker().get(4).map(|o| o.last_seen_version), Some(3));
    let (viewer, _) = session.stop();
    assert_eq!(viewer.instantiated(), 1);
}

struct FailAfterFirst {
    calls: usize,
}

impl MarkerDetector for FailAfterFirst {
    fn set_image(&mut self, _frame: &RgbaFrame) -> Result<(), DetectError> {
        Ok(())
    }

    fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
        self.calls += 1;
        if self.calls > 1 {
            return Err(DetectError::Native { code: -1 });
        }
        Ok(vec![marker(2)])
    }
}

#[test]
fn detection_failure_leaves_scene_intact() {
    let detector = FailAfterFirst { calls: 0 };
    let mut session =
        ArSession::start(config(), detector, SceneViewer::new(38.0)).expect("start session");

    session.submit_frame(frame()).expect("submit");
    applied(session.update());

    session.submit_frame(frame()).expect("submit");
    // The store is closed by the failing worker, so this returns promptly.
    assert!(session.update().is_stale());
    assert!(matches!(session.worker_status(), WorkerStatus::Failed(_)));
    assert_eq!(session.tracker().state(2), Some(TrackState::Visible));

    let (_, cycles) = session.stop();
    assert!(matches!(
        cycles,
        Err(WorkerError::Detect(DetectError::Native { code: -1 }))
    ));
}

#[test]
fn annotated_frames_are_available_when_captured() {
    let mut config = config();
    config.worker.capture_output = true;
    let detector = ReplayDetector::new(vec![vec![marker(1)]]);
    let mut session =
        ArSession::start(config, detector, SceneViewer::new(38.0)).expect("start session");

    assert!(session.take_annotated_frame().is_none());
    session.submit_frame(frame()).expect("submit");
    applied(session.update());
    let annotated = session.take_annotated_frame().expect("annotated frame");
    assert_eq!(annotated.width(), WIDTH as usize);
    assert_eq!(annotated.height(), HEIGHT as usize);
    let _ = session.stop();
}

/// Viewer that records every call instead of rendering.
#[derive(Default)]
struct RecordingViewer {
    instantiated: Vec<i32>,
    moves: usize,
    visibility: Vec<(usize, bool)>,
}

impl Viewer for RecordingViewer {
    type Handle = usize;

    fn instantiate(&mut self, id: i32, _pose: &WorldPose) -> usize {
        self.instantiated.push(id);
        self.instantiated.len() - 1
    }

    fn set_pose(&mut self, _handle: &mut usize, _pose: &WorldPose) {
        self.moves += 1;
    }

    fn set_visible(&mut self, handle: &mut usize, visible: bool) {
        self.visibility.push((*handle, visible));
    }

    fn field_of_view_deg(&self) -> f64 {
        38.0
    }
}

#[test]
fn custom_viewer_sees_create_move_and_visibility_calls() {
    let detector = ReplayDetector::new(vec![vec![marker(5), marker(7)], vec![marker(5)]]);
    let mut session =
        ArSession::start(config(), detector, RecordingViewer::default()).expect("start session");
    for _ in 0..2 {
        session.submit_frame(frame()).expect("submit");
        applied(session.update());
    }

    let object = session.tracker().get(5).expect("tracked");
    // Equal fovs: x and y are only mirrored and scaled by 1.0 / 0.05.
    assert_relative_eq!(object.pose.position.x, -0.2, epsilon = 1e-9);
    assert_relative_eq!(object.pose.position.y, 0.4, epsilon = 1e-9);
    assert_relative_eq!(object.pose.position.z, 6.0, epsilon = 1e-9);

    let (viewer, _) = session.stop();
    assert_eq!(viewer.instantiated, vec![5, 7]);
    assert_eq!(viewer.moves, 1);
    assert_eq!(
        viewer.visibility,
        vec![(0, true), (1, true), (0, true), (1, false)]
    );
}

#[test]
fn replay_report_lists_frames_and_objects() {
    let cycles = vec![vec![marker(1), marker(2)], vec![marker(2)], vec![]];
    let report = replay_session(config(), cycles, 60.0).expect("replay");

    assert_eq!(report.frames.len(), 3);
    assert_eq!(report.worker_cycles, 3);
    assert!(report.worker_error.is_none());
    assert_eq!(report.frames[0].created, vec![1, 2]);
    assert_eq!(report.frames[1].hidden, vec![1]);
    assert_eq!(report.frames[2].hidden, vec![2]);
    assert_eq!(report.frames[2].version, Some(3));

    let ids: Vec<_> = report.objects.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(report.objects.iter().all(|o| !o.visible));
    assert_eq!(report.background.distance, 1000.0);
}

#[test]
fn replay_rejects_degenerate_viewport_fov() {
    assert!(replay_session(config(), vec![], 90.0).is_err());
}

#[test]
fn replay_with_zero_drain_timeout_applies_every_cycle() {
    let mut config = config();
    config.drain_timeout_ms = 0;
    let cycles = vec![vec![marker(1)], vec![marker(2)], vec![marker(3)]];
    let report = replay_session(config, cycles, 60.0).expect("replay");

    let versions: Vec<_> = report.frames.iter().map(|f| f.version).collect();
    assert_eq!(versions, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(report.worker_cycles, 3);
    assert!(report.worker_error.is_none());

    let ids: Vec<_> = report.objects.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(report.objects[2].visible);
}
