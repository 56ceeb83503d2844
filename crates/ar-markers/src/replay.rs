//! End-to-end replay of recorded detection cycles through a full session.

use std::time::Duration;

use ar_markers_core::{validate_fov, RgbaFrame};
use ar_markers_detect::{RecordedCycle, ReplayDetector, WorkerStatus};
use ar_markers_tracker::SceneViewer;
use log::info;

use crate::io::{ReplayReport, SessionConfig};
use crate::session::{ArSession, SessionError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Replay `cycles` through a full session and report what the scene did.
///
/// Display frames are driven until every recorded cycle has been applied:
/// a blank camera frame of the calibrated size is submitted, then frames
/// are updated until the worker's detection for it arrives. Stale frames
/// are counted but do not consume a cycle. Each drain waits at least one
/// worker poll interval, so a zero `drain_timeout_ms` does not spin.
///
/// A worker failure does not abort the replay; the remaining cycles are
/// skipped and the reason is recorded in the report.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(config, cycles), fields(cycles = cycles.len()))
)]
pub fn replay_session(
    config: SessionConfig,
    cycles: Vec<RecordedCycle>,
    viewport_fov_deg: f64,
) -> Result<ReplayReport, SessionError> {
    validate_fov(viewport_fov_deg)?;
    let width = config.calibration.width as usize;
    let height = config.calibration.height as usize;
    let cycle_count = cycles.len();
    let wait = config.drain_timeout().max(config.worker.poll_interval());

    let detector = ReplayDetector::new(cycles).with_frame_size(width, height);
    let mut session = ArSession::start(config, detector, SceneViewer::new(viewport_fov_deg))?;
    let background = session.background_plane();

    let mut frames = Vec::with_capacity(cycle_count);
    let mut stale_frames = 0u64;
    let mut display_frame = 0usize;
    'cycles: while frames.len() < cycle_count {
        session.submit_frame(RgbaFrame::blank(width, height)?)?;
        loop {
            // A worker that has exited may still leave one published snapshot.
            let running = session.is_worker_running();
            let update = session.update_within(if running { wait } else { Duration::ZERO });
            let frame = display_frame;
            display_frame += 1;
            if !update.is_stale() {
                frames.push(update.to_record(frame));
                break;
            }
            stale_frames += 1;
            if !running {
                break 'cycles;
            }
        }
    }

    let objects = session.object_reports();
    let failure = match session.worker_status() {
        WorkerStatus::Failed(reason) => Some(reason),
        _ => None,
    };
    let applied = frames.len() as u64;
    let (_, stopped) = session.stop();
    let worker_cycles = stopped.unwrap_or(applied);
    info!(
        "replayed {applied}/{cycle_count} cycles over {display_frame} frames, {} objects tracked",
        objects.len()
    );

    Ok(ReplayReport {
        viewport_fov_deg,
        background,
        frames,
        stale_frames,
        objects,
        worker_cycles,
        worker_error: failure,
    })
}
