//! Background detection loop.
//!
//! The worker owns the detector. Each cycle it waits until the consumer has
//! drained the previous snapshot, takes the latest camera frame out of the
//! [`ImageMailbox`], runs detection and publishes the result into the
//! [`MarkerStore`]. Stopping is cooperative: the stop flag is checked every
//! iteration and every wait is bounded by `poll_interval`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ar_markers_core::{MarkerObservation, RgbaFrame};
use log::{debug, error, info, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{DetectError, ImageMailbox, MarkerDetector, MarkerStore, WorkerError};

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const WORKER_THREAD_NAME: &str = "ar-markers-detect";

fn default_poll_interval_ms() -> u64 {
    10
}

/// Detection worker settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound on every blocking wait, i.e. the stop-flag latency.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Copy the detector's annotated frame after every cycle.
    #[serde(default)]
    pub capture_output: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            capture_output: false,
        }
    }
}

impl WorkerConfig {
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Lifecycle of the worker thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Stopped,
    Failed(String),
}

struct Shared {
    stop: AtomicBool,
    status: Mutex<WorkerStatus>,
}

impl Shared {
    // Only the first terminal status sticks.
    fn finish(&self, status: WorkerStatus) {
        let mut current = self.status.lock();
        if *current == WorkerStatus::Running {
            *current = status;
        }
    }
}

/// Runs on worker exit, including unwinding, so the consumer is never left
/// waiting on a dead worker.
struct ExitGuard {
    shared: Arc<Shared>,
    store: Arc<MarkerStore>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.shared
            .finish(WorkerStatus::Failed("detection worker panicked".to_string()));
        self.store.close();
    }
}

struct LoopContext {
    shared: Arc<Shared>,
    store: Arc<MarkerStore>,
    frames: Arc<ImageMailbox>,
    annotated: Option<Arc<ImageMailbox>>,
    poll_interval: Duration,
}

/// Handle to the running detection thread.
pub struct DetectionWorker {
    shared: Arc<Shared>,
    store: Arc<MarkerStore>,
    frames: Arc<ImageMailbox>,
    annotated: Option<Arc<ImageMailbox>>,
    handle: Option<JoinHandle<Result<u64, DetectError>>>,
}

impl DetectionWorker {
    /// Move `detector` onto a dedicated thread and start the loop.
    pub fn spawn<D>(
        detector: D,
        store: Arc<MarkerStore>,
        frames: Arc<ImageMailbox>,
        config: &WorkerConfig,
    ) -> Result<Self, WorkerError>
    where
        D: MarkerDetector + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            status: Mutex::new(WorkerStatus::Running),
        });
        let annotated = config.capture_output.then(|| Arc::new(ImageMailbox::new()));

        let ctx = LoopContext {
            shared: Arc::clone(&shared),
            store: Arc::clone(&store),
            frames: Arc::clone(&frames),
            annotated: annotated.clone(),
            poll_interval: config.poll_interval(),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = ExitGuard {
                    shared: Arc::clone(&ctx.shared),
                    store: Arc::clone(&ctx.store),
                };
                let result = run_loop(detector, &ctx);
                match &result {
                    Ok(cycles) => {
                        info!("detection worker stopped after {cycles} cycles");
                        ctx.shared.finish(WorkerStatus::Stopped);
                    }
                    Err(err) => {
                        error!("detection worker terminated: {err}");
                        ctx.shared.finish(WorkerStatus::Failed(err.to_string()));
                    }
                }
                result
            })
            .map_err(WorkerError::Spawn)?;

        debug!("spawned detection worker thread");
        Ok(Self {
            shared,
            store,
            frames,
            annotated,
            handle: Some(handle),
        })
    }

    pub fn status(&self) -> WorkerStatus {
        self.shared.status.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status() == WorkerStatus::Running
    }

    /// Annotated frames, present when `capture_output` was enabled.
    pub fn annotated_frames(&self) -> Option<&Arc<ImageMailbox>> {
        self.annotated.as_ref()
    }

    /// Raise the stop flag and wake the worker. Does not wait.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.frames.close();
        self.store.close();
    }

    /// Stop cooperatively and join. The detector has been dropped on the
    /// worker thread by the time this returns.
    ///
    /// Returns the number of completed detection cycles.
    pub fn stop(mut self) -> Result<u64, WorkerError> {
        self.request_stop();
        self.join()
    }

    fn join(&mut self) -> Result<u64, WorkerError> {
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };
        match handle.join() {
            Ok(Ok(cycles)) => Ok(cycles),
            Ok(Err(err)) => Err(WorkerError::Detect(err)),
            Err(_) => Err(WorkerError::Panicked),
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
            let _ = self.join();
        }
    }
}

fn run_loop<D: MarkerDetector>(mut detector: D, ctx: &LoopContext) -> Result<u64, DetectError> {
    let mut cycles = 0u64;
    while !ctx.shared.stop.load(Ordering::Acquire) {
        if !ctx.store.wait_consumed(ctx.poll_interval) {
            if ctx.store.is_closed() {
                break;
            }
            continue;
        }
        let Some(frame) = ctx.frames.wait_take(ctx.poll_interval) else {
            continue;
        };

        let markers = detect_cycle(&mut detector, &frame)?;
        if let Some(annotated) = &ctx.annotated {
            let mut output = frame;
            detector.output_image(&mut output)?;
            annotated.submit(output);
        }

        let version = ctx.store.publish(markers);
        cycles += 1;
        trace!("published detection cycle {version}");
    }
    Ok(cycles)
}

#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(detector, frame), fields(width = frame.width(), height = frame.height()))
)]
fn detect_cycle<D: MarkerDetector>(
    detector: &mut D,
    frame: &RgbaFrame,
) -> Result<Vec<MarkerObservation>, DetectError> {
    detector.set_image(frame)?;
    let markers = detector.detect()?;
    trace!("detected {} markers", markers.len());
    Ok(markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    struct CountingDetector {
        next_id: i32,
        dropped: Arc<AtomicUsize>,
    }

    impl MarkerDetector for CountingDetector {
        fn set_image(&mut self, _frame: &RgbaFrame) -> Result<(), DetectError> {
            Ok(())
        }

        fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
            self.next_id += 1;
            Ok(vec![MarkerObservation::new(
                self.next_id,
                [0.0, 0.0, 1.0],
                [0.0, 0.0, 0.0, 1.0],
            )])
        }

        fn output_image(&self, dest: &mut RgbaFrame) -> Result<(), DetectError> {
            dest.as_bytes_mut().fill(255);
            Ok(())
        }
    }

    impl Drop for CountingDetector {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FailingDetector;

    impl MarkerDetector for FailingDetector {
        fn set_image(&mut self, _frame: &RgbaFrame) -> Result<(), DetectError> {
            Ok(())
        }

        fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
            Err(DetectError::Native { code: -1 })
        }
    }

    fn frame() -> RgbaFrame {
        RgbaFrame::blank(4, 4).unwrap()
    }

    fn counting() -> (CountingDetector, Arc<AtomicUsize>) {
        let dropped = Arc::new(AtomicUsize::new(0));
        (
            CountingDetector {
                next_id: 0,
                dropped: Arc::clone(&dropped),
            },
            dropped,
        )
    }

    #[test]
    fn one_cycle_per_drained_snapshot() {
        let (detector, dropped) = counting();
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let worker = DetectionWorker::spawn(
            detector,
            Arc::clone(&store),
            Arc::clone(&frames),
            &WorkerConfig::default(),
        )
        .unwrap();

        for expected in 1..=3 {
            frames.submit(frame());
            let snapshot = store.drain(Duration::from_secs(5)).expect("snapshot");
            assert_eq!(snapshot.version, expected);
            assert_eq!(snapshot.markers[0].id, expected as i32);
        }

        assert!(worker.is_running());
        let cycles = worker.stop().unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unconsumed_snapshot_is_not_overwritten() {
        let (detector, _dropped) = counting();
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let worker = DetectionWorker::spawn(
            detector,
            Arc::clone(&store),
            Arc::clone(&frames),
            &WorkerConfig::default(),
        )
        .unwrap();

        frames.submit(frame());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.is_ready() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        frames.submit(frame());
        thread::sleep(Duration::from_millis(50));

        assert_eq!(store.version(), 1);
        let snapshot = store.try_drain().unwrap();
        assert_eq!(snapshot.markers[0].id, 1);
        let next = store.drain(Duration::from_secs(5)).unwrap();
        assert_eq!(next.version, 2);
        worker.stop().unwrap();
    }

    #[test]
    fn detection_failure_terminates_and_closes_store() {
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let worker = DetectionWorker::spawn(
            FailingDetector,
            Arc::clone(&store),
            Arc::clone(&frames),
            &WorkerConfig::default(),
        )
        .unwrap();

        frames.submit(frame());
        assert!(store.drain(Duration::from_secs(5)).is_none());
        assert!(store.is_closed());
        assert_eq!(
            worker.status(),
            WorkerStatus::Failed("native detector failed (code=-1)".to_string())
        );
        assert!(matches!(
            worker.stop(),
            Err(WorkerError::Detect(DetectError::Native { code: -1 }))
        ));
    }

    #[test]
    fn stop_without_frames_returns_promptly() {
        let (detector, dropped) = counting();
        let worker = DetectionWorker::spawn(
            detector,
            Arc::new(MarkerStore::new()),
            Arc::new(ImageMailbox::new()),
            &WorkerConfig::default(),
        )
        .unwrap();
        let start = Instant::now();
        assert_eq!(worker.stop().unwrap(), 0);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_while_waiting_for_consumer_returns_promptly() {
        let (detector, dropped) = counting();
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let config = WorkerConfig {
            poll_interval_ms: 5_000,
            ..WorkerConfig::default()
        };
        let worker =
            DetectionWorker::spawn(detector, Arc::clone(&store), Arc::clone(&frames), &config)
                .unwrap();

        frames.submit(frame());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.is_ready() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(store.is_ready());
        // Give the worker time to block on the undrained snapshot.
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        assert_eq!(worker.stop().unwrap(), 1);
        // Well under the poll interval: the stop wakes the gate wait.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert_eq!(store.version(), 1);
    }

    #[test]
    fn annotated_frames_follow_each_cycle() {
        let (detector, _dropped) = counting();
        let store = Arc::new(MarkerStore::new());
        let frames = Arc::new(ImageMailbox::new());
        let config = WorkerConfig {
            capture_output: true,
            ..WorkerConfig::default()
        };
        let worker =
            DetectionWorker::spawn(detector, Arc::clone(&store), Arc::clone(&frames), &config)
                .unwrap();

        frames.submit(frame());
        store.drain(Duration::from_secs(5)).unwrap();
        let annotated = worker
            .annotated_frames()
            .expect("capture enabled")
            .take()
            .expect("annotated frame");
        assert!(annotated.as_bytes().iter().all(|&b| b == 255));
        worker.stop().unwrap();
    }
}
