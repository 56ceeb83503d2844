use ar_markers_core::FrameError;

/// Errors returned by a [`MarkerDetector`](crate::MarkerDetector).
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("detector handle is not initialized")]
    NotInitialized,
    #[error(
        "frame is {got_width}x{got_height}, detector was initialized for {width}x{height}"
    )]
    FrameSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },
    #[error("no frame was submitted before detection")]
    NoFrame,
    #[error("native detector failed (code={code})")]
    Native { code: i32 },
    #[error("detector does not produce an annotated output image")]
    OutputUnsupported,
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Errors surfaced when starting or joining the detection worker.
#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error("failed to spawn detection worker thread")]
    Spawn(#[source] std::io::Error),
    #[error("detection worker panicked")]
    Panicked,
    #[error("detection worker terminated")]
    Detect(#[from] DetectError),
}

/// Errors raised while loading or writing recorded detection cycles.
#[derive(thiserror::Error, Debug)]
pub enum ReplayIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
