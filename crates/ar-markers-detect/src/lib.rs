//! Background marker detection and the snapshot exchange with the consumer.
//!
//! This crate focuses on:
//! - the [`MarkerDetector`] boundary to an external (usually native) detector,
//! - a single-slot [`ImageMailbox`] carrying the latest camera frame to the worker,
//! - a versioned, lock-guarded [`MarkerStore`] carrying detections back,
//! - the [`DetectionWorker`] thread tying the three together.
//!
//! It does **not** detect markers itself. [`ReplayDetector`] stands in for a
//! real detector by replaying recorded cycles.

mod detector;
mod error;
mod mailbox;
mod replay;
mod store;
mod worker;

pub use detector::MarkerDetector;
pub use error::{DetectError, ReplayIoError, WorkerError};
pub use mailbox::ImageMailbox;
pub use replay::{load_cycles_json, write_cycles_json, RecordedCycle, ReplayDetector};
pub use store::MarkerStore;
pub use worker::{DetectionWorker, WorkerConfig, WorkerStatus, WORKER_THREAD_NAME};
