//! The boundary to the external marker detector.

use ar_markers_core::{MarkerObservation, RgbaFrame};

use crate::DetectError;

/// A marker detector driven by the detection worker.
///
/// The worker owns the detector exclusively: `set_image` and `detect` are
/// always called from the worker thread, one cycle at a time, and the
/// detector is dropped on that same thread once the loop ends. Implementors
/// that wrap a native handle release it in `Drop`.
pub trait MarkerDetector {
    /// Hand the most recent camera frame to the detector.
    fn set_image(&mut self, frame: &RgbaFrame) -> Result<(), DetectError>;

    /// Run one detection cycle against the last frame set.
    fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError>;

    /// Copy the annotated frame of the last cycle into `dest`.
    fn output_image(&self, _dest: &mut RgbaFrame) -> Result<(), DetectError> {
        Err(DetectError::OutputUnsupported)
    }
}

impl<D: MarkerDetector + ?Sized> MarkerDetector for Box<D> {
    fn set_image(&mut self, frame: &RgbaFrame) -> Result<(), DetectError> {
        (**self).set_image(frame)
    }

    fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
        (**self).detect()
    }

    fn output_image(&self, dest: &mut RgbaFrame) -> Result<(), DetectError> {
        (**self).output_image(dest)
    }
}
