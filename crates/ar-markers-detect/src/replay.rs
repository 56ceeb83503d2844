//! Detector that replays recorded detection cycles.
//!
//! Used to drive a full session without the native library, e.g. from the
//! CLI or from tests. Recordings are JSON arrays of cycles, each cycle an
//! array of marker observations.

use std::fs;
use std::path::Path;

use ar_markers_core::{MarkerObservation, RgbaFrame};
use log::debug;

use crate::{DetectError, MarkerDetector, ReplayIoError};

/// One recorded detection cycle.
pub type RecordedCycle = Vec<MarkerObservation>;

/// Replays a fixed script of detection cycles, one per `detect` call.
#[derive(Clone, Debug)]
pub struct ReplayDetector {
    cycles: Vec<RecordedCycle>,
    cursor: usize,
    repeat: bool,
    frame_size: Option<(usize, usize)>,
    has_frame: bool,
}

impl ReplayDetector {
    /// Replay `cycles` once; after the script ends every cycle is empty.
    pub fn new(cycles: Vec<RecordedCycle>) -> Self {
        Self {
            cycles,
            cursor: 0,
            repeat: false,
            frame_size: None,
            has_frame: false,
        }
    }

    /// Start over at the first cycle when the script ends.
    pub fn repeating(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Reject frames that are not `width x height`, like a native detector
    /// initialized for that size would.
    pub fn with_frame_size(mut self, width: usize, height: usize) -> Self {
        self.frame_size = Some((width, height));
        self
    }

    /// Load a recording from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayIoError> {
        Ok(Self::new(load_cycles_json(path)?))
    }

    /// Number of `detect` calls served so far.
    pub fn cycles_served(&self) -> usize {
        self.cursor
    }

    pub fn script_len(&self) -> usize {
        self.cycles.len()
    }
}

impl MarkerDetector for ReplayDetector {
    fn set_image(&mut self, frame: &RgbaFrame) -> Result<(), DetectError> {
        if let Some((width, height)) = self.frame_size {
            if frame.width() != width || frame.height() != height {
                return Err(DetectError::FrameSize {
                    width,
                    height,
                    got_width: frame.width(),
                    got_height: frame.height(),
                });
            }
        }
        self.has_frame = true;
        Ok(())
    }

    fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
        // Each frame is consumed by one detection, like the native detector.
        if !std::mem::take(&mut self.has_frame) {
            return Err(DetectError::NoFrame);
        }
        let index = self.cursor;
        self.cursor += 1;
        let cycle = match self.cycles.len() {
            0 => Vec::new(),
            len if self.repeat => self.cycles[index % len].clone(),
            _ => self.cycles.get(index).cloned().unwrap_or_default(),
        };
        debug!("replay cycle {index}: {} markers", cycle.len());
        Ok(cycle)
    }

    fn output_image(&self, _dest: &mut RgbaFrame) -> Result<(), DetectError> {
        // The input frame is passed through unannotated.
        Ok(())
    }
}

/// Read recorded cycles from a JSON file.
pub fn load_cycles_json(path: impl AsRef<Path>) -> Result<Vec<RecordedCycle>, ReplayIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write recorded cycles to disk as pretty JSON.
pub fn write_cycles_json(
    path: impl AsRef<Path>,
    cycles: &[RecordedCycle],
) -> Result<(), ReplayIoError> {
    let json = serde_json::to_string_pretty(cycles)?;
    fs::write(path, json)?;
    Ok(())
}
