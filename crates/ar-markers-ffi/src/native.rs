//! Safe owner of an `opencv_sample` ArUco detector handle.

use std::ffi::{c_char, c_float, c_int, c_void};
use std::ptr::NonNull;

use ar_markers_core::{CameraCalibration, MarkerObservation, RgbaFrame};
use ar_markers_detect::{DetectError, MarkerDetector};
use log::{debug, info};

use crate::raw::{detect_count, markers_from_raw, InitArgs, NativeInitError, RawMarkerResult};

#[link(name = "opencv_sample")]
extern "C" {
    fn aruco_initialize(
        width: c_int,
        height: c_int,
        marker_size: c_float,
        camera_params_file_path: *const c_char,
    ) -> *mut c_void;
    fn aruco_finalize(instance: *mut c_void);
    fn aruco_set_image(instance: *mut c_void, src: *const u8);
    fn aruco_get_image(instance: *mut c_void, dest: *mut u8);
    fn aruco_detect(instance: *mut c_void) -> c_int;
    fn aruco_get_markers(instance: *mut c_void) -> *const RawMarkerResult;
}

/// Exclusive owner of a native detector instance.
///
/// The handle is finalized on drop. The detection worker drops its detector
/// on the worker thread after the loop exits, so finalization never overlaps
/// a detection.
pub struct NativeArucoDetector {
    handle: NonNull<c_void>,
    width: usize,
    height: usize,
    detected_once: bool,
}

// SAFETY: the native instance has no thread affinity; `&mut self` on every
// mutating call guarantees it is used from one thread at a time.
unsafe impl Send for NativeArucoDetector {}

impl NativeArucoDetector {
    /// Create a native detector for frames of the calibrated size.
    pub fn initialize(calibration: &CameraCalibration) -> Result<Self, NativeInitError> {
        let args = InitArgs::from_calibration(calibration)?;
        // SAFETY: `intrinsics_path` is a valid NUL-terminated string that
        // outlives the call; the native side copies what it needs.
        let raw = unsafe {
            aruco_initialize(
                args.width,
                args.height,
                args.marker_size,
                args.intrinsics_path.as_ptr(),
            )
        };
        let handle = NonNull::new(raw).ok_or(NativeInitError::NullHandle)?;
        info!(
            "native ArUco detector initialized ({}x{}, marker {} m)",
            calibration.width, calibration.height, calibration.marker_size_m
        );
        Ok(Self {
            handle,
            width: calibration.width as usize,
            height: calibration.height as usize,
            detected_once: false,
        })
    }

    fn check_frame(&self, frame: &RgbaFrame) -> Result<(), DetectError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(DetectError::FrameSize {
                width: self.width,
                height: self.height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        Ok(())
    }
}

impl MarkerDetector for NativeArucoDetector {
    fn set_image(&mut self, frame: &RgbaFrame) -> Result<(), DetectError> {
        self.check_frame(frame)?;
        // SAFETY: the buffer holds exactly width * height * 4 bytes, which is
        // what the native side copies out of it.
        unsafe { aruco_set_image(self.handle.as_ptr(), frame.as_bytes().as_ptr()) };
        Ok(())
    }

    fn detect(&mut self) -> Result<Vec<MarkerObservation>, DetectError> {
        // SAFETY: the handle is live until drop.
        let code = unsafe { aruco_detect(self.handle.as_ptr()) };
        let count = detect_count(code)?;
        self.detected_once = true;
        if count == 0 {
            return Ok(Vec::new());
        }
        // SAFETY: after a successful detect the native marker array holds
        // `count` records and stays untouched until the next detect.
        let markers = unsafe {
            let ptr = aruco_get_markers(self.handle.as_ptr());
            markers_from_raw(ptr, count)
        };
        debug!("native detector reported {count} markers");
        Ok(markers)
    }

    fn output_image(&self, dest: &mut RgbaFrame) -> Result<(), DetectError> {
        if !self.detected_once {
            return Err(DetectError::NoFrame);
        }
        self.check_frame(dest)?;
        // SAFETY: `dest` has room for the full RGBA output image.
        unsafe { aruco_get_image(self.handle.as_ptr(), dest.as_bytes_mut().as_mut_ptr()) };
        Ok(())
    }
}

impl Drop for NativeArucoDetector {
    fn drop(&mut self) {
        // SAFETY: the handle came from `aruco_initialize` and is released once.
        unsafe { aruco_finalize(self.handle.as_ptr()) };
        debug!("native ArUco detector finalized");
    }
}
