//! C-side data layout and the checks around it.
//!
//! Everything here is plain data conversion and is compiled without the
//! `native` feature, so it is testable without the library.

use std::ffi::{c_double, c_float, c_int, CString};
use std::path::{Path, PathBuf};

use ar_markers_core::{CalibrationError, CameraCalibration, MarkerObservation};
use ar_markers_detect::DetectError;

/// One marker as laid out by the native `aruco_get_markers` array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawMarkerResult {
    pub id: c_int,
    pub position: [c_double; 3],
    pub orientation: [c_double; 4],
}

impl From<RawMarkerResult> for MarkerObservation {
    fn from(raw: RawMarkerResult) -> Self {
        MarkerObservation::new(raw.id, raw.position, raw.orientation)
    }
}

/// Errors raised while creating a native detector handle.
#[derive(thiserror::Error, Debug)]
pub enum NativeInitError {
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("camera intrinsics file not found: {}", .0.display())]
    MissingIntrinsics(PathBuf),
    #[error("camera intrinsics path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("camera intrinsics path contains an interior NUL byte")]
    InteriorNul(#[from] std::ffi::NulError),
    #[error("image size {width}x{height} exceeds the native int range")]
    ImageTooLarge { width: u32, height: u32 },
    #[error("native detector returned a null handle")]
    NullHandle,
}

/// Arguments of `aruco_initialize`, validated and converted to C types.
#[derive(Debug)]
pub struct InitArgs {
    pub width: c_int,
    pub height: c_int,
    pub marker_size: c_float,
    pub intrinsics_path: CString,
}

impl InitArgs {
    pub fn from_calibration(calibration: &CameraCalibration) -> Result<Self, NativeInitError> {
        calibration.validate()?;
        let too_large = || NativeInitError::ImageTooLarge {
            width: calibration.width,
            height: calibration.height,
        };
        let width = c_int::try_from(calibration.width).map_err(|_| too_large())?;
        let height = c_int::try_from(calibration.height).map_err(|_| too_large())?;
        // Native code reads the intrinsics with no error channel back.
        if !calibration.intrinsics_path.is_file() {
            return Err(NativeInitError::MissingIntrinsics(
                calibration.intrinsics_path.clone(),
            ));
        }
        Ok(Self {
            width,
            height,
            marker_size: calibration.marker_size_m as c_float,
            intrinsics_path: path_to_cstring(&calibration.intrinsics_path)?,
        })
    }
}

fn path_to_cstring(path: &Path) -> Result<CString, NativeInitError> {
    let s = path
        .to_str()
        .ok_or_else(|| NativeInitError::NonUtf8Path(path.to_path_buf()))?;
    Ok(CString::new(s)?)
}

/// Interpret the return code of `aruco_detect`.
///
/// The native side returns the marker count, or `-1` when it had no input
/// image (its `size_t` error value truncated to `int`).
#[inline]
pub fn detect_count(code: c_int) -> Result<usize, DetectError> {
    usize::try_from(code).map_err(|_| DetectError::Native { code })
}

/// Copy `count` native marker records into owned observations.
///
/// # Safety
///
/// If `count > 0`, `ptr` must point to at least `count` initialized
/// `RawMarkerResult` values that stay valid for the duration of the call.
pub unsafe fn markers_from_raw(
    ptr: *const RawMarkerResult,
    count: usize,
) -> Vec<MarkerObservation> {
    if count == 0 || ptr.is_null() {
        return Vec::new();
    }
    // SAFETY: upheld by the caller.
    let records = unsafe { std::slice::from_raw_parts(ptr, count) };
    records.iter().copied().map(MarkerObservation::from).collect()
}
