//! Bindings to the native `opencv_sample` ArUco detector.
//!
//! The native library exposes a handle-based C ABI:
//! `aruco_initialize`, `aruco_set_image`, `aruco_detect`,
//! `aruco_get_markers`, `aruco_get_image` and `aruco_finalize`.
//! [`NativeArucoDetector`] (feature `native`) owns one handle and
//! implements [`ar_markers_detect::MarkerDetector`] on top of it.
//!
//! The record layout and the argument/return-code checks in [`raw`] are
//! always available, so they can be exercised without linking the library.

pub mod raw;

#[cfg(feature = "native")]
mod native;

#[cfg(feature = "native")]
pub use native::NativeArucoDetector;

pub use raw::{InitArgs, NativeInitError, RawMarkerResult};
