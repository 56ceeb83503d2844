/// Bytes per pixel of an RGBA32 camera frame.
pub const RGBA_CHANNELS: usize = 4;

/// Errors raised when a pixel buffer does not describe a valid RGBA frame.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid RGBA buffer length (expected {expected} bytes, got {got})")]
    InvalidBufferLength { expected: usize, got: usize },
}

#[inline]
fn expected_len(width: usize, height: usize) -> Result<usize, FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(RGBA_CHANNELS))
        .ok_or(FrameError::InvalidDimensions { width, height })
}

/// Borrowed RGBA frame, row-major, `len = w * h * 4`.
#[derive(Clone, Copy, Debug)]
pub struct RgbaFrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

impl<'a> RgbaFrameView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, FrameError> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn to_owned_frame(&self) -> RgbaFrame {
        RgbaFrame {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Owned RGBA camera frame handed from the capture side to the detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaFrame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbaFrame {
    /// Wrap an existing buffer, validating its length against the dimensions.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(FrameError::InvalidBufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Fully transparent black frame.
    pub fn blank(width: usize, height: usize) -> Result<Self, FrameError> {
        let len = expected_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// RGBA value at `(x, y)`, or `None` outside the frame.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * RGBA_CHANNELS;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }
}
