//! Frame types and capture errors.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Frame resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 640x480, the resolution of the deployed camera feed
    pub const VGA: Resolution = Resolution {
        width: 640,
        height: 480,
    };

    /// 256x256, the size of the preview surfaces
    pub const PREVIEW: Resolution = Resolution {
        width: 256,
        height: 256,
    };
}

impl Default for Resolution {
    fn default() -> Self {
        Self::VGA
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Settings for opening a capture device.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// `synthetic`, `none`, a camera index, a stream URL, a video file or a
    /// directory of still images
    pub address: String,
    /// Frame pacing for generated and file-backed sources (0 = as fast as possible)
    pub fps: u32,
    /// Restart file-backed sources when they run out of frames
    pub looping: bool,
    /// Upper bound on a single device read
    pub read_timeout: Option<Duration>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            address: "synthetic".to_string(),
            fps: 30,
            looping: true,
            read_timeout: None,
        }
    }
}

/// Channel layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel, red first
    Rgb,
    /// 3 bytes per pixel, blue first (what most capture backends hand out)
    Bgr,
    /// 1 byte per pixel intensity
    Gray,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
            PixelFormat::Gray => 1,
        }
    }
}

/// A captured or derived image.
///
/// Frames are never mutated once handed across a stage boundary: every stage
/// takes `&Frame` and builds a new one. Two reads from the same device always
/// yield independently owned frames.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Row-major pixel data, `width * height * channels` bytes
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format
    pub format: PixelFormat,
    /// Timestamp when the frame was captured (or derived)
    pub timestamp: Instant,
}

impl Frame {
    /// Create a zero-filled frame.
    pub fn zeros(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * format.channels()],
            width,
            height,
            format,
            timestamp: Instant::now(),
        }
    }

    /// Create a frame where every pixel has the same value.
    ///
    /// `pixel` must hold exactly `format.channels()` bytes.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> Self {
        debug_assert_eq!(pixel.len(), format.channels());
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * pixel.len());
        for _ in 0..count {
            data.extend_from_slice(pixel);
        }
        Self {
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
        }
    }

    /// Get the number of bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.channels()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    /// True when the buffer is empty or does not match the declared dimensions.
    pub fn is_malformed(&self) -> bool {
        self.width == 0
            || self.height == 0
            || self.data.len() != self.width as usize * self.height as usize * self.bytes_per_pixel()
    }

    /// Byte offset of pixel `(x, y)`.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.bytes_per_pixel()
    }

    /// Pixel bytes at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = self.offset(x, y);
        &self.data[start..start + self.bytes_per_pixel()]
    }
}

/// Errors raised while opening a capture device from its address.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Capture source '{0}' is not a directory of images")]
    NotADirectory(String),
    #[error("No decodable images found in '{0}'")]
    NoFrames(String),
    #[error("Failed to read capture source '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a call to `FrameSource::try_read` produced no frame.
///
/// None of these are fatal; loops skip the iteration and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The capture handle is not open (or has been released)
    #[error("capture device is not open")]
    Unavailable,
    /// The device is open but this read returned nothing
    #[error("frame read missed")]
    Miss,
    /// The device did not answer within the configured read timeout
    #[error("frame read timed out")]
    TimedOut,
}
