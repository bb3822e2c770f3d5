//! Frame acquisition.
//!
//! This module owns everything that touches the capture hardware:
//! - Frame and capture types via [`Frame`], [`PixelFormat`] and [`CaptureSettings`]
//! - Capture devices via the [`CaptureDevice`] trait and [`open_device`]
//! - The shared, lock-guarded [`FrameSource`] that stream loops read from

mod device;
mod frame_utils;
mod source;
mod types;
mod watchdog;

pub use device::{
    open_device, CaptureDevice, Disconnected, ImageSequence, SourceAddress, SyntheticRoad, VideoDevice,
};
pub use frame_utils::{
    convert_to_rgb, frame_from_mat, frame_from_rgb_image, normalize_for_display, to_mat, to_rgb_image,
};
pub use source::FrameSource;
pub use types::{CaptureSettings, DeviceError, Frame, PixelFormat, ReadError, Resolution};
pub use watchdog::WatchdogDevice;
