//! The shared frame source.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::device::{open_device, CaptureDevice};
use super::types::{CaptureSettings, DeviceError, Frame, ReadError};

/// Exclusive owner of the capture device.
///
/// The device handle is never exposed; callers only get [`try_read`](Self::try_read),
/// which holds the lock for the duration of the device read and nothing else.
/// Share it between loops with an `Arc`.
pub struct FrameSource {
    device: Mutex<Box<dyn CaptureDevice>>,
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl FrameSource {
    /// Take ownership of an already opened device.
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device: Mutex::new(device),
        }
    }

    /// Open the device described by `settings`.
    pub fn open(settings: &CaptureSettings) -> Result<Self, DeviceError> {
        let device = open_device(settings)?;
        log::info!(
            "Capture source '{}' opened (connected: {})",
            settings.address,
            device.is_open()
        );
        Ok(Self::new(device))
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn CaptureDevice>> {
        // A panic inside a device read leaves the handle itself usable.
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the underlying handle is connected.
    pub fn is_open(&self) -> bool {
        self.lock().is_open()
    }

    /// Read the next frame from the device.
    ///
    /// Never retries: a missed frame is gone. Each successful call returns a
    /// frame owned by the caller alone.
    pub fn try_read(&self) -> Result<Frame, ReadError> {
        let mut device = self.lock();
        if !device.is_open() {
            return Err(ReadError::Unavailable);
        }
        match device.read() {
            Some(frame) => Ok(frame),
            None if !device.is_open() => Err(ReadError::Unavailable),
            None if device.last_read_timed_out() => Err(ReadError::TimedOut),
            None => Err(ReadError::Miss),
        }
    }

    /// Close the device. Later reads report [`ReadError::Unavailable`].
    pub fn release(&self) {
        let mut device = self.lock();
        if device.is_open() {
            device.release();
            log::info!("Capture source released");
        }
    }
}
