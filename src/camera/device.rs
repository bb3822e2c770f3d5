//! Capture devices.
//!
//! A [`CaptureDevice`] is the raw handle behind a [`FrameSource`](super::FrameSource).
//! Nothing outside the `camera` module touches a device directly.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use opencv::core::{self, Mat, Scalar};
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::frame_utils::{frame_from_mat, frame_from_rgb_image};
use super::types::{CaptureSettings, DeviceError, Frame, PixelFormat, Resolution};
use super::watchdog::WatchdogDevice;
use crate::vision::draw_segment;

/// A video capture handle.
///
/// `read` blocks until the device produces a frame (or gives up on it) and
/// advances the device's read position; a frame that is not consumed is lost.
pub trait CaptureDevice: Send {
    /// Whether the handle is connected and can produce frames.
    fn is_open(&self) -> bool;

    /// Read the next frame, `None` on a missed read.
    fn read(&mut self) -> Option<Frame>;

    /// Close the handle. Subsequent reads return `None`.
    fn release(&mut self);

    /// Whether the last `None` from `read` came from a timeout rather than
    /// the device itself.
    fn last_read_timed_out(&self) -> bool {
        false
    }
}

/// What a capture address names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAddress {
    /// `synthetic`
    Synthetic,
    /// `none`
    Disconnected,
    /// A camera index such as `0`
    Camera(i32),
    /// Anything with a scheme, e.g. `rtsp://host/stream` or `http://host/feed.mjpg`
    Stream(String),
    /// An existing directory of still images
    ImageDirectory(PathBuf),
    /// Any other path, opened as a video file
    VideoFile(PathBuf),
}

impl SourceAddress {
    pub fn parse(address: &str) -> Self {
        match address {
            "synthetic" => return Self::Synthetic,
            "none" => return Self::Disconnected,
            _ => {}
        }
        if !address.is_empty() && address.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = address.parse() {
                return Self::Camera(index);
            }
        }
        if address.contains("://") {
            return Self::Stream(address.to_string());
        }
        let path = PathBuf::from(address);
        if path.is_dir() {
            Self::ImageDirectory(path)
        } else {
            Self::VideoFile(path)
        }
    }
}

/// Open the device named by `settings.address`.
///
/// * `synthetic` - generated road scene ([`SyntheticRoad`])
/// * `none` - a handle that never connects ([`Disconnected`])
/// * a camera index, a stream URL or a video file - [`VideoDevice`]
/// * a directory - still images played in name order ([`ImageSequence`])
///
/// A camera or stream that cannot be reached is not an error here: the
/// device comes back closed and the stream loops report No Connection.
///
/// When a read timeout is configured the device is moved onto its own reader
/// thread so a stalled read cannot hold up the caller indefinitely.
pub fn open_device(settings: &CaptureSettings) -> Result<Box<dyn CaptureDevice>, DeviceError> {
    let device: Box<dyn CaptureDevice> = match SourceAddress::parse(&settings.address) {
        SourceAddress::Synthetic => Box::new(SyntheticRoad::new(Resolution::VGA, settings.fps)),
        SourceAddress::Disconnected => Box::new(Disconnected),
        SourceAddress::Camera(index) => Box::new(VideoDevice::camera(index)),
        SourceAddress::Stream(url) => Box::new(VideoDevice::open(&url)),
        SourceAddress::VideoFile(path) => Box::new(VideoDevice::open(&path.to_string_lossy())),
        SourceAddress::ImageDirectory(dir) => {
            Box::new(ImageSequence::open(&dir, settings.fps, settings.looping)?)
        }
    };

    Ok(match settings.read_timeout {
        Some(timeout) => Box::new(WatchdogDevice::spawn(device, timeout)),
        None => device,
    })
}

/// Sleeps so that consecutive reads are at least one frame interval apart.
#[derive(Debug)]
struct Pacer {
    interval: Option<Duration>,
    next: Option<Instant>,
}

impl Pacer {
    fn new(fps: u32) -> Self {
        Self {
            interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            next: None,
        }
    }

    fn wait(&mut self) {
        let Some(interval) = self.interval else {
            return;
        };
        let now = Instant::now();
        if let Some(next) = self.next {
            if next > now {
                thread::sleep(next - now);
            }
        }
        self.next = Some(self.next.map_or(now, |n| n.max(now)) + interval);
    }
}

/// Generated road scene: dark asphalt with two bright lane stripes that sway
/// slowly from side to side.
///
/// The stripes sit inside the default region of interest for a 640x480 feed,
/// which makes this source useful for demos and end-to-end tests.
#[derive(Debug)]
pub struct SyntheticRoad {
    resolution: Resolution,
    pacer: Pacer,
    frame_index: u64,
    open: bool,
}

impl SyntheticRoad {
    /// Asphalt colour (BGR)
    const ROAD: [u8; 3] = [70, 70, 70];
    /// Lane paint colour (RGB)
    const PAINT: [u8; 3] = [250, 250, 250];
    const STRIPE_WIDTH: u32 = 8;
    /// Peak horizontal sway in pixels
    const SWAY: f64 = 20.0;
    /// Frames per full sway cycle
    const SWAY_PERIOD: f64 = 240.0;

    pub fn new(resolution: Resolution, fps: u32) -> Self {
        Self {
            resolution,
            pacer: Pacer::new(fps),
            frame_index: 0,
            open: true,
        }
    }

    /// Render frame number `index` without advancing the device.
    pub fn render(&self, index: u64) -> opencv::Result<Frame> {
        let Resolution { width, height } = self.resolution;
        let [b, g, r] = Self::ROAD.map(f64::from);
        let mut image = Mat::new_rows_cols_with_default(
            height as i32,
            width as i32,
            core::CV_8UC3,
            Scalar::new(b, g, r, 0.0),
        )?;

        // Stripe geometry is laid out for 640x480 and scaled to the resolution.
        let sx = width as f64 / 640.0;
        let sy = height as f64 / 480.0;
        let sway = Self::SWAY * (2.0 * PI * index as f64 / Self::SWAY_PERIOD).sin();
        let point = |x: f64, y: f64| (((x + sway) * sx).round() as i32, (y * sy).round() as i32);

        let stripes = [
            (point(120.0, 479.0), point(330.0, 360.0)),
            (point(600.0, 479.0), point(420.0, 360.0)),
        ];
        for (from, to) in stripes {
            draw_segment(&mut image, PixelFormat::Bgr, from, to, Self::PAINT, Self::STRIPE_WIDTH)?;
        }
        frame_from_mat(&image, PixelFormat::Bgr)
    }
}

impl CaptureDevice for SyntheticRoad {
    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        self.pacer.wait();
        let index = self.frame_index;
        self.frame_index += 1;
        match self.render(index) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Synthetic frame {} failed to render: {}", index, e);
                None
            }
        }
    }

    fn release(&mut self) {
        self.open = false;
    }
}

/// A camera, network stream or video file read through OpenCV.
///
/// Opening never fails: a capture that cannot be reached is logged and the
/// device stays closed, so every read is a miss.
pub struct VideoDevice {
    address: String,
    capture: Option<VideoCapture>,
}

impl VideoDevice {
    /// Camera by index, with whatever backend OpenCV picks.
    pub fn camera(index: i32) -> Self {
        Self::connect(
            format!("camera {}", index),
            VideoCapture::new(index, videoio::CAP_ANY),
        )
    }

    /// Stream URL or video file path.
    pub fn open(address: &str) -> Self {
        Self::connect(
            address.to_string(),
            VideoCapture::from_file(address, videoio::CAP_ANY),
        )
    }

    fn connect(address: String, opened: opencv::Result<VideoCapture>) -> Self {
        let capture = match opened {
            Ok(capture) if capture.is_opened().unwrap_or(false) => {
                log::info!("Opened video capture {}", address);
                Some(capture)
            }
            Ok(_) => {
                log::warn!("Could not connect to {}", address);
                None
            }
            Err(e) => {
                log::warn!("Could not connect to {}: {}", address, e);
                None
            }
        };
        Self { address, capture }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl CaptureDevice for VideoDevice {
    fn is_open(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.is_opened().unwrap_or(false))
    }

    fn read(&mut self) -> Option<Frame> {
        let capture = self.capture.as_mut()?;
        let mut image = Mat::default();
        match capture.read(&mut image) {
            Ok(true) if !image.empty() => {}
            Ok(_) => return None,
            Err(e) => {
                log::debug!("Read from {} failed: {}", self.address, e);
                return None;
            }
        }

        let format = if image.channels() == 1 {
            PixelFormat::Gray
        } else {
            PixelFormat::Bgr
        };
        match frame_from_mat(&image, format) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("Unusable frame from {}: {}", self.address, e);
                None
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                log::warn!("Releasing {} failed: {}", self.address, e);
            }
        }
    }
}

/// A directory of still images played back as a video feed, in file name order.
///
/// Images are decoded on each read; an image that fails to decode is a
/// missed read, not an error.
#[derive(Debug)]
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    position: usize,
    looping: bool,
    pacer: Pacer,
    open: bool,
}

impl ImageSequence {
    const EXTENSIONS: [&'static str; 3] = ["png", "jpg", "jpeg"];

    pub fn open(dir: &Path, fps: u32, looping: bool) -> Result<Self, DeviceError> {
        let display = dir.display().to_string();
        if !dir.is_dir() {
            return Err(DeviceError::NotADirectory(display));
        }

        let entries = fs::read_dir(dir).map_err(|e| DeviceError::Io {
            path: display.clone(),
            source: e,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| Self::EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(DeviceError::NoFrames(display));
        }

        log::info!("Opened image sequence {} ({} frames)", display, paths.len());
        Ok(Self {
            paths,
            position: 0,
            looping,
            pacer: Pacer::new(fps),
            open: true,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl CaptureDevice for ImageSequence {
    fn is_open(&self) -> bool {
        self.open
    }

    fn read(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        if self.position >= self.paths.len() {
            if !self.looping {
                return None;
            }
            self.position = 0;
        }

        self.pacer.wait();
        let path = &self.paths[self.position];
        self.position += 1;

        match image::open(path) {
            Ok(decoded) => Some(frame_from_rgb_image(decoded.into_rgb8())),
            Err(e) => {
                log::debug!("Skipping undecodable frame {}: {}", path.display(), e);
                None
            }
        }
    }

    fn release(&mut self) {
        self.open = false;
    }
}

/// A handle whose connection never came up.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl CaptureDevice for Disconnected {
    fn is_open(&self) -> bool {
        false
    }

    fn read(&mut self) -> Option<Frame> {
        None
    }

    fn release(&mut self) {}
}
