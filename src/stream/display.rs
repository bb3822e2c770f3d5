//! Hand-off from stream workers to the UI thread.
//!
//! Workers never touch the display. They post [`UiMessage`]s through a
//! [`UiHandle`]; the thread that owns the [`DisplayHub`] pumps them into a
//! [`DisplaySink`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use image::RgbImage;

/// Target surface for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    /// Camera feed as captured
    Raw,
    /// Camera feed with the lane overlay
    Processed,
}

impl SurfaceId {
    pub fn name(self) -> &'static str {
        match self {
            SurfaceId::Raw => "raw",
            SurfaceId::Processed => "processed",
        }
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An update for the UI thread.
#[derive(Debug, Clone)]
pub enum UiMessage {
    Image { surface: SurfaceId, image: RgbImage },
    Status(String),
}

/// Worker-side end of the UI channel.
#[derive(Debug, Clone)]
pub struct UiHandle {
    sender: Sender<UiMessage>,
}

impl UiHandle {
    /// Post an image. Returns `false` once the UI side has gone away.
    pub fn show(&self, surface: SurfaceId, image: RgbImage) -> bool {
        self.sender.send(UiMessage::Image { surface, image }).is_ok()
    }

    /// Post a status line. Returns `false` once the UI side has gone away.
    pub fn status(&self, text: impl Into<String>) -> bool {
        self.sender.send(UiMessage::Status(text.into())).is_ok()
    }
}

/// Something that can present images and status text.
///
/// Called only on the thread pumping the [`DisplayHub`].
pub trait DisplaySink {
    fn show(&mut self, surface: SurfaceId, image: &RgbImage);
    fn status(&mut self, text: &str);
}

/// UI-side end of the channel.
#[derive(Debug)]
pub struct DisplayHub {
    receiver: Receiver<UiMessage>,
}

impl DisplayHub {
    /// Create a hub and the first handle for workers; clone the handle for
    /// more workers.
    pub fn channel() -> (UiHandle, DisplayHub) {
        let (sender, receiver) = mpsc::channel();
        (UiHandle { sender }, DisplayHub { receiver })
    }

    /// Deliver everything queued, waiting up to `wait` for the first message.
    ///
    /// Returns how many messages were delivered.
    pub fn pump(&self, sink: &mut dyn DisplaySink, wait: Duration) -> usize {
        let Ok(first) = self.receiver.recv_timeout(wait) else {
            return 0;
        };
        deliver(sink, first);
        let mut delivered = 1;
        while let Ok(message) = self.receiver.try_recv() {
            deliver(sink, message);
            delivered += 1;
        }
        delivered
    }

    /// Deliver messages until every handle has been dropped.
    pub fn run(&self, sink: &mut dyn DisplaySink) {
        for message in self.receiver.iter() {
            deliver(sink, message);
        }
    }
}

fn deliver(sink: &mut dyn DisplaySink, message: UiMessage) {
    match message {
        UiMessage::Image { surface, image } => sink.show(surface, &image),
        UiMessage::Status(text) => sink.status(&text),
    }
}

/// Writes the latest image of each surface to `<dir>/<surface>.png`.
#[derive(Debug)]
pub struct SnapshotSink {
    dir: PathBuf,
    written: usize,
    write_failed: bool,
    last_status: Option<String>,
}

impl SnapshotSink {
    /// Create the sink, creating `dir` if needed.
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
            write_failed: false,
            last_status: None,
        })
    }

    pub fn path_for(&self, surface: SurfaceId) -> PathBuf {
        self.dir.join(format!("{}.png", surface))
    }

    /// Number of images written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }
}

impl DisplaySink for SnapshotSink {
    fn show(&mut self, surface: SurfaceId, image: &RgbImage) {
        let path = self.path_for(surface);
        match image.save(&path) {
            Ok(()) => {
                self.written += 1;
                self.write_failed = false;
            }
            Err(e) => {
                // log once per failure streak
                if !self.write_failed {
                    log::warn!("Failed to write {}: {}", path.display(), e);
                }
                self.write_failed = true;
            }
        }
    }

    fn status(&mut self, text: &str) {
        log::info!("{}", text);
        self.last_status = Some(text.to_string());
    }
}

/// Discards images and logs status text.
#[derive(Debug, Default)]
pub struct NullSink {
    pub images: usize,
    pub statuses: usize,
}

impl DisplaySink for NullSink {
    fn show(&mut self, _surface: SurfaceId, _image: &RgbImage) {
        self.images += 1;
    }

    fn status(&mut self, text: &str) {
        log::info!("{}", text);
        self.statuses += 1;
    }
}
