//! Read-timeout wrapper for capture devices.
//!
//! The wrapped device lives on a dedicated reader thread. Each `read` asks
//! that thread for a frame and waits at most `timeout` for the answer. At most
//! one request is outstanding. An answer that arrives after its read timed out
//! is stale: the next read drops it and requests a fresh frame, all within its
//! own timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::device::CaptureDevice;
use super::types::Frame;

/// Commands sent to the reader thread.
enum ReaderCommand {
    Read,
    Release,
}

/// Outcome of waiting on the reader thread.
enum Answer {
    Frame(Option<Frame>),
    Late,
    Gone,
}

/// A capture device whose reads are bounded by a timeout.
pub struct WatchdogDevice {
    commands: Sender<ReaderCommand>,
    frames: Receiver<Option<Frame>>,
    open: Arc<AtomicBool>,
    outstanding: bool,
    timed_out: bool,
    timeout: Duration,
    reader: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatchdogDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchdogDevice")
            .field("timeout", &self.timeout)
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

impl WatchdogDevice {
    /// Move `device` onto a reader thread.
    pub fn spawn(mut device: Box<dyn CaptureDevice>, timeout: Duration) -> Self {
        let (commands, command_rx) = mpsc::channel::<ReaderCommand>();
        let (frame_tx, frames) = mpsc::channel::<Option<Frame>>();
        let open = Arc::new(AtomicBool::new(device.is_open()));
        let reader_open = Arc::clone(&open);

        let reader = thread::spawn(move || {
            while let Ok(command) = command_rx.recv() {
                match command {
                    ReaderCommand::Read => {
                        let frame = device.read();
                        reader_open.store(device.is_open(), Ordering::SeqCst);
                        if frame_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    ReaderCommand::Release => {
                        device.release();
                        reader_open.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        Self {
            commands,
            frames,
            open,
            outstanding: false,
            timed_out: false,
            timeout,
            reader: Some(reader),
        }
    }
}

impl WatchdogDevice {
    /// Wait until `deadline` for the answer to the outstanding request.
    fn wait(&mut self, deadline: Instant) -> Answer {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.frames.recv_timeout(remaining) {
            Ok(frame) => {
                self.outstanding = false;
                Answer::Frame(frame)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Capture read exceeded {:?}, treating source as unavailable", self.timeout);
                self.timed_out = true;
                Answer::Late
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.outstanding = false;
                self.open.store(false, Ordering::SeqCst);
                Answer::Gone
            }
        }
    }
}

impl CaptureDevice for WatchdogDevice {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn read(&mut self) -> Option<Frame> {
        self.timed_out = false;
        let deadline = Instant::now() + self.timeout;

        if self.outstanding {
            match self.wait(deadline) {
                Answer::Frame(_) => log::debug!("Dropping stale capture frame"),
                Answer::Late | Answer::Gone => return None,
            }
        }

        if self.commands.send(ReaderCommand::Read).is_err() {
            self.open.store(false, Ordering::SeqCst);
            return None;
        }
        self.outstanding = true;

        match self.wait(deadline) {
            Answer::Frame(frame) => frame,
            Answer::Late | Answer::Gone => None,
        }
    }

    fn last_read_timed_out(&self) -> bool {
        self.timed_out
    }

    fn release(&mut self) {
        let _ = self.commands.send(ReaderCommand::Release);
        self.open.store(false, Ordering::SeqCst);
        // A reader stuck inside a device read cannot be joined without
        // blocking shutdown on the same stall; detach it instead.
        if !self.outstanding {
            if let Some(handle) = self.reader.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for WatchdogDevice {
    fn drop(&mut self) {
        if self.reader.is_some() {
            self.release();
        }
    }
}
