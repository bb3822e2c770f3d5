//! Owner of the shared capture source and both stream loops.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use super::activity::ActivityLog;
use super::cancel::CancellationToken;
use super::display::UiHandle;
use super::stream_loop::{LoopReport, StreamKind, StreamLoop};
use crate::camera::FrameSource;
use crate::config::Config;

struct Running {
    token: CancellationToken,
    handle: JoinHandle<LoopReport>,
}

/// Reports of the loops that were running at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub raw: Option<LoopReport>,
    pub processed: Option<LoopReport>,
}

/// Starts and stops the raw and processed loops over one [`FrameSource`].
///
/// Each loop gets its own [`CancellationToken`], so stopping one never
/// affects the other. The source is released once, on shutdown, after both
/// loops have stopped.
pub struct StreamController {
    source: Arc<FrameSource>,
    ui: UiHandle,
    activity: Arc<ActivityLog>,
    config: Config,
    loops: HashMap<StreamKind, Running>,
    released: bool,
}

impl StreamController {
    pub fn new(source: FrameSource, ui: UiHandle, activity: Arc<ActivityLog>, config: Config) -> Self {
        Self {
            source: Arc::new(source),
            ui,
            activity,
            config,
            loops: HashMap::new(),
            released: false,
        }
    }

    pub fn source(&self) -> &Arc<FrameSource> {
        &self.source
    }

    /// Start a loop with a fresh token. Does nothing if it is already running.
    pub fn start(&mut self, kind: StreamKind) -> io::Result<()> {
        if let Some(running) = self.loops.get(&kind) {
            if !running.handle.is_finished() {
                return Ok(());
            }
        }
        // reap a loop that stopped on its own
        if let Some(report) = self.stop(kind) {
            log::debug!("Reaped finished {} stream: {:?}", kind, report);
        }

        let token = CancellationToken::new();
        let stream = StreamLoop::new(
            kind,
            Arc::clone(&self.source),
            token.clone(),
            self.ui.clone(),
            Arc::clone(&self.activity),
            &self.config,
        );
        let handle = stream.spawn()?;
        self.loops.insert(kind, Running { token, handle });
        Ok(())
    }

    pub fn is_running(&self, kind: StreamKind) -> bool {
        self.loops
            .get(&kind)
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Token of a running loop, for cancelling it from elsewhere.
    pub fn token(&self, kind: StreamKind) -> Option<CancellationToken> {
        self.loops.get(&kind).map(|running| running.token.clone())
    }

    /// Cancel one loop and wait for it to finish its current iteration.
    pub fn stop(&mut self, kind: StreamKind) -> Option<LoopReport> {
        let running = self.loops.remove(&kind)?;
        running.token.cancel();
        match running.handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                log::error!("{} stream thread panicked", kind);
                None
            }
        }
    }

    pub fn stop_raw(&mut self) -> Option<LoopReport> {
        self.stop(StreamKind::Raw)
    }

    pub fn stop_processed(&mut self) -> Option<LoopReport> {
        self.stop(StreamKind::Processed)
    }

    /// Cancel both loops, join them, then release the capture source.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> ShutdownReport {
        // signal both before joining either
        for running in self.loops.values() {
            running.token.cancel();
        }
        let report = ShutdownReport {
            raw: self.stop(StreamKind::Raw),
            processed: self.stop(StreamKind::Processed),
        };
        if !self.released {
            self.source.release();
            self.released = true;
        }
        report
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if !self.released {
            self.shutdown_inner();
        }
    }
}
