//! The raw and processed stream loops.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::activity::ActivityLog;
use super::cancel::CancellationToken;
use super::display::{SurfaceId, UiHandle};
use crate::camera::{normalize_for_display, Frame, FrameSource, ReadError, Resolution};
use crate::config::Config;
use crate::vision::LanePipeline;

pub const STATUS_CAMERA_LOADED: &str = "Current State: Camera loaded";
pub const STATUS_OVERLAY_LOADED: &str = "Current State: Overlay Loaded";
pub const STATUS_NO_CONNECTION: &str = "Current State: No Connection";

/// Which of the two loops this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Publishes frames as captured
    Raw,
    /// Publishes frames with the lane overlay composited on
    Processed,
}

impl StreamKind {
    pub fn surface(self) -> SurfaceId {
        match self {
            StreamKind::Raw => SurfaceId::Raw,
            StreamKind::Processed => SurfaceId::Processed,
        }
    }

    /// Status shown while the loop is delivering frames.
    pub fn loaded_status(self) -> &'static str {
        match self {
            StreamKind::Raw => STATUS_CAMERA_LOADED,
            StreamKind::Processed => STATUS_OVERLAY_LOADED,
        }
    }

    /// Activity log entry written when the loop starts.
    pub fn start_event(self, operator: &str) -> String {
        match self {
            StreamKind::Raw => format!("{} loaded the camera stream.", operator),
            StreamKind::Processed => format!("{} loaded the overlay stream.", operator),
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.surface().name())
    }
}

/// Loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// What a loop did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub kind: StreamKind,
    /// Images handed to the display
    pub published: u64,
    /// Reads that returned no frame
    pub misses: u64,
    /// Reads refused because the device was closed or timed out
    pub unavailable: u64,
}

impl LoopReport {
    fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            published: 0,
            misses: 0,
            unavailable: 0,
        }
    }
}

/// Exponential backoff between failed reads, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            current: None,
        }
    }

    /// Delay before the next attempt; doubles on every call.
    pub fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => self.initial,
            Some(previous) => (previous * 2).min(self.max),
        };
        self.current = Some(delay);
        delay
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// A cancellable read, process and publish loop over a shared [`FrameSource`].
pub struct StreamLoop {
    kind: StreamKind,
    source: Arc<FrameSource>,
    token: CancellationToken,
    ui: UiHandle,
    activity: Arc<ActivityLog>,
    operator: String,
    pipeline: Option<LanePipeline>,
    display_size: Resolution,
    backoff: Backoff,
    state: LoopState,
}

impl StreamLoop {
    /// Build a loop. It starts in [`LoopState::Running`] and stops for good
    /// once `token` is cancelled.
    pub fn new(
        kind: StreamKind,
        source: Arc<FrameSource>,
        token: CancellationToken,
        ui: UiHandle,
        activity: Arc<ActivityLog>,
        config: &Config,
    ) -> Self {
        let pipeline = match kind {
            StreamKind::Raw => None,
            StreamKind::Processed => Some(LanePipeline::new(config)),
        };
        Self {
            kind,
            source,
            token,
            ui,
            activity,
            operator: config.activity.operator.clone(),
            pipeline,
            display_size: config.stream.display_size(),
            backoff: Backoff::new(
                Duration::from_millis(config.stream.backoff_initial_ms),
                Duration::from_millis(config.stream.backoff_max_ms),
            ),
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the loop on a new named thread.
    pub fn spawn(self) -> io::Result<JoinHandle<LoopReport>> {
        thread::Builder::new()
            .name(format!("lanewatch-{}", self.kind))
            .spawn(move || {
                let mut stream = self;
                stream.run()
            })
    }

    /// Run on the current thread until the token is cancelled.
    pub fn run(&mut self) -> LoopReport {
        let mut report = LoopReport::new(self.kind);
        self.activity.record(&self.kind.start_event(&self.operator));
        log::info!("Starting {} stream", self.kind);
        self.ui.status(self.kind.loaded_status());
        let mut connected = true;

        while !self.token.is_cancelled() {
            match self.source.try_read() {
                Ok(frame) => {
                    self.backoff.reset();
                    if !connected {
                        connected = true;
                        log::info!("{} stream reconnected", self.kind);
                        self.ui.status(self.kind.loaded_status());
                    }
                    let image = normalize_for_display(&self.process(&frame), self.display_size);
                    if !self.ui.show(self.kind.surface(), image) {
                        log::info!("Display closed, stopping {} stream", self.kind);
                        self.token.cancel();
                        continue;
                    }
                    report.published += 1;
                }
                Err(err) => {
                    match err {
                        ReadError::Miss => report.misses += 1,
                        ReadError::Unavailable | ReadError::TimedOut => {
                            report.unavailable += 1;
                            if connected {
                                connected = false;
                                log::warn!("{} stream: {}", self.kind, err);
                                self.ui.status(STATUS_NO_CONNECTION);
                            }
                        }
                    }
                    let delay = self.backoff.next_delay();
                    if !delay.is_zero() {
                        self.token.sleep_unless_cancelled(delay);
                    }
                }
            }
        }

        self.state = LoopState::Stopped;
        log::info!(
            "Stopped {} stream ({} published, {} missed, {} unavailable)",
            self.kind,
            report.published,
            report.misses,
            report.unavailable
        );
        report
    }

    /// Frame to publish for one captured frame.
    fn process(&self, frame: &Frame) -> Frame {
        match &self.pipeline {
            Some(pipeline) => match pipeline.process(frame) {
                Ok((_, output)) => output,
                Err(e) => {
                    log::warn!("{} stream: lane detection failed: {}", self.kind, e);
                    frame.clone()
                }
            },
            None => frame.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CaptureDevice, Disconnected, PixelFormat, SyntheticRoad};
    use crate::stream::display::{DisplayHub, DisplaySink, UiMessage};

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.stream.backoff_initial_ms = 1;
        config.stream.backoff_max_ms = 4;
        config
    }

    /// Yields `frames` frames, then misses.
    struct Finite {
        frames: usize,
    }

    impl CaptureDevice for Finite {
        fn is_open(&self) -> bool {
            true
        }

        fn read(&mut self) -> Option<Frame> {
            if self.frames == 0 {
                return None;
            }
            self.frames -= 1;
            Some(Frame::zeros(32, 24, PixelFormat::Bgr))
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(5), Duration::from_millis(30));
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![5, 10, 20, 30, 30]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }

    /// Records everything the hub delivers.
    #[derive(Default)]
    struct Collect(Vec<UiMessage>);

    impl DisplaySink for Collect {
        fn show(&mut self, surface: SurfaceId, image: &image::RgbImage) {
            self.0.push(UiMessage::Image {
                surface,
                image: image.clone(),
            });
        }

        fn status(&mut self, text: &str) {
            self.0.push(UiMessage::Status(text.to_string()));
        }
    }

    impl Collect {
        fn images(&self) -> Vec<&image::RgbImage> {
            self.0
                .iter()
                .filter_map(|m| match m {
                    UiMessage::Image { image, .. } => Some(image),
                    UiMessage::Status(_) => None,
                })
                .collect()
        }

        fn statuses(&self) -> Vec<&str> {
            self.0
                .iter()
                .filter_map(|m| match m {
                    UiMessage::Status(s) => Some(s.as_str()),
                    UiMessage::Image { .. } => None,
                })
                .collect()
        }
    }

    #[test]
    fn test_cancelled_before_start_publishes_nothing() {
        let (ui, hub) = DisplayHub::channel();
        let token = CancellationToken::new();
        token.cancel();
        let source = Arc::new(FrameSource::new(Box::new(SyntheticRoad::new(
            Resolution::VGA,
            0,
        ))));
        let mut stream = StreamLoop::new(
            StreamKind::Raw,
            source,
            token,
            ui,
            Arc::new(ActivityLog::disabled()),
            &fast_config(),
        );
        assert_eq!(stream.state(), LoopState::Running);
        let report = stream.run();
        assert_eq!(stream.state(), LoopState::Stopped);
        assert_eq!(report.published, 0);
        drop(stream);

        // only the start status went out
        let mut sink = Collect::default();
        hub.run(&mut sink);
        assert_eq!(sink.statuses(), vec![STATUS_CAMERA_LOADED]);
        assert!(sink.images().is_empty());
    }

    #[test]
    fn test_raw_loop_publishes_display_sized_frames() {
        let (ui, hub) = DisplayHub::channel();
        let token = CancellationToken::new();
        let source = Arc::new(FrameSource::new(Box::new(Finite { frames: 3 })));
        let stream = StreamLoop::new(
            StreamKind::Raw,
            source,
            token.clone(),
            ui,
            Arc::new(ActivityLog::disabled()),
            &fast_config(),
        );
        let handle = stream.spawn().unwrap();

        let mut sink = Collect::default();
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while sink.images().len() < 3 && std::time::Instant::now() < deadline {
            hub.pump(&mut sink, Duration::from_millis(20));
        }
        token.cancel();
        let report = handle.join().unwrap();
        hub.run(&mut sink);

        assert_eq!(report.kind, StreamKind::Raw);
        assert_eq!(report.published, 3);
        let images = sink.images();
        assert_eq!(images.len(), 3);
        assert!(images.iter().all(|i| i.dimensions() == (256, 256)));
    }

    #[test]
    fn test_disconnected_source_reports_no_connection() {
        let (ui, hub) = DisplayHub::channel();
        let token = CancellationToken::new();
        let source = Arc::new(FrameSource::new(Box::new(Disconnected)));
        let stream = StreamLoop::new(
            StreamKind::Processed,
            source,
            token.clone(),
            ui,
            Arc::new(ActivityLog::disabled()),
            &fast_config(),
        );
        let handle = stream.spawn().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        let report = handle.join().unwrap();

        assert_eq!(report.published, 0);
        assert!(report.unavailable >= 1);
        let mut sink = Collect::default();
        hub.run(&mut sink);
        // the transition is reported once, not per failed read
        assert_eq!(
            sink.statuses(),
            vec![STATUS_OVERLAY_LOADED, STATUS_NO_CONNECTION]
        );
    }

    #[test]
    fn test_loop_stops_when_display_goes_away() {
        let (ui, hub) = DisplayHub::channel();
        drop(hub);
        let token = CancellationToken::new();
        let source = Arc::new(FrameSource::new(Box::new(Finite { frames: 100 })));
        let mut stream = StreamLoop::new(
            StreamKind::Raw,
            source,
            token.clone(),
            ui,
            Arc::new(ActivityLog::disabled()),
            &fast_config(),
        );
        let report = stream.run();
        assert_eq!(report.published, 0);
        assert!(token.is_cancelled());
        assert_eq!(stream.state(), LoopState::Stopped);
    }

    #[test]
    fn test_start_event_text() {
        assert_eq!(
            StreamKind::Raw.start_event("ana"),
            "ana loaded the camera stream."
        );
        assert_eq!(StreamKind::Processed.to_string(), "processed");
    }
}
