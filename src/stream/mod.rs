//! Stream loops and the hand-off to the UI thread.
//!
//! Two [`StreamLoop`]s (raw and processed) read from one shared
//! [`FrameSource`](crate::camera::FrameSource), each on its own thread with
//! its own [`CancellationToken`]. Results reach the UI thread only through
//! the [`DisplayHub`] channel. [`StreamController`] owns the lot.

mod activity;
mod cancel;
mod controller;
mod display;
mod stream_loop;

pub use activity::{format_line, ActivityLog};
pub use cancel::CancellationToken;
pub use controller::{ShutdownReport, StreamController};
pub use display::{DisplayHub, DisplaySink, NullSink, SnapshotSink, SurfaceId, UiHandle, UiMessage};
pub use stream_loop::{
    Backoff, LoopReport, LoopState, StreamKind, StreamLoop, STATUS_CAMERA_LOADED,
    STATUS_NO_CONNECTION, STATUS_OVERLAY_LOADED,
};
