//! Lane detection.
//!
//! The image stages run on OpenCV matrices: grayscale, blur and Canny
//! ([`EdgeExtractor`]), region masking ([`RegionMask`]), probabilistic Hough
//! ([`LineDetector`]) and overlay rendering ([`OverlayRenderer`]). Boundary
//! fitting ([`LineAggregator`]) works on the detected segments.
//! [`LanePipeline`] chains them on [`Frame`](crate::camera::Frame)s.

mod aggregate;
mod edges;
mod lines;
mod overlay;
mod pipeline;
mod region;
mod types;

pub use aggregate::{average, fit, LineAggregator, Side};
pub use edges::{to_gray, EdgeExtractor};
pub use lines::LineDetector;
pub use overlay::{color_scalar, draw_segment, OverlayRenderer};
pub use pipeline::{LanePipeline, StageImages};
pub use region::RegionMask;
pub use types::{BoundaryLine, LaneDetection, LaneLines, LineModel, Segment, SteeringHint};
