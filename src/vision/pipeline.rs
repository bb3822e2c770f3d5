//! The full detection chain from a captured frame to a composited overlay.

use opencv::core::Mat;
use opencv::Result;

use super::aggregate::LineAggregator;
use super::edges::{to_gray, EdgeExtractor};
use super::lines::LineDetector;
use super::overlay::OverlayRenderer;
use super::region::RegionMask;
use super::types::{LaneDetection, SteeringHint};
use crate::camera::{frame_from_mat, to_mat, Frame, PixelFormat};
use crate::config::Config;

/// Intermediate images of one pass, for inspection.
#[derive(Debug, Clone)]
pub struct StageImages {
    pub gray: Frame,
    pub blurred: Frame,
    pub edges: Frame,
    pub masked: Frame,
    pub overlay: Frame,
    pub composite: Frame,
}

impl StageImages {
    /// Stage names paired with their images, in pipeline order.
    pub fn named(&self) -> [(&'static str, &Frame); 6] {
        [
            ("gray", &self.gray),
            ("blurred", &self.blurred),
            ("edges", &self.edges),
            ("masked", &self.masked),
            ("overlay", &self.overlay),
            ("composite", &self.composite),
        ]
    }
}

/// Edge extraction, masking, line detection, aggregation and rendering.
///
/// Stateless between frames, so one pipeline can serve any number of frames
/// and each stream loop owns its own.
#[derive(Debug, Clone)]
pub struct LanePipeline {
    extractor: EdgeExtractor,
    mask: RegionMask,
    detector: LineDetector,
    aggregator: LineAggregator,
    renderer: OverlayRenderer,
}

impl LanePipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            extractor: EdgeExtractor::new(config.edges),
            mask: RegionMask::new(config.region.clone()),
            detector: LineDetector::new(config.hough),
            aggregator: LineAggregator::new(config.lanes),
            renderer: OverlayRenderer::new(config.overlay),
        }
    }

    /// Find the lane in `frame`.
    pub fn detect(&self, frame: &Frame) -> Result<LaneDetection> {
        let image = to_mat(frame)?;
        let edges = self.extractor.extract(&image, frame.format)?;
        let masked = self.mask.apply(&edges)?;
        self.detect_masked(&masked, frame)
    }

    fn detect_masked(&self, masked: &Mat, frame: &Frame) -> Result<LaneDetection> {
        let segments = self.detector.detect(masked)?;
        let lanes = self.aggregator.aggregate(&segments, frame.height);
        let center = lanes.center();
        let steering = center.map(|c| SteeringHint::from_center(&c, frame.width));

        log::debug!(
            "{} segments, left={:?} right={:?} center={:?}",
            segments.len(),
            lanes.left,
            lanes.right,
            center
        );

        Ok(LaneDetection {
            segment_count: segments.len(),
            lanes,
            center,
            steering,
        })
    }

    /// Composite the detection onto `frame`, or return it unmodified when no
    /// full lane was found.
    pub fn render(&self, frame: &Frame, detection: &LaneDetection) -> Result<Frame> {
        if !detection.has_lane() {
            return Ok(frame.clone());
        }
        let image = to_mat(frame)?;
        let overlay = self.renderer.render(&image, frame.format, &detection.lanes)?;
        self.blend(&image, &overlay, frame)
    }

    fn blend(&self, image: &Mat, overlay: &Mat, frame: &Frame) -> Result<Frame> {
        let composite = self.renderer.composite(image, overlay)?;
        let mut out = frame_from_mat(&composite, frame.format)?;
        out.timestamp = frame.timestamp;
        Ok(out)
    }

    /// Detect and render in one step.
    pub fn process(&self, frame: &Frame) -> Result<(LaneDetection, Frame)> {
        let detection = self.detect(frame)?;
        let output = self.render(frame, &detection)?;
        Ok((detection, output))
    }

    /// Run every stage and keep each intermediate image.
    pub fn stages(&self, frame: &Frame) -> Result<(LaneDetection, StageImages)> {
        let image = to_mat(frame)?;
        let gray = to_gray(&image, frame.format)?;
        let blurred = self.extractor.blur(&gray)?;
        let edges = self.extractor.detect(&blurred)?;
        let masked = self.mask.apply(&edges)?;
        let detection = self.detect_masked(&masked, frame)?;
        let overlay = self.renderer.render(&image, frame.format, &detection.lanes)?;
        let composite = if detection.has_lane() {
            self.blend(&image, &overlay, frame)?
        } else {
            frame.clone()
        };

        let as_gray = |mat: &Mat| frame_from_mat(mat, PixelFormat::Gray);
        Ok((
            detection,
            StageImages {
                gray: as_gray(&gray)?,
                blurred: as_gray(&blurred)?,
                edges: as_gray(&edges)?,
                masked: as_gray(&masked)?,
                overlay: frame_from_mat(&overlay, frame.format)?,
                composite,
            },
        ))
    }
}
