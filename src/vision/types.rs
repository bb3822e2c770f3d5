//! Lane geometry types.

use serde::Serialize;

/// A raw line segment from the line-segment transform, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Segment {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Horizontal and vertical extent.
    pub fn extent(&self) -> (i32, i32) {
        ((self.x2 - self.x1).abs(), (self.y2 - self.y1).abs())
    }
}

/// A fitted line `y = slope * x + intercept` in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineModel {
    pub slope: f64,
    pub intercept: f64,
}

/// A fitted line extrapolated between two fixed rows.
///
/// `(x1, y1)` is the near end at the bottom of the frame, `(x2, y2)` the far end
/// above it; `y1 > y2` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundaryLine {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundaryLine {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Coordinate-wise midpoint of two lines, rounding toward negative infinity.
    pub fn midpoint(&self, other: &BoundaryLine) -> BoundaryLine {
        let mid = |a: i32, b: i32| (a as i64 + b as i64).div_euclid(2) as i32;
        BoundaryLine {
            x1: mid(self.x1, other.x1),
            y1: mid(self.y1, other.y1),
            x2: mid(self.x2, other.x2),
            y2: mid(self.y2, other.y2),
        }
    }

    pub fn endpoints(&self) -> ((i32, i32), (i32, i32)) {
        ((self.x1, self.y1), (self.x2, self.y2))
    }
}

/// The boundary lines found in one frame.
///
/// Each side is fitted independently; a lane is only drawn, composited and
/// steered on when both sides are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LaneLines {
    pub left: Option<BoundaryLine>,
    pub right: Option<BoundaryLine>,
}

impl LaneLines {
    /// Both boundaries, when both were found.
    pub fn pair(&self) -> Option<(BoundaryLine, BoundaryLine)> {
        Some((self.left?, self.right?))
    }

    /// Midpoint line between the two boundaries; defined only when both exist.
    pub fn center(&self) -> Option<BoundaryLine> {
        self.pair().map(|(left, right)| left.midpoint(&right))
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Steering reference derived from the centerline.
///
/// Nothing acts on this yet; it is reported alongside the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteeringHint {
    /// Signed distance in pixels from the frame's horizontal centre to the
    /// centerline's near end; positive means the lane centre is to the right
    pub offset_px: f64,
    /// Angle of the centerline from vertical in degrees; positive leans right
    pub heading_deg: f64,
}

impl SteeringHint {
    pub fn from_center(center: &BoundaryLine, frame_width: u32) -> Self {
        let offset_px = center.x1 as f64 - frame_width as f64 / 2.0;
        let dx = (center.x2 - center.x1) as f64;
        let dy = (center.y1 - center.y2) as f64;
        Self {
            offset_px,
            heading_deg: dx.atan2(dy).to_degrees(),
        }
    }
}

/// Everything the detection chain learned about one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneDetection {
    /// Raw segments returned by the line-segment transform
    pub segment_count: usize,
    pub lanes: LaneLines,
    pub center: Option<BoundaryLine>,
    pub steering: Option<SteeringHint>,
}

impl LaneDetection {
    /// Whether a full lane (both boundaries) was found.
    pub fn has_lane(&self) -> bool {
        self.lanes.pair().is_some()
    }
}
