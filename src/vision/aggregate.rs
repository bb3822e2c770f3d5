//! Turning raw segments into lane boundaries.

use super::types::{BoundaryLine, LaneLines, LineModel, Segment};
use crate::config::{HorizontalPolicy, LaneConfig};

/// Which boundary a segment supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Fit a line through a segment's two endpoints.
///
/// Vertical segments have no finite slope and yield `None`.
pub fn fit(segment: &Segment) -> Option<LineModel> {
    let dx = (segment.x2 - segment.x1) as f64;
    if dx == 0.0 {
        return None;
    }
    let slope = (segment.y2 - segment.y1) as f64 / dx;
    let intercept = segment.y1 as f64 - slope * segment.x1 as f64;
    Some(LineModel { slope, intercept })
}

/// Component-wise mean of the fitted lines, or `None` for an empty list.
pub fn average(models: &[LineModel]) -> Option<LineModel> {
    if models.is_empty() {
        return None;
    }
    let n = models.len() as f64;
    let (slope, intercept) = models
        .iter()
        .fold((0.0, 0.0), |(s, i), m| (s + m.slope, i + m.intercept));
    Some(LineModel {
        slope: slope / n,
        intercept: intercept / n,
    })
}

/// Groups segments by side, averages each side and extrapolates the result.
#[derive(Debug, Clone, Copy)]
pub struct LineAggregator {
    config: LaneConfig,
}

impl LineAggregator {
    pub fn new(config: LaneConfig) -> Self {
        Self { config }
    }

    /// Side for a fitted line. Negative slopes lean left in image space.
    pub fn classify(&self, model: &LineModel) -> Option<Side> {
        if model.slope < 0.0 {
            Some(Side::Left)
        } else if model.slope > 0.0 {
            Some(Side::Right)
        } else {
            match self.config.horizontal_segments {
                HorizontalPolicy::Right => Some(Side::Right),
                HorizontalPolicy::Ignore => None,
            }
        }
    }

    /// Solve the model for the bottom row and the row `extrapolation_height`
    /// above it.
    ///
    /// Returns `None` when the line is too flat to cross those rows at a
    /// representable column.
    pub fn extrapolate(&self, model: &LineModel, height: u32) -> Option<BoundaryLine> {
        if !model.slope.is_finite()
            || !model.intercept.is_finite()
            || model.slope.abs() < self.config.min_abs_slope
        {
            return None;
        }
        let y1 = height as i32;
        let y2 = y1 - self.config.extrapolation_height;
        let column = |y: i32| -> Option<i32> {
            let x = (y as f64 - model.intercept) / model.slope;
            if x.is_finite() && x >= i32::MIN as f64 && x <= i32::MAX as f64 {
                // truncate toward zero
                Some(x as i32)
            } else {
                None
            }
        };
        Some(BoundaryLine::new(column(y1)?, y1, column(y2)?, y2))
    }

    /// Fit left and right boundaries for a frame `height` rows tall.
    ///
    /// An empty list (nothing detected) produces no boundaries.
    pub fn aggregate(&self, segments: &[Segment], height: u32) -> LaneLines {
        let mut left = Vec::new();
        let mut right = Vec::new();
        for model in segments.iter().filter_map(fit) {
            match self.classify(&model) {
                Some(Side::Left) => left.push(model),
                Some(Side::Right) => right.push(model),
                None => {}
            }
        }

        LaneLines {
            left: average(&left).and_then(|m| self.extrapolate(&m, height)),
            right: average(&right).and_then(|m| self.extrapolate(&m, height)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> LineAggregator {
        LineAggregator::new(LaneConfig::default())
    }

    #[test]
    fn test_fit_through_endpoints() {
        let model = fit(&Segment::new(0, 10, 10, 30)).unwrap();
        assert_eq!(model.slope, 2.0);
        assert_eq!(model.intercept, 10.0);
        assert!(fit(&Segment::new(5, 0, 5, 100)).is_none());
    }

    #[test]
    fn test_positive_slopes_only_give_right_boundary() {
        let segments = [
            Segment::new(400, 300, 600, 470),
            Segment::new(420, 310, 580, 450),
        ];
        let lanes = aggregator().aggregate(&segments, 480);
        assert!(lanes.right.is_some());
        assert!(lanes.left.is_none());
        assert!(lanes.center().is_none());
        assert!(lanes.pair().is_none());
    }

    #[test]
    fn test_average_of_one_is_unchanged() {
        let model = LineModel {
            slope: -0.731,
            intercept: 612.25,
        };
        assert_eq!(average(&[model]), Some(model));
        assert_eq!(average(&[]), None);
    }

    #[test]
    fn test_average_is_component_wise() {
        let a = LineModel {
            slope: 1.0,
            intercept: 10.0,
        };
        let b = LineModel {
            slope: 3.0,
            intercept: 30.0,
        };
        assert_eq!(
            average(&[a, b]),
            Some(LineModel {
                slope: 2.0,
                intercept: 20.0
            })
        );
    }

    #[test]
    fn test_extrapolation_rows_follow_frame_height() {
        let model = LineModel {
            slope: -1.5,
            intercept: 900.0,
        };
        for height in [150u32, 240, 480, 720, 1080] {
            let line = aggregator().extrapolate(&model, height).unwrap();
            assert_eq!(line.y1, height as i32);
            assert_eq!(line.y2, line.y1 - 150);
            assert!(line.y1 > line.y2);
        }
    }

    #[test]
    fn test_extrapolation_truncates_toward_zero() {
        // x = (480 - 0) / 0.7 = 685.71 -> 685; x = 330 / 0.7 = 471.43 -> 471
        let model = LineModel {
            slope: 0.7,
            intercept: 0.0,
        };
        let line = aggregator().extrapolate(&model, 480).unwrap();
        assert_eq!(line, BoundaryLine::new(685, 480, 471, 330));

        // x = (480 - 500) / 3 = -6.67 -> -6
        let model = LineModel {
            slope: 3.0,
            intercept: 500.0,
        };
        assert_eq!(aggregator().extrapolate(&model, 480).unwrap().x1, -6);
    }

    #[test]
    fn test_flat_lines_give_no_boundary() {
        let flat = LineModel {
            slope: 0.0,
            intercept: 200.0,
        };
        assert!(aggregator().extrapolate(&flat, 480).is_none());

        let tiny = LineModel {
            slope: 1e-300,
            intercept: 0.0,
        };
        assert!(aggregator().extrapolate(&tiny, 480).is_none());

        let nan = LineModel {
            slope: f64::NAN,
            intercept: 0.0,
        };
        assert!(aggregator().extrapolate(&nan, 480).is_none());
    }

    #[test]
    fn test_horizontal_segment_policy() {
        let horizontal = Segment::new(100, 400, 300, 400);

        let default = aggregator();
        let model = fit(&horizontal).unwrap();
        assert_eq!(default.classify(&model), Some(Side::Right));
        // counted on the right but too flat to extrapolate
        assert!(default.aggregate(&[horizontal], 480).right.is_none());

        let ignoring = LineAggregator::new(LaneConfig {
            horizontal_segments: HorizontalPolicy::Ignore,
            ..LaneConfig::default()
        });
        assert_eq!(ignoring.classify(&model), None);

        // ignored segments no longer drag the right-side average flat
        let steep = Segment::new(400, 300, 600, 470);
        let with_default = default.aggregate(&[horizontal, steep], 480).right;
        let with_ignore = ignoring.aggregate(&[horizontal, steep], 480).right;
        assert_ne!(with_default, with_ignore);
        assert_eq!(with_ignore, default.aggregate(&[steep], 480).right);
    }

    #[test]
    fn test_both_sides_give_center() {
        // left: y = -1.5x + 480 (through (0,480) and (100,330))
        // right: y = 1.5x - 120 (through (400,480) and (300,330))
        let segments = [
            Segment::new(0, 480, 100, 330),
            Segment::new(300, 330, 400, 480),
        ];
        let lanes = aggregator().aggregate(&segments, 480);
        assert_eq!(lanes.left, Some(BoundaryLine::new(0, 480, 100, 330)));
        assert_eq!(lanes.right, Some(BoundaryLine::new(400, 480, 300, 330)));
        assert_eq!(lanes.center(), Some(BoundaryLine::new(200, 480, 200, 330)));
    }

    #[test]
    fn test_no_segments_no_boundaries() {
        assert!(aggregator().aggregate(&[], 480).is_empty());
        // vertical segments alone cannot be fitted
        assert!(aggregator()
            .aggregate(&[Segment::new(10, 0, 10, 300)], 480)
            .is_empty());
    }
}
