//! Line-segment detection on masked edge maps.

use opencv::core::{Mat, Vec4i, Vector};
use opencv::imgproc;
use opencv::Result;

use super::types::Segment;
use crate::config::HoughConfig;

/// Runs the probabilistic Hough transform over a masked edge map.
#[derive(Debug, Clone, Copy)]
pub struct LineDetector {
    config: HoughConfig,
}

impl LineDetector {
    pub fn new(config: HoughConfig) -> Self {
        Self { config }
    }

    /// Find line segments in a single-channel 8-bit edge map (non-zero = edge).
    ///
    /// An empty list is a normal result. Any other input type is an error.
    pub fn detect(&self, edges: &Mat) -> Result<Vec<Segment>> {
        let mut lines = Vector::<Vec4i>::new();
        imgproc::hough_lines_p(
            edges,
            &mut lines,
            self.config.rho,
            self.config.theta,
            i32::try_from(self.config.threshold).unwrap_or(i32::MAX),
            self.config.min_line_length as f64,
            self.config.max_line_gap as f64,
        )?;
        Ok(lines
            .iter()
            .map(|l| Segment::new(l[0], l[1], l[2], l[3]))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Point, Scalar, CV_8UC1, CV_8UC3};
    use opencv::prelude::*;

    fn detector() -> LineDetector {
        LineDetector::new(HoughConfig::default())
    }

    fn blank(width: i32, height: i32) -> Mat {
        Mat::zeros(height, width, CV_8UC1).unwrap().to_mat().unwrap()
    }

    fn draw(edges: &mut Mat, from: (i32, i32), to: (i32, i32)) {
        imgproc::line(
            edges,
            Point::new(from.0, from.1),
            Point::new(to.0, to.1),
            Scalar::all(255.0),
            1,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
    }

    #[test]
    fn test_empty_map_gives_no_segments() {
        assert!(detector().detect(&blank(320, 240)).unwrap().is_empty());
    }

    #[test]
    fn test_vertical_line_is_found() {
        let mut edges = blank(320, 240);
        draw(&mut edges, (100, 20), (100, 219));
        let segments = detector().detect(&edges).unwrap();
        assert!(!segments.is_empty());
        for s in &segments {
            assert_eq!((s.x1, s.x2), (100, 100), "{:?}", s);
        }
        let longest = segments.iter().map(|s| s.extent().1).max().unwrap_or(0);
        assert!(longest >= 150, "{:?}", segments);
    }

    #[test]
    fn test_diagonal_line_is_found() {
        let mut edges = blank(400, 400);
        draw(&mut edges, (50, 350), (300, 100));
        let segments = detector().detect(&edges).unwrap();
        assert!(!segments.is_empty());
        let s = segments[0];
        let (ex, ey) = s.extent();
        assert!(ex >= 100 || ey >= 100, "{:?}", s);
        // y falls as x grows: negative slope in image coordinates
        let slope = (s.y2 - s.y1) as f64 / (s.x2 - s.x1) as f64;
        assert!(slope < 0.0, "{:?}", s);
    }

    #[test]
    fn test_short_lines_are_rejected() {
        let mut edges = blank(320, 240);
        draw(&mut edges, (10, 10), (10, 60));
        assert!(detector().detect(&edges).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_runs_agree() {
        let mut edges = blank(400, 300);
        draw(&mut edges, (20, 280), (180, 120));
        draw(&mut edges, (380, 280), (220, 120));
        let a = detector().detect(&edges).unwrap();
        let b = detector().detect(&edges).unwrap();
        assert_eq!(a, b);
        assert!(a.len() >= 2);
    }

    #[test]
    fn test_color_input_is_an_error() {
        let image = Mat::zeros(10, 10, CV_8UC3).unwrap().to_mat().unwrap();
        assert!(detector().detect(&image).is_err());
    }
}
