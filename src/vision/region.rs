//! Region-of-interest masking.

use opencv::core::{self, Mat, Point, Scalar, Vector};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::Result;

use crate::camera::{frame_from_mat, to_mat, Frame};
use crate::config::RegionConfig;

/// Zeroes everything outside a fixed polygon.
///
/// The polygon is not calibrated from the image: its vertices come from the
/// camera mount and are resolved against each frame's size (so a vertex
/// pinned to `bottom` follows the frame height).
#[derive(Debug, Clone)]
pub struct RegionMask {
    config: RegionConfig,
}

impl RegionMask {
    pub fn new(config: RegionConfig) -> Self {
        Self { config }
    }

    /// Polygon vertices for a frame of the given size.
    pub fn polygon(&self, width: u32, height: u32) -> Vec<(i32, i32)> {
        self.config
            .vertices
            .iter()
            .map(|v| v.resolve(width, height))
            .collect()
    }

    /// Copy of `image` with every pixel outside the polygon set to zero.
    ///
    /// Works on any channel count. Fewer than three vertices mask everything.
    pub fn apply(&self, image: &Mat) -> Result<Mat> {
        let polygon = self.polygon(image.cols() as u32, image.rows() as u32);
        let mut mask = Mat::zeros(image.rows(), image.cols(), image.typ())?.to_mat()?;
        if polygon.len() >= 3 {
            let mut contours = Vector::<Vector<Point>>::new();
            contours.push(polygon.iter().map(|&(x, y)| Point::new(x, y)).collect());
            imgproc::fill_poly(
                &mut mask,
                &contours,
                Scalar::all(255.0),
                imgproc::LINE_8,
                0,
                Point::new(0, 0),
            )?;
        }

        let mut masked = Mat::default();
        core::bitwise_and(image, &mask, &mut masked, &Mat::default())?;
        Ok(masked)
    }

    /// [`apply`](Self::apply) on a frame.
    pub fn apply_frame(&self, frame: &Frame) -> Result<Frame> {
        let masked = self.apply(&to_mat(frame)?)?;
        let mut out = frame_from_mat(&masked, frame.format)?;
        out.timestamp = frame.timestamp;
        Ok(out)
    }
}
