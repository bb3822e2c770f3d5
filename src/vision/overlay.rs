//! Drawing lane lines and blending them onto frames.

use opencv::core::{self, Mat, Point, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::Result;

use super::types::LaneLines;
use crate::camera::PixelFormat;
use crate::config::OverlayConfig;

/// OpenCV line thickness limit
const MAX_THICKNESS: u32 = 32767;

/// An RGB colour as a scalar in `format`'s channel order.
///
/// Gray images get the BT.601 luminance of the colour.
pub fn color_scalar(color: [u8; 3], format: PixelFormat) -> Scalar {
    let [r, g, b] = color.map(f64::from);
    match format {
        PixelFormat::Rgb => Scalar::new(r, g, b, 0.0),
        PixelFormat::Bgr => Scalar::new(b, g, r, 0.0),
        PixelFormat::Gray => Scalar::all((0.299 * r + 0.587 * g + 0.114 * b).round()),
    }
}

/// Draw a straight stroke of `thickness` pixels from `from` to `to`.
///
/// `color` is RGB and is written in `format`'s channel order. The line is
/// clipped to the image before it is rasterized, so endpoints far outside
/// the frame cost nothing extra. A zero thickness draws nothing.
pub fn draw_segment(
    image: &mut Mat,
    format: PixelFormat,
    from: (i32, i32),
    to: (i32, i32),
    color: [u8; 3],
    thickness: u32,
) -> Result<()> {
    if thickness == 0 {
        return Ok(());
    }
    imgproc::line(
        image,
        Point::new(from.0, from.1),
        Point::new(to.0, to.1),
        color_scalar(color, format),
        thickness.min(MAX_THICKNESS) as i32,
        imgproc::LINE_8,
        0,
    )
}

/// Renders lane lines onto a blank canvas.
#[derive(Debug, Clone, Copy)]
pub struct OverlayRenderer {
    config: OverlayConfig,
}

impl OverlayRenderer {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    /// A zeroed canvas shaped like `frame` with both boundaries and the
    /// centerline drawn on it.
    ///
    /// Nothing is drawn unless both boundaries are present.
    pub fn render(&self, frame: &Mat, format: PixelFormat, lanes: &LaneLines) -> Result<Mat> {
        let mut canvas = Mat::zeros(frame.rows(), frame.cols(), frame.typ())?.to_mat()?;
        let Some((left, right)) = lanes.pair() else {
            return Ok(canvas);
        };
        let thickness = self.config.thickness;
        for line in [left, right] {
            let (from, to) = line.endpoints();
            draw_segment(&mut canvas, format, from, to, self.config.boundary_color, thickness)?;
        }
        let (from, to) = left.midpoint(&right).endpoints();
        draw_segment(&mut canvas, format, from, to, self.config.center_color, thickness)?;
        Ok(canvas)
    }

    /// Saturating `frame * frame_weight + overlay * overlay_weight + gamma`.
    ///
    /// Images of different size or type are an error.
    pub fn composite(&self, frame: &Mat, overlay: &Mat) -> Result<Mat> {
        let mut blended = Mat::default();
        core::add_weighted(
            frame,
            self.config.frame_weight as f64,
            overlay,
            self.config.overlay_weight as f64,
            self.config.gamma as f64,
            &mut blended,
            -1,
        )?;
        Ok(blended)
    }
}
