//! Edge extraction: grayscale, Gaussian smoothing, then Canny.
//!
//! All three steps run through OpenCV. The output is a single-channel
//! binary map (0 or 255) the size of the input.

use opencv::core::{self, AlgorithmHint, Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::Result;

use crate::camera::{frame_from_mat, to_mat, Frame, PixelFormat};
use crate::config::EdgeConfig;

/// Single-channel intensity image of `image`, honouring its channel order.
pub fn to_gray(image: &Mat, format: PixelFormat) -> Result<Mat> {
    let code = match format {
        PixelFormat::Gray => return image.try_clone(),
        PixelFormat::Rgb => imgproc::COLOR_RGB2GRAY,
        PixelFormat::Bgr => imgproc::COLOR_BGR2GRAY,
    };
    let mut gray = Mat::default();
    imgproc::cvt_color(image, &mut gray, code, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;
    Ok(gray)
}

/// Converts a color frame into a binary edge map.
#[derive(Debug, Clone, Copy)]
pub struct EdgeExtractor {
    config: EdgeConfig,
}

impl EdgeExtractor {
    pub fn new(config: EdgeConfig) -> Self {
        Self { config }
    }

    /// Grayscale, blur and Canny in one go.
    pub fn extract(&self, image: &Mat, format: PixelFormat) -> Result<Mat> {
        let gray = to_gray(image, format)?;
        let blurred = self.blur(&gray)?;
        self.detect(&blurred)
    }

    /// [`extract`](Self::extract) on a frame, returning a gray frame.
    pub fn extract_frame(&self, frame: &Frame) -> Result<Frame> {
        let edges = self.extract(&to_mat(frame)?, frame.format)?;
        let mut out = frame_from_mat(&edges, PixelFormat::Gray)?;
        out.timestamp = frame.timestamp;
        Ok(out)
    }

    /// Square Gaussian blur; sigma follows from the kernel size.
    pub fn blur(&self, gray: &Mat) -> Result<Mat> {
        let k = self.config.blur_kernel as i32;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            gray,
            &mut blurred,
            Size::new(k, k),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(blurred)
    }

    /// Canny with the configured hysteresis thresholds and a 3x3 aperture.
    pub fn detect(&self, blurred: &Mat) -> Result<Mat> {
        let mut edges = Mat::default();
        imgproc::canny(
            blurred,
            &mut edges,
            self.config.low_threshold as f64,
            self.config.high_threshold as f64,
            3,
            false,
        )?;
        Ok(edges)
    }
}
