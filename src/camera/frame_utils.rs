//! Frame conversion utilities.

use image::imageops::{self, FilterType};
use image::RgbImage;
use opencv::core::{self, Mat};
use opencv::prelude::*;
use std::time::Instant;

use super::types::{Frame, PixelFormat, Resolution};

/// Convert a frame to RGB byte order.
///
/// BGR frames get their outer channels swapped, grayscale frames are
/// replicated into all three channels, RGB frames are copied as-is.
pub fn convert_to_rgb(frame: &Frame) -> Frame {
    let data = match frame.format {
        PixelFormat::Rgb => frame.data.clone(),
        PixelFormat::Bgr => {
            let mut data = Vec::with_capacity(frame.data.len());
            for bgr in frame.data.chunks_exact(3) {
                data.extend_from_slice(&[bgr[2], bgr[1], bgr[0]]);
            }
            data
        }
        PixelFormat::Gray => {
            let mut data = Vec::with_capacity(frame.data.len() * 3);
            for &v in &frame.data {
                data.extend_from_slice(&[v, v, v]);
            }
            data
        }
    };

    Frame {
        data,
        width: frame.width,
        height: frame.height,
        format: PixelFormat::Rgb,
        timestamp: frame.timestamp,
    }
}

/// Wrap a decoded RGB image as a frame.
pub fn frame_from_rgb_image(image: RgbImage) -> Frame {
    let (width, height) = image.dimensions();
    Frame {
        data: image.into_raw(),
        width,
        height,
        format: PixelFormat::Rgb,
        timestamp: Instant::now(),
    }
}

/// Convert a frame into an `image` RGB buffer.
pub fn to_rgb_image(frame: &Frame) -> RgbImage {
    let rgb = convert_to_rgb(frame);
    // Dimensions and buffer length always agree for well-formed frames.
    RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
        .unwrap_or_else(|| RgbImage::new(frame.width, frame.height))
}

/// Copy a frame into an OpenCV matrix, one channel per byte of a pixel.
///
/// Channel order is kept as-is; the caller tracks it through `frame.format`.
pub fn to_mat(frame: &Frame) -> opencv::Result<Mat> {
    if frame.is_malformed() {
        return Err(opencv::Error::new(
            core::StsBadSize,
            format!(
                "{}x{} {:?} frame holds {} bytes",
                frame.width,
                frame.height,
                frame.format,
                frame.data.len()
            ),
        ));
    }
    let flat = Mat::from_slice(&frame.data)?;
    let shaped = flat.reshape(frame.bytes_per_pixel() as i32, frame.height as i32)?;
    shaped.try_clone()
}

/// Copy an 8-bit OpenCV matrix out as a frame of the given format.
pub fn frame_from_mat(mat: &Mat, format: PixelFormat) -> opencv::Result<Frame> {
    if mat.depth() != core::CV_8U || mat.channels() as usize != format.channels() {
        return Err(opencv::Error::new(
            core::StsUnmatchedFormats,
            format!(
                "cannot read a {}-channel matrix of depth {} as {:?}",
                mat.channels(),
                mat.depth(),
                format
            ),
        ));
    }
    let data = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };
    Ok(Frame {
        data,
        width: mat.cols() as u32,
        height: mat.rows() as u32,
        format,
        timestamp: Instant::now(),
    })
}

/// Normalize a frame for display: RGB byte order, resized to `size`.
///
/// Uses bilinear filtering, matching the default interpolation of common
/// capture toolkits.
pub fn normalize_for_display(frame: &Frame, size: Resolution) -> RgbImage {
    let image = to_rgb_image(frame);
    if image.dimensions() == (size.width, size.height) {
        return image;
    }
    imageops::resize(&image, size.width, size.height, FilterType::Triangle)
}
