//! End-to-end tests for the detection chain.
//!
//! These run whole frames through edge extraction, masking, line detection,
//! aggregation and rendering, and check the properties the stream loops rely
//! on.

use lanewatch::camera::{CaptureDevice, Frame, PixelFormat, Resolution, SyntheticRoad};
use lanewatch::config::{Config, RegionConfig};
use lanewatch::vision::{EdgeExtractor, LanePipeline, RegionMask};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Signed distance from `(x, y)` to the boundary of a convex polygon,
/// positive outside and negative inside.
fn outside_by(x: f64, y: f64, polygon: &[(i32, i32)]) -> f64 {
    let n = polygon.len();
    let area2: f64 = (0..n)
        .map(|i| {
            let (ax, ay) = polygon[i];
            let (bx, by) = polygon[(i + 1) % n];
            ax as f64 * by as f64 - bx as f64 * ay as f64
        })
        .sum();
    let orientation = area2.signum();
    (0..n)
        .map(|i| {
            let (ax, ay) = polygon[i];
            let (bx, by) = polygon[(i + 1) % n];
            let (ex, ey) = ((bx - ax) as f64, (by - ay) as f64);
            let cross = ex * (y - ay as f64) - ey * (x - ax as f64);
            -orientation * cross / ex.hypot(ey)
        })
        .fold(f64::MIN, f64::max)
}

#[test]
fn test_synthetic_road_lane_is_found() {
    let pipeline = LanePipeline::new(&Config::default());
    let road = SyntheticRoad::new(Resolution::VGA, 0);

    // straight ahead and both sway extremes
    for index in [0u64, 60, 180] {
        let frame = road.render(index).unwrap();
        let detection = pipeline.detect(&frame).unwrap();
        assert!(detection.has_lane(), "frame {}: {:?}", index, detection);

        let left = detection.lanes.left.unwrap();
        let right = detection.lanes.right.unwrap();
        let center = detection.center.unwrap();

        for line in [left, right, center] {
            assert_eq!(line.y1, 480);
            assert_eq!(line.y2, 330);
        }
        assert!((60..=180).contains(&left.x1), "frame {}: left {:?}", index, left);
        assert!((540..=660).contains(&right.x1), "frame {}: right {:?}", index, right);
        // lane narrows towards the horizon
        assert!(left.x2 > left.x1);
        assert!(right.x2 < right.x1);
        assert_eq!(center, left.midpoint(&right));

        let steering = detection.steering.unwrap();
        assert!(steering.offset_px.abs() < 100.0, "{:?}", steering);
    }
}

#[test]
fn test_overlay_is_composited_only_with_a_lane() {
    let pipeline = LanePipeline::new(&Config::default());

    let road = SyntheticRoad::new(Resolution::VGA, 0).render(0).unwrap();
    let (detection, output) = pipeline.process(&road).unwrap();
    assert!(detection.has_lane());
    assert_eq!((output.width, output.height, output.format), (640, 480, PixelFormat::Bgr));
    assert_ne!(output.data, road.data);
    // centerline drawn in red (BGR order), blended over the asphalt
    let center = detection.center.unwrap();
    let y = 400u32;
    let t = (center.y1 - y as i32) as f64 / (center.y1 - center.y2) as f64;
    let x = (center.x1 as f64 + t * (center.x2 - center.x1) as f64).round() as u32;
    let pixel = output.pixel(x, y);
    assert!(pixel[2] > 200 && pixel[1] < 100, "pixel at ({}, {}) = {:?}", x, y, pixel);

    let blank = Frame::filled(640, 480, PixelFormat::Bgr, &[70, 70, 70]);
    let (detection, output) = pipeline.process(&blank).unwrap();
    assert!(!detection.has_lane());
    assert_eq!(output.data, blank.data);
}

#[test]
fn test_uniform_frames_have_no_edges() {
    let extractor = EdgeExtractor::new(Config::default().edges);
    for value in [0u8, 1, 127, 254, 255] {
        for format in [PixelFormat::Rgb, PixelFormat::Bgr] {
            let frame = Frame::filled(160, 120, format, &[value, value / 2, 255 - value]);
            let edges = extractor.extract_frame(&frame).unwrap();
            assert_eq!(edges.format, PixelFormat::Gray);
            assert!(edges.data.iter().all(|&v| v == 0), "value {} {:?}", value, format);
        }
    }
}

#[test]
fn test_region_mask_zeroes_outside_for_random_content() {
    let mask = RegionMask::new(RegionConfig::default());
    let mut rng = StdRng::seed_from_u64(7);

    for (width, height) in [(640u32, 480u32), (320, 400), (1280, 720)] {
        let mut frame = Frame::zeros(width, height, PixelFormat::Gray);
        rng.fill(frame.data.as_mut_slice());
        let masked = mask.apply_frame(&frame).unwrap();
        let polygon = mask.polygon(width, height);

        // pixels on the boundary follow the rasterizer
        for y in 0..height {
            for x in 0..width {
                let idx = masked.offset(x, y);
                let d = outside_by(x as f64, y as f64, &polygon);
                if d > 1.0 {
                    assert_eq!(masked.data[idx], 0, "({}, {}) in {}x{}", x, y, width, height);
                } else if d < -1.0 {
                    assert_eq!(masked.data[idx], frame.data[idx]);
                }
            }
        }
    }
}

#[test]
fn test_synthetic_road_reads_advance() {
    let mut road = SyntheticRoad::new(Resolution::VGA, 0);
    let first = road.read().unwrap();
    let second = road.read().unwrap();
    assert_eq!((first.width, first.height), (640, 480));
    // the stripes sway between frames
    assert_ne!(first.data, second.data);
    road.release();
    assert!(!road.is_open());
    assert!(road.read().is_none());
}
