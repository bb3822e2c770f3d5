//! Configuration file handling for lanewatch.
//!
//! Loads configuration from `<config dir>/lanewatch/config.toml` or a custom path.
//! Every camera- or mount-specific constant of the detection chain lives here so
//! a new camera needs a config edit, not a code edit.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::camera::{CaptureSettings, Resolution};

/// Configuration file structure for lanewatch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub edges: EdgeConfig,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub hough: HoughConfig,
    #[serde(default)]
    pub lanes: LaneConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `synthetic`, `none`, a camera index, a stream URL, a video file or a
    /// directory of still images
    pub address: String,
    pub fps: u32,
    pub looping: bool,
    pub read_timeout_ms: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            address: "synthetic".to_string(),
            fps: 30,
            looping: true,
            read_timeout_ms: None,
        }
    }
}

impl SourceConfig {
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            address: self.address.clone(),
            fps: self.fps,
            looping: self.looping,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Grayscale, blur and edge-detector parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Gaussian kernel size (odd); sigma is derived from it
    pub blur_kernel: u32,
    /// Hysteresis low threshold
    pub low_threshold: f32,
    /// Hysteresis high threshold
    pub high_threshold: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            low_threshold: 50.0,
            high_threshold: 150.0,
        }
    }
}

/// Frame edge a region vertex can be pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEdge {
    /// Frame height (y) or frame width (x)
    Bottom,
    Right,
}

/// One coordinate of a region vertex: a pixel value or a frame edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Coord {
    Px(i32),
    Edge(FrameEdge),
}

impl Coord {
    /// Resolve against a frame of the given size.
    pub fn resolve(self, width: u32, height: u32) -> i32 {
        match self {
            Coord::Px(v) => v,
            Coord::Edge(FrameEdge::Bottom) => height as i32,
            Coord::Edge(FrameEdge::Right) => width as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegionPoint {
    pub x: Coord,
    pub y: Coord,
}

impl RegionPoint {
    pub const fn px(x: i32, y: i32) -> Self {
        Self {
            x: Coord::Px(x),
            y: Coord::Px(y),
        }
    }

    pub fn resolve(self, width: u32, height: u32) -> (i32, i32) {
        (self.x.resolve(width, height), self.y.resolve(width, height))
    }
}

/// Region of interest polygon.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionConfig {
    pub vertices: Vec<RegionPoint>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        // Triangle over the road surface for the deployed camera mount.
        Self {
            vertices: vec![
                RegionPoint {
                    x: Coord::Px(0),
                    y: Coord::Edge(FrameEdge::Bottom),
                },
                RegionPoint {
                    x: Coord::Px(800),
                    y: Coord::Edge(FrameEdge::Bottom),
                },
                RegionPoint::px(380, 290),
            ],
        }
    }
}

/// Probabilistic line-segment transform parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Distance resolution in pixels
    pub rho: f64,
    /// Angle resolution in radians
    pub theta: f64,
    /// Accumulator votes needed before a line is traced
    pub threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            rho: 2.0,
            theta: PI / 180.0,
            threshold: 100,
            min_line_length: 100,
            max_line_gap: 50,
        }
    }
}

/// How a segment with a slope of exactly zero is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalPolicy {
    /// Counted as a right-boundary candidate
    #[default]
    Right,
    /// Dropped as undetermined
    Ignore,
}

/// Boundary fitting and extrapolation.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Vertical distance from the frame bottom to the far end of a boundary line
    pub extrapolation_height: i32,
    pub horizontal_segments: HorizontalPolicy,
    /// Fitted lines flatter than this produce no boundary
    pub min_abs_slope: f64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            extrapolation_height: 150,
            horizontal_segments: HorizontalPolicy::Right,
            min_abs_slope: 1e-6,
        }
    }
}

/// Overlay colours and blending.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Boundary line colour, RGB
    pub boundary_color: [u8; 3],
    /// Centerline colour, RGB
    pub center_color: [u8; 3],
    pub thickness: u32,
    pub frame_weight: f32,
    pub overlay_weight: f32,
    pub gamma: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            boundary_color: [0, 255, 0],
            center_color: [255, 0, 0],
            thickness: 5,
            frame_weight: 0.8,
            overlay_weight: 1.0,
            gamma: 0.0,
        }
    }
}

/// Stream loop behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    pub display_width: u32,
    pub display_height: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            display_width: 256,
            display_height: 256,
            backoff_initial_ms: 5,
            backoff_max_ms: 200,
        }
    }
}

impl StreamConfig {
    pub fn display_size(&self) -> Resolution {
        Resolution::new(self.display_width, self.display_height)
    }
}

/// Activity log sink.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Append-only log file; events only go to the logger when unset
    pub path: Option<PathBuf>,
    /// Fixed UTC offset for timestamps; system local time when unset
    pub utc_offset_minutes: Option<i32>,
    /// Name recorded as the actor of control events
    pub operator: String,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            path: None,
            utc_offset_minutes: None,
            operator: "operator".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            config.validate().map_err(|reason| ConfigError::Invalid {
                path: path.clone(),
                reason,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject values the detection chain cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.edges.blur_kernel == 0 || self.edges.blur_kernel % 2 == 0 {
            return Err(format!(
                "edges.blur_kernel must be odd, got {}",
                self.edges.blur_kernel
            ));
        }
        if self.edges.low_threshold > self.edges.high_threshold {
            return Err("edges.low_threshold must not exceed edges.high_threshold".to_string());
        }
        if self.region.vertices.len() < 3 {
            return Err("region.vertices needs at least 3 points".to_string());
        }
        if self.hough.rho <= 0.0 || self.hough.theta <= 0.0 {
            return Err("hough.rho and hough.theta must be positive".to_string());
        }
        if self.lanes.extrapolation_height <= 0 {
            return Err(format!(
                "lanes.extrapolation_height must be positive, got {}",
                self.lanes.extrapolation_height
            ));
        }
        if self.stream.display_width == 0 || self.stream.display_height == 0 {
            return Err("stream display size must be non-zero".to_string());
        }
        Ok(())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid config file '{}': {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lanewatch").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/lanewatch/config.toml")
        })
}

/// Commented default configuration written by `config init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# lanewatch configuration

[source]
# "synthetic", "none", a camera index ("0"), a stream URL
# ("rtsp://...", "http://..."), a video file, or a directory of still images
address = "synthetic"
fps = 30
looping = true
# Give up on a device read after this long (omit to wait forever)
# read_timeout_ms = 500

[edges]
blur_kernel = 5
low_threshold = 50.0
high_threshold = 150.0

[region]
# Region of interest; "bottom"/"right" pin a coordinate to the frame edge
vertices = [
    { x = 0, y = "bottom" },
    { x = 800, y = "bottom" },
    { x = 380, y = 290 },
]

[hough]
rho = 2.0
theta = 0.017453292519943295
threshold = 100
min_line_length = 100
max_line_gap = 50

[lanes]
extrapolation_height = 150
# "right" (horizontal segments count as right candidates) or "ignore"
horizontal_segments = "right"

[overlay]
boundary_color = [0, 255, 0]
center_color = [255, 0, 0]
thickness = 5
frame_weight = 0.8
overlay_weight = 1.0
gamma = 0.0

[stream]
display_width = 256
display_height = 256
backoff_initial_ms = 5
backoff_max_ms = 200

[activity]
# path = "activity_log.txt"
# utc_offset_minutes = -300
operator = "operator"
"#;
