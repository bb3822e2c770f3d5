//! Subcommand handlers for run, detect and config actions.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::args::ConfigAction;
use super::enums::ReportFormat;
use crate::camera::{frame_from_rgb_image, to_rgb_image, DeviceError, FrameSource};
use crate::config::{default_path, Config, ConfigError, DEFAULT_CONFIG_TOML};
use crate::stream::{
    ActivityLog, DisplayHub, DisplaySink, LoopReport, NullSink, SnapshotSink,
    StreamController, StreamKind,
};
use crate::vision::{LaneDetection, LanePipeline};

/// How often the UI thread checks for Ctrl+C and the run deadline.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to open capture source: {0}")]
    Device(#[from] DeviceError),
    #[error("Failed to read image '{}': {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{context} '{}': {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start {0} stream: {1}")]
    Spawn(StreamKind, #[source] std::io::Error),
    #[error("Failed to encode detection: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config file already exists: {}", .0.display())]
    ConfigExists(PathBuf),
    #[error("Lane detection failed: {0}")]
    Vision(#[from] opencv::Error),
    #[error("Nothing to run: both streams are disabled")]
    NothingToRun,
}

/// Global flag for handling Ctrl+C across the application
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check if Ctrl+C has been received.
pub fn ctrlc_received() -> bool {
    CTRLC_RECEIVED.load(Ordering::SeqCst)
}

/// Set up the Ctrl+C handler.
///
/// This should be called once at program startup.
pub fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}

/// Options of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub source: Option<String>,
    pub no_raw: bool,
    pub no_processed: bool,
    pub output: Option<PathBuf>,
    pub duration: Option<Duration>,
}

/// Run the selected streams until Ctrl+C or the duration elapses.
pub fn run_streams(mut config: Config, options: RunOptions) -> Result<Vec<LoopReport>, CliError> {
    if options.no_raw && options.no_processed {
        return Err(CliError::NothingToRun);
    }
    if let Some(address) = options.source {
        config.source.address = address;
    }

    let source = FrameSource::open(&config.source.capture_settings())?;
    let activity = ActivityLog::open(&config.activity).map_err(|e| CliError::Io {
        context: "Failed to open activity log",
        path: config.activity.path.clone().unwrap_or_default(),
        source: e,
    })?;
    let mut sink: Box<dyn DisplaySink> = match &options.output {
        Some(dir) => Box::new(SnapshotSink::new(dir).map_err(|e| CliError::Io {
            context: "Failed to create output directory",
            path: dir.clone(),
            source: e,
        })?),
        None => Box::new(NullSink::default()),
    };

    if let Err(e) = setup_ctrlc_handler() {
        log::warn!("Could not set up Ctrl+C handler: {}", e);
    }

    let (ui, hub) = DisplayHub::channel();
    let mut controller = StreamController::new(source, ui, Arc::new(activity), config);
    let kinds = [
        (StreamKind::Raw, !options.no_raw),
        (StreamKind::Processed, !options.no_processed),
    ];
    for (kind, enabled) in kinds {
        if enabled {
            controller
                .start(kind)
                .map_err(|e| CliError::Spawn(kind, e))?;
        }
    }

    let deadline = options.duration.map(|d| Instant::now() + d);
    loop {
        if ctrlc_received() {
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Run duration elapsed");
            break;
        }
        hub.pump(sink.as_mut(), PUMP_INTERVAL);
    }

    let report = controller.shutdown();
    // deliver whatever the loops posted before stopping
    hub.run(sink.as_mut());

    let reports: Vec<LoopReport> = [report.raw, report.processed].into_iter().flatten().collect();
    for r in &reports {
        println!(
            "{} stream: {} published, {} missed, {} unavailable",
            r.kind, r.published, r.misses, r.unavailable
        );
    }
    Ok(reports)
}

/// Run one still image through the pipeline and print what was found.
pub fn detect_image(
    config: &Config,
    image: &Path,
    out: Option<&Path>,
    format: ReportFormat,
) -> Result<LaneDetection, CliError> {
    let decoded = image::open(image).map_err(|e| CliError::Image {
        path: image.to_path_buf(),
        source: e,
    })?;
    let frame = frame_from_rgb_image(decoded.into_rgb8());
    let pipeline = LanePipeline::new(config);

    let detection = match out {
        Some(dir) => {
            let (detection, stages) = pipeline.stages(&frame)?;
            std::fs::create_dir_all(dir).map_err(|e| CliError::Io {
                context: "Failed to create output directory",
                path: dir.to_path_buf(),
                source: e,
            })?;
            for (index, (name, stage)) in stages.named().into_iter().enumerate() {
                let path = dir.join(format!("{:02}_{}.png", index + 1, name));
                to_rgb_image(stage).save(&path).map_err(|e| CliError::Image {
                    path: path.clone(),
                    source: e,
                })?;
            }
            detection
        }
        None => pipeline.detect(&frame)?,
    };

    match format {
        ReportFormat::Text => print!("{}", format_detection(&detection)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&detection)?),
    }
    Ok(detection)
}

/// Human-readable summary of a detection.
pub fn format_detection(detection: &LaneDetection) -> String {
    let mut out = String::new();
    let line = |l: Option<crate::vision::BoundaryLine>| match l {
        Some(l) => format!("({}, {}) -> ({}, {})", l.x1, l.y1, l.x2, l.y2),
        None => "none".to_string(),
    };
    let _ = writeln!(out, "Segments:   {}", detection.segment_count);
    let _ = writeln!(out, "Left:       {}", line(detection.lanes.left));
    let _ = writeln!(out, "Right:      {}", line(detection.lanes.right));
    let _ = writeln!(out, "Center:     {}", line(detection.center));
    match &detection.steering {
        Some(hint) => {
            let _ = writeln!(
                out,
                "Steering:   offset {:+.1} px, heading {:+.1} deg",
                hint.offset_px, hint.heading_deg
            );
        }
        None => {
            let _ = writeln!(out, "Steering:   none");
        }
    }
    out
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    path: Option<&Path>,
) -> Result<(), CliError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            if config_path.exists() {
                println!("# Config file: {}", config_path.display());
            } else {
                println!("# Config file: {} (not found, using defaults)", config_path.display());
            }
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            init_config(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

/// Write the commented default configuration to `path`.
pub fn init_config(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }
    let io_err = |context: &'static str| {
        let path = path.to_path_buf();
        move |source| CliError::Io {
            context,
            path,
            source,
        }
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err("Failed to create config directory"))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML).map_err(io_err("Failed to write config file"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{BoundaryLine, LaneLines, SteeringHint};
    use tempfile::TempDir;

    #[test]
    fn test_format_detection_with_lane() {
        let left = BoundaryLine::new(0, 480, 100, 330);
        let right = BoundaryLine::new(400, 480, 300, 330);
        let center = left.midpoint(&right);
        let detection = LaneDetection {
            segment_count: 4,
            lanes: LaneLines {
                left: Some(left),
                right: Some(right),
            },
            center: Some(center),
            steering: Some(SteeringHint::from_center(&center, 640)),
        };
        let text = format_detection(&detection);
        assert!(text.contains("Segments:   4"));
        assert!(text.contains("Center:     (200, 480) -> (200, 330)"));
        assert!(text.contains("offset -120.0 px, heading +0.0 deg"));
    }

    #[test]
    fn test_format_detection_without_lane() {
        let detection = LaneDetection {
            segment_count: 0,
            lanes: LaneLines::default(),
            center: None,
            steering: None,
        };
        let text = format_detection(&detection);
        assert!(text.contains("Left:       none"));
        assert!(text.contains("Steering:   none"));
    }

    #[test]
    fn test_init_config_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        init_config(&path).unwrap();
        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, Config::default());

        let err = init_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_run_rejects_no_streams() {
        let options = RunOptions {
            no_raw: true,
            no_processed: true,
            ..RunOptions::default()
        };
        let err = run_streams(Config::default(), options).unwrap_err();
        assert!(matches!(err, CliError::NothingToRun));
    }

    #[test]
    fn test_detect_missing_image() {
        let err = detect_image(
            &Config::default(),
            Path::new("/nonexistent/road.png"),
            None,
            ReportFormat::Text,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/road.png"));
    }

    #[test]
    fn test_detect_writes_stage_images() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("blank.png");
        image::RgbImage::from_pixel(64, 48, image::Rgb([30, 30, 30]))
            .save(&input)
            .unwrap();
        let out = dir.path().join("stages");
        let detection =
            detect_image(&Config::default(), &input, Some(&out), ReportFormat::Json).unwrap();
        assert!(!detection.has_lane());
        for name in ["01_gray", "02_blurred", "03_edges", "04_masked", "05_overlay", "06_composite"] {
            assert!(out.join(format!("{}.png", name)).exists(), "{}", name);
        }
    }
}
