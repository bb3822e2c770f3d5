//! CLI argument parsing with clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use super::enums::ReportFormat;

/// Lane-following camera pipeline with raw and overlay preview streams
#[derive(Parser, Debug)]
#[command(name = "lanewatch")]
#[command(version, about = "Lane detection over a live camera feed", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the raw and processed streams until Ctrl+C
    Run {
        /// Capture address: `synthetic`, `none`, a camera index, a stream URL,
        /// a video file or a directory of images
        #[arg(long, short)]
        source: Option<String>,

        /// Do not start the raw stream
        #[arg(long)]
        no_raw: bool,

        /// Do not start the processed stream
        #[arg(long)]
        no_processed: bool,

        /// Write the latest image of each stream to DIR
        #[arg(long, short, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<f64>,
    },
    /// Detect the lane in a single image
    Detect {
        /// Image file (png or jpeg)
        image: PathBuf,

        /// Write every intermediate stage image to DIR
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Result format
        #[arg(long, short, default_value = "text")]
        format: ReportFormat,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Create default config file
    Init,
}
