//! Command-line interface definitions and helpers.
//!
//! This module contains all CLI argument parsing, enums, and subcommand handlers.

mod args;
mod commands;
mod enums;

pub use args::{Args, Command, ConfigAction};
pub use commands::{
    ctrlc_received, detect_image, format_detection, handle_config_action, init_config,
    run_streams, setup_ctrlc_handler, CliError, RunOptions,
};
pub use enums::ReportFormat;
