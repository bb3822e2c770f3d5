use std::process;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use lanewatch::cli::{self, Args, Command, RunOptions};
use lanewatch::config::Config;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn run(args: Args) -> Result<(), cli::CliError> {
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Run {
            source,
            no_raw,
            no_processed,
            output,
            duration,
        } => {
            let options = RunOptions {
                source,
                no_raw,
                no_processed,
                output,
                duration: duration
                    .filter(|secs| secs.is_finite() && *secs >= 0.0)
                    .map(Duration::from_secs_f64),
            };
            cli::run_streams(config, options)?;
        }
        Command::Detect { image, out, format } => {
            cli::detect_image(&config, &image, out.as_deref(), format)?;
        }
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref())?;
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
